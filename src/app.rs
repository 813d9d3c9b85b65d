use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::config;
use crate::logging;
use crate::ui;
use crate::worker::Worker;

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub address: String,
    pub config_file: Option<PathBuf>,
}

pub fn run(options: Options) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;

    if let Err(err) = logging::init(&cfg.log) {
        eprintln!("warning: logging disabled: {err:#}");
    }
    info!(address = %options.address, "starting gopher-tui");

    let mut worker = Worker::new(cfg.network.worker_config());
    worker.start();

    let ui_options = ui::Options {
        initial_address: options.address,
        status_timeout: cfg.ui.status_timeout,
        tick_rate: cfg.ui.tick_rate,
    };
    let result = {
        let mut browser = ui::Browser::new(&worker, ui_options);
        ui::run(&mut browser).context("run terminal ui")
    };

    worker.stop();
    info!("gopher-tui exited");
    result
}
