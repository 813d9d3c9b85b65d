use std::path::PathBuf;

use gopher_tui::{address, app};

const USAGE: &str = "usage: gopher-tui [--version|-V] [--help|-h] [--config PATH] ADDRESS";

#[derive(Debug, PartialEq, Eq)]
enum Cli {
    Done,
    Run(app::Options),
}

fn main() {
    let options = match handle_cli_flags(std::env::args().skip(1)) {
        Ok(Cli::Done) => return,
        Ok(Cli::Run(options)) => options,
        Err(message) => {
            eprintln!("error: {message}\n{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(err) = gopher_tui::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags<I: IntoIterator<Item = String>>(args: I) -> Result<Cli, String> {
    let mut args = args.into_iter();
    let mut config_file = None;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("gopher-tui {}", gopher_tui::VERSION);
                return Ok(Cli::Done);
            }
            "--help" | "-h" => {
                println!(
                    "gopher-tui - Browse Gopherspace from the terminal.\n\n{USAGE}\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n  --config PATH        Read settings from PATH instead of the default config file"
                );
                return Ok(Cli::Done);
            }
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| "--config needs a path".to_string())?;
                config_file = Some(PathBuf::from(path));
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("unknown flag `{flag}`"));
            }
            _ => positional.push(arg),
        }
    }

    match positional.as_slice() {
        [target] if !target.trim().is_empty() => Ok(Cli::Run(app::Options {
            address: address::normalize(target),
            config_file,
        })),
        [] => Err("missing address".to_string()),
        [_] => Err("empty address".to_string()),
        _ => Err("expected exactly one address".to_string()),
    }
}
