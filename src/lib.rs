#![allow(clippy::uninlined_format_args)]

pub mod address;
pub mod app;
pub mod config;
pub mod entry;
pub mod gopher;
pub mod logging;
pub mod navigation;
pub mod status;
pub mod ui;
pub mod worker;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
