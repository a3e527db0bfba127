//! Console front end for dualrag
//!
//! Configuration loading, startup wiring, the sample corpus and the
//! interactive console.

pub mod app;
pub mod config;
pub mod console;
pub mod samples;
pub mod ui;


pub use app::{App, StartupOptions};
pub use config::AppConfig;
pub use console::{Console, ConsoleCommand};
