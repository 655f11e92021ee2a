//! CLI domain: parse, route, output and presentation only.
//! Replay orchestration lives in `crate::replay`.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{format_report_json, format_report_text};
pub use route::RunContext;
