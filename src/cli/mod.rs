//! Command-line handlers and report output

pub mod commands;

pub use commands::{
    cmd_mine, cmd_validate, save_report, write_report, CliResult, ReportError,
};
