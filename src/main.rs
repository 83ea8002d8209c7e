//! CLI entry point for the harvest tool.

use std::process::ExitCode;

use tracing::error;

mod app;
mod cli;
mod commands;

/// Process outcome mapped to an exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Everything settled successfully.
    Success,
    /// Some leaves failed.
    Partial,
    /// Nothing succeeded, the run was interrupted, or a fatal error occurred.
    Failure,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match app::runtime::run_harvest().await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(err) => {
            error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}
