/// Satellite index analysis: one command per invocation, one JSON document out
mod cli;
mod clients;
mod config;
mod domain;
mod errors;
mod handlers;
mod services;
mod utils;

#[cfg(test)]
mod testing;

use crate::cli::{Cli, Outcome};
use crate::errors::AnalysisError;
use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only the result document
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let message = e.to_string();
            let first_line = message.lines().next().unwrap_or("invalid arguments");
            return emit(Outcome::usage(first_line.trim_start_matches("error: ")));
        }
    };

    let outcome = match build_runtime() {
        Ok(runtime) => runtime.block_on(cli::execute(cli)),
        Err(e) => Outcome::failure(&AnalysisError::from(e), &[]),
    };
    info!(exit_code = outcome.exit_code, "command finished");
    emit(outcome)
}

/// Requests are issued one at a time, so a single-threaded runtime is enough
fn build_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn emit(outcome: Outcome) -> ExitCode {
    println!("{}", outcome.body);
    ExitCode::from(outcome.exit_code)
}
