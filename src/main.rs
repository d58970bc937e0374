#![forbid(unsafe_code)]

//! `worker-harness`: WebSocket test client binary.
//!
//! Parses flags, initialises logging, then drives a single
//! [`Harness`] run on a single-threaded runtime.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use worker_harness::cli::{Cli, LogFormat};
use worker_harness::harness::signal::watch_signals;
use worker_harness::harness::{exit_code, Harness, RunReport};
use worker_harness::{AppError, Result};

fn main() -> ExitCode {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // --help and --version are reported through the same path.
            let code = u8::from(err.use_stderr());
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("{err}");
        return ExitCode::from(err.exit_code());
    }

    let outcome = run(&args);
    match &outcome {
        Ok(report) => info!(
            reason = %report.reason,
            request_sent = report.request_sent,
            frames = report.frames_received,
            "worker-harness finished"
        ),
        Err(err) => error!(%err, "worker-harness failed"),
    }
    ExitCode::from(exit_code(&outcome))
}

fn run(args: &Cli) -> Result<RunReport> {
    let (endpoint, config) = args.resolve()?;
    info!(url = %endpoint.url(), worker = config.worker.command, "worker-harness starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let interrupt = CancellationToken::new();
        let signals = tokio::spawn(watch_signals(interrupt.clone()));

        let mut harness = Harness::new(config, endpoint);
        let outcome = harness.run(interrupt).await;
        signals.abort();
        outcome
    })
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
