// bin/payment-report: drives the sans-IO flow from payment-model.
mod auth;
mod cli;
mod config_file;
mod effects;
mod ntfy;
mod sheets;
mod telemetry;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use payment_model::{Command, Event, PaymentFlow};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::cli::Cli;
use crate::effects::Effects;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_tracing();

    let effects = match Effects::new(Duration::from_secs(cli.http_timeout), cli.print) {
        Ok(effects) => effects,
        Err(err) => {
            error!("unable to build http client: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut flow = PaymentFlow::new(cli.mode(), cli.config.clone());
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<Event>();

    if let Some(code) = dispatch(flow.start(), &effects, &evt_tx) {
        return code;
    }

    while let Some(event) = evt_rx.recv().await {
        if let Some(code) = dispatch(flow.on_event(event), &effects, &evt_tx) {
            return code;
        }
    }
    error!("effect channel closed unexpectedly");
    ExitCode::FAILURE
}

/// Runs the effect a command asks for; returns the exit code once the flow is done.
fn dispatch(
    cmd: Command,
    effects: &Effects,
    evt_tx: &mpsc::UnboundedSender<Event>,
) -> Option<ExitCode> {
    match cmd {
        Command::Do(effect) => {
            effects.spawn(effect, evt_tx.clone());
            None
        }
        Command::Wait => None,
        Command::Done(Ok(())) => {
            info!("payment report finished");
            Some(ExitCode::SUCCESS)
        }
        Command::Done(Err(msg)) => {
            error!("{msg}");
            Some(ExitCode::FAILURE)
        }
    }
}
