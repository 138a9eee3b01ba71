//! `bulkmail` - send one message to a list of recipients
//!
//! Reads the recipient list and message from the command line, the account
//! from the settings file, and dispatches through a rate-limited SMTP account.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod progress;
mod report;
mod settings;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bulkmail_core::{Batch, Dispatcher, SmtpTransport, load_recipients_file, validate_run};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bulkmail=info,bulkmail_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let settings = settings::resolve(&args)?;

    let recipients = load_recipients_file(&args.recipients)
        .with_context(|| format!("Failed to read recipients from {}", args.recipients.display()))?;
    let body = args.read_body().context("Failed to read message body")?;
    let batch = Batch::new(recipients, args.subject.clone(), body);
    info!(recipients = batch.recipients.len(), from = %settings.account.email, "loaded batch");

    if args.dry_run {
        let mut problems = validate_run(&settings.account, &batch).err().unwrap_or_default();
        problems.extend(settings.dispatch.validate().err().unwrap_or_default());
        if !problems.is_empty() {
            return Err(bulkmail_core::Error::from(problems).into());
        }
        println!("{} recipient(s) ready; nothing sent (dry run)", batch.recipients.len());
        return Ok(ExitCode::SUCCESS);
    }

    let dispatcher = Dispatcher::new(
        settings.account,
        Arc::new(SmtpTransport::new()),
        settings.dispatch,
    );
    let handle = dispatcher.start(batch)?;

    let bar = progress::bar(handle.progress().total)?;
    let updates = tokio::spawn(progress::follow(handle.subscribe(), bar.clone()));

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; letting in-flight sends finish");
            token.cancel();
        }
    });

    let report = handle.wait().await;
    if let Err(err) = updates.await {
        warn!(error = %err, "progress display failed");
    }
    bar.finish_and_clear();

    if args.json {
        println!("{}", report::json(&report)?);
    } else {
        print!("{}", report::summary(&report));
    }

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
