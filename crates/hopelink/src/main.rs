//! `hopelink` command-line entry point.
//!
//! `hopelink chat` runs one operator pass and prints the response envelope
//! as JSON; pass `--confirm` to execute the proposal from a previous turn in
//! the same session. `hopelink config` validates the environment without
//! touching the backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use hopelink::backend::{FixtureBackend, HttpBackend};
use hopelink::classifier;
use hopelink::{EngineConfig, Operator};
use hopelink_logging::{init_logging, LogConfig};
use hopelink_protocol::{SessionId, UserRequest};

#[derive(Parser)]
#[command(name = "hopelink", version, about = "Conversational donation engine")]
struct Cli {
    /// Mirror log output to stderr at full verbosity.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one message through the operator and print the response.
    Chat {
        /// The donor's message.
        #[arg(long, short)]
        message: String,
        /// User id attached to the request.
        #[arg(long, default_value = "cli-user")]
        user: String,
        /// Session id; reuse it across turns to confirm a proposal.
        #[arg(long, default_value = "cli-session")]
        session: String,
        /// Confirm the pending proposal instead of starting a new one.
        #[arg(long)]
        confirm: bool,
        /// Talk to the configured platform backend instead of the built-in
        /// sample data.
        #[arg(long)]
        live: bool,
    },
    /// Validate the configuration and print a readiness report.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogConfig {
        app_name: "hopelink",
        verbose: cli.verbose,
    })?;

    match cli.command {
        Command::Chat {
            message,
            user,
            session,
            confirm,
            live,
        } => chat(message, user, session, confirm, live).await,
        Command::Config => report_config(),
    }
}

async fn chat(
    message: String,
    user: String,
    session: String,
    confirm: bool,
    live: bool,
) -> Result<()> {
    let config = EngineConfig::from_env();
    let classifier = classifier::from_config(&config.classifier)?;

    let operator = if live {
        let backend = Arc::new(HttpBackend::new(&config.backend)?);
        Operator::new(classifier, backend.clone(), backend, config)
    } else {
        let backend = Arc::new(FixtureBackend::new());
        Operator::new(classifier, backend.clone(), backend, config)
    };

    let request = UserRequest {
        user_id: user,
        session_id: SessionId::from(session.as_str()),
        message,
        confirmation: confirm,
    };
    let response = operator.handle(&request).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to serialize response")?
    );
    Ok(())
}

fn report_config() -> Result<()> {
    let config = EngineConfig::from_env();
    let report = config.validate();

    println!("classifier: {}", config.classifier.provider.as_str());
    println!("model:      {}", config.active_model());
    println!("backend:    {}", config.backend.base_url);
    println!(
        "limits:     max ₹{:.0}, confirm above ₹{:.0}",
        config.safety.max_donation_amount, config.safety.always_confirm_above
    );
    println!();

    for issue in &report.issues {
        println!("issue:   {issue}");
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    if report.ready() {
        println!("configuration is ready");
        Ok(())
    } else {
        std::process::exit(1);
    }
}
