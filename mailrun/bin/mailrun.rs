//! Command-line front end for resumable bulk email dispatch.
//!
//! Relay credentials come from `SMTP_HOST`, `SMTP_PORT`, `SMTP_USER`,
//! `SMTP_PASSWORD` and `SMTP_FROM`, which may also be set in a `.env` file in
//! the working directory; everything else from the configuration document.

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mailrun::{Config, ConfigUpdate, Controller, config, controller};
use mailrun_common::{internal, logging};

/// Resumable bulk email dispatch
#[derive(Parser, Debug)]
#[command(name = "mailrun")]
#[command(about = "Send one templated message to every recipient in a list", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration document (RON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send to every recipient from the saved checkpoint on
    Send,
    /// Send to the recipient at the checkpoint and advance it by one
    SendNext,
    /// Start the next run from the first recipient
    ResetProgress,
    /// Send the message to a single address without touching the checkpoint
    SendOne {
        /// Address to send to
        address: String,
    },
    /// Show how far the current list has been processed
    Status,
    /// Create or update the configuration document
    Configure {
        /// Recipient list (CSV with an `email` column)
        #[arg(long)]
        recipients: Option<PathBuf>,

        /// Message template
        #[arg(long)]
        template: Option<PathBuf>,

        /// Message subject
        #[arg(long)]
        subject: Option<String>,

        /// Seconds to wait after each send
        #[arg(long)]
        delay: Option<u64>,

        /// Messages per relay session before it is replaced
        #[arg(long)]
        session_limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init();

    match env_file {
        Ok(path) => internal!(level = DEBUG, "Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => internal!(level = WARN, "Ignoring unreadable environment file: {e}"),
    }

    let path = config::locate(cli.config);

    match cli.command {
        Commands::Configure {
            recipients,
            template,
            subject,
            delay,
            session_limit,
        } => {
            let mut config = Config::load_or_default(&path)?;
            config.apply(ConfigUpdate {
                recipients,
                template,
                subject,
                delay_secs: delay,
                session_limit,
            });
            config.dispatch.validate()?;
            config.save(&path)?;
            println!("Saved {}", path.display());
        }
        Commands::Send => {
            let controller = Controller::new(Config::load(&path)?);
            let listener = tokio::spawn(controller::shutdown());

            let result = controller.send().await;
            listener.abort();

            println!("{}", result?);
        }
        Commands::SendNext => {
            let summary = Controller::new(Config::load(&path)?).send_next().await?;
            println!("{summary}");
        }
        Commands::ResetProgress => {
            Controller::new(Config::load(&path)?)
                .reset_progress()
                .await?;
            println!("Progress reset");
        }
        Commands::SendOne { address } => {
            Controller::new(Config::load(&path)?)
                .send_one(&address)
                .await?;
            println!("Sent to {address}");
        }
        Commands::Status => {
            let status = Controller::new(Config::load(&path)?).status().await?;
            println!("{status}");
        }
    }

    Ok(())
}
