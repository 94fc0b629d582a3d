use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use restock::{
    check_once, login_dry_run, BrowserSession, ChromeSession, Config, MailNotifier, NoopNotifier,
    Notify, RestockController, SiteProfile, State, Verdict,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch product pages and cart the first restock", long_about = None)]
struct Cli {
    /// Run Chrome without a window (overrides HEADLESS)
    #[arg(long, conflicts_with = "visible")]
    headless: bool,

    /// Always show the Chrome window (overrides HEADLESS)
    #[arg(long)]
    visible: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Log in, watch the items, and take the first restock to order review (default)
    Run,
    /// Check every item's stock once and exit
    Check,
    /// Log in once to verify the credentials, then exit
    Login,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_logging(None);
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(Some(&config.log_file));

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Console output plus an append-only log file
fn init_logging(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("restock=info"));

    let file_layer = log_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
            Err(e) => {
                eprintln!("cannot open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn run(cli: Cli, mut config: Config) -> restock::Result<ExitCode> {
    if cli.headless {
        config.browser.headless = true;
    }
    if cli.visible {
        config.browser.headless = false;
    }
    let site = SiteProfile::target();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            config.require_credentials()?;
            let session = ChromeSession::launch(&config.browser).await?;
            let mail = MailNotifier::new(config.mail.clone());
            let notifier: Box<dyn Notify> = if mail.is_active() {
                Box::new(mail)
            } else {
                tracing::info!("Email notifications are off");
                Box::new(NoopNotifier)
            };

            let report = RestockController::new(&config, &site, &session, notifier.as_ref())
                .run_until(shutdown_signal())
                .await;
            tracing::info!(
                passes = report.passes,
                retry_count = report.retry_count,
                "Stopped in state {:?}",
                report.state
            );

            Ok(match report.state {
                State::Aborted(_) => ExitCode::FAILURE,
                _ => ExitCode::SUCCESS,
            })
        }

        Command::Check => {
            let session = ChromeSession::launch(&config.browser).await?;
            let results = tokio::select! {
                results = check_once(&session, &site, &config) => Some(results),
                _ = shutdown_signal() => None,
            };
            session.close().await?;

            let Some(results) = results else {
                tracing::warn!("Interrupted");
                return Ok(ExitCode::SUCCESS);
            };
            let in_stock = results.iter().filter(|(_, v)| *v == Verdict::InStock).count();
            for (item, verdict) in &results {
                println!("{:<14} {}", verdict.to_string(), item);
            }
            println!("{} of {} items in stock", in_stock, results.len());
            Ok(ExitCode::SUCCESS)
        }

        Command::Login => {
            let credentials = config.require_credentials()?.clone();
            let session = ChromeSession::launch(&config.browser).await?;
            let outcome = tokio::select! {
                outcome = login_dry_run(&session, &site, &config, &credentials) => Some(outcome),
                _ = shutdown_signal() => None,
            };
            session.close().await?;

            Ok(match outcome {
                Some(Ok(report)) => {
                    println!(
                        "Login OK{}",
                        report
                            .account_name
                            .map(|name| format!(" as {}", name))
                            .unwrap_or_default()
                    );
                    ExitCode::SUCCESS
                }
                Some(Err(e)) => {
                    println!("Login failed: {}", e);
                    ExitCode::FAILURE
                }
                None => ExitCode::SUCCESS,
            })
        }
    }
}

