use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use warden::config::Config;
use warden::engine::Moderator;
use warden::ledger::TransparencyLedger;
use warden::notify::Notifier;
use warden::output;
use warden::provider::create_provider;
use warden::reddit::client::RedditClient;
use warden::store::StateStore;

/// Warden: LLM-assisted comment moderation for Reddit.
///
/// Polls a subreddit's comment stream, classifies each comment through a
/// configurable LLM backend, and removes rule-violating comments — with a
/// public transparency ledger of everything it removes.
#[derive(Parser)]
#[command(name = "warden", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the moderation loop
    Run {
        /// Force safe mode (log removals without acting)
        #[arg(long, conflicts_with = "live")]
        safe: bool,

        /// Force live mode (actually remove flagged comments)
        #[arg(long)]
        live: bool,
    },

    /// Show engine status (cursor, statistics, token totals, ledger)
    Status,

    /// Manually publish the transparency ledger to the wiki page
    Publish,

    /// Clear the transparency ledger (administrative reset)
    ClearLedger {
        /// Confirm the irreversible clear
        #[arg(long)]
        yes: bool,
    },

    /// Probe the configured LLM provider
    CheckProvider,

    /// Administer the poll cursor
    Cursor {
        /// Move the cursor 30 days back (reprocess a historical window)
        #[arg(long, conflicts_with = "now")]
        historical: bool,

        /// Reset the cursor to the current time (live comments only)
        #[arg(long)]
        now: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warden=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { safe, live } => {
            let mut config = Config::load()?;
            config.require_reddit()?;
            config.require_provider()?;
            if safe {
                config.safe_mode = true;
            }
            if live {
                config.safe_mode = false;
            }

            output::print_startup(&config);

            let platform = Arc::new(RedditClient::new(&config)?);
            let provider = create_provider(&config)?;
            let mut moderator = Moderator::new(config, platform, provider, Notifier::disabled())?;

            // Ctrl-C requests a graceful stop; the in-flight comment
            // finishes before the loop exits
            let control = moderator.control();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    println!("\n{}", "Stop requested — finishing current work...".dimmed());
                    control.request_stop();
                }
            });

            moderator.start().await?;
            moderator.run().await?;
        }

        Commands::Status => {
            let config = Config::load()?;
            show_status(&config)?;
        }

        Commands::Publish => {
            let config = Config::load()?;
            config.require_reddit()?;

            let platform = RedditClient::new(&config)?;
            let mut ledger = TransparencyLedger::new(
                config.ledger_enabled,
                config.ledger_page_name.clone(),
                config.ledger_publish_threshold,
                config.ledger_publish_interval,
                &config.data_dir,
            )?;

            if ledger.publish(&platform, true).await {
                let status = ledger.status();
                println!(
                    "{} {} entries on r/{}/wiki/{}",
                    "Published.".bold(),
                    status.total_entries,
                    config.subreddit,
                    config.ledger_page_name
                );
            } else {
                anyhow::bail!("Publish failed — see the log for the classified error");
            }
        }

        Commands::ClearLedger { yes } => {
            if !yes {
                println!("This permanently clears the transparency ledger.");
                println!("Re-run with --yes to confirm.");
                return Ok(());
            }
            let config = Config::load()?;
            let mut ledger = TransparencyLedger::new(
                config.ledger_enabled,
                config.ledger_page_name.clone(),
                config.ledger_publish_threshold,
                config.ledger_publish_interval,
                &config.data_dir,
            )?;
            ledger.clear()?;
            println!("{}", "Ledger cleared.".bold());
        }

        Commands::CheckProvider => {
            let config = Config::load()?;
            config.require_provider()?;
            let provider = create_provider(&config)?;
            println!("Probing {} ...", provider.name());
            provider.check_health().await?;
            println!("{}", format!("{} is healthy.", provider.name()).bold());
        }

        Commands::Cursor { historical, now } => {
            let config = Config::load()?;
            let store = StateStore::new(&config.data_dir)?;

            if historical {
                let target = chrono::Utc::now() - chrono::Duration::days(30);
                store.reset_cursor(target)?;
                info!(cursor = %target, "Cursor moved to historical window");
                println!("Cursor set to {target} (30 days back).");
            } else if now {
                let target = chrono::Utc::now();
                store.reset_cursor(target)?;
                info!(cursor = %target, "Cursor reset to current time");
                println!("Cursor set to {target} (live comments only).");
            } else {
                match store.load_cursor() {
                    Some(ts) => println!("Cursor: {ts}"),
                    None => println!("Cursor: not set (first run will fetch the latest comments)"),
                }
            }
        }
    }

    Ok(())
}

/// Render the data-dir snapshot: what the engine knows without touching
/// the network.
fn show_status(config: &Config) -> Result<()> {
    let store = StateStore::new(&config.data_dir)?;

    println!("Data directory: {}", config.data_dir.display());

    match store.load_cursor() {
        Some(ts) => println!("Poll cursor: {ts}"),
        None => println!("Poll cursor: not set (first run)"),
    }

    let stats = store.load_statistics();
    println!(
        "Comments analyzed: {} ({} removed, rate {})",
        stats.comments_analyzed,
        stats.comments_removed,
        if stats.removal_rate.is_empty() {
            "0%"
        } else {
            stats.removal_rate.as_str()
        }
    );

    let totals = store.load_token_totals();
    println!(
        "Token usage: {} in / {} out, estimated cost ${:.6}",
        totals.total_input_tokens, totals.total_output_tokens, totals.total_cost
    );

    let ledger = TransparencyLedger::new(
        config.ledger_enabled,
        config.ledger_page_name.clone(),
        config.ledger_publish_threshold,
        config.ledger_publish_interval,
        &config.data_dir,
    )?;
    let status = ledger.status();
    if status.enabled {
        println!(
            "Ledger: {} entries, {} unpublished (threshold {})",
            status.total_entries, status.unpublished, config.ledger_publish_threshold
        );
        match status.last_updated {
            Some(ts) => println!("Last published: {ts}"),
            None => println!("Last published: never"),
        }
    } else {
        println!("Ledger: disabled");
    }

    if config.safe_mode {
        println!("{}", "Mode: SAFE (no actual removals)".yellow());
    } else {
        println!("{}", "Mode: LIVE".red());
    }

    Ok(())
}
