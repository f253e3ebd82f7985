//! PPID portal - case lifecycle and assignment-routed chat service
//!
//! Serves the portal over HTTP and carries a few admin helpers.

mod activity;
mod api;
mod assignment;
mod auth;
mod chat;
mod clock;
mod config;
mod directory;
mod error;
mod files;
mod models;
mod portal;
mod ratelimit;
mod store;
mod unread;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, Credential};
use crate::directory::{DirectoryService, InMemoryAccounts};
use crate::models::Role;
use crate::portal::{Portal, PortalParts};
use crate::store::{snapshot, CaseStore};

#[derive(Parser)]
#[command(name = "ppid-portal")]
#[command(about = "Public information request portal service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Listen address, overrides `server.bind`
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// List officers from the configured account directory
    Officers {
        /// Match on name, email or employee number
        #[arg(short, long)]
        search: Option<String>,

        #[arg(short, long, default_value = "1")]
        page: usize,

        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Print the digest to store in `credentials.token_sha256`
    HashToken {
        token: String,

        /// Subject the token authenticates as
        #[arg(long)]
        subject: Option<String>,

        /// Role granted to the subject
        #[arg(long)]
        role: Option<Role>,

        /// Display name, defaults to the subject
        #[arg(long)]
        name: Option<String>,

        /// Write the credential into the config file
        #[arg(long, requires_all = ["subject", "role"])]
        save: bool,
    },

    /// Show where the config file is read from
    ConfigPath,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Serve { bind } => {
            let config = Config::load()?;
            serve(config, bind).await?;
        }
        Commands::Officers {
            search,
            page,
            page_size,
        } => {
            let config = Config::load()?;
            list_officers(&config, search.as_deref(), page, page_size)?;
        }
        Commands::HashToken {
            token,
            subject,
            role,
            name,
            save,
        } => {
            let digest = auth::hash_token(&token);
            println!("{}", digest);
            if save {
                let subject = subject.context("--save needs --subject")?;
                let role = role.context("--save needs --role")?;
                save_credential(Credential {
                    token_sha256: digest,
                    display_name: name.unwrap_or_else(|| subject.clone()),
                    subject_id: subject,
                    role,
                })?;
            }
        }
        Commands::ConfigPath => {
            println!("{}", Config::config_path()?.display());
        }
    }

    Ok(())
}

async fn serve(config: Config, bind: Option<String>) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let snapshot_path = config.snapshot_path()?;
    let window_days = config.chat.evidence_window_days;

    let store = match snapshot::load(&snapshot_path)? {
        Some(snap) => {
            tracing::info!(
                "Loaded {} case(s) from {}",
                snap.records.len(),
                snapshot_path.display()
            );
            CaseStore::from_snapshot(snap, clock.clone(), window_days)
        }
        None => CaseStore::new(clock.clone(), window_days),
    };
    let store = Arc::new(store);

    let parts = PortalParts::from_config(&config, clock, store.clone())?;
    let portal = Arc::new(Portal::new(&config, parts));

    spawn_limiter_gc(
        portal.clone(),
        Duration::from_secs(config.rate_limit.gc_interval_secs.max(1)),
    );
    spawn_flusher(
        store.clone(),
        snapshot_path.clone(),
        Duration::from_secs(config.storage.flush_interval_secs.max(1)),
    );

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    api::serve(portal, &bind, shutdown_signal()).await?;

    snapshot::save(&snapshot_path, &store.snapshot())?;
    tracing::info!("Saved store to {}", snapshot_path.display());
    Ok(())
}

fn spawn_limiter_gc(portal: Arc<Portal>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            portal.limiter().purge_expired();
        }
    });
}

fn spawn_flusher(store: Arc<CaseStore>, path: PathBuf, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = snapshot::flush(&store, &path) {
                tracing::error!("Snapshot flush failed: {:#}", e);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}

fn save_credential(credential: Credential) -> Result<()> {
    let path = Config::config_path()?;
    let mut config = Config::load_from(&path)?;
    let subject = credential.subject_id.clone();
    let action = if config.upsert_credential(credential) {
        "Replaced"
    } else {
        "Added"
    };
    config.save_to(&path)?;
    println!("{} credential for {} in {}", action, subject, path.display());
    Ok(())
}

fn list_officers(
    config: &Config,
    search: Option<&str>,
    page: usize,
    page_size: Option<usize>,
) -> Result<()> {
    let directory = DirectoryService::new(
        Arc::new(InMemoryAccounts::new(config.accounts.clone())),
        config.directory.clone(),
    );
    let result = directory
        .list_officers(search, Some(page), page_size)
        .context("Directory lookup failed")?;

    println!(
        "\nOfficers (page {}, {} of {}):",
        result.page,
        result.items.len(),
        result.total
    );
    println!("{:-<60}", "");
    if result.items.is_empty() {
        println!("  (no officers found)");
    }
    for officer in &result.items {
        println!("{} [{}]", officer.display_name, officer.role);
        println!("  ID:    {}", officer.id);
        println!("  Email: {}", officer.email);
        if !officer.employee_no.is_empty() {
            println!("  NIP:   {}", officer.employee_no);
        }
    }
    if result.has_more {
        println!("\n(more: --page {})", result.page + 1);
    }
    Ok(())
}
