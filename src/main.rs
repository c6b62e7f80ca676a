mod admin;
mod api;
mod config;
mod display;
mod push;
mod storage;
mod sync;
mod utils;

use crate::{
    admin::{AdminSession, HeroForm},
    api::ApiClient,
    config::Config,
    storage::{FileStorage, MemoryStorage, Storage},
    sync::LeaderboardSync,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::info;
use std::{path::PathBuf, process::ExitCode, sync::Arc};
use tokio::{select, signal, time::interval};

#[derive(Parser)]
#[command(name = "tokyo-rewards", version = config::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the live leaderboard in the terminal (default)
    Watch,
    /// Admin configuration commands
    Admin {
        #[command(subcommand)]
        action: AdminCommand,
    },
}

#[derive(Subcommand)]
enum AdminCommand {
    /// Validate and store an admin token
    Login {
        token: String,
        /// Validate only, don't persist the token past this run
        #[arg(long)]
        session: bool,
    },
    /// Re-validate the stored token
    Ping,
    /// Print the current countdown and contest window
    Show,
    /// Forget the stored token
    Logout,
    /// Set the countdown end (RFC 3339 timestamp)
    SetCountdown { end: String },
    /// Update the hero banner
    SetHero {
        #[arg(long, default_value = "")]
        headline: String,
        #[arg(long, default_value = "")]
        sub1: String,
        #[arg(long, default_value = "")]
        sub2: String,
        #[arg(long, default_value = "")]
        link_text: String,
        #[arg(long, default_value = "")]
        link_url: String,
        #[arg(long, default_value = "#ffffff")]
        headline_color: String,
        #[arg(long, default_value = "#cbd5e1")]
        sub1_color: String,
        #[arg(long, default_value = "#cbd5e1")]
        sub2_color: String,
        #[arg(long, default_value = "/site-logo.png")]
        image_url: String,
        #[arg(long, default_value = "#ffffff")]
        glow_color: String,
        #[arg(long, default_value_t = 12)]
        glow_size: u32,
        #[arg(long, default_value_t = 0.8)]
        glow_alpha: f64,
        #[arg(long, default_value = "#ffffff")]
        image_glow_color: String,
        #[arg(long, default_value_t = 16)]
        image_glow_size: u32,
        #[arg(long, default_value_t = 0.65)]
        image_glow_alpha: f64,
    },
    /// Replace the ten-rank prize table
    SetPrizes {
        /// Exactly ten non-negative amounts, highest rank first
        values: Vec<f64>,
    },
    /// Set or clear the contest window
    SetContest {
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Clear both bounds
        #[arg(long)]
        clear: bool,
    },
    /// Upload a hero banner image
    UploadImage { path: PathBuf },
    /// Download the affiliate ID export
    ExportIds {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = config::load_config().unwrap_or_default();

    utils::logging::setup(config.logging, &config.logging_dir);

    info!("Starting TokyoRewards client v{}", config::VERSION);

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(config).await,
        Command::Admin { action } => admin_command(config, action).await,
    }
}

/// Runs the live board: cache-first bootstrap, one bounded-retry
/// fetch, the push subscription, and the countdown tick driving
/// redraws until Ctrl-C
async fn watch(config: Config) -> ExitCode {
    let backend_url = config.backend_url();
    let api = match ApiClient::new(backend_url.clone()) {
        Ok(api) => api,
        Err(err) => {
            eprintln!("Failed to create HTTP client: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(&config.storage_file));

    let (sync, mut revisions) = LeaderboardSync::new(api, storage, config.fetch.clone());

    // Paint from cache before any network round-trip
    sync.bootstrap();

    let _push = push::subscribe(push::websocket_url(&backend_url), sync.clone());

    let refresh = {
        let sync = sync.clone();
        tokio::spawn(async move { sync.refresh().await })
    };

    let mut ticker = interval(config.tick_interval());
    let mut last_frame = String::new();

    loop {
        select! {
            _ = revisions.changed() => {}
            _ = ticker.tick() => {}
            _ = signal::ctrl_c() => break,
        }

        let frame = display::render_board(&sync.state(), &backend_url, Utc::now());
        if frame != last_frame {
            // Clear and repaint the whole board
            print!("\x1B[2J\x1B[H{}", frame);
            last_frame = frame;
        }
    }

    refresh.abort();
    info!("Shutting down");
    ExitCode::SUCCESS
}

/// Runs a one-shot admin action against the backend
async fn admin_command(config: Config, action: AdminCommand) -> ExitCode {
    let api = match ApiClient::new(config.backend_url()) {
        Ok(api) => api,
        Err(err) => {
            eprintln!("Failed to create HTTP client: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(&config.storage_file));

    let result = match action {
        AdminCommand::Login { token, session } => {
            // A session login validates against an in-memory scope so
            // nothing is written to disk
            let session_storage: Arc<dyn Storage> = if session {
                Arc::new(MemoryStorage::default())
            } else {
                storage
            };
            let admin = AdminSession::new(api, session_storage);
            admin.login(&token).await.map(|_| {
                if session {
                    println!("Token valid (not stored)");
                } else {
                    println!("Logged in");
                }
            })
        }
        AdminCommand::Ping => AdminSession::new(api, storage)
            .ping()
            .await
            .map(|_| println!("Token valid")),
        AdminCommand::Show => {
            let countdown = api.fetch_countdown().await;
            let contest = api.fetch_contest().await;
            match countdown {
                Ok(config) => match config.end {
                    Some(end) => println!("Countdown ends {}", end.to_rfc3339()),
                    None => println!("Countdown not set"),
                },
                Err(err) => eprintln!("Countdown unavailable: {}", err),
            }
            match contest {
                Ok(window) => {
                    let bound = |value: Option<DateTime<Utc>>| {
                        value
                            .map(|at| at.to_rfc3339())
                            .unwrap_or_else(|| "unset".to_string())
                    };
                    println!(
                        "Contest window {} .. {}",
                        bound(window.start),
                        bound(window.end)
                    );
                }
                Err(err) => eprintln!("Contest window unavailable: {}", err),
            }
            Ok(())
        }
        AdminCommand::Logout => {
            AdminSession::new(api, storage).logout();
            println!("Logged out");
            Ok(())
        }
        AdminCommand::SetCountdown { end } => {
            let admin = AdminSession::new(api, storage);
            match parse_timestamp(&end) {
                Some(end) => admin.save_countdown(end).await.map(|stored| {
                    match stored {
                        Some(stored) => println!("Countdown saved, ends {}", stored.to_rfc3339()),
                        None => println!("Countdown saved"),
                    }
                }),
                None => {
                    eprintln!("Invalid timestamp: {}", end);
                    return ExitCode::FAILURE;
                }
            }
        }
        AdminCommand::SetHero {
            headline,
            sub1,
            sub2,
            link_text,
            link_url,
            headline_color,
            sub1_color,
            sub2_color,
            image_url,
            glow_color,
            glow_size,
            glow_alpha,
            image_glow_color,
            image_glow_size,
            image_glow_alpha,
        } => {
            let form = HeroForm {
                headline,
                sub1,
                sub2,
                link_text,
                link_url,
                headline_color,
                sub1_color,
                sub2_color,
                image_url,
                glow_color,
                glow_size,
                glow_alpha,
                image_glow_color,
                image_glow_size,
                image_glow_alpha,
            };
            AdminSession::new(api, storage)
                .save_hero(form)
                .await
                .map(|_| println!("Hero saved"))
        }
        AdminCommand::SetPrizes { values } => AdminSession::new(api, storage)
            .save_prizes(&values)
            .await
            .map(|prizes| println!("Prizes saved: {:?}", prizes)),
        AdminCommand::SetContest { start, end, clear } => {
            let admin = AdminSession::new(api, storage);
            let (start, end) = if clear {
                (None, None)
            } else {
                let start = match start.as_deref().map(parse_timestamp) {
                    Some(None) => {
                        eprintln!("Invalid start timestamp");
                        return ExitCode::FAILURE;
                    }
                    value => value.flatten(),
                };
                let end = match end.as_deref().map(parse_timestamp) {
                    Some(None) => {
                        eprintln!("Invalid end timestamp");
                        return ExitCode::FAILURE;
                    }
                    value => value.flatten(),
                };
                (start, end)
            };
            admin.save_contest(start, end).await.map(|_| {
                if clear {
                    println!("Contest window cleared, board shows lifetime totals");
                } else {
                    println!("Contest window saved");
                }
            })
        }
        AdminCommand::UploadImage { path } => AdminSession::new(api, storage)
            .upload_image(&path)
            .await
            .map(|url| println!("Image uploaded: {}", url)),
        AdminCommand::ExportIds { dir } => AdminSession::new(api, storage)
            .export_ids(&dir)
            .await
            .map(|path| println!("Export written to {}", path.display())),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
