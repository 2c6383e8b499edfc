//! labattend - command line client for the lab attendance dashboard.
//!
//! Logs in against the attendance backend, prints today's duty roster and
//! the weekly attendance chart, and can follow live updates.

mod render;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use labattend_core::auth::{Session, SessionData};
use labattend_core::poller::FallbackPoller;
use labattend_core::{ApiClient, CacheManager, Config, RealtimeChannel, ResourceKey};

/// How often `watch` re-derives statuses without new data; statuses change
/// with the wall clock alone.
const WATCH_REDRAW_SECS: u64 = 60;

#[derive(Parser, Debug)]
#[command(name = "labattend")]
#[command(about = "Lab attendance dashboard client")]
#[command(version)]
struct Args {
    /// Path to config file (default: <config dir>/labattend/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session
    Login {
        /// Defaults to the last username used
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        password: String,
    },
    /// End the session
    Logout,
    /// Print the duty roster with derived statuses
    Roster {
        /// Day to show, YYYY-MM-DD (default: today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Print present/absent counts for the last seven days
    Chart,
    /// Follow live updates until Ctrl-C
    Watch,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g. RUST_LOG=labattend_core=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

struct App {
    config: Config,
    config_path: Option<PathBuf>,
    api: ApiClient,
    session: Session,
}

impl App {
    fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config = match &config_path {
            Some(path) => {
                let mut config = Config::load_from(path)?;
                config.apply_env_overrides();
                config
            }
            None => Config::load()?,
        };

        let api = ApiClient::from_config(&config).context("Failed to create API client")?;

        let mut session = Session::new(config.cache_dir()?);
        match session.load() {
            Ok(true) => {
                if let Some(token) = session.token() {
                    api.set_token(token);
                }
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable session"),
        }

        Ok(Self {
            config,
            config_path,
            api,
            session,
        })
    }

    fn save_config(&self) -> Result<()> {
        match &self.config_path {
            Some(path) => self.config.save_to(path),
            None => self.config.save(),
        }
    }

    fn cache(&self) -> CacheManager {
        CacheManager::from_config(Arc::new(self.api.clone()), &self.config)
    }

    fn warn_if_logged_out(&self) {
        if !self.session.is_valid() {
            eprintln!("Not logged in; run `labattend login` if requests are rejected.");
        }
    }

    async fn login(&mut self, username: Option<String>, password: &str) -> Result<()> {
        let username = username
            .or_else(|| self.config.last_username.clone())
            .context("No username given and none remembered; pass --username")?;

        let response = self
            .api
            .login(&username, password)
            .await
            .context("Login failed")?;
        let data = SessionData::from_login(response);
        let display = data.username().unwrap_or(&username).to_string();

        self.session.update(data);
        self.session.save()?;

        self.config.last_username = Some(username);
        self.save_config()?;

        println!("Logged in as {}", display);
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Server-side logout failed");
        }
        self.session.clear()?;
        println!("Logged out");
        Ok(())
    }

    async fn roster(&self, date: Option<NaiveDate>) -> Result<()> {
        self.warn_if_logged_out();
        let cache = self.cache();
        load_roster_data(&cache).await;

        let now = Local::now().naive_local();
        let date = date.unwrap_or(now.date());
        let entries = cache.daily_roster(date, now);
        print!(
            "{}",
            render::roster(date, &entries, &cache.age_display(ResourceKey::Attendance))
        );
        Ok(())
    }

    async fn chart(&self) -> Result<()> {
        self.warn_if_logged_out();
        let cache = self.cache();
        cache.attendance(false).await;
        report_errors(&cache, &[ResourceKey::Attendance]);
        print!("{}", render::chart(&cache.chart_series()));
        Ok(())
    }

    async fn watch(&self) -> Result<()> {
        self.warn_if_logged_out();
        let cache = self.cache();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let changes = cache.subscribe(move |key| {
            let _ = tx.send(key);
        });

        let channel = RealtimeChannel::sse(self.api.clone(), &self.config.realtime)
            .context("Failed to set up realtime channel")?;
        let _bridge = channel.bind_cache(cache.clone());
        let mut status = channel.status_changes();
        channel.connect();

        let mut poller = FallbackPoller::start(
            cache.clone(),
            Duration::from_secs(self.config.fallback_poll_secs),
            ResourceKey::ALL.to_vec(),
        );

        load_roster_data(&cache).await;
        print_live_roster(&cache);

        let mut redraw = tokio::time::interval(Duration::from_secs(WATCH_REDRAW_SECS));
        redraw.tick().await;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                Some(key) = rx.recv() => {
                    info!(resource = ?key, "Cache updated");
                    print_live_roster(&cache);
                }
                Ok(()) = status.changed() => {
                    let current = *status.borrow_and_update();
                    eprintln!("[realtime: {}]", current);
                }
                _ = redraw.tick() => print_live_roster(&cache),
            }
        }

        poller.stop();
        channel.disconnect();
        changes.unsubscribe();
        println!("Stopped");
        Ok(())
    }
}

async fn load_roster_data(cache: &CacheManager) {
    tokio::join!(cache.members(false), cache.attendance(false));
    report_errors(cache, &[ResourceKey::Members, ResourceKey::Attendance]);
}

fn report_errors(cache: &CacheManager, keys: &[ResourceKey]) {
    for &key in keys {
        if let Some(message) = cache.last_error(key) {
            eprintln!("Could not refresh {}: {}", key, message);
        }
    }
}

fn print_live_roster(cache: &CacheManager) {
    let now = Local::now().naive_local();
    let date = now.date();
    let entries = cache.daily_roster(date, now);
    println!(
        "\n{}",
        render::roster(date, &entries, &cache.age_display(ResourceKey::Attendance))
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_tracing();
    info!("labattend starting");

    let mut app = App::new(args.config)?;

    match args.command {
        Command::Login { username, password } => app.login(username, &password).await,
        Command::Logout => app.logout().await,
        Command::Roster { date } => app.roster(date).await,
        Command::Chart => app.chart().await,
        Command::Watch => app.watch().await,
    }
}
