// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection string.
    pub database_url: String,
    pub port: u16,
    /// JSON fixture with bestiary data, dungeons and roster entries.
    pub fixture_path: Option<PathBuf>,
    /// Whether to run in local mode (no auth, no rate limiting).
    pub local_mode: bool,
}

impl Config {
    /// Load configuration from the process environment and arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:swarfarm.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 8000)
    /// - `FIXTURE_PATH` - reference data fixture loaded at startup
    /// - `SWARFARM_LOCAL_MODE` - set to `true` to enable local mode
    ///
    /// CLI flags:
    /// - `--local` - enable local mode
    /// - `--port <PORT>` - override the port
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let database_url =
            env("DATABASE_URL").unwrap_or_else(|| "sqlite:swarfarm.db?mode=rwc".to_string());

        // CLI flag beats env var beats default
        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(8000);

        let fixture_path = env("FIXTURE_PATH")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let local_mode = args.iter().any(|a| a == "--local")
            || env("SWARFARM_LOCAL_MODE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false);

        Config {
            database_url,
            port,
            fixture_path,
            local_mode,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2)
            .find_map(|pair| (pair[0] == flag).then(|| pair[1].clone()))
    }
}

/// Set once at startup and read by the auth extractor and rate limiter.
static LOCAL_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_local_mode(enabled: bool) {
    LOCAL_MODE.store(enabled, Ordering::Relaxed);
}

pub fn is_local_mode() -> bool {
    LOCAL_MODE.load(Ordering::Relaxed)
}

/// The summoner every request acts as in local mode.
pub const LOCAL_SUMMONER_ID: i64 = 1;
pub const LOCAL_USERNAME: &str = "local";
