use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            storage: StorageConfig::from_env(),
            auth: AuthConfig::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:   {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  storage:  data_dir={}, snapshot_interval={}s, stale_run_max_age={}m",
            self.storage.data_dir.display(),
            self.storage.snapshot_interval_secs,
            self.storage.stale_run_max_age_mins
        );
        tracing::info!(
            "  seed:     {}",
            self.storage
                .seed_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
        tracing::info!(
            "  auth:     {}",
            if self.auth.is_open() {
                "OPEN (no tokens configured)"
            } else {
                "token-scoped roles"
            }
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("GRANARY_HOST", "0.0.0.0"),
            port: env_u16("GRANARY_PORT", 3401),
            cors_origin: env_or("GRANARY_CORS_ORIGIN", "*"),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Seconds between background snapshot flushes (0 disables).
    pub snapshot_interval_secs: u64,
    /// Minutes a run may sit `running` before the reaper closes it failed.
    pub stale_run_max_age_mins: u64,
    /// Optional TOML seed file applied at startup.
    pub seed_file: Option<PathBuf>,
}

impl StorageConfig {
    fn from_env() -> Self {
        Self {
            data_dir: PathBuf::from(env_or("GRANARY_DATA_DIR", "data")),
            snapshot_interval_secs: env_u64("GRANARY_SNAPSHOT_INTERVAL_SECS", 60),
            stale_run_max_age_mins: env_u64("GRANARY_STALE_RUN_MAX_AGE_MINS", 360),
            seed_file: env_opt("GRANARY_SEED_FILE").map(PathBuf::from),
        }
    }
}

// ── Auth ──────────────────────────────────────────────────────

/// Capability tokens, one per role. Unset roles cannot be exercised
/// (except through the admin token, which implies every role).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub admin_token: Option<String>,
    pub writer_token: Option<String>,
    pub checker_token: Option<String>,
    pub reader_token: Option<String>,
}

impl AuthConfig {
    fn from_env() -> Self {
        Self {
            admin_token: env_opt("GRANARY_ADMIN_TOKEN"),
            writer_token: env_opt("GRANARY_WRITER_TOKEN"),
            checker_token: env_opt("GRANARY_CHECKER_TOKEN"),
            reader_token: env_opt("GRANARY_READER_TOKEN"),
        }
    }

    /// True when no tokens are configured at all — the server then runs
    /// unauthenticated (development mode).
    pub fn is_open(&self) -> bool {
        self.admin_token.is_none()
            && self.writer_token.is_none()
            && self.checker_token.is_none()
            && self.reader_token.is_none()
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_open_when_empty() {
        let auth = AuthConfig {
            admin_token: None,
            writer_token: None,
            checker_token: None,
            reader_token: None,
        };
        assert!(auth.is_open());

        let auth = AuthConfig {
            writer_token: Some("w".into()),
            ..auth
        };
        assert!(!auth.is_open());
    }
}
