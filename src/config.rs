//! Service configuration
//!
//! CLI flags win over environment variables, which win over the defaults.
//! `.env` is loaded before parsing so its values act as environment.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::fees::FeeSchedule;

#[derive(Parser, Debug, Clone)]
#[command(name = "stocky")]
#[command(about = "Stock reward ledger service")]
pub struct Config {
    /// SQLite database file
    #[arg(long, env = "DB_PATH", default_value = "stocky.db")]
    pub db_path: String,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds between mock price batches
    #[arg(long, env = "PRICE_FETCH_INTERVAL_SECS", default_value_t = 3600)]
    pub price_fetch_interval_secs: u64,

    #[arg(long, env = "PRICE_SAMPLER_ENABLED", default_value_t = true, action = ArgAction::Set)]
    pub price_sampler_enabled: bool,

    /// TOML file overriding the default fee rates
    #[arg(long, env = "FEE_SCHEDULE_PATH")]
    pub fee_schedule_path: Option<PathBuf>,
}

impl Config {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.bind_addr, self.port))
    }

    /// Never shorter than one second.
    pub fn price_interval(&self) -> Duration {
        Duration::from_secs(self.price_fetch_interval_secs.max(1))
    }

    pub fn fee_schedule(&self) -> Result<FeeSchedule> {
        match &self.fee_schedule_path {
            Some(path) => {
                let schedule = FeeSchedule::from_toml_file(path)?;
                info!("💸 Fee schedule loaded from {}", path.display());
                Ok(schedule)
            }
            None => Ok(FeeSchedule::default()),
        }
    }
}

pub fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    if dotenv().is_ok() {
        return;
    }

    // 2) Fresh checkout: fall back to the example file next to Cargo.toml
    let example = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env.example");
    if example.exists() {
        let _ = dotenv::from_path(&example);
    }
}

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stocky_backend=debug,stocky=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["stocky"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--db-path",
            "/tmp/ledger.db",
            "--bind-addr",
            "127.0.0.1",
            "--port",
            "9001",
            "--price-sampler-enabled",
            "false",
            "--price-fetch-interval-secs",
            "0",
        ]);
        assert_eq!(config.db_path, "/tmp/ledger.db");
        assert!(!config.price_sampler_enabled);
        assert_eq!(config.price_interval(), Duration::from_secs(1));
        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:9001".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_bad_bind_addr_is_an_error() {
        let config = parse(&["--bind-addr", "not an address"]);
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_fee_schedule_file_overrides_rates() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "stt_rate = \"0.00025\"").unwrap();

        let config = parse(&["--fee-schedule-path", file.path().to_str().unwrap()]);
        let schedule = config.fee_schedule().unwrap();
        assert_eq!(schedule.stt_rate, dec!(0.00025));
        assert_eq!(schedule.brokerage_rate, FeeSchedule::default().brokerage_rate);
    }

    #[test]
    fn test_missing_fee_schedule_file_fails() {
        let config = parse(&["--fee-schedule-path", "/nonexistent/fees.toml"]);
        assert!(config.fee_schedule().is_err());
    }
}
