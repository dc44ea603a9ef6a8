//! Layered configuration.
//!
//! Priority: CLI flag > CLI env var > `CHAT_WIDGET_*` env > config file >
//! defaults. The config file is `--config`/`CONFIG_FILE`, or `config.yaml` in
//! the working directory when present.

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

/// Fallback config file looked up in the working directory.
const CWD_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long, env = "BIND_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Base URL of the chat service
    #[arg(long, env = "CHAT_SERVICE_URL")]
    pub upstream_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub widget: WidgetConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Directory served under `/static` (htmx bundle, stylesheet).
    pub static_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the chat service; `/api/chat/chat` is joined onto it.
    pub base_url: String,
    /// Per-request timeout. Unset leaves the transport defaults.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl UpstreamConfig {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WidgetConfig {
    /// Identities offered by the user selector; the first is preselected.
    pub users: Vec<String>,
    /// Canned prompts rendered as suggestion buttons.
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Widgets unused for this long are dropped.
    pub idle_timeout_secs: u64,
}

impl WidgetConfig {
    /// The preselected identity.
    #[must_use]
    pub fn default_user(&self) -> &str {
        self.users.first().map_or("default", String::as_str)
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.static_dir", "static")?
            .set_default("upstream.base_url", "http://127.0.0.1:9000")?
            .set_default("widget.users", vec!["user1", "user2", "user3"])?
            .set_default("widget.suggestions", vec![
                "Start a CCAR batch run",
                "Check run status",
                "Show the latest stress test results",
            ])?
            .set_default("widget.idle_timeout_secs", 30 * 60)?
            .set_default("log.json", false)?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(File::from(Path::new(path)));
        } else if Path::new(CWD_CONFIG_FILE).exists() {
            builder = builder.add_source(File::from(Path::new(CWD_CONFIG_FILE)));
        }

        // E.g. CHAT_WIDGET_SERVER__PORT=8000, CHAT_WIDGET_WIDGET__USERS=a,b
        builder = builder.add_source(
            Environment::with_prefix("CHAT_WIDGET")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("widget.users")
                .with_list_parse_key("widget.suggestions")
                .try_parsing(true),
        );

        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(url) = cli.upstream_url {
            builder = builder.set_override("upstream.base_url", url)?;
        }
        if let Some(json) = cli.log_json {
            builder = builder.set_override("log.json", json)?;
        }

        let mut cfg: Self = builder.build()?.try_deserialize()?;
        cfg.widget.users.retain(|user| !user.trim().is_empty());
        if cfg.widget.users.is_empty() {
            return Err(config::ConfigError::Message(
                "widget.users must name at least one user".to_string(),
            ));
        }
        Ok(cfg)
    }
}
