use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::error;

const DEFAULT_PORT: u16 = 7450;
const DEFAULT_SCAN_SESSION_TTL_SECS: u64 = 300;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

/// Optional config.toml contents. Every field may be omitted.
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    /// REST server port (default: 7450).
    port: Option<u16>,
    /// Log level filter string, e.g. "debug", "info,qrclaimd=trace" (default: "info").
    log: Option<String>,
    /// Bind address (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Public base URL used when building stored-image URLs, e.g.
    /// "https://qr.example.com". Default: "http://{bind_address}:{port}".
    public_base_url: Option<String>,
    /// Slow-query log threshold in milliseconds (0 = disabled).
    slow_query_ms: Option<u64>,
    /// Seconds an idle scan session is kept before being swept (default: 300).
    scan_session_ttl_secs: Option<u64>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    /// Bind address for the REST server (QRCLAIMD_BIND env var, default: "127.0.0.1").
    pub bind_address: String,
    /// Public base URL for stored-image links. None = derived from bind/port.
    pub public_base_url: Option<String>,
    /// Queries slower than this (ms) are logged at WARN. 0 = disabled.
    pub slow_query_ms: u64,
    /// Idle scan sessions older than this are swept.
    pub scan_session_ttl_secs: u64,
}

impl DaemonConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let bind_address = bind_address
            .or(std::env::var("QRCLAIMD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let public_base_url = std::env::var("QRCLAIMD_PUBLIC_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.public_base_url);

        Self {
            port,
            data_dir,
            log,
            bind_address,
            public_base_url,
            slow_query_ms: toml.slow_query_ms.unwrap_or(0),
            scan_session_ttl_secs: toml
                .scan_session_ttl_secs
                .unwrap_or(DEFAULT_SCAN_SESSION_TTL_SECS),
        }
    }

    /// Base URL clients reach this daemon at — used to build the
    /// deterministic public URL for uploaded images.
    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.bind_address, self.port),
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/qrclaimd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("qrclaimd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/qrclaimd or ~/.local/share/qrclaimd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("qrclaimd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("qrclaimd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("qrclaimd");
        }
    }
    PathBuf::from(".qrclaimd")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_beat_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DaemonConfig::new(
            Some(9000),
            Some(dir.path().to_path_buf()),
            Some("debug".to_string()),
            None,
        );
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.log, "debug");
        assert_eq!(cfg.bind_address, "127.0.0.1");
    }

    #[test]
    fn toml_fills_gaps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "port = 8100\npublic_base_url = \"https://qr.example.com/\"\n",
        )
        .unwrap();
        let cfg = DaemonConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.port, 8100);
        // trailing slash is trimmed
        assert_eq!(cfg.public_base_url(), "https://qr.example.com");
    }

    #[test]
    fn derived_public_url_uses_bind_and_port() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DaemonConfig::new(Some(7450), Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.public_base_url(), "http://127.0.0.1:7450");
    }
}
