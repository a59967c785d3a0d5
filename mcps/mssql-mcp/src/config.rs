//! Configuration for the MSSQL MCP Server
//!
//! Settings are layered: an optional TOML file first, then `MSSQL_*`
//! environment variables on top, field by field. They are read fresh on
//! every tool call and never cached.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{GatewayError, GatewayResult};

/// Environment variables read by [`Settings::load`]
pub const ENV_KEYS: [&str; 11] = [
    "MSSQL_SERVER",
    "MSSQL_DB",
    "MSSQL_AUTH",
    "MSSQL_USER",
    "MSSQL_PASSWORD",
    "MSSQL_DRIVER",
    "MSSQL_PORT",
    "MSSQL_ENCRYPT",
    "MSSQL_TRUST_CERT",
    "MSSQL_USE_ODBC",
    "MSSQL_DISABLE_ODBC",
];

/// Raw, unvalidated connection settings
///
/// Validation and defaulting happen in [`crate::plan::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Server host name (required)
    pub server: Option<String>,
    /// Database name (default: master)
    pub database: Option<String>,
    /// Authentication mode: sql, windows or trusted
    pub auth: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// ODBC driver name
    pub driver: Option<String>,
    pub port: Option<u16>,
    /// ODBC `Encrypt` flag
    pub encrypt: Option<bool>,
    /// ODBC `TrustServerCertificate` flag
    pub trust_cert: Option<bool>,
    /// Force the ODBC backend on
    pub use_odbc: Option<bool>,
    /// Force the ODBC backend off (wins over `use_odbc`)
    pub disable_odbc: Option<bool>,
}

/// Where a server instance reads its settings from
#[derive(Debug, Clone)]
pub enum SettingsSource {
    /// Config file plus process environment, re-read on every call
    Environment,
    /// Fixed settings, for embedding and tests
    Fixed(Settings),
}

impl SettingsSource {
    pub fn load(&self) -> GatewayResult<Settings> {
        match self {
            SettingsSource::Environment => Settings::load(),
            SettingsSource::Fixed(settings) => Ok(settings.clone()),
        }
    }
}

impl Settings {
    /// Load settings from the config file (if any) overlaid with the environment
    ///
    /// Looks for the file in:
    /// 1. `MSSQL_CONFIG_PATH` environment variable
    /// 2. `~/.binks/mssql.toml`
    pub fn load() -> GatewayResult<Self> {
        let from_env = Self::from_vars(env_vars()?)?;
        let from_file = match Self::config_path() {
            Some(path) => Self::from_file(&path)?,
            None => Settings::default(),
        };
        Ok(from_env.overlay(from_file))
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("MSSQL_CONFIG_PATH") {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::home_dir().map(|home| home.join(".binks").join("mssql.toml"))
    }

    /// Read settings from a TOML file; a missing file yields empty settings
    pub fn from_file(path: &std::path::Path) -> GatewayResult<Self> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!("failed to read config from {:?}: {}", path, e))
        })?;
        let settings = Self::from_toml(&content).map_err(|e| match e {
            GatewayError::Config(msg) => {
                GatewayError::config(format!("failed to parse config from {:?}: {}", path, msg))
            }
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded settings file");
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> GatewayResult<Self> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| GatewayError::config(e.to_string()))?;
        Ok(settings.without_blanks())
    }

    /// Build settings from `MSSQL_*` variables; other keys are ignored
    pub fn from_vars<I, K, V>(vars: I) -> GatewayResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Settings::default();

        for (key, raw) in vars {
            let raw = raw.as_ref();
            let value = raw.trim();
            if value.is_empty() {
                continue;
            }
            let text = Some(value.to_string());
            match key.as_ref() {
                "MSSQL_SERVER" => settings.server = text,
                "MSSQL_DB" => settings.database = text,
                "MSSQL_AUTH" => settings.auth = text,
                // Credentials are kept byte for byte
                "MSSQL_USER" => settings.user = Some(raw.to_string()),
                "MSSQL_PASSWORD" => settings.password = Some(raw.to_string()),
                "MSSQL_DRIVER" => settings.driver = text,
                "MSSQL_PORT" => settings.port = Some(parse_port(value)?),
                "MSSQL_ENCRYPT" => settings.encrypt = Some(parse_flag("MSSQL_ENCRYPT", value)?),
                "MSSQL_TRUST_CERT" => {
                    settings.trust_cert = Some(parse_flag("MSSQL_TRUST_CERT", value)?)
                }
                "MSSQL_USE_ODBC" => settings.use_odbc = Some(parse_flag("MSSQL_USE_ODBC", value)?),
                "MSSQL_DISABLE_ODBC" => {
                    settings.disable_odbc = Some(parse_flag("MSSQL_DISABLE_ODBC", value)?)
                }
                _ => {}
            }
        }

        Ok(settings)
    }

    /// Fill every unset field from `base`
    pub fn overlay(self, base: Settings) -> Settings {
        Settings {
            server: self.server.or(base.server),
            database: self.database.or(base.database),
            auth: self.auth.or(base.auth),
            user: self.user.or(base.user),
            password: self.password.or(base.password),
            driver: self.driver.or(base.driver),
            port: self.port.or(base.port),
            encrypt: self.encrypt.or(base.encrypt),
            trust_cert: self.trust_cert.or(base.trust_cert),
            use_odbc: self.use_odbc.or(base.use_odbc),
            disable_odbc: self.disable_odbc.or(base.disable_odbc),
        }
    }

    fn without_blanks(self) -> Settings {
        let blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Settings {
            server: blank(self.server),
            database: blank(self.database),
            auth: blank(self.auth),
            user: blank(self.user),
            password: blank(self.password),
            driver: blank(self.driver),
            ..self
        }
    }
}

/// The known `MSSQL_*` variables that are set; other variables are never read
fn env_vars() -> GatewayResult<Vec<(&'static str, String)>> {
    let mut vars = Vec::new();
    for key in ENV_KEYS {
        match std::env::var(key) {
            Ok(value) => vars.push((key, value)),
            Err(std::env::VarError::NotPresent) => {}
            Err(std::env::VarError::NotUnicode(_)) => {
                return Err(GatewayError::config(format!("{} is not valid unicode", key)))
            }
        }
    }
    Ok(vars)
}

fn parse_flag(name: &str, value: &str) -> GatewayResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GatewayError::config(format!(
            "{} must be a boolean (true/false, yes/no, on/off, 1/0), got '{}'",
            name, value
        ))),
    }
}

fn parse_port(value: &str) -> GatewayResult<u16> {
    value.parse().map_err(|_| {
        GatewayError::config(format!("MSSQL_PORT must be a port number, got '{}'", value))
    })
}
