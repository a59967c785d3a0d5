//! Connection plan resolution
//!
//! Turns raw [`Settings`] into an immutable [`ConnectionPlan`]: which
//! backend to use, how to authenticate, and the backend-specific
//! parameters. No network I/O happens here.

use std::time::Duration;

use secrecy::SecretString;

use crate::config::Settings;
use crate::db;
use crate::error::{GatewayError, GatewayResult};

/// Database used when none is configured
pub const DEFAULT_DATABASE: &str = "master";

/// ODBC driver used when none is configured
pub const DEFAULT_ODBC_DRIVER: &str = "ODBC Driver 18 for SQL Server";

/// TCP port for the native backend when none is configured
pub const DEFAULT_PORT: u16 = 1433;

/// Login timeout for both backends
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client implementation used to reach the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Native TDS client (tiberius)
    Native,
    /// ODBC driver manager
    Odbc,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Native => "native",
            Backend::Odbc => "odbc",
        }
    }
}

/// Host operating system family, for the backend default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Ships a native SQL Server ODBC driver
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Sql,
    Windows,
}

impl AuthMode {
    /// Parse `sql`, `windows` or `trusted`, case-insensitively; unset means `sql`
    pub fn parse(value: Option<&str>) -> GatewayResult<Self> {
        let Some(value) = value else {
            return Ok(AuthMode::Sql);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "sql" => Ok(AuthMode::Sql),
            "windows" | "trusted" => Ok(AuthMode::Windows),
            _ => Err(GatewayError::config("auth mode must be sql or windows")),
        }
    }
}

/// SQL Server login
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug)]
pub enum Authentication {
    SqlLogin(Credentials),
    /// Integrated Windows authentication with the current OS identity
    Integrated,
}

impl Authentication {
    pub fn mode(&self) -> AuthMode {
        match self {
            Authentication::SqlLogin(_) => AuthMode::Sql,
            Authentication::Integrated => AuthMode::Windows,
        }
    }
}

/// TLS options, applied by the ODBC backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsOptions {
    pub encrypt: bool,
    pub trust_server_certificate: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            encrypt: true,
            trust_server_certificate: true,
        }
    }
}

/// Everything needed to open one connection
#[derive(Debug)]
pub struct ConnectionPlan {
    pub backend: Backend,
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    pub auth: Authentication,
    pub driver: String,
    pub tls: TlsOptions,
    pub connect_timeout: Duration,
}

impl ConnectionPlan {
    /// ODBC `Server` attribute: `host` or `host,port`
    pub fn odbc_server(&self) -> String {
        match self.port {
            Some(port) => format!("{},{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

/// Pick a backend: explicit off beats explicit on beats the platform default
pub fn select_backend(disable_odbc: bool, use_odbc: bool, platform: Platform) -> Backend {
    if disable_odbc {
        Backend::Native
    } else if use_odbc {
        Backend::Odbc
    } else {
        match platform {
            Platform::Windows => Backend::Odbc,
            Platform::Other => Backend::Native,
        }
    }
}

/// Resolve settings into a plan for the current build
pub fn resolve(settings: &Settings, platform: Platform) -> GatewayResult<ConnectionPlan> {
    resolve_with(settings, platform, db::odbc_available())
}

/// Resolve settings into a plan, given whether the ODBC client is compiled in
pub fn resolve_with(
    settings: &Settings,
    platform: Platform,
    odbc_available: bool,
) -> GatewayResult<ConnectionPlan> {
    let host = settings
        .server
        .clone()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| GatewayError::config("server required"))?;

    let auth = match AuthMode::parse(settings.auth.as_deref())? {
        AuthMode::Windows => Authentication::Integrated,
        AuthMode::Sql => {
            let username = settings.user.clone().filter(|s| !s.is_empty());
            let password = settings.password.clone().filter(|s| !s.is_empty());
            match (username, password) {
                (Some(username), Some(password)) => Authentication::SqlLogin(Credentials {
                    username,
                    password: SecretString::from(password),
                }),
                _ => {
                    return Err(GatewayError::config(
                        "credentials required unless windows auth",
                    ))
                }
            }
        }
    };

    let backend = select_backend(
        settings.disable_odbc.unwrap_or(false),
        settings.use_odbc.unwrap_or(false),
        platform,
    );
    if backend == Backend::Odbc && !odbc_available {
        return Err(GatewayError::BackendUnavailable(
            "ODBC backend selected but this build has no ODBC support; \
             rebuild with the `odbc` feature or set MSSQL_DISABLE_ODBC=1"
                .to_string(),
        ));
    }

    let defaults = TlsOptions::default();
    Ok(ConnectionPlan {
        backend,
        host,
        port: settings.port,
        database: settings
            .database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        auth,
        driver: settings
            .driver
            .clone()
            .unwrap_or_else(|| DEFAULT_ODBC_DRIVER.to_string()),
        tls: TlsOptions {
            encrypt: settings.encrypt.unwrap_or(defaults.encrypt),
            trust_server_certificate: settings
                .trust_cert
                .unwrap_or(defaults.trust_server_certificate),
        },
        connect_timeout: CONNECT_TIMEOUT,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn sql_settings() -> Settings {
        Settings {
            server: Some("db.local".into()),
            user: Some("sa".into()),
            password: Some("p@ss".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_sql_auth_defaults() {
        let plan = resolve_with(&sql_settings(), Platform::Other, false).unwrap();
        assert_eq!(plan.backend, Backend::Native);
        assert_eq!(plan.host, "db.local");
        assert_eq!(plan.database, "master");
        assert_eq!(plan.driver, DEFAULT_ODBC_DRIVER);
        assert_eq!(plan.tls, TlsOptions::default());
        assert_eq!(plan.connect_timeout, Duration::from_secs(5));
        match &plan.auth {
            Authentication::SqlLogin(creds) => {
                assert_eq!(creds.username, "sa");
                assert_eq!(creds.password.expose_secret(), "p@ss");
            }
            other => panic!("expected sql login, got {:?}", other),
        }
    }

    #[test]
    fn test_sql_auth_requires_both_credentials() {
        for (user, password) in [(None, Some("p")), (Some("sa"), None), (Some(""), Some("p")), (None, None)] {
            let settings = Settings {
                server: Some("db".into()),
                user: user.map(String::from),
                password: password.map(String::from),
                ..Default::default()
            };
            let err = resolve_with(&settings, Platform::Other, true).unwrap_err();
            assert!(matches!(err, GatewayError::Config(_)));
            assert_eq!(err.to_string(), "credentials required unless windows auth");
        }
    }

    #[test]
    fn test_windows_auth_needs_no_credentials() {
        for mode in ["windows", "TRUSTED", "Windows"] {
            let settings = Settings {
                server: Some("db".into()),
                auth: Some(mode.into()),
                ..Default::default()
            };
            let plan = resolve_with(&settings, Platform::Other, true).unwrap();
            assert_eq!(plan.auth.mode(), AuthMode::Windows);
            assert!(matches!(plan.auth, Authentication::Integrated));
        }
    }

    #[test]
    fn test_windows_auth_ignores_credentials() {
        let settings = Settings {
            auth: Some("windows".into()),
            ..sql_settings()
        };
        let plan = resolve_with(&settings, Platform::Other, true).unwrap();
        assert!(matches!(plan.auth, Authentication::Integrated));
    }

    #[test]
    fn test_unknown_auth_mode_fails_for_every_backend() {
        for (disable, enable, platform) in [
            (true, false, Platform::Other),
            (false, true, Platform::Other),
            (false, false, Platform::Windows),
        ] {
            let settings = Settings {
                auth: Some("kerberos".into()),
                disable_odbc: Some(disable),
                use_odbc: Some(enable),
                ..sql_settings()
            };
            let err = resolve_with(&settings, platform, true).unwrap_err();
            assert_eq!(err.to_string(), "auth mode must be sql or windows");
        }
    }

    #[test]
    fn test_server_required() {
        let settings = Settings {
            server: None,
            ..sql_settings()
        };
        let err = resolve_with(&settings, Platform::Other, true).unwrap_err();
        assert_eq!(err.to_string(), "server required");
    }

    #[test]
    fn test_backend_precedence_all_combinations() {
        for disable in [false, true] {
            for enable in [false, true] {
                for platform in [Platform::Windows, Platform::Other] {
                    let expected = if disable {
                        Backend::Native
                    } else if enable {
                        Backend::Odbc
                    } else if platform == Platform::Windows {
                        Backend::Odbc
                    } else {
                        Backend::Native
                    };
                    assert_eq!(
                        select_backend(disable, enable, platform),
                        expected,
                        "disable={} enable={} platform={:?}",
                        disable,
                        enable,
                        platform
                    );
                }
            }
        }
    }

    #[test]
    fn test_resolve_reads_backend_flags_in_precedence_order() {
        for disable in [false, true] {
            for enable in [false, true] {
                for platform in [Platform::Windows, Platform::Other] {
                    let settings = Settings {
                        disable_odbc: Some(disable),
                        use_odbc: Some(enable),
                        ..sql_settings()
                    };
                    let plan = resolve_with(&settings, platform, true).unwrap();
                    let expected = match (disable, enable, platform) {
                        (true, _, _) => Backend::Native,
                        (false, true, _) => Backend::Odbc,
                        (false, false, Platform::Windows) => Backend::Odbc,
                        (false, false, Platform::Other) => Backend::Native,
                    };
                    assert_eq!(
                        plan.backend, expected,
                        "disable={} enable={} platform={:?}",
                        disable, enable, platform
                    );
                }
            }
        }
    }

    #[test]
    fn test_unset_backend_flags_follow_platform() {
        let plan = resolve_with(&sql_settings(), Platform::Windows, true).unwrap();
        assert_eq!(plan.backend, Backend::Odbc);
        let plan = resolve_with(&sql_settings(), Platform::Other, true).unwrap();
        assert_eq!(plan.backend, Backend::Native);
    }

    #[test]
    fn test_odbc_unavailable_is_reported_at_resolution() {
        let settings = Settings {
            use_odbc: Some(true),
            ..sql_settings()
        };
        let err = resolve_with(&settings, Platform::Other, false).unwrap_err();
        assert!(matches!(err, GatewayError::BackendUnavailable(_)));
    }

    #[test]
    fn test_disable_wins_even_without_odbc() {
        let settings = Settings {
            use_odbc: Some(true),
            disable_odbc: Some(true),
            ..sql_settings()
        };
        let plan = resolve_with(&settings, Platform::Windows, false).unwrap();
        assert_eq!(plan.backend, Backend::Native);
    }

    #[test]
    fn test_odbc_server_appends_port() {
        let settings = Settings {
            use_odbc: Some(true),
            port: Some(1444),
            ..sql_settings()
        };
        let plan = resolve_with(&settings, Platform::Other, true).unwrap();
        assert_eq!(plan.odbc_server(), "db.local,1444");

        let plan = resolve_with(&sql_settings(), Platform::Other, true).unwrap();
        assert_eq!(plan.odbc_server(), "db.local");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let plan = resolve_with(&sql_settings(), Platform::Other, false).unwrap();
        let debug = format!("{:?}", plan);
        assert!(!debug.contains("p@ss"));
        assert!(debug.contains("[REDACTED]"));
    }
}
