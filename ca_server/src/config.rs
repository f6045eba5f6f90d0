//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use campus_auth::{AuthSettings, DatabaseConfig, TokenSecrets, db::config::DEFAULT_DATABASE_URL};
use chrono::Duration;
use std::{fmt, net::SocketAddr, str::FromStr};

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Token lifetimes
    pub tokens: TokenConfig,
    /// Refresh cookie attributes
    pub cookie: CookieConfig,
    /// Prometheus listener, disabled when unset
    pub metrics_bind: Option<SocketAddr>,
}

/// Security-related configuration
#[derive(Clone)]
pub struct SecurityConfig {
    /// Access token signing secret (required)
    pub jwt_secret: String,
    /// Refresh token signing secret (required)
    pub refresh_secret: String,
    /// Password hashing pepper (required)
    pub password_pepper: String,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"***")
            .field("refresh_secret", &"***")
            .field("password_pepper", &"***")
            .finish()
    }
}

/// Token lifetime configuration
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_expire: DurationSpec,
    pub refresh_expire: DurationSpec,
    /// Days a revoked session is kept past its expiry
    pub session_retention_days: i64,
}

/// Refresh cookie configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    /// Adds the `Secure` attribute
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "refreshToken".to_string(),
            path: "/api/auth/refresh".to_string(),
            secure: false,
        }
    }
}

/// A lifetime written as `<n><s|m|h|d>`, e.g. `15m` or `7d`.
///
/// Keeps the original text so it can be echoed back to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationSpec {
    raw: String,
    duration: Duration,
}

impl DurationSpec {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl FromStr for DurationSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let Some(unit) = raw.chars().last() else {
            return Err("empty duration".to_string());
        };
        let amount: i64 = raw[..raw.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| format!("expected <number><s|m|h|d>, got {raw:?}"))?;
        if amount <= 0 {
            return Err(format!("duration must be positive, got {raw:?}"));
        }

        let duration = match unit {
            's' => Duration::try_seconds(amount),
            'm' => Duration::try_minutes(amount),
            'h' => Duration::try_hours(amount),
            'd' => Duration::try_days(amount),
            _ => return Err(format!("unknown unit {unit:?} in {raw:?}")),
        }
        .ok_or_else(|| format!("duration out of range: {raw:?}"))?;

        Ok(Self {
            raw: raw.to_string(),
            duration,
        })
    }
}

impl fmt::Display for DurationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        Self::from_lookup(
            |key| std::env::var(key).ok(),
            bind_override,
            database_url_override,
        )
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_or(&lookup, "SERVER_BIND", SocketAddr::from(([127, 0, 0, 1], 6969)))?,
        };

        // Database configuration
        let defaults = DatabaseConfig::development();
        let database = DatabaseConfig {
            database_url: database_url_override
                .or_else(|| lookup("DATABASE_URL"))
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_or(&lookup, "DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connection_timeout_secs: parse_or(
                &lookup,
                "DB_CONNECTION_TIMEOUT_SECS",
                defaults.connection_timeout_secs,
            )?,
            idle_timeout_secs: parse_or(&lookup, "DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,
            max_lifetime_secs: parse_or(&lookup, "DB_MAX_LIFETIME_SECS", defaults.max_lifetime_secs)?,
        };

        // Security configuration (REQUIRED)
        let security = SecurityConfig {
            jwt_secret: required(&lookup, "JWT_SECRET", "Generate with: openssl rand -hex 32")?,
            refresh_secret: required(
                &lookup,
                "REFRESH_SECRET",
                "Generate with: openssl rand -hex 32 (must differ from JWT_SECRET)",
            )?,
            password_pepper: required(
                &lookup,
                "PASSWORD_PEPPER",
                "Generate with: openssl rand -hex 16",
            )?,
        };

        let tokens = TokenConfig {
            access_expire: parse_or(&lookup, "JWT_EXPIRE", default_spec("15m", 15 * 60))?,
            refresh_expire: parse_or(&lookup, "REFRESH_EXPIRE", default_spec("7d", 7 * 86_400))?,
            session_retention_days: parse_or(&lookup, "SESSION_RETENTION_DAYS", 5)?,
        };

        let cookie_defaults = CookieConfig::default();
        let cookie = CookieConfig {
            name: lookup("REFRESH_COOKIE_NAME").unwrap_or(cookie_defaults.name),
            path: lookup("REFRESH_COOKIE_PATH").unwrap_or(cookie_defaults.path),
            secure: lookup("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production")),
        };

        let metrics_bind = lookup("METRICS_BIND")
            .map(|value| {
                value.parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("Not a socket address: {value}"),
                })
            })
            .transpose()?;

        Ok(ServerConfig {
            bind,
            database,
            security,
            tokens,
            cookie,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        if self.security.refresh_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "REFRESH_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        if self.security.refresh_secret == self.security.jwt_secret {
            return Err(ConfigError::Invalid {
                var: "REFRESH_SECRET".to_string(),
                reason: "Must differ from JWT_SECRET".to_string(),
            });
        }

        if self.security.password_pepper.len() < 16 {
            return Err(ConfigError::Invalid {
                var: "PASSWORD_PEPPER".to_string(),
                reason: "Must be at least 16 characters (64-bit security)".to_string(),
            });
        }

        if self.tokens.access_expire.duration() >= self.tokens.refresh_expire.duration() {
            return Err(ConfigError::Invalid {
                var: "JWT_EXPIRE".to_string(),
                reason: format!(
                    "Must be shorter than REFRESH_EXPIRE ({})",
                    self.tokens.refresh_expire
                ),
            });
        }

        if self.tokens.session_retention_days < 0 {
            return Err(ConfigError::Invalid {
                var: "SESSION_RETENTION_DAYS".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        if self.cookie.name.is_empty() {
            return Err(ConfigError::Invalid {
                var: "REFRESH_COOKIE_NAME".to_string(),
                reason: "Must not be empty".to_string(),
            });
        }

        if !self.cookie.path.starts_with('/') {
            return Err(ConfigError::Invalid {
                var: "REFRESH_COOKIE_PATH".to_string(),
                reason: "Must start with '/'".to_string(),
            });
        }

        Ok(())
    }

    /// Signing secrets and pepper for the auth engine
    pub fn token_secrets(&self) -> TokenSecrets {
        TokenSecrets {
            access_secret: self.security.jwt_secret.clone(),
            refresh_secret: self.security.refresh_secret.clone(),
            pepper: self.security.password_pepper.clone(),
        }
    }

    /// Token lifetimes and retention for the auth engine
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            access_ttl: self.tokens.access_expire.duration(),
            refresh_ttl: self.tokens.refresh_expire.duration(),
            session_retention: Duration::days(self.tokens.session_retention_days),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn default_spec(raw: &str, seconds: i64) -> DurationSpec {
    DurationSpec {
        raw: raw.to_string(),
        duration: Duration::seconds(seconds),
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    hint: &str,
) -> Result<String, ConfigError> {
    lookup(var)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConfigError::MissingRequired {
            var: var.to_string(),
            hint: hint.to_string(),
        })
}

/// Parse a variable, using `default` when it is unset. A set but
/// unparseable value is an error rather than a silent fallback.
fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: var.to_string(),
            reason: e.to_string(),
        }),
    }
}
