use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub rate_limits: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub session_cookie: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub purge_interval_secs: u64,
    /// Key anonymous callers by `x-forwarded-for` / `x-real-ip`. Only safe
    /// behind a proxy that overwrites them; otherwise the peer address is used.
    pub trust_forwarded_headers: bool,
    /// Policy name -> quota. Routes refer to policies by name.
    pub policies: BTreeMap<String, PolicySpec>,
}

/// A quota of `max_requests` per `window_secs`, per caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySpec {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl PolicySpec {
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self { max_requests, window_secs }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Parses the `<requests>/<seconds>` form used by `RATE_LIMIT_<NAME>`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (requests, secs) = raw.split_once('/')?;
        let max_requests = requests.trim().parse().ok()?;
        let window_secs: u64 = secs.trim().parse().ok()?;
        if max_requests == 0 || window_secs == 0 {
            return None;
        }
        Some(Self::new(max_requests, window_secs))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("SECURITY_JWT_SECRET must be set in {0:?}")]
    MissingJwtSecret(Environment),
    #[error("rate limit policy '{0}' has a zero quota or window")]
    EmptyPolicy(String),
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    /// Startup checks that are cheaper to fail on than to discover per request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment != Environment::Development && self.security.jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret(self.environment));
        }
        for (name, spec) in &self.rate_limits.policies {
            if spec.max_requests == 0 || spec.window_secs == 0 {
                return Err(ConfigError::EmptyPolicy(name.clone()));
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("FIELDOPS_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_SESSION_COOKIE") {
            self.security.session_cookie = v;
        }

        // Rate limit overrides
        if let Ok(v) = env::var("RATE_LIMIT_ENABLED") {
            self.rate_limits.enabled = v.parse().unwrap_or(self.rate_limits.enabled);
        }
        if let Ok(v) = env::var("RATE_LIMIT_PURGE_INTERVAL_SECS") {
            self.rate_limits.purge_interval_secs = v.parse().unwrap_or(self.rate_limits.purge_interval_secs);
        }
        if let Ok(v) = env::var("RATE_LIMIT_TRUST_FORWARDED_HEADERS") {
            self.rate_limits.trust_forwarded_headers = v.parse().unwrap_or(self.rate_limits.trust_forwarded_headers);
        }
        self.apply_policy_overrides(env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }));

        self
    }

    /// Applies `RATE_LIMIT_<NAME>=<n>/<secs>` pairs. Settings that share the
    /// prefix are skipped.
    fn apply_policy_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix("RATE_LIMIT_") else {
                continue;
            };
            if matches!(name, "ENABLED" | "PURGE_INTERVAL_SECS" | "TRUST_FORWARDED_HEADERS") {
                continue;
            }
            match PolicySpec::parse(&value) {
                Some(spec) => {
                    self.rate_limits.policies.insert(name.to_ascii_lowercase(), spec);
                }
                None => tracing::warn!("Ignoring malformed {}={:?}, expected <requests>/<seconds>", key, value),
            }
        }
    }

    fn policies(general: u32, heavy: u32, auth: u32, public: u32) -> BTreeMap<String, PolicySpec> {
        BTreeMap::from([
            ("general".to_string(), PolicySpec::new(general, 60)),
            ("heavy".to_string(), PolicySpec::new(heavy, 60)),
            ("auth".to_string(), PolicySpec::new(auth, 60)),
            ("public".to_string(), PolicySpec::new(public, 60)),
        ])
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "development-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                session_cookie: "fieldops_session".to_string(),
            },
            rate_limits: RateLimitConfig {
                enabled: false,
                purge_interval_secs: 60,
                trust_forwarded_headers: false,
                policies: Self::policies(1000, 100, 100, 100),
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.fieldops.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                session_cookie: "fieldops_session".to_string(),
            },
            rate_limits: RateLimitConfig {
                enabled: true,
                purge_interval_secs: 60,
                trust_forwarded_headers: false,
                policies: Self::policies(200, 20, 20, 30),
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.fieldops.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                session_cookie: "fieldops_session".to_string(),
            },
            rate_limits: RateLimitConfig {
                enabled: true,
                purge_interval_secs: 30,
                trust_forwarded_headers: false,
                policies: Self::policies(100, 10, 10, 20),
            },
        }
    }
}
