use anyhow::Context;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    pub auth: AuthConfig,
    pub geo: GeoConfig,
    pub redirect: RedirectConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    ApiKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    #[serde(default, skip_serializing)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoProvider {
    None,
    MaxMind,
    Http,
    Static,
}

/// How far forwarded headers are trusted when determining the client IP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket address only
    None,
    /// Trust `CF-Connecting-IP`
    Cloudflare,
    /// Trust `Forwarded` / `X-Forwarded-For` subject to the proxy settings below
    Standard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    pub provider: GeoProvider,
    /// Path to a GeoLite2-City or GeoLite2-Country .mmdb file
    pub geoip_db_path: Option<String>,
    /// Lookup URL template, `{ip}` is replaced by the client address
    pub http_url: Option<String>,
    pub static_country: Option<String>,
    pub timeout_ms: u64,
    pub trusted_proxy_mode: TrustedProxyMode,
    #[serde(default)]
    pub trusted_proxies: Vec<IpNet>,
    pub num_trusted_proxies: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    #[serde(default, skip_serializing)]
    pub token_secret: Option<String>,
    pub token_ttl_secs: i64,
    pub secure_cookies: bool,
    pub tracking_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub ttl_secs: u64,
}

impl GeoConfig {
    pub fn disabled() -> Self {
        Self {
            provider: GeoProvider::None,
            geoip_db_path: None,
            http_url: None,
            static_country: None,
            timeout_ms: 2000,
            trusted_proxy_mode: TrustedProxyMode::None,
            trusted_proxies: Vec::new(),
            num_trusted_proxies: None,
        }
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_secs: 900,
            secure_cookies: false,
            tracking_timeout_ms: 1500,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl_secs: 30,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        _ => Ok(default),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a comma-separated list of CIDR ranges; bare addresses become host routes
fn parse_proxies(value: &str) -> anyhow::Result<Vec<IpNet>> {
    parse_list(value)
        .into_iter()
        .map(|entry| {
            if let Ok(net) = entry.parse::<IpNet>() {
                return Ok(net);
            }
            entry
                .parse::<std::net::IpAddr>()
                .map(IpNet::from)
                .with_context(|| format!("invalid trusted proxy entry '{entry}'"))
        })
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend = match env_or("DATABASE_BACKEND", "sqlite").to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = env_or("DATABASE_URL", "sqlite://./detour.db?mode=rwc");
        let max_connections = env_parse("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let api_host = env_or("API_HOST", "127.0.0.1");
        let api_port = env_parse("API_PORT", 8080u16)?;

        let redirect_host = env_or("REDIRECT_HOST", "127.0.0.1");
        let redirect_port = env_parse("REDIRECT_PORT", 3000u16)?;

        let auth_mode = match env_or("AUTH_MODE", "none").to_lowercase().as_str() {
            "none" => AuthMode::None,
            "apikey" | "api_key" => AuthMode::ApiKey,
            other => {
                tracing::warn!(
                    "Unknown AUTH_MODE '{other}', falling back to 'none'. Supported values: none, apikey"
                );
                AuthMode::None
            }
        };

        let api_keys = parse_list(&env_or("ADMIN_API_KEYS", ""));
        if auth_mode == AuthMode::ApiKey && api_keys.is_empty() {
            anyhow::bail!("ADMIN_API_KEYS must be set when AUTH_MODE=apikey");
        }

        let provider = match env_or("GEO_PROVIDER", "none").to_lowercase().as_str() {
            "none" => GeoProvider::None,
            "maxmind" => GeoProvider::MaxMind,
            "http" => GeoProvider::Http,
            "static" => GeoProvider::Static,
            other => {
                tracing::warn!(
                    "Unknown GEO_PROVIDER '{other}', falling back to 'none'. Supported values: none, maxmind, http, static"
                );
                GeoProvider::None
            }
        };

        let geoip_db_path = std::env::var("GEOIP_DB_PATH").ok();
        let http_url = std::env::var("GEO_HTTP_URL").ok();
        let static_country = std::env::var("GEO_STATIC_COUNTRY").ok();

        match provider {
            GeoProvider::MaxMind if geoip_db_path.is_none() => {
                anyhow::bail!("GEOIP_DB_PATH must be set when GEO_PROVIDER=maxmind")
            }
            GeoProvider::Http if http_url.is_none() => {
                anyhow::bail!("GEO_HTTP_URL must be set when GEO_PROVIDER=http")
            }
            _ => {}
        }

        let trusted_proxy_mode = match env_or("TRUSTED_PROXY_MODE", "none").to_lowercase().as_str()
        {
            "none" => TrustedProxyMode::None,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            "standard" => TrustedProxyMode::Standard,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, cloudflare, standard"
                );
                TrustedProxyMode::None
            }
        };

        let trusted_proxies = parse_proxies(&env_or("TRUSTED_PROXIES", ""))?;
        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok());

        let defaults = RedirectConfig::default();
        let redirect = RedirectConfig {
            token_secret: std::env::var("FALLBACK_TOKEN_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            token_ttl_secs: env_parse("FALLBACK_TOKEN_TTL_SECS", defaults.token_ttl_secs)?,
            secure_cookies: std::env::var("SECURE_COOKIES")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            tracking_timeout_ms: env_parse("TRACKING_TIMEOUT_MS", defaults.tracking_timeout_ms)?,
        };

        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig {
            max_entries: env_parse("CACHE_MAX_ENTRIES", cache_defaults.max_entries)?,
            ttl_secs: env_parse("CACHE_TTL_SECS", cache_defaults.ttl_secs)?,
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            auth: AuthConfig {
                mode: auth_mode,
                api_keys,
            },
            geo: GeoConfig {
                provider,
                geoip_db_path,
                http_url,
                static_country,
                timeout_ms: env_parse("GEO_TIMEOUT_MS", 2000u64)?,
                trusted_proxy_mode,
                trusted_proxies,
                num_trusted_proxies,
            },
            redirect,
            cache,
        })
    }
}
