//! Visitor geolocation
//!
//! Every locator is infallible from the caller's point of view: a failed
//! lookup yields an empty country rather than an error.

pub mod geoip;
pub mod http;
pub mod ip_extractor;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::{GeoConfig, GeoProvider};

pub use geoip::MaxMindGeoLocator;
pub use http::HttpGeoLocator;
pub use ip_extractor::extract_client_ip;

/// Best-effort location of a visitor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geolocation {
    /// Country display name (not an ISO code); empty when unknown
    pub country: String,
    /// Address as reported by the locator; empty when unknown
    pub ip: String,
}

impl Geolocation {
    pub fn unknown(ip: IpAddr) -> Self {
        Self {
            country: String::new(),
            ip: ip.to_string(),
        }
    }

    /// Country as an optional value for storage, `None` when unknown
    pub fn country_opt(&self) -> Option<String> {
        Some(self.country.trim().to_string()).filter(|c| !c.is_empty())
    }
}

#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn locate(&self, ip: IpAddr) -> Geolocation;
}

/// Locator used when geolocation is disabled
pub struct NoopGeoLocator;

#[async_trait]
impl GeoLocator for NoopGeoLocator {
    async fn locate(&self, ip: IpAddr) -> Geolocation {
        Geolocation::unknown(ip)
    }
}

/// Reports the same country for every address
pub struct StaticGeoLocator {
    country: String,
}

impl StaticGeoLocator {
    pub fn new(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
        }
    }
}

#[async_trait]
impl GeoLocator for StaticGeoLocator {
    async fn locate(&self, ip: IpAddr) -> Geolocation {
        Geolocation {
            country: self.country.clone(),
            ip: ip.to_string(),
        }
    }
}

/// Build the locator selected in configuration
pub fn build_locator(config: &GeoConfig) -> Result<Arc<dyn GeoLocator>> {
    let locator: Arc<dyn GeoLocator> = match config.provider {
        GeoProvider::None => Arc::new(NoopGeoLocator),
        GeoProvider::Static => Arc::new(StaticGeoLocator::new(
            config.static_country.clone().unwrap_or_default(),
        )),
        GeoProvider::MaxMind => Arc::new(MaxMindGeoLocator::new(
            config.geoip_db_path.as_deref().unwrap_or_default(),
        )?),
        GeoProvider::Http => Arc::new(HttpGeoLocator::new(
            config.http_url.as_deref().unwrap_or_default(),
            config.timeout_ms,
        )?),
    };
    Ok(locator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_locator_reports_unknown_country() {
        let ip: IpAddr = "203.0.113.9".parse().unwrap();
        let geo = NoopGeoLocator.locate(ip).await;
        assert_eq!(geo.country, "");
        assert_eq!(geo.ip, "203.0.113.9");
        assert_eq!(geo.country_opt(), None);
    }

    #[tokio::test]
    async fn test_static_locator() {
        let ip: IpAddr = "203.0.113.9".parse().unwrap();
        let geo = StaticGeoLocator::new("France").locate(ip).await;
        assert_eq!(geo.country_opt().as_deref(), Some("France"));
    }

    #[test]
    fn test_build_locator_requires_a_readable_database() {
        let mut config = GeoConfig::disabled();
        config.provider = GeoProvider::MaxMind;
        config.geoip_db_path = Some("/nonexistent/GeoLite2-City.mmdb".to_string());
        assert!(build_locator(&config).is_err());
    }
}
