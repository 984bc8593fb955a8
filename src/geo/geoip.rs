//! GeoIP lookup using a MaxMind GeoLite2/GeoIP2 MMDB
//!
//! The database is memory-mapped once and shared across requests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

use super::{GeoLocator, Geolocation};

/// Country lookup backed by a City or Country database
#[derive(Clone)]
pub struct MaxMindGeoLocator {
    reader: Arc<Reader<Mmap>>,
}

impl MaxMindGeoLocator {
    /// Open a GeoLite2-City or GeoLite2-Country .mmdb file
    pub fn new(path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(path) }
            .with_context(|| format!("Failed to open GeoIP database at {}", path))?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// English country name for an address, if the database knows it
    pub fn country_name(&self, ip: IpAddr) -> Option<String> {
        let result = self.reader.lookup(ip).ok()?;

        // Country data decodes from both City and Country databases
        match result.decode::<geoip2::Country>() {
            Ok(Some(country)) => country.country.names.english.map(|s| s.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl GeoLocator for MaxMindGeoLocator {
    async fn locate(&self, ip: IpAddr) -> Geolocation {
        Geolocation {
            country: self.country_name(ip).unwrap_or_default(),
            ip: ip.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geoip_creation_invalid_path() {
        let result = MaxMindGeoLocator::new("/nonexistent/path.mmdb");
        assert!(result.is_err());
    }
}
