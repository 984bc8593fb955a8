use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::net::IpAddr;
use std::time::Duration;
use tracing::warn;

use super::{GeoLocator, Geolocation};

/// Geolocation through an external IP-to-country JSON service.
///
/// The URL template may contain `{ip}`, replaced by the client address.
/// The response is expected to carry `country_name` (or `country`) and `ip`.
#[derive(Clone)]
pub struct HttpGeoLocator {
    client: Client,
    url_template: String,
}

impl HttpGeoLocator {
    pub fn new(url_template: &str, timeout_ms: u64) -> Result<Self> {
        if url_template.trim().is_empty() {
            anyhow::bail!("geolocation URL template is empty");
        }

        let client = Client::builder()
            .user_agent(concat!("detour-geo/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(timeout_ms.max(1)))
            .build()
            .context("failed to build HTTP client for geolocation")?;

        Ok(Self {
            client,
            url_template: url_template.trim().to_string(),
        })
    }

    fn url_for(&self, ip: IpAddr) -> String {
        self.url_template.replace("{ip}", &ip.to_string())
    }

    async fn fetch(&self, ip: IpAddr) -> Result<Value> {
        let response = self
            .client
            .get(self.url_for(ip))
            .send()
            .await
            .context("geolocation request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("geolocation service returned {}", response.status());
        }

        response
            .json::<Value>()
            .await
            .context("geolocation response was not JSON")
    }
}

/// Pull the country name and address out of a lookup response
fn parse_response(body: &Value) -> Geolocation {
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Geolocation {
        country: field("country_name").or_else(|| field("country")).unwrap_or_default(),
        ip: field("ip").unwrap_or_default(),
    }
}

#[async_trait]
impl GeoLocator for HttpGeoLocator {
    async fn locate(&self, ip: IpAddr) -> Geolocation {
        match self.fetch(ip).await {
            Ok(body) => {
                let mut geo = parse_response(&body);
                if geo.ip.is_empty() {
                    geo.ip = ip.to_string();
                }
                geo
            }
            Err(err) => {
                warn!(%ip, error = %err, "geolocation lookup failed");
                Geolocation::unknown(ip)
            }
        }
    }
}
