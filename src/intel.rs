use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::IntelConfig;
use crate::models::UNKNOWN_LOCATION;

/// GeoIP lookups against an ip-api.com compatible endpoint
pub struct GeoLocator {
    endpoint: String,
    client: Client,
}

impl GeoLocator {
    pub fn new(config: &IntelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("sn1tch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Display location for `ip`; never fails, falls back to "Unknown"
    pub async fn resolve(&self, ip: &str) -> String {
        match self.lookup(ip).await {
            Ok(location) => location,
            Err(e) => {
                warn!("GeoIP lookup failed for {}: {}", ip, e);
                UNKNOWN_LOCATION.to_string()
            }
        }
    }

    async fn lookup(&self, ip: &str) -> Result<String> {
        let url = format!("{}/{}", self.endpoint, ip);
        let resp: IpApiResponse = self.client.get(&url).send().await?.json().await?;
        debug!("GeoIP response for {}: {:?}", ip, resp);
        Ok(format_location(&resp))
    }
}

#[derive(Debug, Default, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

fn format_location(resp: &IpApiResponse) -> String {
    if resp.status != "success" {
        return UNKNOWN_LOCATION.to_string();
    }

    let city = resp.city.as_deref().unwrap_or_default();
    let country = resp.country.as_deref().unwrap_or_default();

    match (city.is_empty(), country.is_empty()) {
        (false, false) => format!("{}, {}", city, country),
        (_, false) => country.to_string(),
        _ => UNKNOWN_LOCATION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> String {
        format_location(&serde_json::from_str::<IpApiResponse>(json).unwrap())
    }

    #[test]
    fn test_city_and_country() {
        assert_eq!(
            parse(r#"{"status":"success","country":"Germany","city":"Berlin"}"#),
            "Berlin, Germany"
        );
    }

    #[test]
    fn test_country_only() {
        assert_eq!(
            parse(r#"{"status":"success","country":"Germany","city":""}"#),
            "Germany"
        );
        assert_eq!(parse(r#"{"status":"success","country":"Peru"}"#), "Peru");
    }

    #[test]
    fn test_failed_or_empty() {
        assert_eq!(
            parse(r#"{"status":"fail","message":"private range"}"#),
            UNKNOWN_LOCATION
        );
        assert_eq!(parse(r#"{"status":"success","city":"Nowhere"}"#), UNKNOWN_LOCATION);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unknown() {
        let config = IntelConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        };
        let geo = GeoLocator::new(&config).unwrap();
        assert_eq!(geo.resolve("1.2.3.4").await, UNKNOWN_LOCATION);
    }
}
