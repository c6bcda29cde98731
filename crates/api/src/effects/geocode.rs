//! Geocoding client for the post-creation trigger.
//!
//! Talks to a Nominatim-style search endpoint. Lookups are best-effort:
//! every failure path returns `None` after a log line, and nothing
//! upstream ever waits on the result.

use serde::Deserialize;

/// Timeout for a single geocoding request.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// One result row from a Nominatim-style `/search` response.
///
/// Coordinates arrive as strings in that format.
#[derive(Debug, Deserialize)]
struct GeocodeHit {
    lat: String,
    lon: String,
}

/// Best-effort forward-geocoding client.
pub struct GeocodeClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl GeocodeClient {
    /// Create a client. With `base_url` unset every lookup is a no-op,
    /// which is how deployments without a geocoder run.
    pub fn new(base_url: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build geocoding HTTP client");
        Self { http, base_url }
    }

    /// Resolve an address to `(latitude, longitude)`.
    ///
    /// Returns `None` when the geocoder is not configured, unreachable,
    /// returns no hits, or returns malformed coordinates.
    pub async fn lookup(&self, address: &str) -> Option<(f64, f64)> {
        let base_url = self.base_url.as_ref()?;

        let response = self
            .http
            .get(format!("{base_url}/search"))
            .query(&[("format", "json"), ("limit", "1"), ("q", address)])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "Geocoding request failed");
                return None;
            }
        };

        let hits: Vec<GeocodeHit> = match response.json().await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "Geocoding response was not valid JSON");
                return None;
            }
        };

        let hit = hits.into_iter().next()?;
        match (hit.lat.parse::<f64>(), hit.lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => Some((lat, lon)),
            _ => {
                tracing::warn!("Geocoding response carried malformed coordinates");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_client_is_a_no_op() {
        let client = GeocodeClient::new(None);
        assert!(client.lookup("12 Harbour Street, Rotterdam").await.is_none());
    }
}
