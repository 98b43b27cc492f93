//! HTTP client for the track API.
//!
//! - `GET /api/ids` lists the available track ids
//! - `GET /api/data/{id}` returns one track's samples in timestamp order
//!
//! Failures are reported once and never retried; the caller keeps showing
//! whatever it had before.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::{ReplayError, Result};
use crate::session::ReplaySession;
use crate::store::{LoadOutcome, LoadTicket};
use crate::trail::TrailRenderer;
use crate::{Sample, TrackId};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches track ids and samples from a viewer backend.
#[derive(Debug, Clone)]
pub struct TrackClient {
    client: Client,
    base_url: String,
}

impl TrackClient {
    /// Create a client for the backend at `base_url`, e.g. `http://localhost:9999`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ReplayError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/ids`
    pub async fn fetch_ids(&self) -> Result<Vec<TrackId>> {
        let ids: Vec<TrackId> = self.get_json("/api/ids").await?;
        info!("[TrackClient] {} track ids available", ids.len());
        Ok(ids)
    }

    /// `GET /api/data/{id}`. Samples are returned in server order.
    pub async fn fetch_track(&self, id: &TrackId) -> Result<Vec<Sample>> {
        let start = Instant::now();
        let samples: Vec<Sample> = self.get_json(&format!("/api/data/{}", id)).await?;
        info!(
            "[TrackClient] track {}: {} samples in {:.2}s",
            id,
            samples.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(samples)
    }

    /// Fetch the track for `ticket` and hand the result to `session`.
    pub async fn load_into<R: TrailRenderer>(
        &self,
        session: &mut ReplaySession<R>,
        ticket: LoadTicket,
    ) -> LoadOutcome {
        let result = self.fetch_track(ticket.id()).await;
        session.complete_load(ticket, result)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[TrackClient] GET {}", url);

        let resp = self.client.get(&url).send().await.map_err(|e| {
            warn!("[TrackClient] request to {} failed: {}", url, e);
            ReplayError::Network {
                message: format!("Request error: {}", e),
                status_code: e.status().map(|s| s.as_u16()),
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!("[TrackClient] {} answered {}", url, status);
            return Err(ReplayError::Network {
                message: format!("HTTP {}", status),
                status_code: Some(status.as_u16()),
            });
        }

        resp.json::<T>().await.map_err(|e| ReplayError::Parse {
            message: format!("{}: {}", url, e),
        })
    }
}
