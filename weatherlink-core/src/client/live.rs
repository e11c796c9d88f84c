use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::Credentials,
    error::ClientError,
    model::{SensorInfo, SensorsBody, Station, StationsBody},
};

use super::{WeatherLinkApi, check_historic_range};

pub const DEFAULT_BASE_URL: &str = "https://api.weatherlink.com/v2";

const API_SECRET_HEADER: &str = "X-Api-Secret";

#[derive(Debug, Clone)]
pub struct LiveClient {
    credentials: Credentials,
    base_url: Url,
    http: Client,
}

impl LiveClient {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            http: Client::new(),
        }
    }

    pub fn with_base_url(credentials: Credentials, base_url: &str) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| anyhow!("Invalid base URL '{base_url}': {e}"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Base URL '{base_url}' cannot carry a path"));
        }

        Ok(Self { credentials, base_url, http: Client::new() })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // with_base_url rejects URLs without path segments
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        extra_query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        tracing::debug!(message = "making WeatherLink request", url = %url);

        let res = self
            .http
            .get(url.clone())
            .query(&[("api-key", self.credentials.api_key.as_str())])
            .query(extra_query)
            .header(API_SECRET_HEADER, self.credentials.api_secret.as_str())
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            tracing::debug!(message = "WeatherLink request failed", url = %url, status = %status);
            return Err(ClientError::Status { status, body: truncate_body(&body) });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl WeatherLinkApi for LiveClient {
    async fn stations(&self) -> Result<Vec<Station>, ClientError> {
        let body: StationsBody = self.get_json(self.endpoint(&["stations"]), &[]).await?;
        Ok(body.stations)
    }

    async fn sensors(&self) -> Result<Vec<SensorInfo>, ClientError> {
        let body: SensorsBody = self.get_json(self.endpoint(&["sensors"]), &[]).await?;
        Ok(body.sensors)
    }

    async fn sensor(&self, lsid: i64) -> Result<SensorInfo, ClientError> {
        let lsid_segment = lsid.to_string();
        let body: SensorsBody =
            self.get_json(self.endpoint(&["sensors", lsid_segment.as_str()]), &[]).await?;

        body.sensors.into_iter().find(|s| s.lsid == lsid).ok_or(ClientError::NotFound(lsid))
    }

    async fn current(&self, station_id: i64) -> Result<Value, ClientError> {
        let station = station_id.to_string();
        self.get_json(self.endpoint(&["current", station.as_str()]), &[]).await
    }

    async fn historic(
        &self,
        station_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Value, ClientError> {
        check_historic_range(start, end)?;

        let station = station_id.to_string();
        let query = [
            ("start-timestamp", start.timestamp().to_string()),
            ("end-timestamp", end.timestamp().to_string()),
        ];
        self.get_json(self.endpoint(&["historic", station.as_str()]), &query).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
