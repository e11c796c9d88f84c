use crate::{
    Config,
    client::{demo::DemoClient, live::LiveClient},
    error::ClientError,
    model::{SensorInfo, Station},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::{convert::TryFrom, fmt::Debug};

pub mod demo;
pub mod live;

/// Longest span a single `/historic` request may cover.
pub const MAX_HISTORIC_SPAN_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Live,
    Demo,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Live => "live",
            Mode::Demo => "demo",
        }
    }

    pub const fn all() -> &'static [Mode] {
        &[Mode::Live, Mode::Demo]
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Mode {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "live" => Ok(Mode::Live),
            "demo" => Ok(Mode::Demo),
            _ => Err(anyhow::anyhow!("Unknown mode '{value}'. Supported modes: live, demo.")),
        }
    }
}

/// The WeatherLink v2 endpoints this crate reads from.
///
/// `current` and `historic` return the raw JSON body; feed it to
/// [`crate::normalize`] to get a table.
#[async_trait]
pub trait WeatherLinkApi: Send + Sync + Debug {
    async fn stations(&self) -> Result<Vec<Station>, ClientError>;

    async fn sensors(&self) -> Result<Vec<SensorInfo>, ClientError>;

    async fn sensor(&self, lsid: i64) -> Result<SensorInfo, ClientError>;

    async fn current(&self, station_id: i64) -> Result<Value, ClientError>;

    async fn historic(
        &self,
        station_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Value, ClientError>;

    /// True when the credentials are accepted by the stations endpoint.
    async fn test_connection(&self) -> bool {
        match self.stations().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "connection test failed");
                false
            }
        }
    }

    /// Historic data for the `hours` leading up to now.
    async fn historic_hours_back(&self, station_id: i64, hours: i64) -> Result<Value, ClientError> {
        let end = Utc::now();
        let start = Duration::try_hours(hours)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or(ClientError::InvalidRange {
                start: end.timestamp().saturating_sub(hours.saturating_mul(3600)),
                end: end.timestamp(),
                reason: "hour count out of range",
            })?;
        self.historic(station_id, start, end).await
    }
}

/// Rejects ranges the historic endpoint would refuse.
pub fn check_historic_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ClientError> {
    let (start, end) = (start.timestamp(), end.timestamp());

    if start >= end {
        return Err(ClientError::InvalidRange { start, end, reason: "start must be before end" });
    }
    if end - start > MAX_HISTORIC_SPAN_SECS {
        return Err(ClientError::InvalidRange { start, end, reason: "span exceeds 24 hours" });
    }

    Ok(())
}

/// Construct a client for an explicit mode.
pub fn client_from_config(mode: Mode, config: &Config) -> anyhow::Result<Box<dyn WeatherLinkApi>> {
    let boxed: Box<dyn WeatherLinkApi> = match mode {
        Mode::Demo => Box::new(DemoClient::new()),
        Mode::Live => {
            let creds = config.credentials.as_ref().ok_or_else(|| {
                anyhow::anyhow!(
                    "No API credentials configured.\n\
                     Hint: run `weatherlink configure` or set WEATHERLINK_API_KEY and WEATHERLINK_API_SECRET."
                )
            })?;
            let client = match config.base_url.as_deref() {
                Some(base) => LiveClient::with_base_url(creds.clone(), base)?,
                None => LiveClient::new(creds.clone()),
            };
            Box::new(client)
        }
    };

    Ok(boxed)
}

/// Construct the client for the configured default mode.
pub fn default_client_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherLinkApi>> {
    let mode = config.default_mode()?;
    client_from_config(mode, config)
}
