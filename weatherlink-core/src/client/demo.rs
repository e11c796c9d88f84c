use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::ClientError,
    model::{SensorInfo, SensorsBody, Station, StationsBody},
};

use super::{WeatherLinkApi, check_historic_range};

const STATIONS: &str = include_str!("../../demo/stations.json");
const SENSORS: &str = include_str!("../../demo/sensors.json");
const CURRENT: &str = include_str!("../../demo/current.json");
const HISTORIC: &str = include_str!("../../demo/historic.json");

/// Serves canned responses shaped like the real API, so the library can be
/// tried without credentials. The payloads describe one station (id 117) with
/// an ISS, a barometer and an AirLink (lsid 17, sensor type 323).
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoClient;

impl DemoClient {
    pub const STATION_ID: i64 = 117;

    pub fn new() -> Self {
        Self
    }
}

fn canned<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    Ok(serde_json::from_str(body)?)
}

#[async_trait]
impl WeatherLinkApi for DemoClient {
    async fn stations(&self) -> Result<Vec<Station>, ClientError> {
        let body: StationsBody = canned(STATIONS)?;
        Ok(body.stations)
    }

    async fn sensors(&self) -> Result<Vec<SensorInfo>, ClientError> {
        let body: SensorsBody = canned(SENSORS)?;
        Ok(body.sensors)
    }

    async fn sensor(&self, lsid: i64) -> Result<SensorInfo, ClientError> {
        self.sensors()
            .await?
            .into_iter()
            .find(|s| s.lsid == lsid)
            .ok_or(ClientError::NotFound(lsid))
    }

    async fn current(&self, station_id: i64) -> Result<Value, ClientError> {
        tracing::debug!(station_id, "serving canned current conditions");
        canned(CURRENT)
    }

    /// The range is validated like the live endpoint, then ignored: the canned
    /// payload always covers the same hour.
    async fn historic(
        &self,
        station_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Value, ClientError> {
        check_historic_range(start, end)?;
        tracing::debug!(station_id, %start, %end, "serving canned historic data");
        canned(HISTORIC)
    }
}
