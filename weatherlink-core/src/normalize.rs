//! Flattens WeatherLink `current` / `historic` responses into a [`WeatherTable`].
//!
//! A response carries a `sensors` array; each sensor has an `lsid`, a
//! `sensor_type` and a `data` array of time-stamped points whose other fields
//! depend on the sensor type. Every point becomes one [`WeatherRecord`].

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{
    error::NormalizeError,
    model::{FieldValue, WeatherRecord, WeatherTable},
};

pub mod fields;

/// What to do with a sensor entry that does not have the expected shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Fail the whole call; no partial table is returned.
    #[default]
    Abort,
    /// Drop the entry, log a warning and keep going.
    Skip,
}

/// Filters and policy for one normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalizer {
    pub sensor_type: Option<i64>,
    pub station_id: Option<i64>,
    pub on_malformed: MalformedPolicy,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sensor_type(mut self, sensor_type: i64) -> Self {
        self.sensor_type = Some(sensor_type);
        self
    }

    pub fn station_id(mut self, station_id: i64) -> Self {
        self.station_id = Some(station_id);
        self
    }

    pub fn on_malformed(mut self, policy: MalformedPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    pub fn normalize(&self, response: &Value) -> Result<WeatherTable, NormalizeError> {
        let top = response
            .as_object()
            .ok_or_else(|| NormalizeError::malformed("top-level response is not an object"))?;

        let sensors = match top.get("sensors") {
            None | Some(Value::Null) => return Ok(WeatherTable::new()),
            Some(Value::Array(sensors)) => sensors,
            Some(_) => return Err(NormalizeError::malformed("`sensors` is not an array")),
        };

        let response_station = match top.get("station_id") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                as_int(v).ok_or_else(|| NormalizeError::malformed("`station_id` is not an integer"))?,
            ),
        };

        let mut table = WeatherTable::new();

        for (idx, entry) in sensors.iter().enumerate() {
            let reading = match SensorReading::parse(entry) {
                Ok(reading) => reading,
                Err(e) => match self.on_malformed {
                    MalformedPolicy::Abort => {
                        return Err(NormalizeError::malformed(format!("sensor #{idx}: {e}")));
                    }
                    MalformedPolicy::Skip => {
                        tracing::warn!(index = idx, error = %e, "skipping malformed sensor entry");
                        continue;
                    }
                },
            };

            let station_id = reading.station_id.or(response_station);
            if !self.accepts(reading.sensor_type, station_id) {
                continue;
            }

            for point in reading.points {
                table.push(WeatherRecord {
                    timestamp: point.timestamp,
                    lsid: reading.lsid,
                    sensor_type: reading.sensor_type,
                    station_id,
                    fields: point.fields,
                });
            }
        }

        tracing::debug!(
            rows = table.len(),
            sensor_type = ?self.sensor_type,
            station_id = ?self.station_id,
            "normalized response"
        );

        Ok(table)
    }

    pub fn normalize_str(&self, body: &str) -> Result<WeatherTable, NormalizeError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| NormalizeError::malformed(format!("invalid JSON: {e}")))?;
        self.normalize(&value)
    }

    fn accepts(&self, sensor_type: i64, station_id: Option<i64>) -> bool {
        if self.sensor_type.is_some_and(|wanted| wanted != sensor_type) {
            return false;
        }
        // A filter can only exclude entries that say which station they belong to.
        match (self.station_id, station_id) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }
}

/// Normalizes `response`, aborting on the first malformed sensor entry.
pub fn normalize(
    response: &Value,
    sensor_type: Option<i64>,
    station_id: Option<i64>,
) -> Result<WeatherTable, NormalizeError> {
    Normalizer { sensor_type, station_id, on_malformed: MalformedPolicy::Abort }.normalize(response)
}

/// Same as [`normalize`] for a raw JSON body.
pub fn normalize_str(
    body: &str,
    sensor_type: Option<i64>,
    station_id: Option<i64>,
) -> Result<WeatherTable, NormalizeError> {
    Normalizer { sensor_type, station_id, on_malformed: MalformedPolicy::Abort }.normalize_str(body)
}

struct SensorReading {
    lsid: i64,
    sensor_type: i64,
    station_id: Option<i64>,
    points: Vec<DataPoint>,
}

struct DataPoint {
    timestamp: DateTime<Utc>,
    fields: BTreeMap<String, FieldValue>,
}

impl SensorReading {
    fn parse(entry: &Value) -> Result<Self, String> {
        let obj = entry.as_object().ok_or("entry is not an object")?;

        let lsid = required_int(obj, "lsid")?;
        let sensor_type = required_int(obj, "sensor_type")?;
        let station_id = match obj.get("station_id") {
            None | Some(Value::Null) => None,
            Some(v) => Some(as_int(v).ok_or("`station_id` is not an integer")?),
        };

        let data = match obj.get("data") {
            Some(Value::Array(data)) => data.as_slice(),
            Some(Value::Null) => &[][..],
            Some(_) => return Err("`data` is not an array".to_string()),
            None => return Err("missing `data`".to_string()),
        };

        let points = data
            .iter()
            .enumerate()
            .map(|(i, p)| DataPoint::parse(p).map_err(|e| format!("data point #{i}: {e}")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { lsid, sensor_type, station_id, points })
    }
}

impl DataPoint {
    fn parse(point: &Value) -> Result<Self, String> {
        let obj = point.as_object().ok_or("not an object")?;

        let ts = required_int(obj, "ts")?;
        let timestamp =
            DateTime::from_timestamp(ts, 0).ok_or_else(|| format!("`ts` {ts} is out of range"))?;

        let mut values = BTreeMap::new();

        // Unmapped fields first so a mapped value wins on a name clash.
        for (name, raw) in obj.iter().filter(|(name, _)| name.as_str() != "ts") {
            if fields::rule_for(name).is_none() {
                if let Some(value) = FieldValue::from_json(raw) {
                    values.insert(name.clone(), value);
                }
            }
        }

        for (name, raw) in obj {
            let Some(rule) = fields::rule_for(name) else {
                continue;
            };
            let Some(value) = FieldValue::from_json(raw) else {
                continue;
            };
            let value = match rule.convert {
                None => value,
                Some(convert) => match numeric(&value) {
                    Some(v) => FieldValue::Float(convert(v)),
                    None => {
                        // Not a number, so the canonical unit does not apply.
                        values.insert(name.clone(), value);
                        continue;
                    }
                },
            };
            values.insert(rule.canonical.to_string(), value);
        }

        Ok(Self { timestamp, fields: values })
    }
}

/// Numbers, and strings that hold one.
fn numeric(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Text(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    }
}

fn required_int(obj: &Map<String, Value>, key: &str) -> Result<i64, String> {
    let value = obj.get(key).ok_or_else(|| format!("missing `{key}`"))?;
    as_int(value).ok_or_else(|| format!("`{key}` is not an integer"))
}

/// Integers, integral floats and numeric strings all count as integers.
fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64).map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn airlink_response() -> Value {
        json!({
            "station_id": 17,
            "sensors": [
                {
                    "lsid": 17,
                    "sensor_type": 323,
                    "data": [
                        { "ts": 1700000000, "pm_2p5": 5.2 },
                        { "ts": 1700000060, "pm_2p5": 6.1 }
                    ]
                }
            ]
        })
    }

    fn mixed_response() -> Value {
        json!({
            "station_id": 17,
            "sensors": [
                {
                    "lsid": 100,
                    "sensor_type": 45,
                    "data": [
                        { "ts": 1700000120, "temp_out": 50.0, "hum_out": 80 },
                        { "ts": 1700000000, "temp_out": 51.8, "hum_out": 81 },
                        { "ts": 1700000060, "temp_out": 53.6 }
                    ]
                },
                {
                    "lsid": 200,
                    "sensor_type": 323,
                    "data": [
                        { "ts": 1700000030, "pm_2p5": 4.0, "pm_10": 9 }
                    ]
                },
                {
                    "lsid": 300,
                    "sensor_type": 242,
                    "data": []
                }
            ]
        })
    }

    fn f(table: &WeatherTable, column: &str) -> Vec<Option<f64>> {
        table.column(column).into_iter().map(|v| v.and_then(FieldValue::as_f64)).collect()
    }

    #[test]
    fn airlink_example_rows() {
        let table = normalize(&airlink_response(), Some(323), None).expect("valid response");

        assert_eq!(table.len(), 2);
        let index: Vec<i64> = table.index().iter().map(|t| t.timestamp()).collect();
        assert_eq!(index, vec![1700000000, 1700000060]);

        for row in table.rows() {
            assert_eq!(row.lsid, 17);
            assert_eq!(row.sensor_type, 323);
            assert_eq!(row.station_id, Some(17));
            assert!(row.get("pm_2p5").is_none());
            assert!(row.get("ts").is_none());
        }
        assert_eq!(f(&table, "pm25_ugm3"), vec![Some(5.2), Some(6.1)]);
    }

    #[test]
    fn row_count_is_sum_of_retained_points() {
        let table = normalize(&mixed_response(), None, None).expect("valid response");
        assert_eq!(table.len(), 4);

        let table = normalize(&mixed_response(), Some(45), None).expect("valid response");
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn sensor_type_filter_keeps_only_that_type() {
        let table = normalize(&mixed_response(), Some(323), None).expect("valid response");

        assert_eq!(table.len(), 1);
        assert!(table.rows().iter().all(|r| r.sensor_type == 323));
    }

    #[test]
    fn unknown_sensor_type_yields_empty_table() {
        let table = normalize(&mixed_response(), Some(9999), None).expect("no error");
        assert!(table.is_empty());
    }

    #[test]
    fn empty_inputs_yield_empty_table() {
        assert!(normalize(&json!({}), None, None).expect("no error").is_empty());
        assert!(normalize(&json!({ "sensors": [] }), None, None).expect("no error").is_empty());
        assert!(normalize(&json!({ "sensors": null }), None, None).expect("no error").is_empty());
        assert!(
            normalize(&json!({ "sensors": [{ "lsid": 1, "sensor_type": 2, "data": [] }] }), None, None)
                .expect("no error")
                .is_empty()
        );
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let n = Normalizer::new().sensor_type(45).station_id(17);
        let a = n.normalize(&mixed_response()).expect("valid response");
        let b = n.normalize(&mixed_response()).expect("valid response");
        assert_eq!(a, b);
    }

    #[test]
    fn unmapped_fields_pass_through_unchanged() {
        let response = json!({
            "sensors": [{
                "lsid": 1,
                "sensor_type": 323,
                "data": [{ "ts": 1700000000, "pct_pm_data_last_1_hour": 100, "label": "north", "pm_2p5": 1.5 }]
            }]
        });

        let table = normalize(&response, None, None).expect("valid response");
        let row = &table.rows()[0];
        assert_eq!(row.get("pct_pm_data_last_1_hour"), Some(&FieldValue::Integer(100)));
        assert_eq!(row.get("label"), Some(&FieldValue::Text("north".into())));
    }

    #[test]
    fn imperial_fields_are_converted() {
        let response = json!({
            "sensors": [{
                "lsid": 1,
                "sensor_type": 45,
                "data": [{ "ts": 1700000000, "temp": 212.0, "wind_speed_avg": 10, "hum": 55 }]
            }]
        });

        let table = normalize(&response, None, None).expect("valid response");
        let row = &table.rows()[0];

        let temp = row.get("temperature_c").and_then(FieldValue::as_f64).expect("temperature");
        assert!((temp - 100.0).abs() < 1e-9);
        let wind = row.get("wind_speed_avg_ms").and_then(FieldValue::as_f64).expect("wind");
        assert!((wind - 4.4704).abs() < 1e-9);
        assert_eq!(row.get("humidity_pct"), Some(&FieldValue::Integer(55)));
    }

    #[test]
    fn null_and_missing_fields_are_absent() {
        let response = json!({
            "sensors": [{
                "lsid": 1,
                "sensor_type": 45,
                "data": [
                    { "ts": 1700000000, "temp": null, "hum": 40 },
                    { "ts": 1700000060, "temp": 50.0 }
                ]
            }]
        });

        let table = normalize(&response, None, None).expect("valid response");
        assert!(table.rows()[0].get("temperature_c").is_none());
        assert!(table.rows()[1].get("humidity_pct").is_none());
        assert_eq!(table.column("humidity_pct")[0], Some(&FieldValue::Integer(40)));
    }

    #[test]
    fn mapped_value_wins_over_clashing_passthrough() {
        let response = json!({
            "sensors": [{
                "lsid": 1,
                "sensor_type": 45,
                "data": [{ "ts": 1700000000, "temperature_c": "stale", "temp": 32.0 }]
            }]
        });

        let table = normalize(&response, None, None).expect("valid response");
        assert_eq!(table.rows()[0].get("temperature_c"), Some(&FieldValue::Float(0.0)));
    }

    #[test]
    fn sibling_fields_keep_separate_columns() {
        let response = json!({
            "sensors": [{
                "lsid": 1,
                "sensor_type": 45,
                "data": [{
                    "ts": 1700000000,
                    "temp": 212.0,
                    "temp_out": 32.0,
                    "hum": 10,
                    "hum_out": 90,
                    "rainfall_mm": 0.4,
                    "rainfall_in": 1.0
                }]
            }]
        });

        let table = normalize(&response, None, None).expect("valid response");
        let row = &table.rows()[0];

        assert_eq!(row.fields.len(), 6);
        assert_eq!(row.get("temperature_c"), Some(&FieldValue::Float(100.0)));
        assert_eq!(row.get("temperature_out_c"), Some(&FieldValue::Float(0.0)));
        assert_eq!(row.get("humidity_pct"), Some(&FieldValue::Integer(10)));
        assert_eq!(row.get("humidity_out_pct"), Some(&FieldValue::Integer(90)));
        assert_eq!(row.get("rainfall_mm"), Some(&FieldValue::Float(0.4)));
        assert_eq!(row.get("rainfall_from_in_mm"), Some(&FieldValue::Float(25.4)));
    }

    #[test]
    fn numeric_text_is_converted_and_other_text_keeps_raw_name() {
        let response = json!({
            "sensors": [{
                "lsid": 1,
                "sensor_type": 45,
                "data": [
                    { "ts": 1700000000, "temp": " 50 " },
                    { "ts": 1700000060, "temp": "--", "bar": true }
                ]
            }]
        });

        let table = normalize(&response, None, None).expect("valid response");

        let converted = table.rows()[0].get("temperature_c").and_then(FieldValue::as_f64);
        assert!((converted.expect("converted") - 10.0).abs() < 1e-9);

        let row = &table.rows()[1];
        assert!(row.get("temperature_c").is_none());
        assert!(row.get("pressure_hpa").is_none());
        assert_eq!(row.get("temp"), Some(&FieldValue::Text("--".into())));
        assert_eq!(row.get("bar"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn rows_keep_response_order() {
        let table = normalize(&mixed_response(), None, None).expect("valid response");
        let index: Vec<i64> = table.index().iter().map(|t| t.timestamp()).collect();

        // Per-sensor point order, sensors in response order; no global sort.
        assert_eq!(index, vec![1700000120, 1700000000, 1700000060, 1700000030]);

        let mut sorted = table.clone();
        sorted.sort_by_timestamp();
        let index: Vec<i64> = sorted.index().iter().map(|t| t.timestamp()).collect();
        assert_eq!(index, vec![1700000000, 1700000030, 1700000060, 1700000120]);
        assert_ne!(table, sorted);
    }

    #[test]
    fn station_filter_uses_entry_then_response_station() {
        let response = json!({
            "station_id": 17,
            "sensors": [
                { "lsid": 1, "sensor_type": 45, "data": [{ "ts": 1700000000 }] },
                { "lsid": 2, "sensor_type": 45, "station_id": 99, "data": [{ "ts": 1700000000 }] }
            ]
        });

        let table = normalize(&response, None, Some(17)).expect("valid response");
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].lsid, 1);

        let table = normalize(&response, None, Some(99)).expect("valid response");
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].lsid, 2);

        let table = normalize(&response, None, Some(5)).expect("valid response");
        assert!(table.is_empty());
    }

    #[test]
    fn station_filter_without_station_information_keeps_rows() {
        let response = json!({
            "sensors": [{ "lsid": 1, "sensor_type": 45, "data": [{ "ts": 1700000000 }] }]
        });

        let table = normalize(&response, None, Some(17)).expect("valid response");
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].station_id, None);
    }

    #[test]
    fn numeric_strings_are_recovered() {
        let response = json!({
            "sensors": [{ "lsid": "17", "sensor_type": "323", "data": [{ "ts": "1700000000" }] }]
        });

        let table = normalize(&response, Some(323), None).expect("recoverable response");
        assert_eq!(table.rows()[0].lsid, 17);
        assert_eq!(table.index()[0].timestamp(), 1700000000);
    }

    #[test]
    fn non_object_top_level_is_malformed() {
        for bad in [json!([]), json!(42), json!("sensors"), Value::Null] {
            let err = normalize(&bad, None, None).unwrap_err();
            assert!(matches!(err, NormalizeError::MalformedResponse { .. }));
        }

        let err = normalize(&json!({ "sensors": {} }), None, None).unwrap_err();
        assert!(err.to_string().contains("`sensors` is not an array"));
    }

    #[test]
    fn invalid_json_body_is_malformed() {
        let err = normalize_str("{not json", None, None).unwrap_err();
        assert!(err.to_string().starts_with("malformed response: invalid JSON"));

        let table = normalize_str(r#"{"sensors": []}"#, None, None).expect("valid body");
        assert!(table.is_empty());
    }

    fn response_with_bad_entry() -> Value {
        json!({
            "sensors": [
                { "lsid": 1, "sensor_type": 323, "data": [{ "ts": 1700000000, "pm_2p5": 1.0 }] },
                { "lsid": 2, "data": [{ "ts": 1700000000 }] },
                { "lsid": 3, "sensor_type": 323, "data": [{ "ts": 1700000060, "pm_2p5": 2.0 }] }
            ]
        })
    }

    #[test]
    fn malformed_entry_aborts_by_default() {
        let err = normalize(&response_with_bad_entry(), None, None).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::MalformedResponse { reason: "sensor #1: missing `sensor_type`".into() }
        );

        // The filter does not hide the bad entry.
        assert!(normalize(&response_with_bad_entry(), Some(323), None).is_err());
    }

    #[test]
    fn malformed_entry_is_dropped_when_skipping() {
        let table = Normalizer::new()
            .on_malformed(MalformedPolicy::Skip)
            .normalize(&response_with_bad_entry())
            .expect("bad entry skipped");

        let lsids: Vec<i64> = table.rows().iter().map(|r| r.lsid).collect();
        assert_eq!(lsids, vec![1, 3]);
    }

    #[test]
    fn bad_data_points_make_the_entry_malformed() {
        for data in [json!([{ "pm_2p5": 1.0 }]), json!([5]), json!({ "ts": 1 }), json!([{ "ts": "soon" }])] {
            let response = json!({ "sensors": [{ "lsid": 1, "sensor_type": 323, "data": data }] });
            assert!(normalize(&response, None, None).is_err(), "accepted {response}");
        }

        let response = json!({ "sensors": [{ "lsid": 1, "sensor_type": 323 }] });
        let err = normalize(&response, None, None).unwrap_err();
        assert!(err.to_string().contains("missing `data`"));
    }

    #[test]
    fn null_data_counts_as_empty() {
        let response = json!({ "sensors": [{ "lsid": 1, "sensor_type": 323, "data": null }] });
        assert!(normalize(&response, None, None).expect("valid response").is_empty());
    }
}
