use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A weather station as listed by `/stations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub station_id: i64,
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub active: Option<bool>,

    /// Vendor fields without a typed counterpart.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Sensor metadata as listed by `/sensors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorInfo {
    pub lsid: i64,
    pub sensor_type: i64,
    #[serde(default)]
    pub station_id: Option<i64>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StationsBody {
    #[serde(default)]
    pub stations: Vec<Station>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SensorsBody {
    #[serde(default)]
    pub sensors: Vec<SensorInfo>,
}

/// One cell of a normalized row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl FieldValue {
    /// Numeric view of the value; text and booleans have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(_) | FieldValue::Bool(_) => None,
        }
    }

    /// Converts a JSON scalar. `null`, arrays and objects have no cell form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(FieldValue::Integer)
                .or_else(|| n.as_f64().map(FieldValue::Float)),
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v:.2}"),
            FieldValue::Text(v) => f.write_str(v),
            FieldValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// One normalized row: a data point plus the identity of its sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRecord {
    pub timestamp: DateTime<Utc>,
    pub lsid: i64,
    pub sensor_type: i64,
    pub station_id: Option<i64>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl WeatherRecord {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// Summary of the numeric values of one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Rows indexed by timestamp, in the order they were produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeatherTable {
    rows: Vec<WeatherRecord>,
}

impl WeatherTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: WeatherRecord) {
        self.rows.push(record);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[WeatherRecord] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<WeatherRecord> {
        self.rows
    }

    /// The primary index: one timestamp per row.
    pub fn index(&self) -> Vec<DateTime<Utc>> {
        self.rows.iter().map(|r| r.timestamp).collect()
    }

    /// Union of field names across all rows, sorted.
    pub fn columns(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.rows.iter().flat_map(|r| r.fields.keys()).collect();
        names.into_iter().cloned().collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.rows.iter().any(|r| r.fields.contains_key(name))
    }

    /// One entry per row; `None` where the row lacks the field.
    pub fn column(&self, name: &str) -> Vec<Option<&FieldValue>> {
        self.rows.iter().map(|r| r.fields.get(name)).collect()
    }

    /// Earliest and latest timestamp, or `None` for an empty table.
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let min = self.rows.iter().map(|r| r.timestamp).min()?;
        let max = self.rows.iter().map(|r| r.timestamp).max()?;
        Some((min, max))
    }

    /// Stats over the numeric, non-missing values of a column.
    pub fn column_stats(&self, name: &str) -> Option<ColumnStats> {
        let values: Vec<f64> = self
            .rows
            .iter()
            .filter_map(|r| r.fields.get(name).and_then(FieldValue::as_f64))
            .collect();

        if values.is_empty() {
            return None;
        }

        let sum: f64 = values.iter().sum();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(ColumnStats { count: values.len(), mean: sum / values.len() as f64, min, max })
    }

    /// Stable sort by timestamp; rows with equal timestamps keep their order.
    pub fn sort_by_timestamp(&mut self) {
        self.rows.sort_by_key(|r| r.timestamp);
    }
}

impl IntoIterator for WeatherTable {
    type Item = WeatherRecord;
    type IntoIter = std::vec::IntoIter<WeatherRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a WeatherTable {
    type Item = &'a WeatherRecord;
    type IntoIter = std::slice::Iter<'a, WeatherRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
