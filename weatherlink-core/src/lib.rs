//! Core library for the WeatherLink v2 API.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - An async client for the stations / sensors / current / historic endpoints,
//!   with a demo implementation that serves canned responses
//! - The response normalizer that flattens per-sensor readings into a
//!   timestamp-indexed [`WeatherTable`]
//!
//! It is used by `weatherlink-cli`, but can also be reused by other binaries or services.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;

pub use client::{Mode, WeatherLinkApi, client_from_config, default_client_from_config};
pub use config::{Config, Credentials};
pub use error::{ClientError, NormalizeError};
pub use model::{ColumnStats, FieldValue, SensorInfo, Station, WeatherRecord, WeatherTable};
pub use normalize::{MalformedPolicy, Normalizer, normalize, normalize_str};
