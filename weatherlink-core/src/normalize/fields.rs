//! Canonical names and unit conversions for WeatherLink data fields.
//!
//! The vendor reports imperial units; canonical names carry the metric unit
//! the value is converted to. The table is keyed by raw field name only, so
//! the same rule applies whatever sensor type produced the field. Every
//! canonical name has exactly one source, so no reading can shadow another.

/// Maps one raw field to its canonical name.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub source: &'static str,
    pub canonical: &'static str,
    pub convert: Option<fn(f64) -> f64>,
}

const fn rule(source: &'static str, canonical: &'static str) -> FieldRule {
    FieldRule { source, canonical, convert: None }
}

const fn conv(source: &'static str, canonical: &'static str, f: fn(f64) -> f64) -> FieldRule {
    FieldRule { source, canonical, convert: Some(f) }
}

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

pub fn mph_to_ms(mph: f64) -> f64 {
    mph * 0.44704
}

pub fn inhg_to_hpa(inhg: f64) -> f64 {
    inhg * 33.863_886
}

pub fn inches_to_mm(inches: f64) -> f64 {
    inches * 25.4
}

pub static FIELD_RULES: &[FieldRule] = &[
    // Temperature
    conv("temp", "temperature_c", fahrenheit_to_celsius),
    conv("temp_out", "temperature_out_c", fahrenheit_to_celsius),
    conv("temp_in", "temperature_indoor_c", fahrenheit_to_celsius),
    conv("temp_avg", "temperature_avg_c", fahrenheit_to_celsius),
    conv("temp_hi", "temperature_high_c", fahrenheit_to_celsius),
    conv("temp_lo", "temperature_low_c", fahrenheit_to_celsius),
    conv("temp_last", "temperature_last_c", fahrenheit_to_celsius),
    conv("dew_point", "dew_point_c", fahrenheit_to_celsius),
    conv("dew_point_last", "dew_point_last_c", fahrenheit_to_celsius),
    conv("wet_bulb", "wet_bulb_c", fahrenheit_to_celsius),
    conv("wet_bulb_last", "wet_bulb_last_c", fahrenheit_to_celsius),
    conv("heat_index", "heat_index_c", fahrenheit_to_celsius),
    conv("heat_index_last", "heat_index_last_c", fahrenheit_to_celsius),
    conv("wind_chill", "wind_chill_c", fahrenheit_to_celsius),
    conv("thw_index", "thw_index_c", fahrenheit_to_celsius),
    conv("thsw_index", "thsw_index_c", fahrenheit_to_celsius),
    // Humidity
    rule("hum", "humidity_pct"),
    rule("hum_out", "humidity_out_pct"),
    rule("hum_in", "humidity_indoor_pct"),
    rule("hum_last", "humidity_last_pct"),
    rule("hum_hi", "humidity_high_pct"),
    rule("hum_lo", "humidity_low_pct"),
    // Particulates
    rule("pm_1", "pm1_ugm3"),
    rule("pm_2p5", "pm25_ugm3"),
    rule("pm_10", "pm10_ugm3"),
    rule("pm_1_avg", "pm1_avg_ugm3"),
    rule("pm_2p5_avg", "pm25_avg_ugm3"),
    rule("pm_10_avg", "pm10_avg_ugm3"),
    rule("pm_1_last", "pm1_last_ugm3"),
    rule("pm_2p5_last", "pm25_last_ugm3"),
    rule("pm_10_last", "pm10_last_ugm3"),
    rule("pm_2p5_last_1_hour", "pm25_1h_ugm3"),
    rule("pm_2p5_nowcast", "pm25_nowcast_ugm3"),
    rule("pm_10_nowcast", "pm10_nowcast_ugm3"),
    rule("aqi_val", "aqi"),
    rule("aqi_avg_val", "aqi_avg"),
    rule("aqi_nowcast_val", "aqi_nowcast"),
    // Wind
    conv("wind_speed", "wind_speed_ms", mph_to_ms),
    conv("wind_speed_last", "wind_speed_last_ms", mph_to_ms),
    conv("wind_speed_avg", "wind_speed_avg_ms", mph_to_ms),
    conv("wind_speed_hi", "wind_speed_high_ms", mph_to_ms),
    conv("wind_speed_avg_last_10_min", "wind_speed_avg_10min_ms", mph_to_ms),
    conv("wind_speed_hi_last_10_min", "wind_gust_10min_ms", mph_to_ms),
    rule("wind_dir", "wind_dir_deg"),
    rule("wind_dir_last", "wind_dir_last_deg"),
    rule("wind_dir_of_prevail", "wind_dir_prevail_deg"),
    // Pressure
    conv("bar", "pressure_hpa", inhg_to_hpa),
    conv("bar_sea_level", "pressure_sea_level_hpa", inhg_to_hpa),
    conv("bar_absolute", "pressure_absolute_hpa", inhg_to_hpa),
    conv("bar_trend", "pressure_trend_hpa", inhg_to_hpa),
    // Rain
    rule("rainfall_mm", "rainfall_mm"),
    conv("rainfall_in", "rainfall_from_in_mm", inches_to_mm),
    rule("rain_rate_hi_mm", "rain_rate_high_mmh"),
    conv("rain_rate_hi_in", "rain_rate_high_from_in_mmh", inches_to_mm),
    rule("rain_rate_last_mm", "rain_rate_mmh"),
    conv("rain_rate_last_in", "rain_rate_from_in_mmh", inches_to_mm),
    rule("rainfall_daily_mm", "rainfall_daily_mm"),
    conv("rainfall_daily_in", "rainfall_daily_from_in_mm", inches_to_mm),
    // Solar
    rule("solar_rad", "solar_radiation_wm2"),
    rule("solar_rad_avg", "solar_radiation_avg_wm2"),
    rule("uv_index", "uv_index"),
    rule("uv_index_avg", "uv_index_avg"),
];

/// Looks up the rule for a raw field name.
pub fn rule_for(source: &str) -> Option<&'static FieldRule> {
    FIELD_RULES.iter().find(|r| r.source == source)
}
