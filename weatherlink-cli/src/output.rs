use std::collections::BTreeMap;

use weatherlink_core::{SensorInfo, Station, WeatherTable};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Columns summarized after a table, with their display label and unit.
const SUMMARY_COLUMNS: &[(&str, &str, &str)] = &[
    ("temperature_c", "Temperature", "°C"),
    ("temperature_out_c", "Outdoor temperature", "°C"),
    ("temperature_avg_c", "Temperature (avg)", "°C"),
    ("humidity_pct", "Humidity", "%"),
    ("humidity_out_pct", "Outdoor humidity", "%"),
    ("pm25_ugm3", "PM2.5", "μg/m³"),
    ("pm25_avg_ugm3", "PM2.5 (avg)", "μg/m³"),
];

pub fn print_stations(stations: &[Station]) {
    println!("Found {} station(s)", stations.len());
    for s in stations {
        let name = s.station_name.as_deref().unwrap_or("Unnamed");
        let place = match (s.city.as_deref(), s.region.as_deref()) {
            (Some(city), Some(region)) => format!(" ({city}, {region})"),
            (Some(city), None) => format!(" ({city})"),
            _ => String::new(),
        };
        println!("  {:>8}  {name}{place}", s.station_id);
    }
}

pub fn print_sensors(sensors: &[SensorInfo]) {
    println!("Found {} sensor(s)", sensors.len());
    for s in sensors {
        println!("  lsid {:>8}  type {:>4}  {}", s.lsid, s.sensor_type, product(s));
    }
}

pub fn print_sensors_by_type(sensors: &[SensorInfo]) {
    let mut by_type: BTreeMap<i64, Vec<&SensorInfo>> = BTreeMap::new();
    for s in sensors {
        by_type.entry(s.sensor_type).or_default().push(s);
    }

    println!("Sensor types found:");
    for (sensor_type, group) in &by_type {
        println!("  Type {sensor_type}: {} sensor(s)", group.len());
        for s in group {
            println!("    lsid {:>8}  {}", s.lsid, product(s));
        }
    }
}

pub fn print_sensor_detail(sensor: &SensorInfo) {
    println!("Sensor {}:", sensor.lsid);
    println!("  Type:     {}", sensor.sensor_type);
    println!("  Product:  {}", product(sensor));
    if let Some(category) = &sensor.category {
        println!("  Category: {category}");
    }
    if let Some(station) = sensor.station_id {
        println!("  Station:  {station}");
    }
    for (key, value) in &sensor.extra {
        println!("  {key}: {value}");
    }
}

fn product(sensor: &SensorInfo) -> String {
    match (sensor.manufacturer.as_deref(), sensor.product_name.as_deref()) {
        (Some(m), Some(p)) => format!("{m} {p}"),
        (None, Some(p)) => p.to_string(),
        (Some(m), None) => m.to_string(),
        (None, None) => "Unknown".to_string(),
    }
}

pub fn print_table(table: &WeatherTable, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(table)?);
        return Ok(());
    }

    println!("Parsed {} weather record(s)", table.len());
    let Some((first, last)) = table.time_range() else {
        return Ok(());
    };
    println!("Data range: {} to {}", first.format(TIME_FORMAT), last.format(TIME_FORMAT));
    println!("Columns: {}", table.columns().join(", "));
    println!();

    for row in table {
        let cells: Vec<String> = row.fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!(
            "{}  lsid {:>8}  type {:>4}  {}",
            row.timestamp.format(TIME_FORMAT),
            row.lsid,
            row.sensor_type,
            cells.join(" ")
        );
    }

    let summaries = summary_lines(table);
    if !summaries.is_empty() {
        println!();
        for line in summaries {
            println!("{line}");
        }
    }

    Ok(())
}

fn summary_lines(table: &WeatherTable) -> Vec<String> {
    SUMMARY_COLUMNS
        .iter()
        .filter_map(|(column, label, unit)| {
            let stats = table.column_stats(column)?;
            Some(format!(
                "{label}: {:.1}{unit} avg, {:.1}{unit} - {:.1}{unit} ({} values)",
                stats.mean, stats.min, stats.max, stats.count
            ))
        })
        .collect()
}
