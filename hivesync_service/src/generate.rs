//! Synthetic climate data generator.
//!
//! Writes `portfolio_stations.csv` and `portfolio_observations.csv` with the
//! fixed CSV schema, for loading into Hive or through the CSV fallback.
//! Coordinates, countries and climate baselines come from the region
//! registry. Randomness is injected so runs are reproducible under a seed.

use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::logging::{self, LogSource};
use crate::source::csv::{CsvWriter, OBSERVATION_COLUMNS, STATION_COLUMNS};
use crate::sync::regions::{REGION_REGISTRY, RegionInfo};

pub const STATIONS_FILE: &str = "portfolio_stations.csv";
pub const OBSERVATIONS_FILE: &str = "portfolio_observations.csv";

const COASTAL_SHARE: f64 = 0.3;
const ACTIVE_SHARE: f64 = 0.95;
const MAX_PRECIPITATION_MM: f64 = 500.0;

// ---------------------------------------------------------------------------
// Size presets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizePreset {
    Small,
    Medium,
    Large,
    Xlarge,
}

impl SizePreset {
    /// (stations, observations per station)
    pub fn dimensions(self) -> (usize, usize) {
        match self {
            SizePreset::Small => (100, 50),
            SizePreset::Medium => (500, 150),
            SizePreset::Large => (2500, 380),
            SizePreset::Xlarge => (5000, 950),
        }
    }
}

impl fmt::Display for SizePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SizePreset::Small => "small",
            SizePreset::Medium => "medium",
            SizePreset::Large => "large",
            SizePreset::Xlarge => "xlarge",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SizePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(SizePreset::Small),
            "medium" => Ok(SizePreset::Medium),
            "large" => Ok(SizePreset::Large),
            "xlarge" => Ok(SizePreset::Xlarge),
            other => Err(format!("unknown size '{}' (small, medium, large, xlarge)", other)),
        }
    }
}

/// What to generate and where.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub size: SizePreset,
    /// Approximate total observations; overrides the preset's per-station
    /// count, never the station count.
    pub rows: Option<usize>,
    pub output_dir: PathBuf,
}

impl GenerateOptions {
    pub fn stations(&self) -> usize {
        self.size.dimensions().0
    }

    pub fn observations_per_station(&self) -> usize {
        let (stations, per_station) = self.size.dimensions();
        match self.rows {
            Some(rows) => (rows / stations).max(1),
            None => per_station,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateReport {
    pub stations: usize,
    pub observations: usize,
    pub stations_file: PathBuf,
    pub observations_file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
#[error("cannot write {path}: {source}")]
pub struct GenerateError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> GenerateError + '_ {
    move |source| GenerateError { path: path.to_path_buf(), source }
}

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedStation {
    pub station_id: String,
    pub country: &'static str,
    pub region: &'static RegionInfo,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub is_coastal: bool,
    pub is_active: bool,
}

/// `CC-REG-00042`: country, first three letters of the region, index.
pub fn station_id(country: &str, region: &RegionInfo, index: usize) -> String {
    let prefix: String = region.short_name.chars().take(3).collect();
    format!("{}-{}-{:05}", country, prefix.to_ascii_uppercase(), index)
}

pub fn generate_stations<R: Rng>(rng: &mut R, count: usize) -> Vec<GeneratedStation> {
    (0..count)
        .filter_map(|i| {
            let region = REGION_REGISTRY.choose(rng)?;
            let country = *region.countries.choose(rng)?;
            let (south, north) = region.latitude_range;
            let (west, east) = region.longitude_range;
            Some(GeneratedStation {
                station_id: station_id(country, region, i),
                country,
                region,
                latitude: rng.gen_range(south..north),
                longitude: rng.gen_range(west..east),
                elevation: rng.gen_range(0.0..3000.0),
                is_coastal: rng.gen_bool(COASTAL_SHARE),
                is_active: rng.gen_bool(ACTIVE_SHARE),
            })
        })
        .collect()
}

fn py_bool(b: bool) -> String {
    if b { "True" } else { "False" }.to_string()
}

fn station_row(station: &GeneratedStation) -> Vec<String> {
    vec![
        station.station_id.clone(),
        format!("Station {}", station.station_id),
        station.country.to_string(),
        station.region.short_name.to_string(),
        format!("{:.4}", station.latitude),
        format!("{:.4}", station.longitude),
        format!("{:.1}", station.elevation),
        py_bool(station.is_coastal),
        py_bool(station.is_active),
    ]
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(1980, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn last_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Days in the sampling window, both ends included.
pub fn day_count() -> usize {
    (last_day() - first_day()).num_days() as usize + 1
}

/// `amount` distinct dates in the window, at most one per day.
pub fn sample_dates<R: Rng>(rng: &mut R, amount: usize) -> Vec<NaiveDate> {
    let start = first_day();
    rand::seq::index::sample(rng, day_count(), amount.min(day_count()))
        .into_iter()
        .map(|offset| start + Duration::days(offset as i64))
        .collect()
}

/// Exponential draw with the given mean, by inverse CDF.
fn exponential<R: Rng>(rng: &mut R, mean: f64) -> f64 {
    let u: f64 = rng.r#gen();
    -mean * (1.0 - u).ln()
}

fn observation_row<R: Rng>(rng: &mut R, station: &GeneratedStation, date: NaiveDate) -> Vec<String> {
    let region = station.region;
    let temp_mean = region.base_temp_c + rng.gen_range(-10.0..15.0);
    let temp_max = temp_mean + rng.gen_range(2.0..8.0);
    let temp_min = temp_mean - rng.gen_range(2.0..8.0);
    let precipitation = exponential(rng, region.precipitation_base_mm / 3.0).clamp(0.0, MAX_PRECIPITATION_MM);
    let humidity = rng.gen_range(40.0..95.0);
    let (sst, salinity) = if station.is_coastal {
        (format!("{:.1}", rng.gen_range(18.0..28.0)), format!("{:.1}", rng.gen_range(33.0..37.0)))
    } else {
        (String::new(), String::new())
    };

    vec![
        station.station_id.clone(),
        date.format("%Y-%m-%d").to_string(),
        date.year().to_string(),
        date.month().to_string(),
        format!("{:.1}", temp_max),
        format!("{:.1}", temp_min),
        format!("{:.1}", temp_mean),
        format!("{:.1}", precipitation),
        format!("{:.1}", humidity),
        sst,
        salinity,
        region.short_name.to_string(),
    ]
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Generate both CSV files into `options.output_dir`, creating it if needed.
pub fn generate<R: Rng>(rng: &mut R, options: &GenerateOptions) -> Result<GenerateReport, GenerateError> {
    let dir = &options.output_dir;
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let per_station = options.observations_per_station();
    logging::info(
        LogSource::Csv,
        None,
        &format!(
            "generating {} dataset: {} stations x {} observations into {}",
            options.size,
            options.stations(),
            per_station,
            dir.display()
        ),
    );

    let stations = generate_stations(rng, options.stations());

    let stations_file = dir.join(STATIONS_FILE);
    let file = File::create(&stations_file).map_err(io_err(&stations_file))?;
    let mut writer = CsvWriter::new(BufWriter::new(file), STATION_COLUMNS).map_err(io_err(&stations_file))?;
    for station in &stations {
        writer.write_row(&station_row(station)).map_err(io_err(&stations_file))?;
    }
    let station_rows = writer.finish().map_err(io_err(&stations_file))?;

    let observations_file = dir.join(OBSERVATIONS_FILE);
    let file = File::create(&observations_file).map_err(io_err(&observations_file))?;
    let mut writer =
        CsvWriter::new(BufWriter::new(file), OBSERVATION_COLUMNS).map_err(io_err(&observations_file))?;
    for (i, station) in stations.iter().enumerate() {
        if i > 0 && i % 500 == 0 {
            logging::debug(LogSource::Csv, None, &format!("station {}/{}", i, stations.len()));
        }
        for date in sample_dates(rng, per_station) {
            writer
                .write_row(&observation_row(rng, station, date))
                .map_err(io_err(&observations_file))?;
        }
    }
    let observation_rows = writer.finish().map_err(io_err(&observations_file))?;

    logging::info(
        LogSource::Csv,
        None,
        &format!("wrote {} stations and {} observations", station_rows, observation_rows),
    );

    Ok(GenerateReport {
        stations: station_rows,
        observations: observation_rows,
        stations_file,
        observations_file,
    })
}
