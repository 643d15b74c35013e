//! Reconcile targets for stations and observations.
//!
//! Both targets take [`Record`]s, so Hive rows and CSV rows go through the
//! same parsing and foreign key resolution.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

use crate::logging::{self, LogSource};
use crate::model::{Grade, Observation, Station, StoreError};
use crate::reconcile::{Prepared, Reconcilable, ReconcileTarget};
use crate::source::{FieldError, Record};
use crate::store::Store;
use crate::sync::regions;

// ---------------------------------------------------------------------------
// Natural keys
// ---------------------------------------------------------------------------

impl Reconcilable for Station {
    type Key = String;

    fn natural_key(&self) -> String {
        self.station_id.clone()
    }

    fn differs_from(&self, existing: &Station) -> bool {
        self.station_name != existing.station_name
            || self.country != existing.country
            || self.region_id != existing.region_id
            || self.latitude != existing.latitude
            || self.longitude != existing.longitude
            || self.elevation != existing.elevation
            || self.is_coastal != existing.is_coastal
            || self.is_active != existing.is_active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservationKey {
    pub station: i64,
    pub date: NaiveDate,
}

impl fmt::Display for ObservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "station#{}@{}", self.station, self.date)
    }
}

impl Reconcilable for Observation {
    type Key = ObservationKey;

    fn natural_key(&self) -> ObservationKey {
        ObservationKey { station: self.station, date: self.observation_date }
    }

    /// The station and date are the key; everything else is updatable.
    fn differs_from(&self, existing: &Observation) -> bool {
        self.year != existing.year
            || self.month != existing.month
            || self.temp_max != existing.temp_max
            || self.temp_min != existing.temp_min
            || self.temp_mean != existing.temp_mean
            || self.precipitation != existing.precipitation
            || self.humidity != existing.humidity
            || self.sea_surface_temp != existing.sea_surface_temp
            || self.ocean_salinity != existing.ocean_salinity
            || self.data_quality != existing.data_quality
    }
}

fn reject<R>(key: &str, err: FieldError) -> Prepared<R> {
    Prepared::Reject { key: key.to_string(), reason: err.to_string() }
}

fn store_reject<R>(key: &str, err: StoreError) -> Prepared<R> {
    Prepared::Reject { key: key.to_string(), reason: format!("store lookup failed: {}", err) }
}

// ---------------------------------------------------------------------------
// Stations
// ---------------------------------------------------------------------------

/// Stations keyed by `station_id`.
///
/// Regions are resolved by case-insensitive name, then by code. A region
/// the store does not have is created: from the registry when it is one of
/// the five known regions, otherwise with the upper-cased name as its code.
///
/// Hive rows carry no `elevation` or `is_active` column; when a column is
/// absent the stored value is kept. Coastal status comes from `is_coastal`
/// if present, otherwise from whether the row had any ocean data.
pub struct StationTarget<'a> {
    store: &'a mut dyn Store,
    source: LogSource,
    regions: HashMap<String, i64>,
}

impl<'a> StationTarget<'a> {
    pub fn new(store: &'a mut dyn Store, source: LogSource) -> Self {
        StationTarget { store, source, regions: HashMap::new() }
    }

    fn resolve_region(&mut self, name: &str) -> Result<i64, StoreError> {
        let cache_key = name.trim().to_lowercase();
        if let Some(&id) = self.regions.get(&cache_key) {
            return Ok(id);
        }

        let region = match self.store.find_region(name)? {
            Some(region) => region,
            None => match regions::find_region(name) {
                Some(info) => self.store.upsert_region(info.code, info.name, info.description)?.0,
                None => {
                    logging::warn(self.source, Some(name), "region not found, creating it");
                    self.store.get_or_create_region(&regions::fallback_code(name), name.trim())?
                }
            },
        };

        self.regions.insert(cache_key, region.id);
        Ok(region.id)
    }
}

impl ReconcileTarget for StationTarget<'_> {
    type Input = Record;
    type Row = Station;

    fn prepare(&mut self, record: Record) -> Prepared<Station> {
        let station_id = match record.text("station_id") {
            Ok(id) => id.to_string(),
            Err(e) => return reject("<no station_id>", e),
        };
        let key = station_id.as_str();

        let station_name = match record.text("station_name") {
            Ok(v) => v.to_string(),
            Err(e) => return reject(key, e),
        };
        let country = match record.text("country") {
            Ok(v) => v.to_string(),
            Err(e) => return reject(key, e),
        };
        let latitude = match record.require_float("latitude") {
            Ok(v) => v,
            Err(e) => return reject(key, e),
        };
        let longitude = match record.require_float("longitude") {
            Ok(v) => v,
            Err(e) => return reject(key, e),
        };
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Prepared::Reject {
                key: station_id,
                reason: format!("coordinates out of range: {}, {}", latitude, longitude),
            };
        }

        let region_name = match record.text("region") {
            Ok(v) => v.to_string(),
            Err(e) => return reject(key, e),
        };
        let region_id = match self.resolve_region(&region_name) {
            Ok(id) => id,
            Err(e) => return store_reject(key, e),
        };

        let existing = if record.has_column("elevation") && record.has_column("is_active") {
            None
        } else {
            match self.store.find_station(key) {
                Ok(found) => found,
                Err(e) => return store_reject(key, e),
            }
        };

        let elevation = if record.has_column("elevation") {
            match record.float("elevation") {
                Ok(v) => v,
                Err(e) => return reject(key, e),
            }
        } else {
            existing.as_ref().and_then(|s| s.elevation)
        };

        let is_coastal = if record.has_column("is_coastal") {
            match record.flag("is_coastal") {
                Ok(v) => v.unwrap_or(false),
                Err(e) => return reject(key, e),
            }
        } else {
            record.raw("has_ocean_data").is_some()
        };

        let is_active = if record.has_column("is_active") {
            match record.flag("is_active") {
                Ok(v) => v.unwrap_or(true),
                Err(e) => return reject(key, e),
            }
        } else {
            existing.as_ref().map(|s| s.is_active).unwrap_or(true)
        };

        Prepared::Ready(Station {
            id: 0,
            station_id,
            station_name,
            country,
            region_id,
            latitude,
            longitude,
            elevation,
            is_coastal,
            is_active,
        })
    }

    fn lookup(&mut self, key: &String) -> Result<Option<Station>, StoreError> {
        self.store.find_station(key)
    }

    fn insert_batch(&mut self, rows: &[Station]) -> Result<usize, StoreError> {
        self.store.insert_stations(rows)
    }

    fn update_batch(&mut self, rows: &[Station]) -> Result<usize, StoreError> {
        self.store.update_stations(rows)
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// Observations keyed by (station, date). Rows for a station the store does
/// not know are skipped, not rejected.
pub struct ObservationTarget<'a> {
    store: &'a mut dyn Store,
    /// `station_id` → surrogate id; `None` caches a miss.
    stations: HashMap<String, Option<i64>>,
}

impl<'a> ObservationTarget<'a> {
    pub fn new(store: &'a mut dyn Store) -> Self {
        ObservationTarget { store, stations: HashMap::new() }
    }

    fn resolve_station(&mut self, station_id: &str) -> Result<Option<i64>, StoreError> {
        if let Some(&cached) = self.stations.get(station_id) {
            return Ok(cached);
        }
        let id = self.store.find_station(station_id)?.map(|s| s.id);
        self.stations.insert(station_id.to_string(), id);
        Ok(id)
    }
}

fn parse_observation(record: &Record, station: i64) -> Result<Observation, FieldError> {
    let month = record.int("month")?;
    if !(1..=12).contains(&month) {
        return Err(FieldError::Invalid {
            field: "month".to_string(),
            value: month.to_string(),
            expected: "month (1-12)",
        });
    }

    let data_quality = match record.raw("data_quality") {
        None => Grade::Good,
        Some(v) => v.parse().map_err(|_| FieldError::Invalid {
            field: "data_quality".to_string(),
            value: v.to_string(),
            expected: "grade",
        })?,
    };

    Ok(Observation {
        station,
        observation_date: record.date("observation_date")?,
        year: record.int("year")?,
        month,
        temp_max: record.float("temp_max")?,
        temp_min: record.float("temp_min")?,
        temp_mean: record.float("temp_mean")?,
        precipitation: record.float("precipitation")?,
        humidity: record.float("humidity")?,
        sea_surface_temp: record.float("sea_surface_temp")?,
        ocean_salinity: record.float("ocean_salinity")?,
        data_quality,
    })
}

impl ReconcileTarget for ObservationTarget<'_> {
    type Input = Record;
    type Row = Observation;

    fn prepare(&mut self, record: Record) -> Prepared<Observation> {
        let station_id = match record.text("station_id") {
            Ok(id) => id.to_string(),
            Err(e) => return reject("<no station_id>", e),
        };

        let station = match self.resolve_station(&station_id) {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Prepared::Skip {
                    reason: format!("station not found: {}", station_id),
                    key: station_id,
                };
            }
            Err(e) => return store_reject(&station_id, e),
        };

        match parse_observation(&record, station) {
            Ok(observation) => Prepared::Ready(observation),
            Err(e) => reject(&station_id, e),
        }
    }

    fn lookup(&mut self, key: &ObservationKey) -> Result<Option<Observation>, StoreError> {
        self.store.find_observation(key.station, key.date)
    }

    fn insert_batch(&mut self, rows: &[Observation]) -> Result<usize, StoreError> {
        self.store.insert_observations(rows)
    }

    fn update_batch(&mut self, rows: &[Observation]) -> Result<usize, StoreError> {
        self.store.update_observations(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Reconciler;
    use crate::store::MemoryStore;

    fn csv_station(id: &str, region: &str) -> Record {
        Record::from_pairs(&[
            ("station_id", id),
            ("station_name", "Nairobi Dagoretti"),
            ("country", "KE"),
            ("region", region),
            ("latitude", "-1.3"),
            ("longitude", "36.75"),
            ("elevation", "1798.0"),
            ("is_coastal", "False"),
            ("is_active", "True"),
        ])
    }

    fn observation_record(id: &str, date: &str, temp_max: &str) -> Record {
        Record::from_pairs(&[
            ("station_id", id),
            ("observation_date", date),
            ("year", "2024"),
            ("month", "3"),
            ("temp_max", temp_max),
            ("temp_min", "15.2"),
            ("temp_mean", "22.0"),
            ("precipitation", "0.0"),
            ("humidity", "61.5"),
            ("sea_surface_temp", ""),
            ("ocean_salinity", ""),
        ])
    }

    #[test]
    fn test_known_short_region_name_resolves_to_registry_region() {
        let mut store = MemoryStore::new();
        {
            let mut target = StationTarget::new(&mut store, LogSource::Csv);
            let prepared = target.prepare(csv_station("KE-EAS-00001", "East"));
            assert!(matches!(prepared, Prepared::Ready(_)));
        }
        let region = store.find_region("EAST").unwrap().unwrap();
        assert_eq!(region.name, "East Africa");
    }

    #[test]
    fn test_unknown_region_is_created_with_truncated_code() {
        let mut store = MemoryStore::new();
        let mut target = StationTarget::new(&mut store, LogSource::Hive);
        let station = match target.prepare(csv_station("MG-IND-00001", "Indian Ocean Islands")) {
            Prepared::Ready(s) => s,
            other => panic!("expected Ready, got {:?}", other),
        };
        drop(target);
        let region = store.find_region("INDIAN OCE").unwrap().unwrap();
        assert_eq!(region.id, station.region_id);
        assert_eq!(region.name, "Indian Ocean Islands");
    }

    #[test]
    fn test_hive_station_row_derives_coastal_and_keeps_elevation() {
        let mut store = MemoryStore::new();
        Reconciler::new("stations", LogSource::Csv)
            .run(&mut StationTarget::new(&mut store, LogSource::Csv), vec![csv_station("KE-EAS-00001", "East")]);

        let hive_row = Record::from_pairs(&[
            ("station_id", "KE-EAS-00001"),
            ("station_name", "Nairobi Dagoretti"),
            ("country", "KE"),
            ("region", "East"),
            ("latitude", "-1.3"),
            ("longitude", "36.75"),
            ("has_ocean_data", "24.1"),
        ]);
        let stats = Reconciler::new("stations", LogSource::Hive)
            .run(&mut StationTarget::new(&mut store, LogSource::Hive), vec![hive_row]);
        assert_eq!(stats.updated, 1);

        let station = store.find_station("KE-EAS-00001").unwrap().unwrap();
        assert!(station.is_coastal);
        assert_eq!(station.elevation, Some(1798.0));
        assert!(station.is_active);
    }

    #[test]
    fn test_bad_coordinates_are_rejected() {
        let mut store = MemoryStore::new();
        let mut target = StationTarget::new(&mut store, LogSource::Csv);
        let record = Record::from_pairs(&[
            ("station_id", "X-1"),
            ("station_name", "Nowhere"),
            ("country", "XX"),
            ("region", "East"),
            ("latitude", "123.0"),
            ("longitude", "36.0"),
        ]);
        assert!(matches!(target.prepare(record), Prepared::Reject { .. }));
    }

    #[test]
    fn test_observation_for_unknown_station_is_skipped() {
        let mut store = MemoryStore::new();
        let mut target = ObservationTarget::new(&mut store);
        match target.prepare(observation_record("XYZ-001", "2024-03-01", "30.1")) {
            Prepared::Skip { key, reason } => {
                assert_eq!(key, "XYZ-001");
                assert!(reason.contains("XYZ-001"));
            }
            other => panic!("expected Skip, got {:?}", other),
        }
    }

    #[test]
    fn test_observation_fields_parse() {
        let mut store = MemoryStore::new();
        Reconciler::new("stations", LogSource::Csv)
            .run(&mut StationTarget::new(&mut store, LogSource::Csv), vec![csv_station("KE-EAS-00001", "East")]);

        let mut target = ObservationTarget::new(&mut store);
        let obs = match target.prepare(observation_record("KE-EAS-00001", "2024-03-01", "30.1")) {
            Prepared::Ready(o) => o,
            other => panic!("expected Ready, got {:?}", other),
        };
        assert_eq!(obs.temp_max, Some(30.1));
        assert_eq!(obs.sea_surface_temp, None);
        assert_eq!(obs.data_quality, Grade::Good);
        assert_eq!(obs.natural_key().date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_malformed_observation_is_rejected() {
        let mut store = MemoryStore::new();
        Reconciler::new("stations", LogSource::Csv)
            .run(&mut StationTarget::new(&mut store, LogSource::Csv), vec![csv_station("KE-EAS-00001", "East")]);

        let mut target = ObservationTarget::new(&mut store);
        let bad_temp = observation_record("KE-EAS-00001", "2024-03-01", "hot");
        assert!(matches!(target.prepare(bad_temp), Prepared::Reject { .. }));
        let bad_date = observation_record("KE-EAS-00001", "2024-13-45", "30.0");
        assert!(matches!(target.prepare(bad_date), Prepared::Reject { .. }));
    }

    #[test]
    fn test_observation_change_detection_ignores_nothing_updatable() {
        let base = Observation {
            station: 1,
            observation_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            year: 2024,
            month: 3,
            temp_max: Some(30.0),
            temp_min: None,
            temp_mean: None,
            precipitation: None,
            humidity: None,
            sea_surface_temp: None,
            ocean_salinity: None,
            data_quality: Grade::Good,
        };
        assert!(!base.differs_from(&base.clone()));
        assert!(Observation { ocean_salinity: Some(35.0), ..base.clone() }.differs_from(&base));
        assert!(Observation { data_quality: Grade::Poor, ..base.clone() }.differs_from(&base));
    }
}
