/// In-process store.
///
/// Holds every table in plain collections and enforces the same rules as
/// the PostgreSQL schema: unique natural keys, existing parents for every
/// child row, and all-or-nothing batches (a batch that would violate a
/// foreign key writes nothing).

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::model::{
    Benchmark, Configuration, ImportLog, Metric, Observation, Recommendation, Region, Scenario,
    Station, StoreError,
};
use crate::store::{Store, StoreCounts};

#[derive(Debug, Default)]
pub struct MemoryStore {
    regions: Vec<Region>,
    stations: Vec<Station>,
    station_index: HashMap<String, usize>,
    observations: BTreeMap<(i64, NaiveDate), Observation>,
    scenarios: Vec<Scenario>,
    benchmarks: Vec<Benchmark>,
    metrics: Vec<Metric>,
    configurations: Vec<Configuration>,
    recommendations: Vec<Recommendation>,
    import_logs: Vec<ImportLog>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_region(&self, id: i64) -> Result<(), StoreError> {
        if self.regions.iter().any(|r| r.id == id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("region {} does not exist", id)))
        }
    }

    fn require_station(&self, id: i64) -> Result<(), StoreError> {
        if self.stations.iter().any(|s| s.id == id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("station {} does not exist", id)))
        }
    }

    fn require_benchmark(&self, id: i64) -> Result<(), StoreError> {
        if self.benchmarks.iter().any(|b| b.id == id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("benchmark {} does not exist", id)))
        }
    }
}

impl Store for MemoryStore {
    // --- Regions ------------------------------------------------------------

    fn upsert_region(
        &mut self,
        code: &str,
        name: &str,
        description: &str,
    ) -> Result<(Region, bool), StoreError> {
        if self.regions.iter().any(|r| r.name == name && r.code != code) {
            return Err(StoreError::Constraint(format!("region name '{}' already taken", name)));
        }

        if let Some(region) = self.regions.iter_mut().find(|r| r.code == code) {
            region.name = name.to_string();
            region.description = description.to_string();
            return Ok((region.clone(), false));
        }

        let region = Region {
            id: self.allocate_id(),
            code: code.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        };
        self.regions.push(region.clone());
        Ok((region, true))
    }

    fn find_region(&mut self, name_or_code: &str) -> Result<Option<Region>, StoreError> {
        let wanted = name_or_code.trim();
        let by_name = self.regions.iter().find(|r| r.name.eq_ignore_ascii_case(wanted));
        let found = by_name.or_else(|| self.regions.iter().find(|r| r.code.eq_ignore_ascii_case(wanted)));
        Ok(found.cloned())
    }

    fn get_or_create_region(&mut self, code: &str, name: &str) -> Result<Region, StoreError> {
        if let Some(region) = self.regions.iter().find(|r| r.code == code) {
            return Ok(region.clone());
        }
        Ok(self.upsert_region(code, name, "")?.0)
    }

    // --- Stations -----------------------------------------------------------

    fn find_station(&mut self, station_id: &str) -> Result<Option<Station>, StoreError> {
        Ok(self.station_index.get(station_id).map(|&i| self.stations[i].clone()))
    }

    fn insert_stations(&mut self, rows: &[Station]) -> Result<usize, StoreError> {
        for row in rows {
            self.require_region(row.region_id)?;
        }

        let mut inserted = 0;
        for row in rows {
            if self.station_index.contains_key(&row.station_id) {
                continue;
            }
            let mut station = row.clone();
            station.id = self.allocate_id();
            self.station_index.insert(station.station_id.clone(), self.stations.len());
            self.stations.push(station);
            inserted += 1;
        }
        Ok(inserted)
    }

    fn update_stations(&mut self, rows: &[Station]) -> Result<usize, StoreError> {
        for row in rows {
            self.require_region(row.region_id)?;
        }

        let mut written = 0;
        for row in rows {
            if let Some(&i) = self.station_index.get(&row.station_id) {
                let id = self.stations[i].id;
                self.stations[i] = Station { id, ..row.clone() };
                written += 1;
            }
        }
        Ok(written)
    }

    // --- Observations -------------------------------------------------------

    fn find_observation(
        &mut self,
        station: i64,
        date: NaiveDate,
    ) -> Result<Option<Observation>, StoreError> {
        Ok(self.observations.get(&(station, date)).cloned())
    }

    fn insert_observations(&mut self, rows: &[Observation]) -> Result<usize, StoreError> {
        for row in rows {
            self.require_station(row.station)?;
        }

        let mut inserted = 0;
        for row in rows {
            let key = (row.station, row.observation_date);
            if !self.observations.contains_key(&key) {
                self.observations.insert(key, row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn update_observations(&mut self, rows: &[Observation]) -> Result<usize, StoreError> {
        let mut written = 0;
        for row in rows {
            if let Some(existing) = self.observations.get_mut(&(row.station, row.observation_date)) {
                *existing = row.clone();
                written += 1;
            }
        }
        Ok(written)
    }

    fn station_observations(&mut self, station: i64, limit: usize) -> Result<Vec<Observation>, StoreError> {
        Ok(self
            .observations
            .range((station, NaiveDate::MIN)..=(station, NaiveDate::MAX))
            .rev()
            .take(limit)
            .map(|(_, o)| o.clone())
            .collect())
    }

    // --- Scenarios ----------------------------------------------------------

    fn insert_scenario(&mut self, scenario: &Scenario) -> Result<Scenario, StoreError> {
        if self.scenarios.iter().any(|s| s.name == scenario.name) {
            return Err(StoreError::Constraint(format!("scenario '{}' already exists", scenario.name)));
        }
        let stored = Scenario { id: self.allocate_id(), ..scenario.clone() };
        self.scenarios.push(stored.clone());
        Ok(stored)
    }

    fn find_scenario(&mut self, id: i64) -> Result<Option<Scenario>, StoreError> {
        Ok(self.scenarios.iter().find(|s| s.id == id).cloned())
    }

    fn find_scenario_by_name(&mut self, name: &str) -> Result<Option<Scenario>, StoreError> {
        Ok(self.scenarios.iter().find(|s| s.name == name).cloned())
    }

    fn list_scenarios(&mut self, active_only: bool) -> Result<Vec<Scenario>, StoreError> {
        let mut listed: Vec<Scenario> = self
            .scenarios
            .iter()
            .filter(|s| s.is_active || !active_only)
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.category.as_str().cmp(b.category.as_str()).then_with(|| a.name.cmp(&b.name)));
        Ok(listed)
    }

    // --- Benchmarks and metrics ---------------------------------------------

    fn insert_benchmark(&mut self, benchmark: &Benchmark) -> Result<Benchmark, StoreError> {
        if !self.scenarios.iter().any(|s| s.id == benchmark.scenario_id) {
            return Err(StoreError::Constraint(format!("scenario {} does not exist", benchmark.scenario_id)));
        }
        let stored = Benchmark { id: self.allocate_id(), ..benchmark.clone() };
        self.benchmarks.push(stored.clone());
        Ok(stored)
    }

    fn find_benchmark(&mut self, id: i64) -> Result<Option<Benchmark>, StoreError> {
        Ok(self.benchmarks.iter().find(|b| b.id == id).cloned())
    }

    fn recent_benchmarks(&mut self, limit: usize) -> Result<Vec<Benchmark>, StoreError> {
        let mut recent = self.benchmarks.clone();
        recent.sort_by(|a, b| b.executed_at.cmp(&a.executed_at).then_with(|| b.id.cmp(&a.id)));
        recent.truncate(limit);
        Ok(recent)
    }

    fn insert_metric(&mut self, metric: &Metric) -> Result<Metric, StoreError> {
        self.require_benchmark(metric.benchmark_id)?;
        let stored = Metric { id: self.allocate_id(), ..metric.clone() };
        self.metrics.push(stored.clone());
        Ok(stored)
    }

    fn benchmark_metrics(&mut self, benchmark_id: i64) -> Result<Vec<Metric>, StoreError> {
        let mut metrics: Vec<Metric> =
            self.metrics.iter().filter(|m| m.benchmark_id == benchmark_id).cloned().collect();
        metrics.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(metrics)
    }

    // --- Configurations and recommendations ---------------------------------

    fn get_or_create_configuration(
        &mut self,
        seed: &Configuration,
    ) -> Result<(Configuration, bool), StoreError> {
        if let Some(existing) = self
            .configurations
            .iter()
            .find(|c| c.setting_key == seed.setting_key && c.setting_value == seed.setting_value)
        {
            return Ok((existing.clone(), false));
        }
        let stored = Configuration { id: self.allocate_id(), ..seed.clone() };
        self.configurations.push(stored.clone());
        Ok((stored, true))
    }

    fn find_configuration(&mut self, id: i64) -> Result<Option<Configuration>, StoreError> {
        Ok(self.configurations.iter().find(|c| c.id == id).cloned())
    }

    fn insert_recommendation(
        &mut self,
        recommendation: &Recommendation,
    ) -> Result<Recommendation, StoreError> {
        self.require_benchmark(recommendation.benchmark_id)?;
        if !self.configurations.iter().any(|c| c.id == recommendation.configuration_id) {
            return Err(StoreError::Constraint(format!(
                "configuration {} does not exist",
                recommendation.configuration_id
            )));
        }
        let stored = Recommendation { id: self.allocate_id(), ..recommendation.clone() };
        self.recommendations.push(stored.clone());
        Ok(stored)
    }

    fn benchmark_recommendations(&mut self, benchmark_id: i64) -> Result<Vec<Recommendation>, StoreError> {
        Ok(self
            .recommendations
            .iter()
            .filter(|r| r.benchmark_id == benchmark_id)
            .cloned()
            .collect())
    }

    fn list_recommendations(&mut self, limit: usize) -> Result<Vec<Recommendation>, StoreError> {
        let mut listed = self.recommendations.clone();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        listed.truncate(limit);
        Ok(listed)
    }

    fn set_recommendation_applied(&mut self, id: i64, applied: bool) -> Result<bool, StoreError> {
        match self.recommendations.iter_mut().find(|r| r.id == id) {
            Some(rec) => {
                rec.is_applied = applied;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // --- Import logs --------------------------------------------------------

    fn insert_import_log(&mut self, log: &ImportLog) -> Result<ImportLog, StoreError> {
        let stored = ImportLog { id: self.allocate_id(), ..log.clone() };
        self.import_logs.push(stored.clone());
        Ok(stored)
    }

    fn update_import_log(&mut self, log: &ImportLog) -> Result<(), StoreError> {
        match self.import_logs.iter_mut().find(|l| l.id == log.id) {
            Some(existing) => {
                *existing = log.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound { entity: "import log", key: log.id.to_string() }),
        }
    }

    fn recent_import_logs(&mut self, limit: usize) -> Result<Vec<ImportLog>, StoreError> {
        let mut recent = self.import_logs.clone();
        recent.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| b.id.cmp(&a.id)));
        recent.truncate(limit);
        Ok(recent)
    }

    // --- Housekeeping -------------------------------------------------------

    fn counts(&mut self) -> Result<StoreCounts, StoreError> {
        Ok(StoreCounts {
            regions: self.regions.len(),
            stations: self.stations.len(),
            observations: self.observations.len(),
            scenarios: self.scenarios.len(),
            benchmarks: self.benchmarks.len(),
            configurations: self.configurations.len(),
            recommendations: self.recommendations.len(),
        })
    }

    fn clear_climate_data(&mut self) -> Result<(), StoreError> {
        self.observations.clear();
        self.stations.clear();
        self.station_index.clear();
        self.regions.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BenchmarkStatus, ConfigCategory, Grade, ImpactLevel, Priority, ScenarioCategory,
    };
    use chrono::Utc;

    fn station(station_id: &str, region_id: i64) -> Station {
        Station {
            id: 0,
            station_id: station_id.to_string(),
            station_name: format!("Station {}", station_id),
            country: "KE".to_string(),
            region_id,
            latitude: -1.28,
            longitude: 36.82,
            elevation: Some(1795.0),
            is_coastal: false,
            is_active: true,
        }
    }

    fn observation(station: i64, day: u32) -> Observation {
        Observation {
            station,
            observation_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            year: 2024,
            month: 3,
            temp_max: Some(30.0),
            temp_min: Some(18.0),
            temp_mean: Some(24.0),
            precipitation: None,
            humidity: Some(60.0),
            sea_surface_temp: None,
            ocean_salinity: None,
            data_quality: Grade::Good,
        }
    }

    fn config_seed(key: &str, value: &str) -> Configuration {
        Configuration {
            id: 0,
            name: key.to_string(),
            description: String::new(),
            setting_key: key.to_string(),
            setting_value: value.to_string(),
            category: ConfigCategory::Other,
            impact_level: ImpactLevel::High,
        }
    }

    #[test]
    fn test_region_upsert_reports_creation_once() {
        let mut store = MemoryStore::new();
        let (first, created) = store.upsert_region("EAST", "East Africa", "").unwrap();
        assert!(created);
        let (second, created) = store.upsert_region("EAST", "East Africa", "Eastern African region").unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.description, "Eastern African region");
    }

    #[test]
    fn test_find_region_prefers_name_then_code() {
        let mut store = MemoryStore::new();
        store.upsert_region("EAST", "East Africa", "").unwrap();
        assert_eq!(store.find_region("east africa").unwrap().unwrap().code, "EAST");
        assert_eq!(store.find_region("East").unwrap().unwrap().code, "EAST");
        assert!(store.find_region("Atlantis").unwrap().is_none());
    }

    #[test]
    fn test_station_insert_ignores_existing_keys() {
        let mut store = MemoryStore::new();
        let (region, _) = store.upsert_region("EAST", "East Africa", "").unwrap();
        assert_eq!(store.insert_stations(&[station("KE-EAS-00001", region.id)]).unwrap(), 1);
        let inserted = store
            .insert_stations(&[station("KE-EAS-00001", region.id), station("KE-EAS-00002", region.id)])
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.counts().unwrap().stations, 2);
    }

    #[test]
    fn test_station_with_unknown_region_fails_whole_batch() {
        let mut store = MemoryStore::new();
        let (region, _) = store.upsert_region("EAST", "East Africa", "").unwrap();
        let result = store.insert_stations(&[station("KE-EAS-00001", region.id), station("XX-1", 999)]);
        assert!(matches!(result, Err(StoreError::Constraint(_))));
        assert_eq!(store.counts().unwrap().stations, 0);
    }

    #[test]
    fn test_observations_unique_per_station_and_date() {
        let mut store = MemoryStore::new();
        let (region, _) = store.upsert_region("EAST", "East Africa", "").unwrap();
        store.insert_stations(&[station("KE-EAS-00001", region.id)]).unwrap();
        let sid = store.find_station("KE-EAS-00001").unwrap().unwrap().id;

        assert_eq!(store.insert_observations(&[observation(sid, 1), observation(sid, 2)]).unwrap(), 2);
        assert_eq!(store.insert_observations(&[observation(sid, 2)]).unwrap(), 0);

        let mut changed = observation(sid, 2);
        changed.humidity = Some(99.0);
        assert_eq!(store.update_observations(&[changed]).unwrap(), 1);

        let newest = store.station_observations(sid, 1).unwrap();
        assert_eq!(newest[0].observation_date.to_string(), "2024-03-02");
        assert_eq!(newest[0].humidity, Some(99.0));
    }

    #[test]
    fn test_observation_for_missing_station_is_rejected() {
        let mut store = MemoryStore::new();
        assert!(store.insert_observations(&[observation(42, 1)]).is_err());
    }

    #[test]
    fn test_configuration_deduplicated_by_key_and_value() {
        let mut store = MemoryStore::new();
        let (a, created_a) = store.get_or_create_configuration(&config_seed("hive.map.aggr", "true")).unwrap();
        let (b, created_b) = store.get_or_create_configuration(&config_seed("hive.map.aggr", "true")).unwrap();
        let (c, _) = store.get_or_create_configuration(&config_seed("hive.map.aggr", "false")).unwrap();
        assert!(created_a && !created_b);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_children_require_benchmark() {
        let mut store = MemoryStore::new();
        let scenario = store
            .insert_scenario(&Scenario {
                id: 0,
                name: "Join".to_string(),
                category: ScenarioCategory::Joins,
                description: String::new(),
                test_query: "SELECT 1".to_string(),
                record_count: 10,
                is_active: true,
            })
            .unwrap();
        let benchmark = store
            .insert_benchmark(&Benchmark {
                id: 0,
                scenario_id: scenario.id,
                query_executed: "SELECT 1".to_string(),
                execution_time: 1.0,
                rows_processed: None,
                rows_returned: Some(1),
                status: BenchmarkStatus::Success,
                error_message: String::new(),
                executed_at: Utc::now(),
                simulated: true,
            })
            .unwrap();
        let (config, _) = store.get_or_create_configuration(&config_seed("hive.exec.parallel", "true")).unwrap();

        let rec = Recommendation {
            id: 0,
            benchmark_id: benchmark.id,
            configuration_id: config.id,
            priority: Priority::High,
            reason: String::new(),
            expected_improvement: String::new(),
            is_applied: false,
            created_at: Utc::now(),
        };
        let stored = store.insert_recommendation(&rec).unwrap();
        assert!(store.insert_recommendation(&Recommendation { benchmark_id: 999, ..rec }).is_err());

        assert!(store.set_recommendation_applied(stored.id, true).unwrap());
        assert!(!store.set_recommendation_applied(12345, true).unwrap());
        assert!(store.benchmark_recommendations(benchmark.id).unwrap()[0].is_applied);
    }

    #[test]
    fn test_clear_climate_data_keeps_assessment_rows() {
        let mut store = MemoryStore::new();
        let (region, _) = store.upsert_region("EAST", "East Africa", "").unwrap();
        store.insert_stations(&[station("KE-EAS-00001", region.id)]).unwrap();
        store.get_or_create_configuration(&config_seed("hive.cbo.enable", "true")).unwrap();
        store.clear_climate_data().unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.regions, 0);
        assert_eq!(counts.stations, 0);
        assert_eq!(counts.configurations, 1);
        assert!(store.find_station("KE-EAS-00001").unwrap().is_none());
    }
}
