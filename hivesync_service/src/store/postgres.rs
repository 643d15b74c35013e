/// PostgreSQL store.
///
/// Tables are created on connect if missing. Bulk inserts run inside one
/// transaction per batch and rely on `ON CONFLICT DO NOTHING`, so the count
/// returned is the number of rows that actually landed; rows beaten to their
/// key by a concurrent sync are simply not counted.
///
/// Enumerations are stored as their lowercase codes (`TEXT`); a code that no
/// longer parses surfaces as [`StoreError::Corrupt`].

use chrono::NaiveDate;
use postgres::{Client, NoTls, Row};

use crate::logging::{self, LogSource};
use crate::model::{
    Benchmark, Configuration, ImportLog, Metric, Observation, Recommendation, Region, Scenario,
    Station, StoreError,
};
use crate::store::{Store, StoreCounts};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS regions (
    id          BIGSERIAL PRIMARY KEY,
    code        TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS weather_stations (
    id           BIGSERIAL PRIMARY KEY,
    station_id   TEXT NOT NULL UNIQUE,
    station_name TEXT NOT NULL,
    country      TEXT NOT NULL,
    region_id    BIGINT NOT NULL REFERENCES regions(id),
    latitude     DOUBLE PRECISION NOT NULL,
    longitude    DOUBLE PRECISION NOT NULL,
    elevation    DOUBLE PRECISION,
    is_coastal   BOOLEAN NOT NULL DEFAULT FALSE,
    is_active    BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS climate_observations (
    id               BIGSERIAL PRIMARY KEY,
    station_id       BIGINT NOT NULL REFERENCES weather_stations(id) ON DELETE CASCADE,
    observation_date DATE NOT NULL,
    year             INTEGER NOT NULL,
    month            INTEGER NOT NULL,
    temp_max         DOUBLE PRECISION,
    temp_min         DOUBLE PRECISION,
    temp_mean        DOUBLE PRECISION,
    precipitation    DOUBLE PRECISION,
    humidity         DOUBLE PRECISION,
    sea_surface_temp DOUBLE PRECISION,
    ocean_salinity   DOUBLE PRECISION,
    data_quality     TEXT NOT NULL DEFAULT 'good',
    UNIQUE (station_id, observation_date)
);

CREATE INDEX IF NOT EXISTS idx_observations_date ON climate_observations (observation_date);
CREATE INDEX IF NOT EXISTS idx_observations_year_month ON climate_observations (year, month);

CREATE TABLE IF NOT EXISTS data_import_logs (
    id                BIGSERIAL PRIMARY KEY,
    import_type       TEXT NOT NULL,
    source            TEXT NOT NULL,
    start_time        TIMESTAMPTZ NOT NULL,
    end_time          TIMESTAMPTZ,
    status            TEXT NOT NULL,
    records_processed BIGINT NOT NULL DEFAULT 0,
    records_imported  BIGINT NOT NULL DEFAULT 0,
    records_updated   BIGINT NOT NULL DEFAULT 0,
    records_failed    BIGINT NOT NULL DEFAULT 0,
    error_message     TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS test_scenarios (
    id           BIGSERIAL PRIMARY KEY,
    name         TEXT NOT NULL UNIQUE,
    category     TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    test_query   TEXT NOT NULL,
    record_count BIGINT NOT NULL,
    is_active    BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS benchmark_results (
    id             BIGSERIAL PRIMARY KEY,
    scenario_id    BIGINT NOT NULL REFERENCES test_scenarios(id),
    query_executed TEXT NOT NULL,
    execution_time DOUBLE PRECISION NOT NULL,
    rows_processed BIGINT,
    rows_returned  BIGINT,
    status         TEXT NOT NULL,
    error_message  TEXT NOT NULL DEFAULT '',
    executed_at    TIMESTAMPTZ NOT NULL,
    simulated      BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE IF NOT EXISTS performance_metrics (
    id           BIGSERIAL PRIMARY KEY,
    benchmark_id BIGINT NOT NULL REFERENCES benchmark_results(id) ON DELETE CASCADE,
    metric_name  TEXT NOT NULL,
    metric_value DOUBLE PRECISION NOT NULL,
    unit         TEXT NOT NULL,
    target_value DOUBLE PRECISION,
    status       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS hive_configurations (
    id            BIGSERIAL PRIMARY KEY,
    name          TEXT NOT NULL,
    description   TEXT NOT NULL DEFAULT '',
    setting_key   TEXT NOT NULL,
    setting_value TEXT NOT NULL,
    category      TEXT NOT NULL,
    impact_level  TEXT NOT NULL,
    UNIQUE (setting_key, setting_value)
);

CREATE TABLE IF NOT EXISTS recommendations (
    id                   BIGSERIAL PRIMARY KEY,
    benchmark_id         BIGINT NOT NULL REFERENCES benchmark_results(id) ON DELETE CASCADE,
    configuration_id     BIGINT NOT NULL REFERENCES hive_configurations(id),
    priority             TEXT NOT NULL,
    reason               TEXT NOT NULL,
    expected_improvement TEXT NOT NULL,
    is_applied           BOOLEAN NOT NULL DEFAULT FALSE,
    created_at           TIMESTAMPTZ NOT NULL
);
";

const REGION_COLUMNS: &str = "id, code, name, description";
const STATION_COLUMNS: &str =
    "id, station_id, station_name, country, region_id, latitude, longitude, elevation, is_coastal, is_active";
const OBSERVATION_COLUMNS: &str = "station_id, observation_date, year, month, temp_max, temp_min, temp_mean, \
     precipitation, humidity, sea_surface_temp, ocean_salinity, data_quality";
const SCENARIO_COLUMNS: &str = "id, name, category, description, test_query, record_count, is_active";
const BENCHMARK_COLUMNS: &str = "id, scenario_id, query_executed, execution_time, rows_processed, rows_returned, \
     status, error_message, executed_at, simulated";
const METRIC_COLUMNS: &str = "id, benchmark_id, metric_name, metric_value, unit, target_value, status";
const CONFIGURATION_COLUMNS: &str =
    "id, name, description, setting_key, setting_value, category, impact_level";
const RECOMMENDATION_COLUMNS: &str =
    "id, benchmark_id, configuration_id, priority, reason, expected_improvement, is_applied, created_at";
const IMPORT_LOG_COLUMNS: &str = "id, import_type, source, start_time, end_time, status, records_processed, \
     records_imported, records_updated, records_failed, error_message";

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn region_from_row(row: &Row) -> Region {
    Region { id: row.get(0), code: row.get(1), name: row.get(2), description: row.get(3) }
}

fn station_from_row(row: &Row) -> Station {
    Station {
        id: row.get(0),
        station_id: row.get(1),
        station_name: row.get(2),
        country: row.get(3),
        region_id: row.get(4),
        latitude: row.get(5),
        longitude: row.get(6),
        elevation: row.get(7),
        is_coastal: row.get(8),
        is_active: row.get(9),
    }
}

fn observation_from_row(row: &Row) -> Result<Observation, StoreError> {
    Ok(Observation {
        station: row.get(0),
        observation_date: row.get(1),
        year: row.get(2),
        month: row.get(3),
        temp_max: row.get(4),
        temp_min: row.get(5),
        temp_mean: row.get(6),
        precipitation: row.get(7),
        humidity: row.get(8),
        sea_surface_temp: row.get(9),
        ocean_salinity: row.get(10),
        data_quality: row.get::<_, String>(11).parse()?,
    })
}

fn scenario_from_row(row: &Row) -> Result<Scenario, StoreError> {
    Ok(Scenario {
        id: row.get(0),
        name: row.get(1),
        category: row.get::<_, String>(2).parse()?,
        description: row.get(3),
        test_query: row.get(4),
        record_count: row.get(5),
        is_active: row.get(6),
    })
}

fn benchmark_from_row(row: &Row) -> Result<Benchmark, StoreError> {
    Ok(Benchmark {
        id: row.get(0),
        scenario_id: row.get(1),
        query_executed: row.get(2),
        execution_time: row.get(3),
        rows_processed: row.get(4),
        rows_returned: row.get(5),
        status: row.get::<_, String>(6).parse()?,
        error_message: row.get(7),
        executed_at: row.get(8),
        simulated: row.get(9),
    })
}

fn metric_from_row(row: &Row) -> Result<Metric, StoreError> {
    Ok(Metric {
        id: row.get(0),
        benchmark_id: row.get(1),
        name: row.get(2),
        value: row.get(3),
        unit: row.get(4),
        target: row.get(5),
        status: row.get::<_, String>(6).parse()?,
    })
}

fn configuration_from_row(row: &Row) -> Result<Configuration, StoreError> {
    Ok(Configuration {
        id: row.get(0),
        name: row.get(1),
        description: row.get(2),
        setting_key: row.get(3),
        setting_value: row.get(4),
        category: row.get::<_, String>(5).parse()?,
        impact_level: row.get::<_, String>(6).parse()?,
    })
}

fn recommendation_from_row(row: &Row) -> Result<Recommendation, StoreError> {
    Ok(Recommendation {
        id: row.get(0),
        benchmark_id: row.get(1),
        configuration_id: row.get(2),
        priority: row.get::<_, String>(3).parse()?,
        reason: row.get(4),
        expected_improvement: row.get(5),
        is_applied: row.get(6),
        created_at: row.get(7),
    })
}

fn import_log_from_row(row: &Row) -> Result<ImportLog, StoreError> {
    Ok(ImportLog {
        id: row.get(0),
        import_type: row.get::<_, String>(1).parse()?,
        source: row.get(2),
        start_time: row.get(3),
        end_time: row.get(4),
        status: row.get::<_, String>(5).parse()?,
        records_processed: row.get(6),
        records_imported: row.get(7),
        records_updated: row.get(8),
        records_failed: row.get(9),
        error_message: row.get(10),
    })
}

fn collect<T>(rows: Vec<Row>, map: fn(&Row) -> Result<T, StoreError>) -> Result<Vec<T>, StoreError> {
    rows.iter().map(map).collect()
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct PgStore {
    client: Client,
}

impl PgStore {
    /// Connect and make sure every table exists.
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        let client = Client::connect(database_url, NoTls)?;
        let mut store = PgStore { client };
        store.ensure_schema()?;
        logging::debug(LogSource::Store, None, "schema ready");
        Ok(store)
    }

    pub fn ensure_schema(&mut self) -> Result<(), StoreError> {
        self.client.batch_execute(SCHEMA)?;
        Ok(())
    }

    fn count(&mut self, table: &str) -> Result<usize, StoreError> {
        let row = self.client.query_one(&format!("SELECT COUNT(*) FROM {}", table), &[])?;
        Ok(row.get::<_, i64>(0) as usize)
    }
}

impl Store for PgStore {
    // --- Regions ------------------------------------------------------------

    fn upsert_region(
        &mut self,
        code: &str,
        name: &str,
        description: &str,
    ) -> Result<(Region, bool), StoreError> {
        // xmax is zero only for a freshly inserted tuple.
        let row = self.client.query_one(
            &format!(
                "INSERT INTO regions (code, name, description) VALUES ($1, $2, $3)
                 ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name, description = EXCLUDED.description
                 RETURNING {}, (xmax = 0) AS inserted",
                REGION_COLUMNS
            ),
            &[&code, &name, &description],
        )?;
        Ok((region_from_row(&row), row.get("inserted")))
    }

    fn find_region(&mut self, name_or_code: &str) -> Result<Option<Region>, StoreError> {
        let wanted = name_or_code.trim();
        let by_name = self.client.query_opt(
            &format!("SELECT {} FROM regions WHERE lower(name) = lower($1)", REGION_COLUMNS),
            &[&wanted],
        )?;
        if let Some(row) = by_name {
            return Ok(Some(region_from_row(&row)));
        }
        let by_code = self.client.query_opt(
            &format!("SELECT {} FROM regions WHERE lower(code) = lower($1)", REGION_COLUMNS),
            &[&wanted],
        )?;
        Ok(by_code.as_ref().map(region_from_row))
    }

    fn get_or_create_region(&mut self, code: &str, name: &str) -> Result<Region, StoreError> {
        self.client.execute(
            "INSERT INTO regions (code, name) VALUES ($1, $2) ON CONFLICT (code) DO NOTHING",
            &[&code, &name],
        )?;
        let row = self
            .client
            .query_one(&format!("SELECT {} FROM regions WHERE code = $1", REGION_COLUMNS), &[&code])?;
        Ok(region_from_row(&row))
    }

    // --- Stations -----------------------------------------------------------

    fn find_station(&mut self, station_id: &str) -> Result<Option<Station>, StoreError> {
        let row = self.client.query_opt(
            &format!("SELECT {} FROM weather_stations WHERE station_id = $1", STATION_COLUMNS),
            &[&station_id],
        )?;
        Ok(row.as_ref().map(station_from_row))
    }

    fn insert_stations(&mut self, rows: &[Station]) -> Result<usize, StoreError> {
        let mut tx = self.client.transaction()?;
        let stmt = tx.prepare(
            "INSERT INTO weather_stations
                 (station_id, station_name, country, region_id, latitude, longitude, elevation, is_coastal, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (station_id) DO NOTHING",
        )?;
        let mut inserted = 0;
        for s in rows {
            inserted += tx.execute(
                &stmt,
                &[
                    &s.station_id,
                    &s.station_name,
                    &s.country,
                    &s.region_id,
                    &s.latitude,
                    &s.longitude,
                    &s.elevation,
                    &s.is_coastal,
                    &s.is_active,
                ],
            )? as usize;
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn update_stations(&mut self, rows: &[Station]) -> Result<usize, StoreError> {
        let mut tx = self.client.transaction()?;
        let stmt = tx.prepare(
            "UPDATE weather_stations
             SET station_name = $2, country = $3, region_id = $4, latitude = $5, longitude = $6,
                 elevation = $7, is_coastal = $8, is_active = $9
             WHERE station_id = $1",
        )?;
        let mut written = 0;
        for s in rows {
            written += tx.execute(
                &stmt,
                &[
                    &s.station_id,
                    &s.station_name,
                    &s.country,
                    &s.region_id,
                    &s.latitude,
                    &s.longitude,
                    &s.elevation,
                    &s.is_coastal,
                    &s.is_active,
                ],
            )? as usize;
        }
        tx.commit()?;
        Ok(written)
    }

    // --- Observations -------------------------------------------------------

    fn find_observation(
        &mut self,
        station: i64,
        date: NaiveDate,
    ) -> Result<Option<Observation>, StoreError> {
        let row = self.client.query_opt(
            &format!(
                "SELECT {} FROM climate_observations WHERE station_id = $1 AND observation_date = $2",
                OBSERVATION_COLUMNS
            ),
            &[&station, &date],
        )?;
        row.as_ref().map(observation_from_row).transpose()
    }

    fn insert_observations(&mut self, rows: &[Observation]) -> Result<usize, StoreError> {
        let mut tx = self.client.transaction()?;
        let stmt = tx.prepare(&format!(
            "INSERT INTO climate_observations ({})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (station_id, observation_date) DO NOTHING",
            OBSERVATION_COLUMNS
        ))?;
        let mut inserted = 0;
        for o in rows {
            inserted += tx.execute(
                &stmt,
                &[
                    &o.station,
                    &o.observation_date,
                    &o.year,
                    &o.month,
                    &o.temp_max,
                    &o.temp_min,
                    &o.temp_mean,
                    &o.precipitation,
                    &o.humidity,
                    &o.sea_surface_temp,
                    &o.ocean_salinity,
                    &o.data_quality.as_str(),
                ],
            )? as usize;
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn update_observations(&mut self, rows: &[Observation]) -> Result<usize, StoreError> {
        let mut tx = self.client.transaction()?;
        let stmt = tx.prepare(
            "UPDATE climate_observations
             SET year = $3, month = $4, temp_max = $5, temp_min = $6, temp_mean = $7,
                 precipitation = $8, humidity = $9, sea_surface_temp = $10, ocean_salinity = $11,
                 data_quality = $12
             WHERE station_id = $1 AND observation_date = $2",
        )?;
        let mut written = 0;
        for o in rows {
            written += tx.execute(
                &stmt,
                &[
                    &o.station,
                    &o.observation_date,
                    &o.year,
                    &o.month,
                    &o.temp_max,
                    &o.temp_min,
                    &o.temp_mean,
                    &o.precipitation,
                    &o.humidity,
                    &o.sea_surface_temp,
                    &o.ocean_salinity,
                    &o.data_quality.as_str(),
                ],
            )? as usize;
        }
        tx.commit()?;
        Ok(written)
    }

    fn station_observations(&mut self, station: i64, limit: usize) -> Result<Vec<Observation>, StoreError> {
        let limit = limit as i64;
        let rows = self.client.query(
            &format!(
                "SELECT {} FROM climate_observations WHERE station_id = $1
                 ORDER BY observation_date DESC LIMIT $2",
                OBSERVATION_COLUMNS
            ),
            &[&station, &limit],
        )?;
        collect(rows, observation_from_row)
    }

    // --- Scenarios ----------------------------------------------------------

    fn insert_scenario(&mut self, s: &Scenario) -> Result<Scenario, StoreError> {
        let row = self.client.query_one(
            &format!(
                "INSERT INTO test_scenarios (name, category, description, test_query, record_count, is_active)
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
                SCENARIO_COLUMNS
            ),
            &[&s.name, &s.category.as_str(), &s.description, &s.test_query, &s.record_count, &s.is_active],
        )?;
        scenario_from_row(&row)
    }

    fn find_scenario(&mut self, id: i64) -> Result<Option<Scenario>, StoreError> {
        let row = self
            .client
            .query_opt(&format!("SELECT {} FROM test_scenarios WHERE id = $1", SCENARIO_COLUMNS), &[&id])?;
        row.as_ref().map(scenario_from_row).transpose()
    }

    fn find_scenario_by_name(&mut self, name: &str) -> Result<Option<Scenario>, StoreError> {
        let row = self.client.query_opt(
            &format!("SELECT {} FROM test_scenarios WHERE name = $1", SCENARIO_COLUMNS),
            &[&name],
        )?;
        row.as_ref().map(scenario_from_row).transpose()
    }

    fn list_scenarios(&mut self, active_only: bool) -> Result<Vec<Scenario>, StoreError> {
        let rows = self.client.query(
            &format!(
                "SELECT {} FROM test_scenarios WHERE is_active OR NOT $1 ORDER BY category, name",
                SCENARIO_COLUMNS
            ),
            &[&active_only],
        )?;
        collect(rows, scenario_from_row)
    }

    // --- Benchmarks and metrics ---------------------------------------------

    fn insert_benchmark(&mut self, b: &Benchmark) -> Result<Benchmark, StoreError> {
        let row = self.client.query_one(
            &format!(
                "INSERT INTO benchmark_results
                     (scenario_id, query_executed, execution_time, rows_processed, rows_returned,
                      status, error_message, executed_at, simulated)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
                BENCHMARK_COLUMNS
            ),
            &[
                &b.scenario_id,
                &b.query_executed,
                &b.execution_time,
                &b.rows_processed,
                &b.rows_returned,
                &b.status.as_str(),
                &b.error_message,
                &b.executed_at,
                &b.simulated,
            ],
        )?;
        benchmark_from_row(&row)
    }

    fn find_benchmark(&mut self, id: i64) -> Result<Option<Benchmark>, StoreError> {
        let row = self.client.query_opt(
            &format!("SELECT {} FROM benchmark_results WHERE id = $1", BENCHMARK_COLUMNS),
            &[&id],
        )?;
        row.as_ref().map(benchmark_from_row).transpose()
    }

    fn recent_benchmarks(&mut self, limit: usize) -> Result<Vec<Benchmark>, StoreError> {
        let limit = limit as i64;
        let rows = self.client.query(
            &format!(
                "SELECT {} FROM benchmark_results ORDER BY executed_at DESC, id DESC LIMIT $1",
                BENCHMARK_COLUMNS
            ),
            &[&limit],
        )?;
        collect(rows, benchmark_from_row)
    }

    fn insert_metric(&mut self, m: &Metric) -> Result<Metric, StoreError> {
        let row = self.client.query_one(
            &format!(
                "INSERT INTO performance_metrics (benchmark_id, metric_name, metric_value, unit, target_value, status)
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
                METRIC_COLUMNS
            ),
            &[&m.benchmark_id, &m.name, &m.value, &m.unit, &m.target, &m.status.as_str()],
        )?;
        metric_from_row(&row)
    }

    fn benchmark_metrics(&mut self, benchmark_id: i64) -> Result<Vec<Metric>, StoreError> {
        let rows = self.client.query(
            &format!(
                "SELECT {} FROM performance_metrics WHERE benchmark_id = $1 ORDER BY metric_name",
                METRIC_COLUMNS
            ),
            &[&benchmark_id],
        )?;
        collect(rows, metric_from_row)
    }

    // --- Configurations and recommendations ---------------------------------

    fn get_or_create_configuration(
        &mut self,
        seed: &Configuration,
    ) -> Result<(Configuration, bool), StoreError> {
        let inserted = self.client.query_opt(
            &format!(
                "INSERT INTO hive_configurations
                     (name, description, setting_key, setting_value, category, impact_level)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (setting_key, setting_value) DO NOTHING
                 RETURNING {}",
                CONFIGURATION_COLUMNS
            ),
            &[
                &seed.name,
                &seed.description,
                &seed.setting_key,
                &seed.setting_value,
                &seed.category.as_str(),
                &seed.impact_level.as_str(),
            ],
        )?;
        if let Some(row) = inserted {
            return Ok((configuration_from_row(&row)?, true));
        }

        let row = self.client.query_one(
            &format!(
                "SELECT {} FROM hive_configurations WHERE setting_key = $1 AND setting_value = $2",
                CONFIGURATION_COLUMNS
            ),
            &[&seed.setting_key, &seed.setting_value],
        )?;
        Ok((configuration_from_row(&row)?, false))
    }

    fn find_configuration(&mut self, id: i64) -> Result<Option<Configuration>, StoreError> {
        let row = self.client.query_opt(
            &format!("SELECT {} FROM hive_configurations WHERE id = $1", CONFIGURATION_COLUMNS),
            &[&id],
        )?;
        row.as_ref().map(configuration_from_row).transpose()
    }

    fn insert_recommendation(&mut self, r: &Recommendation) -> Result<Recommendation, StoreError> {
        let row = self.client.query_one(
            &format!(
                "INSERT INTO recommendations
                     (benchmark_id, configuration_id, priority, reason, expected_improvement, is_applied, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
                RECOMMENDATION_COLUMNS
            ),
            &[
                &r.benchmark_id,
                &r.configuration_id,
                &r.priority.as_str(),
                &r.reason,
                &r.expected_improvement,
                &r.is_applied,
                &r.created_at,
            ],
        )?;
        recommendation_from_row(&row)
    }

    fn benchmark_recommendations(&mut self, benchmark_id: i64) -> Result<Vec<Recommendation>, StoreError> {
        let rows = self.client.query(
            &format!("SELECT {} FROM recommendations WHERE benchmark_id = $1 ORDER BY id", RECOMMENDATION_COLUMNS),
            &[&benchmark_id],
        )?;
        collect(rows, recommendation_from_row)
    }

    fn list_recommendations(&mut self, limit: usize) -> Result<Vec<Recommendation>, StoreError> {
        let limit = limit as i64;
        let rows = self.client.query(
            &format!(
                "SELECT {} FROM recommendations ORDER BY created_at DESC, id DESC LIMIT $1",
                RECOMMENDATION_COLUMNS
            ),
            &[&limit],
        )?;
        collect(rows, recommendation_from_row)
    }

    fn set_recommendation_applied(&mut self, id: i64, applied: bool) -> Result<bool, StoreError> {
        let n = self
            .client
            .execute("UPDATE recommendations SET is_applied = $2 WHERE id = $1", &[&id, &applied])?;
        Ok(n > 0)
    }

    // --- Import logs --------------------------------------------------------

    fn insert_import_log(&mut self, log: &ImportLog) -> Result<ImportLog, StoreError> {
        let row = self.client.query_one(
            &format!(
                "INSERT INTO data_import_logs
                     (import_type, source, start_time, end_time, status, records_processed,
                      records_imported, records_updated, records_failed, error_message)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
                IMPORT_LOG_COLUMNS
            ),
            &[
                &log.import_type.as_str(),
                &log.source,
                &log.start_time,
                &log.end_time,
                &log.status.as_str(),
                &log.records_processed,
                &log.records_imported,
                &log.records_updated,
                &log.records_failed,
                &log.error_message,
            ],
        )?;
        import_log_from_row(&row)
    }

    fn update_import_log(&mut self, log: &ImportLog) -> Result<(), StoreError> {
        let n = self.client.execute(
            "UPDATE data_import_logs
             SET end_time = $2, status = $3, records_processed = $4, records_imported = $5,
                 records_updated = $6, records_failed = $7, error_message = $8
             WHERE id = $1",
            &[
                &log.id,
                &log.end_time,
                &log.status.as_str(),
                &log.records_processed,
                &log.records_imported,
                &log.records_updated,
                &log.records_failed,
                &log.error_message,
            ],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound { entity: "import log", key: log.id.to_string() });
        }
        Ok(())
    }

    fn recent_import_logs(&mut self, limit: usize) -> Result<Vec<ImportLog>, StoreError> {
        let limit = limit as i64;
        let rows = self.client.query(
            &format!(
                "SELECT {} FROM data_import_logs ORDER BY start_time DESC, id DESC LIMIT $1",
                IMPORT_LOG_COLUMNS
            ),
            &[&limit],
        )?;
        collect(rows, import_log_from_row)
    }

    // --- Housekeeping -------------------------------------------------------

    fn counts(&mut self) -> Result<StoreCounts, StoreError> {
        Ok(StoreCounts {
            regions: self.count("regions")?,
            stations: self.count("weather_stations")?,
            observations: self.count("climate_observations")?,
            scenarios: self.count("test_scenarios")?,
            benchmarks: self.count("benchmark_results")?,
            configurations: self.count("hive_configurations")?,
            recommendations: self.count("recommendations")?,
        })
    }

    fn clear_climate_data(&mut self) -> Result<(), StoreError> {
        let mut tx = self.client.transaction()?;
        tx.execute("DELETE FROM climate_observations", &[])?;
        tx.execute("DELETE FROM weather_stations", &[])?;
        tx.execute("DELETE FROM regions", &[])?;
        tx.commit()?;
        logging::info(LogSource::Store, None, "cleared regions, stations and observations");
        Ok(())
    }
}
