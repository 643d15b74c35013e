/// Data sync service.
///
/// Pulls regions, stations and observations into the local store, either
/// from the Hive warehouse (live mode) or from CSV exports (fallback mode),
/// and keeps one import log row per run.
///
/// Upstream connectivity failures abort the operation and are returned to
/// the caller; everything row-level ends up in [`SyncStats`].

pub mod regions;
pub mod targets;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::config::SyncSettings;
use crate::logging::{self, LogSource};
use crate::model::{ImportLog, ImportStatus, ImportType, SourceError, StoreError};
use crate::reconcile::{ReconcileTarget, Reconciler, SyncStats};
use crate::source::csv::CsvRecords;
use crate::source::{QuerySource, Record};
use crate::store::Store;

use self::regions::REGION_REGISTRY;
use self::targets::{ObservationTarget, StationTarget};

/// Columns a stations CSV must carry. `elevation`, `is_coastal` and
/// `is_active` are optional.
const REQUIRED_STATION_COLUMNS: &[&str] =
    &["station_id", "station_name", "country", "region", "latitude", "longitude"];

const REQUIRED_OBSERVATION_COLUMNS: &[&str] = &["station_id", "observation_date", "year", "month"];

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("upstream source failed: {0}")]
    Source(#[from] SourceError),
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
    #[error("no upstream source configured (Hive disabled); use the CSV loader instead")]
    NoSource,
    #[error("file not found: {0}")]
    MissingFile(PathBuf),
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FullSyncReport {
    pub regions: SyncStats,
    pub stations: SyncStats,
    pub observations: SyncStats,
    pub import_log_id: Option<i64>,
}

impl FullSyncReport {
    pub fn totals(&self) -> SyncStats {
        let mut total = SyncStats::default();
        total.merge(&self.stations);
        total.merge(&self.observations);
        total
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CsvLoadReport {
    pub regions: SyncStats,
    pub stations: Option<SyncStats>,
    pub observations: Option<SyncStats>,
    pub import_log_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    /// "hive" when an upstream source is attached, otherwise "csv".
    pub mode: &'static str,
    pub source: Option<String>,
    pub regions: usize,
    pub stations: usize,
    pub observations: usize,
    pub last_import: Option<ImportLog>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// One row per distinct station. `has_ocean_data` is non-null when the
/// station ever reported a sea surface temperature.
pub fn stations_query(table: &str) -> String {
    format!(
        "SELECT station_id, station_name, country, region, latitude, longitude, \
         MAX(sea_surface_temp) AS has_ocean_data \
         FROM {} \
         GROUP BY station_id, station_name, country, region, latitude, longitude",
        table
    )
}

/// Newest observations first, optionally bounded by date and count.
pub fn observations_query(
    table: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    limit: Option<usize>,
) -> String {
    let mut query = format!(
        "SELECT station_id, observation_date, year, month, temp_max, temp_min, temp_mean, \
         precipitation, humidity, sea_surface_temp, ocean_salinity FROM {}",
        table
    );

    let mut filters = Vec::new();
    if let Some(start) = start {
        filters.push(format!("observation_date >= '{}'", start.format("%Y-%m-%d")));
    }
    if let Some(end) = end {
        filters.push(format!("observation_date <= '{}'", end.format("%Y-%m-%d")));
    }
    if !filters.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&filters.join(" AND "));
    }

    query.push_str(" ORDER BY observation_date DESC");
    if let Some(limit) = limit {
        query.push_str(&format!(" LIMIT {}", limit));
    }
    query
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct DataSyncService<'a> {
    store: &'a mut dyn Store,
    source: Option<&'a mut dyn QuerySource>,
    table: String,
    batch_size: usize,
    import_log: Option<ImportLog>,
}

impl<'a> DataSyncService<'a> {
    pub fn new(store: &'a mut dyn Store, settings: &SyncSettings) -> Self {
        DataSyncService {
            store,
            source: None,
            table: settings.observations_table.clone(),
            batch_size: settings.batch_size,
            import_log: None,
        }
    }

    /// Attach the upstream warehouse. Without one only CSV loading works.
    pub fn with_source(mut self, source: &'a mut dyn QuerySource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn mode(&self) -> &'static str {
        if self.source.is_some() { "hive" } else { "csv" }
    }

    fn reconciler(&self, entity: &'static str, source: LogSource) -> Reconciler {
        Reconciler::new(entity, source).with_batch_size(self.batch_size)
    }

    fn query(&mut self, query: &str, operation: &str) -> Result<crate::source::QueryResult, SyncError> {
        let source = self.source.as_deref_mut().ok_or(SyncError::NoSource)?;
        let location = source.describe();
        source.execute(query).map_err(|e| {
            logging::log_source_failure(LogSource::Hive, &location, operation, &e);
            SyncError::Source(e)
        })
    }

    // --- Import log ---------------------------------------------------------

    pub fn start_import_log(&mut self, import_type: ImportType, source: &str) -> Result<&ImportLog, SyncError> {
        let log = self.store.insert_import_log(&ImportLog {
            id: 0,
            import_type,
            source: source.to_string(),
            start_time: Utc::now(),
            end_time: None,
            status: ImportStatus::Running,
            records_processed: 0,
            records_imported: 0,
            records_updated: 0,
            records_failed: 0,
            error_message: String::new(),
        })?;
        logging::info(LogSource::System, None, &format!("import #{} started ({}, {})", log.id, import_type, source));
        Ok(self.import_log.insert(log))
    }

    /// Close the current import log. A no-op when none was started.
    pub fn finish_import_log(
        &mut self,
        status: ImportStatus,
        totals: &SyncStats,
        error_message: &str,
    ) -> Result<Option<ImportLog>, SyncError> {
        let Some(mut log) = self.import_log.take() else {
            return Ok(None);
        };

        log.status = status;
        log.end_time = Some(Utc::now());
        log.records_processed = totals.processed() as i64;
        log.records_imported = totals.created as i64;
        log.records_updated = totals.updated as i64;
        log.records_failed = totals.errors as i64;
        log.error_message = error_message.to_string();
        self.store.update_import_log(&log)?;

        logging::info(
            LogSource::System,
            None,
            &format!(
                "import #{} {} after {:.1}s: {}",
                log.id,
                log.status,
                log.duration_secs().unwrap_or(0.0),
                totals
            ),
        );
        Ok(Some(log))
    }

    // --- Hive sync ----------------------------------------------------------

    /// Upsert the static region registry.
    pub fn sync_regions(&mut self) -> Result<SyncStats, SyncError> {
        let mut stats = SyncStats::default();
        for info in REGION_REGISTRY {
            let existing = match self.store.find_region(info.code) {
                Ok(found) => found.filter(|r| r.code == info.code),
                Err(e) => {
                    logging::error(LogSource::Store, Some(info.code), &format!("region lookup failed: {}", e));
                    stats.errors += 1;
                    continue;
                }
            };

            if let Some(region) = &existing {
                if region.name == info.name && region.description == info.description {
                    stats.unchanged += 1;
                    continue;
                }
            }

            match self.store.upsert_region(info.code, info.name, info.description) {
                Ok((_, true)) => stats.created += 1,
                Ok((_, false)) => stats.updated += 1,
                Err(e) => {
                    logging::error(LogSource::Store, Some(info.code), &format!("region upsert failed: {}", e));
                    stats.errors += 1;
                }
            }
        }
        logging::log_sync_summary(LogSource::System, "regions", &stats);
        Ok(stats)
    }

    pub fn sync_stations(&mut self) -> Result<SyncStats, SyncError> {
        logging::info(LogSource::Hive, Some(&self.table), "syncing weather stations");
        let query = stations_query(&self.table);
        let result = self.query(&query, "station query")?;
        logging::info(LogSource::Hive, Some(&self.table), &format!("retrieved {} stations", result.len()));

        let reconciler = self.reconciler("stations", LogSource::Hive);
        let mut target = StationTarget::new(&mut *self.store, LogSource::Hive);
        Ok(reconciler.run(&mut target, result.into_records()))
    }

    pub fn sync_observations(
        &mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        limit: Option<usize>,
    ) -> Result<SyncStats, SyncError> {
        logging::info(LogSource::Hive, Some(&self.table), "syncing climate observations");
        let query = observations_query(&self.table, start, end, limit);
        let result = self.query(&query, "observation query")?;
        logging::info(LogSource::Hive, Some(&self.table), &format!("retrieved {} observations", result.len()));

        let reconciler = self.reconciler("observations", LogSource::Hive);
        let mut target = ObservationTarget::new(&mut *self.store);
        Ok(reconciler.run(&mut target, result.into_records()))
    }

    /// Regions, then stations, then observations, under one import log.
    /// The first upstream failure marks the log failed and is returned.
    pub fn full_sync(&mut self, limit: Option<usize>) -> Result<FullSyncReport, SyncError> {
        logging::info(LogSource::System, None, "starting full data synchronization");
        let log_id = self.start_import_log(ImportType::Full, "hive")?.id;
        let mut report = FullSyncReport { import_log_id: Some(log_id), ..Default::default() };

        let outcome = self.run_full_sync(&mut report, limit);
        match outcome {
            Ok(()) => {
                self.finish_import_log(ImportStatus::Completed, &report.totals(), "")?;
                logging::info(LogSource::System, None, "full synchronization completed");
                Ok(report)
            }
            Err(e) => {
                logging::error(LogSource::System, None, &format!("full synchronization failed: {}", e));
                self.finish_import_log(ImportStatus::Failed, &report.totals(), &e.to_string())?;
                Err(e)
            }
        }
    }

    fn run_full_sync(&mut self, report: &mut FullSyncReport, limit: Option<usize>) -> Result<(), SyncError> {
        report.regions = self.sync_regions()?;
        report.stations = self.sync_stations()?;
        report.observations = self.sync_observations(None, None, limit)?;
        Ok(())
    }

    // --- CSV fallback -------------------------------------------------------

    pub fn load_stations_from_csv(&mut self, path: &Path) -> Result<SyncStats, SyncError> {
        let (stats, outcome) = self.stream_stations_csv(path);
        outcome.map(|()| stats)
    }

    pub fn load_observations_from_csv(&mut self, path: &Path, limit: Option<usize>) -> Result<SyncStats, SyncError> {
        let (stats, outcome) = self.stream_observations_csv(path, limit);
        outcome.map(|()| stats)
    }

    /// The stats cover every row handled before a failure, so callers can
    /// account for rows already committed.
    fn stream_stations_csv(&mut self, path: &Path) -> (SyncStats, Result<(), SyncError>) {
        let reader = match open_csv(path, None, REQUIRED_STATION_COLUMNS, "loading stations") {
            Ok(reader) => reader,
            Err(e) => return (SyncStats::default(), Err(e)),
        };
        let reconciler = self.reconciler("stations", LogSource::Csv);
        let mut target = StationTarget::new(&mut *self.store, LogSource::Csv);
        stream_csv(&reconciler, &mut target, reader)
    }

    fn stream_observations_csv(&mut self, path: &Path, limit: Option<usize>) -> (SyncStats, Result<(), SyncError>) {
        let reader = match open_csv(path, limit, REQUIRED_OBSERVATION_COLUMNS, "loading observations") {
            Ok(reader) => reader,
            Err(e) => return (SyncStats::default(), Err(e)),
        };
        let reconciler = self.reconciler("observations", LogSource::Csv);
        let mut target = ObservationTarget::new(&mut *self.store);
        stream_csv(&reconciler, &mut target, reader)
    }

    /// Regions from the registry, then whichever CSV files are given, under
    /// one manual import log.
    pub fn load_from_csv(
        &mut self,
        stations: Option<&Path>,
        observations: Option<&Path>,
        limit: Option<usize>,
    ) -> Result<CsvLoadReport, SyncError> {
        let log_id = self.start_import_log(ImportType::Manual, "csv")?.id;
        let mut report = CsvLoadReport { import_log_id: Some(log_id), ..Default::default() };

        let outcome = self.run_csv_load(&mut report, stations, observations, limit);
        let mut totals = SyncStats::default();
        for stats in [&report.stations, &report.observations].into_iter().flatten() {
            totals.merge(stats);
        }

        match outcome {
            Ok(()) => {
                self.finish_import_log(ImportStatus::Completed, &totals, "")?;
                Ok(report)
            }
            Err(e) => {
                self.finish_import_log(ImportStatus::Failed, &totals, &e.to_string())?;
                Err(e)
            }
        }
    }

    fn run_csv_load(
        &mut self,
        report: &mut CsvLoadReport,
        stations: Option<&Path>,
        observations: Option<&Path>,
        limit: Option<usize>,
    ) -> Result<(), SyncError> {
        report.regions = self.sync_regions()?;
        if let Some(path) = stations {
            let (stats, outcome) = self.stream_stations_csv(path);
            report.stations = Some(stats);
            outcome?;
        }
        if let Some(path) = observations {
            let (stats, outcome) = self.stream_observations_csv(path, limit);
            report.observations = Some(stats);
            outcome?;
        }
        Ok(())
    }

    // --- Status -------------------------------------------------------------

    pub fn status(&mut self) -> Result<SyncStatus, SyncError> {
        let counts = self.store.counts()?;
        let last_import = self.store.recent_import_logs(1)?.into_iter().next();
        Ok(SyncStatus {
            mode: self.mode(),
            source: self.source.as_deref().map(|s| s.describe()),
            regions: counts.regions,
            stations: counts.stations,
            observations: counts.observations,
            last_import,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

fn open_csv(
    path: &Path,
    limit: Option<usize>,
    required: &[&str],
    message: &str,
) -> Result<CsvRecords<BufReader<File>>, SyncError> {
    if !path.exists() {
        return Err(SyncError::MissingFile(path.to_path_buf()));
    }
    logging::info(LogSource::Csv, Some(&path.display().to_string()), message);

    let reader = CsvRecords::open(path, limit)?;
    reader.expect_columns(required)?;
    Ok(reader)
}

/// Reconcile every row of `reader`. Undecodable rows count as errors; a read
/// failure stops the stream and is returned next to the rows handled so far.
fn stream_csv<T, R>(
    reconciler: &Reconciler,
    target: &mut T,
    mut reader: CsvRecords<R>,
) -> (SyncStats, Result<(), SyncError>)
where
    T: ReconcileTarget<Input = Record>,
    R: BufRead,
{
    let stats = reconciler.run_fallible(target, &mut reader);
    let outcome = reader.finish().map(|_| ()).map_err(SyncError::from);
    (stats, outcome)
}
