//! Upsert reconciliation of externally sourced rows into the local store.
//!
//! A [`Reconciler`] walks a stream of raw inputs, asks its
//! [`ReconcileTarget`] to turn each one into a typed row (resolving foreign
//! keys and parsing fields), looks the row up by natural key, and stages it
//! for insertion, for update, or for nothing at all. Staged rows are flushed
//! in fixed-size batches.
//!
//! Nothing here is fatal. Every outcome ends up as a count in [`SyncStats`]:
//!
//! | outcome                                      | counted as  |
//! |----------------------------------------------|-------------|
//! | key absent, insert succeeded                 | `created`   |
//! | key present, some updatable field differs    | `updated`   |
//! | key present, nothing differs                 | `unchanged` |
//! | foreign key unresolved                       | `skipped`   |
//! | duplicate key (repeat in batch, lost race)   | `skipped`   |
//! | malformed field, lookup or batch write error | `errors`    |
//! | unreadable input (see [`Reconciler::run_fallible`]) | `errors` |

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;

use crate::logging::{self, LogSource};
use crate::model::StoreError;

/// Rows staged per flush. Bounds both memory and transaction size.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Counts produced by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl SyncStats {
    /// Total inputs accounted for.
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.unchanged + self.skipped + self.errors
    }

    pub fn merge(&mut self, other: &SyncStats) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} skipped, {} errors",
            self.created, self.updated, self.unchanged, self.skipped, self.errors
        )
    }
}

// ---------------------------------------------------------------------------
// Target contract
// ---------------------------------------------------------------------------

/// A row that can be matched against stored rows by natural key.
pub trait Reconcilable: Clone {
    type Key: Eq + Hash + Clone + fmt::Display;

    fn natural_key(&self) -> Self::Key;

    /// `true` when at least one updatable field differs from `existing`.
    fn differs_from(&self, existing: &Self) -> bool;
}

/// Result of preparing one raw input.
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared<R> {
    Ready(R),
    /// A required reference could not be resolved. Counted as skipped.
    Skip { key: String, reason: String },
    /// The input could not be turned into a row. Counted as an error.
    Reject { key: String, reason: String },
}

/// Storage-facing side of a reconciliation: one table keyed by natural key.
pub trait ReconcileTarget {
    type Input;
    type Row: Reconcilable;

    /// Resolve references and parse fields.
    fn prepare(&mut self, input: Self::Input) -> Prepared<Self::Row>;

    fn lookup(
        &mut self,
        key: &<Self::Row as Reconcilable>::Key,
    ) -> Result<Option<Self::Row>, StoreError>;

    /// Insert rows, silently dropping any whose key already exists.
    /// Returns how many were actually inserted.
    fn insert_batch(&mut self, rows: &[Self::Row]) -> Result<usize, StoreError>;

    /// Overwrite the updatable fields of existing rows, matched by key.
    /// Returns how many rows were found and written.
    fn update_batch(&mut self, rows: &[Self::Row]) -> Result<usize, StoreError>;
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

struct Pending<R: Reconcilable> {
    rows: Vec<R>,
    keys: HashSet<R::Key>,
}

impl<R: Reconcilable> Pending<R> {
    fn new() -> Self {
        Pending { rows: Vec::new(), keys: HashSet::new() }
    }

    fn push(&mut self, key: R::Key, row: R) {
        self.keys.insert(key);
        self.rows.push(row);
    }

    fn take(&mut self) -> Vec<R> {
        self.keys.clear();
        std::mem::take(&mut self.rows)
    }
}

/// Drives a [`ReconcileTarget`] over a stream of inputs.
#[derive(Debug, Clone)]
pub struct Reconciler {
    entity: &'static str,
    source: LogSource,
    batch_size: usize,
}

impl Reconciler {
    /// `entity` names the table in log lines ("stations", "observations").
    pub fn new(entity: &'static str, source: LogSource) -> Self {
        Reconciler { entity, source, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn run<T, I>(&self, target: &mut T, inputs: I) -> SyncStats
    where
        T: ReconcileTarget,
        I: IntoIterator<Item = T::Input>,
    {
        self.run_fallible(target, inputs.into_iter().map(Ok::<_, Infallible>))
    }

    /// Like [`Reconciler::run`] for sources that can fail on a single input,
    /// such as an undecodable file line. Each `Err` is counted in `errors`.
    pub fn run_fallible<T, I, E>(&self, target: &mut T, inputs: I) -> SyncStats
    where
        T: ReconcileTarget,
        I: IntoIterator<Item = Result<T::Input, E>>,
        E: fmt::Display,
    {
        let mut stats = SyncStats::default();
        let mut creates: Pending<T::Row> = Pending::new();
        let mut updates: Pending<T::Row> = Pending::new();

        for input in inputs {
            let input = match input {
                Ok(input) => input,
                Err(e) => {
                    logging::error(self.source, None, &format!("{}: unreadable input: {}", self.entity, e));
                    stats.errors += 1;
                    continue;
                }
            };
            match target.prepare(input) {
                Prepared::Ready(row) => {
                    self.stage(target, row, &mut creates, &mut updates, &mut stats);
                }
                Prepared::Skip { key, reason } => {
                    logging::warn(self.source, Some(&key), &reason);
                    stats.skipped += 1;
                }
                Prepared::Reject { key, reason } => {
                    logging::error(self.source, Some(&key), &reason);
                    stats.errors += 1;
                }
            }

            if creates.rows.len() >= self.batch_size {
                self.flush_creates(target, creates.take(), &mut stats);
            }
            if updates.rows.len() >= self.batch_size {
                self.flush_updates(target, updates.take(), &mut stats);
            }
        }

        if !creates.rows.is_empty() {
            self.flush_creates(target, creates.take(), &mut stats);
        }
        if !updates.rows.is_empty() {
            self.flush_updates(target, updates.take(), &mut stats);
        }

        logging::log_sync_summary(self.source, self.entity, &stats);
        stats
    }

    fn stage<T: ReconcileTarget>(
        &self,
        target: &mut T,
        row: T::Row,
        creates: &mut Pending<T::Row>,
        updates: &mut Pending<T::Row>,
        stats: &mut SyncStats,
    ) {
        let key = row.natural_key();

        // First occurrence wins until its batch is flushed.
        if creates.keys.contains(&key) || updates.keys.contains(&key) {
            logging::debug(self.source, Some(&key.to_string()), "duplicate key in batch, skipped");
            stats.skipped += 1;
            return;
        }

        match target.lookup(&key) {
            Ok(None) => creates.push(key, row),
            Ok(Some(existing)) => {
                if row.differs_from(&existing) {
                    updates.push(key, row);
                } else {
                    stats.unchanged += 1;
                }
            }
            Err(e) => {
                logging::error(self.source, Some(&key.to_string()), &format!("lookup failed: {}", e));
                stats.errors += 1;
            }
        }
    }

    fn flush_creates<T: ReconcileTarget>(&self, target: &mut T, rows: Vec<T::Row>, stats: &mut SyncStats) {
        match target.insert_batch(&rows) {
            Ok(inserted) => {
                let inserted = inserted.min(rows.len());
                stats.created += inserted;
                // Rows beaten to the key by a concurrent writer.
                stats.skipped += rows.len() - inserted;
                logging::debug(
                    self.source,
                    None,
                    &format!("{}: inserted {}/{} staged rows", self.entity, inserted, rows.len()),
                );
            }
            Err(e) => {
                logging::error(
                    self.source,
                    None,
                    &format!("{}: insert of {} rows failed: {}", self.entity, rows.len(), e),
                );
                stats.errors += rows.len();
            }
        }
    }

    fn flush_updates<T: ReconcileTarget>(&self, target: &mut T, rows: Vec<T::Row>, stats: &mut SyncStats) {
        match target.update_batch(&rows) {
            Ok(written) => {
                let written = written.min(rows.len());
                stats.updated += written;
                stats.skipped += rows.len() - written;
            }
            Err(e) => {
                logging::error(
                    self.source,
                    None,
                    &format!("{}: update of {} rows failed: {}", self.entity, rows.len(), e),
                );
                stats.errors += rows.len();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
