//! hivesync_service: climate data sync and Hive performance assessment.
//!
//! Regions, weather stations and daily observations are pulled from a Hive
//! warehouse (or CSV exports of it) into a local relational store, and Hive
//! query scenarios are benchmarked, graded and turned into configuration
//! recommendations.

pub mod assessment;
pub mod config;
pub mod generate;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod source;
pub mod store;
pub mod sync;
