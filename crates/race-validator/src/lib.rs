//! Validation of endurance-race GPS tracks.
//!
//! Each competitor's track is measured, matched against the minimum distance
//! of its category's reference track, adjusted for gas compensation and the
//! chicken-way penalty, and exported as one row per competitor.

pub mod config;
pub mod discovery;
pub mod errors;
pub mod export;
pub mod geometry;
pub mod models;
pub mod pipeline;
pub mod reference;
pub mod registry;
pub mod track_files;
pub mod validation;

pub use config::{RaceConfig, ValidationMode};
pub use errors::PipelineError;
pub use models::{CompetitorMetadata, GeoPoint, ResultRecord, Track};
pub use pipeline::{Pipeline, RunReport};
