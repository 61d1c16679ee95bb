//! Test data generation for race-validator.
//!
//! This crate writes synthetic GPX tracks, competitor registries and whole
//! race folders (tracks, references, registry and `config.json`) to support
//! integration testing and manual runs of the validator.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_data::prelude::*;
//!
//! let race = RaceBuilder::new("demo")
//!     .reference_distance("Elite", 40_000.0)
//!     .competitor(CompetitorFixture::new("C1", "Elite", 42_000.0))
//!     .competitor(CompetitorFixture::new("C2", "Elite", 38_000.0).chicken_way_penalty())
//!     .write()?;
//! ```

pub mod gpx;
pub mod registry;
pub mod scenario;
pub mod tracks;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::gpx::{TrackPointData, generate_gpx};
    pub use crate::registry::{CompetitorRow, write_registry};
    pub use crate::scenario::{
        CompetitorFixture, FixtureError, RaceBuilder, RaceFolder, steady_climb,
    };
    pub use crate::tracks::{
        ElevationProfile, TrackConfig, TrackGenerator, default_start_time, meters_to_lat_degrees,
    };
}
