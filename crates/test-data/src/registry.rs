//! Competitor registry CSV generation.

use std::path::Path;

use serde::Serialize;

/// One registry row, in the column order the validator reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompetitorRow {
    pub competitor_id: String,
    pub team: String,
    pub name: String,
    pub surname: String,
    pub bike_brand: String,
    pub bike_model: String,
    pub category: String,
    pub gas_compensation: bool,
    pub chicken_way_penalty: bool,
}

impl CompetitorRow {
    pub fn new(competitor_id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            competitor_id: competitor_id.into(),
            category: category.into(),
            ..Default::default()
        }
    }
}

pub fn write_registry(path: impl AsRef<Path>, rows: &[CompetitorRow]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
