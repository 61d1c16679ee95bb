//! Competitor metadata loaded once from a CSV registry.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::errors::RegistryError;
use crate::models::CompetitorMetadata;

/// One registry row. Columns beyond the nine known ones are ignored.
#[derive(Debug, Deserialize)]
struct RegistryRow {
    competitor_id: Option<String>,
    team: Option<String>,
    name: Option<String>,
    surname: Option<String>,
    bike_brand: Option<String>,
    bike_model: Option<String>,
    category: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    gas_compensation: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    chicken_way_penalty: bool,
}

/// Accepts the usual spreadsheet spellings of a boolean; blank is false.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "n" => Ok(false),
        "true" | "1" | "yes" | "y" | "x" => Ok(true),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean, found {other:?}"
        ))),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read-only lookup from competitor id to metadata.
#[derive(Debug, Clone, Default)]
pub struct CompetitorRegistry {
    competitors: HashMap<String, CompetitorMetadata>,
}

impl CompetitorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(csv::Error::from)?;
        let registry = Self::from_reader(file)?;
        tracing::info!(
            "Loaded {} competitors from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, RegistryError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let mut competitors = HashMap::new();
        for (index, record) in rdr.records().enumerate() {
            let record = record?;
            // Header is line 1
            let line = index + 2;
            if record.iter().all(str::is_empty) {
                tracing::debug!("Skipping blank registry row on line {line}");
                continue;
            }
            let row: RegistryRow = record.deserialize(Some(&headers))?;
            let Some(id) = non_blank(row.competitor_id) else {
                return Err(RegistryError::MissingId { row: line });
            };
            if competitors.contains_key(&id) {
                tracing::warn!("Duplicate competitor {id} on line {line}, keeping the first entry");
                continue;
            }
            let metadata = CompetitorMetadata {
                competitor_id: Some(id.clone()),
                team: non_blank(row.team),
                name: non_blank(row.name),
                surname: non_blank(row.surname),
                bike_brand: non_blank(row.bike_brand),
                bike_model: non_blank(row.bike_model),
                category: non_blank(row.category),
                gas_compensation: row.gas_compensation,
                chicken_way_penalty: row.chicken_way_penalty,
            };
            competitors.insert(id, metadata);
        }

        Ok(Self { competitors })
    }

    pub fn get(&self, competitor_id: &str) -> Option<&CompetitorMetadata> {
        self.competitors.get(competitor_id)
    }

    /// Metadata for `competitor_id`, or the all-absent record when unknown.
    pub fn lookup(&self, competitor_id: &str) -> CompetitorMetadata {
        self.get(competitor_id)
            .cloned()
            .unwrap_or_else(CompetitorMetadata::unknown)
    }

    pub fn len(&self) -> usize {
        self.competitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.competitors.is_empty()
    }
}
