//! Tabular export of validated records.

use std::path::PathBuf;

use time::PrimitiveDateTime;

use crate::config::{ExportParams, ValidationMode};
use crate::errors::ExportError;
use crate::models::ResultRecord;

pub const ADJUSTED_3D_HEADERS: [&str; 18] = [
    "Competitor Id",
    "Team",
    "Name",
    "Surname",
    "Bike Brand",
    "Bike Model",
    "Category",
    "Start Time",
    "Finish Time",
    "Total Time",
    "Total Distance 3d",
    "Min Distance 3d",
    "Gas Compensation",
    "Chicken Way Penalty",
    "Adjusted Total Distance",
    "Distance Difference",
    "Distance Ok",
    "No Time",
];

pub const PLANAR_HEADERS: [&str; 11] = [
    "Competitor Id",
    "Category",
    "Start Time",
    "Finish Time",
    "Total Time",
    "Total Distance 2d",
    "Total Distance 3d",
    "Min Distance 2d",
    "Distance Difference",
    "Distance Ok",
    "No Time",
];

/// Consumes the ordered records of a run and renders them somewhere.
pub trait ResultAggregator {
    type Output;

    fn aggregate(&mut self, records: &[ResultRecord]) -> Result<Self::Output, ExportError>;
}

/// Elapsed seconds as `[h]:mm:ss`; hours keep counting past a day.
pub fn format_duration(elapsed_seconds: f64) -> String {
    let total = elapsed_seconds.max(0.0).round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

/// Start and finish as they appear in exports.
pub fn format_timestamp(dt: PrimitiveDateTime) -> Result<String, time::error::Format> {
    dt.format(time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
}

/// Export file name carrying the generation timestamp.
pub fn export_file_name(generated_at: PrimitiveDateTime) -> Result<String, ExportError> {
    let stamp = generated_at.format(time::macros::format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))?;
    Ok(format!("race_results_{stamp}.csv"))
}

fn optional(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn km(value: f64) -> String {
    format!("{value:.3}")
}

fn row(record: &ResultRecord, mode: ValidationMode) -> Result<Vec<String>, ExportError> {
    let start = format_timestamp(record.start_time)?;
    let finish = format_timestamp(record.finish_time)?;
    let total = format_duration(record.elapsed_seconds);

    let row = match mode {
        ValidationMode::Adjusted3d => vec![
            record.competitor_id.clone(),
            optional(&record.team),
            optional(&record.name),
            optional(&record.surname),
            optional(&record.bike_brand),
            optional(&record.bike_model),
            optional(&record.category),
            start,
            finish,
            total,
            km(record.distance3d),
            km(record.min_distance),
            km(record.gas_compensation_km),
            km(record.chicken_way_penalty_km),
            km(record.adjusted_distance),
            km(record.distance_difference),
            record.distance_ok.to_string(),
            record.no_time.to_string(),
        ],
        ValidationMode::Planar => vec![
            record.competitor_id.clone(),
            optional(&record.category),
            start,
            finish,
            total,
            km(record.distance2d),
            km(record.distance3d),
            km(record.min_distance),
            km(record.distance_difference),
            record.distance_ok.to_string(),
            record.no_time.to_string(),
        ],
    };
    Ok(row)
}

/// Writes records as CSV into any writer.
pub fn write_csv<W: std::io::Write>(
    writer: W,
    records: &[ResultRecord],
    mode: ValidationMode,
) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    match mode {
        ValidationMode::Adjusted3d => wtr.write_record(ADJUSTED_3D_HEADERS)?,
        ValidationMode::Planar => wtr.write_record(PLANAR_HEADERS)?,
    }
    for record in records {
        wtr.write_record(row(record, mode)?)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes one timestamped CSV file per run into the output folder.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_folder: PathBuf,
    mode: ValidationMode,
    params: ExportParams,
    generated_at: PrimitiveDateTime,
}

impl CsvExporter {
    pub fn new(
        output_folder: impl Into<PathBuf>,
        mode: ValidationMode,
        params: ExportParams,
        generated_at: PrimitiveDateTime,
    ) -> Self {
        Self {
            output_folder: output_folder.into(),
            mode,
            params,
            generated_at,
        }
    }
}

impl ResultAggregator for CsvExporter {
    type Output = PathBuf;

    fn aggregate(&mut self, records: &[ResultRecord]) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.output_folder)?;
        let path = self.output_folder.join(export_file_name(self.generated_at)?);
        let partial = path.with_extension("csv.partial");

        tracing::debug!(
            "Export table {} on sheet {:?} (style {}) rendered as plain CSV",
            self.params.table_name,
            self.params.sheet_name,
            self.params.table_style_name
        );

        let result = std::fs::File::create(&partial)
            .map_err(ExportError::from)
            .and_then(|file| write_csv(std::io::BufWriter::new(file), records, self.mode));
        if let Err(e) = result {
            std::fs::remove_file(&partial).ok();
            return Err(e);
        }
        std::fs::rename(&partial, &path)?;

        tracing::info!("Wrote {} results to {}", records.len(), path.display());
        Ok(path)
    }
}
