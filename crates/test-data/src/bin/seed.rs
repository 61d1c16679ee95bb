//! Default seed script - writes a demo race folder
//!
//! Run with:
//! ```
//! cargo run -p test-data --bin seed -- [output-dir]
//! ```
//!
//! Then validate it with `race-validator --config <output-dir>/config.json`.

use rand::Rng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use test_data::prelude::*;
use tracing_subscriber::EnvFilter;

const CATEGORIES: [(&str, f64); 3] = [("Elite", 42_000.0), ("Sport", 30_000.0), ("Hobby", 18_000.0)];

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let root = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("race-validator-demo"));

    let mut rng = rand::rngs::StdRng::seed_from_u64(12345); // Reproducible data
    let mut builder = RaceBuilder::at(root).with_seed(12345);

    for (category, distance) in CATEGORIES {
        builder = builder.reference(
            category,
            TrackGenerator::new()
                .with_distance(distance)
                .with_elevation(steady_climb(distance, distance / 40.0)),
        );

        // Most riders finish close to the reference, a few cut the course.
        let ratio = Normal::new(1.02, 0.04)?;
        let speed = Normal::<f64>::new(7.5, 1.2)?;
        for n in 1..=8 {
            let id = format!("{}{:02}", &category[..1], n);
            let ridden = distance * ratio.sample(&mut rng);
            let mut competitor = CompetitorFixture::new(&id, category, ridden)
                .team(&format!("Team {}", n % 3 + 1), "Rider", &id)
                .bike("Demo", "Trail")
                .in_folder(category)
                .with_track(|track| {
                    track
                        .with_speed(speed.sample(&mut rng).max(2.0))
                        .with_elevation(steady_climb(ridden, distance / 40.0))
                        .with_elevation_jitter(2.0)
                });
            if rng.gen_bool(0.15) {
                competitor = competitor.gas_compensation();
            }
            if rng.gen_bool(0.1) {
                competitor = competitor.chicken_way_penalty();
            }
            builder = builder.competitor(competitor);
        }
    }

    builder = builder
        .competitor(CompetitorFixture::new("X99", "Sport", 12_000.0).unregistered())
        .competitor(
            CompetitorFixture::new("U01", "Hobby", 18_500.0)
                .with_track(TrackGenerator::untimed),
        );

    let race = builder.write()?;

    tracing::info!("Seed completed!");
    tracing::info!("  Race folder: {}", race.root.display());
    tracing::info!("  Config:      {}", race.config_file.display());
    tracing::info!("  Categories:  {}", CATEGORIES.len());

    Ok(())
}
