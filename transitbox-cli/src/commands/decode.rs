//! `transitbox decode`: inspect a saved feed payload.

use std::path::PathBuf;

use clap::Args;
use transitbox::feed::{FeedDecoder, FeedSnapshot};
use transitbox::registry::{Color, VehicleRecord};
use transitbox::render::FeatureCollection;

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// File holding a serialized FeedMessage
    pub file: PathBuf,

    /// The payload carries a varint length prefix
    #[arg(long)]
    pub length_delimited: bool,

    /// Print the vehicle layer as GeoJSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Vehicle color for --json output, e.g. #00C8FF
    #[arg(long, default_value_t = Color::default())]
    pub color: Color,
}

pub fn run(args: DecodeArgs) -> Result<(), CliError> {
    let bytes = std::fs::read(&args.file)?;
    let decoder = FeedDecoder::new();
    let snapshot = if args.length_delimited {
        decoder.decode_length_delimited(&bytes)?
    } else {
        decoder.decode(&bytes)?
    };

    let records = records(&snapshot, args.color);
    if args.json {
        let json = FeatureCollection::from_records(&records)
            .to_json()
            .map_err(|e| CliError::Runtime(format!("Failed to serialize GeoJSON: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    print_summary(&args, bytes.len(), &snapshot);
    print_table(&records);
    Ok(())
}

fn records(snapshot: &FeedSnapshot, color: Color) -> Vec<VehicleRecord> {
    snapshot
        .vehicles()
        .map(|(id, report)| VehicleRecord::from_report(id, report, color))
        .collect()
}

fn print_summary(args: &DecodeArgs, size: usize, snapshot: &FeedSnapshot) {
    let deleted = snapshot.entities.iter().filter(|e| e.is_deleted).count();

    println!("{} ({} bytes)", args.file.display(), size);
    println!("  Version:        {}", or_dash(&snapshot.version));
    println!("  Incrementality: {:?}", snapshot.incrementality);
    println!("  Timestamp:      {}", format_timestamp(snapshot.timestamp));
    println!(
        "  Entities:       {} ({} vehicles, {} deleted)",
        snapshot.entities.len(),
        snapshot.vehicle_count(),
        deleted
    );
    if snapshot.rejected_positions > 0 {
        println!(
            "  Rejected:       {} positions with unusable coordinates",
            snapshot.rejected_positions
        );
    }
    println!();
}

fn print_table(records: &[VehicleRecord]) {
    if records.is_empty() {
        println!("No vehicle positions.");
        return;
    }

    println!(
        "{:<16} {:>10} {:>11} {:>7} {:>7} {:<10} {}",
        "ID", "LAT", "LON", "HDG", "SPEED", "ROUTE", "LABEL"
    );
    for record in records {
        println!(
            "{:<16} {:>10.5} {:>11.5} {:>7} {:>7} {:<10} {}",
            record.id,
            record.latitude,
            record.longitude,
            record
                .heading
                .map_or_else(|| "-".to_string(), |h| format!("{:.0}", h)),
            record
                .speed
                .map_or_else(|| "-".to_string(), |s| format!("{:.1}", s)),
            record.route_id.as_deref().unwrap_or("-"),
            record.label,
        );
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}
