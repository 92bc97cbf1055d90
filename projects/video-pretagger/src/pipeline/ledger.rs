use crate::pipeline::types::MetricsBundle;
use anyhow::Result;
use std::fs::OpenOptions;
use std::path::Path;

/// Flatten a bundle into ordered `(column, value)` pairs.
///
/// The column set follows whatever sections the bundle carries, so runs with
/// different sections produce rows with different shapes in the same ledger.
pub fn ledger_row(
    bundle: &MetricsBundle,
    video_path: &str,
    timestamp: &str,
) -> Result<Vec<(String, String)>> {
    let mut row = vec![
        ("timestamp".to_string(), timestamp.to_string()),
        ("video_path".to_string(), video_path.to_string()),
    ];

    for (stage, seconds) in &bundle.stage_times {
        row.push((format!("time_{}", stage), format!("{:?}", seconds)));
    }

    if let Some(fe) = &bundle.frame_extraction {
        for (name, value) in fe.fields() {
            row.push((format!("fe_{}", name), value));
        }
    }

    let distribution = match &bundle.object_detection {
        Some(od) => serde_json::to_string(&od.class_distribution)?,
        None => "{}".to_string(),
    };
    row.push(("od_class_distribution".to_string(), distribution));

    if let Some(od) = &bundle.object_detection {
        for (name, value) in od.scalar_fields() {
            row.push((format!("od_{}", name), value));
        }
    }

    Ok(row)
}

/// Append one row for this run, writing the header first when the ledger
/// file does not exist yet.
pub fn append_ledger_row(
    bundle: &MetricsBundle,
    video_path: &str,
    ledger_path: &Path,
) -> Result<()> {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let row = ledger_row(bundle, video_path, &timestamp)?;

    let file_exists = ledger_path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(ledger_path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(file);

    if !file_exists {
        writer.write_record(row.iter().map(|(column, _)| column))?;
    }
    writer.write_record(row.iter().map(|(_, value)| value))?;
    writer.flush()?;

    tracing::info!("Metrics logged to CSV: {:?}", ledger_path);
    Ok(())
}
