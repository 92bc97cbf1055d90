use crate::error::PipelineError;
use crate::pipeline::types::MetricsBundle;
use anyhow::Result;
use std::fs;
use std::path::Path;

/// Render the Markdown summary. Every section heading is always present;
/// missing data shows up as a "not available" line.
pub fn render_report(bundle: &MetricsBundle) -> String {
    let mut out = String::from("# MLOps Pipeline Report\n\n");
    out.push_str(
        "This report summarizes the key metrics and performance of the video pre-tagging pipeline.\n\n",
    );

    out.push_str("## Pipeline Timings\n");
    if bundle.stage_times.is_empty() {
        out.push_str("No pipeline stage timing data available.\n");
    } else {
        for (stage, seconds) in &bundle.stage_times {
            out.push_str(&format!(
                "- **{}:** {:.2} seconds\n",
                title_case(stage),
                seconds
            ));
        }
    }
    out.push('\n');

    out.push_str("## Dataset Statistics\n");
    out.push_str("### Frame Extraction Metrics\n");
    match &bundle.frame_extraction {
        Some(fe) => {
            out.push_str(&format!(
                "- **Total Frames in Video:** {}\n",
                fe.total_frames_in_video
            ));
            out.push_str(&format!("- **Frames Extracted:** {}\n", fe.frames_extracted));
            out.push_str(&format!("- **Frames Dropped:** {}\n", fe.frames_dropped));
            out.push_str(&format!(
                "- **Frame Drop Ratio:** {:.2}%\n",
                fe.frame_drop_ratio * 100.0
            ));
        }
        None => out.push_str("No frame extraction metrics available.\n"),
    }
    out.push('\n');

    out.push_str("### Object Detection Metrics\n");
    match &bundle.object_detection {
        Some(od) => {
            out.push_str(&format!("- **Images Processed:** {}\n", od.images_processed));
            out.push_str(&format!("- **Total Detections:** {}\n", od.total_detections));
            out.push_str(&format!(
                "- **Average Detections per Frame:** {:.2}\n",
                od.detections_per_frame_avg
            ));

            out.push_str("\n#### Class Distribution\n");
            if od.class_distribution.is_empty() {
                out.push_str("No detections found or class distribution data available.\n");
            } else {
                for (label, count) in od.class_distribution.sorted_by_count() {
                    out.push_str(&format!("- **{}:** {} detections\n", label, count));
                }
            }
        }
        None => out.push_str("No object detection metrics available.\n"),
    }
    out.push('\n');

    out
}

/// Render and overwrite `output_path`.
pub fn write_report(bundle: &MetricsBundle, output_path: &Path) -> Result<()> {
    let content = render_report(bundle);
    fs::write(output_path, content).map_err(|source| PipelineError::ReportWrite {
        path: output_path.to_path_buf(),
        source,
    })?;
    tracing::info!("Report saved to: {:?}", output_path);
    Ok(())
}

/// `frame_extraction` -> `Frame Extraction`
fn title_case(stage: &str) -> String {
    stage
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
