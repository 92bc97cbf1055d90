use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// One model prediction in absolute pixel corners.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub confidence: f32,
    pub label: String,
}

/// Summary of the frame sampling stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameExtractionMetrics {
    /// Number of read attempts made against the source.
    pub total_frames_in_video: usize,
    pub frames_extracted: usize,
    pub frames_dropped: usize,
    pub frame_drop_ratio: f64,
}

impl FrameExtractionMetrics {
    pub fn new(total: usize, extracted: usize, dropped: usize) -> Self {
        let frame_drop_ratio = if total > 0 {
            dropped as f64 / total as f64
        } else {
            0.0
        };
        Self {
            total_frames_in_video: total,
            frames_extracted: extracted,
            frames_dropped: dropped,
            frame_drop_ratio,
        }
    }

    /// Flattened `(name, value)` pairs in declaration order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("total_frames_in_video", self.total_frames_in_video.to_string()),
            ("frames_extracted", self.frames_extracted.to_string()),
            ("frames_dropped", self.frames_dropped.to_string()),
            ("frame_drop_ratio", format!("{:?}", self.frame_drop_ratio)),
        ]
    }
}

/// Detection counts per label, kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassDistribution(Vec<(String, usize)>);

impl ClassDistribution {
    pub fn increment(&mut self, label: &str) {
        match self.0.iter_mut().find(|(name, _)| name == label) {
            Some((_, count)) => *count += 1,
            None => self.0.push((label.to_string(), 1)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    /// Entries by descending count. The sort is stable, so ties keep
    /// first-seen order.
    pub fn sorted_by_count(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }
}

#[cfg(test)]
impl ClassDistribution {
    pub fn get(&self, label: &str) -> Option<usize> {
        self.iter().find(|(name, _)| *name == label).map(|(_, count)| count)
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for ClassDistribution {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl Serialize for ClassDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, count) in &self.0 {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}

/// Summary of the detection stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionMetrics {
    pub images_processed: usize,
    pub total_detections: usize,
    pub detections_per_frame_avg: f64,
    pub class_distribution: ClassDistribution,
}

impl DetectionMetrics {
    /// Scalar fields only; the class distribution is flattened separately.
    pub fn scalar_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("images_processed", self.images_processed.to_string()),
            ("total_detections", self.total_detections.to_string()),
            (
                "detections_per_frame_avg",
                format!("{:?}", self.detections_per_frame_avg),
            ),
        ]
    }
}

/// Everything the report and the ledger are built from. Sections are optional
/// so a partial run still renders.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsBundle {
    pub frame_extraction: Option<FrameExtractionMetrics>,
    pub object_detection: Option<DetectionMetrics>,
    /// `(stage, seconds)` in the order the stages ran.
    pub stage_times: Vec<(String, f64)>,
}

impl MetricsBundle {
    pub fn record_stage(&mut self, stage: &str, seconds: f64) {
        self.stage_times.push((stage.to_string(), seconds));
    }
}
