// Run artifact struct definitions
//
// The annotation document persisted as detections.json. It follows the COCO
// object-detection layout, plus a per-annotation confidence.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: u64,
    pub file_name: String,
    pub height: u32,
    pub width: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    /// `[x, y, width, height]` in pixels
    pub bbox: [f64; 4],
    pub area: f64,
    pub iscrowd: u8,
    /// Always empty; only boxes are produced.
    pub segmentation: Vec<Vec<f64>>,
    pub confidence: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CategoryRecord {
    pub id: u64,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AnnotationDocument {
    pub images: Vec<ImageRecord>,
    pub annotations: Vec<AnnotationRecord>,
    pub categories: Vec<CategoryRecord>,
}
