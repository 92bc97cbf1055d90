use crate::error::PipelineError;
use crate::pipeline::detection::Detector;
use crate::pipeline::types::{ClassDistribution, Detection, DetectionMetrics};
use crate::run_artifacts::{AnnotationDocument, AnnotationRecord, CategoryRecord, ImageRecord};
use crate::run_context::list_images;
use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use opencv::core::Mat;
use opencv::imgcodecs;
use opencv::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub struct AnnotationOutcome {
    pub document: AnnotationDocument,
    pub metrics: DetectionMetrics,
}

/// Label to category id, ids handed out 1, 2, 3... in first-seen order.
#[derive(Debug, Default)]
pub struct CategoryRegistry {
    records: Vec<CategoryRecord>,
    index: HashMap<String, u64>,
}

impl CategoryRegistry {
    pub fn resolve(&mut self, label: &str) -> u64 {
        if let Some(id) = self.index.get(label) {
            return *id;
        }
        let id = self.records.len() as u64 + 1;
        self.index.insert(label.to_string(), id);
        self.records.push(CategoryRecord {
            id,
            name: label.to_string(),
        });
        id
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<CategoryRecord> {
        self.records
    }
}

/// Accumulates images and their detections into one document.
#[derive(Default)]
pub struct DocumentBuilder {
    images: Vec<ImageRecord>,
    annotations: Vec<AnnotationRecord>,
    categories: CategoryRegistry,
    distribution: ClassDistribution,
}

impl DocumentBuilder {
    /// Register a processed image and its detections; returns the image id.
    pub fn add_image(
        &mut self,
        file_name: &str,
        height: u32,
        width: u32,
        detections: &[Detection],
    ) -> u64 {
        let image_id = self.images.len() as u64 + 1;
        self.images.push(ImageRecord {
            id: image_id,
            file_name: file_name.to_string(),
            height,
            width,
        });

        for det in detections {
            let category_id = self.categories.resolve(&det.label);
            let x = det.xmin as f64;
            let y = det.ymin as f64;
            let w = (det.xmax - det.xmin) as f64;
            let h = (det.ymax - det.ymin) as f64;
            self.annotations.push(AnnotationRecord {
                id: self.annotations.len() as u64 + 1,
                image_id,
                category_id,
                bbox: [x, y, w, h],
                area: w * h,
                iscrowd: 0,
                segmentation: Vec::new(),
                confidence: det.confidence,
            });
            self.distribution.increment(&det.label);
        }

        image_id
    }

    /// Close the document. `vocabulary` only fills the category list when no
    /// detection produced a category.
    pub fn finish(mut self, vocabulary: &[String]) -> AnnotationOutcome {
        if self.categories.is_empty() {
            for name in vocabulary {
                self.categories.resolve(name);
            }
        }

        let images_processed = self.images.len();
        let total_detections = self.annotations.len();
        let detections_per_frame_avg = if images_processed > 0 {
            total_detections as f64 / images_processed as f64
        } else {
            0.0
        };

        AnnotationOutcome {
            document: AnnotationDocument {
                images: self.images,
                annotations: self.annotations,
                categories: self.categories.into_records(),
            },
            metrics: DetectionMetrics {
                images_processed,
                total_detections,
                detections_per_frame_avg,
                class_distribution: self.distribution,
            },
        }
    }
}

/// Run the detector over every image in `image_dir` and write the resulting
/// annotation document to `output_path`.
///
/// Images that fail to decode or to run through the model are logged and
/// skipped, so image ids stay contiguous over the processed images only.
pub fn annotate<L>(
    image_dir: &Path,
    output_path: &Path,
    model_name: &str,
    load: L,
) -> Result<AnnotationOutcome>
where
    L: FnOnce(&str) -> Result<Box<dyn Detector>>,
{
    if !image_dir.is_dir() {
        tracing::error!("Image directory not found: {:?}", image_dir);
        return Err(PipelineError::ImageDirNotFound(image_dir.to_path_buf()).into());
    }

    let mut detector = load(model_name).map_err(|e| {
        tracing::error!("Failed to load detection model {}: {}", model_name, e);
        if e.is::<PipelineError>() {
            e
        } else {
            PipelineError::ModelLoad {
                model: model_name.to_string(),
                reason: e.to_string(),
            }
            .into()
        }
    })?;

    let images = list_images(image_dir).map_err(|e| {
        tracing::error!("Failed to list images in {:?}: {}", image_dir, e);
        e
    })?;
    if images.is_empty() {
        tracing::warn!("No image files found in {:?}. Skipping detection.", image_dir);
        let outcome = DocumentBuilder::default().finish(&[]);
        write_document(output_path, &outcome.document)?;
        return Ok(outcome);
    }

    tracing::info!("Starting pre-tagging of {} images...", images.len());
    let pb = ProgressBar::new(images.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images ({eta})")?
            .progress_chars("#>-"),
    );

    let mut builder = DocumentBuilder::default();
    for path in &images {
        pb.inc(1);
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let image = match read_image(path) {
            Ok(image) => image,
            Err(e) => {
                tracing::error!("Error processing image {}: {}", file_name, e);
                continue;
            }
        };
        let detections = match detector.detect(&image) {
            Ok(detections) => detections,
            Err(e) => {
                tracing::error!("Error processing image {}: {}", file_name, e);
                continue;
            }
        };

        builder.add_image(
            &file_name,
            image.rows() as u32,
            image.cols() as u32,
            &detections,
        );
    }
    pb.finish_with_message("Done");

    let outcome = builder.finish(&detector.class_names());

    tracing::info!(
        "Pre-tagging complete: {} of {} images, {} detections",
        outcome.metrics.images_processed,
        images.len(),
        outcome.metrics.total_detections
    );

    write_document(output_path, &outcome.document)?;
    Ok(outcome)
}

fn read_image(path: &Path) -> Result<Mat> {
    let image = imgcodecs::imread(&path.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;
    if image.empty() {
        bail!("could not decode image");
    }
    Ok(image)
}

fn write_document(output_path: &Path, document: &AnnotationDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(document)?;
    fs::write(output_path, json).map_err(|source| {
        tracing::error!("Failed to save annotations to {:?}: {}", output_path, source);
        PipelineError::AnnotationWrite {
            path: output_path.to_path_buf(),
            source,
        }
    })?;
    tracing::info!("COCO-format annotations saved to {:?}", output_path);
    Ok(())
}
