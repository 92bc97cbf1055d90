use crate::error::PipelineError;
use crate::pipeline::types::Detection;
use anyhow::{anyhow, Result};
use image::{DynamicImage, ImageBuffer, Rgb};
use opencv::core::Mat;
use opencv::prelude::*;
use usls::models::RTDETR;
use usls::{Config, Image};

/// Anything that turns a BGR image into labelled boxes.
pub trait Detector {
    fn detect(&mut self, image: &Mat) -> Result<Vec<Detection>>;

    /// Static label vocabulary of the model, empty when it has none.
    fn class_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A wrapper around the USLS RT-DETR model that handles BGR-to-RGB conversion
/// and corrects for aspect-ratio padding bugs in the underlying model library.
pub struct ObjectDetector {
    model: RTDETR,
}

impl ObjectDetector {
    pub fn new(model_path: &str) -> Result<Self> {
        let config = Config::default()
            .with_model_file(model_path)
            .with_class_names(&usls::NAMES_COCO_80);

        #[cfg(target_os = "macos")]
        let config = config.with_model_device(usls::Device::CoreMl);

        let config = config.commit()?;
        let model = RTDETR::new(config)?;
        Ok(Self { model })
    }
}

/// Load the RT-DETR detector, reporting failures as `ModelLoad`.
pub fn load_detector(model_path: &str) -> Result<Box<dyn Detector>> {
    tracing::info!("Loading detection model: {}", model_path);
    let detector = ObjectDetector::new(model_path).map_err(|e| PipelineError::ModelLoad {
        model: model_path.to_string(),
        reason: format!("{:#}", e),
    })?;
    Ok(Box::new(detector))
}

impl Detector for ObjectDetector {
    fn detect(&mut self, image: &Mat) -> Result<Vec<Detection>> {
        let dynamic_image = mat_to_dynamic_image(image)?;

        // USLS RT-DETR reports boxes in the padded square; stretch them back.
        let size = image.size()?;
        let img_w = size.width as f32;
        let img_h = size.height as f32;
        let (x_corr, y_corr) = if img_w > img_h {
            (img_w / img_h, 1.0)
        } else if img_h > img_w {
            (1.0, img_h / img_w)
        } else {
            (1.0, 1.0)
        };

        let results = self.model.forward(&[Image::from(dynamic_image)])?;
        let Some(y) = results.into_iter().next() else {
            return Ok(Vec::new());
        };

        let detections = y
            .hbbs
            .into_iter()
            .map(|hbb| {
                let xmin = hbb.xmin() * x_corr;
                let ymin = hbb.ymin() * y_corr;
                let label = match (hbb.name(), hbb.id()) {
                    (Some(name), _) => name.to_string(),
                    (None, Some(id)) => usls::NAMES_COCO_80
                        .get(id)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("class_{}", id)),
                    (None, None) => "unknown".to_string(),
                };
                Detection {
                    xmin,
                    ymin,
                    xmax: xmin + hbb.width() * x_corr,
                    ymax: ymin + hbb.height() * y_corr,
                    confidence: hbb.confidence().unwrap_or(0.0),
                    label,
                }
            })
            .collect();

        Ok(detections)
    }

    fn class_names(&self) -> Vec<String> {
        usls::NAMES_COCO_80.iter().map(|s| s.to_string()).collect()
    }
}

/// Convert an OpenCV Mat (BGR) to an image::DynamicImage (RGB)
fn mat_to_dynamic_image(mat: &Mat) -> Result<DynamicImage> {
    let mut rgb_mat = Mat::default();
    opencv::imgproc::cvt_color_def(mat, &mut rgb_mat, opencv::imgproc::COLOR_BGR2RGB)?;

    let size = rgb_mat.size()?;
    let width = size.width as u32;
    let height = size.height as u32;

    if !rgb_mat.is_continuous() {
        return Err(anyhow!("Mat is not continuous"));
    }

    let buffer = rgb_mat.data_bytes()?.to_vec();
    let img_buffer = ImageBuffer::<Rgb<u8>, _>::from_vec(width, height, buffer)
        .ok_or_else(|| anyhow!("Failed to create ImageBuffer from Mat data"))?;

    Ok(DynamicImage::ImageRgb8(img_buffer))
}
