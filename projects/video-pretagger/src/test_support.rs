// In-memory stand-ins for the video decoder and the detection model.

use crate::pipeline::detection::Detector;
use crate::pipeline::types::Detection;
use crate::video::VideoReader;
use anyhow::{anyhow, Result};
use opencv::core::{Mat, Scalar, Size, Vector, CV_8UC3};
use opencv::prelude::*;
use opencv::videoio::VideoWriter;
use std::cell::Cell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;

pub fn test_frame(width: i32, height: i32) -> Mat {
    Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::new(40.0, 80.0, 120.0, 0.0))
        .unwrap()
}

pub fn write_test_image(path: &Path, width: i32, height: i32) {
    let ok = opencv::imgcodecs::imwrite(
        &path.to_string_lossy(),
        &test_frame(width, height),
        &Vector::new(),
    )
    .unwrap();
    assert!(ok, "failed to write {:?}", path);
}

/// Write a short MJPG-in-AVI clip of identical test frames.
pub fn write_test_video(path: &Path, frames: usize, width: i32, height: i32) {
    let fourcc = VideoWriter::fourcc('M', 'J', 'P', 'G').unwrap();
    let mut writer = VideoWriter::new(
        &path.to_string_lossy(),
        fourcc,
        25.0,
        Size::new(width, height),
        true,
    )
    .unwrap();
    assert!(writer.is_opened().unwrap(), "failed to open writer for {:?}", path);
    let frame = test_frame(width, height);
    for _ in 0..frames {
        writer.write(&frame).unwrap();
    }
    writer.release().unwrap();
}

pub fn det(label: &str, xmin: f32, ymin: f32, xmax: f32, ymax: f32, confidence: f32) -> Detection {
    Detection {
        xmin,
        ymin,
        xmax,
        ymax,
        confidence,
        label: label.to_string(),
    }
}

/// Scripted video: `true` entries decode, `false` entries fail.
pub struct FakeReader {
    frames: VecDeque<bool>,
    reported_count: usize,
}

impl FakeReader {
    pub fn clean(frames: usize) -> Self {
        Self::scripted(&vec![true; frames], frames)
    }

    pub fn scripted(pattern: &[bool], reported_count: usize) -> Self {
        Self {
            frames: pattern.iter().copied().collect(),
            reported_count,
        }
    }
}

impl VideoReader for FakeReader {
    fn frame_count(&self) -> Result<usize> {
        Ok(self.reported_count)
    }

    fn source_fps(&self) -> Result<f64> {
        Ok(30.0)
    }

    fn read_frame(&mut self) -> Result<Mat> {
        match self.frames.pop_front() {
            Some(true) => Ok(test_frame(16, 12)),
            Some(false) => Err(anyhow!("corrupt frame")),
            None => Err(anyhow!("End of stream")),
        }
    }
}

/// Returns `script[n]` on the n-th call (empty once the script runs out) and
/// counts calls through a shared cell.
pub struct FakeDetector {
    script: Vec<Result<Vec<Detection>, String>>,
    vocabulary: Vec<String>,
    calls: Rc<Cell<usize>>,
}

impl FakeDetector {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script: script.into_iter().map(Ok).collect(),
            vocabulary: Vec::new(),
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn failing_on(mut self, call: usize) -> Self {
        while self.script.len() <= call {
            self.script.push(Ok(Vec::new()));
        }
        self.script[call] = Err("inference failed".to_string());
        self
    }

    pub fn with_vocabulary(mut self, names: &[&str]) -> Self {
        self.vocabulary = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn call_counter(&self) -> Rc<Cell<usize>> {
        self.calls.clone()
    }
}

impl Detector for FakeDetector {
    fn detect(&mut self, _image: &Mat) -> Result<Vec<Detection>> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        match self.script.get(call) {
            Some(Ok(dets)) => Ok(dets.clone()),
            Some(Err(msg)) => Err(anyhow!(msg.clone())),
            None => Ok(Vec::new()),
        }
    }

    fn class_names(&self) -> Vec<String> {
        self.vocabulary.clone()
    }
}
