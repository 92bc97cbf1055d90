use crate::error::PipelineError;
use crate::pipeline::types::FrameExtractionMetrics;
use crate::run_context::frame_file_name;
use crate::video::VideoReader;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use std::fs;
use std::path::Path;

/// Persist every `frame_step`-th frame of `source_path` into `output_dir` as
/// `frame_00000.jpg`, `frame_00001.jpg`, ...
///
/// `open` turns the path into a reader; it is only called once the path is
/// known to exist, and the destination is created only after it succeeds.
pub fn extract_frames<F>(
    source_path: &Path,
    output_dir: &Path,
    frame_step: usize,
    open: F,
) -> Result<FrameExtractionMetrics>
where
    F: FnOnce(&Path) -> Result<Box<dyn VideoReader>>,
{
    if frame_step == 0 {
        return Err(PipelineError::InvalidStride(frame_step).into());
    }

    if !source_path.exists() {
        tracing::error!("Video file not found: {:?}", source_path);
        return Err(PipelineError::VideoNotFound(source_path.to_path_buf()).into());
    }

    let mut reader = open(source_path).map_err(|e| {
        tracing::error!("Could not open video file {:?}: {}", source_path, e);
        PipelineError::VideoUnreadable {
            path: source_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    fs::create_dir_all(output_dir)?;

    tracing::info!(
        "Extracting frames from {:?} to {:?} (every {} frames)",
        source_path,
        output_dir,
        frame_step
    );

    let metrics = sample_frames(reader.as_mut(), output_dir, frame_step)?;

    tracing::info!(
        "Saved {} frames to {:?}, dropped {}",
        metrics.frames_extracted,
        output_dir,
        metrics.frames_dropped
    );

    Ok(metrics)
}

/// Walk the reader once. With a known frame count exactly that many reads are
/// attempted; otherwise reading stops at the first failure, which is counted
/// as a drop. Either way the total is the number of reads attempted.
fn sample_frames(
    reader: &mut dyn VideoReader,
    output_dir: &Path,
    frame_step: usize,
) -> Result<FrameExtractionMetrics> {
    let reported = reader.frame_count().unwrap_or(0);
    let fps = reader.source_fps().unwrap_or(0.0);
    if reported == 0 {
        tracing::warn!("Could not determine total frames in video. Processing until end.");
    } else {
        tracing::info!("Total frames in video: {} ({:.2} fps)", reported, fps);
    }

    let pb = progress_bar(reported)?;
    let mut attempts = 0usize;
    let mut saved = 0usize;
    let mut dropped = 0usize;

    loop {
        if reported > 0 && attempts >= reported {
            break;
        }
        let index = attempts;
        attempts += 1;
        pb.inc(1);

        match reader.read_frame() {
            Ok(frame) => {
                if index % frame_step == 0 {
                    let path = output_dir.join(frame_file_name(saved));
                    write_frame(&path, &frame)?;
                    tracing::debug!("Source frame {} saved as {:?}", index, path);
                    saved += 1;
                }
            }
            Err(e) => {
                dropped += 1;
                if reported == 0 {
                    tracing::debug!("Stream ended after {} reads: {}", attempts, e);
                    break;
                }
                tracing::warn!("Failed to decode frame {}: {}", index, e);
            }
        }
    }

    pb.finish_with_message("Done");

    Ok(FrameExtractionMetrics::new(attempts, saved, dropped))
}

fn write_frame(path: &Path, frame: &Mat) -> Result<()> {
    let written = imgcodecs::imwrite(&path.to_string_lossy(), frame, &Vector::new())
        .map_err(|e| {
            tracing::error!("imwrite failed for {:?}: {}", path, e);
            PipelineError::FrameWrite(path.to_path_buf())
        })?;
    if !written {
        return Err(PipelineError::FrameWrite(path.to_path_buf()).into());
    }
    Ok(())
}

fn progress_bar(total: usize) -> Result<ProgressBar> {
    if total == 0 {
        return Ok(ProgressBar::new_spinner());
    }
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow} fps, {eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeReader;
    use anyhow::anyhow;
    use std::fs::File;
    use tempfile::tempdir;

    fn saved_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_clean_source_saves_ceil_n_over_k() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        File::create(&video).unwrap();

        for (frames, step) in [(10, 1), (10, 3), (7, 7), (31, 30)] {
            let out = dir.path().join(format!("frames_{}_{}", frames, step));
            let metrics = extract_frames(&video, &out, step, |_| {
                Ok(Box::new(FakeReader::clean(frames)) as Box<dyn VideoReader>)
            })
            .unwrap();

            let expected = frames.div_ceil(step);
            assert_eq!(metrics.total_frames_in_video, frames);
            assert_eq!(metrics.frames_extracted, expected);
            assert_eq!(metrics.frames_dropped, 0);
            assert_eq!(metrics.frame_drop_ratio, 0.0);

            let names = saved_names(&out);
            let wanted: Vec<String> = (0..expected).map(frame_file_name).collect();
            assert_eq!(names, wanted);
        }
    }

    #[test]
    fn test_missing_video_is_not_found_and_writes_nothing() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("frames");

        let err = extract_frames(&dir.path().join("nope.mp4"), &out, 1, |_| {
            panic!("reader must not be opened for a missing file")
        })
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::VideoNotFound(_))
        ));
        assert!(!out.exists());
    }

    #[test]
    fn test_unopenable_video_is_unreadable_and_writes_nothing() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("broken.mp4");
        fs::write(&video, b"not a video").unwrap();
        let out = dir.path().join("frames");

        let err = extract_frames(&video, &out, 1, |_| Err(anyhow!("no decoder"))).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::VideoUnreadable { .. })
        ));
        assert!(!out.exists());
    }

    #[test]
    fn test_zero_step_is_rejected() {
        let dir = tempdir().unwrap();
        let err = extract_frames(dir.path(), dir.path(), 0, |_| {
            Ok(Box::new(FakeReader::clean(1)) as Box<dyn VideoReader>)
        })
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidStride(0))
        ));
    }

    #[test]
    fn test_decode_failures_are_counted_not_fatal() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        File::create(&video).unwrap();
        let out = dir.path().join("frames");

        // Index 4 lands on the stride but fails to decode.
        let pattern = [true, false, true, true, false, true];
        let metrics = extract_frames(&video, &out, 2, |_| {
            Ok(Box::new(FakeReader::scripted(&pattern, pattern.len())) as Box<dyn VideoReader>)
        })
        .unwrap();

        assert_eq!(metrics.total_frames_in_video, 6);
        assert_eq!(metrics.frames_extracted, 2);
        assert_eq!(metrics.frames_dropped, 2);
        assert!((metrics.frame_drop_ratio - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(
            saved_names(&out),
            vec!["frame_00000.jpg".to_string(), "frame_00001.jpg".to_string()]
        );
    }

    #[test]
    fn test_unknown_count_reads_until_first_failure() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        File::create(&video).unwrap();
        let out = dir.path().join("frames");

        // Reported count 0: the trailing frames after the failure are never read.
        let pattern = [true, true, true, true, true, false, true, true];
        let metrics = extract_frames(&video, &out, 2, |_| {
            Ok(Box::new(FakeReader::scripted(&pattern, 0)) as Box<dyn VideoReader>)
        })
        .unwrap();

        assert_eq!(metrics.total_frames_in_video, 6);
        assert_eq!(metrics.frames_extracted, 3);
        assert_eq!(metrics.frames_dropped, 1);
        assert_eq!(saved_names(&out).len(), 3);
    }

    #[test]
    fn test_existing_output_dir_is_reused() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        File::create(&video).unwrap();
        let out = dir.path().join("frames");
        fs::create_dir_all(&out).unwrap();

        let metrics = extract_frames(&video, &out, 5, |_| {
            Ok(Box::new(FakeReader::clean(5)) as Box<dyn VideoReader>)
        })
        .unwrap();
        assert_eq!(metrics.frames_extracted, 1);
        assert!(out.join("frame_00000.jpg").is_file());
    }
}
