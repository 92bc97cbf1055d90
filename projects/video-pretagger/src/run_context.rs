use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const FRAMES_DIR: &str = "frames";
pub const ANNOTATIONS_FILE: &str = "detections.json";
pub const REPORT_FILE: &str = "pipeline_report.md";
pub const LEDGER_FILE: &str = "pipeline_metrics_log.csv";

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Where one run writes its artifacts, rooted at the output base directory.
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub output_dir: PathBuf,
}

impl RunLayout {
    /// Create the output base directory (and parents) if missing.
    pub fn create(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir)?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.output_dir.join(FRAMES_DIR)
    }

    pub fn annotations_path(&self) -> PathBuf {
        self.output_dir.join(ANNOTATIONS_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.output_dir.join(LEDGER_FILE)
    }
}

pub fn frame_file_name(ordinal: usize) -> String {
    format!("frame_{:05}.jpg", ordinal)
}

/// Image files directly inside `dir`, sorted by file name. Symlinked images
/// count; errors while walking the directory are returned.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && has_image_extension(entry.path()) {
            images.push(entry.into_path());
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| IMAGE_EXTENSIONS.contains(&s.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_frame_file_name_is_zero_padded() {
        assert_eq!(frame_file_name(0), "frame_00000.jpg");
        assert_eq!(frame_file_name(42), "frame_00042.jpg");
        assert_eq!(frame_file_name(123456), "frame_123456.jpg");
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let dir = tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "c.Jpeg", "notes.txt", "clip.mp4", "noext"] {
            File::create(dir.path().join(name)).unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        File::create(dir.path().join("nested").join("0.jpg")).unwrap();

        let names: Vec<_> = list_images(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.Jpeg"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_list_images_includes_symlinked_files() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("store");
        let frames = dir.path().join("frames");
        fs::create_dir(&store).unwrap();
        fs::create_dir(&frames).unwrap();
        File::create(store.join("real.jpg")).unwrap();
        File::create(frames.join("a.jpg")).unwrap();
        std::os::unix::fs::symlink(store.join("real.jpg"), frames.join("b.jpg")).unwrap();

        let names: Vec<_> = list_images(&frames)
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_list_images_missing_dir_errors() {
        let dir = tempdir().unwrap();
        assert!(list_images(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_layout_paths() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("out").join("run");
        let layout = RunLayout::create(&root).unwrap();

        assert!(root.is_dir());
        assert_eq!(layout.frames_dir(), root.join("frames"));
        assert_eq!(layout.annotations_path(), root.join("detections.json"));
        assert_eq!(layout.report_path(), root.join("pipeline_report.md"));
        assert_eq!(layout.ledger_path(), root.join("pipeline_metrics_log.csv"));
    }
}
