//! Blocklist-based duplicate removal
//!
//! A handful of known bad assets (site logos, placeholder tiles) end up in
//! the scraped folder over and over. This pass deletes every file whose
//! decoded pixels are exactly equal to one of those references. Equality is
//! strict: a resized or re-encoded copy of a blocklisted image is NOT
//! detected, only byte-for-byte identical decoded arrays.

use crate::config::CleanConfig;
use crate::error::{Result, ShoecutError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Counters reported at the end of a cleanup run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanSummary {
    /// Files inspected (decodable or not)
    pub scanned: usize,
    /// Files deleted for matching a blocklisted reference
    pub deleted: usize,
}

/// One decoded blocklist reference
struct ReferenceImage {
    pixels: Vec<u8>,
    dimensions: (u32, u32),
}

impl ReferenceImage {
    fn load(path: &Path) -> Result<Self> {
        let decoded = image::open(path)
            .map_err(|e| {
                ShoecutError::processing(format!(
                    "Failed to load blocklist reference '{}': {e}",
                    path.display()
                ))
            })?
            .to_rgba8();
        Ok(Self {
            dimensions: decoded.dimensions(),
            pixels: decoded.into_raw(),
        })
    }

    fn matches(&self, pixels: &[u8], dimensions: (u32, u32)) -> bool {
        self.dimensions == dimensions && self.pixels == pixels
    }
}

/// Folder cleaner removing exact duplicates of blocklisted images
pub struct FolderCleaner {
    config: CleanConfig,
}

impl FolderCleaner {
    /// Create a new cleaner
    #[must_use]
    pub fn new(config: CleanConfig) -> Self {
        Self { config }
    }

    /// Scan the folder and delete exact matches of the blocklist
    ///
    /// Loading a blocklist reference fails the whole run; a reference that
    /// cannot be decoded means the blocklist itself is wrong. Unreadable
    /// candidate files are skipped silently and never counted as deletions.
    ///
    /// # Errors
    /// - Blocklist reference missing or undecodable
    /// - Image folder unreadable
    pub fn run(&self) -> Result<CleanSummary> {
        let references = self.load_references()?;
        info!(
            references = references.len(),
            dir = %self.config.image_dir.display(),
            "scanning for blocklisted duplicates"
        );

        if !self.config.image_dir.is_dir() {
            return Err(ShoecutError::file_io_error(
                "open image folder",
                &self.config.image_dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }

        let mut summary = CleanSummary::default();
        for entry in WalkDir::new(&self.config.image_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            summary.scanned += 1;
            let path = entry.path();

            let Ok(decoded) = image::open(path) else {
                debug!(path = %path.display(), "undecodable file, skipping");
                continue;
            };
            let candidate = decoded.to_rgba8();
            let dimensions = candidate.dimensions();
            let pixels = candidate.into_raw();

            if references
                .iter()
                .any(|reference| reference.matches(&pixels, dimensions))
            {
                match fs::remove_file(path) {
                    Ok(()) => {
                        debug!(path = %path.display(), "deleted blocklisted duplicate");
                        summary.deleted += 1;
                    },
                    Err(e) => debug!(path = %path.display(), error = %e, "delete failed, skipping"),
                }
            }
        }

        info!(deleted = summary.deleted, scanned = summary.scanned, "cleanup complete");
        Ok(summary)
    }

    fn load_references(&self) -> Result<Vec<ReferenceImage>> {
        self.config
            .resolved_blocklist()
            .iter()
            .map(|path| ReferenceImage::load(path))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CleanConfig;
    use image::{ImageBuffer, Rgb};
    use std::path::PathBuf;

    fn gradient_image(width: u32, height: u32) -> ImageBuffer<Rgb<u8>, Vec<u8>> {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    fn config_for(dir: &Path, blocklist: &[&str]) -> CleanConfig {
        CleanConfig {
            image_dir: dir.to_path_buf(),
            blocklist: blocklist.iter().map(PathBuf::from).collect(),
        }
    }

    #[test]
    fn test_exact_duplicate_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let reference = gradient_image(24, 24);
        reference.save(dir.path().join("bad.png")).unwrap();
        // byte-exact copy under a different name
        fs::copy(dir.path().join("bad.png"), dir.path().join("copy.png")).unwrap();

        let cleaner = FolderCleaner::new(config_for(dir.path(), &["bad.png"]));
        let summary = cleaner.run().unwrap();

        // the reference itself matches too, like any exact duplicate
        assert_eq!(summary.deleted, 2);
        assert!(!dir.path().join("copy.png").exists());
    }

    #[test]
    fn test_reencoded_duplicate_is_retained() {
        let dir = tempfile::tempdir().unwrap();
        let reference = gradient_image(24, 24);
        reference.save(dir.path().join("bad.png")).unwrap();
        // same pixels through a lossy encoder decode differently
        reference.save(dir.path().join("lossy.jpg")).unwrap();

        let cleaner = FolderCleaner::new(config_for(dir.path(), &["bad.png"]));
        let summary = cleaner.run().unwrap();

        assert_eq!(summary.deleted, 1);
        assert!(dir.path().join("lossy.jpg").exists());
    }

    #[test]
    fn test_clean_run_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        gradient_image(24, 24).save(dir.path().join("bad.png")).unwrap();
        gradient_image(32, 32).save(dir.path().join("keep.png")).unwrap();

        let cleaner = FolderCleaner::new(config_for(dir.path(), &["bad.png"]));
        let first = cleaner.run().unwrap();
        assert_eq!(first.deleted, 1);

        // second run over the survivors: reference is gone now, so the
        // blocklist fails fast rather than silently matching nothing
        assert!(cleaner.run().is_err());

        // with an external reference the second run deletes nothing
        let outside = tempfile::tempdir().unwrap();
        gradient_image(24, 24).save(outside.path().join("bad.png")).unwrap();
        let cleaner = FolderCleaner::new(CleanConfig {
            image_dir: dir.path().to_path_buf(),
            blocklist: vec![outside.path().join("bad.png")],
        });
        let second = cleaner.run().unwrap();
        assert_eq!(second.deleted, 0);
        assert!(dir.path().join("keep.png").exists());
    }

    #[test]
    fn test_undecodable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        gradient_image(24, 24).save(dir.path().join("bad.png")).unwrap();
        fs::write(dir.path().join("corrupt.jpg"), b"not an image").unwrap();

        let cleaner = FolderCleaner::new(config_for(dir.path(), &["bad.png"]));
        let summary = cleaner.run().unwrap();

        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.deleted, 1);
        assert!(dir.path().join("corrupt.jpg").exists());
    }

    #[test]
    fn test_missing_reference_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let cleaner = FolderCleaner::new(config_for(dir.path(), &["absent.png"]));
        assert!(cleaner.run().is_err());
    }
}
