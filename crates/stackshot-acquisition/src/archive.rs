//! Image archive
//!
//! Copies captured files off the camera into a local directory, one file per
//! resource path, named after the resource's base filename. The process
//! working directory is never changed.

use stackshot_communication::{CameraLink, CameraTransport};
use stackshot_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome for one resource
#[derive(Debug)]
pub struct ArchiveOutcome {
    /// Camera resource path
    pub resource: String,
    /// Local file written, or why it was not
    pub result: Result<PathBuf>,
    /// Removed from the camera after saving
    pub deleted: bool,
}

/// Per-file outcomes of one archive pass
#[derive(Debug, Default)]
pub struct ArchiveReport {
    /// One entry per requested resource, in request order
    pub outcomes: Vec<ArchiveOutcome>,
}

impl ArchiveReport {
    /// Local paths that were written
    pub fn saved(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(PathBuf::as_path))
            .collect()
    }

    /// Resources that could not be saved
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.resource.as_str())
            .collect()
    }

    /// Every resource was saved
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Local directory receiving captured images
#[derive(Debug, Clone)]
pub struct ImageArchive {
    directory: PathBuf,
    delete_after_save: bool,
}

impl ImageArchive {
    /// Archive into `directory`, created on first use
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            delete_after_save: false,
        }
    }

    /// Delete each file from the camera once it is safely written
    pub fn delete_after_save(mut self, delete: bool) -> Self {
        self.delete_after_save = delete;
        self
    }

    /// Target directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Local path for a camera resource
    pub fn target_for(&self, resource: &str) -> Result<PathBuf> {
        let name = resource
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .ok_or_else(|| Error::other(format!("No file name in resource {}", resource)))?;
        Ok(self.directory.join(name))
    }

    /// Fetch and write every resource
    ///
    /// Fails only if the directory cannot be created; individual file
    /// failures are reported per outcome.
    pub fn store<T: CameraTransport>(
        &self,
        camera: &mut CameraLink<T>,
        resources: &[String],
    ) -> Result<ArchiveReport> {
        fs::create_dir_all(&self.directory)?;
        tracing::info!(
            "Archiving {} file(s) to {}",
            resources.len(),
            self.directory.display()
        );

        let mut report = ArchiveReport::default();
        for resource in resources {
            let result = self.store_one(camera, resource);
            let deleted = match &result {
                Ok(path) => {
                    tracing::debug!("Saved {} to {}", resource, path.display());
                    self.delete_after_save && camera.delete_content(resource).is_ok()
                }
                Err(e) => {
                    tracing::warn!("Could not archive {}: {}", resource, e);
                    false
                }
            };
            report.outcomes.push(ArchiveOutcome {
                resource: resource.clone(),
                result,
                deleted,
            });
        }

        Ok(report)
    }

    fn store_one<T: CameraTransport>(
        &self,
        camera: &mut CameraLink<T>,
        resource: &str,
    ) -> Result<PathBuf> {
        let target = self.target_for(resource)?;
        let bytes = camera.fetch_content(resource)?;
        fs::write(&target, bytes)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_uses_base_filename() {
        let archive = ImageArchive::new("/tmp/stack");
        let target = archive
            .target_for("/ccapi/ver110/contents/sd/100CANON/IMG_0001.JPG")
            .unwrap();
        assert_eq!(target, PathBuf::from("/tmp/stack/IMG_0001.JPG"));
    }

    #[test]
    fn test_target_rejects_directory_paths() {
        let archive = ImageArchive::new("/tmp/stack");
        assert!(archive.target_for("/ccapi/ver110/contents/sd/").is_err());
        assert!(archive.target_for("..").is_err());
    }
}
