// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Storage collaborators
//!
//! Object storage receives build contexts before an image build; the shared
//! volume is where steps of one run hand datasets to each other.

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use std::path::{Component, Path, PathBuf};

use crate::digest::ContentHasher;
use crate::errors::{PipewrightError, PipewrightResult};

/// Glob patterns for paths that must not be uploaded
#[derive(Debug, Clone, Default)]
pub struct ExclusionList {
    patterns: Vec<Pattern>,
}

impl ExclusionList {
    /// Parse a newline-delimited list of globs; blank lines are ignored
    pub fn parse(text: &str) -> PipewrightResult<Self> {
        let patterns = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Pattern::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether `relative` or one of its parent directories matches
    ///
    /// Patterns without a `/` also match any single path component.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };

        let components: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        self.patterns.iter().any(|pattern| {
            let anchored = pattern.as_str().contains('/');
            (1..=components.len()).any(|depth| {
                let prefix = components[..depth].join("/");
                pattern.matches_with(&prefix, options)
                    || (!anchored && pattern.matches_with(&components[depth - 1], options))
            })
        })
    }
}

/// Outcome of an upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Uploaded files, relative to the local root, in upload order
    pub uploaded: Vec<PathBuf>,
    /// Excluded entries; an excluded directory is listed once
    pub skipped: Vec<PathBuf>,
    /// Digest over the uploaded paths and contents
    pub digest: String,
}

/// Trait for object storage backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy `local_root` to `destination`, leaving out excluded paths
    async fn upload(
        &self,
        local_root: &Path,
        destination: &str,
        exclusions: &ExclusionList,
    ) -> PipewrightResult<UploadReport>;
}

/// Object store backed by a local or mounted filesystem
///
/// Accepts `file://` URIs and plain paths.
#[derive(Debug, Clone, Default)]
pub struct FilesystemStore;

impl FilesystemStore {
    pub fn new() -> Self {
        Self
    }

    fn destination_path(destination: &str) -> PipewrightResult<PathBuf> {
        if let Some(path) = destination.strip_prefix("file://") {
            if path.is_empty() {
                return Err(PipewrightError::UnsupportedDestination {
                    uri: destination.to_string(),
                });
            }
            return Ok(PathBuf::from(path));
        }

        if destination.contains("://") || destination.is_empty() {
            return Err(PipewrightError::UnsupportedDestination {
                uri: destination.to_string(),
            });
        }

        Ok(PathBuf::from(destination))
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn upload(
        &self,
        local_root: &Path,
        destination: &str,
        exclusions: &ExclusionList,
    ) -> PipewrightResult<UploadReport> {
        let target = Self::destination_path(destination)?;

        if !local_root.is_dir() {
            return Err(PipewrightError::FileReadError {
                path: local_root.to_path_buf(),
                error: "not a directory".to_string(),
            });
        }

        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| PipewrightError::UploadFailed {
                path: target.clone(),
                error: e.to_string(),
            })?;

        // The destination may sit inside the tree being uploaded
        let target_canonical = std::fs::canonicalize(&target)?;

        let mut files = Vec::new();
        let mut skipped = Vec::new();
        collect_files(
            local_root,
            Path::new(""),
            exclusions,
            &target_canonical,
            &mut files,
            &mut skipped,
        )?;

        let mut hasher = ContentHasher::new();
        for relative in &files {
            let source = local_root.join(relative);
            let dest = target.join(relative);

            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| PipewrightError::UploadFailed {
                        path: relative.clone(),
                        error: e.to_string(),
                    })?;
            }
            tokio::fs::copy(&source, &dest)
                .await
                .map_err(|e| PipewrightError::UploadFailed {
                    path: relative.clone(),
                    error: e.to_string(),
                })?;

            hasher.update_file(relative, &source)?;
            tracing::debug!(file = %relative.display(), "uploaded");
        }

        tracing::info!(
            destination = %target.display(),
            uploaded = files.len(),
            skipped = skipped.len(),
            "build context staged"
        );

        Ok(UploadReport {
            uploaded: files,
            skipped,
            digest: hasher.finalize(),
        })
    }
}

/// Walk `root/relative` in sorted order
fn collect_files(
    root: &Path,
    relative: &Path,
    exclusions: &ExclusionList,
    skip_dir: &Path,
    files: &mut Vec<PathBuf>,
    skipped: &mut Vec<PathBuf>,
) -> PipewrightResult<()> {
    let dir = root.join(relative);
    let mut entries = std::fs::read_dir(&dir)
        .map_err(|e| PipewrightError::FileReadError {
            path: dir.clone(),
            error: e.to_string(),
        })?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let entry_relative = relative.join(entry.file_name());
        if exclusions.is_excluded(&entry_relative) {
            skipped.push(entry_relative);
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if std::fs::canonicalize(entry.path())? == skip_dir {
                continue;
            }
            collect_files(root, &entry_relative, exclusions, skip_dir, files, skipped)?;
        } else if file_type.is_file() {
            files.push(entry_relative);
        }
    }

    Ok(())
}

/// A volume shared by all steps of a run
///
/// Datasets live under `<tag>/<stage>/<file>`. The layout is a naming
/// convention between steps; nothing enforces exclusive writers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedVolume {
    root: PathBuf,
    mount_path: PathBuf,
}

impl SharedVolume {
    /// `root` is the local view, `mount_path` the view inside remote steps
    pub fn new(root: PathBuf, mount_path: PathBuf) -> Self {
        Self { root, mount_path }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mount_path(&self) -> &Path {
        &self.mount_path
    }

    pub fn dataset_path(&self, tag: &str, stage: &str, file: &str) -> PathBuf {
        self.root.join(tag).join(stage).join(file)
    }

    /// Same dataset as seen from inside a step
    pub fn remote_path(&self, tag: &str, stage: &str, file: &str) -> PathBuf {
        self.mount_path.join(tag).join(stage).join(file)
    }

    /// Create `<root>/<tag>/<stage>` and return it
    pub fn ensure_dirs(&self, tag: &str, stage: &str) -> PipewrightResult<PathBuf> {
        let dir = self.root.join(tag).join(stage);
        std::fs::create_dir_all(&dir).map_err(|e| PipewrightError::FileWriteError {
            path: dir.clone(),
            error: e.to_string(),
        })?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn context() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM python:3.11\n").unwrap();
        fs::create_dir_all(dir.path().join("src/pkg")).unwrap();
        fs::write(dir.path().join("src/pkg/process.py"), "print('hi')\n").unwrap();
        fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        fs::write(dir.path().join(".git/objects/ab"), "blob").unwrap();
        fs::create_dir_all(dir.path().join("notebooks/.ipynb_checkpoints")).unwrap();
        fs::write(
            dir.path().join("notebooks/.ipynb_checkpoints/a.ipynb"),
            "{}",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_parse_exclusions() {
        let list = ExclusionList::parse("\n.git\n\n  *.log  \n").unwrap();
        assert_eq!(list.len(), 2);
        assert!(ExclusionList::parse("[").is_err());
        assert!(ExclusionList::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_exclusion_matching() {
        let list = ExclusionList::parse(".git\n*.ipynb_checkpoints\nbuild/out").unwrap();
        assert!(list.is_excluded(Path::new(".git")));
        assert!(list.is_excluded(Path::new(".git/objects/ab")));
        assert!(list.is_excluded(Path::new("notebooks/.ipynb_checkpoints/a.ipynb")));
        assert!(list.is_excluded(Path::new("build/out/x.bin")));
        assert!(!list.is_excluded(Path::new("other/build/out")));
        assert!(!list.is_excluded(Path::new("src/pkg/process.py")));
    }

    #[tokio::test]
    async fn test_upload_respects_exclusions() {
        let source = context();
        let dest = TempDir::new().unwrap();
        let exclusions = ExclusionList::parse(".git\n*.ipynb_checkpoints").unwrap();

        let uri = format!("file://{}", dest.path().display());
        let report = FilesystemStore::new()
            .upload(source.path(), &uri, &exclusions)
            .await
            .unwrap();

        assert_eq!(
            report.uploaded,
            vec![PathBuf::from("Dockerfile"), PathBuf::from("src/pkg/process.py")]
        );
        assert_eq!(
            report.skipped,
            vec![
                PathBuf::from(".git"),
                PathBuf::from("notebooks/.ipynb_checkpoints")
            ]
        );
        assert!(dest.path().join("src/pkg/process.py").exists());
        assert!(!dest.path().join(".git").exists());
    }

    #[tokio::test]
    async fn test_upload_digest_is_stable() {
        let source = context();
        let exclusions = ExclusionList::parse(".git").unwrap();
        let store = FilesystemStore::new();

        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let first = store
            .upload(source.path(), &a.path().display().to_string(), &exclusions)
            .await
            .unwrap();
        let second = store
            .upload(source.path(), &b.path().display().to_string(), &exclusions)
            .await
            .unwrap();

        assert_eq!(first.digest, second.digest);
    }

    #[tokio::test]
    async fn test_destination_inside_context_is_not_copied_into_itself() {
        let source = context();
        let inner = source.path().join("staged");

        let report = FilesystemStore::new()
            .upload(
                source.path(),
                &inner.display().to_string(),
                &ExclusionList::default(),
            )
            .await
            .unwrap();

        assert!(!report
            .uploaded
            .iter()
            .any(|p| p.starts_with("staged")));
    }

    #[tokio::test]
    async fn test_unsupported_destination() {
        let source = context();
        let result = FilesystemStore::new()
            .upload(source.path(), "gs://bucket/context", &ExclusionList::default())
            .await;

        assert!(matches!(
            result,
            Err(PipewrightError::UnsupportedDestination { ref uri }) if uri == "gs://bucket/context"
        ));
    }

    #[test]
    fn test_shared_volume_layout() {
        let root = TempDir::new().unwrap();
        let volume = SharedVolume::new(root.path().to_path_buf(), PathBuf::from("/mnt/data"));

        assert_eq!(
            volume.dataset_path("2024-06", "raw", "data.zip"),
            root.path().join("2024-06/raw/data.zip")
        );
        assert_eq!(
            volume.remote_path("2024-06", "raw", "data.zip"),
            PathBuf::from("/mnt/data/2024-06/raw/data.zip")
        );

        let dir = volume.ensure_dirs("2024-06", "processed").unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir, root.path().join("2024-06/processed"));
    }
}
