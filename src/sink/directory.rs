use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Sink, SinkError};
use crate::content::{CaptureKind, ContentType};
use crate::error::Result;
use crate::metadata::Metadata;
use crate::unit::Capture;

const MANIFEST_FILE: &str = "metadata.json";
const PAYLOAD_STEM: &str = "payload";

/// Descriptive record stored next to every payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureManifest {
    /// Capture key
    pub key: String,
    /// Request or response
    pub kind: CaptureKind,
    /// Service the capture was taken under
    pub service: String,
    /// Operation the capture was taken under
    pub operation: String,
    /// Payload encoding
    pub content_type: ContentType,
    /// When the payload was encoded
    pub captured_at: DateTime<Utc>,
    /// Payload file name inside the capture directory
    pub payload_file: String,
    /// Payload size in bytes
    pub payload_len: usize,
    /// Caller-supplied metadata, in insertion order
    pub metadata: Metadata,
}

/// A capture read back from a [`DirectorySink`].
#[derive(Debug, Clone)]
pub struct StoredCapture {
    /// The manifest written alongside the payload
    pub manifest: CaptureManifest,
    /// The raw payload bytes
    pub payload: Vec<u8>,
}

/// A sink that stores each capture as a directory on the local filesystem.
///
/// Layout: `<root>/<service>/<operation>/<key>/{payload.<ext>, metadata.json}`.
///
/// Both files are first written and synced into a hidden staging directory
/// (`.<key>.tmp`) which is then renamed into place. Entries whose name starts
/// with `.` are never read back, so a reader observes either the whole
/// capture or nothing of it.
///
/// Service, operation and key names are mapped onto safe path components:
/// characters other than ASCII alphanumerics, `-`, `_` and `.` become `_`,
/// and a leading `.` gets a `_` prefix. The mapping is lossy, so distinct
/// names such as `a/b` and `a_b` share a directory. Keys stay unique because
/// they end in a random id; the manifest keeps the original names.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Creates a sink rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `root` cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads a committed capture back.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the capture does not exist or its manifest
    /// cannot be decoded.
    pub fn read(&self, service: &str, operation: &str, key: &str) -> Result<StoredCapture> {
        let dir = self
            .operation_dir(service, operation)
            .join(path_component(key));
        read_capture_dir(&dir)
    }

    /// Reads every committed capture, ordered by capture time.
    ///
    /// Staging directories are skipped.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a directory cannot be listed or a committed
    /// capture cannot be read.
    pub fn list(&self) -> Result<Vec<StoredCapture>> {
        let mut captures = Vec::new();
        for service in visible_dirs(&self.root)? {
            for operation in visible_dirs(&service)? {
                for capture in visible_dirs(&operation)? {
                    captures.push(read_capture_dir(&capture)?);
                }
            }
        }
        captures.sort_by(|a, b| a.manifest.captured_at.cmp(&b.manifest.captured_at));
        Ok(captures)
    }

    fn operation_dir(&self, service: &str, operation: &str) -> PathBuf {
        self.root
            .join(path_component(service))
            .join(path_component(operation))
    }

    fn write_staged(&self, staging: &Path, capture: &Capture) -> std::io::Result<()> {
        fs::create_dir_all(staging)?;

        let payload_file = format!("{PAYLOAD_STEM}.{}", capture.content_type().extension());
        write_synced(&staging.join(&payload_file), capture.payload())?;

        let manifest = CaptureManifest {
            key: capture.key().to_string(),
            kind: capture.kind(),
            service: capture.context().service_name().to_string(),
            operation: capture.context().operation_name().to_string(),
            content_type: capture.content_type(),
            captured_at: capture.captured_at(),
            payload_file,
            payload_len: capture.payload().len(),
            metadata: capture.metadata().clone(),
        };
        let manifest = serde_json::to_vec_pretty(&manifest)?;
        write_synced(&staging.join(MANIFEST_FILE), &manifest)
    }
}

impl Sink for DirectorySink {
    fn commit(&self, capture: &Capture) -> std::result::Result<(), SinkError> {
        let parent = self.operation_dir(
            capture.context().service_name(),
            capture.context().operation_name(),
        );
        fs::create_dir_all(&parent)?;

        let name = path_component(capture.key());
        let staging = parent.join(format!(".{name}.tmp"));
        let target = parent.join(&name);

        let committed = self
            .write_staged(&staging, capture)
            .and_then(|()| fs::rename(&staging, &target));

        if let Err(err) = committed {
            // Staging leftovers are invisible to readers; removal is best effort.
            let _ = fs::remove_dir_all(&staging);
            return Err(err.into());
        }

        sync_committed(&parent, capture.key());
        debug!(key = %capture.key(), path = %target.display(), "capture stored");
        Ok(())
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// The rename already made the capture visible; a failed directory sync only
// weakens durability across a crash, so it is logged rather than returned.
fn sync_committed(parent: &Path, key: &str) -> bool {
    match sync_dir(parent) {
        Ok(()) => true,
        Err(err) => {
            warn!(key, error = %err, "capture stored but directory sync failed");
            false
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

fn read_capture_dir(dir: &Path) -> Result<StoredCapture> {
    let manifest: CaptureManifest = serde_json::from_slice(&fs::read(dir.join(MANIFEST_FILE))?)
        .map_err(std::io::Error::from)?;
    let payload = fs::read(dir.join(&manifest.payload_file))?;
    Ok(StoredCapture { manifest, payload })
}

fn visible_dirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Maps an arbitrary name onto a single safe, visible path component.
fn path_component(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() || out.starts_with('.') {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_component_replaces_separators() {
        assert_eq!(path_component("a/b\\c"), "a_b_c");
        assert_eq!(path_component("getMessage"), "getMessage");
    }

    #[cfg(unix)]
    #[test]
    fn directory_sync_failure_is_not_a_commit_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let sink = DirectorySink::new(dir.path()).unwrap();

        assert!(sync_committed(sink.root(), "present"));
        assert!(!sync_committed(&dir.path().join("gone"), "missing"));
    }

    #[test]
    fn path_component_is_lossy() {
        assert_eq!(path_component("a/b"), path_component("a_b"));
    }

    #[test]
    fn path_component_never_hidden_or_empty() {
        assert_eq!(path_component(""), "_");
        assert_eq!(path_component(".."), "_..");
        assert_eq!(path_component(".hidden"), "_.hidden");
    }
}
