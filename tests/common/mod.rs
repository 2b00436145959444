//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hotdeploy::{ChangeListener, Delivery};
use parking_lot::Mutex;
use zip::write::FileOptions;

/// Debounce delay used by timing tests.
pub const DEBOUNCE: Duration = Duration::from_millis(150);

/// Archive bytes with a manifest describing `name` at `version`.
pub fn jar(name: &str, version: &str, last_modified: Option<u64>) -> Vec<u8> {
    let mut manifest = format!(
        "Manifest-Version: 1.0\r\nBundle-SymbolicName: {name}\r\nBundle-Version: {version}\r\n"
    );
    if let Some(ts) = last_modified {
        manifest.push_str(&format!("Bnd-LastModified: {ts}\r\n"));
    }
    archive(Some(&manifest))
}

/// Archive bytes with an optional manifest and one class entry.
pub fn archive(manifest: Option<&str>) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    if let Some(text) = manifest {
        writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
        writer.write_all(text.as_bytes()).unwrap();
    }
    writer.start_file("com/acme/Main.class", options).unwrap();
    writer.write_all(b"\xca\xfe\xba\xbe").unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn write_jar(dir: &Path, file: &str, name: &str, version: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(file);
    std::fs::write(&path, jar(name, version, None)).unwrap();
    path
}

/// Canonical path of a temp directory, so it matches notification paths.
pub fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap()
}

/// One delivered category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    Created(Vec<PathBuf>),
    Modified(Vec<PathBuf>),
    Deleted(Vec<PathBuf>),
}

/// Listener that records every delivery with its arrival time.
#[derive(Default)]
pub struct RecordingListener {
    calls: Mutex<Vec<(Instant, Delivered)>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Delivered> {
        self.calls.lock().iter().map(|(_, d)| d.clone()).collect()
    }

    pub fn times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(t, _)| *t).collect()
    }

    pub fn created(&self) -> Vec<PathBuf> {
        self.collect(|d| match d {
            Delivered::Created(paths) => Some(paths),
            _ => None,
        })
    }

    pub fn modified(&self) -> Vec<PathBuf> {
        self.collect(|d| match d {
            Delivered::Modified(paths) => Some(paths),
            _ => None,
        })
    }

    pub fn deleted(&self) -> Vec<PathBuf> {
        self.collect(|d| match d {
            Delivered::Deleted(paths) => Some(paths),
            _ => None,
        })
    }

    fn collect(&self, pick: impl Fn(Delivered) -> Option<Vec<PathBuf>>) -> Vec<PathBuf> {
        self.calls().into_iter().filter_map(pick).flatten().collect()
    }

    fn push(&self, delivered: Delivered) -> Delivery {
        self.calls.lock().push((Instant::now(), delivered));
        Delivery::Continue
    }
}

impl ChangeListener for RecordingListener {
    fn files_created(&self, paths: &[PathBuf]) -> Delivery {
        assert!(!paths.is_empty());
        self.push(Delivered::Created(paths.to_vec()))
    }

    fn files_modified(&self, paths: &[PathBuf]) -> Delivery {
        assert!(!paths.is_empty());
        self.push(Delivered::Modified(paths.to_vec()))
    }

    fn files_deleted(&self, paths: &[PathBuf]) -> Delivery {
        assert!(!paths.is_empty());
        self.push(Delivered::Deleted(paths.to_vec()))
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}
