//! Deployable artifacts and the descriptors derived from them.
//!
//! An artifact is a zip archive (usually a `.jar`). Self-describing
//! artifacts carry a symbolic name and version in their manifest; plain
//! archives have neither and must be wrapped before installation.

mod manifest;
mod version;
mod wrap;

use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use manifest::{
    LAST_MODIFIED_HEADER, MANIFEST_PATH, Manifest, SYMBOLIC_NAME_HEADER, VERSION_HEADER,
    split_symbolic_name,
};
pub use version::{SNAPSHOT_QUALIFIER, Version};
pub use wrap::wrap_archive;

/// Errors reading or rewriting an artifact.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Cannot read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid archive: {reason}")]
    InvalidArchive { reason: String },

    #[error("Invalid manifest: {reason}")]
    InvalidManifest { reason: String },

    #[error("Invalid version '{value}': {reason}")]
    InvalidVersion { value: String, reason: String },
}

impl From<zip::result::ZipError> for ArtifactError {
    fn from(e: zip::result::ZipError) -> Self {
        ArtifactError::InvalidArchive {
            reason: e.to_string(),
        }
    }
}

/// What an artifact says about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    /// Symbolic name without directives; `None` for plain archives.
    pub symbolic_name: Option<String>,
    /// Parsed version header; `None` when the header is absent.
    pub version: Option<Version>,
    /// Raw version header text, used for the location key.
    pub version_text: Option<String>,
    /// Content fingerprint (build timestamp in milliseconds).
    pub fingerprint: Option<u64>,
    /// Whether the artifact declares `singleton:=true`.
    pub singleton: bool,
}

impl ArtifactDescriptor {
    /// Descriptor of a plain, non-self-describing archive.
    pub fn plain() -> Self {
        Self {
            symbolic_name: None,
            version: None,
            version_text: None,
            fingerprint: None,
            singleton: false,
        }
    }

    /// Build a descriptor from manifest headers.
    pub fn from_manifest(manifest: &Manifest) -> Result<Self, ArtifactError> {
        let Some(header) = manifest.get(SYMBOLIC_NAME_HEADER) else {
            return Ok(Self::plain());
        };

        let (name, singleton) = split_symbolic_name(header);
        if name.is_empty() {
            return Err(ArtifactError::InvalidManifest {
                reason: format!("empty {SYMBOLIC_NAME_HEADER}"),
            });
        }

        let version_text = manifest.get(VERSION_HEADER).map(|v| v.trim().to_string());
        let version = version_text.as_deref().map(Version::parse).transpose()?;

        // Non-numeric timestamps are as good as none.
        let fingerprint = manifest
            .get(LAST_MODIFIED_HEADER)
            .and_then(|v| v.trim().parse::<u64>().ok());

        Ok(Self {
            symbolic_name: Some(name),
            version,
            version_text,
            fingerprint,
            singleton,
        })
    }

    /// Version to compare with, `0.0.0` when absent.
    pub fn effective_version(&self) -> Version {
        self.version.clone().unwrap_or_default()
    }

    /// Registry location key for an artifact found at `path`.
    ///
    /// `name:version` for self-describing artifacts, the file path otherwise.
    pub fn location_key(&self, path: &Path) -> String {
        match (&self.symbolic_name, &self.version_text) {
            (Some(name), Some(version)) => format!("{name}:{version}"),
            (Some(name), None) => name.clone(),
            (None, _) => path.display().to_string(),
        }
    }
}

/// A loaded artifact: its bytes plus the descriptor parsed from them.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub descriptor: ArtifactDescriptor,
}

impl Artifact {
    /// Read and describe the artifact at `path`.
    ///
    /// The descriptor is recomputed on every call; nothing is cached.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let descriptor = describe_bytes(&bytes)?;

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            descriptor,
        })
    }

    pub fn location_key(&self) -> String {
        self.descriptor.location_key(&self.path)
    }
}

/// Parse the descriptor of an in-memory archive.
pub fn describe_bytes(bytes: &[u8]) -> Result<ArtifactDescriptor, ArtifactError> {
    match read_manifest(Cursor::new(bytes))? {
        Some(manifest) => ArtifactDescriptor::from_manifest(&manifest),
        None => Ok(ArtifactDescriptor::plain()),
    }
}

/// Read the manifest of an archive, `None` when it has none.
pub fn read_manifest<R: Read + Seek>(reader: R) -> Result<Option<Manifest>, ArtifactError> {
    let mut archive = zip::ZipArchive::new(reader)?;

    let mut entry = match archive.by_name(MANIFEST_PATH) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut raw = Vec::new();
    entry
        .read_to_end(&mut raw)
        .map_err(|e| ArtifactError::InvalidArchive {
            reason: format!("{MANIFEST_PATH}: {e}"),
        })?;

    let text = String::from_utf8_lossy(&raw);
    Manifest::parse(&text).map(Some)
}

/// Whether `path` names an artifact file by extension (case-insensitive).
pub fn has_artifact_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
