//! Turning a plain archive into an installable, self-describing one.

use std::io::{Cursor, Write};

use zip::write::FileOptions;

use super::manifest::{MANIFEST_PATH, Manifest, SYMBOLIC_NAME_HEADER};
use super::{ArtifactError, read_manifest};

const MANIFEST_LEVEL_HEADER: &str = "Bundle-ManifestVersion";

/// Re-pack `bytes` with a manifest naming it `symbolic_name`.
///
/// Existing entries are copied without recompression; an existing manifest
/// keeps its other headers.
pub fn wrap_archive(bytes: &[u8], symbolic_name: &str) -> Result<Vec<u8>, ArtifactError> {
    let mut manifest = read_manifest(Cursor::new(bytes))?.unwrap_or_else(Manifest::new);
    manifest.set(SYMBOLIC_NAME_HEADER, symbolic_name);
    manifest.set(MANIFEST_LEVEL_HEADER, "2");

    let mut source = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::with_capacity(bytes.len() + 512)));

    writer.start_file(MANIFEST_PATH, FileOptions::default())?;
    writer
        .write_all(manifest.to_text().as_bytes())
        .map_err(|e| ArtifactError::InvalidArchive {
            reason: format!("writing {MANIFEST_PATH}: {e}"),
        })?;

    for index in 0..source.len() {
        let entry = source.by_index_raw(index)?;
        if entry.name().eq_ignore_ascii_case(MANIFEST_PATH) {
            continue;
        }
        writer.raw_copy_file(entry)?;
    }

    Ok(writer.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::super::describe_bytes;
    use super::super::testing::archive;
    use super::*;

    #[test]
    fn test_wrap_plain_archive() {
        let wrapped = wrap_archive(&archive(None), "/deploy/app/lib.jar").unwrap();

        let descriptor = describe_bytes(&wrapped).unwrap();
        assert_eq!(descriptor.symbolic_name.as_deref(), Some("/deploy/app/lib.jar"));

        let mut zip = zip::ZipArchive::new(Cursor::new(wrapped)).unwrap();
        assert!(zip.by_name("com/acme/Main.class").is_ok());
    }

    #[test]
    fn test_wrap_keeps_other_headers() {
        let original = archive(Some("Manifest-Version: 1.0\r\nCreated-By: javac\r\n"));

        let wrapped = wrap_archive(&original, "lib").unwrap();

        let manifest = read_manifest(Cursor::new(wrapped)).unwrap().unwrap();
        assert_eq!(manifest.get("Created-By"), Some("javac"));
        assert_eq!(manifest.get(SYMBOLIC_NAME_HEADER), Some("lib"));
    }
}
