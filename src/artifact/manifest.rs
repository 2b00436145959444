//! JAR manifest (`META-INF/MANIFEST.MF`) reading and writing.
//!
//! Only the main section matters for deployment. Lines are at most 72 bytes
//! on disk; longer values continue on following lines that start with a
//! single space.

use indexmap::IndexMap;

use super::ArtifactError;

/// Archive entry holding the manifest.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

pub const SYMBOLIC_NAME_HEADER: &str = "Bundle-SymbolicName";
pub const VERSION_HEADER: &str = "Bundle-Version";
pub const LAST_MODIFIED_HEADER: &str = "Bnd-LastModified";
pub const MANIFEST_VERSION_HEADER: &str = "Manifest-Version";

const MAX_LINE_BYTES: usize = 72;

/// Main-section attributes of a manifest, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    attributes: IndexMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self, ArtifactError> {
        let mut attributes: IndexMap<String, String> = IndexMap::new();
        let mut current: Option<String> = None;

        for (number, line) in text.lines().enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);

            if line.is_empty() {
                // End of the main section.
                break;
            }

            if let Some(continuation) = line.strip_prefix(' ') {
                let Some(name) = current.as_ref() else {
                    return Err(ArtifactError::InvalidManifest {
                        reason: format!("line {}: continuation without a header", number + 1),
                    });
                };
                if let Some(value) = attributes.get_mut(name) {
                    value.push_str(continuation);
                }
                continue;
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(ArtifactError::InvalidManifest {
                    reason: format!("line {}: missing ':' in header", number + 1),
                });
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(ArtifactError::InvalidManifest {
                    reason: format!("line {}: empty header name", number + 1),
                });
            }

            let value = value.strip_prefix(' ').unwrap_or(value);
            attributes.insert(name.to_string(), value.to_string());
            current = Some(name.to_string());
        }

        Ok(Self { attributes })
    }

    /// Look up a header; names compare case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set a header, replacing any existing value under the same name.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let existing = self
            .attributes
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned();
        match existing {
            Some(key) => {
                self.attributes.insert(key, value.into());
            }
            None => {
                self.attributes.insert(name.to_string(), value.into());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Render with CRLF line endings and 72-byte line wrapping.
    ///
    /// `Manifest-Version` is always written first.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let version = self.get(MANIFEST_VERSION_HEADER).unwrap_or("1.0");
        write_header(&mut out, MANIFEST_VERSION_HEADER, version);

        for (name, value) in &self.attributes {
            if name.eq_ignore_ascii_case(MANIFEST_VERSION_HEADER) {
                continue;
            }
            write_header(&mut out, name, value);
        }

        out.push_str("\r\n");
        out
    }
}

fn write_header(out: &mut String, name: &str, value: &str) {
    let line = format!("{name}: {value}");
    let mut rest = line.as_str();
    let mut limit = MAX_LINE_BYTES;

    while rest.len() > limit {
        let mut cut = limit;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        out.push_str(&rest[..cut]);
        out.push_str("\r\n ");
        rest = &rest[cut..];
        // Continuation lines spend one byte on the leading space.
        limit = MAX_LINE_BYTES - 1;
    }

    out.push_str(rest);
    out.push_str("\r\n");
}

/// Split a `Bundle-SymbolicName` header into the name and its directives.
///
/// `com.acme.core;singleton:=true` yields `("com.acme.core", true)`.
pub fn split_symbolic_name(header: &str) -> (String, bool) {
    let mut parts = header.split(';');
    let name = parts.next().unwrap_or_default().trim().to_string();

    let singleton = parts.any(|part| {
        part.split_once(":=").is_some_and(|(key, value)| {
            key.trim().eq_ignore_ascii_case("singleton")
                && value.trim().trim_matches('"').eq_ignore_ascii_case("true")
        })
    });

    (name, singleton)
}
