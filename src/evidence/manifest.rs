//! Artifact Manifest
//!
//! `MANIFEST.sha256`: one `<hex>  <file>` line per artifact, sorted by file
//! name, never listing itself. Its own digest is the digest-of-digests used
//! to compare replays.

use thiserror::Error;

use crate::core::hash::Digest32;
use crate::trace::signature::SignatureAlgorithm;

/// Manifest file name.
pub const MANIFEST_FILE: &str = "MANIFEST.sha256";

/// Separator between digest and file name (two spaces, sha256sum style).
const ENTRY_SEPARATOR: &str = "  ";

/// One manifest line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Lowercase hex digest of the file.
    pub digest_hex: String,
    /// File name relative to the case folder.
    pub file: String,
}

/// Digest list over one case folder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest over `(name, bytes)` pairs.
    pub fn build<'a, I>(files: I, algorithm: SignatureAlgorithm) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut entries: Vec<ManifestEntry> = files
            .into_iter()
            .filter(|(name, _)| *name != MANIFEST_FILE)
            .map(|(name, bytes)| ManifestEntry {
                digest_hex: hex::encode(algorithm.digest(bytes)),
                file: name.to_string(),
            })
            .collect();
        entries.sort_by(|a, b| a.file.cmp(&b.file));
        Self { entries }
    }

    /// Entries in file-name order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Render `MANIFEST.sha256`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.digest_hex);
            out.push_str(ENTRY_SEPARATOR);
            out.push_str(&entry.file);
            out.push('\n');
        }
        out
    }

    /// Digest of the rendered manifest.
    pub fn digest(&self, algorithm: SignatureAlgorithm) -> Digest32 {
        algorithm.digest(self.render().as_bytes())
    }

    /// Parse a rendered manifest.
    ///
    /// Strict inverse of [`Manifest::render`]: every line ends in `\n`,
    /// and carriage returns or other control bytes are malformed.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let mut entries = Vec::new();
        if text.is_empty() {
            return Ok(Self { entries });
        }
        let body = text
            .strip_suffix('\n')
            .ok_or(ManifestError::MissingTerminator)?;
        for (idx, line) in body.split('\n').enumerate() {
            let (digest_hex, file) = line
                .split_once(ENTRY_SEPARATOR)
                .ok_or(ManifestError::Malformed { line: idx + 1 })?;
            let valid_digest = digest_hex.len() == 64
                && digest_hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
            let valid_file = !file.is_empty() && !file.bytes().any(|b| b.is_ascii_control());
            if !valid_digest || !valid_file {
                return Err(ManifestError::Malformed { line: idx + 1 });
            }
            entries.push(ManifestEntry {
                digest_hex: digest_hex.to_string(),
                file: file.to_string(),
            });
        }
        Ok(Self { entries })
    }

    /// Check `(name, bytes)` pairs against this manifest.
    pub fn check<'a, I>(&self, files: I, algorithm: SignatureAlgorithm) -> Result<(), ManifestError>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let actual = Self::build(files, algorithm);
        for entry in &self.entries {
            match actual.entries.iter().find(|e| e.file == entry.file) {
                None => return Err(ManifestError::MissingFile(entry.file.clone())),
                Some(e) if e.digest_hex != entry.digest_hex => {
                    return Err(ManifestError::DigestMismatch(entry.file.clone()));
                }
                Some(_) => {}
            }
        }
        if let Some(extra) = actual.entries.iter().find(|e| !self.entries.iter().any(|m| m.file == e.file)) {
            return Err(ManifestError::UnlistedFile(extra.file.clone()));
        }
        Ok(())
    }
}

/// Manifest errors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ManifestError {
    /// Line is not `<64 hex>  <file>`.
    #[error("manifest line {line} is malformed")]
    Malformed {
        /// One-based line number.
        line: usize,
    },

    /// Last line is not terminated by `\n`.
    #[error("manifest does not end with a newline")]
    MissingTerminator,

    /// Listed file is absent.
    #[error("manifest lists missing file {0}")]
    MissingFile(String),

    /// File digest differs from the manifest.
    #[error("digest mismatch for {0}")]
    DigestMismatch(String),

    /// File present but not listed.
    #[error("file {0} is not listed in the manifest")]
    UnlistedFile(String),
}
