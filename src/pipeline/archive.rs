//! Source archive access: list and read entries of an arXiv source bundle.
//!
//! arXiv serves LaTeX sources as a gzip-compressed tar file, sometimes as a
//! plain tar, and for single-file submissions as a gzipped `.tex` that is not
//! a tar at all. [`ArchiveReader::open`] accepts all three payloads and tells
//! them apart:
//!
//! | Payload | Result |
//! |---------|--------|
//! | gzip → tar, plain tar | `Ok(ArchiveReader)` |
//! | gzip → not a tar, garbage | `Err(NotAnArchive)` (soft) |
//! | tar that breaks after ≥ 1 entry | `Err(CorruptArchive)` (fatal upstream) |
//!
//! The decompressed tar is kept in memory and indexed once; entries are
//! sliced out on demand without a temporary directory.

use crate::error::ArchiveError;
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tar::Archive;
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const TAR_BLOCK: usize = 512;

/// Location of one regular file inside the decompressed tar.
#[derive(Debug, Clone)]
struct EntrySpan {
    offset: usize,
    size: usize,
}

/// An opened source bundle.
#[derive(Debug)]
pub struct ArchiveReader {
    data: Vec<u8>,
    names: Vec<String>,
    spans: HashMap<String, EntrySpan>,
}

impl ArchiveReader {
    /// Open an archive from raw (possibly gzip-compressed) bytes.
    pub fn open(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let data = if bytes.starts_with(&GZIP_MAGIC) {
            let mut out = Vec::with_capacity(bytes.len() * 4);
            GzDecoder::new(bytes)
                .read_to_end(&mut out)
                .map_err(|e| ArchiveError::NotAnArchive {
                    detail: format!("gzip: {e}"),
                })?;
            out
        } else {
            bytes.to_vec()
        };

        if data.len() < TAR_BLOCK {
            return Err(ArchiveError::NotAnArchive {
                detail: format!("{} bytes is shorter than one tar block", data.len()),
            });
        }

        let (names, spans) = index_entries(&data)?;
        debug!("Opened archive: {} entries", names.len());

        Ok(Self { data, names, spans })
    }

    /// Entry names in archive order (regular files only).
    pub fn entries(&self) -> &[String] {
        &self.names
    }

    /// Read one entry by its exact, case-sensitive name.
    pub fn read_entry(&self, name: &str) -> Result<&[u8], ArchiveError> {
        let span = self.spans.get(name).ok_or_else(|| ArchiveError::NotFound {
            name: name.to_string(),
        })?;
        Ok(&self.data[span.offset..span.offset + span.size])
    }

    /// Whether an entry with this exact name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.spans.contains_key(name)
    }
}

/// Walk the tar headers once and record where every regular file lives.
fn index_entries(data: &[u8]) -> Result<(Vec<String>, HashMap<String, EntrySpan>), ArchiveError> {
    let mut archive = Archive::new(Cursor::new(data));
    let mut names = Vec::new();
    let mut spans = HashMap::new();

    let entries = archive.entries().map_err(|e| ArchiveError::NotAnArchive {
        detail: e.to_string(),
    })?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if names.is_empty() => {
                return Err(ArchiveError::NotAnArchive {
                    detail: e.to_string(),
                })
            }
            Err(e) => {
                return Err(ArchiveError::CorruptArchive {
                    entries_read: names.len(),
                    detail: e.to_string(),
                })
            }
        };

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let offset = entry.raw_file_position() as usize;
        let size = entry.size() as usize;

        if offset.checked_add(size).is_none_or(|end| end > data.len()) {
            return Err(ArchiveError::CorruptArchive {
                entries_read: names.len(),
                detail: format!("entry '{name}' runs past the end of the archive"),
            });
        }

        if spans.insert(name.clone(), EntrySpan { offset, size }).is_none() {
            names.push(name);
        }
    }

    Ok((names, spans))
}
