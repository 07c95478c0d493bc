//! Zip extraction for downloaded archives.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::Error;

/// Returns the decompressed bytes of the entry called `name`.
///
/// Entry names are compared case-insensitively on their final path segment.
/// The CFTC has renamed the inner text file more than once, so when no entry
/// matches and the archive holds exactly one `.txt` file, that file is used.
pub fn extract_entry(archive: &[u8], name: &str) -> Result<Vec<u8>, Error> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).map_err(|e| Error::Archive(e.to_string()))?;

    let mut entries = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let file = zip
            .by_index_raw(index)
            .map_err(|e| Error::Archive(e.to_string()))?;
        if !file.is_dir() {
            entries.push((index, file.name().to_string()));
        }
    }

    let index = locate_entry(&entries, name).ok_or_else(|| Error::MissingEntry {
        name: name.to_string(),
        available: entries.iter().map(|(_, n)| n.clone()).collect(),
    })?;

    let mut file = zip
        .by_index(index)
        .map_err(|e| Error::Archive(e.to_string()))?;
    if file.name() != name {
        tracing::debug!("Using archive entry {} for {}", file.name(), name);
    }
    let mut out = Vec::with_capacity(initial_capacity(file.size()));
    file.read_to_end(&mut out)
        .map_err(|e| Error::Archive(e.to_string()))?;
    Ok(out)
}

fn locate_entry(entries: &[(usize, String)], wanted: &str) -> Option<usize> {
    let exact = entries
        .iter()
        .find(|(_, n)| base_name(n).eq_ignore_ascii_case(wanted))
        .map(|(i, _)| *i);
    if exact.is_some() {
        return exact;
    }

    let mut text_files = entries
        .iter()
        .filter(|(_, n)| base_name(n).to_ascii_lowercase().ends_with(".txt"));
    match (text_files.next(), text_files.next()) {
        (Some((i, _)), None) => Some(*i),
        _ => None,
    }
}

/// Pre-allocation for an entry. The declared size comes from the archive
/// header and is not trusted beyond `MAX_PREALLOC`; `read_to_end` grows the
/// buffer past it when the entry really is larger.
fn initial_capacity(declared: u64) -> usize {
    const MAX_PREALLOC: u64 = 64 << 20;
    declared.min(MAX_PREALLOC) as usize
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
