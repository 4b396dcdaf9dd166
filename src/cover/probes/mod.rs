//! Embedded tag probes (component B, §4.2).
//!
//! Each probe reads the whole file once into an `Arc<[u8]>` and returns
//! either the byte range of an embedded picture within that buffer (a
//! [`ProbeOutcome::Blob`] — a direct move of buffer ownership, replacing
//! the original's "steal the linked-list node" trick) or, when a cache
//! path is supplied, writes the image bytes out and returns
//! [`ProbeOutcome::Disk`].
//!
//! These are intentionally *not* implemented via `lofty`'s unified
//! picture API: the spec calls out the exact byte-level algorithm per
//! format at the level "an implementer must reproduce", so each format
//! gets its own small parser here. `lofty` is still used elsewhere in the
//! crate for general string-tag reading.

pub mod apev2;
pub mod flac;
pub mod id3v2;
pub mod mp4;

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Outcome of a single tag probe.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// Image bytes were written to disk at the given path.
    Disk(std::path::PathBuf),
    /// Image bytes live at `[offset, offset+size)` within `bytes`.
    Blob {
        bytes: Arc<[u8]>,
        offset: usize,
        size: usize,
    },
    /// No embedded picture found (not an error — try the next probe).
    NotFound,
    /// The file could not be read, or the tag was malformed; chain
    /// continues per §7.
    Error(String),
}

/// Read `path` fully into a shared buffer, once, for all four probes to
/// share without re-reading the file four times.
pub fn read_file_shared(path: &Path) -> io::Result<Arc<[u8]>> {
    let bytes = fs::read(path)?;
    Ok(Arc::from(bytes.into_boxed_slice()))
}

/// Materialize a found image: write it to `out_cache_path` when caching is
/// enabled, otherwise return an owned blob window directly into `bytes`.
pub fn finish(
    bytes: &Arc<[u8]>,
    offset: usize,
    size: usize,
    out_cache_path: Option<&Path>,
) -> ProbeOutcome {
    match out_cache_path {
        Some(path) => match write_atomic(path, &bytes[offset..offset + size]) {
            Ok(()) => ProbeOutcome::Disk(path.to_path_buf()),
            Err(e) => ProbeOutcome::Error(e.to_string()),
        },
        None => ProbeOutcome::Blob {
            bytes: bytes.clone(),
            offset,
            size,
        },
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("part");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Run the embedded-probe chain in spec order: FLAC → ID3v2 → APEv2 → MP4
/// (§4.8 step 3). Returns the first non-`NotFound`/non-`Error` result, or
/// the last `Error`/`NotFound` seen if every probe comes up empty — per
/// §7 a malformed tag or IO error on one probe does not stop the chain.
pub fn run_embedded_chain(path: &Path, out_cache_path: Option<&Path>) -> ProbeOutcome {
    let bytes = match read_file_shared(path) {
        Ok(b) => b,
        Err(e) => return ProbeOutcome::Error(e.to_string()),
    };

    let mut last = ProbeOutcome::NotFound;
    for probe in [
        flac::probe as fn(&Arc<[u8]>, Option<&Path>) -> ProbeOutcome,
        id3v2::probe,
        apev2::probe,
    ] {
        match probe(&bytes, out_cache_path) {
            ProbeOutcome::NotFound => {}
            outcome @ ProbeOutcome::Error(_) => last = outcome,
            found => return found,
        }
    }
    if mp4::is_mp4_family(path) {
        match mp4::probe(&bytes, out_cache_path) {
            ProbeOutcome::NotFound => {}
            outcome @ ProbeOutcome::Error(_) => last = outcome,
            found => return found,
        }
    }
    last
}
