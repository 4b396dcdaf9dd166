//! MP4/M4A/M4B `moov/udta/meta/ilst/covr/data` atom walk (§4.2).

use std::path::Path;
use std::sync::Arc;

use super::ProbeOutcome;

/// File-extension gate: this probe only runs for MP4-family containers.
pub fn is_mp4_family(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|s| s.to_lowercase()),
        Some(ext) if matches!(ext.as_str(), "mp4" | "m4a" | "m4b")
    )
}

pub fn probe(bytes: &Arc<[u8]>, out_cache_path: Option<&Path>) -> ProbeOutcome {
    let Some(moov) = find_atom(bytes, 0, bytes.len(), b"moov") else {
        return ProbeOutcome::NotFound;
    };
    let Some(udta) = find_atom(bytes, moov.body_start, moov.body_end, b"udta") else {
        return ProbeOutcome::NotFound;
    };
    let Some(meta) = find_atom(bytes, udta.body_start, udta.body_end, b"meta") else {
        return ProbeOutcome::NotFound;
    };
    // `meta` carries a 4-byte version/flags field before its children.
    let meta_children_start = (meta.body_start + 4).min(meta.body_end);
    let Some(ilst) = find_atom(bytes, meta_children_start, meta.body_end, b"ilst") else {
        return ProbeOutcome::NotFound;
    };
    let Some(covr) = find_atom(bytes, ilst.body_start, ilst.body_end, b"covr") else {
        return ProbeOutcome::NotFound;
    };
    let Some(data) = find_atom(bytes, covr.body_start, covr.body_end, b"data") else {
        return ProbeOutcome::NotFound;
    };
    // `data` atom: 4-byte well-known type indicator + 4-byte locale, then payload.
    let payload_start = data.body_start + 8;
    if payload_start > data.body_end {
        return ProbeOutcome::Error("truncated covr/data atom".into());
    }
    let type_indicator = if data.body_start + 4 <= data.body_end {
        u32::from_be_bytes(bytes[data.body_start..data.body_start + 4].try_into().unwrap())
    } else {
        0
    };
    let payload = &bytes[payload_start..data.body_end];
    let image = reassemble_payload(payload, type_indicator);

    let offset = payload_start;
    let size = image.len();
    if size == 0 {
        return ProbeOutcome::NotFound;
    }
    // `reassemble_payload` either borrows `payload` unchanged (the common
    // case: raw bytes) or produces owned bytes for the rare big-endian
    // 16-bit-array encoding; only the borrowed case can use a zero-copy
    // blob window, so re-derive offset/size from whichever happened.
    match image {
        std::borrow::Cow::Borrowed(_) => super::finish(bytes, offset, size, out_cache_path),
        std::borrow::Cow::Owned(owned) => match out_cache_path {
            Some(path) => match std::fs::write(path, &owned) {
                Ok(()) => ProbeOutcome::Disk(path.to_path_buf()),
                Err(e) => ProbeOutcome::Error(e.to_string()),
            },
            None => ProbeOutcome::Blob {
                bytes: Arc::from(owned.into_boxed_slice()),
                offset: 0,
                size,
            },
        },
    }
}

/// Reassemble a data payload that is stored as an array of big-endian
/// 16-bit values (well-known type indicator 77, used by a few legacy
/// iTunes atoms) back into a flat byte buffer; any other type indicator
/// is already a flat byte buffer and is passed through unchanged.
fn reassemble_payload(payload: &[u8], type_indicator: u32) -> std::borrow::Cow<'_, [u8]> {
    if type_indicator != 77 || payload.len() % 2 != 0 {
        return std::borrow::Cow::Borrowed(payload);
    }
    let mut out = Vec::with_capacity(payload.len());
    for chunk in payload.chunks_exact(2) {
        let v = u16::from_be_bytes([chunk[0], chunk[1]]);
        out.extend_from_slice(&v.to_be_bytes());
    }
    std::borrow::Cow::Owned(out)
}

struct Atom {
    body_start: usize,
    body_end: usize,
}

/// Linear scan of the atoms in `[start, end)` for the first one matching
/// `want`, handling the 64-bit extended-size and rest-of-file (`size ==
/// 0`) forms.
fn find_atom(bytes: &[u8], start: usize, end: usize, want: &[u8; 4]) -> Option<Atom> {
    let mut pos = start;
    while pos + 8 <= end {
        let size32 = u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap());
        let kind = &bytes[pos + 4..pos + 8];
        let (header_len, body_len) = if size32 == 1 {
            if pos + 16 > end {
                return None;
            }
            let size64 = u64::from_be_bytes(bytes[pos + 8..pos + 16].try_into().unwrap());
            (16usize, (size64 as usize).saturating_sub(16))
        } else if size32 == 0 {
            (8usize, end.saturating_sub(pos + 8))
        } else {
            (8usize, (size32 as usize).saturating_sub(8))
        };
        let body_start = pos + header_len;
        let body_end = (body_start + body_len).min(end);
        if kind == want {
            return Some(Atom { body_start, body_end });
        }
        if body_end <= pos {
            break;
        }
        pos = body_end;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&((body.len() + 8) as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn walks_to_covr_data() {
        let image = vec![0x42u8; 100];
        let mut data_body = vec![0u8, 0, 0, 0]; // type indicator 0 = implicit/binary
        data_body.extend_from_slice(&[0, 0, 0, 0]); // locale
        data_body.extend_from_slice(&image);
        let data_atom = atom(b"data", &data_body);

        let covr = atom(b"covr", &data_atom);
        let ilst = atom(b"ilst", &covr);

        let mut meta_body = vec![0u8; 4]; // version/flags
        meta_body.extend_from_slice(&ilst);
        let meta = atom(b"meta", &meta_body);

        let udta = atom(b"udta", &meta);
        let moov = atom(b"moov", &udta);

        let bytes: Arc<[u8]> = Arc::from(moov.into_boxed_slice());
        match probe(&bytes, None) {
            ProbeOutcome::Blob { bytes, offset, size } => {
                assert_eq!(size, 100);
                assert_eq!(&bytes[offset..offset + size], &image[..]);
            }
            other => panic!("expected blob, got {other:?}"),
        }
    }

    #[test]
    fn extension_gate() {
        assert!(is_mp4_family(Path::new("track.m4a")));
        assert!(is_mp4_family(Path::new("TRACK.M4B")));
        assert!(!is_mp4_family(Path::new("track.mp3")));
    }

    #[test]
    fn missing_moov_is_not_found() {
        let bytes: Arc<[u8]> = Arc::from(vec![0u8; 4].into_boxed_slice());
        assert!(matches!(probe(&bytes, None), ProbeOutcome::NotFound));
    }
}
