//! APEv2 "Cover Art (Front)" item extraction (§4.2).

use std::path::Path;
use std::sync::Arc;

use super::ProbeOutcome;

const FOOTER_SIZE: usize = 32;
const MAGIC: &[u8] = b"APETAGEX";
const COVER_KEY: &str = "cover art (front)";

pub fn probe(bytes: &Arc<[u8]>, out_cache_path: Option<&Path>) -> ProbeOutcome {
    if bytes.len() < FOOTER_SIZE {
        return ProbeOutcome::NotFound;
    }
    let footer = &bytes[bytes.len() - FOOTER_SIZE..];
    if &footer[0..8] != MAGIC {
        return ProbeOutcome::NotFound;
    }
    let tag_size = u32::from_le_bytes(footer[12..16].try_into().unwrap()) as usize;
    let item_count = u32::from_le_bytes(footer[16..20].try_into().unwrap()) as usize;
    let flags = u32::from_le_bytes(footer[20..24].try_into().unwrap());
    let has_header = flags & 0x8000_0000 != 0;

    // tag_size covers the items plus the footer, but not a separate header.
    let Some(items_start) = bytes.len().checked_sub(tag_size) else {
        return ProbeOutcome::Error("APEv2 tag_size exceeds file length".into());
    };
    let items_end = bytes.len() - FOOTER_SIZE;
    let items_start = if has_header {
        items_start + FOOTER_SIZE
    } else {
        items_start
    };
    if items_start > items_end {
        return ProbeOutcome::Error("malformed APEv2 tag bounds".into());
    }

    let mut pos = items_start;
    for _ in 0..item_count {
        if pos + 8 > items_end {
            break;
        }
        let value_size = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 8; // value_size + item flags
        let Some(key_end) = bytes[pos..items_end].iter().position(|&b| b == 0) else {
            break;
        };
        let key = String::from_utf8_lossy(&bytes[pos..pos + key_end]).to_string();
        pos += key_end + 1;
        if pos + value_size > items_end {
            break;
        }
        if key.eq_ignore_ascii_case(COVER_KEY) {
            let value = &bytes[pos..pos + value_size];
            if let Some((offset, size)) = parse_cover_value(value) {
                return super::finish(bytes, pos + offset, size, out_cache_path);
            }
        }
        pos += value_size;
    }
    ProbeOutcome::NotFound
}

/// The item value is a NUL-terminated filename followed by image bytes;
/// require at least 20 bytes of image data (§4.2).
fn parse_cover_value(value: &[u8]) -> Option<(usize, usize)> {
    let filename_end = value.iter().position(|&b| b == 0)?;
    let image_start = filename_end + 1;
    if image_start > value.len() {
        return None;
    }
    let image_size = value.len() - image_start;
    if image_size < 20 {
        return None;
    }
    Some((image_start, image_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_ape_tag(key: &str, filename: &str, image: &[u8]) -> Vec<u8> {
        let mut value = Vec::new();
        value.extend_from_slice(filename.as_bytes());
        value.push(0);
        value.extend_from_slice(image);

        let mut item = Vec::new();
        item.extend_from_slice(&(value.len() as u32).to_le_bytes());
        item.extend_from_slice(&0u32.to_le_bytes()); // item flags
        item.extend_from_slice(key.as_bytes());
        item.push(0);
        item.extend_from_slice(&value);

        let tag_size = item.len() + FOOTER_SIZE;
        let mut footer = Vec::new();
        footer.extend_from_slice(MAGIC);
        footer.extend_from_slice(&2000u32.to_le_bytes());
        footer.extend_from_slice(&(tag_size as u32).to_le_bytes());
        footer.extend_from_slice(&1u32.to_le_bytes()); // item_count
        footer.extend_from_slice(&0u32.to_le_bytes()); // flags: no header
        footer.extend_from_slice(&[0u8; 8]);

        let mut out = item;
        out.extend_from_slice(&footer);
        out
    }

    #[test]
    fn extracts_cover_art_front() {
        let image = vec![0xABu8; 64];
        let tag = build_ape_tag("Cover Art (Front)", "cover.jpg", &image);
        let bytes: Arc<[u8]> = Arc::from(tag.into_boxed_slice());

        match probe(&bytes, None) {
            ProbeOutcome::Blob { bytes, offset, size } => {
                assert_eq!(size, 64);
                assert_eq!(&bytes[offset..offset + size], &image[..]);
            }
            other => panic!("expected blob, got {other:?}"),
        }
    }

    #[test]
    fn key_match_is_case_insensitive() {
        let image = vec![1u8; 32];
        let tag = build_ape_tag("COVER ART (FRONT)", "x.png", &image);
        let bytes: Arc<[u8]> = Arc::from(tag.into_boxed_slice());
        assert!(matches!(probe(&bytes, None), ProbeOutcome::Blob { .. }));
    }

    #[test]
    fn wrong_key_is_not_found() {
        let tag = build_ape_tag("Artist", "n/a", &[1u8; 32]);
        let bytes: Arc<[u8]> = Arc::from(tag.into_boxed_slice());
        assert!(matches!(probe(&bytes, None), ProbeOutcome::NotFound));
    }

    #[test]
    fn no_footer_is_not_found() {
        let bytes: Arc<[u8]> = Arc::from(vec![0u8; 10].into_boxed_slice());
        assert!(matches!(probe(&bytes, None), ProbeOutcome::NotFound));
    }
}
