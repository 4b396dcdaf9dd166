//! FLAC `PICTURE` metadata block extraction (§4.2).

use std::path::Path;
use std::sync::Arc;

use super::ProbeOutcome;

const PICTURE_BLOCK_TYPE: u8 = 6;

pub fn probe(bytes: &Arc<[u8]>, out_cache_path: Option<&Path>) -> ProbeOutcome {
    if bytes.len() < 4 || &bytes[0..4] != b"fLaC" {
        return ProbeOutcome::NotFound;
    }

    let mut pos = 4;
    let mut type0_candidate: Option<(usize, usize)> = None;
    let mut type3_candidate: Option<(usize, usize)> = None;

    loop {
        if pos + 4 > bytes.len() {
            break;
        }
        let header = bytes[pos];
        let is_last = header & 0x80 != 0;
        let block_type = header & 0x7f;
        let length = u32::from_be_bytes([0, bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]]) as usize;
        let body_start = pos + 4;
        let body_end = (body_start + length).min(bytes.len());

        if block_type == PICTURE_BLOCK_TYPE
            && let Some((offset, size, pic_type)) = parse_picture_block(&bytes[body_start..body_end])
        {
            let abs_offset = body_start + offset;
            if pic_type == 3 && type3_candidate.is_none() {
                type3_candidate = Some((abs_offset, size));
            } else if pic_type == 0 && type0_candidate.is_none() {
                type0_candidate = Some((abs_offset, size));
            }
        }

        if is_last || body_end <= pos {
            break;
        }
        pos = body_end;
    }

    match type3_candidate.or(type0_candidate) {
        Some((offset, size)) => super::finish(bytes, offset, size, out_cache_path),
        None => ProbeOutcome::NotFound,
    }
}

/// Layout: picture_type(4 BE), mime_len(4 BE), mime, desc_len(4 BE), desc,
/// width(4), height(4), depth(4), colors(4), data_len(4 BE), data.
/// Returns `(data_offset_within_block, data_len, picture_type)`.
fn parse_picture_block(block: &[u8]) -> Option<(usize, usize, u8)> {
    let mut pos = 0usize;
    let read_u32 = |b: &[u8], p: usize| -> Option<u32> {
        b.get(p..p + 4).map(|s| u32::from_be_bytes(s.try_into().unwrap()))
    };

    let picture_type = read_u32(block, pos)?;
    pos += 4;
    let mime_len = read_u32(block, pos)? as usize;
    pos += 4 + mime_len;
    let desc_len = read_u32(block, pos)? as usize;
    pos += 4 + desc_len;
    pos += 16; // width, height, depth, colors
    let data_len = read_u32(block, pos)? as usize;
    pos += 4;

    if pos + data_len > block.len() || data_len == 0 {
        return None;
    }
    Some((pos, data_len, picture_type as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_picture_block(picture_type: u32, image: &[u8]) -> Vec<u8> {
        let mime = b"image/jpeg";
        let mut block = Vec::new();
        block.extend_from_slice(&picture_type.to_be_bytes());
        block.extend_from_slice(&(mime.len() as u32).to_be_bytes());
        block.extend_from_slice(mime);
        block.extend_from_slice(&0u32.to_be_bytes()); // desc_len
        block.extend_from_slice(&[0u8; 16]); // width/height/depth/colors
        block.extend_from_slice(&(image.len() as u32).to_be_bytes());
        block.extend_from_slice(image);
        block
    }

    fn wrap_block(block_type: u8, is_last: bool, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let header = block_type | if is_last { 0x80 } else { 0 };
        out.push(header);
        let len = body.len() as u32;
        out.extend_from_slice(&len.to_be_bytes()[1..4]);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn extracts_front_cover() {
        let image = vec![9u8; 200];
        let picture = build_picture_block(3, &image);
        let mut file = b"fLaC".to_vec();
        file.extend_from_slice(&wrap_block(PICTURE_BLOCK_TYPE, true, &picture));

        let bytes: Arc<[u8]> = Arc::from(file.into_boxed_slice());
        match probe(&bytes, None) {
            ProbeOutcome::Blob { bytes, offset, size } => {
                assert_eq!(size, 200);
                assert_eq!(&bytes[offset..offset + size], &image[..]);
            }
            other => panic!("expected blob, got {other:?}"),
        }
    }

    #[test]
    fn skips_non_picture_blocks() {
        let mut file = b"fLaC".to_vec();
        file.extend_from_slice(&wrap_block(0, true, &[0u8; 34])); // STREAMINFO-shaped filler
        let bytes: Arc<[u8]> = Arc::from(file.into_boxed_slice());
        assert!(matches!(probe(&bytes, None), ProbeOutcome::NotFound));
    }

    #[test]
    fn no_flac_magic_is_not_found() {
        let bytes: Arc<[u8]> = Arc::from(vec![0u8; 8].into_boxed_slice());
        assert!(matches!(probe(&bytes, None), ProbeOutcome::NotFound));
    }
}
