//! FLAC container codec: walks the `METADATA_BLOCK` chain following the
//! `"fLaC"` magic, locates the single comment block and the largest
//! picture block, and rewrites both while carrying every other block
//! through unparsed.

use crate::bytes::{read_u24_be, read_u32_le, write_u24_be, write_u32_le};
use crate::prelude::*;
use crate::vorbis::{self, parse_picture_block, serialize_picture_block};
use std::fs;
use std::path::Path;

const MAGIC: &[u8; 4] = b"fLaC";
const COMMENT_BLOCK_TYPE: u8 = 4;
const PICTURE_BLOCK_TYPE: u8 = 6;

struct RawBlock {
    block_type: u8,
    body: Vec<u8>,
}

fn parse_block_chain(data: &[u8]) -> Result<Vec<RawBlock>> {
    if data.len() < 4 || &data[0..4] != MAGIC {
        return Err(TagError::Malformed("missing fLaC magic".into()));
    }
    let mut blocks = Vec::new();
    let mut pos = 4;

    loop {
        if data.len() < pos + 4 {
            break;
        }
        let header = data[pos];
        let last = header & 0x80 != 0;
        let block_type = header & 0x7f;
        let size = read_u24_be(&data[pos + 1..pos + 4]) as usize;
        if data.len() < pos + 4 + size {
            return Err(TagError::Malformed("metadata block size exceeds file length".into()));
        }
        blocks.push(RawBlock {
            block_type,
            body: data[pos + 4..pos + 4 + size].to_vec(),
        });
        pos += 4 + size;
        if last {
            break;
        }
    }

    Ok(blocks)
}

fn parse_comment_body(body: &[u8], tag: &mut Tag) {
    if body.len() < 4 {
        return;
    }
    let vendor_len = read_u32_le(&body[0..4]) as usize;
    if body.len() < 4 + vendor_len {
        return;
    }
    vorbis::parse_vorbis_comment(&body[4 + vendor_len..], tag);
}

/// Reads the comment block (vendor-prefixed Vorbis comment) and the
/// largest picture block, if present, into a single `Tag`.
pub fn read_tag<P: AsRef<Path>>(path: P) -> Result<Tag> {
    let data = fs::read(path)?;
    let blocks = parse_block_chain(&data)?;

    let mut tag = Tag::default();
    if let Some(comment) = blocks.iter().find(|b| b.block_type == COMMENT_BLOCK_TYPE) {
        parse_comment_body(&comment.body, &mut tag);
    }
    if let Some(picture) = blocks
        .iter()
        .filter(|b| b.block_type == PICTURE_BLOCK_TYPE)
        .max_by_key(|b| b.body.len())
    {
        match parse_picture_block(&picture.body) {
            Ok(cover) => tag.cover = cover,
            Err(e) => log::warn!("failed to decode FLAC picture block: {e}"),
        }
    }

    if tag.empty() {
        return Err(TagError::NoTag);
    }
    Ok(tag)
}

fn encode_block(block_type: u8, last: bool, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    let header = (if last { 0x80 } else { 0 }) | (block_type & 0x7f);
    out.push(header);
    let mut size_buf = [0u8; 3];
    write_u24_be(body.len() as u32, &mut size_buf);
    out.extend_from_slice(&size_buf);
    out.extend_from_slice(body);
    out
}

/// Writes `tag` to `dst`: the comment block is rebuilt (original vendor
/// string preserved, unknown fields carried through), the picture block is
/// replaced wholesale (or dropped if `tag.cover` is empty), and every other
/// block is carried through byte-identical. Exactly one block in the
/// output ends up LAST-flagged, whichever is physically final.
pub fn write_tag<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q, tag: &Tag) -> Result<()> {
    let data = fs::read(src)?;
    let blocks = parse_block_chain(&data)?;

    let comment_idx = blocks.iter().position(|b| b.block_type == COMMENT_BLOCK_TYPE);
    let picture_idx = blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.block_type == PICTURE_BLOCK_TYPE)
        .max_by_key(|(_, b)| b.body.len())
        .map(|(i, _)| i);

    let (vendor, unknown_blob, unknown_count) = match comment_idx {
        Some(i) => {
            let body = &blocks[i].body;
            if body.len() < 4 {
                (String::new(), Vec::new(), 0)
            } else {
                let vendor_len = read_u32_le(&body[0..4]) as usize;
                let vendor = if body.len() >= 4 + vendor_len {
                    String::from_utf8_lossy(&body[4..4 + vendor_len]).into_owned()
                } else {
                    String::new()
                };
                let fields = if body.len() >= 4 + vendor_len {
                    &body[4 + vendor_len..]
                } else {
                    &[][..]
                };
                let (unknown_blob, unknown_count) = vorbis::extract_unknown_fields(fields);
                (vendor, unknown_blob, unknown_count)
            }
        }
        None => (String::new(), Vec::new(), 0),
    };

    let (known_blob, total_count) = vorbis::serialize_vorbis_comment(tag, unknown_count);

    let mut new_comment_body = Vec::with_capacity(8 + vendor.len() + known_blob.len() + unknown_blob.len());
    let mut word = [0u8; 4];
    write_u32_le(vendor.len() as u32, &mut word);
    new_comment_body.extend_from_slice(&word);
    new_comment_body.extend_from_slice(vendor.as_bytes());
    write_u32_le(total_count as u32, &mut word);
    new_comment_body.extend_from_slice(&word);
    new_comment_body.extend_from_slice(&known_blob);
    new_comment_body.extend_from_slice(&unknown_blob);

    let new_picture_body = if !tag.cover.empty() {
        Some(serialize_picture_block(&tag.cover))
    } else {
        None
    };

    // Everything that isn't the comment/picture block being replaced,
    // in original order.
    let mut passthrough: Vec<&RawBlock> = blocks
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != comment_idx && Some(*i) != picture_idx)
        .map(|(_, b)| b)
        .collect();

    let insert_at = [comment_idx, picture_idx]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(0)
        .min(passthrough.len());

    let mut ordered_bodies: Vec<(u8, Vec<u8>)> = Vec::with_capacity(passthrough.len() + 2);
    for b in passthrough.drain(..insert_at) {
        ordered_bodies.push((b.block_type, b.body.clone()));
    }
    ordered_bodies.push((COMMENT_BLOCK_TYPE, new_comment_body));
    if let Some(picture_body) = new_picture_body {
        ordered_bodies.push((PICTURE_BLOCK_TYPE, picture_body));
    }
    for b in passthrough.drain(..) {
        ordered_bodies.push((b.block_type, b.body.clone()));
    }

    let mut out = Vec::with_capacity(data.len() + 512);
    out.extend_from_slice(MAGIC);
    let last_index = ordered_bodies.len() - 1;
    for (i, (block_type, body)) in ordered_bodies.into_iter().enumerate() {
        out.extend_from_slice(&encode_block(block_type, i == last_index, &body));
    }

    // audio frames: everything after the original metadata chain.
    let audio_start = 4 + blocks
        .iter()
        .map(|b| 4 + b.body.len())
        .sum::<usize>();
    out.extend_from_slice(&data[audio_start.min(data.len())..]);

    fs::write(dst, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment_block(vendor: &str, fields: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        let mut word = [0u8; 4];
        write_u32_le(vendor.len() as u32, &mut word);
        body.extend_from_slice(&word);
        body.extend_from_slice(vendor.as_bytes());

        write_u32_le(fields.len() as u32, &mut word);
        body.extend_from_slice(&word);
        for (k, v) in fields {
            let field = format!("{k}={v}");
            write_u32_le(field.len() as u32, &mut word);
            body.extend_from_slice(&word);
            body.extend_from_slice(field.as_bytes());
        }
        body
    }

    fn synth_flac(blocks: &[(u8, Vec<u8>, bool)], audio: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        for (block_type, body, last) in blocks {
            out.extend_from_slice(&encode_block(*block_type, *last, body));
        }
        out.extend_from_slice(audio);
        out
    }

    #[test]
    fn reads_title_from_comment_block() {
        let body = comment_block("libFLAC 1.3", &[("TITLE", "A")]);
        let data = synth_flac(&[(COMMENT_BLOCK_TYPE, body, true)], b"\xFF\xF8audio");
        let tag = read_tag_from_bytes(&data).unwrap();
        assert_eq!(tag.title, "A");
    }

    fn read_tag_from_bytes(data: &[u8]) -> Result<Tag> {
        let blocks = parse_block_chain(data)?;
        let mut tag = Tag::default();
        if let Some(comment) = blocks.iter().find(|b| b.block_type == COMMENT_BLOCK_TYPE) {
            parse_comment_body(&comment.body, &mut tag);
        }
        if tag.empty() {
            return Err(TagError::NoTag);
        }
        Ok(tag)
    }

    #[test]
    fn exactly_one_last_flag_after_write() {
        use tempfile::NamedTempFile;
        use std::io::Write as _;

        let body = comment_block("libFLAC 1.3", &[("TITLE", "A"), ("FOO", "bar")]);
        let data = synth_flac(&[(COMMENT_BLOCK_TYPE, body, true)], b"\xFF\xF8audio");

        let mut src = NamedTempFile::new().unwrap();
        src.write_all(&data).unwrap();
        let dst = NamedTempFile::new().unwrap();

        let tag = Tag {
            title: "B".into(),
            ..Default::default()
        };
        write_tag(src.path(), dst.path(), &tag).unwrap();

        let out = fs::read(dst.path()).unwrap();
        let blocks = parse_block_chain(&out).unwrap();
        assert_eq!(blocks.len(), 1);

        // re-derive last-flag positions by re-walking the raw bytes
        let mut pos = 4;
        let mut last_flags = Vec::new();
        loop {
            let header = out[pos];
            last_flags.push(header & 0x80 != 0);
            let size = read_u24_be(&out[pos + 1..pos + 4]) as usize;
            pos += 4 + size;
            if header & 0x80 != 0 || pos >= out.len() {
                break;
            }
        }
        assert_eq!(last_flags.iter().filter(|&&l| l).count(), 1);

        let mut tag = Tag::default();
        parse_comment_body(&blocks[0].body, &mut tag);
        assert_eq!(tag.title, "B");
        assert!(String::from_utf8_lossy(&blocks[0].body).contains("FOO=bar"));
    }
}
