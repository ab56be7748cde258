//! Vorbis comment field codec, shared by Ogg and FLAC, plus the FLAC
//! picture sub-block (and its base64-wrapped form used by Ogg's
//! `METADATA_BLOCK_PICTURE` field).

use crate::bytes::{read_u32_be, read_u32_le, write_u32_be, write_u32_le};
use crate::prelude::*;
use crate::tag::{picture_role, WRITE_PICTURE_TYPE_CODE};
use base64::Engine;

const RECOGNIZED_KEYS: &[&str] = &[
    "TITLE",
    "ARTIST",
    "ALBUM",
    "TRACKNUMBER",
    "DATE",
    "GENRE",
    "METADATA_BLOCK_PICTURE",
];

fn is_recognized(key: &str) -> bool {
    RECOGNIZED_KEYS.contains(&key)
}

/// Splits a single `KEY=VALUE` field body on its first `=`, upper-casing
/// the key for matching the way the source canonicalizes it.
fn split_field(data: &[u8]) -> Option<(String, &[u8])> {
    let pos = data.iter().position(|&b| b == b'=')?;
    let key = String::from_utf8_lossy(&data[..pos]).to_uppercase();
    Some((key, &data[pos + 1..]))
}

/// Parses a Vorbis comment blob (4-byte LE field count, then each field as
/// a 4-byte LE length + `KEY=VALUE` bytes) into `tag`. Stops early (best
/// effort) on a truncated field rather than erroring.
pub fn parse_vorbis_comment(data: &[u8], tag: &mut Tag) {
    if data.len() < 4 {
        return;
    }
    let count = read_u32_le(&data[0..4]) as usize;
    let mut rest = &data[4..];

    for _ in 0..count {
        if rest.len() < 4 {
            break;
        }
        let field_size = read_u32_le(&rest[0..4]) as usize;
        if 4 + field_size > rest.len() {
            break;
        }
        if let Some((key, value)) = split_field(&rest[4..4 + field_size]) {
            apply_field(&key, value, tag);
        }
        rest = &rest[4 + field_size..];
    }
}

fn apply_field(key: &str, value: &[u8], tag: &mut Tag) {
    let text = String::from_utf8_lossy(value).into_owned();
    match key {
        "TITLE" => tag.title = text,
        "ARTIST" => tag.artist = text,
        "ALBUM" => tag.album = text,
        "TRACKNUMBER" => tag.track = text.parse().unwrap_or(0),
        "DATE" => tag.year = text.parse().unwrap_or(0),
        "GENRE" => tag.genre = text,
        "METADATA_BLOCK_PICTURE" => match parse_ogg_picture_field(&text) {
            Ok(cover) => tag.cover = cover,
            Err(e) => log::warn!("failed to decode METADATA_BLOCK_PICTURE: {e}"),
        },
        _ => {}
    }
}

/// Walks the same structure as [`parse_vorbis_comment`] but instead copies
/// every field whose key is NOT recognized, verbatim (length-prefixed), and
/// counts them. Used by writers to preserve unknown metadata across a
/// rewrite.
pub fn extract_unknown_fields(data: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(data.len());
    let mut count = 0;

    if data.len() < 4 {
        return (out, count);
    }
    let field_count = read_u32_le(&data[0..4]) as usize;
    let mut rest = &data[4..];

    for _ in 0..field_count {
        if rest.len() < 4 {
            break;
        }
        let field_size = read_u32_le(&rest[0..4]) as usize;
        if 4 + field_size > rest.len() {
            break;
        }
        let field = &rest[4..4 + field_size];
        match split_field(field) {
            Some((key, _)) if !is_recognized(&key) => {
                out.extend_from_slice(&rest[0..4 + field_size]);
                count += 1;
            }
            None => break,
            _ => {}
        }
        rest = &rest[4 + field_size..];
    }

    (out, count)
}

fn push_text_field(out: &mut Vec<u8>, name: &str, value: &str) {
    let field_size = name.len() + value.len() + 1;
    let mut header = [0u8; 4];
    write_u32_le(field_size as u32, &mut header);
    out.extend_from_slice(&header);
    out.extend_from_slice(name.as_bytes());
    out.push(b'=');
    out.extend_from_slice(value.as_bytes());
}

/// Emits one length-prefixed `KEY=VALUE` record per non-empty known field
/// of `tag`, starting the field count at `base_count` (the count of
/// preserved unknown fields). If no field ends up emitted, falls back to a
/// single empty `LYRICS=` field — a Vorbis comment must not be empty.
/// Returns the field blob and the final field count.
pub fn serialize_vorbis_comment(tag: &Tag, base_count: usize) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(tag.size_hint() * 2 + 256);
    let mut count = base_count;

    if !tag.title.is_empty() {
        push_text_field(&mut out, "TITLE", &tag.title);
        count += 1;
    }
    if !tag.artist.is_empty() {
        push_text_field(&mut out, "ARTIST", &tag.artist);
        count += 1;
    }
    if !tag.album.is_empty() {
        push_text_field(&mut out, "ALBUM", &tag.album);
        count += 1;
    }
    if tag.track != 0 {
        push_text_field(&mut out, "TRACKNUMBER", &tag.track.to_string());
        count += 1;
    }
    if tag.year != 0 {
        push_text_field(&mut out, "DATE", &tag.year.to_string());
        count += 1;
    }
    if !tag.genre.is_empty() {
        push_text_field(&mut out, "GENRE", &tag.genre);
        count += 1;
    }
    if !tag.cover.empty() {
        let encoded = serialize_ogg_picture_field(&tag.cover);
        push_text_field(&mut out, "METADATA_BLOCK_PICTURE", &encoded);
        count += 1;
    }

    if count == 0 {
        push_text_field(&mut out, "LYRICS", "");
        count += 1;
    }

    (out, count)
}

/// Parses a raw (non-base64) FLAC picture sub-block, as carried directly in
/// a FLAC `PICTURE` metadata block.
pub fn parse_picture_block(data: &[u8]) -> Result<Cover> {
    if data.len() < 4 {
        return Err(TagError::Malformed("picture block too short".into()));
    }
    let type_code = read_u32_be(&data[0..4]) as u8;

    if data.len() < 8 {
        return Err(TagError::Malformed("picture block missing mime length".into()));
    }
    let mime_len = read_u32_be(&data[4..8]) as usize;
    if data.len() < 8 + mime_len + 4 {
        return Err(TagError::Malformed("picture block incomplete (mime)".into()));
    }
    let mime = String::from_utf8(data[8..8 + mime_len].to_vec())?;

    let desc_off = 8 + mime_len;
    let desc_len = read_u32_be(&data[desc_off..desc_off + 4]) as usize;
    let tail_off = desc_off + 4 + desc_len + 16;
    if data.len() < tail_off + 4 {
        return Err(TagError::Malformed("picture block incomplete (description)".into()));
    }
    let description = String::from_utf8(data[desc_off + 4..desc_off + 4 + desc_len].to_vec())?;

    let image_data = data[tail_off + 4..].to_vec();

    Ok(Cover {
        mime,
        r#type: picture_role(type_code).to_string(),
        description,
        data: image_data,
    })
}

/// Serializes `cover` as a raw FLAC picture sub-block. Picture type is
/// always written as code 3 ("Cover (front)") regardless of the parsed
/// role — preserved from the source, see the design notes on preserved
/// behaviour.
pub fn serialize_picture_block(cover: &Cover) -> Vec<u8> {
    let mut out = Vec::with_capacity(cover.size_hint() + 128);
    let mut word = [0u8; 4];

    write_u32_be(WRITE_PICTURE_TYPE_CODE as u32, &mut word);
    out.extend_from_slice(&word);

    write_u32_be(cover.mime.len() as u32, &mut word);
    out.extend_from_slice(&word);
    out.extend_from_slice(cover.mime.as_bytes());

    write_u32_be(cover.description.len() as u32, &mut word);
    out.extend_from_slice(&word);
    out.extend_from_slice(cover.description.as_bytes());

    out.extend_from_slice(&[0u8; 16]); // width, height, colour depth, colour count

    write_u32_be(cover.data.len() as u32, &mut word);
    out.extend_from_slice(&word);
    out.extend_from_slice(&cover.data);

    out
}

fn parse_ogg_picture_field(encoded: &str) -> Result<Cover> {
    let data = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    parse_picture_block(&data)
}

fn serialize_ogg_picture_field(cover: &Cover) -> String {
    base64::engine::general_purpose::STANDARD.encode(serialize_picture_block(cover))
}
