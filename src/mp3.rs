//! ID3v1 / ID3v2.3 / ID3v2.4 codec. Reads merge all three candidate regions
//! (v2.3 ∪ v2.4 ∪ v1, v2.3 winning ties); writes always emit a fresh
//! ID3v2.3 envelope, preserving unknown frames and dropping any trailing
//! ID3v1 tag.

use crate::bytes::{
    read_syncsafe_u32_be, read_u32_be, utf16be_to_utf8, utf16le_to_utf8, utf8_to_utf16le,
    write_syncsafe_u32_be, write_u32_be,
};
use crate::prelude::*;
use crate::tag::{id3v1_genre, picture_role, WRITE_PICTURE_TYPE_CODE};
use std::fs;
use std::path::Path;

const HEADER_SIZE: usize = 10;
const FRAME_HEADER_SIZE: usize = 10;

const KNOWN_FRAME_IDS: [&[u8; 4]; 9] = [
    b"APIC", b"COMM", b"TALB", b"TCON", b"TIT2", b"TPE1", b"TRCK", b"TYER", b"TDRC",
];

#[derive(Copy, Clone, PartialEq)]
enum Id3Version {
    V23,
    V24,
}

fn trim_text(s: &str) -> String {
    s.trim_matches(|c| c == ' ' || c == '\0').to_string()
}

fn decode_text(encoding: u8, data: &[u8]) -> String {
    match encoding {
        0 | 3 => trim_text(&String::from_utf8_lossy(data)),
        1 => utf16le_to_utf8(data),
        2 => utf16be_to_utf8(data),
        _ => String::new(),
    }
}

fn read_id3v2_text(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }
    decode_text(data[0], &data[1..])
}

/// Single-byte null-terminator scan, even for UTF-16-encoded fields. This
/// mis-terminates on legitimate UTF-16 text containing a lone `0x00` byte
/// but is preserved here rather than switched to an aligned `0x00 0x00`
/// scan, matching the source.
fn decode_apic(data: &[u8]) -> Cover {
    if data.is_empty() {
        return Cover::default();
    }
    let encoding = data[0];
    let mut rest = &data[1..];
    let mut cover = Cover::default();

    if let Some(pos) = rest.iter().position(|&b| b == 0) {
        cover.mime = decode_text(encoding, &rest[..pos]);
        rest = &rest[pos + 1..];
    }

    if rest.len() < 2 {
        return Cover::default();
    }
    cover.r#type = picture_role(rest[0]).to_string();

    let after_type = &rest[1..];
    if let Some(pos) = after_type.iter().position(|&b| b == 0) {
        cover.description = decode_text(encoding, &after_type[..pos]);
        rest = &after_type[pos + 1..];
    }

    cover.data = rest.to_vec();
    cover
}

fn apply_frame(tag: &mut Tag, id: &[u8], body: &[u8]) {
    match id {
        b"APIC" => tag.cover = decode_apic(body),
        b"COMM" => tag.comment = read_id3v2_text(body),
        b"TALB" => tag.album = read_id3v2_text(body),
        b"TCON" => tag.genre = read_id3v2_text(body),
        b"TIT2" => tag.title = read_id3v2_text(body),
        b"TPE1" => tag.artist = read_id3v2_text(body),
        b"TRCK" => tag.track = read_id3v2_text(body).parse().unwrap_or(0),
        b"TYER" | b"TDRC" => tag.year = read_id3v2_text(body).parse().unwrap_or(0),
        _ => {}
    }
}

fn frame_size(version: Id3Version, data: &[u8]) -> usize {
    match version {
        Id3Version::V23 => read_u32_be(data) as usize,
        Id3Version::V24 => read_syncsafe_u32_be(data) as usize,
    }
}

fn parse_frames(body: &[u8], version: Id3Version) -> Tag {
    let mut tag = Tag::default();
    let mut rest = body;

    while rest.len() > FRAME_HEADER_SIZE {
        let id = &rest[0..4];
        if id == b"\0\0\0\0" {
            break;
        }
        let size = frame_size(version, &rest[4..8]);
        if FRAME_HEADER_SIZE + size > rest.len() {
            break;
        }
        apply_frame(&mut tag, id, &rest[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + size]);
        rest = &rest[FRAME_HEADER_SIZE + size..];
    }

    tag
}

struct Id3v2Location {
    /// Total bytes spanned by every leading, stacked ID3v2 envelope —
    /// where the audio payload begins.
    total_len: usize,
    v23_body: Option<(usize, usize)>,
    v24_body: Option<(usize, usize)>,
}

fn locate_id3v2(data: &[u8]) -> Id3v2Location {
    let mut total_len = 0;
    let mut v23_body = None;
    let mut v24_body = None;
    let mut pos = 0;

    loop {
        if data.len() < pos + HEADER_SIZE || &data[pos..pos + 3] != b"ID3" {
            break;
        }
        let size = read_syncsafe_u32_be(&data[pos + 6..pos + 10]) as usize;
        let envelope_len = HEADER_SIZE + size;
        if size == 0 || data.len() < pos + envelope_len {
            break;
        }

        let version = data[pos + 3];
        let revision = data[pos + 4];
        let flags = data[pos + 5];
        let mut ext_len = 0;
        if flags & 0x40 != 0 && data.len() >= pos + 15 {
            ext_len = match version {
                3 => read_u32_be(&data[pos + 11..pos + 15]) as usize + 4,
                4 => read_syncsafe_u32_be(&data[pos + 11..pos + 15]) as usize,
                _ => 0,
            };
        }

        let body_start = pos + HEADER_SIZE + ext_len;
        let body_end = body_start + size;
        if body_end <= data.len() {
            if version == 3 && revision == 0 && v23_body.is_none() {
                v23_body = Some((body_start, body_end));
            } else if version == 4 && revision == 0 && v24_body.is_none() {
                v24_body = Some((body_start, body_end));
            }
        }

        total_len += envelope_len;
        pos += envelope_len;
    }

    Id3v2Location {
        total_len,
        v23_body,
        v24_body,
    }
}

fn parse_id3v1(data: &[u8]) -> Tag {
    if data.len() < 128 {
        return Tag::default();
    }
    let region = &data[data.len() - 128..];
    if &region[0..3] != b"TAG" {
        return Tag::default();
    }

    let mut tag = Tag::default();
    tag.title = trim_text(&String::from_utf8_lossy(&region[3..33]));
    tag.artist = trim_text(&String::from_utf8_lossy(&region[33..63]));
    tag.album = trim_text(&String::from_utf8_lossy(&region[63..93]));
    tag.year = String::from_utf8_lossy(&region[93..97]).parse().unwrap_or(0);

    if region[125] == 0 {
        tag.comment = trim_text(&String::from_utf8_lossy(&region[97..125]));
        tag.track = region[126] as u32;
    } else {
        tag.comment = trim_text(&String::from_utf8_lossy(&region[97..127]));
    }
    tag.genre = id3v1_genre(region[127]).to_string();
    tag
}

/// Reads and merges the ID3v2.3, ID3v2.4 and ID3v1 views of `path` into a
/// single `Tag` (v2.3 wins ties, v1 fills whatever both leave absent).
pub fn read_tag<P: AsRef<Path>>(path: P) -> Result<Tag> {
    let data = fs::read(path)?;

    let tag10 = parse_id3v1(&data);
    let loc = locate_id3v2(&data);
    let tag23 = loc
        .v23_body
        .map(|(s, e)| parse_frames(&data[s..e], Id3Version::V23))
        .unwrap_or_default();
    let tag24 = loc
        .v24_body
        .map(|(s, e)| parse_frames(&data[s..e], Id3Version::V24))
        .unwrap_or_default();

    if tag10.empty() && tag23.empty() && tag24.empty() {
        return Err(TagError::NoTag);
    }

    let mut merged = tag23;
    merged.merge_into(&tag24);
    merged.merge_into(&tag10);
    Ok(merged)
}

fn push_text_frame(out: &mut Vec<u8>, id: &[u8; 4], value: &str) {
    let utf16 = utf8_to_utf16le(value);
    let frame_size = utf16.len() as u32 + 3;
    out.extend_from_slice(id);
    let mut size_buf = [0u8; 4];
    write_u32_be(frame_size, &mut size_buf);
    out.extend_from_slice(&size_buf);
    out.extend_from_slice(&[0, 0]); // flags
    out.push(1); // encoding: UTF-16 with BOM
    out.extend_from_slice(&[0xFF, 0xFE]);
    out.extend_from_slice(&utf16);
}

fn push_apic_frame(out: &mut Vec<u8>, cover: &Cover) {
    let mut body = Vec::with_capacity(cover.size_hint());
    body.push(0); // encoding: ISO-8859-1 / UTF-8 raw bytes
    body.extend_from_slice(cover.mime.as_bytes());
    body.push(0);
    body.push(WRITE_PICTURE_TYPE_CODE);
    body.extend_from_slice(cover.description.as_bytes());
    body.push(0);
    body.extend_from_slice(&cover.data);

    out.extend_from_slice(b"APIC");
    let mut size_buf = [0u8; 4];
    write_u32_be(body.len() as u32, &mut size_buf);
    out.extend_from_slice(&size_buf);
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&body);
}

fn serialize_known_frames(tag: &Tag) -> Vec<u8> {
    let mut out = Vec::with_capacity(tag.size_hint());
    if !tag.title.is_empty() {
        push_text_frame(&mut out, b"TIT2", &tag.title);
    }
    if !tag.artist.is_empty() {
        push_text_frame(&mut out, b"TPE1", &tag.artist);
    }
    if !tag.album.is_empty() {
        push_text_frame(&mut out, b"TALB", &tag.album);
    }
    if tag.track != 0 {
        push_text_frame(&mut out, b"TRCK", &tag.track.to_string());
    }
    if tag.year != 0 {
        push_text_frame(&mut out, b"TYER", &tag.year.to_string());
    }
    if !tag.comment.is_empty() {
        push_text_frame(&mut out, b"COMM", &tag.comment);
    }
    if !tag.genre.is_empty() {
        push_text_frame(&mut out, b"TCON", &tag.genre);
    }
    if !tag.cover.empty() {
        push_apic_frame(&mut out, &tag.cover);
    }
    out
}

/// Copies every frame in an existing ID3v2.3 body whose ID is not one of
/// the frames this crate rewrites, stopping at the padding marker.
fn extract_unknown_frames(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut rest = body;

    while rest.len() > FRAME_HEADER_SIZE {
        let id = &rest[0..4];
        if id == b"\0\0\0\0" {
            break;
        }
        let size = frame_size(Id3Version::V23, &rest[4..8]);
        if FRAME_HEADER_SIZE + size > rest.len() {
            break;
        }
        if !KNOWN_FRAME_IDS.iter().any(|known| known.as_slice() == id) {
            out.extend_from_slice(&rest[..FRAME_HEADER_SIZE + size]);
        }
        rest = &rest[FRAME_HEADER_SIZE + size..];
    }

    out
}

/// Writes `tag` to `dst` as a fresh ID3v2.3 envelope, preserving unknown
/// v2.3 frames and the audio payload, and dropping any trailing ID3v1 tag.
pub fn write_tag<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q, tag: &Tag) -> Result<()> {
    let data = fs::read(src)?;
    let loc = locate_id3v2(&data);

    let unknown_frames = loc
        .v23_body
        .map(|(s, e)| extract_unknown_frames(&data[s..e]))
        .unwrap_or_default();
    let new_frames = serialize_known_frames(tag);

    let mut body = Vec::with_capacity(new_frames.len() + unknown_frames.len());
    body.extend_from_slice(&new_frames);
    body.extend_from_slice(&unknown_frames);

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len() + data.len());
    out.extend_from_slice(b"ID3");
    out.extend_from_slice(&[0x03, 0x00, 0x00]); // version 2.3, no flags
    let mut size_buf = [0u8; 4];
    write_syncsafe_u32_be(body.len() as u32, &mut size_buf);
    out.extend_from_slice(&size_buf);
    out.extend_from_slice(&body);

    let mut audio = &data[loc.total_len.min(data.len())..];
    if audio.len() >= 128 && &audio[audio.len() - 128..audio.len() - 125] == b"TAG" {
        audio = &audio[..audio.len() - 128];
    }
    out.extend_from_slice(audio);

    fs::write(dst, out)?;
    Ok(())
}
