//! Whole-file FLAC scenarios: S6 round-trip (vendor/unknown-field/picture
//! preservation) and properties 2 (non-replaced block + audio preservation)
//! and 6 (exactly one LAST-flagged block survives a write).

use std::io::Write as _;
use tagrs::{flac, Cover, Tag};
use tempfile::NamedTempFile;

const MAGIC: &[u8; 4] = b"fLaC";

fn write_u24_be(v: u32) -> [u8; 3] {
    [(v >> 16) as u8, (v >> 8) as u8, v as u8]
}

fn encode_block(block_type: u8, last: bool, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.push((if last { 0x80 } else { 0 }) | (block_type & 0x7f));
    out.extend_from_slice(&write_u24_be(body.len() as u32));
    out.extend_from_slice(body);
    out
}

fn comment_block_body(vendor: &str, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    body.extend_from_slice(vendor.as_bytes());
    body.extend_from_slice(&(fields.len() as u32).to_le_bytes());
    for (k, v) in fields {
        let field = format!("{k}={v}");
        body.extend_from_slice(&(field.len() as u32).to_le_bytes());
        body.extend_from_slice(field.as_bytes());
    }
    body
}

fn picture_block_body(mime: &str, desc: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&3u32.to_be_bytes()); // type: Cover (front)
    body.extend_from_slice(&(mime.len() as u32).to_be_bytes());
    body.extend_from_slice(mime.as_bytes());
    body.extend_from_slice(&(desc.len() as u32).to_be_bytes());
    body.extend_from_slice(desc.as_bytes());
    body.extend_from_slice(&[0u8; 16]);
    body.extend_from_slice(&(data.len() as u32).to_be_bytes());
    body.extend_from_slice(data);
    body
}

fn last_flags(data: &[u8]) -> Vec<bool> {
    let mut pos = 4;
    let mut flags = Vec::new();
    loop {
        if pos + 4 > data.len() {
            break;
        }
        let header = data[pos];
        let last = header & 0x80 != 0;
        let size = ((data[pos + 1] as usize) << 16)
            | ((data[pos + 2] as usize) << 8)
            | data[pos + 3] as usize;
        flags.push(last);
        pos += 4 + size;
        if last {
            break;
        }
    }
    flags
}

#[test]
fn s6_round_trip_preserves_vendor_unknown_field_and_picture() {
    let streaminfo = encode_block(0, false, &[0u8; 34]); // opaque block, carried through
    let comment = encode_block(
        4,
        false,
        &comment_block_body("libFLAC 1.3", &[("TITLE", "A"), ("FOO", "bar")]),
    );
    let picture_bytes = vec![0xAAu8; 64];
    let picture = encode_block(6, true, &picture_block_body("image/png", "cover", &picture_bytes));

    let audio = b"\xFF\xF8audio frames follow unchanged";

    let mut data = Vec::new();
    data.extend_from_slice(MAGIC);
    data.extend_from_slice(&streaminfo);
    data.extend_from_slice(&comment);
    data.extend_from_slice(&picture);
    data.extend_from_slice(audio);

    let mut src = NamedTempFile::new().unwrap();
    src.write_all(&data).unwrap();
    let dst = NamedTempFile::new().unwrap();

    let original = flac::read_tag(src.path()).unwrap();
    assert_eq!(original.title, "A");
    assert_eq!(original.cover.data, picture_bytes);

    let new_tag = Tag {
        title: "B".into(),
        cover: original.cover.clone(),
        ..Default::default()
    };
    flac::write_tag(src.path(), dst.path(), &new_tag).unwrap();

    let read_back = flac::read_tag(dst.path()).unwrap();
    assert_eq!(read_back.title, "B");
    assert_eq!(read_back.cover.data, picture_bytes);

    let out = std::fs::read(dst.path()).unwrap();
    assert!(out.ends_with(&audio[..]));
    assert!(String::from_utf8_lossy(&out).contains("FOO=bar"));

    // property 6: exactly one LAST-flagged block after the write.
    assert_eq!(last_flags(&out).iter().filter(|&&l| l).count(), 1);

    // property 2: the opaque STREAMINFO-role block survives byte-identical.
    assert!(out.windows(streaminfo.len()).any(|w| w == streaminfo.as_slice()));
}

#[test]
fn last_flag_promotes_to_comment_block_when_no_picture_written() {
    let comment = encode_block(4, true, &comment_block_body("libFLAC 1.3", &[("TITLE", "A")]));
    let mut data = Vec::new();
    data.extend_from_slice(MAGIC);
    data.extend_from_slice(&comment);
    data.extend_from_slice(b"\xFF\xF8audio");

    let mut src = NamedTempFile::new().unwrap();
    src.write_all(&data).unwrap();
    let dst = NamedTempFile::new().unwrap();

    // No cover on the new tag -> no picture block emitted.
    flac::write_tag(
        src.path(),
        dst.path(),
        &Tag {
            title: "B".into(),
            ..Default::default()
        },
    )
    .unwrap();

    let out = std::fs::read(dst.path()).unwrap();
    let flags = last_flags(&out);
    assert_eq!(flags.len(), 1);
    assert!(flags[0]);
}

#[test]
fn empty_tag_serializes_to_single_lyrics_field() {
    let comment = encode_block(4, true, &comment_block_body("libFLAC 1.3", &[("TITLE", "A")]));
    let mut data = Vec::new();
    data.extend_from_slice(MAGIC);
    data.extend_from_slice(&comment);
    data.extend_from_slice(b"\xFF\xF8audio");

    let mut src = NamedTempFile::new().unwrap();
    src.write_all(&data).unwrap();
    let dst = NamedTempFile::new().unwrap();

    flac::write_tag(src.path(), dst.path(), &Tag::default()).unwrap();

    let out = std::fs::read(dst.path()).unwrap();
    assert!(String::from_utf8_lossy(&out).contains("LYRICS="));
    assert!(flac::read_tag(dst.path()).is_err());
}

#[test]
fn cover_written_without_type_uses_role_code_3() {
    let comment = encode_block(4, true, &comment_block_body("libFLAC 1.3", &[]));
    let mut data = Vec::new();
    data.extend_from_slice(MAGIC);
    data.extend_from_slice(&comment);
    data.extend_from_slice(b"\xFF\xF8audio");

    let mut src = NamedTempFile::new().unwrap();
    src.write_all(&data).unwrap();
    let dst = NamedTempFile::new().unwrap();

    let tag = Tag {
        cover: Cover {
            mime: "image/jpeg".into(),
            r#type: "Lead artist/lead performer/soloist".into(), // arbitrary, ignored on write
            description: "art".into(),
            data: vec![1, 2, 3],
        },
        ..Default::default()
    };
    flac::write_tag(src.path(), dst.path(), &tag).unwrap();

    let read_back = flac::read_tag(dst.path()).unwrap();
    assert_eq!(read_back.cover.r#type, "Cover (front)");
}
