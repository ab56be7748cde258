//! Ogg Vorbis codec — the hardest subsystem. Locates the identification,
//! comment and setup header pages, rewrites the comment (and, if present,
//! setup) packet by re-paginating it into fresh Ogg pages, and renumbers
//! every downstream audio page with a recomputed CRC-32.

use crate::bytes::{read_u32_le, write_u32_le};
use crate::prelude::*;
use crate::vorbis;
use std::fs;
use std::path::Path;

const PAGE_HEADER_SIZE: usize = 27;
const VORBIS_MAGIC: &[u8; 6] = b"vorbis";
const HEADER_TYPE_CONTINUE: u8 = 0x01;
const MAX_FRAME_DATA_SIZE: usize = 65025; // 65307 - 282

/// Fallback bitstream serial number used when no existing comment page
/// carries one. A fixed constant (not randomized) per the source; this can
/// collide with an existing stream at that serial, see the design notes.
const FALLBACK_SERIAL: u32 = 31013;

/// Total length of the Ogg page starting at `page`, or 0 if `page` does
/// not begin with a valid page header.
fn get_page_size(page: &[u8]) -> usize {
    if page.len() < PAGE_HEADER_SIZE || &page[0..4] != b"OggS" {
        return 0;
    }
    let segments = page[PAGE_HEADER_SIZE - 1] as usize;
    let header_size = PAGE_HEADER_SIZE + segments;
    if page.len() < header_size {
        return 0;
    }
    let data_size: usize = page[PAGE_HEADER_SIZE..header_size]
        .iter()
        .map(|&b| b as usize)
        .sum();
    header_size + data_size
}

/// Splits the file into `(id_pages, comment_pages, rest)`: the
/// identification packet's pages, the comment+setup header packets'
/// pages, and everything after (audio).
fn split_file_data(data: &[u8]) -> (&[u8], &[u8], &[u8]) {
    let mut first = get_page_size(data);
    let mut second = get_page_size(&data[first..]);
    while second >= PAGE_HEADER_SIZE
        && data.get(first + 5).is_some_and(|b| b & HEADER_TYPE_CONTINUE != 0)
    {
        first += second;
        second = get_page_size(&data[first..]);
    }

    let mut third = get_page_size(&data[first + second..]);
    while third >= PAGE_HEADER_SIZE
        && data
            .get(first + second + 5)
            .is_some_and(|b| b & HEADER_TYPE_CONTINUE != 0)
    {
        second += third;
        third = get_page_size(&data[first + second..]);
    }

    (
        &data[..first],
        &data[first..first + second],
        &data[first + second..],
    )
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Splits the comment+setup page span into `(comment_header_prefix,
/// field_blob, setup_header_packet)`. `field_blob` has the same shape as a
/// plain Vorbis comment (4-byte LE field count, then fields) and can be
/// fed directly to the functions in [`crate::vorbis`].
fn split_comment_pages(pages: &[u8]) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let mut comment_header = Vec::new();
    let mut tag_data = Vec::new();
    let mut remaining = pages;

    while remaining.len() > PAGE_HEADER_SIZE {
        let mut skip = PAGE_HEADER_SIZE + remaining[PAGE_HEADER_SIZE - 1] as usize;
        if skip > remaining.len() {
            break;
        }

        if remaining[5] & HEADER_TYPE_CONTINUE == 0 {
            // first page: carries the comment header prefix
            // [packet_type][b"vorbis"][u32 LE vendor_len][vendor bytes]
            if remaining.len() < skip + 1 + VORBIS_MAGIC.len() + 4 {
                return (Vec::new(), Vec::new(), Vec::new());
            }
            let len_off = skip + 1 + VORBIS_MAGIC.len();
            let vendor_len = read_u32_le(&remaining[len_off..len_off + 4]) as usize;
            let prefix_len = 1 + VORBIS_MAGIC.len() + 4 + vendor_len;
            if remaining.len() < skip + prefix_len {
                return (Vec::new(), Vec::new(), Vec::new());
            }
            comment_header = remaining[skip..skip + prefix_len].to_vec();
            skip += prefix_len;
        }

        let page_size = get_page_size(remaining);
        if page_size == 0 || page_size < skip {
            break;
        }
        tag_data.extend_from_slice(&remaining[skip..page_size]);
        remaining = &remaining[page_size..];
    }

    let setup_header = match find_subslice(&tag_data, VORBIS_MAGIC) {
        Some(pos) if pos >= 1 => {
            let setup = tag_data[pos - 1..].to_vec();
            tag_data.truncate(pos - 1);
            setup
        }
        _ => Vec::new(),
    };

    (comment_header, tag_data, setup_header)
}

fn synth_comment_header() -> Vec<u8> {
    let mut out = vec![3u8];
    out.extend_from_slice(VORBIS_MAGIC);
    out.extend_from_slice(&[0, 0, 0, 0]);
    out
}

/// Owns the running sequence counter and bitstream serial across the
/// comment and setup packet writes, the way the source's page-builder is
/// inherently stateful rather than a free function with hidden state.
struct OggPageWriter {
    serial: u32,
    next_sequence: u32,
}

impl OggPageWriter {
    fn new(serial: u32, start_sequence: u32) -> Self {
        OggPageWriter {
            serial,
            next_sequence: start_sequence,
        }
    }

    /// Chunks `payload` into as many Ogg pages as needed (at most
    /// `MAX_FRAME_DATA_SIZE` bytes each), writes their headers and CRCs,
    /// and advances `next_sequence` by the number of pages emitted.
    fn write_packet(&mut self, payload: &[u8]) -> Vec<u8> {
        if payload.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(payload.len() + 282 * (payload.len() / MAX_FRAME_DATA_SIZE + 1));
        let mut offset = 0;
        let mut first = true;

        while offset < payload.len() {
            let remaining = payload.len() - offset;
            let data_size = remaining.min(MAX_FRAME_DATA_SIZE);

            // Segment-table lacing omits the mandated trailing zero-length
            // segment when `data_size` is an exact multiple of 255 —
            // preserved from the source rather than corrected.
            let mut segment_count = data_size / 255;
            if data_size % 255 != 0 {
                segment_count += 1;
            }

            let page_start = out.len();
            out.extend_from_slice(b"OggS");
            out.push(0); // version
            out.push(if first { 0 } else { HEADER_TYPE_CONTINUE });
            out.extend_from_slice(&[0u8; 8]); // granule position
            let mut word = [0u8; 4];
            write_u32_le(self.serial, &mut word);
            out.extend_from_slice(&word);
            write_u32_le(self.next_sequence, &mut word);
            out.extend_from_slice(&word);
            out.extend_from_slice(&[0u8; 4]); // CRC placeholder
            out.push(segment_count as u8);
            for i in 0..segment_count {
                let last_segment = i + 1 == segment_count;
                let value = if last_segment && data_size % 255 != 0 {
                    (data_size % 255) as u8
                } else {
                    0xFF
                };
                out.push(value);
            }
            out.extend_from_slice(&payload[offset..offset + data_size]);

            let crc = crc32(&out[page_start..]);
            write_u32_le(crc, &mut word);
            out[page_start + 22..page_start + 26].copy_from_slice(&word);

            self.next_sequence += 1;
            offset += data_size;
            first = false;
        }

        out
    }
}

fn make_new_pages(existing_comment_pages: &[u8], tag: &Tag) -> (Vec<u8>, Vec<u8>, u32) {
    let serial = if existing_comment_pages.len() > PAGE_HEADER_SIZE {
        read_u32_le(&existing_comment_pages[14..18])
    } else {
        FALLBACK_SERIAL
    };

    let (mut comment_header, existing_tag_data, setup_header) =
        split_comment_pages(existing_comment_pages);
    if comment_header.is_empty() {
        comment_header = synth_comment_header();
    }

    let (unknown_blob, unknown_count) = vorbis::extract_unknown_fields(&existing_tag_data);
    let (known_blob, total_count) = vorbis::serialize_vorbis_comment(tag, unknown_count);

    let mut packet = Vec::with_capacity(
        comment_header.len() + 4 + known_blob.len() + unknown_blob.len() + 1,
    );
    packet.extend_from_slice(&comment_header);
    let mut word = [0u8; 4];
    write_u32_le(total_count as u32, &mut word);
    packet.extend_from_slice(&word);
    packet.extend_from_slice(&known_blob);
    packet.extend_from_slice(&unknown_blob);
    packet.push(0x01); // framing bit

    let mut writer = OggPageWriter::new(serial, 1);
    let comment_pages = writer.write_packet(&packet);
    let setup_pages = writer.write_packet(&setup_header);
    let total_pages = writer.next_sequence - 1;

    (comment_pages, setup_pages, total_pages)
}

/// Reads the comment header's Vorbis comment fields into a `Tag`.
pub fn read_tag<P: AsRef<Path>>(path: P) -> Result<Tag> {
    let data = fs::read(path)?;
    let (_, comment_pages, _) = split_file_data(&data);
    if comment_pages.is_empty() {
        return Err(TagError::NoTag);
    }

    let (_, field_blob, _) = split_comment_pages(comment_pages);
    let mut tag = Tag::default();
    vorbis::parse_vorbis_comment(&field_blob, &mut tag);

    if tag.empty() {
        return Err(TagError::NoTag);
    }
    Ok(tag)
}

/// Rewrites the comment (and setup, if present) packet with `tag`'s
/// fields, re-paginating as needed, then renumbers and re-checksums every
/// downstream audio page.
pub fn write_tag<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q, tag: &Tag) -> Result<()> {
    let data = fs::read(src)?;
    let (id_pages, comment_pages, rest) = split_file_data(&data);
    let (new_comment_pages, new_setup_pages, total_new_pages) = make_new_pages(comment_pages, tag);

    let mut out = Vec::with_capacity(data.len() + 4096);
    out.extend_from_slice(id_pages);
    out.extend_from_slice(&new_comment_pages);
    out.extend_from_slice(&new_setup_pages);

    let mut sequence = total_new_pages + 1;
    let mut remaining = rest;
    while remaining.len() > PAGE_HEADER_SIZE {
        let page_size = get_page_size(remaining);
        if page_size == 0 {
            break;
        }
        let mut page = remaining[..page_size].to_vec();

        let mut word = [0u8; 4];
        write_u32_le(sequence, &mut word);
        page[18..22].copy_from_slice(&word);
        page[22..26].copy_from_slice(&[0, 0, 0, 0]);
        let crc = crc32(&page);
        write_u32_le(crc, &mut word);
        page[22..26].copy_from_slice(&word);

        out.extend_from_slice(&page);
        sequence += 1;
        remaining = &remaining[page_size..];
    }
    out.extend_from_slice(remaining);

    fs::write(dst, out)?;
    Ok(())
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0;
    for &byte in data {
        let index = ((crc >> 24) as u8) ^ byte;
        crc = CRC_TABLE[index as usize] ^ (crc << 8);
    }
    crc
}

/// Polynomial 0x04C11DB7, MSB-first, zero-initialized, non-reflected.
/// Reproduced verbatim from the source.
#[rustfmt::skip]
const CRC_TABLE: [u32; 256] = [
    0x00000000, 0x04c11db7, 0x09823b6e, 0x0d4326d9, 0x130476dc, 0x17c56b6b, 0x1a864db2, 0x1e475005,
    0x2608edb8, 0x22c9f00f, 0x2f8ad6d6, 0x2b4bcb61, 0x350c9b64, 0x31cd86d3, 0x3c8ea00a, 0x384fbdbd,
    0x4c11db70, 0x48d0c6c7, 0x4593e01e, 0x4152fda9, 0x5f15adac, 0x5bd4b01b, 0x569796c2, 0x52568b75,
    0x6a1936c8, 0x6ed82b7f, 0x639b0da6, 0x675a1011, 0x791d4014, 0x7ddc5da3, 0x709f7b7a, 0x745e66cd,
    0x9823b6e0, 0x9ce2ab57, 0x91a18d8e, 0x95609039, 0x8b27c03c, 0x8fe6dd8b, 0x82a5fb52, 0x8664e6e5,
    0xbe2b5b58, 0xbaea46ef, 0xb7a96036, 0xb3687d81, 0xad2f2d84, 0xa9ee3033, 0xa4ad16ea, 0xa06c0b5d,
    0xd4326d90, 0xd0f37027, 0xddb056fe, 0xd9714b49, 0xc7361b4c, 0xc3f706fb, 0xceb42022, 0xca753d95,
    0xf23a8028, 0xf6fb9d9f, 0xfbb8bb46, 0xff79a6f1, 0xe13ef6f4, 0xe5ffeb43, 0xe8bccd9a, 0xec7dd02d,
    0x34867077, 0x30476dc0, 0x3d044b19, 0x39c556ae, 0x278206ab, 0x23431b1c, 0x2e003dc5, 0x2ac12072,
    0x128e9dcf, 0x164f8078, 0x1b0ca6a1, 0x1fcdbb16, 0x018aeb13, 0x054bf6a4, 0x0808d07d, 0x0cc9cdca,
    0x7897ab07, 0x7c56b6b0, 0x71159069, 0x75d48dde, 0x6b93dddb, 0x6f52c06c, 0x6211e6b5, 0x66d0fb02,
    0x5e9f46bf, 0x5a5e5b08, 0x571d7dd1, 0x53dc6066, 0x4d9b3063, 0x495a2dd4, 0x44190b0d, 0x40d816ba,
    0xaca5c697, 0xa864db20, 0xa527fdf9, 0xa1e6e04e, 0xbfa1b04b, 0xbb60adfc, 0xb6238b25, 0xb2e29692,
    0x8aad2b2f, 0x8e6c3698, 0x832f1041, 0x87ee0df6, 0x99a95df3, 0x9d684044, 0x902b669d, 0x94ea7b2a,
    0xe0b41de7, 0xe4750050, 0xe9362689, 0xedf73b3e, 0xf3b06b3b, 0xf771768c, 0xfa325055, 0xfef34de2,
    0xc6bcf05f, 0xc27dede8, 0xcf3ecb31, 0xcbffd686, 0xd5b88683, 0xd1799b34, 0xdc3abded, 0xd8fba05a,
    0x690ce0ee, 0x6dcdfd59, 0x608edb80, 0x644fc637, 0x7a089632, 0x7ec98b85, 0x738aad5c, 0x774bb0eb,
    0x4f040d56, 0x4bc510e1, 0x46863638, 0x42472b8f, 0x5c007b8a, 0x58c1663d, 0x558240e4, 0x51435d53,
    0x251d3b9e, 0x21dc2629, 0x2c9f00f0, 0x285e1d47, 0x36194d42, 0x32d850f5, 0x3f9b762c, 0x3b5a6b9b,
    0x0315d626, 0x07d4cb91, 0x0a97ed48, 0x0e56f0ff, 0x1011a0fa, 0x14d0bd4d, 0x19939b94, 0x1d528623,
    0xf12f560e, 0xf5ee4bb9, 0xf8ad6d60, 0xfc6c70d7, 0xe22b20d2, 0xe6ea3d65, 0xeba91bbc, 0xef68060b,
    0xd727bbb6, 0xd3e6a601, 0xdea580d8, 0xda649d6f, 0xc423cd6a, 0xc0e2d0dd, 0xcda1f604, 0xc960ebb3,
    0xbd3e8d7e, 0xb9ff90c9, 0xb4bcb610, 0xb07daba7, 0xae3afba2, 0xaafbe615, 0xa7b8c0cc, 0xa379dd7b,
    0x9b3660c6, 0x9ff77d71, 0x92b45ba8, 0x9675461f, 0x8832161a, 0x8cf30bad, 0x81b02d74, 0x857130c3,
    0x5d8a9099, 0x594b8d2e, 0x5408abf7, 0x50c9b640, 0x4e8ee645, 0x4a4ffbf2, 0x470cdd2b, 0x43cdc09c,
    0x7b827d21, 0x7f436096, 0x7200464f, 0x76c15bf8, 0x68860bfd, 0x6c47164a, 0x61043093, 0x65c52d24,
    0x119b4be9, 0x155a565e, 0x18197087, 0x1cd86d30, 0x029f3d35, 0x065e2082, 0x0b1d065b, 0x0fdc1bec,
    0x3793a651, 0x3352bbe6, 0x3e119d3f, 0x3ad08088, 0x2497d08d, 0x2056cd3a, 0x2d15ebe3, 0x29d4f654,
    0xc5a92679, 0xc1683bce, 0xcc2b1d17, 0xc8ea00a0, 0xd6ad50a5, 0xd26c4d12, 0xdf2f6bcb, 0xdbee767c,
    0xe3a1cbc1, 0xe760d676, 0xea23f0af, 0xeee2ed18, 0xf0a5bd1d, 0xf464a0aa, 0xf9278673, 0xfde69bc4,
    0x89b8fd09, 0x8d79e0be, 0x803ac667, 0x84fbdbd0, 0x9abc8bd5, 0x9e7d9662, 0x933eb0bb, 0x97ffad0c,
    0xafb010b1, 0xab710d06, 0xa6322bdf, 0xa2f33668, 0xbcb4666d, 0xb8757bda, 0xb5365d03, 0xb1f740b4,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn build_page(serial: u32, sequence: u32, continuation: bool, payload: &[u8]) -> Vec<u8> {
        let mut writer = OggPageWriter::new(serial, sequence);
        let mut page = writer.write_packet(payload);
        if continuation {
            page[5] = HEADER_TYPE_CONTINUE;
            let crc = crc32(&page);
            let mut word = [0u8; 4];
            page[22..26].copy_from_slice(&[0, 0, 0, 0]);
            write_u32_le(crc, &mut word);
            page[22..26].copy_from_slice(&word);
        }
        page
    }

    #[test]
    fn crc_table_has_256_entries() {
        assert_eq!(CRC_TABLE.len(), 256);
        assert_eq!(CRC_TABLE[1], 0x04c11db7);
    }

    #[test]
    fn page_size_rejects_short_or_bad_magic() {
        assert_eq!(get_page_size(b"short"), 0);
        assert_eq!(get_page_size(&[0u8; 30]), 0);
    }

    #[test]
    fn page_writer_sets_continuation_on_later_pages_only() {
        let payload = vec![0xABu8; MAX_FRAME_DATA_SIZE + 10];
        let mut writer = OggPageWriter::new(1234, 1);
        let pages = writer.write_packet(&payload);

        let first_size = get_page_size(&pages);
        assert!(first_size > 0);
        assert_eq!(pages[5], 0);
        let second = &pages[first_size..];
        assert_eq!(second[5], HEADER_TYPE_CONTINUE);
    }

    #[test]
    fn every_page_crc_verifies() {
        let mut writer = OggPageWriter::new(42, 7);
        let page = writer.write_packet(b"hello vorbis comment payload");
        let mut scrubbed = page.clone();
        scrubbed[22..26].copy_from_slice(&[0, 0, 0, 0]);
        let recomputed = crc32(&scrubbed);
        assert_eq!(&page[22..26], &recomputed.to_le_bytes()[..]);
    }

    #[test]
    fn sequence_numbers_increase_by_one() {
        let mut writer = OggPageWriter::new(1, 5);
        let payload = vec![1u8; MAX_FRAME_DATA_SIZE * 2 + 5];
        let pages = writer.write_packet(&payload);

        let mut offset = 0;
        let mut expected = 5u32;
        while offset < pages.len() {
            let size = get_page_size(&pages[offset..]);
            let seq = read_u32_le(&pages[offset + 18..offset + 22]);
            assert_eq!(seq, expected);
            expected += 1;
            offset += size;
        }
    }

    #[test]
    fn synth_header_has_zero_vendor_length() {
        let header = synth_comment_header();
        assert_eq!(&header[0..1], &[3]);
        assert_eq!(&header[1..7], VORBIS_MAGIC);
        assert_eq!(read_u32_le(&header[7..11]), 0);
    }
}
