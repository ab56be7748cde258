//! File-extension dispatcher: picks a container codec for a path and
//! exposes it behind one trait so callers don't need to match on the
//! format themselves.

use crate::prelude::*;
use crate::{flac, mp3, ogg};
use std::path::Path;

/// Reads and writes tags for one container format.
pub trait TagEditor {
    fn read_tag<P: AsRef<Path>>(&self, path: P) -> Result<Tag>;
    fn write_tag<P: AsRef<Path>, Q: AsRef<Path>>(&self, src: P, dst: Q, tag: &Tag) -> Result<()>;
}

pub struct Mp3Editor;
pub struct OggEditor;
pub struct FlacEditor;

impl TagEditor for Mp3Editor {
    fn read_tag<P: AsRef<Path>>(&self, path: P) -> Result<Tag> {
        mp3::read_tag(path)
    }

    fn write_tag<P: AsRef<Path>, Q: AsRef<Path>>(&self, src: P, dst: Q, tag: &Tag) -> Result<()> {
        mp3::write_tag(src, dst, tag)
    }
}

impl TagEditor for OggEditor {
    fn read_tag<P: AsRef<Path>>(&self, path: P) -> Result<Tag> {
        ogg::read_tag(path)
    }

    fn write_tag<P: AsRef<Path>, Q: AsRef<Path>>(&self, src: P, dst: Q, tag: &Tag) -> Result<()> {
        ogg::write_tag(src, dst, tag)
    }
}

impl TagEditor for FlacEditor {
    fn read_tag<P: AsRef<Path>>(&self, path: P) -> Result<Tag> {
        flac::read_tag(path)
    }

    fn write_tag<P: AsRef<Path>, Q: AsRef<Path>>(&self, src: P, dst: Q, tag: &Tag) -> Result<()> {
        flac::write_tag(src, dst, tag)
    }
}

fn extension_of<P: AsRef<Path>>(path: P) -> Option<String> {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Reads the tag for `path`, picking a codec by lowercased extension.
pub fn read_tag<P: AsRef<Path>>(path: P) -> Result<Tag> {
    match extension_of(&path).as_deref() {
        Some("mp3") => Mp3Editor.read_tag(path),
        Some("ogg") => OggEditor.read_tag(path),
        Some("flac") => FlacEditor.read_tag(path),
        _ => Err(TagError::Malformed("unrecognized file extension".into())),
    }
}

/// Writes `tag` to `dst`, reading the existing structure from `src` and
/// picking a codec by `src`'s lowercased extension.
pub fn write_tag<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q, tag: &Tag) -> Result<()> {
    match extension_of(&src).as_deref() {
        Some("mp3") => Mp3Editor.write_tag(src, dst, tag),
        Some("ogg") => OggEditor.write_tag(src, dst, tag),
        Some("flac") => FlacEditor.write_tag(src, dst, tag),
        _ => Err(TagError::Malformed("unrecognized file extension".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_extension_is_malformed() {
        let err = read_tag("song.wav").unwrap_err();
        assert!(matches!(err, TagError::Malformed(_)));
    }

    #[test]
    fn extension_matching_is_case_insensitive() {
        assert_eq!(extension_of("Song.MP3").as_deref(), Some("mp3"));
        assert_eq!(extension_of("Song.Flac").as_deref(), Some("flac"));
    }
}
