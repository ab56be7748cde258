//! Binary tag reader/writer for MP3 (ID3v1/v2.3/v2.4), Ogg Vorbis
//! (VorbisComment-in-Ogg) and FLAC (Vorbis comment + picture metadata
//! blocks), behind a single normalized [`Tag`] record.

mod bytes;
mod editor;
mod error;
pub mod flac;
pub mod mp3;
pub mod ogg;
mod prelude;
mod tag;
mod vorbis;

pub use editor::{read_tag, write_tag, FlacEditor, Mp3Editor, OggEditor, TagEditor};
pub use error::TagError;
pub use prelude::Result;
pub use tag::{id3v1_genre, picture_role, Cover, PictureType, Tag};
