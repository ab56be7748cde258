//! The normalized tag record shared by every container codec, plus the two
//! fixed vocabularies (picture role, ID3v1 genre) used to interpret it.

/// Embedded cover artwork.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cover {
    pub mime: String,
    pub r#type: String,
    pub description: String,
    pub data: Vec<u8>,
}

impl Cover {
    pub fn empty(&self) -> bool {
        self.mime.is_empty()
            && self.r#type.is_empty()
            && self.description.is_empty()
            && self.data.is_empty()
    }

    pub fn size_hint(&self) -> usize {
        16 + self.mime.len() + self.r#type.len() + self.description.len() + self.data.len()
    }
}

/// A normalized view of a file's metadata. Empty strings and zero integers
/// both mean "field not present" — codecs must omit such fields on write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tag {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub comment: String,
    pub genre: String,
    pub track: u32,
    pub year: u32,
    pub cover: Cover,
}

impl Tag {
    pub fn empty(&self) -> bool {
        self.title.is_empty()
            && self.artist.is_empty()
            && self.album.is_empty()
            && self.comment.is_empty()
            && self.genre.is_empty()
            && self.track == 0
            && self.year == 0
            && self.cover.empty()
    }

    /// Copies every field of `self` that is absent from `src`. Never
    /// overwrites a field that is already present.
    pub fn merge_into(&mut self, src: &Tag) {
        if self.title.is_empty() {
            self.title = src.title.clone();
        }
        if self.artist.is_empty() {
            self.artist = src.artist.clone();
        }
        if self.album.is_empty() {
            self.album = src.album.clone();
        }
        if self.comment.is_empty() {
            self.comment = src.comment.clone();
        }
        if self.genre.is_empty() {
            self.genre = src.genre.clone();
        }
        if self.track == 0 {
            self.track = src.track;
        }
        if self.year == 0 {
            self.year = src.year;
        }
        if self.cover.empty() {
            self.cover = src.cover.clone();
        }
    }

    /// Approximate serialized size, used by writers to pre-size output
    /// buffers. Overshooting is fine.
    pub fn size_hint(&self) -> usize {
        64 + self.title.len()
            + self.artist.len()
            + self.album.len()
            + self.comment.len()
            + self.genre.len()
            + self.cover.size_hint()
    }
}

/// The fixed picture-role vocabulary, indexed by the APIC / FLAC PICTURE
/// type byte. Unknown codes decode to `Unknown` and map to the empty role
/// string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, num_derive::FromPrimitive)]
#[repr(u32)]
pub enum PictureType {
    Other = 0,
    FileIcon32x32 = 1,
    OtherFileIcon = 2,
    CoverFront = 3,
    CoverBack = 4,
    LeafletPage = 5,
    Media = 6,
    LeadArtist = 7,
    Artist = 8,
    Conductor = 9,
    Band = 10,
    Composer = 11,
    Lyricist = 12,
    RecordingLocation = 13,
    DuringRecording = 14,
    DuringPerformance = 15,
    ScreenCapture = 16,
    BrightColouredFish = 17,
    Illustration = 18,
    BandLogotype = 19,
    PublisherLogotype = 20,
    Unknown,
}

impl PictureType {
    pub fn as_str(&self) -> &'static str {
        PICTURE_ROLES.get(*self as usize).copied().unwrap_or("")
    }
}

/// Picture-role vocabulary, indexed by the APIC / FLAC PICTURE type byte.
/// Unknown codes map to the empty string.
pub const PICTURE_ROLES: [&str; 21] = [
    "Other",
    "32x32 file icon",
    "Other file icon",
    "Cover (front)",
    "Cover (back)",
    "Leaflet page",
    "Media",
    "Lead artist/lead performer/soloist",
    "Artist/performer",
    "Conductor",
    "Band/Orchestra",
    "Composer",
    "Lyricist/text writer",
    "Recording Location",
    "During recording",
    "During performance",
    "Movie/video screen capture",
    "A bright coloured fish",
    "Illustration",
    "Band/artist logotype",
    "Publisher/Studio logotype",
];

pub fn picture_role(code: u8) -> &'static str {
    use num_traits::FromPrimitive;
    PictureType::from_u8(code)
        .unwrap_or(PictureType::Unknown)
        .as_str()
}

/// `Cover::type` is always serialized as role code 3 ("Cover (front)") —
/// preserved from the source rather than round-tripping the parsed role.
pub const WRITE_PICTURE_TYPE_CODE: u8 = 3;

/// ID3v1 genre table, 128 entries, reproduced verbatim from the source
/// (including its two typos at indices 117/118).
pub const ID3V1_GENRES: [&str; 128] = [
    "Blues", "Classic Rock", "Country", "Dance", "Disco", "Funk",
    "Grunge", "Hip-Hop", "Jazz", "Metal", "New Age",
    "Oldies", "Other", "Pop", "R&B", "Rap",
    "Reggae", "Rock", "Techno", "Industrial", "Alternative",
    "Ska", "Death Metal", "Pranks", "Soundtrack", "Euro-Techno",
    "Ambient", "Trip-Hop", "Vocal", "Jazz+Funk", "Fusion",
    "Trance", "Classical", "Instrumental", "Acid", "House",
    "Game", "Sound Clip", "Gospel", "Noise", "AlternRock",
    "Bass", "Soul", "Punk", "Space", "Meditative",
    "Instrumental Pop", "Instrumental Rock", "Ethnic", "Gothic", "Darkwave",
    "Techno-Industrial", "Electronic", "Pop-Folk", "Eurodance", "Dream",
    "Southern Rock", "Comedy", "Cult", "Gangsta", "Top 40",
    "Christian Rap", "Pop/Funk", "Jungle", "Native American", "Cabaret",
    "New Wave", "Psychadelic", "Rave", "Showtunes", "Trailer",
    "Lo-Fi", "Tribal", "Acid Punk", "Acid Jazz", "Polka",
    "Retro", "Musical", "Rock & Roll", "Hard Rock", "Folk",
    "Folk-Rock", "National Folk", "Swing", "Fast Fusion", "Bebob",
    "Latin", "Revival", "Celtic", "Bluegrass", "Avantgarde",
    "Gothic Rock", "Progressive Rock", "Psychedelic Rock", "Symphonic Rock", "Slow Rock",
    "Big Band", "Chorus", "Easy Listening", "Acoustic", "Humour",
    "Speech", "Chanson", "Opera", "Chamber Music", "Sonata",
    "Symphony", "Booty Brass", "Primus", "Porn Groove", "Satire",
    "Slow Jam", "Club", "Tango", "Samba", "Folklore",
    "Ballad", "Poweer Ballad", "Rhytmic Soul", "Freestyle", "Duet",
    "Punk Rock", "Drum Solo", "A Capela", "Euro-House", "Dance Hall",
    "Unknown", "Unknown",
];

pub fn id3v1_genre(code: u8) -> &'static str {
    ID3V1_GENRES.get(code as usize).copied().unwrap_or("")
}
