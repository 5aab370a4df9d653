//! Track tag extraction.

use std::path::Path;

use lofty::{Accessor, TaggedFileExt};

/// Width of the text fields in the remote `@I` line.
const TAG_WIDTH: usize = 30;
const YEAR_WIDTH: usize = 4;

/// Descriptive tags for a loaded track. At least one field is set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub comment: Option<String>,
    pub year: Option<String>,
}

impl TrackTags {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.genre.is_none()
            && self.comment.is_none()
            && self.year.is_none()
    }

    /// Fixed-width `ID3:` record: title, artist, album, year, comment, genre.
    pub fn id3_line(&self) -> String {
        let mut out = String::from("ID3:");
        out.push_str(&fixed_width(self.title.as_deref(), TAG_WIDTH));
        out.push_str(&fixed_width(self.artist.as_deref(), TAG_WIDTH));
        out.push_str(&fixed_width(self.album.as_deref(), TAG_WIDTH));
        out.push_str(&fixed_width(self.year.as_deref(), YEAR_WIDTH));
        out.push_str(&fixed_width(self.comment.as_deref(), TAG_WIDTH));
        out.push_str(&fixed_width(self.genre.as_deref(), TAG_WIDTH));
        out
    }
}

/// Truncate or space-pad to exactly `width` characters.
fn fixed_width(value: Option<&str>, width: usize) -> String {
    let value = value.unwrap_or("");
    let mut out: String = value.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat_n(' ', width - len));
    out
}

/// Source of track tags.
pub trait TagReader {
    /// Read tags for `path`; `None` when the file has no usable tags.
    fn read_tags(&self, path: &Path) -> Option<TrackTags>;
}

/// Reads tags with lofty (Vorbis comments, ID3v2, MP4, RIFF INFO).
#[derive(Debug, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Option<TrackTags> {
        let tagged = match lofty::read_from_path(path) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(path = ?path, "no tags: {e}");
                return None;
            }
        };
        let tag = tagged.primary_tag().or_else(|| tagged.first_tag())?;

        let tags = TrackTags {
            title: tag.title().map(|v| v.into_owned()),
            artist: tag.artist().map(|v| v.into_owned()),
            album: tag.album().map(|v| v.into_owned()),
            genre: tag.genre().map(|v| v.into_owned()),
            comment: tag.comment().map(|v| v.into_owned()),
            year: tag.year().map(|y| y.to_string()),
        };
        (!tags.is_empty()).then_some(tags)
    }
}
