//! Reusable ID3v2 tag reader
//!
//! `TagHandle` reads only the tag region at the start of a stream (header
//! plus the size the header announces) into a buffer it keeps across
//! resets, then decodes those bytes with the `id3` crate. Audio data after
//! the tag is never read.

use crate::config::MatchCriteria;
use crate::error::{TagError, TagResult};
use id3::{ErrorKind, Tag, TagLike};
use std::io::{self, Cursor, Read};

/// ID3v2 header length ("ID3", version, flags, synchsafe size)
const HEADER_LEN: usize = 10;

/// ID3v2.4 footer length
const FOOTER_LEN: usize = 10;

/// Header flag announcing a footer after the tag body
const FLAG_FOOTER: u8 = 0x10;

/// Buffers above this capacity are released instead of kept for reuse
const MAX_RETAINED_CAPACITY: usize = 1024 * 1024;

/// Which fields a reset should make available
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSet {
    pub artist: bool,
    pub title: bool,
    pub year: bool,
}

impl FieldSet {
    /// Fields constrained by the given criteria
    pub fn from_criteria(criteria: &MatchCriteria) -> Self {
        Self {
            artist: criteria.artist.is_some(),
            title: criteria.title.is_some(),
            year: criteria.year.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.artist || self.title || self.year)
    }
}

/// A tag reader that can be reset onto a new stream without reallocating
#[derive(Debug, Default)]
pub struct TagHandle {
    buf: Vec<u8>,
    tag: Option<Tag>,
}

impl TagHandle {
    /// Create an empty handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the tag at the start of `reader`, replacing any previous tag
    ///
    /// A stream without an ID3v2 header is not an error: the handle is left
    /// empty and `has_frames` returns false. A header whose announced size
    /// exceeds the stream, or bytes `id3` cannot decode, are errors.
    pub fn reset<R: Read>(&mut self, reader: &mut R, fields: FieldSet) -> TagResult<()> {
        self.tag = None;
        self.buf.clear();

        if fields.is_empty() {
            return Ok(());
        }

        let mut header = [0u8; HEADER_LEN];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        if &header[..3] != b"ID3" {
            return Ok(());
        }

        let mut body_len = synchsafe_size(&header[6..10]);
        if header[5] & FLAG_FOOTER != 0 {
            body_len += FOOTER_LEN;
        }

        // The announced size is untrusted, so the buffer grows with what is actually read
        self.buf.extend_from_slice(&header);
        let read = reader.by_ref().take(body_len as u64).read_to_end(&mut self.buf)?;
        if read < body_len {
            return Err(TagError::Truncated {
                expected: body_len,
                actual: read,
            });
        }

        match Tag::read_from2(Cursor::new(&self.buf)) {
            Ok(tag) => self.tag = Some(tag),
            Err(e) if matches!(e.kind, ErrorKind::NoTag) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// True when the last reset found a tag with at least one frame
    pub fn has_frames(&self) -> bool {
        self.tag
            .as_ref()
            .map_or(false, |tag| tag.frames().next().is_some())
    }

    /// Artist (TPE1), empty if absent
    pub fn artist(&self) -> &str {
        self.tag.as_ref().and_then(|tag| tag.artist()).unwrap_or("")
    }

    /// Title (TIT2), empty if absent
    pub fn title(&self) -> &str {
        self.tag.as_ref().and_then(|tag| tag.title()).unwrap_or("")
    }

    /// Raw year text (TYER, else TDRC), empty if absent
    pub fn year(&self) -> &str {
        self.text_frame("TYER")
            .or_else(|| self.text_frame("TDRC"))
            .unwrap_or("")
    }

    /// Drop oversized buffers so a pooled handle does not pin large tags
    pub(crate) fn trim(&mut self) {
        self.tag = None;
        if self.buf.capacity() > MAX_RETAINED_CAPACITY {
            self.buf = Vec::new();
        } else {
            self.buf.clear();
        }
    }

    fn text_frame(&self, id: &str) -> Option<&str> {
        self.tag.as_ref()?.get(id)?.content().text()
    }
}

/// Decode a 28-bit synchsafe integer
fn synchsafe_size(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (*b & 0x7f) as usize)
}
