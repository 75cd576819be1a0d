//! Minimal EXIF support: writing and reading the `UserComment` tag and the image dimensions.
//!
//! The tag block is stored in an `APP1` segment that holds `Exif\0\0` followed by a TIFF
//! structure. Only the handful of tags needed for a capture bundle are written:
//!
//! ```text
//! IFD0       0x0100 ImageWidth   LONG
//!            0x0101 ImageLength  LONG
//!            0x8769 ExifIFD      LONG  -> Exif IFD
//! Exif IFD   0x9286 UserComment  UNDEFINED  "ASCII\0\0\0" + text
//! ```

use crate::TagError;
use log::*;

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const ASCII_CHARSET: &[u8] = b"ASCII\0\0\0";

const TAG_IMAGE_WIDTH: u16 = 0x0100;
const TAG_IMAGE_LENGTH: u16 = 0x0101;
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_USER_COMMENT: u16 = 0x9286;

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_UNDEFINED: u16 = 7;

/// The largest payload of a single JPEG segment (the length field counts itself).
const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

const IFD0_OFFSET: u32 = 8;
const IFD0_ENTRIES: u32 = 3;
const EXIF_IFD_OFFSET: u32 = IFD0_OFFSET + ifd_size(IFD0_ENTRIES);
const COMMENT_OFFSET: u32 = EXIF_IFD_OFFSET + ifd_size(1);

const fn ifd_size(entries: u32) -> u32 {
    2 + 12 * entries + 4
}

/// The largest comment, in bytes, that [`embed_user_comment`] accepts.
pub const MAX_COMMENT_LEN: usize =
    MAX_SEGMENT_PAYLOAD - EXIF_HEADER.len() - COMMENT_OFFSET as usize - ASCII_CHARSET.len();

/// The tags read back by [`read_exif`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifTags {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub user_comment: Option<String>,
}

/// A marker segment before the scan data, as a byte range including marker and length.
#[derive(Debug, Clone, Copy)]
struct Segment {
    marker: u8,
    start: usize,
    end: usize,
}

impl Segment {
    fn payload<'a>(&self, jpeg: &'a [u8]) -> &'a [u8] {
        &jpeg[(self.start + 4).min(self.end)..self.end]
    }

    fn is_exif(&self, jpeg: &[u8]) -> bool {
        self.marker == APP1 && self.payload(jpeg).starts_with(EXIF_HEADER)
    }
}

/// Splits the header of a JPEG stream into its segments. Returns them with the offset where the
/// scan (or the end of the image) begins.
fn segments(jpeg: &[u8]) -> Result<(Vec<Segment>, usize), TagError> {
    if jpeg.len() < 2 || jpeg[0] != 0xFF || jpeg[1] != SOI {
        return Err(TagError::NotJpeg);
    }
    let mut segments = vec![];
    let mut pos = 2;
    loop {
        if pos + 2 > jpeg.len() {
            return Err(TagError::Truncated);
        }
        if jpeg[pos] != 0xFF {
            return Err(TagError::NotJpeg);
        }
        let marker = jpeg[pos + 1];
        match marker {
            // Fill byte before a marker.
            0xFF => pos += 1,
            SOS | EOI => return Ok((segments, pos)),
            // Standalone markers without a length.
            0x01 | 0xD0..=0xD7 => pos += 2,
            _ => {
                if pos + 4 > jpeg.len() {
                    return Err(TagError::Truncated);
                }
                let length = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
                if length < 2 {
                    return Err(TagError::NotJpeg);
                }
                let end = pos + 2 + length;
                if end > jpeg.len() {
                    return Err(TagError::Truncated);
                }
                segments.push(Segment {
                    marker,
                    start: pos,
                    end,
                });
                pos = end;
            }
        }
    }
}

/// Builds the `Exif\0\0` + little-endian TIFF payload of the `APP1` segment.
fn exif_payload(comment: &str, width: u32, height: u32) -> Result<Vec<u8>, TagError> {
    if comment.len() > MAX_COMMENT_LEN {
        return Err(TagError::CommentTooLarge {
            size: comment.len(),
            limit: MAX_COMMENT_LEN,
        });
    }
    let comment_count = (ASCII_CHARSET.len() + comment.len()) as u32;

    let mut tiff = Vec::with_capacity(COMMENT_OFFSET as usize + comment_count as usize);
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&IFD0_OFFSET.to_le_bytes());

    let entry = |tiff: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: u32| {
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&kind.to_le_bytes());
        tiff.extend_from_slice(&count.to_le_bytes());
        tiff.extend_from_slice(&value.to_le_bytes());
    };

    // Entries are sorted by tag.
    tiff.extend_from_slice(&(IFD0_ENTRIES as u16).to_le_bytes());
    entry(&mut tiff, TAG_IMAGE_WIDTH, TYPE_LONG, 1, width);
    entry(&mut tiff, TAG_IMAGE_LENGTH, TYPE_LONG, 1, height);
    entry(&mut tiff, TAG_EXIF_IFD, TYPE_LONG, 1, EXIF_IFD_OFFSET);
    tiff.extend_from_slice(&0u32.to_le_bytes());

    tiff.extend_from_slice(&1u16.to_le_bytes());
    entry(&mut tiff, TAG_USER_COMMENT, TYPE_UNDEFINED, comment_count, COMMENT_OFFSET);
    tiff.extend_from_slice(&0u32.to_le_bytes());

    debug_assert_eq!(tiff.len(), COMMENT_OFFSET as usize);
    tiff.extend_from_slice(ASCII_CHARSET);
    tiff.extend_from_slice(comment.as_bytes());

    let mut payload = Vec::with_capacity(EXIF_HEADER.len() + tiff.len());
    payload.extend_from_slice(EXIF_HEADER);
    payload.extend_from_slice(&tiff);
    Ok(payload)
}

/// Returns a copy of `jpeg` whose EXIF block holds `comment` as its `UserComment` and the given
/// dimensions as `ImageWidth`/`ImageLength`.
///
/// Any existing EXIF block is replaced. The new one is placed right after the start of image and
/// any `APP0` (JFIF) segments, where readers expect it. The image data is not touched.
pub fn embed_user_comment(
    jpeg: &[u8],
    comment: &str,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, TagError> {
    let (segments, scan) = segments(jpeg)?;
    let payload = exif_payload(comment, width, height)?;

    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&[0xFF, SOI]);
    let leading_app0 = segments.iter().take_while(|s| s.marker == APP0).count();
    for segment in &segments[..leading_app0] {
        out.extend_from_slice(&jpeg[segment.start..segment.end]);
    }
    out.extend_from_slice(&[0xFF, APP1]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&payload);

    let mut replaced = 0;
    for segment in &segments[leading_app0..] {
        if segment.is_exif(jpeg) {
            replaced += 1;
            continue;
        }
        out.extend_from_slice(&jpeg[segment.start..segment.end]);
    }
    if replaced != 0 {
        debug!("replaced {} existing EXIF segment(s)", replaced);
    }
    out.extend_from_slice(&jpeg[scan..]);
    Ok(out)
}

/// Reads the image dimensions and `UserComment` from the EXIF block of `jpeg`.
///
/// Returns `Ok(None)` when the stream is a JPEG without an EXIF block.
pub fn read_exif(jpeg: &[u8]) -> Result<Option<ExifTags>, TagError> {
    let (segments, _) = segments(jpeg)?;
    let segment = match segments.iter().find(|s| s.is_exif(jpeg)) {
        Some(segment) => segment,
        None => return Ok(None),
    };
    let tiff = Tiff::new(&segment.payload(jpeg)[EXIF_HEADER.len()..])?;

    let mut tags = ExifTags::default();
    let ifd0 = tiff.u32(4)?;
    let mut exif_ifd = None;
    for entry in tiff.entries(ifd0)? {
        match entry.tag {
            TAG_IMAGE_WIDTH => tags.width = Some(tiff.integer(&entry)?),
            TAG_IMAGE_LENGTH => tags.height = Some(tiff.integer(&entry)?),
            TAG_EXIF_IFD => exif_ifd = Some(tiff.integer(&entry)?),
            _ => {}
        }
    }
    if let Some(offset) = exif_ifd {
        if let Some(entry) = tiff
            .entries(offset)?
            .into_iter()
            .find(|e| e.tag == TAG_USER_COMMENT)
        {
            let data = tiff.data(&entry, 1)?;
            // The first eight bytes name the character set.
            let text = data.get(ASCII_CHARSET.len()..).unwrap_or_default();
            let text = String::from_utf8_lossy(text);
            tags.user_comment = Some(text.trim_end_matches('\0').to_owned());
        }
    }
    Ok(Some(tags))
}

/// Reads the `UserComment` written by [`embed_user_comment`].
pub fn read_user_comment(jpeg: &[u8]) -> Result<Option<String>, TagError> {
    Ok(read_exif(jpeg)?.and_then(|tags| tags.user_comment))
}

struct IfdEntry {
    tag: u16,
    kind: u16,
    count: u32,
    /// Offset of the 4-byte value field within the TIFF block.
    value_at: usize,
}

/// A TIFF block of either byte order.
struct Tiff<'a> {
    bytes: &'a [u8],
    little_endian: bool,
}

impl<'a> Tiff<'a> {
    fn new(bytes: &'a [u8]) -> Result<Self, TagError> {
        let little_endian = match bytes.get(..2) {
            Some(b"II") => true,
            Some(b"MM") => false,
            Some(_) => return Err(TagError::NotJpeg),
            None => return Err(TagError::Truncated),
        };
        Ok(Self {
            bytes,
            little_endian,
        })
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], TagError> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or(TagError::Truncated)
    }

    fn u16(&self, offset: usize) -> Result<u16, TagError> {
        let b = self.slice(offset, 2)?;
        Ok(if self.little_endian {
            u16::from_le_bytes([b[0], b[1]])
        } else {
            u16::from_be_bytes([b[0], b[1]])
        })
    }

    fn u32(&self, offset: usize) -> Result<u32, TagError> {
        let b = self.slice(offset, 4)?;
        let b = [b[0], b[1], b[2], b[3]];
        Ok(if self.little_endian {
            u32::from_le_bytes(b)
        } else {
            u32::from_be_bytes(b)
        })
    }

    fn entries(&self, offset: u32) -> Result<Vec<IfdEntry>, TagError> {
        let offset = offset as usize;
        let count = self.u16(offset)? as usize;
        (0..count)
            .map(|i| {
                let at = offset + 2 + 12 * i;
                Ok(IfdEntry {
                    tag: self.u16(at)?,
                    kind: self.u16(at + 2)?,
                    count: self.u32(at + 4)?,
                    value_at: at + 8,
                })
            })
            .collect()
    }

    /// Reads a single SHORT or LONG value.
    fn integer(&self, entry: &IfdEntry) -> Result<u32, TagError> {
        match entry.kind {
            TYPE_SHORT => self.u16(entry.value_at).map(u32::from),
            _ => self.u32(entry.value_at),
        }
    }

    /// The raw bytes of an entry whose items are `item_size` bytes wide.
    fn data(&self, entry: &IfdEntry, item_size: usize) -> Result<&'a [u8], TagError> {
        let len = entry.count as usize * item_size;
        if len <= 4 {
            self.slice(entry.value_at, len)
        } else {
            self.slice(self.u32(entry.value_at)? as usize, len)
        }
    }
}
