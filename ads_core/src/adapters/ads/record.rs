//! Record walking over upload buffers.
//!
//! Every record starts with a little-endian `u32` total length. The cursor
//! only trusts a record once `offset + length` is inside the buffer; views
//! then compute their trailing fields from the header's declared lengths:
//!
//! ```text
//! header | name \0 | type \0 | comment \0 | arrayInfo[arrayDim] | subItems[subItemCount]
//! ```
//!
//! Views additionally check that the computed field extents stay inside the
//! record, so a malformed record is rejected instead of read past its end.

use std::io::Cursor;

use binrw::{binread, BinRead};
use byteorder::{ByteOrder, LittleEndian};

use super::protocol::{
    ArrayInfo, ARRAY_INFO_LEN, DATATYPE_HEADER_LEN, ENTRY_LENGTH_LEN, SYMBOL_HEADER_LEN,
};
use crate::error::RecordError;
use crate::ports::TextCodec;

/// AdsDatatypeEntry 固定头
#[binread]
#[br(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DatatypeHeader {
    pub entry_length: u32,
    pub version: u32,
    pub hash_value: u32,
    pub type_hash_value: u32,
    pub size: u32,
    pub offs: u32,
    pub data_type: u32,
    pub flags: u32,
    pub name_length: u16,
    pub type_length: u16,
    pub comment_length: u16,
    pub array_dim: u16,
    pub sub_item_count: u16,
}

/// AdsSymbolEntry 固定头
#[binread]
#[br(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymbolHeader {
    pub entry_length: u32,
    pub group: u32,
    pub offset: u32,
    pub size: u32,
    pub data_type: u32,
    pub flags: u32,
    pub name_length: u16,
    pub type_length: u16,
    pub comment_length: u16,
}

/// Location of a record inside its upload buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordSpan {
    pub start: usize,
    pub len: usize,
}

impl RecordSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// One length-delimited record, borrowed from the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    /// Absolute offset of the record in the upload buffer.
    pub offset: usize,
    pub bytes: &'a [u8],
}

impl<'a> RawRecord<'a> {
    pub fn span(&self) -> RecordSpan {
        RecordSpan {
            start: self.offset,
            len: self.bytes.len(),
        }
    }
}

/// Lazily yields successive records. After the first error it yields nothing
/// more; restart by constructing a new cursor.
#[derive(Debug, Clone)]
pub struct RecordCursor<'a> {
    buf: &'a [u8],
    base: usize,
    pos: usize,
    stopped: bool,
}

impl<'a> RecordCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_base(buf, 0)
    }

    /// Cursor over a sub-slice whose first byte sits at `base` in the upload.
    pub(crate) fn with_base(buf: &'a [u8], base: usize) -> Self {
        Self {
            buf,
            base,
            pos: 0,
            stopped: false,
        }
    }

    /// Bytes consumed so far (relative to the cursor's own slice).
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.stopped || self.pos >= self.buf.len()
    }

    fn fail(&mut self, err: RecordError) -> Option<Result<RawRecord<'a>, RecordError>> {
        self.stopped = true;
        Some(Err(err))
    }
}

impl<'a> Iterator for RecordCursor<'a> {
    type Item = Result<RawRecord<'a>, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_exhausted() {
            return None;
        }
        let offset = self.base + self.pos;
        let available = self.buf.len() - self.pos;
        if available < ENTRY_LENGTH_LEN {
            return self.fail(RecordError::Truncated {
                offset,
                needed: ENTRY_LENGTH_LEN,
                available,
            });
        }
        let declared = LittleEndian::read_u32(&self.buf[self.pos..self.pos + ENTRY_LENGTH_LEN]) as usize;
        if declared == 0 {
            return self.fail(RecordError::EmptyRecord { offset });
        }
        if declared > available {
            return self.fail(RecordError::Truncated {
                offset,
                needed: declared,
                available,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + declared];
        self.pos += declared;
        Some(Ok(RawRecord { offset, bytes }))
    }
}

/// Start offsets of the three strings that follow a fixed header.
#[derive(Debug, Clone, Copy)]
struct StringLayout {
    name: usize,
    name_len: usize,
    type_name: usize,
    type_len: usize,
    comment: usize,
    comment_len: usize,
    /// First byte after the comment terminator.
    end: usize,
}

impl StringLayout {
    fn new(header_len: usize, name_len: u16, type_len: u16, comment_len: u16) -> Self {
        let name = header_len;
        let type_name = name + name_len as usize + 1;
        let comment = type_name + type_len as usize + 1;
        let end = comment + comment_len as usize + 1;
        Self {
            name,
            name_len: name_len as usize,
            type_name,
            type_len: type_len as usize,
            comment,
            comment_len: comment_len as usize,
            end,
        }
    }
}

fn check_extent(record: &RawRecord<'_>, needed: usize) -> Result<(), RecordError> {
    if needed > record.bytes.len() {
        return Err(RecordError::FieldOverrun {
            offset: record.offset,
            needed,
            record_len: record.bytes.len(),
        });
    }
    Ok(())
}

fn header_bytes<'a>(record: &RawRecord<'a>, header_len: usize) -> Result<&'a [u8], RecordError> {
    if record.bytes.len() < header_len {
        return Err(RecordError::HeaderTooShort {
            offset: record.offset,
            needed: header_len,
            available: record.bytes.len(),
        });
    }
    Ok(&record.bytes[..header_len])
}

impl DatatypeHeader {
    fn from_record(record: &RawRecord<'_>) -> Result<Self, RecordError> {
        let bytes = header_bytes(record, DATATYPE_HEADER_LEN)?;
        DatatypeHeader::read(&mut Cursor::new(bytes)).map_err(|_| RecordError::HeaderTooShort {
            offset: record.offset,
            needed: DATATYPE_HEADER_LEN,
            available: record.bytes.len(),
        })
    }
}

impl SymbolHeader {
    fn from_record(record: &RawRecord<'_>) -> Result<Self, RecordError> {
        let bytes = header_bytes(record, SYMBOL_HEADER_LEN)?;
        SymbolHeader::read(&mut Cursor::new(bytes)).map_err(|_| RecordError::HeaderTooShort {
            offset: record.offset,
            needed: SYMBOL_HEADER_LEN,
            available: record.bytes.len(),
        })
    }
}

/// Structural accessor over one datatype record (or sub-item).
#[derive(Debug, Clone, Copy)]
pub struct DatatypeView<'a> {
    record: RawRecord<'a>,
    header: DatatypeHeader,
    strings: StringLayout,
    array_start: usize,
    sub_items_start: usize,
}

impl<'a> DatatypeView<'a> {
    pub fn parse(record: RawRecord<'a>) -> Result<Self, RecordError> {
        let header = DatatypeHeader::from_record(&record)?;
        let strings = StringLayout::new(
            DATATYPE_HEADER_LEN,
            header.name_length,
            header.type_length,
            header.comment_length,
        );
        let array_start = strings.end;
        let sub_items_start = array_start + header.array_dim as usize * ARRAY_INFO_LEN;
        check_extent(&record, sub_items_start)?;
        Ok(Self {
            record,
            header,
            strings,
            array_start,
            sub_items_start,
        })
    }

    pub fn header(&self) -> &DatatypeHeader {
        &self.header
    }

    pub fn span(&self) -> RecordSpan {
        self.record.span()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.record.bytes
    }

    pub fn size(&self) -> u32 {
        self.header.size
    }

    pub fn offs(&self) -> u32 {
        self.header.offs
    }

    pub fn data_type(&self) -> u32 {
        self.header.data_type
    }

    pub fn flags(&self) -> u32 {
        self.header.flags
    }

    pub fn array_dim(&self) -> usize {
        self.header.array_dim as usize
    }

    pub fn sub_item_count(&self) -> usize {
        self.header.sub_item_count as usize
    }

    pub fn name_bytes(&self) -> &'a [u8] {
        let s = &self.strings;
        &self.record.bytes[s.name..s.name + s.name_len]
    }

    pub fn type_bytes(&self) -> &'a [u8] {
        let s = &self.strings;
        &self.record.bytes[s.type_name..s.type_name + s.type_len]
    }

    pub fn comment_bytes(&self) -> &'a [u8] {
        let s = &self.strings;
        &self.record.bytes[s.comment..s.comment + s.comment_len]
    }

    pub fn name(&self, codec: &dyn TextCodec) -> String {
        codec.decode_narrow(self.name_bytes())
    }

    pub fn type_name(&self, codec: &dyn TextCodec) -> String {
        codec.decode_narrow(self.type_bytes())
    }

    pub fn comment(&self, codec: &dyn TextCodec) -> String {
        codec.decode_narrow(self.comment_bytes())
    }

    pub fn array_info(&self) -> impl Iterator<Item = ArrayInfo> + 'a {
        self.record.bytes[self.array_start..self.sub_items_start]
            .chunks_exact(ARRAY_INFO_LEN)
            .map(|chunk| ArrayInfo {
                lower_bound: LittleEndian::read_i32(&chunk[0..4]),
                elements: LittleEndian::read_u32(&chunk[4..8]),
            })
    }

    /// Nested sub-item records in stored order. Yields at most
    /// `sub_item_count` items and stops at the first malformed one.
    pub fn sub_items(&self) -> SubItems<'a> {
        let area = &self.record.bytes[self.sub_items_start..];
        SubItems {
            cursor: RecordCursor::with_base(area, self.record.offset + self.sub_items_start),
            remaining: self.sub_item_count(),
        }
    }
}

pub struct SubItems<'a> {
    cursor: RecordCursor<'a>,
    remaining: usize,
}

impl<'a> Iterator for SubItems<'a> {
    type Item = Result<DatatypeView<'a>, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = match self.cursor.next() {
            Some(Ok(raw)) => DatatypeView::parse(raw),
            Some(Err(err)) => Err(err),
            None => Err(RecordError::Truncated {
                offset: self.cursor.base + self.cursor.pos,
                needed: ENTRY_LENGTH_LEN,
                available: 0,
            }),
        };
        self.remaining = if item.is_ok() { self.remaining - 1 } else { 0 };
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Structural accessor over one symbol record.
#[derive(Debug, Clone, Copy)]
pub struct SymbolView<'a> {
    record: RawRecord<'a>,
    header: SymbolHeader,
    strings: StringLayout,
}

impl<'a> SymbolView<'a> {
    pub fn parse(record: RawRecord<'a>) -> Result<Self, RecordError> {
        let header = SymbolHeader::from_record(&record)?;
        let strings = StringLayout::new(
            SYMBOL_HEADER_LEN,
            header.name_length,
            header.type_length,
            header.comment_length,
        );
        check_extent(&record, strings.end)?;
        Ok(Self {
            record,
            header,
            strings,
        })
    }

    pub fn header(&self) -> &SymbolHeader {
        &self.header
    }

    pub fn span(&self) -> RecordSpan {
        self.record.span()
    }

    pub fn group(&self) -> u32 {
        self.header.group
    }

    pub fn offset(&self) -> u32 {
        self.header.offset
    }

    pub fn size(&self) -> u32 {
        self.header.size
    }

    pub fn data_type(&self) -> u32 {
        self.header.data_type
    }

    pub fn flags(&self) -> u32 {
        self.header.flags
    }

    pub fn name_bytes(&self) -> &'a [u8] {
        let s = &self.strings;
        &self.record.bytes[s.name..s.name + s.name_len]
    }

    pub fn type_bytes(&self) -> &'a [u8] {
        let s = &self.strings;
        &self.record.bytes[s.type_name..s.type_name + s.type_len]
    }

    pub fn comment_bytes(&self) -> &'a [u8] {
        let s = &self.strings;
        &self.record.bytes[s.comment..s.comment + s.comment_len]
    }

    pub fn name(&self, codec: &dyn TextCodec) -> String {
        codec.decode_narrow(self.name_bytes())
    }

    pub fn type_name(&self, codec: &dyn TextCodec) -> String {
        codec.decode_narrow(self.type_bytes())
    }

    pub fn comment(&self, codec: &dyn TextCodec) -> String {
        codec.decode_narrow(self.comment_bytes())
    }
}
