/*
记录序列化：按上传格式生成数据类型/符号记录（测试与工具用）
*/
use std::io::Write;

use anyhow::{bail, Result};
use byteorder::{LittleEndian, WriteBytesExt};

use super::protocol::{
    ArrayInfo, ARRAY_INFO_LEN, DATATYPE_FLAG_DATAITEM, DATATYPE_FLAG_DATATYPE, DATATYPE_HEADER_LEN,
    DATATYPE_VERSION_NEWEST, SYMBOL_HEADER_LEN,
};
use crate::ports::TextCodec;

/// 辅助类：小端写入并记录已写字节数
struct RecordWriter<W: Write> {
    inner: W,
    offset: usize,
}

impl<W: Write> RecordWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, offset: 0 }
    }

    fn into_inner(self) -> W {
        self.inner
    }

    fn write_u16(&mut self, v: u16) -> Result<()> {
        self.inner.write_u16::<LittleEndian>(v)?;
        self.offset += 2;
        Ok(())
    }

    fn write_u32(&mut self, v: u32) -> Result<()> {
        self.inner.write_u32::<LittleEndian>(v)?;
        self.offset += 4;
        Ok(())
    }

    fn write_i32(&mut self, v: i32) -> Result<()> {
        self.inner.write_i32::<LittleEndian>(v)?;
        self.offset += 4;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.offset += bytes.len();
        Ok(())
    }

    /// String body followed by its single terminator byte.
    fn write_cstr(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_bytes(bytes)?;
        self.write_bytes(&[0])
    }
}

fn string_len(field: &str, bytes: &[u8]) -> Result<u16> {
    if bytes.len() > u16::MAX as usize {
        bail!("{} too long: {} bytes", field, bytes.len());
    }
    Ok(bytes.len() as u16)
}

fn entry_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| anyhow::anyhow!("record too long: {} bytes", len))
}

/// Builder for one datatype record, including its nested sub-items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatatypeRecordBuilder {
    pub name: String,
    pub type_name: String,
    pub comment: String,
    pub version: u32,
    pub hash_value: u32,
    pub type_hash_value: u32,
    pub size: u32,
    pub offs: u32,
    pub data_type: u32,
    pub flags: u32,
    pub array_info: Vec<ArrayInfo>,
    pub sub_items: Vec<DatatypeRecordBuilder>,
    /// Extra zero bytes inside the declared length (uploads are often aligned).
    pub padding: usize,
}

impl DatatypeRecordBuilder {
    /// Top-level datatype definition.
    pub fn new(name: &str, type_name: &str, size: u32) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            comment: String::new(),
            version: DATATYPE_VERSION_NEWEST,
            hash_value: 0,
            type_hash_value: 0,
            size,
            offs: 0,
            data_type: 0,
            flags: DATATYPE_FLAG_DATATYPE,
            array_info: Vec::new(),
            sub_items: Vec::new(),
            padding: 0,
        }
    }

    /// Struct member at `offs` inside its parent.
    pub fn item(name: &str, type_name: &str, size: u32, offs: u32) -> Self {
        let mut item = Self::new(name, type_name, size);
        item.offs = offs;
        item.flags = DATATYPE_FLAG_DATAITEM;
        item
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    pub fn with_offs(mut self, offs: u32) -> Self {
        self.offs = offs;
        self
    }

    pub fn with_data_type(mut self, data_type: u32) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_hashes(mut self, hash_value: u32, type_hash_value: u32) -> Self {
        self.hash_value = hash_value;
        self.type_hash_value = type_hash_value;
        self
    }

    pub fn with_array(mut self, lower_bound: i32, elements: u32) -> Self {
        self.array_info.push(ArrayInfo {
            lower_bound,
            elements,
        });
        self
    }

    pub fn with_sub_item(mut self, item: DatatypeRecordBuilder) -> Self {
        self.sub_items.push(item);
        self
    }

    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn encode(&self, codec: &dyn TextCodec) -> Result<Vec<u8>> {
        let name = codec.encode_narrow(&self.name);
        let type_name = codec.encode_narrow(&self.type_name);
        let comment = codec.encode_narrow(&self.comment);
        if self.array_info.len() > u16::MAX as usize {
            bail!("too many array dimensions: {}", self.array_info.len());
        }
        if self.sub_items.len() > u16::MAX as usize {
            bail!("too many sub items: {}", self.sub_items.len());
        }
        let mut sub_items = Vec::new();
        for item in &self.sub_items {
            sub_items.extend(item.encode(codec)?);
        }

        let total = DATATYPE_HEADER_LEN
            + name.len()
            + type_name.len()
            + comment.len()
            + 3
            + self.array_info.len() * ARRAY_INFO_LEN
            + sub_items.len()
            + self.padding;

        let mut writer = RecordWriter::new(Vec::with_capacity(total));
        writer.write_u32(entry_len(total)?)?;
        writer.write_u32(self.version)?;
        writer.write_u32(self.hash_value)?;
        writer.write_u32(self.type_hash_value)?;
        writer.write_u32(self.size)?;
        writer.write_u32(self.offs)?;
        writer.write_u32(self.data_type)?;
        writer.write_u32(self.flags)?;
        writer.write_u16(string_len("name", &name)?)?;
        writer.write_u16(string_len("type", &type_name)?)?;
        writer.write_u16(string_len("comment", &comment)?)?;
        writer.write_u16(self.array_info.len() as u16)?;
        writer.write_u16(self.sub_items.len() as u16)?;
        writer.write_cstr(&name)?;
        writer.write_cstr(&type_name)?;
        writer.write_cstr(&comment)?;
        for info in &self.array_info {
            writer.write_i32(info.lower_bound)?;
            writer.write_u32(info.elements)?;
        }
        writer.write_bytes(&sub_items)?;
        writer.write_bytes(&vec![0u8; self.padding])?;
        debug_assert_eq!(writer.offset, total);
        Ok(writer.into_inner())
    }
}

/// Builder for one symbol record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecordBuilder {
    pub name: String,
    pub type_name: String,
    pub comment: String,
    pub group: u32,
    pub offset: u32,
    pub size: u32,
    pub data_type: u32,
    pub flags: u32,
    pub padding: usize,
}

impl SymbolRecordBuilder {
    pub fn new(name: &str, type_name: &str, group: u32, offset: u32, size: u32) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            comment: String::new(),
            group,
            offset,
            size,
            data_type: 0,
            flags: 0,
            padding: 0,
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    pub fn with_data_type(mut self, data_type: u32) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn encode(&self, codec: &dyn TextCodec) -> Result<Vec<u8>> {
        let name = codec.encode_narrow(&self.name);
        let type_name = codec.encode_narrow(&self.type_name);
        let comment = codec.encode_narrow(&self.comment);
        let total =
            SYMBOL_HEADER_LEN + name.len() + type_name.len() + comment.len() + 3 + self.padding;

        let mut writer = RecordWriter::new(Vec::with_capacity(total));
        writer.write_u32(entry_len(total)?)?;
        writer.write_u32(self.group)?;
        writer.write_u32(self.offset)?;
        writer.write_u32(self.size)?;
        writer.write_u32(self.data_type)?;
        writer.write_u32(self.flags)?;
        writer.write_u16(string_len("name", &name)?)?;
        writer.write_u16(string_len("type", &type_name)?)?;
        writer.write_u16(string_len("comment", &comment)?)?;
        writer.write_cstr(&name)?;
        writer.write_cstr(&type_name)?;
        writer.write_cstr(&comment)?;
        writer.write_bytes(&vec![0u8; self.padding])?;
        Ok(writer.into_inner())
    }
}

/// Concatenate datatype records into one upload buffer.
pub fn encode_datatype_upload(records: &[DatatypeRecordBuilder], codec: &dyn TextCodec) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for record in records {
        out.extend(record.encode(codec)?);
    }
    Ok(out)
}

/// Concatenate symbol records into one upload buffer.
pub fn encode_symbol_upload(records: &[SymbolRecordBuilder], codec: &dyn TextCodec) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for record in records {
        out.extend(record.encode(codec)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ads::record::{DatatypeView, RecordCursor};
    use crate::adapters::text::EncodingCodec;

    #[test]
    fn encoded_record_parses_back_to_every_field() {
        let codec = EncodingCodec::default();
        let builder = DatatypeRecordBuilder::new("ST_Drive", "", 24)
            .with_comment("Antrieb")
            .with_hashes(7, 9)
            .with_flags(0x1_0001)
            .with_sub_item(DatatypeRecordBuilder::item("nState", "UINT", 2, 0).with_data_type(18))
            .with_sub_item(
                DatatypeRecordBuilder::item("aTorque", "ARRAY [0..4] OF REAL", 20, 4)
                    .with_data_type(4)
                    .with_array(0, 5),
            )
            .with_padding(2);
        let bytes = builder.encode(&codec).unwrap();

        let view = DatatypeView::parse(RecordCursor::new(&bytes).next().unwrap().unwrap()).unwrap();
        let header = view.header();
        assert_eq!(header.entry_length as usize, bytes.len());
        assert_eq!(header.version, DATATYPE_VERSION_NEWEST);
        assert_eq!(header.hash_value, 7);
        assert_eq!(header.type_hash_value, 9);
        assert_eq!(header.size, 24);
        assert_eq!(header.offs, 0);
        assert_eq!(header.flags, 0x1_0001);
        assert_eq!(view.name(&codec), "ST_Drive");
        assert_eq!(view.type_name(&codec), "");
        assert_eq!(view.comment(&codec), "Antrieb");
        assert_eq!(view.array_info().count(), 0);

        let items: Vec<_> = view.sub_items().map(|item| item.unwrap()).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name(&codec), "nState");
        assert_eq!(items[0].data_type(), 18);
        assert_eq!(items[1].name(&codec), "aTorque");
        assert_eq!(items[1].offs(), 4);
        assert_eq!(items[1].size(), 20);
        assert_eq!(items[1].flags(), DATATYPE_FLAG_DATAITEM);
        assert_eq!(
            items[1].array_info().collect::<Vec<_>>(),
            vec![ArrayInfo { lower_bound: 0, elements: 5 }]
        );
    }

    #[test]
    fn oversized_string_is_rejected() {
        let codec = EncodingCodec::default();
        let long = "x".repeat(u16::MAX as usize + 1);
        assert!(DatatypeRecordBuilder::new(&long, "", 0).encode(&codec).is_err());
    }
}
