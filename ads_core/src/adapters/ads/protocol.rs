/*
ADS 符号/数据类型上传的二进制常量（小端，1 字节对齐）
*/
use std::io::Cursor;

use anyhow::{bail, Context, Result};
use binrw::{binread, BinRead};
use serde::Serialize;

/// 数据类型记录固定头长度：8 x u32 + 5 x u16
pub const DATATYPE_HEADER_LEN: usize = 42;
/// 符号记录固定头长度：6 x u32 + 3 x u16
pub const SYMBOL_HEADER_LEN: usize = 30;
/// 数组维度信息：lBound(u32) + elements(u32)
pub const ARRAY_INFO_LEN: usize = 8;
/// 上传信息块长度
pub const UPLOAD_INFO_LEN: usize = 24;
/// Every record starts with its total length.
pub const ENTRY_LENGTH_LEN: usize = 4;

pub const DATATYPE_VERSION_NEWEST: u32 = 1;

/// ADS base type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdsDatatypeId {
    Void,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Real32,
    Real64,
    BigType,
    String,
    WString,
    Real80,
    Bit,
    Unknown(u32),
}

impl AdsDatatypeId {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => AdsDatatypeId::Void,
            16 => AdsDatatypeId::Int8,
            17 => AdsDatatypeId::UInt8,
            2 => AdsDatatypeId::Int16,
            18 => AdsDatatypeId::UInt16,
            3 => AdsDatatypeId::Int32,
            19 => AdsDatatypeId::UInt32,
            20 => AdsDatatypeId::Int64,
            21 => AdsDatatypeId::UInt64,
            4 => AdsDatatypeId::Real32,
            5 => AdsDatatypeId::Real64,
            65 => AdsDatatypeId::BigType,
            30 => AdsDatatypeId::String,
            31 => AdsDatatypeId::WString,
            32 => AdsDatatypeId::Real80,
            33 => AdsDatatypeId::Bit,
            other => AdsDatatypeId::Unknown(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            AdsDatatypeId::Void => 0,
            AdsDatatypeId::Int8 => 16,
            AdsDatatypeId::UInt8 => 17,
            AdsDatatypeId::Int16 => 2,
            AdsDatatypeId::UInt16 => 18,
            AdsDatatypeId::Int32 => 3,
            AdsDatatypeId::UInt32 => 19,
            AdsDatatypeId::Int64 => 20,
            AdsDatatypeId::UInt64 => 21,
            AdsDatatypeId::Real32 => 4,
            AdsDatatypeId::Real64 => 5,
            AdsDatatypeId::BigType => 65,
            AdsDatatypeId::String => 30,
            AdsDatatypeId::WString => 31,
            AdsDatatypeId::Real80 => 32,
            AdsDatatypeId::Bit => 33,
            AdsDatatypeId::Unknown(other) => other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AdsDatatypeId::Void => "Void",
            AdsDatatypeId::Int8 => "Int8",
            AdsDatatypeId::UInt8 => "UInt8",
            AdsDatatypeId::Int16 => "Int16",
            AdsDatatypeId::UInt16 => "UInt16",
            AdsDatatypeId::Int32 => "Int32",
            AdsDatatypeId::UInt32 => "UInt32",
            AdsDatatypeId::Int64 => "Int64",
            AdsDatatypeId::UInt64 => "UInt64",
            AdsDatatypeId::Real32 => "Real32",
            AdsDatatypeId::Real64 => "Real64",
            AdsDatatypeId::BigType => "BigType",
            AdsDatatypeId::String => "String",
            AdsDatatypeId::WString => "WString",
            AdsDatatypeId::Real80 => "Real80",
            AdsDatatypeId::Bit => "Bit",
            AdsDatatypeId::Unknown(_) => "Unknown",
        }
    }
}

pub const DATATYPE_FLAGS: &[(u32, &str)] = &[
    (0x0000_0001, "DATATYPE"),
    (0x0000_0002, "DATAITEM"),
    (0x0000_0004, "REFERENCETO"),
    (0x0000_0008, "METHODDEREF"),
    (0x0000_0010, "OVERSAMPLE"),
    (0x0000_0020, "BITVALUES"),
    (0x0000_0040, "PROPITEM"),
    (0x0000_0080, "TYPEGUID"),
    (0x0000_0100, "PERSISTENT"),
    (0x0000_0200, "COPYMASK"),
    (0x0000_0400, "TCCOMIFACEPTR"),
    (0x0000_0800, "METHODINFOS"),
    (0x0000_1000, "ATTRIBUTES"),
    (0x0000_2000, "ENUMINFOS"),
    (0x0001_0000, "ALIGNED"),
    (0x0002_0000, "STATIC"),
    (0x0004_0000, "SPLEVELS"),
    (0x0008_0000, "IGNOREPERSIST"),
    (0x0010_0000, "ANYSIZEARRAY"),
    (0x0020_0000, "PERSIST_DT"),
    (0x0040_0000, "INITONRESET"),
];

pub const SYMBOL_FLAGS: &[(u32, &str)] = &[
    (0x0000_0001, "PERSISTENT"),
    (0x0000_0002, "BITVALUE"),
    (0x0000_0004, "REFERENCETO"),
    (0x0000_0008, "TYPEGUID"),
    (0x0000_0010, "TCCOMIFACEPTR"),
    (0x0000_0020, "READONLY"),
    (0x0000_0F00, "CONTEXTMASK"),
];

pub const DATATYPE_FLAG_DATATYPE: u32 = 0x0000_0001;
pub const DATATYPE_FLAG_DATAITEM: u32 = 0x0000_0002;
pub const DATATYPE_FLAG_REFERENCETO: u32 = 0x0000_0004;

/// Datatype flags as `"DATATYPE | ALIGNED"`; bits without a name are
/// appended as `UNKNOWN(0x..)`.
pub fn datatype_flags_label(flags: u32) -> String {
    let mut labels: Vec<String> = DATATYPE_FLAGS
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| (*name).to_string())
        .collect();
    let known = DATATYPE_FLAGS.iter().fold(0u32, |acc, (bit, _)| acc | bit);
    let unknown = flags & !known;
    if unknown != 0 {
        labels.push(format!("UNKNOWN(0x{:x})", unknown));
    }
    labels.join(" | ")
}

/// Symbol flags; CONTEXTMASK is a multi-bit field and matches on any of its bits.
pub fn symbol_flags_label(flags: u32) -> String {
    SYMBOL_FLAGS
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// One array dimension. The lower bound is stored as 4 raw bytes; IEC
/// arrays may start below zero so it is read as signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayInfo {
    #[serde(rename = "lBound")]
    pub lower_bound: i32,
    pub elements: u32,
}

/// 上传信息块（SYM_UPLOADINFO2）：宣告符号/类型数量与字节数。
#[binread]
#[br(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInfo {
    pub symbol_count: u32,
    pub symbol_size: u32,
    pub datatype_count: u32,
    pub datatype_size: u32,
    pub max_dyn_symbols: u32,
    pub used_dyn_symbols: u32,
}

impl UploadInfo {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < UPLOAD_INFO_LEN {
            bail!(
                "upload info needs {} bytes, got {}",
                UPLOAD_INFO_LEN,
                bytes.len()
            );
        }
        let mut cursor = Cursor::new(&bytes[..UPLOAD_INFO_LEN]);
        UploadInfo::read(&mut cursor).context("failed to read upload info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datatype_ids_round_trip_through_raw() {
        for raw in [0u32, 2, 3, 4, 5, 16, 17, 18, 19, 20, 21, 30, 31, 32, 33, 65] {
            let id = AdsDatatypeId::from_raw(raw);
            assert_ne!(id.label(), "Unknown", "raw {}", raw);
            assert_eq!(id.raw(), raw);
        }
        assert_eq!(AdsDatatypeId::from_raw(99), AdsDatatypeId::Unknown(99));
        assert_eq!(AdsDatatypeId::from_raw(99).label(), "Unknown");
    }

    #[test]
    fn datatype_flags_render_known_and_unknown_bits() {
        assert_eq!(datatype_flags_label(0), "");
        assert_eq!(datatype_flags_label(0x1 | 0x1_0000), "DATATYPE | ALIGNED");
        assert_eq!(
            datatype_flags_label(0x2 | 0x8000_0000),
            "DATAITEM | UNKNOWN(0x80000000)"
        );
    }

    #[test]
    fn symbol_flags_render_context_mask() {
        assert_eq!(symbol_flags_label(0x21), "PERSISTENT | READONLY");
        assert_eq!(symbol_flags_label(0x100), "CONTEXTMASK");
    }

    #[test]
    fn upload_info_parses_little_endian_block() {
        let mut bytes = Vec::new();
        for value in [3u32, 300, 5, 900, 0, 0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let info = UploadInfo::parse(&bytes).unwrap();
        assert_eq!(info.symbol_count, 3);
        assert_eq!(info.symbol_size, 300);
        assert_eq!(info.datatype_count, 5);
        assert_eq!(info.datatype_size, 900);
        assert!(UploadInfo::parse(&bytes[..10]).is_err());
    }
}
