/*
标量值解码：按基础类型 id 解析小端字节
*/
use byteorder::{ByteOrder, LittleEndian};

use super::protocol::AdsDatatypeId;
use crate::domain::model::ScalarValue;
use crate::error::DecodeError;
use crate::ports::TextCodec;

/// Minimum span width for a base type id; `None` for variable-width types.
pub fn required_width(id: AdsDatatypeId) -> Option<usize> {
    match id {
        AdsDatatypeId::Bit | AdsDatatypeId::Int8 | AdsDatatypeId::UInt8 => Some(1),
        AdsDatatypeId::Int16 | AdsDatatypeId::UInt16 => Some(2),
        AdsDatatypeId::Int32 | AdsDatatypeId::UInt32 | AdsDatatypeId::Real32 => Some(4),
        AdsDatatypeId::Int64 | AdsDatatypeId::UInt64 | AdsDatatypeId::Real64 => Some(8),
        AdsDatatypeId::Real80 => Some(10),
        _ => None,
    }
}

/// Decode `bytes` as the base type `data_type`.
///
/// Aggregates and unknown ids come back as [`ScalarValue::Raw`]; only a span
/// narrower than a fixed-width type is an error.
pub fn decode_value(bytes: &[u8], data_type: u32, codec: &dyn TextCodec) -> Result<ScalarValue, DecodeError> {
    let id = AdsDatatypeId::from_raw(data_type);
    if let Some(width) = required_width(id) {
        if bytes.len() < width {
            return Err(DecodeError::SpanTooShort {
                type_name: id.label(),
                expected: width,
                got: bytes.len(),
            });
        }
    }

    let value = match id {
        AdsDatatypeId::Void => ScalarValue::Void,
        AdsDatatypeId::Bit => ScalarValue::Bool(bytes[0] != 0),
        AdsDatatypeId::Int8 => ScalarValue::Int8(bytes[0] as i8),
        AdsDatatypeId::UInt8 => ScalarValue::UInt8(bytes[0]),
        AdsDatatypeId::Int16 => ScalarValue::Int16(LittleEndian::read_i16(bytes)),
        AdsDatatypeId::UInt16 => ScalarValue::UInt16(LittleEndian::read_u16(bytes)),
        AdsDatatypeId::Int32 => ScalarValue::Int32(LittleEndian::read_i32(bytes)),
        AdsDatatypeId::UInt32 => ScalarValue::UInt32(LittleEndian::read_u32(bytes)),
        AdsDatatypeId::Int64 => ScalarValue::Int64(LittleEndian::read_i64(bytes)),
        AdsDatatypeId::UInt64 => ScalarValue::UInt64(LittleEndian::read_u64(bytes)),
        AdsDatatypeId::Real32 => ScalarValue::Real32(LittleEndian::read_f32(bytes)),
        AdsDatatypeId::Real64 => ScalarValue::Real64(LittleEndian::read_f64(bytes)),
        AdsDatatypeId::Real80 => ScalarValue::Real80(real80_to_f64(&bytes[..10])),
        // 整段解码，终止符及其后的字节原样保留
        AdsDatatypeId::String => ScalarValue::String(codec.decode_narrow(bytes)),
        AdsDatatypeId::WString => {
            let units: Vec<u16> = bytes.chunks_exact(2).map(LittleEndian::read_u16).collect();
            ScalarValue::WString(codec.decode_wide(&units))
        }
        AdsDatatypeId::BigType | AdsDatatypeId::Unknown(_) => ScalarValue::Raw {
            type_id: data_type,
            hex: hex_dump(bytes),
        },
    };
    Ok(value)
}

/// Lowercase hex without separators.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// x87 extended precision: 64-bit mantissa with explicit integer bit, then
/// sign and a 15-bit exponent biased by 16383.
fn real80_to_f64(bytes: &[u8]) -> f64 {
    let mantissa = LittleEndian::read_u64(&bytes[..8]);
    let sign_exp = LittleEndian::read_u16(&bytes[8..10]);
    let negative = sign_exp & 0x8000 != 0;
    let exponent = (sign_exp & 0x7fff) as i32;

    let magnitude = if exponent == 0x7fff {
        if mantissa << 1 == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else if exponent == 0 && mantissa == 0 {
        0.0
    } else {
        let fraction = mantissa as f64 / 2f64.powi(63);
        // 指数跨度超过 f64 时分两步缩放，避免中间结果溢出
        let scale = exponent - 16383;
        let half = scale / 2;
        fraction * 2f64.powi(half) * 2f64.powi(scale - half)
    };
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::text::EncodingCodec;

    fn decode(bytes: &[u8], id: u32) -> Result<ScalarValue, DecodeError> {
        decode_value(bytes, id, &EncodingCodec::default())
    }

    #[test]
    fn uint16_is_little_endian() {
        assert_eq!(decode(&[0x01, 0x00], 18).unwrap(), ScalarValue::UInt16(1));
        assert_eq!(decode(&[0x00, 0x01], 18).unwrap(), ScalarValue::UInt16(256));
    }

    #[test]
    fn bit_zero_is_false() {
        assert_eq!(decode(&[0x00], 33).unwrap(), ScalarValue::Bool(false));
        assert_eq!(decode(&[0x02], 33).unwrap(), ScalarValue::Bool(true));
    }

    #[test]
    fn real32_is_bit_exact() {
        let source = -1234.5678f32;
        match decode(&source.to_le_bytes(), 4).unwrap() {
            ScalarValue::Real32(v) => assert_eq!(v.to_bits(), source.to_bits()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn signed_and_wide_integers() {
        assert_eq!(decode(&[0xff], 16).unwrap(), ScalarValue::Int8(-1));
        assert_eq!(decode(&(-2i16).to_le_bytes(), 2).unwrap(), ScalarValue::Int16(-2));
        assert_eq!(decode(&(-70000i32).to_le_bytes(), 3).unwrap(), ScalarValue::Int32(-70000));
        assert_eq!(decode(&u64::MAX.to_le_bytes(), 21).unwrap(), ScalarValue::UInt64(u64::MAX));
        assert_eq!(decode(&2.5f64.to_le_bytes(), 5).unwrap(), ScalarValue::Real64(2.5));
    }

    #[test]
    fn longer_span_uses_leading_bytes() {
        assert_eq!(decode(&[0x2a, 0x00, 0xff, 0xff], 18).unwrap(), ScalarValue::UInt16(42));
    }

    #[test]
    fn short_span_is_an_error() {
        assert_eq!(
            decode(&[0x01], 19),
            Err(DecodeError::SpanTooShort {
                type_name: "UInt32",
                expected: 4,
                got: 1
            })
        );
        assert!(decode(&[], 33).is_err());
        assert!(decode(&[0; 8], 32).is_err());
    }

    #[test]
    fn real80_converts_to_f64() {
        let mut one = [0u8; 10];
        one[..8].copy_from_slice(&0x8000_0000_0000_0000u64.to_le_bytes());
        one[8..].copy_from_slice(&0x3fffu16.to_le_bytes());
        assert_eq!(decode(&one, 32).unwrap(), ScalarValue::Real80(1.0));

        let mut minus = [0u8; 10];
        minus[..8].copy_from_slice(&0xa000_0000_0000_0000u64.to_le_bytes());
        minus[8..].copy_from_slice(&0xc000u16.to_le_bytes());
        assert_eq!(decode(&minus, 32).unwrap(), ScalarValue::Real80(-2.5));

        assert_eq!(decode(&[0u8; 10], 32).unwrap(), ScalarValue::Real80(0.0));
    }

    #[test]
    fn strings_decode_the_whole_span() {
        assert_eq!(decode(b"M\xe4r", 30).unwrap(), ScalarValue::String("Mär".into()));
        assert_eq!(
            decode(b"ab\0c", 30).unwrap(),
            ScalarValue::String("ab\0c".into())
        );
        let wide: Vec<u8> = "Ω1"
            .encode_utf16()
            .chain([0u16, 0x41])
            .flat_map(|u| u.to_le_bytes())
            .collect();
        assert_eq!(decode(&wide, 31).unwrap(), ScalarValue::WString("Ω1\0A".into()));
    }

    #[test]
    fn aggregates_become_hex_dumps() {
        assert_eq!(
            decode(&[0xde, 0xad, 0x01], 65).unwrap(),
            ScalarValue::Raw {
                type_id: 65,
                hex: "dead01".into()
            }
        );
        assert_eq!(
            decode(&[0x0f], 99).unwrap(),
            ScalarValue::Raw {
                type_id: 99,
                hex: "0f".into()
            }
        );
        assert_eq!(decode(&[], 0).unwrap(), ScalarValue::Void);
    }
}
