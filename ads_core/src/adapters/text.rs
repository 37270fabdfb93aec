use anyhow::{anyhow, Result};
use encoding_rs::{Encoding, WINDOWS_1252};

use crate::ports::TextCodec;

/// `encoding_rs` backed codec. Narrow strings go through the configured
/// encoding; wide strings are UTF-16LE code units.
#[derive(Debug, Clone, Copy)]
pub struct EncodingCodec {
    encoding: &'static Encoding,
}

impl EncodingCodec {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self { encoding }
    }

    /// Resolve a WHATWG label such as `windows-1252`, `gbk` or `utf-8`.
    pub fn for_label(label: &str) -> Result<Self> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| anyhow!("unknown text encoding label: {}", label))?;
        Ok(Self::new(encoding))
    }

    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }
}

impl Default for EncodingCodec {
    fn default() -> Self {
        Self::new(WINDOWS_1252)
    }
}

impl TextCodec for EncodingCodec {
    fn decode_narrow(&self, bytes: &[u8]) -> String {
        let (cow, _) = self.encoding.decode_without_bom_handling(bytes);
        cow.into_owned()
    }

    fn encode_narrow(&self, text: &str) -> Vec<u8> {
        let (cow, _, _) = self.encoding.encode(text);
        cow.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_1252_decodes_high_bytes() {
        let codec = EncodingCodec::default();
        assert_eq!(codec.decode_narrow(&[0x4D, 0xE4, 0x72]), "Mär");
        assert_eq!(codec.encode_narrow("Mär"), vec![0x4D, 0xE4, 0x72]);
    }

    #[test]
    fn gbk_label_resolves() {
        let codec = EncodingCodec::for_label("gbk").unwrap();
        let bytes = codec.encode_narrow("电机");
        assert_eq!(codec.decode_narrow(&bytes), "电机");
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert!(EncodingCodec::for_label("no-such-charset").is_err());
    }

    #[test]
    fn wide_units_decode_as_utf16() {
        let codec = EncodingCodec::default();
        let units: Vec<u16> = "Ωmega".encode_utf16().collect();
        assert_eq!(codec.decode_wide(&units), "Ωmega");
    }
}
