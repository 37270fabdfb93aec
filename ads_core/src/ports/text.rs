use std::sync::Arc;

/// 控制器字符集的编解码端口。
/// Catalog build and value decode receive it explicitly; nothing reads a process-wide codec.
pub trait TextCodec: Send + Sync {
    /// Decode a narrow (byte-oriented) string as configured on the controller.
    fn decode_narrow(&self, bytes: &[u8]) -> String;

    /// Decode a sequence of 2-byte code units.
    fn decode_wide(&self, units: &[u16]) -> String {
        String::from_utf16_lossy(units)
    }

    /// Encode text back into the narrow representation (used by the record serializer).
    fn encode_narrow(&self, text: &str) -> Vec<u8>;
}

pub type SharedCodec = Arc<dyn TextCodec>;
