pub mod ads;
pub mod text;

pub use text::EncodingCodec;
