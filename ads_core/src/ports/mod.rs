pub mod device;
pub mod text;

pub use device::{ByteSpanReader, UploadBuffers, UploadSource};
pub use text::{SharedCodec, TextCodec};
