use anyhow::Result;

use crate::adapters::ads::protocol::UploadInfo;

/// The two raw upload buffers as delivered by the transport, plus the
/// optional upload-info block that announced their sizes.
#[derive(Debug, Clone, Default)]
pub struct UploadBuffers {
    pub info: Option<UploadInfo>,
    pub symbols: Vec<u8>,
    pub datatypes: Vec<u8>,
}

/// 上传数据来源端口：由设备通讯或本地文件实现，core 不关心具体链路。
pub trait UploadSource {
    fn fetch(&self) -> Result<UploadBuffers>;
}

/// 变量读取端口：给定 (group, offset, size) 返回恰好 size 个字节，否则报错。
pub trait ByteSpanReader {
    fn read_span(&self, group: u32, offset: u32, size: u32) -> Result<Vec<u8>>;
}
