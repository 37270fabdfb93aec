use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use parking_lot::Mutex;

use crate::adapters::ads::datatypes::DatatypeCatalog;
use crate::adapters::ads::export::{export_datatypes, export_symbols};
use crate::adapters::ads::protocol::{AdsDatatypeId, UploadInfo};
use crate::adapters::ads::resolver::NodeId;
use crate::adapters::ads::symbols::SymbolCatalog;
use crate::adapters::ads::tree::SymbolTree;
use crate::adapters::ads::value::decode_value;
use crate::config::AdsConfig;
use crate::domain::model::{DatatypeDocument, NodeInfo, ScalarValue, SymbolDocument};
use crate::error::{DecodeError, Diagnostic};
use crate::ports::{ByteSpanReader, SharedCodec, UploadBuffers, UploadSource};

/// Application layer facade over a decoded upload.
/// The tree sits behind one lock so a shared browser can be navigated from
/// several threads; each call is one acquire/release.
#[derive(Debug)]
pub struct SymbolBrowser {
    tree: Mutex<SymbolTree>,
}

impl SymbolBrowser {
    /// Fetch both uploads from `source` and build the catalogs.
    pub fn load<S: UploadSource>(source: &S, config: &AdsConfig) -> Result<Self> {
        let buffers = source.fetch().context("failed to fetch symbol upload")?;
        let codec: SharedCodec = Arc::new(config.text_codec()?);
        Ok(Self::from_buffers(buffers, codec, config.max_alias_depth))
    }

    pub fn from_buffers(buffers: UploadBuffers, codec: SharedCodec, max_alias_depth: usize) -> Self {
        let UploadBuffers {
            info,
            symbols,
            datatypes,
        } = buffers;
        let symbol_bytes = symbols.len();
        let datatype_bytes = datatypes.len();

        let datatypes = DatatypeCatalog::build(datatypes, codec.clone());
        let symbols = SymbolCatalog::build(symbols, codec);
        if let Some(info) = info {
            check_upload_info(&info, symbol_bytes, symbols.len(), datatype_bytes, datatypes.len());
        }
        info!(
            "loaded {} symbols and {} datatypes",
            symbols.len(),
            datatypes.len()
        );

        Self {
            tree: Mutex::new(SymbolTree::with_alias_depth(datatypes, symbols, max_alias_depth)),
        }
    }

    /// Run `f` with the tree locked.
    pub fn with_tree<T>(&self, f: impl FnOnce(&mut SymbolTree) -> T) -> T {
        let mut tree = self.tree.lock();
        f(&mut tree)
    }

    pub fn roots(&self) -> Vec<NodeId> {
        self.tree.lock().roots().to_vec()
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree.lock().children(id)
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.tree.lock().child_count(id)
    }

    pub fn describe(&self, id: NodeId) -> NodeInfo {
        self.tree.lock().describe(id)
    }

    pub fn find(&self, qualified: &str) -> Option<NodeId> {
        self.tree.lock().find(qualified)
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.tree.lock().diagnostics().to_vec()
    }

    /// Read the node's bytes through `reader` and decode them by its type id.
    pub fn read_value<R: ByteSpanReader>(&self, id: NodeId, reader: &R) -> Result<ScalarValue> {
        let (group, offset, size, data_type, name, codec) = {
            let tree = self.tree.lock();
            let node = tree.node(id);
            (
                tree.group(id),
                tree.absolute_offset(id),
                node.size(),
                node.data_type(),
                tree.qualified_name(id),
                tree.datatypes().shared_codec(),
            )
        };
        let bytes = reader
            .read_span(group, offset, size)
            .with_context(|| format!("failed to read {} at 0x{:x}:0x{:x}", name, group, offset))?;
        if bytes.len() < size as usize {
            return Err(DecodeError::SpanTooShort {
                type_name: AdsDatatypeId::from_raw(data_type).label(),
                expected: size as usize,
                got: bytes.len(),
            })
            .with_context(|| format!("short reply for {}", name));
        }
        let value = decode_value(&bytes[..size as usize], data_type, codec.as_ref())
            .with_context(|| format!("failed to decode {}", name))?;
        Ok(value)
    }

    pub fn export_symbols(&self) -> Vec<SymbolDocument> {
        export_symbols(self.tree.lock().symbols())
    }

    pub fn export_datatypes(&self) -> Vec<DatatypeDocument> {
        export_datatypes(self.tree.lock().datatypes())
    }
}

fn check_upload_info(
    info: &UploadInfo,
    symbol_bytes: usize,
    symbol_count: usize,
    datatype_bytes: usize,
    datatype_count: usize,
) {
    if info.symbol_size as usize != symbol_bytes {
        warn!(
            "symbol upload is {} bytes, upload info announced {}",
            symbol_bytes, info.symbol_size
        );
    }
    if info.symbol_count as usize != symbol_count {
        warn!(
            "decoded {} symbols, upload info announced {}",
            symbol_count, info.symbol_count
        );
    }
    if info.datatype_size as usize != datatype_bytes {
        warn!(
            "datatype upload is {} bytes, upload info announced {}",
            datatype_bytes, info.datatype_size
        );
    }
    if info.datatype_count as usize != datatype_count {
        warn!(
            "decoded {} datatypes, upload info announced {}",
            datatype_count, info.datatype_count
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::bail;

    use super::*;
    use crate::adapters::ads::serializer::{
        encode_datatype_upload, encode_symbol_upload, DatatypeRecordBuilder, SymbolRecordBuilder,
    };
    use crate::adapters::text::EncodingCodec;

    struct MemorySource(UploadBuffers);

    impl UploadSource for MemorySource {
        fn fetch(&self) -> Result<UploadBuffers> {
            Ok(self.0.clone())
        }
    }

    /// Process image keyed by (group, offset).
    struct MemoryReader(HashMap<(u32, u32), Vec<u8>>);

    impl ByteSpanReader for MemoryReader {
        fn read_span(&self, group: u32, offset: u32, _size: u32) -> Result<Vec<u8>> {
            match self.0.get(&(group, offset)) {
                Some(bytes) => Ok(bytes.clone()),
                None => bail!("no data at {}:{}", group, offset),
            }
        }
    }

    fn browser() -> SymbolBrowser {
        let codec = EncodingCodec::default();
        let datatypes = encode_datatype_upload(
            &[
                DatatypeRecordBuilder::new("UINT", "", 2).with_data_type(18),
                DatatypeRecordBuilder::new("ST_Io", "", 4)
                    .with_sub_item(DatatypeRecordBuilder::item("nIn", "UINT", 2, 0).with_data_type(18))
                    .with_sub_item(DatatypeRecordBuilder::item("nOut", "UINT", 2, 2).with_data_type(18)),
            ],
            &codec,
        )
        .unwrap();
        let symbols = encode_symbol_upload(
            &[SymbolRecordBuilder::new("GVL.stIo", "ST_Io", 0x4020, 64, 4)],
            &codec,
        )
        .unwrap();
        let source = MemorySource(UploadBuffers {
            info: Some(UploadInfo {
                symbol_count: 1,
                symbol_size: symbols.len() as u32,
                datatype_count: 2,
                datatype_size: datatypes.len() as u32,
                ..UploadInfo::default()
            }),
            symbols,
            datatypes,
        });
        SymbolBrowser::load(&source, &AdsConfig::default()).unwrap()
    }

    #[test]
    fn read_value_uses_group_and_absolute_offset() {
        let browser = browser();
        let n_out = browser.find("GVL.stIo.nOut").unwrap();
        let reader = MemoryReader(HashMap::from([((0x4020, 66), vec![0x34, 0x12])]));
        assert_eq!(
            browser.read_value(n_out, &reader).unwrap(),
            ScalarValue::UInt16(0x1234)
        );
    }

    #[test]
    fn short_reply_is_rejected() {
        let browser = browser();
        let n_in = browser.find("GVL.stIo.nIn").unwrap();
        let reader = MemoryReader(HashMap::from([((0x4020, 64), vec![0x01])]));
        let err = browser.read_value(n_in, &reader).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DecodeError>(),
            Some(&DecodeError::SpanTooShort {
                type_name: "UInt16",
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn reader_failure_propagates() {
        let browser = browser();
        let root = browser.roots()[0];
        let reader = MemoryReader(HashMap::new());
        assert!(browser.read_value(root, &reader).is_err());
    }

    #[test]
    fn exports_and_navigation_share_the_tree() {
        let browser = browser();
        let root = browser.roots()[0];
        assert_eq!(browser.child_count(root), 2);
        assert_eq!(browser.children(root).len(), 2);
        assert_eq!(browser.describe(root).qualified_name, "GVL.stIo");
        assert_eq!(browser.export_symbols()[0].name, "GVL.stIo");
        assert_eq!(browser.export_datatypes().len(), 2);
        assert!(browser.diagnostics().is_empty());
        let total = browser.with_tree(|tree| tree.symbols().len() + tree.datatypes().len());
        assert_eq!(total, 3);
    }

    #[test]
    fn unknown_encoding_fails_load() {
        let source = MemorySource(UploadBuffers::default());
        let config = AdsConfig {
            encoding: "klingon".into(),
            ..AdsConfig::default()
        };
        assert!(SymbolBrowser::load(&source, &config).is_err());
    }
}
