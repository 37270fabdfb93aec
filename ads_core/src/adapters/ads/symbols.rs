use std::collections::HashMap;

use log::{debug, warn};

use super::record::{RawRecord, RecordCursor, RecordSpan, SymbolView};
use crate::error::RecordError;
use crate::ports::{SharedCodec, TextCodec};

#[derive(Debug, Clone)]
struct SymbolEntry {
    name: String,
    span: RecordSpan,
}

/// 符号目录：保留上传顺序（导出/枚举依赖该顺序），并按名称索引。
pub struct SymbolCatalog {
    upload: Vec<u8>,
    codec: SharedCodec,
    entries: Vec<SymbolEntry>,
    index: HashMap<String, usize>,
    errors: Vec<RecordError>,
}

impl std::fmt::Debug for SymbolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolCatalog")
            .field("upload_len", &self.upload.len())
            .field("entries", &self.entries.len())
            .field("errors", &self.errors)
            .finish()
    }
}

impl SymbolCatalog {
    pub fn build(upload: Vec<u8>, codec: SharedCodec) -> Self {
        let mut entries = Vec::new();
        let mut index = HashMap::new();
        let mut errors = Vec::new();

        for item in RecordCursor::new(&upload) {
            let raw = match item {
                Ok(raw) => raw,
                Err(err) => {
                    warn!("symbol upload truncated, remaining records skipped: {}", err);
                    errors.push(err);
                    break;
                }
            };
            let view = match SymbolView::parse(raw) {
                Ok(view) => view,
                Err(err) => {
                    warn!("malformed symbol record skipped: {}", err);
                    errors.push(err);
                    continue;
                }
            };
            let name = view.name(codec.as_ref());
            index.insert(name.clone(), entries.len());
            entries.push(SymbolEntry {
                name,
                span: view.span(),
            });
        }

        debug!(
            "symbol catalog: {} records, {} bytes, {} errors",
            entries.len(),
            upload.len(),
            errors.len()
        );
        Self {
            upload,
            codec,
            entries,
            index,
            errors,
        }
    }

    pub fn codec(&self) -> &dyn TextCodec {
        self.codec.as_ref()
    }

    pub fn upload(&self) -> &[u8] {
        &self.upload
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn errors(&self) -> &[RecordError] {
        &self.errors
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolView<'_>> {
        let idx = *self.index.get(name)?;
        self.get(idx)
    }

    /// Symbol at its upload position.
    pub fn get(&self, idx: usize) -> Option<SymbolView<'_>> {
        let entry = self.entries.get(idx)?;
        let bytes = self.upload.get(entry.span.start..entry.span.end())?;
        SymbolView::parse(RawRecord {
            offset: entry.span.start,
            bytes,
        })
        .ok()
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.entries.get(idx).map(|entry| entry.name.as_str())
    }

    /// Symbols in upload order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, SymbolView<'_>)> + '_ {
        (0..self.entries.len())
            .filter_map(move |idx| Some((self.entries[idx].name.as_str(), self.get(idx)?)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapters::ads::serializer::{encode_symbol_upload, SymbolRecordBuilder};
    use crate::adapters::text::EncodingCodec;

    #[test]
    fn keeps_upload_order_and_indexes_by_name() {
        let codec: SharedCodec = Arc::new(EncodingCodec::default());
        let upload = encode_symbol_upload(
            &[
                SymbolRecordBuilder::new("MAIN.z", "INT", 0x4020, 8, 2),
                SymbolRecordBuilder::new("MAIN.a", "BOOL", 0x4020, 0, 1).with_padding(5),
                SymbolRecordBuilder::new("GVL.m", "DINT", 0x4040, 4, 4),
            ],
            codec.as_ref(),
        )
        .unwrap();
        let catalog = SymbolCatalog::build(upload, codec);

        let names: Vec<_> = catalog.entries().map(|(name, _)| name.to_string()).collect();
        assert_eq!(names, vec!["MAIN.z", "MAIN.a", "GVL.m"]);
        let symbol = catalog.lookup("MAIN.a").unwrap();
        assert_eq!(symbol.offset(), 0);
        assert_eq!(symbol.size(), 1);
        assert!(catalog.lookup("main.a").is_none());
        assert_eq!(catalog.name(2), Some("GVL.m"));
        assert!(catalog.get(3).is_none());
    }

    #[test]
    fn truncated_upload_keeps_parsed_prefix() {
        let codec: SharedCodec = Arc::new(EncodingCodec::default());
        let mut upload = encode_symbol_upload(
            &[
                SymbolRecordBuilder::new("MAIN.a", "BOOL", 0x4020, 0, 1),
                SymbolRecordBuilder::new("MAIN.b", "BOOL", 0x4020, 1, 1),
            ],
            codec.as_ref(),
        )
        .unwrap();
        upload.pop();
        let catalog = SymbolCatalog::build(upload, codec);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.errors().len(), 1);
    }
}
