use std::collections::HashMap;

use log::{debug, warn};

use super::record::{DatatypeView, RawRecord, RecordCursor, RecordSpan};
use crate::error::RecordError;
use crate::ports::{SharedCodec, TextCodec};

#[derive(Debug, Clone)]
struct CatalogEntry {
    name: String,
    span: RecordSpan,
}

/// 数据类型目录：名称 -> 记录。拥有上传缓冲区，视图按需从中切出。
pub struct DatatypeCatalog {
    upload: Vec<u8>,
    codec: SharedCodec,
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
    errors: Vec<RecordError>,
}

impl std::fmt::Debug for DatatypeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatatypeCatalog")
            .field("upload_len", &self.upload.len())
            .field("entries", &self.entries.len())
            .field("errors", &self.errors)
            .finish()
    }
}

impl DatatypeCatalog {
    /// Walk the whole upload. Records read before a truncation are kept;
    /// a record whose own fields are malformed is skipped on its own.
    pub fn build(upload: Vec<u8>, codec: SharedCodec) -> Self {
        let mut entries = Vec::new();
        let mut index = HashMap::new();
        let mut errors = Vec::new();

        for item in RecordCursor::new(&upload) {
            let raw = match item {
                Ok(raw) => raw,
                Err(err) => {
                    warn!("datatype upload truncated, remaining records skipped: {}", err);
                    errors.push(err);
                    break;
                }
            };
            let view = match DatatypeView::parse(raw) {
                Ok(view) => view,
                Err(err) => {
                    warn!("malformed datatype record skipped: {}", err);
                    errors.push(err);
                    continue;
                }
            };
            let name = view.name(codec.as_ref());
            index.insert(name.clone(), entries.len());
            entries.push(CatalogEntry {
                name,
                span: view.span(),
            });
        }

        debug!(
            "datatype catalog: {} records, {} bytes, {} errors",
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

    pub fn shared_codec(&self) -> SharedCodec {
        self.codec.clone()
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

    /// Structural problems met while building (truncation, malformed records).
    pub fn errors(&self) -> &[RecordError] {
        &self.errors
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, name: &str) -> Option<DatatypeView<'_>> {
        let idx = *self.index.get(name)?;
        self.view(self.entries[idx].span)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Re-open a record (top-level or nested) by its span in this upload.
    pub fn view(&self, span: RecordSpan) -> Option<DatatypeView<'_>> {
        let bytes = self.upload.get(span.start..span.end())?;
        DatatypeView::parse(RawRecord {
            offset: span.start,
            bytes,
        })
        .ok()
    }

    /// Records in upload order, including ones whose name was later shadowed.
    pub fn entries(&self) -> impl Iterator<Item = (&str, DatatypeView<'_>)> + '_ {
        self.entries
            .iter()
            .filter_map(move |entry| Some((entry.name.as_str(), self.view(entry.span)?)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.name.as_str())
    }
}
