use std::sync::Arc;
use std::thread;

use ads_core::adapters::ads::serializer::{
    encode_datatype_upload, encode_symbol_upload, DatatypeRecordBuilder, SymbolRecordBuilder,
};
use ads_core::model::ScalarValue;
use ads_core::{
    ByteSpanReader, DatatypeCatalog, Diagnostic, EncodingCodec, RecordError, SymbolBrowser,
    SymbolCatalog, SymbolTree, TextCodec, UploadBuffers,
};

fn codec() -> Arc<EncodingCodec> {
    Arc::new(EncodingCodec::default())
}

fn machine_datatypes() -> Vec<DatatypeRecordBuilder> {
    vec![
        DatatypeRecordBuilder::new("DINT", "", 4).with_data_type(3),
        DatatypeRecordBuilder::new("ARRAY [0..7] OF DINT", "DINT", 32)
            .with_data_type(3)
            .with_array(0, 8),
        DatatypeRecordBuilder::new("ST_Machine", "", 40)
            .with_data_type(65)
            .with_sub_item(DatatypeRecordBuilder::item("nMode", "DINT", 4, 0).with_data_type(3))
            .with_sub_item(DatatypeRecordBuilder::item("aCounts", "ARRAY [0..7] OF DINT", 32, 8).with_data_type(3)),
    ]
}

fn machine_symbols() -> Vec<SymbolRecordBuilder> {
    vec![
        SymbolRecordBuilder::new("MAIN.stMachine", "ST_Machine", 0x4020, 100, 40).with_data_type(65),
        SymbolRecordBuilder::new("MAIN.stGhost", "ST_Ghost", 0x4020, 200, 12),
        SymbolRecordBuilder::new("MAIN.nLast", "DINT", 0x4020, 300, 4).with_data_type(3),
    ]
}

fn machine_tree() -> SymbolTree {
    let codec = codec();
    let datatypes = encode_datatype_upload(&machine_datatypes(), codec.as_ref()).unwrap();
    let symbols = encode_symbol_upload(&machine_symbols(), codec.as_ref()).unwrap();
    SymbolTree::new(
        DatatypeCatalog::build(datatypes, codec.clone()),
        SymbolCatalog::build(symbols, codec),
    )
}

#[test]
fn offset_accumulates_symbol_field_and_element() {
    let mut tree = machine_tree();
    let machine = tree.roots()[0];
    let counts = tree.children(machine)[1];
    let fifth = tree.children(counts)[4];

    assert_eq!(tree.node(counts).local_offset(), 8);
    assert_eq!(tree.node(fifth).local_offset(), 16);
    assert_eq!(tree.absolute_offset(fifth), 124);
    assert_eq!(tree.qualified_name(fifth), "MAIN.stMachine.aCounts[4]");
}

#[test]
fn repeated_expansion_is_identical() {
    let mut tree = machine_tree();
    let machine = tree.roots()[0];
    let counts = tree.children(machine)[1];

    let snapshot = |tree: &SymbolTree, ids: &[ads_core::NodeId]| -> Vec<(String, u32)> {
        ids.iter()
            .map(|id| (tree.node(*id).name().to_string(), tree.node(*id).local_offset()))
            .collect()
    };
    let first = tree.children(counts);
    let first = snapshot(&tree, &first);
    let second = tree.children(counts);
    let second = snapshot(&tree, &second);
    assert_eq!(first, second);
    assert_eq!(first.len(), 8);
    assert_eq!(first[7], ("[7]".to_string(), 28));
}

#[test]
fn unresolved_symbol_does_not_stop_enumeration() {
    let mut tree = machine_tree();
    let roots = tree.roots().to_vec();
    assert_eq!(roots.len(), 3);

    assert!(tree.children(roots[1]).is_empty());
    assert_eq!(tree.children(roots[0]).len(), 2);
    assert_eq!(tree.describe(roots[2]).offset, 300);
    assert!(tree.diagnostics().iter().any(|d| matches!(
        d,
        Diagnostic::UnresolvedType { type_name, context }
            if type_name == "ST_Ghost" && context == "MAIN.stGhost"
    )));
}

#[test]
fn truncated_upload_keeps_records_before_the_cut() {
    let codec = codec();
    let mut datatypes = encode_datatype_upload(&machine_datatypes(), codec.as_ref()).unwrap();
    datatypes.truncate(datatypes.len() - 5);
    let catalog = DatatypeCatalog::build(datatypes, codec);

    assert_eq!(catalog.len(), 2);
    assert!(catalog.contains("DINT"));
    assert!(catalog.contains("ARRAY [0..7] OF DINT"));
    assert!(!catalog.contains("ST_Machine"));
    assert!(matches!(catalog.errors(), [RecordError::Truncated { .. }]));
}

#[test]
fn corrupt_record_is_isolated_from_its_neighbours() {
    let codec = codec();
    let mut upload = Vec::new();
    for (idx, record) in machine_datatypes().iter().enumerate() {
        let mut bytes = record.encode(codec.as_ref()).unwrap();
        if idx == 1 {
            // name length pointing past the record end
            bytes[32] = 0xff;
        }
        upload.extend_from_slice(&bytes);
    }
    let catalog = DatatypeCatalog::build(upload, codec);
    assert_eq!(catalog.len(), 2);
    assert!(catalog.contains("ST_Machine"));
    assert!(matches!(catalog.errors(), [RecordError::FieldOverrun { .. }]));
}

#[test]
fn narrow_strings_use_the_configured_encoding() {
    let gbk: Arc<dyn TextCodec> = Arc::new(EncodingCodec::for_label("gbk").unwrap());
    let symbols = encode_symbol_upload(
        &[SymbolRecordBuilder::new("MAIN.nSpeed", "INT", 0x4020, 0, 2).with_comment("电机转速")],
        gbk.as_ref(),
    )
    .unwrap();
    let catalog = SymbolCatalog::build(symbols, gbk.clone());
    let view = catalog.lookup("MAIN.nSpeed").unwrap();
    assert_eq!(view.comment(gbk.as_ref()), "电机转速");
}

struct ProcessImage(Vec<u8>);

impl ByteSpanReader for ProcessImage {
    fn read_span(&self, _group: u32, offset: u32, size: u32) -> anyhow::Result<Vec<u8>> {
        let start = offset as usize;
        let end = start + size as usize;
        match self.0.get(start..end) {
            Some(bytes) => Ok(bytes.to_vec()),
            None => anyhow::bail!("read past process image: {}..{}", start, end),
        }
    }
}

#[test]
fn shared_browser_reads_values_from_several_threads() {
    let codec = codec();
    let buffers = UploadBuffers {
        info: None,
        symbols: encode_symbol_upload(&machine_symbols(), codec.as_ref()).unwrap(),
        datatypes: encode_datatype_upload(&machine_datatypes(), codec.as_ref()).unwrap(),
    };
    let browser = Arc::new(SymbolBrowser::from_buffers(buffers, codec, 8));

    let mut image = vec![0u8; 400];
    for i in 0..8i32 {
        let at = 108 + i as usize * 4;
        image[at..at + 4].copy_from_slice(&(i * 10).to_le_bytes());
    }
    let image = Arc::new(ProcessImage(image));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let browser = Arc::clone(&browser);
            let image = Arc::clone(&image);
            thread::spawn(move || {
                let id = browser
                    .find(&format!("MAIN.stMachine.aCounts[{}]", i * 2))
                    .unwrap();
                browser.read_value(id, image.as_ref()).unwrap()
            })
        })
        .collect();

    let values: Vec<ScalarValue> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        values,
        vec![
            ScalarValue::Int32(0),
            ScalarValue::Int32(20),
            ScalarValue::Int32(40),
            ScalarValue::Int32(60)
        ]
    );
}
