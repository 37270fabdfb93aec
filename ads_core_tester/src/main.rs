use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ads_core::adapters::ads::protocol::UploadInfo;
use ads_core::{AdsConfig, NodeId, SymbolBrowser, UploadBuffers, UploadSource};
use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

const DEFAULT_CASE_DIR: &str = "./upload";
const DEFAULT_DEPTH: usize = 3;
/// 每层最多打印的子节点数，避免大数组刷屏
const MAX_CHILDREN_SHOWN: usize = 16;

/// Upload buffers dumped to disk: `symbols.bin`, `datatypes.bin` and an
/// optional `uploadinfo.bin`.
struct FileUploadSource {
    dir: PathBuf,
}

impl UploadSource for FileUploadSource {
    fn fetch(&self) -> Result<UploadBuffers> {
        let symbols = read_file(&self.dir.join("symbols.bin"))?;
        let datatypes = read_file(&self.dir.join("datatypes.bin"))?;
        let info_path = self.dir.join("uploadinfo.bin");
        let info = if info_path.exists() {
            Some(UploadInfo::parse(&read_file(&info_path)?)?)
        } else {
            None
        };
        Ok(UploadBuffers {
            info,
            symbols,
            datatypes,
        })
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let case_dir = args.get(1).map(String::as_str).unwrap_or(DEFAULT_CASE_DIR);
    let case_dir = Path::new(case_dir);
    let depth = match args.get(2) {
        Some(arg) => arg
            .parse::<usize>()
            .with_context(|| format!("invalid depth: '{}'", arg))?,
        None => DEFAULT_DEPTH,
    };

    if !case_dir.exists() {
        anyhow::bail!("case dir not found: {}", case_dir.display());
    }

    let config = AdsConfig::load_from_file(&case_dir.join("ads_config.json"))?;
    info!("encoding={} maxAliasDepth={}", config.encoding, config.max_alias_depth);
    let source = FileUploadSource {
        dir: case_dir.to_path_buf(),
    };
    let browser = SymbolBrowser::load(&source, &config)?;

    let roots = browser.roots();
    let (symbol_errors, datatype_errors) = browser.with_tree(|tree| {
        (tree.symbols().errors().len(), tree.datatypes().errors().len())
    });
    println!(
        "symbols={} datatypes={} record_errors={}/{}",
        roots.len(),
        browser.export_datatypes().len(),
        symbol_errors,
        datatype_errors
    );

    for root in &roots {
        print_node(&browser, *root, 0, depth);
    }

    let diagnostics = browser.diagnostics();
    if !diagnostics.is_empty() {
        println!("diagnostics ({}):", diagnostics.len());
        for diag in &diagnostics {
            println!("  - {}", diag);
        }
    }

    let out_dir = case_dir.join("parsed_out");
    fs::create_dir_all(&out_dir)?;
    write_json(&out_dir.join("symbols.json"), &browser.export_symbols())?;
    write_json(&out_dir.join("datatypes.json"), &browser.export_datatypes())?;
    write_json(&out_dir.join("diagnostics.json"), &diagnostics)?;
    println!("[ok] -> {}", out_dir.display());

    Ok(())
}

fn print_node(browser: &SymbolBrowser, id: NodeId, level: usize, depth: usize) {
    let node = browser.describe(id);
    println!(
        "{}{} : {} @0x{:x}:0x{:x} size={} ({})",
        "  ".repeat(level),
        node.name,
        node.type_name,
        node.group,
        node.offset,
        node.size,
        node.data_type_name
    );
    if level + 1 >= depth || node.child_count == 0 {
        return;
    }
    let children = browser.children(id);
    for child in children.iter().take(MAX_CHILDREN_SHOWN) {
        print_node(browser, *child, level + 1, depth);
    }
    if children.len() > MAX_CHILDREN_SHOWN {
        println!(
            "{}... {} more",
            "  ".repeat(level + 1),
            children.len() - MAX_CHILDREN_SHOWN
        );
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
