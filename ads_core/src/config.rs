use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::ads::resolver::DEFAULT_MAX_ALIAS_DEPTH;
use crate::adapters::text::EncodingCodec;

/// 解码配置
/// 说明：控制器的字符编码由配置显式给出，不依赖全局状态。
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AdsConfig {
    /// WHATWG 编码标签，例如 "windows-1252"、"gbk"
    pub encoding: String,
    /// 别名链最大跟随深度
    pub max_alias_depth: usize,
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            encoding: "windows-1252".to_string(),
            max_alias_depth: DEFAULT_MAX_ALIAS_DEPTH,
        }
    }
}

impl AdsConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read ads config file from: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ads config JSON from: {}", path.display()))?;
        Ok(config)
    }

    pub fn text_codec(&self) -> Result<EncodingCodec> {
        EncodingCodec::for_label(&self.encoding)
            .with_context(|| format!("Invalid encoding in ads config: {}", self.encoding))
    }
}
