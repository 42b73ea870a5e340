use std::fs;
use std::path::{Path, PathBuf};
use serde::Deserialize;
use crate::core::error::Result;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub root_path: PathBuf,
    pub database_extension: String,
    pub hidden_prefix: char,

    // Generation
    pub compress: bool,
    pub literal_pattern: String,
    pub source_extensions: Vec<String>,

    // Dump
    pub page_size: u32,

    // Resolver
    pub decode_cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            root_path: PathBuf::from("."),
            database_extension: "hdb".to_string(),
            hidden_prefix: '.',

            compress: true,
            literal_pattern: r#"hash\("((?:[^"\\]|\\.)*)"\)"#.to_string(),
            source_extensions: ["c", "h", "inl", "cpp", "hpp", "rs"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),

            page_size: 0,                    // Unpaginated

            decode_cache_size: 256,          // Strings, 0 disables
        }
    }
}

impl Config {
    /// Load a JSON config file; missing fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn is_database_file(&self, path: &Path) -> bool {
        path.extension().and_then(|ext| ext.to_str()) == Some(self.database_extension.as_str())
    }

    pub fn is_source_file(&self, path: &Path) -> bool {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => self.source_extensions.iter().any(|wanted| wanted == ext),
            None => false,
        }
    }
}
