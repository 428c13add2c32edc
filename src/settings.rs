//! Last-used import preferences, persisted as YAML.
//!
//! The CLI loads these before parsing overrides and writes them back after a
//! run without failures. The import engine never reads or writes them.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    dialect::{DEFAULT_QUOTE, DEFAULT_SEPARATOR, Dialect},
    io_utils::{self, DEFAULT_ENCODING_LABEL},
};

pub const SETTINGS_ENV: &str = "CSV_IMPORT_SETTINGS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub first_row_header: bool,
    pub trim_fields: bool,
    pub separate_tables: bool,
    pub separator: char,
    pub quote: Option<char>,
    pub encoding: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            first_row_header: false,
            trim_fields: true,
            separate_tables: false,
            separator: DEFAULT_SEPARATOR,
            quote: Some(DEFAULT_QUOTE),
            encoding: DEFAULT_ENCODING_LABEL.to_string(),
        }
    }
}

impl ImportSettings {
    /// Reads settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = File::open(path).with_context(|| format!("Opening settings file {path:?}"))?;
        let settings = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing settings file {path:?}"))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Serializing settings")?;
        std::fs::write(path, yaml).with_context(|| format!("Writing settings file {path:?}"))?;
        Ok(())
    }

    pub fn dialect(&self) -> Result<Dialect> {
        let encoding = io_utils::resolve_encoding(Some(&self.encoding))?;
        let dialect = Dialect {
            separator: Some(self.separator),
            quote: self.quote,
            trim_fields: self.trim_fields,
            encoding,
        };
        dialect.validate()?;
        Ok(dialect)
    }
}
