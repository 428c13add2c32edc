//! Delimited-text dialect: separator, quote character, trimming and encoding.
//!
//! A [`Dialect`] is supplied by the caller and stays fixed for one import run.
//! Both the preview/inference pass and the full import read the same source
//! with the same dialect.

use encoding_rs::{Encoding, UTF_8};

use crate::error::{ImportError, Result};

pub const DEFAULT_SEPARATOR: char = ',';
pub const DEFAULT_QUOTE: char = '"';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Field separator. `None` falls back to [`DEFAULT_SEPARATOR`].
    pub separator: Option<char>,
    /// Quote character. `None` disables quoting.
    pub quote: Option<char>,
    pub trim_fields: bool,
    pub encoding: &'static Encoding,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            separator: Some(DEFAULT_SEPARATOR),
            quote: Some(DEFAULT_QUOTE),
            trim_fields: true,
            encoding: UTF_8,
        }
    }
}

impl Dialect {
    pub fn new(separator: char, quote: Option<char>) -> Self {
        Self {
            separator: Some(separator),
            quote,
            ..Self::default()
        }
    }

    pub fn with_trim(mut self, trim_fields: bool) -> Self {
        self.trim_fields = trim_fields;
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn effective_separator(&self) -> char {
        self.separator.unwrap_or(DEFAULT_SEPARATOR)
    }

    pub fn validate(&self) -> Result<()> {
        let separator = self.effective_separator();
        check_control_char("separator", separator)?;
        if let Some(quote) = self.quote {
            check_control_char("quote", quote)?;
            if quote == separator {
                return Err(ImportError::InvalidDialect(format!(
                    "separator and quote must differ (both are '{}')",
                    crate::printable_char(separator)
                )));
            }
        }
        Ok(())
    }
}

fn check_control_char(role: &str, value: char) -> Result<()> {
    if !value.is_ascii() {
        return Err(ImportError::InvalidDialect(format!(
            "{role} must be an ASCII character, got '{value}'"
        )));
    }
    if value == '\n' || value == '\r' {
        return Err(ImportError::InvalidDialect(format!(
            "{role} cannot be a line terminator"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dialect_is_comma_double_quote_trimmed_utf8() {
        let dialect = Dialect::default();
        assert_eq!(dialect.effective_separator(), ',');
        assert_eq!(dialect.quote, Some('"'));
        assert!(dialect.trim_fields);
        assert_eq!(dialect.encoding, UTF_8);
        dialect.validate().expect("default dialect is valid");
    }

    #[test]
    fn missing_separator_falls_back_to_comma() {
        let dialect = Dialect {
            separator: None,
            ..Dialect::default()
        };
        assert_eq!(dialect.effective_separator(), ',');
    }

    #[test]
    fn separator_equal_to_quote_is_rejected() {
        let err = Dialect::new('"', Some('"')).validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn non_ascii_separator_is_rejected() {
        assert!(Dialect::new('§', None).validate().is_err());
        assert!(Dialect::new('\n', None).validate().is_err());
    }
}
