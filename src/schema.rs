//! Field lists and schema inference from a sample of rows.
//!
//! Inference reads at most `sample_limit` rows (20 by default) and grows the
//! [`FieldList`] to the widest row seen. Names come from the first row when
//! it is a header, otherwise they are synthesized as `field1`, `field2`, ...
//! Kinds default to [`FieldKind::Text`]; integer sniffing is opt-in.

use std::{collections::BTreeMap, fmt, ops::Index, slice};

use log::debug;
use serde::Serialize;

use crate::{
    error::Result,
    io_utils::CsvSource,
    progress::NoProgress,
    tokenizer::{ParseResult, Tokenizer},
};

pub const DEFAULT_SAMPLE_ROWS: usize = 20;

/// Characters removed from header values before they become field names.
const STRIPPED_NAME_CHARS: &[char] = &['`', ' ', '"', '\'', ',', ';'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Integer,
    Text,
}

impl FieldKind {
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldKind::Integer => "INTEGER",
            FieldKind::Text => "TEXT",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
        }
    }
}

/// Ordered fields of one file. Only ever grows during inference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldList {
    fields: Vec<Field>,
}

impl FieldList {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    /// Names that occur more than once. Duplicates are kept in the list; the
    /// store decides whether it accepts them.
    pub fn duplicate_names(&self) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for field in &self.fields {
            *counts.entry(field.name.as_str()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    fn push(&mut self, field: Field) {
        self.fields.push(field);
    }
}

impl From<Vec<Field>> for FieldList {
    fn from(fields: Vec<Field>) -> Self {
        Self { fields }
    }
}

impl Index<usize> for FieldList {
    type Output = Field;

    fn index(&self, index: usize) -> &Field {
        &self.fields[index]
    }
}

impl<'a> IntoIterator for &'a FieldList {
    type Item = &'a Field;
    type IntoIter = slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InferOptions {
    pub use_header: bool,
    pub sample_limit: usize,
    pub detect_integers: bool,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self {
            use_header: false,
            sample_limit: DEFAULT_SAMPLE_ROWS,
            detect_integers: false,
        }
    }
}

impl InferOptions {
    pub fn with_header(use_header: bool) -> Self {
        Self {
            use_header,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IntegerCandidate {
    seen_value: bool,
    all_integers: bool,
}

impl Default for IntegerCandidate {
    fn default() -> Self {
        Self {
            seen_value: false,
            all_integers: true,
        }
    }
}

impl IntegerCandidate {
    fn update(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        self.seen_value = true;
        if value.parse::<i64>().is_err() {
            self.all_integers = false;
        }
    }

    fn decide(self) -> FieldKind {
        if self.seen_value && self.all_integers {
            FieldKind::Integer
        } else {
            FieldKind::Text
        }
    }
}

/// Infers the field list of `source` from its first `options.sample_limit`
/// rows. An empty list means the source has no rows.
pub fn infer<S>(source: &S, tokenizer: &Tokenizer, options: &InferOptions) -> Result<FieldList>
where
    S: CsvSource + ?Sized,
{
    let mut fields = FieldList::default();
    let mut candidates: Vec<IntegerCandidate> = Vec::new();

    let result = tokenizer.parse(
        source,
        Some(options.sample_limit),
        &mut NoProgress,
        |row_index, row| {
            let header_row = row_index == 0 && options.use_header;
            for index in fields.len()..row.len() {
                let name = if header_row {
                    sanitize_field_name(&row[index])
                } else {
                    String::new()
                };
                let name = if name.is_empty() {
                    synthesized_name(index)
                } else {
                    name
                };
                fields.push(Field::text(name));
                candidates.push(IntegerCandidate::default());
            }
            if options.detect_integers && !header_row {
                for (candidate, value) in candidates.iter_mut().zip(row) {
                    candidate.update(value);
                }
            }
            true
        },
    );

    match result {
        ParseResult::Success | ParseResult::Cancelled => {}
        ParseResult::Error(err) => return Err(err),
    }

    if options.detect_integers {
        for (field, candidate) in fields.fields.iter_mut().zip(candidates) {
            field.kind = candidate.decide();
        }
    }

    debug!(
        "Inferred {} field(s) from {}: {:?}",
        fields.len(),
        source.describe(),
        fields.names()
    );
    Ok(fields)
}

pub fn sanitize_field_name(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !STRIPPED_NAME_CHARS.contains(ch))
        .collect()
}

fn synthesized_name(index: usize) -> String {
    format!("field{}", index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dialect::Dialect, io_utils::MemorySource};

    fn infer_text(input: &str, options: InferOptions) -> FieldList {
        let source = MemorySource::from(input);
        infer(&source, &Tokenizer::new(Dialect::default()), &options).expect("infer")
    }

    #[test]
    fn header_row_supplies_names() {
        let fields = infer_text("a,b\n1,2\n3,4\n", InferOptions::with_header(true));
        assert_eq!(fields.names(), vec!["a", "b"]);
        assert!(fields.iter().all(|field| field.kind == FieldKind::Text));
    }

    #[test]
    fn ragged_rows_widen_with_synthesized_names() {
        let fields = infer_text("1,2,3\n4,5\n", InferOptions::with_header(false));
        assert_eq!(fields.names(), vec!["field1", "field2", "field3"]);
    }

    #[test]
    fn wider_data_rows_extend_header_names() {
        let fields = infer_text("id,name\n1,Ann,extra\n", InferOptions::with_header(true));
        assert_eq!(fields.names(), vec!["id", "name", "field3"]);
    }

    #[test]
    fn header_names_are_sanitized_with_fallback() {
        let fields = infer_text(
            "\"first name\",`id`;x,\" ,; \"\n",
            InferOptions::with_header(true),
        );
        // The tokenizer splits on ',' only, so the second header keeps its ';' until sanitized.
        assert_eq!(fields.names(), vec!["firstname", "idx", "field3"]);
    }

    #[test]
    fn duplicate_header_names_pass_through() {
        let fields = infer_text("a,a,b\n1,2,3\n", InferOptions::with_header(true));
        assert_eq!(fields.names(), vec!["a", "a", "b"]);
        assert_eq!(fields.duplicate_names(), vec!["a".to_string()]);
    }

    #[test]
    fn empty_source_yields_empty_list() {
        assert!(infer_text("", InferOptions::default()).is_empty());
        assert!(infer_text("\n\r\n", InferOptions::default()).is_empty());
    }

    #[test]
    fn sample_limit_bounds_the_window() {
        let options = InferOptions {
            sample_limit: 2,
            ..InferOptions::default()
        };
        let fields = infer_text("a\nb\nc,d,e\n", options);
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn integer_detection_is_opt_in() {
        let input = "id,name,code\n1,Ann,7\n2,Bob,x\n,Cy,9\n";
        let plain = infer_text(input, InferOptions::with_header(true));
        assert!(plain.iter().all(|field| field.kind == FieldKind::Text));

        let options = InferOptions {
            use_header: true,
            detect_integers: true,
            ..InferOptions::default()
        };
        let detected = infer_text(input, options);
        let kinds: Vec<_> = detected.iter().map(|field| field.kind).collect();
        assert_eq!(kinds, vec![FieldKind::Integer, FieldKind::Text, FieldKind::Text]);
    }

    #[test]
    fn decoding_errors_propagate() {
        let source = MemorySource::new(b"a,\xC3\x28\n".to_vec());
        let err = infer(
            &source,
            &Tokenizer::new(Dialect::default()),
            &InferOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.class(), "DecodingError");
    }
}
