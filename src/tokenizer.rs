//! Streaming tokenizer for delimited text.
//!
//! [`Rows`] is a pull-based iterator that decodes the source chunk by chunk
//! with `encoding_rs` and splits it into rows of fields according to a
//! [`Dialect`]. [`Tokenizer::parse`] layers the visitor contract used by
//! schema inference and the import engine on top of it: a row callback that
//! may stop the scan, an optional row limit, and progress checkpoints with
//! cooperative cancellation during full scans.
//!
//! Quoting rules:
//!
//! - a quote character opens a quoted span anywhere in a field; separators,
//!   line breaks and whitespace inside the span are literal
//! - a doubled quote inside a span is a literal quote
//! - text after a closing quote continues the same field
//! - with `trim_fields`, spaces and tabs outside quoted spans are stripped
//!   from both ends of the field
//!
//! Rows end at `\n`, `\r\n` or a lone `\r`. Blank lines carry no fields and
//! are skipped.

use std::io::{self, Read, Write};

use csv::{QuoteStyle, Terminator};
use encoding_rs::{Decoder, DecoderResult, Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::{
    dialect::Dialect,
    error::{ImportError, Result},
    io_utils::CsvSource,
    progress::{ProgressGuard, ProgressSink},
};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

pub type Row = Vec<String>;

#[derive(Debug)]
pub enum ParseResult {
    Success,
    Cancelled,
    Error(ImportError),
}

impl ParseResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseResult::Success)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    dialect: Dialect,
    chunk_size: usize,
}

impl Tokenizer {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Sets how many raw bytes are read per chunk. Progress checkpoints
    /// happen once per chunk.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Opens `source` from the start and returns a lazy row iterator.
    pub fn rows<'a, S>(&self, source: &'a S) -> Result<Rows<'a>>
    where
        S: CsvSource + ?Sized,
    {
        self.dialect.validate()?;
        let reader = source.open()?;
        Ok(Rows {
            chars: CharReader::new(reader, self.dialect.encoding, self.chunk_size),
            separator: self.dialect.effective_separator(),
            quote: self.dialect.quote,
            trim: self.dialect.trim_fields,
            skip_lf: false,
            done: false,
        })
    }

    /// Visits rows of `source` in order.
    ///
    /// `on_row` receives the 0-based row index and the row's fields; returning
    /// `false` stops the scan with [`ParseResult::Cancelled`]. With
    /// `row_limit = Some(n)` the scan ends with [`ParseResult::Success`] after
    /// `n` rows and `progress` is not used. With `None` the whole source is
    /// read and `progress` is driven at every chunk checkpoint.
    pub fn parse<S, F>(
        &self,
        source: &S,
        row_limit: Option<usize>,
        progress: &mut dyn ProgressSink,
        mut on_row: F,
    ) -> ParseResult
    where
        S: CsvSource + ?Sized,
        F: FnMut(usize, &[String]) -> bool,
    {
        match row_limit {
            Some(limit) => self.parse_bounded(source, limit, &mut on_row),
            None => self.parse_unbounded(source, progress, &mut on_row),
        }
    }

    fn parse_bounded<S, F>(&self, source: &S, limit: usize, on_row: &mut F) -> ParseResult
    where
        S: CsvSource + ?Sized,
        F: FnMut(usize, &[String]) -> bool,
    {
        if limit == 0 {
            return ParseResult::Success;
        }
        let rows = match self.rows(source) {
            Ok(rows) => rows,
            Err(err) => return ParseResult::Error(err),
        };
        for (index, row) in rows.take(limit).enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(err) => return ParseResult::Error(err),
            };
            let keep_going = on_row(index, &row);
            if index + 1 == limit {
                break;
            }
            if !keep_going {
                return ParseResult::Cancelled;
            }
        }
        ParseResult::Success
    }

    fn parse_unbounded<S, F>(
        &self,
        source: &S,
        progress: &mut dyn ProgressSink,
        on_row: &mut F,
    ) -> ParseResult
    where
        S: CsvSource + ?Sized,
        F: FnMut(usize, &[String]) -> bool,
    {
        let mut guard = ProgressGuard::start(progress, source.size_hint());
        let mut rows = match self.rows(source) {
            Ok(rows) => rows,
            Err(err) => return ParseResult::Error(err),
        };
        let mut reported_chunks = 0u64;
        let mut index = 0usize;
        while let Some(row) = rows.next() {
            let row = match row {
                Ok(row) => row,
                Err(err) => return ParseResult::Error(err),
            };
            if !on_row(index, &row) {
                return ParseResult::Cancelled;
            }
            index += 1;
            if rows.chunks_read() != reported_chunks {
                reported_chunks = rows.chunks_read();
                if !guard.update(rows.bytes_consumed()) {
                    return ParseResult::Cancelled;
                }
            }
        }
        ParseResult::Success
    }
}

/// Lazy, finite sequence of rows. Restart by calling [`Tokenizer::rows`]
/// again on the same source.
pub struct Rows<'a> {
    chars: CharReader<'a>,
    separator: char,
    quote: Option<char>,
    trim: bool,
    skip_lf: bool,
    done: bool,
}

impl Rows<'_> {
    /// Raw (undecoded) bytes pulled from the source so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.chars.bytes_consumed
    }

    pub fn chunks_read(&self) -> u64 {
        self.chars.chunks_read
    }

    fn read_row(&mut self) -> Result<Option<Row>> {
        let mut row = Row::new();
        let mut field = FieldBuffer::default();
        let mut state = State::Unquoted;
        let mut has_content = false;

        loop {
            let Some(ch) = self.chars.next_char()? else {
                if state == State::QuoteSeen {
                    field.close_quote();
                }
                if has_content {
                    row.push(field.finish(self.trim));
                    return Ok(Some(row));
                }
                return Ok(None);
            };

            if self.skip_lf {
                self.skip_lf = false;
                if ch == '\n' {
                    continue;
                }
            }

            if state == State::QuoteSeen {
                if Some(ch) == self.quote {
                    field.push_quoted(ch);
                    state = State::Quoted;
                    continue;
                }
                field.close_quote();
                state = State::Unquoted;
            }

            match state {
                State::Quoted => {
                    if Some(ch) == self.quote {
                        state = State::QuoteSeen;
                    } else {
                        field.push_quoted(ch);
                    }
                }
                State::Unquoted if Some(ch) == self.quote => {
                    field.open_quote();
                    has_content = true;
                    state = State::Quoted;
                }
                State::Unquoted if ch == self.separator => {
                    row.push(std::mem::take(&mut field).finish(self.trim));
                    has_content = true;
                }
                State::Unquoted if ch == '\n' || ch == '\r' => {
                    self.skip_lf = ch == '\r';
                    if has_content {
                        row.push(field.finish(self.trim));
                        return Ok(Some(row));
                    }
                }
                State::Unquoted => {
                    field.push_unquoted(ch, self.trim);
                    has_content = true;
                }
                State::QuoteSeen => unreachable!("quote lookahead resolved above"),
            }
        }
    }
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unquoted,
    Quoted,
    /// A quote was seen inside a quoted span; the next character decides
    /// whether it was an escaped quote or the end of the span.
    QuoteSeen,
}

#[derive(Debug, Default)]
struct FieldBuffer {
    text: String,
    quoted: bool,
    /// Bytes at the start of `text` that came from (or precede) the last
    /// quoted span and must survive trailing trim.
    protected: usize,
}

impl FieldBuffer {
    fn push_unquoted(&mut self, ch: char, trim: bool) {
        if trim && !self.quoted && self.text.is_empty() && is_trimmed(ch) {
            return;
        }
        self.text.push(ch);
    }

    fn push_quoted(&mut self, ch: char) {
        self.text.push(ch);
    }

    fn open_quote(&mut self) {
        self.quoted = true;
    }

    fn close_quote(&mut self) {
        self.protected = self.text.len();
    }

    fn finish(mut self, trim: bool) -> String {
        if trim {
            let kept = self.text[self.protected..]
                .trim_end_matches(is_trimmed)
                .len();
            self.text.truncate(self.protected + kept);
        }
        self.text
    }
}

/// Only spaces and tabs are trimmed; other whitespace is field content.
fn is_trimmed(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

/// Decodes raw chunks into text and hands out one character at a time.
struct CharReader<'a> {
    reader: Box<dyn Read + 'a>,
    encoding: &'static Encoding,
    decoder: Decoder,
    raw: Vec<u8>,
    text: String,
    pos: usize,
    bytes_consumed: u64,
    chunks_read: u64,
    eof: bool,
    /// Decoding error raised after the valid prefix of the current chunk.
    pending: Option<ImportError>,
}

impl<'a> CharReader<'a> {
    fn new(reader: Box<dyn Read + 'a>, encoding: &'static Encoding, chunk_size: usize) -> Self {
        Self {
            reader,
            encoding,
            decoder: encoding.new_decoder_with_bom_removal(),
            raw: vec![0; chunk_size],
            text: String::new(),
            pos: 0,
            bytes_consumed: 0,
            chunks_read: 0,
            eof: false,
            pending: None,
        }
    }

    fn next_char(&mut self) -> Result<Option<char>> {
        loop {
            if let Some(ch) = self.text[self.pos..].chars().next() {
                self.pos += ch.len_utf8();
                return Ok(Some(ch));
            }
            if let Some(err) = self.pending.take() {
                return Err(err);
            }
            if self.eof {
                return Ok(None);
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<()> {
        let read = loop {
            match self.reader.read(&mut self.raw) {
                Ok(read) => break read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        };
        let last = read == 0;
        self.text.clear();
        self.pos = 0;

        let mut offset = 0;
        loop {
            let remaining = read - offset;
            let needed = self
                .decoder
                .max_utf8_buffer_length_without_replacement(remaining)
                .unwrap_or(remaining * 4 + 16);
            self.text.reserve(needed);
            let (result, consumed) = self.decoder.decode_to_string_without_replacement(
                &self.raw[offset..read],
                &mut self.text,
                last,
            );
            offset += consumed;
            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => continue,
                DecoderResult::Malformed(_, _) => {
                    self.pending = Some(ImportError::Decoding {
                        encoding: self.encoding.name(),
                        offset: self.bytes_consumed + offset as u64,
                    });
                    self.eof = true;
                    break;
                }
            }
        }

        self.bytes_consumed += read as u64;
        self.chunks_read += 1;
        self.eof |= last;
        Ok(())
    }
}

/// Serializes rows in `dialect` so that tokenizing the output yields the
/// same rows. Every field is quoted when the dialect has a quote character.
pub fn write_rows<W: Write>(mut writer: W, rows: &[Row], dialect: &Dialect) -> Result<()> {
    dialect.validate()?;
    let mut buffer = Vec::new();
    {
        let mut builder = csv::WriterBuilder::new();
        builder
            .delimiter(dialect.effective_separator() as u8)
            .flexible(true)
            .terminator(Terminator::Any(b'\n'))
            .double_quote(true);
        match dialect.quote {
            Some(quote) => builder.quote(quote as u8).quote_style(QuoteStyle::Always),
            None => builder.quote_style(QuoteStyle::Never),
        };
        let mut csv_writer = builder.from_writer(&mut buffer);
        for row in rows {
            csv_writer.write_record(row).map_err(io::Error::from)?;
        }
        csv_writer.flush()?;
    }

    if dialect.encoding == UTF_8 {
        writer.write_all(&buffer)?;
        return Ok(());
    }
    let text = String::from_utf8(buffer)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

    // encoding_rs has no UTF-16 encoders: `encode` would emit UTF-8 instead.
    if dialect.encoding == UTF_16LE || dialect.encoding == UTF_16BE {
        let little_endian = dialect.encoding == UTF_16LE;
        let encoded = text
            .encode_utf16()
            .flat_map(|unit| {
                if little_endian {
                    unit.to_le_bytes()
                } else {
                    unit.to_be_bytes()
                }
            })
            .collect::<Vec<u8>>();
        writer.write_all(&encoded)?;
        return Ok(());
    }
    if dialect.encoding.output_encoding() != dialect.encoding {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Cannot write text as {}", dialect.encoding.name()),
        )
        .into());
    }

    let (encoded, _, had_errors) = dialect.encoding.encode(&text);
    if had_errors {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to encode text using {}", dialect.encoding.name()),
        )
        .into());
    }
    writer.write_all(&encoded)?;
    Ok(())
}
