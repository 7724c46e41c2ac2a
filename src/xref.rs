//! Cross-reference index.
//!
//! Maps object numbers to byte offsets (or to a slot inside an object stream).
//! Both classic `xref` tables and cross-reference streams are read, `/Prev`
//! chains of incremental updates are followed, and hybrid files honour
//! `/XRefStm`. When the index is missing or unreadable it is rebuilt by
//! scanning the file for object headers.
//!
//! The index is only used while loading; serialization always writes a fresh
//! table.

use crate::decoders::decode_stream;
use crate::error::{Error, Result};
use crate::lexer::skip_ws;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::{parse_indirect_object, parse_object, ObjectParser};
use lazy_static::lazy_static;
use regex::bytes::Regex;
use std::collections::{BTreeMap, HashSet};

/// Longest `/Prev` chain followed before giving up.
const MAX_PREV_CHAIN: usize = 100;

/// Largest subsection accepted in a classic table.
const MAX_SUBSECTION: u64 = 10_000_000;

/// How far from the end of the file `startxref` is searched for.
const STARTXREF_WINDOW: usize = 2048;

lazy_static! {
    static ref OBJ_HEADER: Regex = Regex::new(r"(?-u)(\d{1,10})\s+(\d{1,5})\s+obj\b").unwrap();
    static ref TRAILER: Regex = Regex::new(r"(?-u)trailer\s*<<").unwrap();
    static ref XREF_STREAM_TYPE: Regex = Regex::new(r"(?-u)/Type\s*/XRef\b").unwrap();
    static ref CATALOG_TYPE: Regex = Regex::new(r"(?-u)/Type\s*/Catalog\b").unwrap();
}

/// Cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Object number not in use
    Free {
        /// Next free object number
        next: u32,
        /// Generation to use on reuse
        generation: u16,
    },
    /// Object stored at a byte offset
    Uncompressed {
        /// Offset of the `N G obj` header
        offset: usize,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing `/Type /ObjStm` stream
        stream: u32,
        /// Index within that stream
        index: u32,
    },
}

impl XRefEntry {
    /// Whether the entry marks a free object number.
    pub fn is_free(&self) -> bool {
        matches!(self, XRefEntry::Free { .. })
    }
}

/// Merged cross-reference index plus the effective trailer.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Dictionary,
    reconstructed: bool,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Entry for an object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Entries in ascending object number.
    pub fn iter(&self) -> impl Iterator<Item = (u32, XRefEntry)> + '_ {
        self.entries.iter().map(|(n, e)| (*n, *e))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Effective trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Replace the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dictionary) {
        self.trailer = trailer;
    }

    /// Whether the table was rebuilt by scanning rather than read from the file.
    pub fn is_reconstructed(&self) -> bool {
        self.reconstructed
    }

    /// Merge an older section into this one.
    ///
    /// Entries already present win. Trailer keys missing here are taken from
    /// the older trailer.
    pub fn merge_from(&mut self, older: CrossRefTable) {
        for (number, entry) in older.entries {
            self.entries.entry(number).or_insert(entry);
        }
        for (key, value) in older.trailer {
            self.trailer.entry(key).or_insert(value);
        }
    }

    /// Apply a hybrid file's `/XRefStm` section: it fills numbers the classic
    /// table lacks or marks free.
    fn overlay_stream(&mut self, stream: CrossRefTable) {
        for (number, entry) in stream.entries {
            let replace = self.entries.get(&number).map_or(true, XRefEntry::is_free);
            if replace {
                self.entries.insert(number, entry);
            }
        }
    }
}

fn skip(input: &[u8]) -> &[u8] {
    match skip_ws(input) {
        Ok((rest, _)) => rest,
        Err(_) => input,
    }
}

/// Read an unsigned decimal after optional whitespace.
fn next_uint(input: &[u8]) -> Option<(&[u8], u64)> {
    let input = skip(input);
    let digits = input.iter().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 19 {
        return None;
    }
    let text = std::str::from_utf8(&input[..digits]).ok()?;
    Some((&input[digits..], text.parse().ok()?))
}

/// Find the offset named by the last `startxref` keyword.
pub fn find_xref_offset(data: &[u8]) -> Result<usize> {
    let window_start = data.len().saturating_sub(STARTXREF_WINDOW);
    let tail = &data[window_start..];
    let keyword = b"startxref";
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or_else(|| Error::MalformedDocument("startxref not found".to_string()))?;

    let (_, offset) = next_uint(&tail[pos + keyword.len()..])
        .ok_or_else(|| Error::parse(window_start + pos, "startxref without offset"))?;
    let offset = usize::try_from(offset)
        .ok()
        .filter(|o| *o < data.len())
        .ok_or_else(|| Error::MalformedDocument(format!("startxref {} beyond end of file", offset)))?;
    Ok(offset)
}

/// Read the index for a whole file, rebuilding it by scanning when the
/// `startxref` chain is unusable.
pub fn load(data: &[u8]) -> Result<CrossRefTable> {
    match find_xref_offset(data).and_then(|offset| parse_xref(data, offset)) {
        Ok(table) => Ok(table),
        Err(e) => {
            log::warn!("Cross-reference index unusable ({}), rebuilding by scan", e);
            reconstruct(data)
        },
    }
}

/// Parse the section at `offset` and every section reachable through `/Prev`.
///
/// Later sections (those nearer the start of the chain) win for any object
/// number defined more than once.
pub fn parse_xref(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    let mut visited = HashSet::new();
    let mut next = Some(offset);

    while let Some(offset) = next {
        if !visited.insert(offset) {
            log::warn!("Cross-reference /Prev loop at offset {}, stopping", offset);
            break;
        }
        if visited.len() > MAX_PREV_CHAIN {
            return Err(Error::MalformedDocument(format!(
                "cross-reference /Prev chain longer than {}",
                MAX_PREV_CHAIN
            )));
        }

        let section = parse_section(data, offset)?;
        log::debug!("Cross-reference section at {}: {} entries", offset, section.len());
        next = section
            .trailer
            .get("Prev")
            .and_then(Object::as_integer)
            .and_then(|p| usize::try_from(p).ok());
        table.merge_from(section);
    }

    table.trailer.shift_remove("Prev");
    table.trailer.shift_remove("XRefStm");
    Ok(table)
}

fn parse_section(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let input = data
        .get(offset..)
        .ok_or_else(|| Error::parse(offset, "cross-reference offset beyond end of file"))?;

    if skip(input).starts_with(b"xref") {
        let mut table = parse_table(data, offset)?;
        if let Some(stm) = table
            .trailer
            .get("XRefStm")
            .and_then(Object::as_integer)
            .and_then(|o| usize::try_from(o).ok())
        {
            match parse_stream(data, stm) {
                Ok(stream) => table.overlay_stream(stream),
                Err(e) => log::warn!("Ignoring unreadable /XRefStm at {}: {}", stm, e),
            }
        }
        Ok(table)
    } else {
        parse_stream(data, offset)
    }
}

/// Parse a classic table:
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000015 00000 n
/// 0000000064 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
fn parse_table(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let position = |rest: &[u8]| data.len() - rest.len();
    let mut rest = &skip(&data[offset..])[b"xref".len()..];
    let mut table = CrossRefTable::new();

    loop {
        rest = skip(rest);
        if rest.starts_with(b"trailer") {
            rest = &rest[b"trailer".len()..];
            break;
        }
        let (r, start) = next_uint(rest)
            .ok_or_else(|| Error::parse(position(rest), "expected xref subsection header"))?;
        let (r, count) = next_uint(r)
            .ok_or_else(|| Error::parse(position(r), "expected xref subsection count"))?;
        if count > MAX_SUBSECTION {
            return Err(Error::parse(position(rest), "xref subsection count exceeds limit"));
        }
        rest = r;

        for i in 0..count {
            let (r, field1) = next_uint(rest)
                .ok_or_else(|| Error::parse(position(rest), "expected xref entry offset"))?;
            let (r, generation) = next_uint(r)
                .ok_or_else(|| Error::parse(position(r), "expected xref entry generation"))?;
            let r = skip(r);
            let generation = u16::try_from(generation).unwrap_or(u16::MAX);
            let entry = match r.first() {
                Some(b'n') => XRefEntry::Uncompressed {
                    offset: field1 as usize,
                    generation,
                },
                Some(b'f') => XRefEntry::Free {
                    next: field1 as u32,
                    generation,
                },
                _ => return Err(Error::parse(position(r), "xref entry type must be 'n' or 'f'")),
            };
            let number = u32::try_from(start + i)
                .map_err(|_| Error::parse(position(r), "object number out of range"))?;
            table.add_entry(number, entry);
            rest = &r[1..];
        }
    }

    match parse_object(rest) {
        Ok((_, Object::Dictionary(trailer))) => table.trailer = trailer,
        _ => return Err(Error::parse(position(rest), "trailer is not a dictionary")),
    }
    Ok(table)
}

/// Parse a cross-reference stream (`/Type /XRef`).
fn parse_stream(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let input = data
        .get(offset..)
        .ok_or_else(|| Error::parse(offset, "cross-reference offset beyond end of file"))?;
    let parser = ObjectParser::default();
    let (_, (_, obj)) = parse_indirect_object(&parser, input)
        .map_err(|_| Error::parse(offset, "expected xref table or xref stream"))?;

    let (dict, raw) = match obj {
        Object::Stream { dict, data, .. } => (dict, data),
        _ => return Err(Error::parse(offset, "xref stream is not a stream object")),
    };
    if let Some(kind) = dict.get("Type").and_then(Object::as_name) {
        if kind != "XRef" {
            return Err(Error::parse(offset, format!("expected /Type /XRef, got /{}", kind)));
        }
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|w| {
            w.iter()
                .filter_map(Object::as_integer)
                .filter_map(|v| usize::try_from(v).ok())
                .collect()
        })
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|w| *w > 8) {
        return Err(Error::MalformedDocument("invalid /W in xref stream".to_string()));
    }
    let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
    let entry_size = w1 + w2 + w3;

    let size = dict
        .get("Size")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::MalformedDocument("missing /Size in xref stream".to_string()))?;

    let ranges: Vec<(i64, i64)> = match dict.get("Index").and_then(Object::as_array) {
        Some(index) => index
            .chunks_exact(2)
            .filter_map(|pair| Some((pair[0].as_integer()?, pair[1].as_integer()?)))
            .collect(),
        None => vec![(0, size)],
    };

    let decoded = decode_stream(&dict, &raw)?.ok_or_else(|| {
        Error::MalformedDocument("xref stream uses an unsupported filter".to_string())
    })?;

    let mut table = CrossRefTable::new();
    let mut rows = decoded.chunks_exact(entry_size.max(1));
    for (start, count) in ranges {
        for number in start..start.saturating_add(count) {
            let row = rows
                .next()
                .ok_or_else(|| Error::MalformedDocument("truncated xref stream data".to_string()))?;
            let kind = if w1 == 0 { 1 } else { read_int(&row[..w1]) };
            let field2 = read_int(&row[w1..w1 + w2]);
            let field3 = read_int(&row[w1 + w2..]);
            let number = match u32::try_from(number) {
                Ok(n) => n,
                Err(_) => continue,
            };
            let entry = match kind {
                0 => XRefEntry::Free {
                    next: field2 as u32,
                    generation: field3 as u16,
                },
                1 => XRefEntry::Uncompressed {
                    offset: field2 as usize,
                    generation: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: field2 as u32,
                    index: field3 as u32,
                },
                other => {
                    log::debug!("Unknown xref stream entry type {} for object {}", other, number);
                    continue;
                },
            };
            table.add_entry(number, entry);
        }
    }

    table.trailer = dict;
    Ok(table)
}

/// Big-endian integer of up to 8 bytes.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Rebuild the index by scanning for `N G obj` headers.
///
/// Later headers win for a repeated object number, matching incremental
/// update order. The trailer comes from the last `trailer` dictionary, else
/// the last cross-reference stream dictionary, else a catalog found by scan.
pub fn reconstruct(data: &[u8]) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    table.reconstructed = true;
    let mut headers: Vec<(usize, ObjectRef)> = Vec::new();

    for caps in OBJ_HEADER.captures_iter(data) {
        let (Some(whole), Some(id), Some(gen)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if whole.start() > 0 && data[whole.start() - 1].is_ascii_digit() {
            continue;
        }
        let parsed = std::str::from_utf8(id.as_bytes())
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .zip(std::str::from_utf8(gen.as_bytes()).ok().and_then(|s| s.parse::<u16>().ok()));
        if let Some((id, gen)) = parsed {
            table.add_entry(
                id,
                XRefEntry::Uncompressed {
                    offset: whole.start(),
                    generation: gen,
                },
            );
            headers.push((whole.start(), ObjectRef::new(id, gen)));
        }
    }

    if table.is_empty() {
        return Err(Error::MalformedDocument("no objects found while rebuilding index".to_string()));
    }
    log::info!("Rebuilt cross-reference index with {} objects", table.len());

    // Object header that starts before `pos` and is closest to it
    let enclosing = |pos: usize| {
        headers
            .iter()
            .rev()
            .find(|(start, _)| *start < pos)
            .map(|(start, r)| (*start, *r))
    };

    if let Some(m) = TRAILER.find_iter(data).last() {
        let dict_start = m.end() - 2;
        if let Ok((_, Object::Dictionary(trailer))) = parse_object(&data[dict_start..]) {
            table.trailer = trailer;
        }
    }

    if table.trailer.is_empty() {
        if let Some(m) = XREF_STREAM_TYPE.find_iter(data).last() {
            if let Some((start, _)) = enclosing(m.start()) {
                let parser = ObjectParser::default();
                if let Ok((_, (_, obj))) = parse_indirect_object(&parser, &data[start..]) {
                    if let Some(dict) = obj.as_dict() {
                        table.trailer = dict.clone();
                    }
                }
            }
        }
    }

    if table.trailer.is_empty() {
        let root = CATALOG_TYPE
            .find_iter(data)
            .last()
            .and_then(|m| enclosing(m.start()))
            .map(|(_, r)| r)
            .ok_or_else(|| Error::MalformedDocument("no trailer or catalog found".to_string()))?;
        log::warn!("No trailer found, using catalog {}", root);
        table.trailer.insert("Root".to_string(), Object::Reference(root));
    }

    for key in ["Prev", "XRefStm", "W", "Index", "Filter", "DecodeParms", "Length", "Type"] {
        table.trailer.shift_remove(key);
    }
    Ok(table)
}
