//! Object streams (`/Type /ObjStm`).
//!
//! The decoded stream starts with `/N` pairs of integers (object number,
//! offset relative to `/First`) followed by the member objects themselves:
//!
//! ```text
//! 10 0 11 15
//! << /Type /Font ... >>  [0 0 612 792]
//! ```

use crate::decoders::decode_stream;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::parser::ObjectParser;

/// Upper bound on `/N`.
const MAX_MEMBERS: i64 = 1_000_000;

/// Parse every member of an object stream, in stream order.
///
/// Returns `(object number, object)` pairs; the position in the vector is the
/// member's index as used by compressed cross-reference entries. Members
/// that fail to parse are logged and left as `Null`.
pub fn parse_object_stream(stream: &Object, parser: &ObjectParser<'_>) -> Result<Vec<(u32, Object)>> {
    let (dict, data, decoded) = match stream {
        Object::Stream { dict, data, decoded } => (dict, data, decoded),
        other => {
            return Err(Error::MalformedDocument(format!(
                "object stream is a {}, not a stream",
                other.type_name()
            )))
        },
    };
    if let Some(kind) = stream.type_key() {
        if kind != "ObjStm" {
            return Err(Error::MalformedDocument(format!("expected /Type /ObjStm, got /{}", kind)));
        }
    }

    let n = dict
        .get("N")
        .and_then(Object::as_integer)
        .filter(|n| (0..=MAX_MEMBERS).contains(n))
        .ok_or_else(|| Error::MalformedDocument("object stream has no valid /N".to_string()))?
        as usize;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .and_then(|f| usize::try_from(f).ok())
        .ok_or_else(|| Error::MalformedDocument("object stream has no valid /First".to_string()))?;

    let content = match decoded {
        Some(bytes) => bytes.to_vec(),
        None => decode_stream(dict, data)?.ok_or_else(|| {
            Error::MalformedDocument("object stream uses an unsupported filter".to_string())
        })?,
    };
    if content.len() < first {
        return Err(Error::MalformedDocument(format!(
            "object stream data is {} bytes, /First is {}",
            content.len(),
            first
        )));
    }

    let pairs = parse_pairs(&content[..first], n)?;
    let body = &content[first..];
    let mut members = Vec::with_capacity(pairs.len());
    for (number, offset) in pairs {
        let object = match body.get(offset..).map(|input| parser.parse(input)) {
            Some(Ok((_, Object::Stream { .. }))) => {
                log::warn!("Object stream member {} is itself a stream, ignoring", number);
                Object::Null
            },
            Some(Ok((_, obj))) => obj,
            Some(Err(e)) => {
                log::warn!("Failed to parse object stream member {}: {:?}", number, e);
                Object::Null
            },
            None => {
                log::warn!("Object stream member {} offset {} is past the data", number, offset);
                Object::Null
            },
        };
        members.push((number, object));
    }
    Ok(members)
}

fn parse_pairs(header: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut words = header
        .split(|c| crate::lexer::is_whitespace(*c))
        .filter(|w| !w.is_empty())
        .map(|w| std::str::from_utf8(w).ok().and_then(|s| s.parse::<u64>().ok()));

    let mut pairs = Vec::with_capacity(count);
    for i in 0..count {
        let (Some(Some(number)), Some(Some(offset))) = (words.next(), words.next()) else {
            return Err(Error::parse(0, format!("object stream pair {} is missing or invalid", i)));
        };
        let number = u32::try_from(number)
            .map_err(|_| Error::parse(0, format!("object number {} out of range", number)))?;
        pairs.push((number, offset as usize));
    }
    Ok(pairs)
}
