//! PDF object parser.
//!
//! Combines lexer tokens into complete objects with a recursive descent:
//! read a token, decide what it starts, recurse for arrays and dictionaries.
//! A dictionary followed by `stream` becomes a stream object whose byte span
//! is taken from `/Length`.
//!
//! All parsing functions return nom's `IResult`. Exceeding the nesting limit
//! is reported as `nom::Err::Failure` so callers can tell it apart from a
//! plain mismatch.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::IResult;

/// Default maximum nesting of arrays/dictionaries.
pub const DEFAULT_MAX_NESTING: usize = 100;

/// Resolves an indirect `/Length` to a byte count.
pub type LengthResolver<'r> = dyn Fn(ObjectRef) -> Option<usize> + 'r;

/// Configurable object parser.
///
/// `parse_object` covers the common case; documents use an `ObjectParser`
/// with a length resolver so `/Length 12 0 R` is honoured.
#[derive(Clone, Copy)]
pub struct ObjectParser<'r> {
    max_nesting: usize,
    lengths: Option<&'r LengthResolver<'r>>,
}

impl Default for ObjectParser<'_> {
    fn default() -> Self {
        Self {
            max_nesting: DEFAULT_MAX_NESTING,
            lengths: None,
        }
    }
}

impl<'r> ObjectParser<'r> {
    /// Parser with the given nesting limit and no length resolver.
    pub fn new(max_nesting: usize) -> Self {
        Self {
            max_nesting,
            lengths: None,
        }
    }

    /// Use `resolver` for indirect `/Length` values.
    pub fn with_length_resolver(mut self, resolver: &'r LengthResolver<'r>) -> Self {
        self.lengths = Some(resolver);
        self
    }

    /// Parse one object.
    pub fn parse<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Object> {
        self.parse_at(input, 0)
    }

    fn parse_at<'a>(&self, input: &'a [u8], depth: usize) -> IResult<&'a [u8], Object> {
        if depth > self.max_nesting {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::TooLarge,
            )));
        }

        let (rest, tok) = token(input)?;

        match tok {
            Token::Null => Ok((rest, Object::Null)),
            Token::True => Ok((rest, Object::Boolean(true))),
            Token::False => Ok((rest, Object::Boolean(false))),

            Token::Integer(i) => {
                // "N G R" is a reference; anything else leaves the integer alone
                if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                    if let Ok((after_r, Token::R)) = token(after_gen) {
                        if let (Ok(id), Ok(gen)) = (u32::try_from(i), u16::try_from(gen)) {
                            return Ok((after_r, Object::Reference(ObjectRef::new(id, gen))));
                        }
                    }
                }
                Ok((rest, Object::Integer(i)))
            },

            Token::Real(r) => Ok((rest, Object::Real(r))),

            Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),

            Token::HexString(digits) => match decode_hex(digits) {
                Ok(decoded) => Ok((rest, Object::String(decoded))),
                Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::HexDigit,
                ))),
            },

            Token::Name(name) => Ok((rest, Object::Name(name))),

            Token::ArrayStart => self.parse_array(rest, depth + 1),

            Token::DictStart => {
                let (after_dict, dict) = self.parse_dictionary(rest, depth + 1)?;

                if let Ok((stream_input, Token::StreamStart)) = token(after_dict) {
                    let (after_stream, data) = self.parse_stream_data(stream_input, &dict)?;
                    let mut dict = dict;
                    dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
                    return Ok((after_stream, Object::stream(dict, data)));
                }

                Ok((after_dict, Object::Dictionary(dict)))
            },

            _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
        }
    }

    /// Parse a PDF array: `[ obj1 obj2 ... objN ]`
    fn parse_array<'a>(&self, input: &'a [u8], depth: usize) -> IResult<&'a [u8], Object> {
        let mut objects = Vec::new();
        let mut remaining = input;

        loop {
            if let Ok((rest, Token::ArrayEnd)) = token(remaining) {
                return Ok((rest, Object::Array(objects)));
            }
            let (rest, obj) = self.parse_at(remaining, depth)?;
            objects.push(obj);
            remaining = rest;
        }
    }

    /// Parse a PDF dictionary body after `<<`. Keys must be names.
    fn parse_dictionary<'a>(
        &self,
        input: &'a [u8],
        depth: usize,
    ) -> IResult<&'a [u8], Dictionary> {
        let mut dict = Dictionary::new();
        let mut remaining = input;

        loop {
            let (rest, tok) = token(remaining)?;
            match tok {
                Token::DictEnd => return Ok((rest, dict)),
                Token::Name(key) => {
                    let (rest, value) = self.parse_at(rest, depth)?;
                    // Null-valued entries are equivalent to absent ones
                    if !value.is_null() {
                        dict.insert(key, value);
                    }
                    remaining = rest;
                },
                _ => {
                    return Err(nom::Err::Error(nom::error::Error::new(
                        remaining,
                        nom::error::ErrorKind::Tag,
                    )))
                },
            }
        }
    }

    fn declared_length(&self, dict: &Dictionary) -> Option<usize> {
        match dict.get("Length")? {
            Object::Integer(n) => usize::try_from(*n).ok(),
            Object::Reference(r) => self.lengths.and_then(|resolve| resolve(*r)),
            _ => None,
        }
    }

    /// Parse stream data after the `stream` keyword.
    ///
    /// The keyword must be followed by CRLF or LF; a lone CR is accepted with
    /// a warning. When `/Length` is missing or does not land on `endstream`,
    /// the data is delimited by scanning for the keyword instead.
    fn parse_stream_data<'a>(
        &self,
        input: &'a [u8],
        dict: &Dictionary,
    ) -> IResult<&'a [u8], Vec<u8>> {
        let input = if input.starts_with(b"\r\n") {
            &input[2..]
        } else if input.starts_with(b"\n") {
            &input[1..]
        } else if input.starts_with(b"\r") {
            log::warn!("Stream keyword followed by CR alone, accepting");
            &input[1..]
        } else {
            log::warn!("No end-of-line after stream keyword");
            input
        };

        if let Some(length) = self.declared_length(dict) {
            if length <= input.len() {
                if let Ok((rest, Token::StreamEnd)) = token(&input[length..]) {
                    return Ok((rest, input[..length].to_vec()));
                }
            }
            log::warn!("Stream /Length {} does not end at endstream, scanning", length);
        } else {
            log::warn!("Stream without usable /Length, scanning for endstream");
        }

        let pos = find_endstream(input).ok_or_else(|| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof))
        })?;
        let mut end = pos;
        // The EOL before endstream is not part of the data
        if end > 0 && input[end - 1] == b'\n' {
            end -= 1;
        }
        if end > 0 && input[end - 1] == b'\r' {
            end -= 1;
        }
        let rest = &input[pos + b"endstream".len()..];
        Ok((rest, input[..end].to_vec()))
    }
}

/// Parse a PDF object with default settings.
///
/// ```
/// use pdf_splice::parser::parse_object;
///
/// let (_, obj) = parse_object(b"<< /Type /Page /Count 3 >>").unwrap();
/// assert_eq!(obj.type_key(), Some("Page"));
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    ObjectParser::default().parse(input)
}

/// Parse an indirect object definition `N G obj ... endobj`.
///
/// Returns the object number, generation and body. A missing `endobj` is
/// tolerated; anything that is not an object header is not.
pub fn parse_indirect_object<'a>(
    parser: &ObjectParser<'_>,
    input: &'a [u8],
) -> IResult<&'a [u8], (ObjectRef, Object)> {
    let (rest, id) = token(input)?;
    let (rest, gen) = token(rest)?;
    let (rest, kw) = token(rest)?;

    let obj_ref = match (id, gen, kw) {
        (Token::Integer(id), Token::Integer(gen), Token::ObjStart) => {
            match (u32::try_from(id), u16::try_from(gen)) {
                (Ok(id), Ok(gen)) => ObjectRef::new(id, gen),
                _ => {
                    return Err(nom::Err::Error(nom::error::Error::new(
                        input,
                        nom::error::ErrorKind::Digit,
                    )))
                },
            }
        },
        _ => return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    };

    let (rest, body) = parser.parse(rest)?;
    let rest = match token(rest) {
        Ok((after, Token::ObjEnd)) => after,
        _ => {
            log::debug!("Object {} has no endobj", obj_ref);
            rest
        },
    };
    Ok((rest, (obj_ref, body)))
}

/// Find the position of the `endstream` keyword.
fn find_endstream(input: &[u8]) -> Option<usize> {
    let keyword = b"endstream";
    input
        .windows(keyword.len())
        .position(|window| window == keyword)
}

/// Decode escape sequences in PDF literal strings.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` (1-3 digits) and line
/// continuations. Unknown escapes drop the backslash.
///
/// ```
/// # use pdf_splice::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"Section \\247"), b"Section \xa7");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let byte = raw[i];
        if byte != b'\\' || i + 1 >= raw.len() {
            // A bare CR or CRLF inside a literal string reads as LF
            if byte == b'\r' {
                result.push(b'\n');
                if raw.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            } else {
                result.push(byte);
            }
            i += 1;
            continue;
        }

        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(0x08),
            b'f' => result.push(0x0C),
            b'(' | b')' | b'\\' => result.push(next),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut value = u32::from(next - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match raw.get(i) {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        },
                        _ => break,
                    }
                }
                result.push((value & 0xFF) as u8);
            },
            other => result.push(other),
        }
    }

    result
}

/// Decode a hex string to bytes. Whitespace is ignored; an odd trailing
/// digit is padded with 0.
///
/// ```
/// use pdf_splice::parser::decode_hex;
/// assert_eq!(decode_hex(b"48656C6C6F").unwrap(), b"Hello");
/// assert_eq!(decode_hex(b"901FA").unwrap(), vec![0x90, 0x1F, 0xA0]);
/// ```
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits = hex_bytes
        .iter()
        .filter(|c| !c.is_ascii_whitespace() && **c != 0)
        .map(|&c| {
            (c as char)
                .to_digit(16)
                .map(|d| d as u8)
                .ok_or_else(|| Error::parse(0, format!("invalid hex digit {:?}", c as char)))
        })
        .collect::<Result<Vec<u8>>>()?;

    Ok(digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect())
}
