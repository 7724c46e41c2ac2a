//! Stream decoding.
//!
//! Only FlateDecode (with PNG/TIFF predictors) is decoded. Every other filter
//! is classified as opaque: the stream keeps its raw bytes and filter chain
//! and is copied verbatim on output.

use crate::error::{Error, Result};
use crate::object::{filter_names, Dictionary, Object};

mod flate;
mod predictor;

pub use flate::{compress, FlateDecoder};
pub use predictor::{decode_predictor, DecodeParams};

/// Upper bound on decoded stream size.
const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// How the engine treats a stream's filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterClass {
    /// No filter at all
    Unfiltered,
    /// Every filter in the chain is FlateDecode
    Flate,
    /// Anything else; bytes are carried without interpretation
    Opaque,
}

/// Classify a filter chain.
pub fn classify(filters: &[String]) -> FilterClass {
    if filters.is_empty() {
        FilterClass::Unfiltered
    } else if filters.iter().all(|f| f == "FlateDecode" || f == "Fl") {
        FilterClass::Flate
    } else {
        FilterClass::Opaque
    }
}

/// Predictor parameters of the last filter in the chain, if any.
fn decode_params(dict: &Dictionary) -> Option<DecodeParams> {
    let params = match dict.get("DecodeParms").or_else(|| dict.get("DP"))? {
        Object::Dictionary(d) => d,
        Object::Array(items) => items.last()?.as_dict()?,
        _ => return None,
    };
    Some(DecodeParams::from_dict(params))
}

/// Decode a stream whose chain is unfiltered or Flate-only.
///
/// Returns `Ok(None)` for opaque chains. Indirect `/DecodeParms` are not
/// followed; callers resolve them before asking.
///
/// ```
/// use pdf_splice::decoders::decode_stream;
/// use pdf_splice::object::Dictionary;
///
/// let plain = decode_stream(&Dictionary::new(), b"0 0 m").unwrap();
/// assert_eq!(plain.as_deref(), Some(&b"0 0 m"[..]));
/// ```
pub fn decode_stream(dict: &Dictionary, data: &[u8]) -> Result<Option<Vec<u8>>> {
    let filters = filter_names(dict);
    match classify(&filters) {
        FilterClass::Unfiltered => Ok(Some(data.to_vec())),
        FilterClass::Opaque => Ok(None),
        FilterClass::Flate => {
            let mut current = data.to_vec();
            for _ in &filters {
                current = FlateDecoder.decode(&current)?;
                if current.len() > MAX_DECOMPRESSED_SIZE {
                    return Err(Error::Decode(format!(
                        "Decompressed size {} exceeds limit {}",
                        current.len(),
                        MAX_DECOMPRESSED_SIZE
                    )));
                }
            }
            if let Some(params) = decode_params(dict) {
                if params.predictor != 1 {
                    current = decode_predictor(&current, &params)?;
                }
            }
            Ok(Some(current))
        },
    }
}
