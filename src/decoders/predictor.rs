//! PNG and TIFF predictors applied after FlateDecode.
//!
//! Cross-reference streams and object streams are routinely written with
//! `/Predictor 12` so their fixed-width rows compress well.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};

/// `/DecodeParms` values relevant to predictors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read predictor parameters from a `/DecodeParms` dictionary.
    ///
    /// Missing or non-integer entries take their PDF defaults.
    pub fn from_dict(dict: &Dictionary) -> Self {
        let int = |key: &str, default: i64| {
            dict.get(key)
                .and_then(Object::as_integer)
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };
        Self {
            predictor: int("Predictor", 1),
            columns: int("Columns", 1) as usize,
            colors: int("Colors", 1) as usize,
            bits_per_component: int("BitsPerComponent", 8) as usize,
        }
    }

    /// Pixel bytes in one row, without the PNG tag byte.
    pub fn row_bytes(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Distance in bytes to the corresponding byte of the previous pixel.
    fn pixel_stride(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Reverse the predictor named in `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Decode(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_len = params.row_bytes();
    let stride = params.pixel_stride();
    let mut out = data.to_vec();
    for row in out.chunks_mut(row_len) {
        for i in stride..row.len() {
            row[i] = row[i].wrapping_add(row[i - stride]);
        }
    }
    Ok(out)
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.row_bytes();
    let stride = params.pixel_stride();
    if data.len() % (row_len + 1) != 0 {
        log::warn!(
            "Predictor data length {} is not a multiple of row size {}, truncating",
            data.len(),
            row_len + 1
        );
    }

    let mut out: Vec<u8> = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];

    for encoded in data.chunks_exact(row_len + 1) {
        let tag = encoded[0];
        let mut row = encoded[1..].to_vec();
        for i in 0..row_len {
            let left = if i >= stride { row[i - stride] } else { 0 };
            let up = prev[i];
            let up_left = if i >= stride { prev[i - stride] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", tag))),
            };
            row[i] = row[i].wrapping_add(predicted);
        }
        out.extend_from_slice(&row);
        prev = row;
    }

    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::dict;

    #[test]
    fn test_params_from_dict() {
        let params = DecodeParams::from_dict(&dict([
            ("Predictor", Object::Integer(12)),
            ("Columns", Object::Integer(5)),
        ]));
        assert_eq!(params.predictor, 12);
        assert_eq!(params.columns, 5);
        assert_eq!(params.colors, 1);
        assert_eq!(params.row_bytes(), 5);
    }

    #[test]
    fn test_png_up_rows() {
        let params = DecodeParams {
            predictor: 12,
            columns: 4,
            ..Default::default()
        };
        let encoded = [2, 1, 0, 0, 10, 2, 0, 0, 1, 5];
        assert_eq!(
            decode_predictor(&encoded, &params).unwrap(),
            vec![1, 0, 0, 10, 1, 0, 1, 15]
        );
    }

    #[test]
    fn test_png_sub_and_paeth() {
        let params = DecodeParams {
            predictor: 15,
            columns: 3,
            ..Default::default()
        };
        // Row 0 Sub: 5, 5+1, 6+1. Row 1 Paeth over row 0.
        let encoded = [1, 5, 1, 1, 4, 0, 0, 0];
        assert_eq!(decode_predictor(&encoded, &params).unwrap(), vec![5, 6, 7, 5, 6, 7]);
    }

    #[test]
    fn test_tiff_predictor() {
        let params = DecodeParams {
            predictor: 2,
            columns: 3,
            ..Default::default()
        };
        assert_eq!(decode_predictor(&[1, 1, 1], &params).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_invalid_tag() {
        let params = DecodeParams {
            predictor: 15,
            columns: 1,
            ..Default::default()
        };
        assert!(decode_predictor(&[9, 0], &params).is_err());
    }

    #[test]
    fn test_unknown_predictor() {
        let params = DecodeParams {
            predictor: 7,
            ..Default::default()
        };
        assert!(decode_predictor(b"x", &params).is_err());
    }
}
