//! Page geometry for generated pages.
//!
//! A [`LayoutConfiguration`] picks a paper size, an orientation and a margin
//! preset; [`LayoutConfiguration::page_box`] resolves it to point dimensions
//! and the usable content rectangle.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::str::FromStr;

/// Points per millimetre (1 in = 25.4 mm = 72 pt).
pub const PT_PER_MM: f64 = 72.0 / 25.4;

/// Convert millimetres to points.
pub fn mm_to_pt(mm: f64) -> f64 {
    mm * PT_PER_MM
}

/// Paper sizes accepted by the image pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// 297 x 420 mm
    A3,
    /// 210 x 297 mm
    #[default]
    A4,
    /// 148 x 210 mm
    A5,
    /// 8.5 x 11 in
    Letter,
    /// 8.5 x 14 in
    Legal,
}

impl PageSize {
    /// Portrait width and height in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A4 => (595.28, 841.89),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
        }
    }

    /// Lowercase name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSize::A3 => "a3",
            PageSize::A4 => "a4",
            PageSize::A5 => "a5",
            PageSize::Letter => "letter",
            PageSize::Legal => "legal",
        }
    }
}

impl FromStr for PageSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a3" => Ok(PageSize::A3),
            "a4" => Ok(PageSize::A4),
            "a5" => Ok(PageSize::A5),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            _ => Err(Error::Configuration(format!("unrecognized page size '{}'", s))),
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Height >= width
    #[default]
    Portrait,
    /// Width >= height
    Landscape,
}

impl FromStr for Orientation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" | "p" => Ok(Orientation::Portrait),
            "landscape" | "l" => Ok(Orientation::Landscape),
            _ => Err(Error::Configuration(format!("unrecognized orientation '{}'", s))),
        }
    }
}

/// Margin preset, applied on all four sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Margin {
    /// No margin
    None,
    /// 10 mm
    #[default]
    Small,
    /// 25 mm
    Big,
}

impl Margin {
    /// Margin width in millimetres.
    pub fn millimetres(&self) -> f64 {
        match self {
            Margin::None => 0.0,
            Margin::Small => 10.0,
            Margin::Big => 25.0,
        }
    }

    /// Margin width in points.
    pub fn points(&self) -> f64 {
        mm_to_pt(self.millimetres())
    }
}

impl FromStr for Margin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Margin::None),
            "small" => Ok(Margin::Small),
            "big" => Ok(Margin::Big),
            _ => Err(Error::Configuration(format!("unrecognized margin '{}'", s))),
        }
    }
}

/// Axis-aligned rectangle in PDF user space (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge
    pub x: f64,
    /// Bottom edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

/// Resolved page dimensions plus the area inside the margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    /// Page width in points
    pub width: f64,
    /// Page height in points
    pub height: f64,
    /// Usable area inside the margins
    pub content: Rect,
}

impl PageBox {
    /// Scale a `width` x `height` box uniformly to fit the content area and
    /// centre it on the page.
    ///
    /// Small images are scaled up as well as large ones down. Returns `None`
    /// for degenerate input.
    pub fn fit(&self, width: f64, height: f64) -> Option<Rect> {
        if width <= 0.0 || height <= 0.0 || self.content.width <= 0.0 || self.content.height <= 0.0 {
            return None;
        }
        let scale = (self.content.width / width).min(self.content.height / height);
        let (w, h) = (width * scale, height * scale);
        Some(Rect {
            x: (self.width - w) / 2.0,
            y: (self.height - h) / 2.0,
            width: w,
            height: h,
        })
    }

    /// `/MediaBox` for this page.
    pub fn media_box(&self) -> [f64; 4] {
        [0.0, 0.0, self.width, self.height]
    }
}

/// Page size, orientation and margin shared by every generated page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LayoutConfiguration {
    /// Paper size
    #[serde(default)]
    pub page_size: PageSize,
    /// Orientation
    #[serde(default)]
    pub orientation: Orientation,
    /// Margin preset
    #[serde(default)]
    pub margin: Margin,
}

impl LayoutConfiguration {
    /// Build a layout from its three parts.
    pub fn new(page_size: PageSize, orientation: Orientation, margin: Margin) -> Self {
        Self {
            page_size,
            orientation,
            margin,
        }
    }

    /// Resolve to concrete page dimensions.
    ///
    /// ```
    /// use pdf_splice::layout::{LayoutConfiguration, Margin, Orientation, PageSize};
    ///
    /// let layout = LayoutConfiguration::new(PageSize::A4, Orientation::Landscape, Margin::None);
    /// let page = layout.page_box();
    /// assert_eq!((page.width, page.height), (841.89, 595.28));
    /// ```
    pub fn page_box(&self) -> PageBox {
        let (w, h) = self.page_size.dimensions();
        let (width, height) = match self.orientation {
            Orientation::Portrait => (w.min(h), w.max(h)),
            Orientation::Landscape => (w.max(h), w.min(h)),
        };
        let margin = self.margin.points();
        PageBox {
            width,
            height,
            content: Rect {
                x: margin,
                y: margin,
                width: width - 2.0 * margin,
                height: height - 2.0 * margin,
            },
        }
    }
}
