//! Image embedding pipeline.
//!
//! Each image goes through the same stages:
//!
//! 1. **Decoded**: the source bytes are decoded (PNG, JPEG or GIF).
//! 2. **Rotated**: for quarter turns the axes are swapped for fitting; the
//!    pixels themselves are never rotated.
//! 3. **Fitted**: the (rotated) box is scaled uniformly to the layout's
//!    content rectangle and centred on the page.
//! 4. **Encoded**: the pixels are encoded once as a quality 95 JPEG.
//! 5. **Placed**: a new page paints the image through one `cm` matrix that
//!    applies scale, rotation and position together.
//!
//! Rotation is clockwise, as seen on the page.

use crate::cancel::{self, CancellationFlag};
use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::layout::{LayoutConfiguration, PageBox, Rect};
use crate::object::{dict, name, Object};
use crate::page_tree::PageHandle;
use crate::writer::{serialize, ContentStreamBuilder, JpegImage};

/// Resource name of the image on every generated page.
const IMAGE_RESOURCE: &str = "Im0";

/// Quarter-turn rotation applied when placing an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    /// Upright
    #[default]
    Deg0,
    /// A quarter turn clockwise
    Deg90,
    /// Upside down
    Deg180,
    /// A quarter turn counter-clockwise
    Deg270,
}

impl Rotation {
    /// Parse a rotation in degrees. Only 0, 90, 180 and 270 are accepted.
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(Error::Configuration(format!(
                "rotation must be 0, 90, 180 or 270 degrees, got {}",
                other
            ))),
        }
    }

    /// Rotation in degrees.
    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Whether width and height trade places.
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// One input image.
#[derive(Debug, Clone)]
pub struct RasterImage {
    /// Encoded image (PNG, JPEG or GIF)
    pub bytes: Vec<u8>,
    /// Clockwise rotation in degrees
    pub rotation: i32,
    /// Display name used in error messages
    pub name: Option<String>,
}

impl RasterImage {
    /// Upright, unnamed image.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            rotation: 0,
            name: None,
        }
    }

    /// Set the rotation.
    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation = degrees;
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Where an image lands on its page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Box occupied on the page, after rotation
    pub rect: Rect,
    /// `cm` operands mapping the image unit square onto `rect`
    pub matrix: [f64; 6],
}

/// Fit a `width` x `height` pixel image, rotated by `rotation`, onto `page`.
///
/// ```
/// use pdf_splice::image_pipeline::{place, Rotation};
/// use pdf_splice::layout::{LayoutConfiguration, Margin, Orientation, PageSize};
///
/// let page = LayoutConfiguration::new(PageSize::Letter, Orientation::Portrait, Margin::None).page_box();
/// let placement = place(612, 306, Rotation::Deg0, &page).unwrap();
/// assert_eq!(placement.rect.width, 612.0);
/// assert_eq!(placement.matrix, [612.0, 0.0, 0.0, 306.0, 0.0, 243.0]);
/// ```
pub fn place(width: u32, height: u32, rotation: Rotation, page: &PageBox) -> Result<Placement> {
    let (w, h) = (f64::from(width), f64::from(height));
    let (box_w, box_h) = if rotation.swaps_axes() { (h, w) } else { (w, h) };
    let rect = page
        .fit(box_w, box_h)
        .ok_or_else(|| Error::Image(format!("cannot fit a {}x{} image on the page", width, height)))?;

    let scale = rect.width / box_w;
    let (iw, ih) = (w * scale, h * scale);
    let (x, y) = (rect.x, rect.y);
    let matrix = match rotation {
        Rotation::Deg0 => [iw, 0.0, 0.0, ih, x, y],
        Rotation::Deg90 => [0.0, -iw, ih, 0.0, x, y + iw],
        Rotation::Deg180 => [-iw, 0.0, 0.0, -ih, x + iw, y + ih],
        Rotation::Deg270 => [0.0, iw, -ih, 0.0, x + ih, y],
    };
    Ok(Placement { rect, matrix })
}

/// Append one page per image to `dest`, in input order.
///
/// Every rotation is validated before any image is decoded. Returns handles
/// for the new pages.
pub fn embed(
    images: &[RasterImage],
    layout: &LayoutConfiguration,
    dest: &mut Document,
    cancel: Option<&CancellationFlag>,
) -> Result<Vec<PageHandle>> {
    let rotations = images
        .iter()
        .map(|image| Rotation::from_degrees(image.rotation))
        .collect::<Result<Vec<_>>>()?;

    let page = layout.page_box();
    let first_new = dest.page_count()?;
    for (position, (image, rotation)) in images.iter().zip(rotations).enumerate() {
        cancel::check(cancel)?;
        let label = image
            .name
            .clone()
            .unwrap_or_else(|| format!("image {}", position + 1));
        embed_one(image, rotation, &page, dest).map_err(|e| match e {
            Error::Image(_) => e.with_source_name(label),
            other => other,
        })?;
    }

    log::info!("Embedded {} images as pages", images.len());
    let mut pages = dest.pages()?;
    Ok(pages.split_off(first_new.min(pages.len())))
}

fn embed_one(image: &RasterImage, rotation: Rotation, page: &PageBox, dest: &mut Document) -> Result<()> {
    let encoded = JpegImage::encode(&image.bytes)?;
    let placement = place(encoded.width, encoded.height, rotation, page)?;
    log::debug!(
        "Placing {}x{} image rotated {} at {:?}",
        encoded.width,
        encoded.height,
        rotation.degrees(),
        placement.rect
    );

    let xobject = dest.add_object(encoded.into_xobject())?;
    let contents = dest.add_object(
        ContentStreamBuilder::new()
            .draw_image(IMAGE_RESOURCE, placement.matrix)
            .build_stream()?,
    )?;

    let media_box = page.media_box().iter().map(|v| Object::Real(*v)).collect();
    let page_dict = dict([
        ("Type", name("Page")),
        ("MediaBox", Object::Array(media_box)),
        (
            "Resources",
            Object::Dictionary(dict([
                ("XObject", Object::Dictionary(dict([(IMAGE_RESOURCE, xobject.into())]))),
                ("ProcSet", Object::Array(vec![name("PDF"), name("ImageC")])),
            ])),
        ),
        ("Contents", contents.into()),
    ]);
    let page_ref = dest.add_object(Object::Dictionary(page_dict))?;
    dest.append_page(page_ref)
}

/// Build a complete PDF with one page per image.
pub fn images_to_pdf(
    images: &[RasterImage],
    config: &EngineConfig,
    cancel: Option<&CancellationFlag>,
) -> Result<Vec<u8>> {
    if images.is_empty() {
        return Err(Error::Configuration("no images given".to_string()));
    }
    let mut dest = Document::new();
    embed(images, &config.layout, &mut dest, cancel)?;
    serialize(&dest)
}
