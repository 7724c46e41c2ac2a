//! Page rendering hook.
//!
//! The engine does not interpret content streams. Preview thumbnails come
//! from an external renderer plugged in through [`PageRasterizer`].

use crate::document::Document;
use crate::error::{Error, Result};

/// Scale used for preview thumbnails.
pub const DEFAULT_THUMBNAIL_SCALE: f32 = 0.5;

/// An RGBA8 bitmap, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// `width * height * 4` bytes
    pub rgba: Vec<u8>,
}

/// Something that can render one page of a document.
pub trait PageRasterizer {
    /// Render page `page_index` at `scale` (1.0 = one pixel per point).
    fn render(&self, doc: &Document, page_index: usize, scale: f32) -> Result<Bitmap>;
}

fn check_scale(scale: f32) -> Result<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(Error::Configuration(format!("render scale must be positive, got {}", scale)))
    }
}

/// Render a single page after checking the index and scale.
pub fn render_page<R: PageRasterizer + ?Sized>(
    doc: &Document,
    rasterizer: &R,
    page_index: usize,
    scale: f32,
) -> Result<Bitmap> {
    check_scale(scale)?;
    doc.page(page_index)?;
    rasterizer.render(doc, page_index, scale)
}

/// Render every page of `doc`, in page order.
pub fn render_thumbnails<R: PageRasterizer + ?Sized>(
    doc: &Document,
    rasterizer: &R,
    scale: f32,
) -> Result<Vec<Bitmap>> {
    check_scale(scale)?;
    let count = doc.page_count()?;
    log::debug!("Rendering {} thumbnails at scale {}", count, scale);
    (0..count)
        .map(|index| rasterizer.render(doc, index, scale))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CopyError;
    use crate::object::{dict, name, Object};
    use std::cell::RefCell;

    /// Paints every page a flat grey at the page's scaled MediaBox size.
    struct FlatRasterizer {
        calls: RefCell<Vec<usize>>,
    }

    impl PageRasterizer for FlatRasterizer {
        fn render(&self, doc: &Document, page_index: usize, scale: f32) -> Result<Bitmap> {
            self.calls.borrow_mut().push(page_index);
            let page = doc.page(page_index)?;
            let [x0, y0, x1, y1] = page.media_box_rect(doc).unwrap_or([0.0, 0.0, 612.0, 792.0]);
            let width = ((x1 - x0) * f64::from(scale)).round() as u32;
            let height = ((y1 - y0) * f64::from(scale)).round() as u32;
            Ok(Bitmap {
                width,
                height,
                rgba: vec![128; (width * height * 4) as usize],
            })
        }
    }

    fn two_page_doc() -> Document {
        let mut doc = Document::new();
        for _ in 0..2 {
            let page = dict([
                ("Type", name("Page")),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(100),
                        Object::Integer(200),
                    ]),
                ),
            ]);
            let r = doc.add_object(Object::Dictionary(page)).unwrap();
            doc.append_page(r).unwrap();
        }
        doc
    }

    #[test]
    fn test_thumbnails_follow_page_order() {
        let doc = two_page_doc();
        let rasterizer = FlatRasterizer {
            calls: RefCell::new(Vec::new()),
        };
        let thumbs = render_thumbnails(&doc, &rasterizer, DEFAULT_THUMBNAIL_SCALE).unwrap();
        assert_eq!(thumbs.len(), 2);
        assert_eq!((thumbs[0].width, thumbs[0].height), (50, 100));
        assert_eq!(*rasterizer.calls.borrow(), vec![0, 1]);
    }

    #[test]
    fn test_render_page_checks_index_and_scale() {
        let doc = two_page_doc();
        let rasterizer = FlatRasterizer {
            calls: RefCell::new(Vec::new()),
        };
        assert!(matches!(
            render_page(&doc, &rasterizer, 2, 1.0),
            Err(Error::Copy(CopyError::IndexOutOfRange { index: 2, page_count: 2 }))
        ));
        assert!(matches!(
            render_page(&doc, &rasterizer, 0, 0.0),
            Err(Error::Configuration(_))
        ));
        assert!(render_thumbnails(&doc, &rasterizer, f32::NAN).is_err());
        assert!(rasterizer.calls.borrow().is_empty());
    }
}
