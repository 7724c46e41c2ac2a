//! PDF writing.
//!
//! ```text
//! Document
//!     ↓
//! [PdfWriter] (header, objects, xref table, trailer)
//!     ↓
//! [ObjectSerializer] (object syntax)
//!     ↓
//! PDF bytes
//! ```
//!
//! Generated pages are assembled from a [`ContentStreamBuilder`] and an image
//! XObject built by [`JpegImage`].

mod content_stream;
mod image_handler;
mod object_serializer;
mod pdf_writer;

pub use content_stream::{ContentStreamBuilder, ContentStreamOp};
pub use image_handler::{JpegImage, JPEG_QUALITY, SUPPORTED_FORMATS};
pub use object_serializer::{format_number, format_real, ObjectSerializer};
pub use pdf_writer::{serialize, PdfWriter};
