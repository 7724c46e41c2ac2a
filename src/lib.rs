//! # PDF Splice
//!
//! Page-level PDF engine: parse documents into an object graph, copy page
//! subsets between documents with their full resource closure, and write
//! fresh, self-contained PDF files.
//!
//! ## Operations
//!
//! - **Merge**: concatenate the pages of several documents, in order
//! - **Split**: extract any page sequence (reordering and repeats allowed)
//! - **Image to PDF**: one page per PNG, JPEG or GIF image, rotated in
//!   quarter turns and fitted to a configurable paper size and margin
//!
//! ## Pipeline
//!
//! ```text
//! bytes ──► Parser ──► Document ──► CopySession ──► Document ──► PdfWriter ──► bytes
//!                                      ▲
//! images ──► image_pipeline ───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_splice::{merge, split, EngineConfig, SourceDocument};
//!
//! # fn main() -> pdf_splice::Result<()> {
//! let config = EngineConfig::default();
//! let sources = vec![
//!     SourceDocument::named("a.pdf", std::fs::read("a.pdf")?),
//!     SourceDocument::named("b.pdf", std::fs::read("b.pdf")?),
//! ];
//! let merged = merge(&sources, &config, None)?;
//!
//! // Last page first, then the first page
//! let source = SourceDocument::named("merged.pdf", merged);
//! let picked = split(&source, &[4, 0], &config, None)?;
//! std::fs::write("picked.pdf", picked)?;
//! # Ok(())
//! # }
//! ```
//!
//! Failures that belong to one input carry its display name; see
//! [`Error::source_name`] and [`Error::is_per_source`].

#![warn(missing_docs)]

// Error handling
pub mod error;

// Object model and parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Stream decoding
pub mod decoders;

// Page tree and copying
pub mod cancel;
pub mod copier;
pub mod page_tree;

// Writing
pub mod writer;

// Image pages
pub mod image_pipeline;
pub mod layout;

// Configuration
pub mod config;

// External rendering hook
pub mod rasterizer;

pub use cancel::CancellationFlag;
pub use config::EngineConfig;
pub use copier::{
    copy_pages, merge, merge_parallel, parse_page_ranges, split, CopySession, SourceDocument,
};
pub use document::{parse, Document, DocumentId};
pub use error::{CopyError, Error, Result};
pub use image_pipeline::{embed, images_to_pdf, RasterImage, Rotation};
pub use layout::{LayoutConfiguration, Margin, Orientation, PageSize};
pub use object::{Dictionary, Object, ObjectRef};
pub use page_tree::PageHandle;
pub use rasterizer::{Bitmap, PageRasterizer};
pub use writer::{serialize, PdfWriter};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
