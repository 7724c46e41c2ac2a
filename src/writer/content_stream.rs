//! PDF content stream builder.
//!
//! Generated pages only ever paint images, so the operator set is the small
//! subset needed for that: graphics state save/restore, `cm` and `Do`.

use super::object_serializer::format_real;
use crate::decoders::compress;
use crate::error::Result;
use crate::object::{dict, name, Object};
use std::io::Write;

/// Operations that can be added to a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentStreamOp {
    /// Save graphics state (q)
    SaveState,
    /// Restore graphics state (Q)
    RestoreState,
    /// Concatenate matrix `[a b c d e f]` to the CTM (cm)
    Transform([f64; 6]),
    /// Paint XObject (Do)
    PaintXObject(String),
}

/// Accumulates operators and renders them as content stream bytes.
#[derive(Debug, Default, Clone)]
pub struct ContentStreamBuilder {
    operations: Vec<ContentStreamOp>,
}

impl ContentStreamBuilder {
    /// Create a new content stream builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation to the stream.
    pub fn op(&mut self, op: ContentStreamOp) -> &mut Self {
        self.operations.push(op);
        self
    }

    /// Save graphics state.
    pub fn save_state(&mut self) -> &mut Self {
        self.op(ContentStreamOp::SaveState)
    }

    /// Restore graphics state.
    pub fn restore_state(&mut self) -> &mut Self {
        self.op(ContentStreamOp::RestoreState)
    }

    /// Concatenate a transformation matrix.
    pub fn transform(&mut self, matrix: [f64; 6]) -> &mut Self {
        self.op(ContentStreamOp::Transform(matrix))
    }

    /// Paint a named XObject.
    pub fn paint_xobject(&mut self, resource: &str) -> &mut Self {
        self.op(ContentStreamOp::PaintXObject(resource.to_string()))
    }

    /// Paint an image XObject through `matrix`, isolated in its own
    /// graphics state: `q a b c d e f cm /Im0 Do Q`.
    pub fn draw_image(&mut self, resource: &str, matrix: [f64; 6]) -> &mut Self {
        self.save_state()
            .transform(matrix)
            .paint_xobject(resource)
            .restore_state()
    }

    /// Operations added so far.
    pub fn operations(&self) -> &[ContentStreamOp] {
        &self.operations
    }

    /// Build the content stream to bytes, one operator per line.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        for op in &self.operations {
            write_op(&mut buf, op)?;
            writeln!(buf)?;
        }
        Ok(buf)
    }

    /// Build a Flate-compressed stream object.
    pub fn build_stream(&self) -> Result<Object> {
        let raw = self.build()?;
        let compressed = compress(&raw)?;
        Ok(Object::stream(
            dict([
                ("Length", Object::Integer(compressed.len() as i64)),
                ("Filter", name("FlateDecode")),
            ]),
            compressed,
        ))
    }
}

fn write_op<W: Write>(w: &mut W, op: &ContentStreamOp) -> std::io::Result<()> {
    match op {
        ContentStreamOp::SaveState => write!(w, "q"),
        ContentStreamOp::RestoreState => write!(w, "Q"),
        ContentStreamOp::Transform(m) => {
            for value in m {
                write!(w, "{} ", format_real(*value))?;
            }
            write!(w, "cm")
        },
        ContentStreamOp::PaintXObject(resource) => write!(w, "/{} Do", resource),
    }
}
