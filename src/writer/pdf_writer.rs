//! PDF document writer.
//!
//! Lays out a [`Document`] as a complete, self-contained file: header, every
//! object in ascending object number, a classic cross-reference table with a
//! linked free list, and the trailer.

use super::object_serializer::ObjectSerializer;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{dict, Object};
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::io::Write;

/// Lowest version written in the header.
const MIN_VERSION: (u8, u8) = (1, 7);

/// Binary marker comment following the header.
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Serializes documents to bytes.
#[derive(Debug, Clone, Default)]
pub struct PdfWriter {
    serializer: ObjectSerializer,
}

impl PdfWriter {
    /// Writer with compact object formatting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer that breaks dictionaries over several lines.
    pub fn pretty() -> Self {
        Self {
            serializer: ObjectSerializer::pretty(),
        }
    }

    /// Serialize `doc`.
    ///
    /// Fails with `Error::Serialization` if the catalog or `/Info` is missing
    /// or any object refers to an undefined object number.
    pub fn write(&self, doc: &Document) -> Result<Vec<u8>> {
        check_invariants(doc)?;

        let version = doc.version().max(MIN_VERSION);
        let mut output = Vec::new();
        writeln!(output, "%PDF-{}.{}", version.0, version.1)?;
        output.extend_from_slice(BINARY_MARKER);

        let body_start = output.len();
        let mut offsets: BTreeMap<u32, (usize, u16)> = BTreeMap::new();
        for (r, obj) in doc.objects() {
            offsets.insert(r.id, (output.len(), r.gen));
            self.serializer.write_indirect(&mut output, r.id, r.gen, obj)?;
        }
        let id = Md5::digest(&output[body_start..]).to_vec();

        let size = doc.max_object_number() + 1;
        let xref_start = output.len();
        write_xref(&mut output, size, &offsets)?;

        let mut trailer = dict([
            ("Size", Object::Integer(i64::from(size))),
            ("Root", doc.catalog_ref().into()),
        ]);
        if let Some(info) = doc.info_ref() {
            trailer.insert("Info".to_string(), info.into());
        }
        trailer.insert(
            "ID".to_string(),
            Object::Array(vec![Object::String(id.clone()), Object::String(id)]),
        );
        output.extend_from_slice(b"trailer\n");
        self.serializer
            .write_object(&mut output, &Object::Dictionary(trailer))?;
        write!(output, "\nstartxref\n{}\n%%EOF\n", xref_start)?;

        log::debug!(
            "Serialized {} objects ({} bytes, xref at {})",
            offsets.len(),
            output.len(),
            xref_start
        );
        Ok(output)
    }
}

/// Serialize `doc` with the default writer.
pub fn serialize(doc: &Document) -> Result<Vec<u8>> {
    PdfWriter::new().write(doc)
}

fn check_invariants(doc: &Document) -> Result<()> {
    if doc.get(0).is_some() {
        return Err(Error::Serialization("object number 0 is in use".to_string()));
    }
    if doc.resolve(doc.catalog_ref()).as_dict().is_none() {
        return Err(Error::Serialization(format!(
            "catalog {} is missing",
            doc.catalog_ref()
        )));
    }
    if let Some(info) = doc.info_ref() {
        if doc.get(info.id).is_none() {
            return Err(Error::Serialization(format!("/Info {} is missing", info)));
        }
    }
    for (r, obj) in doc.objects() {
        if let Some(missing) = obj.references().into_iter().find(|m| doc.get(m.id).is_none()) {
            return Err(Error::Serialization(format!(
                "object {} references undefined object {}",
                r, missing
            )));
        }
    }
    Ok(())
}

/// One `0 size` subsection. Unused numbers form the free list headed by
/// entry 0.
fn write_xref<W: Write>(w: &mut W, size: u32, offsets: &BTreeMap<u32, (usize, u16)>) -> Result<()> {
    let free: Vec<u32> = (1..size).filter(|n| !offsets.contains_key(n)).collect();
    let mut next_free = free.iter().copied().chain(std::iter::once(0));

    writeln!(w, "xref")?;
    writeln!(w, "0 {}", size)?;
    writeln!(w, "{:010} 65535 f ", next_free.next().unwrap_or(0))?;
    for number in 1..size {
        match offsets.get(&number) {
            Some((offset, gen)) => writeln!(w, "{:010} {:05} n ", offset, gen)?,
            None => writeln!(w, "{:010} 00001 f ", next_free.next().unwrap_or(0))?,
        }
    }
    Ok(())
}
