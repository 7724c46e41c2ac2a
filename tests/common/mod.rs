//! In-memory PDF fixtures shared by the integration tests.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_splice::object::{Dictionary, Object};
use pdf_splice::Document;
use std::collections::BTreeMap;
use std::io::Write;

/// Assembles a PDF file with a correct classic cross-reference table.
#[derive(Debug, Default)]
pub struct PdfBuilder {
    objects: BTreeMap<u32, Vec<u8>>,
    trailer_extra: String,
    version: String,
    root: u32,
    info: Option<u32>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            version: "1.4".to_string(),
            root: 1,
            ..Default::default()
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn root(mut self, number: u32) -> Self {
        self.root = number;
        self
    }

    pub fn info(mut self, number: u32) -> Self {
        self.info = Some(number);
        self
    }

    pub fn trailer_entry(mut self, entry: &str) -> Self {
        self.trailer_extra.push(' ');
        self.trailer_extra.push_str(entry);
        self
    }

    /// Add `number 0 obj <body> endobj`.
    pub fn object(mut self, number: u32, body: &str) -> Self {
        self.objects.insert(number, body.as_bytes().to_vec());
        self
    }

    /// Add a stream object; `/Length` is filled in.
    pub fn stream(mut self, number: u32, dict_entries: &str, data: &[u8]) -> Self {
        let mut body = format!("<< {} /Length {} >>\nstream\n", dict_entries, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.insert(number, body);
        self
    }

    /// Add a Flate-compressed stream object.
    pub fn flate_stream(self, number: u32, dict_entries: &str, plain: &[u8]) -> Self {
        let compressed = zlib(plain);
        let entries = format!("{} /Filter /FlateDecode", dict_entries);
        self.stream(number, &entries, &compressed)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = format!("%PDF-{}\n%\u{e2}\u{e3}\u{cf}\u{d3}\n", self.version).into_bytes();
        let mut offsets = BTreeMap::new();
        for (number, body) in &self.objects {
            offsets.insert(*number, out.len());
            out.extend_from_slice(format!("{} 0 obj\n", number).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let size = self.objects.keys().next_back().map_or(1, |n| n + 1);
        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for number in 1..size {
            match offsets.get(&number) {
                Some(offset) => out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes()),
                None => out.extend_from_slice(b"0000000000 00001 f \n"),
            }
        }

        let info = self.info.map(|n| format!(" /Info {} 0 R", n)).unwrap_or_default();
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root {} 0 R{}{} >>\nstartxref\n{}\n%%EOF\n",
                size, self.root, info, self.trailer_extra, xref_offset
            )
            .as_bytes(),
        );
        out
    }
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Content stream that identifies a page by `label`.
pub fn label_content(label: &str) -> Vec<u8> {
    format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", label).into_bytes()
}

/// A document whose pages are labelled `{prefix}0`, `{prefix}1`, ... and
/// share one font through the page tree root's `/Resources`.
///
/// Objects: 1 catalog, 2 page tree, 3 font, 4 info, then a page and its
/// content stream per page.
pub fn labelled_pdf(prefix: &str, pages: usize) -> Vec<u8> {
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", 10 + 2 * i)).collect();
    let mut builder = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} /Resources << /Font << /F1 3 0 R >> >> /MediaBox [0 0 612 792] >>",
                kids.join(" "),
                pages
            ),
        )
        .object(3, &format!("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Name /{}Font >>", prefix))
        .object(4, &format!("<< /Title ({}) /Producer (fixture) >>", prefix))
        .info(4);
    for i in 0..pages {
        let page = 10 + 2 * i as u32;
        builder = builder
            .object(page, &format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", page + 1))
            .stream(page + 1, "", &label_content(&format!("{}{}", prefix, i)));
    }
    builder.build()
}

/// One page with its own font, not shared with anything.
pub fn single_font_pdf(font: &str) -> Vec<u8> {
    PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>",
        )
        .stream(4, "", &label_content(font))
        .object(5, &format!("<< /Type /Font /Subtype /Type1 /BaseFont /{} >>", font))
        .build()
}

/// Decoded content of the page at `index`, as text.
pub fn page_label(doc: &Document, index: usize) -> String {
    let page = doc.page(index).unwrap();
    let contents = doc.resolve(page.reference).get("Contents").cloned().unwrap();
    match doc.deref(&contents) {
        Object::Stream { decoded: Some(bytes), .. } => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            let start = text.find('(').unwrap() + 1;
            let end = text[start..].find(')').unwrap() + start;
            text[start..end].to_string()
        },
        other => panic!("unexpected contents {:?}", other),
    }
}

/// Labels of every page, in order.
pub fn page_labels(doc: &Document) -> Vec<String> {
    (0..doc.page_count().unwrap()).map(|i| page_label(doc, i)).collect()
}

/// Number of `/Type /Font` dictionaries in `doc`.
pub fn font_count(doc: &Document) -> usize {
    doc.objects()
        .filter(|(_, obj)| obj.type_key() == Some("Font"))
        .count()
}

/// `obj` with every reference replaced by its target, so objects from
/// different documents compare by content. `/Parent` and `/Length` are left
/// out; a stream becomes `[dict, (raw bytes)]`.
pub fn inlined(doc: &Document, obj: &Object) -> Object {
    fn walk(doc: &Document, obj: &Object, depth: usize) -> Object {
        let strip = |dict: &Dictionary| -> Dictionary {
            dict.iter()
                .filter(|(key, _)| !matches!(key.as_str(), "Parent" | "Length"))
                .map(|(key, value)| (key.clone(), walk(doc, value, depth + 1)))
                .collect()
        };
        assert!(depth < 32, "object graph too deep to inline");
        match obj {
            Object::Reference(r) => walk(doc, doc.resolve(*r), depth + 1),
            Object::Array(items) => Object::Array(items.iter().map(|o| walk(doc, o, depth + 1)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(strip(dict)),
            Object::Stream { dict, data, .. } => {
                Object::Array(vec![Object::Dictionary(strip(dict)), Object::String(data.to_vec())])
            },
            other => other.clone(),
        }
    }
    walk(doc, obj, 0)
}

/// `/` followed by every byte of `name` as a `#xx` escape.
pub fn escaped_name(name: &[u8]) -> String {
    name.iter().fold("/".to_string(), |out, b| out + &format!("#{:02X}", b))
}

/// Literal string with every byte written as an octal escape.
pub fn octal_string(data: &[u8]) -> String {
    let body: String = data.iter().map(|b| format!("\\{:03o}", b)).collect();
    format!("({})", body)
}

/// Real as PDF text, always with a decimal point.
pub fn real_text(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') {
        text
    } else {
        text + ".0"
    }
}
