//! PDF document model.
//!
//! A [`Document`] owns every indirect object of one PDF, keyed by object
//! number, plus the catalog and optional `/Info` references. Parsed documents
//! are loaded eagerly: the cross-reference index is read, every in-use object
//! (including object stream members) is parsed, and Flate streams are decoded.
//! Destination documents start empty via [`Document::new`] and are filled by
//! the copier and the image pipeline through the builder methods.

use crate::config::EngineConfig;
use crate::decoders::decode_stream;
use crate::error::{CopyError, Error, Result};
use crate::object::{dict, filter_names, name, Dictionary, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::page_tree::{collect_pages, tree_node_ids, PageHandle};
use crate::parser::{parse_indirect_object, ObjectParser};
use crate::xref::{self, CrossRefTable, XRefEntry};
use bytes::Bytes;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// The header must start within this many bytes of the beginning of the file.
const HEADER_SEARCH_WINDOW: usize = 1024;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

static NULL: Object = Object::Null;

/// Process-unique identity of a [`Document`], used to key copy identity maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// In-memory PDF object graph.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    version: (u8, u8),
    /// Object number -> (generation, object)
    objects: BTreeMap<u32, (u16, Object)>,
    root: ObjectRef,
    info: Option<ObjectRef>,
    next_number: u32,
    max_traversal_depth: usize,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `bytes` with the default configuration.
///
/// ```
/// let bytes = b"%PDF-1.4
/// 1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
/// 2 0 obj << /Type /Pages /Kids [] /Count 0 >> endobj
/// trailer << /Root 1 0 R >>";
/// let doc = pdf_splice::document::parse(bytes).unwrap();
/// assert_eq!(doc.page_count().unwrap(), 0);
/// ```
pub fn parse(bytes: &[u8]) -> Result<Document> {
    Document::parse(bytes, &EngineConfig::default())
}

impl Document {
    /// Empty destination document: a catalog and an empty page tree.
    pub fn new() -> Self {
        let mut doc = Document {
            id: DocumentId::next(),
            version: (1, 7),
            objects: BTreeMap::new(),
            root: ObjectRef::new(1, 0),
            info: None,
            next_number: 1,
            max_traversal_depth: crate::config::DEFAULT_MAX_TRAVERSAL_DEPTH,
        };
        let catalog = doc.allocate();
        let pages = doc.allocate();
        doc.objects.insert(
            catalog.id,
            (0, Object::Dictionary(dict([("Type", name("Catalog")), ("Pages", pages.into())]))),
        );
        doc.objects.insert(
            pages.id,
            (
                0,
                Object::Dictionary(dict([
                    ("Type", name("Pages")),
                    ("Kids", Object::Array(Vec::new())),
                    ("Count", Object::Integer(0)),
                ])),
            ),
        );
        doc.root = catalog;
        doc
    }

    /// Parse a complete PDF file.
    ///
    /// Fails with `UnsupportedDocument` for encrypted files and with
    /// `MalformedDocument` when the header is missing, the catalog cannot be
    /// resolved, the page tree is cyclic or too deep, or (with
    /// `strict_references`) an object refers to an undefined object.
    pub fn parse(bytes: &[u8], config: &EngineConfig) -> Result<Self> {
        let (start, version) = parse_header(bytes)?;
        // Offsets in the file are relative to the header
        let data = &bytes[start..];

        let mut table = xref::load(data)?;
        reject_encrypted(table.trailer())?;

        let mut objects = match load_objects(data, &table, config) {
            Ok(objects) => objects,
            Err(e) if !table.is_reconstructed() => {
                log::warn!("Object load failed ({}), rebuilding cross-reference index", e);
                table = xref::reconstruct(data)?;
                reject_encrypted(table.trailer())?;
                load_objects(data, &table, config)?
            },
            Err(e) => return Err(e),
        };
        populate_decoded(&mut objects);

        let trailer = table.trailer();
        let root = trailer
            .get("Root")
            .and_then(Object::as_reference)
            .filter(|r| matches!(objects.get(&r.id), Some((_, Object::Dictionary(_)))))
            .ok_or_else(|| Error::MalformedDocument("trailer /Root is unresolvable".to_string()))?;
        let info = match trailer.get("Info").and_then(Object::as_reference) {
            Some(r) if matches!(objects.get(&r.id), Some((_, Object::Dictionary(_)))) => Some(r),
            Some(r) => {
                log::warn!("Ignoring unresolvable /Info {}", r);
                None
            },
            None => None,
        };

        if config.strict_references {
            check_references(&objects)?;
        }

        let next_number = objects.keys().next_back().map_or(1, |n| n + 1);
        let doc = Document {
            id: DocumentId::next(),
            version,
            objects,
            root,
            info,
            next_number,
            max_traversal_depth: config.max_traversal_depth,
        };

        // Validates the page tree (cycles, depth, unresolvable root)
        let page_count = doc.page_count()?;
        log::debug!(
            "Parsed PDF {}.{}: {} objects, {} pages",
            version.0,
            version.1,
            doc.objects.len(),
            page_count
        );
        Ok(doc)
    }

    /// Identity of this document.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// PDF version from the header (`(1, 7)` for new documents).
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Reference to the catalog.
    pub fn catalog_ref(&self) -> ObjectRef {
        self.root
    }

    /// The catalog dictionary.
    pub fn catalog(&self) -> Result<&Dictionary> {
        self.resolve(self.root)
            .as_dict()
            .ok_or_else(|| Error::MalformedDocument("catalog is not a dictionary".to_string()))
    }

    /// Reference to the `/Info` dictionary, if any.
    pub fn info_ref(&self) -> Option<ObjectRef> {
        self.info
    }

    /// The `/Info` dictionary, if any.
    pub fn trailer_info(&self) -> Option<&Dictionary> {
        self.info.and_then(|r| self.resolve(r).as_dict())
    }

    /// Object stored under `number`.
    pub fn get(&self, number: u32) -> Option<&Object> {
        self.objects.get(&number).map(|(_, obj)| obj)
    }

    /// Mutable access to the object stored under `number`.
    pub fn get_mut(&mut self, number: u32) -> Option<&mut Object> {
        self.objects.get_mut(&number).map(|(_, obj)| obj)
    }

    /// Follow one level of indirection. Missing objects resolve to `Null`.
    pub fn resolve(&self, r: ObjectRef) -> &Object {
        self.get(r.id).unwrap_or(&NULL)
    }

    /// Resolve `obj` if it is a reference, otherwise return it unchanged.
    pub fn deref<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(r) => self.resolve(*r),
            other => other,
        }
    }

    /// Every object with its reference, in ascending object number.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectRef, &Object)> + '_ {
        self.objects
            .iter()
            .map(|(number, (gen, obj))| (ObjectRef::new(*number, *gen), obj))
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Highest object number in use (0 for an empty store).
    pub fn max_object_number(&self) -> u32 {
        self.objects.keys().next_back().copied().unwrap_or(0)
    }

    /// Root node of the page tree.
    pub fn pages_root(&self) -> Result<ObjectRef> {
        self.catalog()?
            .get("Pages")
            .and_then(Object::as_reference)
            .filter(|r| self.resolve(*r).as_dict().is_some())
            .ok_or_else(|| Error::MalformedDocument("catalog /Pages is unresolvable".to_string()))
    }

    /// Pages in pre-order, with inherited attributes resolved.
    pub fn pages(&self) -> Result<Vec<PageHandle>> {
        collect_pages(self, self.max_traversal_depth)
    }

    /// Object numbers of all page tree nodes, leaves and intermediate nodes.
    pub fn page_tree_nodes(&self) -> Result<HashSet<u32>> {
        tree_node_ids(self, self.max_traversal_depth)
    }

    /// Number of pages.
    pub fn page_count(&self) -> Result<usize> {
        Ok(self.pages()?.len())
    }

    /// Page at `index`.
    pub fn page(&self, index: usize) -> Result<PageHandle> {
        let mut pages = self.pages()?;
        let page_count = pages.len();
        if index >= page_count {
            return Err(CopyError::IndexOutOfRange { index, page_count }.into());
        }
        Ok(pages.swap_remove(index))
    }

    /// Set the page tree depth limit used by [`Document::pages`].
    pub fn set_max_traversal_depth(&mut self, depth: usize) {
        self.max_traversal_depth = depth;
    }

    /// Reserve the next free object number.
    pub fn allocate(&mut self) -> ObjectRef {
        let r = ObjectRef::new(self.next_number, 0);
        self.next_number += 1;
        r
    }

    /// Store `obj` under a previously allocated number.
    ///
    /// Storing into an occupied number is an object number collision.
    pub fn insert(&mut self, r: ObjectRef, obj: Object) -> Result<()> {
        if r.id == 0 {
            return Err(Error::Serialization("object number 0 is reserved".to_string()));
        }
        if self.objects.contains_key(&r.id) {
            return Err(Error::Serialization(format!("object number {} already in use", r.id)));
        }
        self.objects.insert(r.id, (r.gen, obj));
        self.next_number = self.next_number.max(r.id + 1);
        Ok(())
    }

    /// Allocate a number and store `obj` under it.
    pub fn add_object(&mut self, obj: Object) -> Result<ObjectRef> {
        let r = self.allocate();
        self.insert(r, obj)?;
        Ok(r)
    }

    /// Append an already inserted page dictionary to the end of the page tree.
    pub fn append_page(&mut self, page: ObjectRef) -> Result<()> {
        let pages_root = self.pages_root()?;
        match self.get_mut(page.id).and_then(Object::as_dict_mut) {
            Some(dict) => {
                dict.insert("Parent".to_string(), pages_root.into());
            },
            None => {
                return Err(Error::Serialization(format!("page {} is not a stored dictionary", page)))
            },
        }
        let root = self
            .get_mut(pages_root.id)
            .and_then(Object::as_dict_mut)
            .ok_or_else(|| Error::MalformedDocument("page tree root is not a dictionary".to_string()))?;
        match root.get_mut("Kids") {
            Some(Object::Array(kids)) => kids.push(page.into()),
            _ => {
                root.insert("Kids".to_string(), Object::Array(vec![page.into()]));
            },
        }
        let count = root.get("Count").and_then(Object::as_integer).unwrap_or(0);
        root.insert("Count".to_string(), Object::Integer(count + 1));
        Ok(())
    }

    /// Store `info` as the document information dictionary.
    pub fn set_info(&mut self, info: Dictionary) -> Result<ObjectRef> {
        let r = self.add_object(Object::Dictionary(info))?;
        self.info = Some(r);
        Ok(r)
    }
}

/// Locate `%PDF-M.m` within the first kilobyte. Returns the header offset and
/// version.
pub fn parse_header(bytes: &[u8]) -> Result<(usize, (u8, u8))> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    let magic = b"%PDF-";
    let start = window
        .windows(magic.len())
        .position(|w| w == magic)
        .ok_or_else(|| Error::MalformedDocument("missing %PDF- header".to_string()))?;

    let version = &bytes[start + magic.len()..];
    match version {
        [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9', ..] => {
            Ok((start, (major - b'0', minor - b'0')))
        },
        _ => Err(Error::MalformedDocument("invalid version in %PDF- header".to_string())),
    }
}

fn reject_encrypted(trailer: &Dictionary) -> Result<()> {
    if trailer.contains_key("Encrypt") {
        return Err(Error::UnsupportedDocument("document is encrypted".to_string()));
    }
    Ok(())
}

fn load_objects(
    data: &[u8],
    table: &CrossRefTable,
    config: &EngineConfig,
) -> Result<BTreeMap<u32, (u16, Object)>> {
    let lenient = table.is_reconstructed();
    let lengths = |r: ObjectRef| -> Option<usize> {
        match table.get(r.id)? {
            XRefEntry::Uncompressed { offset, .. } => {
                let input = data.get(*offset..)?;
                let (_, (_, obj)) = parse_indirect_object(&ObjectParser::default(), input).ok()?;
                usize::try_from(obj.as_integer()?).ok()
            },
            _ => None,
        }
    };
    let parser = ObjectParser::new(config.max_nesting).with_length_resolver(&lengths);

    let mut objects = BTreeMap::new();
    let mut compressed: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();

    for (number, entry) in table.iter() {
        match entry {
            XRefEntry::Free { .. } => {},
            XRefEntry::Uncompressed { .. } if number == 0 => {},
            XRefEntry::Uncompressed { offset, generation } => {
                match load_at(data, offset, number, &parser, config.max_nesting) {
                    Ok(obj) => {
                        objects.insert(number, (generation, obj));
                    },
                    Err(e) if lenient => log::warn!("Skipping object {}: {}", number, e),
                    Err(e) => return Err(e),
                }
            },
            XRefEntry::Compressed { stream, index } => {
                compressed.entry(stream).or_default().push((number, index));
            },
        }
    }

    let member_parser = ObjectParser::new(config.max_nesting);
    for (stream_number, wanted) in compressed {
        let members = match objects.get(&stream_number) {
            Some((_, stream)) => parse_object_stream(stream, &member_parser),
            None => Err(Error::MalformedDocument(format!(
                "object stream {} is missing",
                stream_number
            ))),
        };
        let members = match members {
            Ok(members) => members,
            Err(e) if lenient => {
                log::warn!("Skipping object stream {}: {}", stream_number, e);
                continue;
            },
            Err(e) => return Err(e),
        };
        for (number, index) in wanted {
            let found = members
                .get(index as usize)
                .filter(|(n, _)| *n == number)
                .or_else(|| members.iter().find(|(n, _)| *n == number));
            match found {
                Some((_, obj)) => {
                    objects.insert(number, (0, obj.clone()));
                },
                None => log::warn!("Object {} not found in object stream {}", number, stream_number),
            }
        }
    }

    if lenient {
        expand_unlisted_members(&mut objects, &member_parser);
    }

    // Containers are an artefact of the file layout, not document content
    objects.retain(|_, (_, obj)| !matches!(obj.type_key(), Some("XRef") | Some("ObjStm")));
    Ok(objects)
}

fn load_at(
    data: &[u8],
    offset: usize,
    number: u32,
    parser: &ObjectParser<'_>,
    max_nesting: usize,
) -> Result<Object> {
    let input = data
        .get(offset..)
        .ok_or_else(|| Error::parse(offset, format!("object {} offset beyond end of file", number)))?;
    match parse_indirect_object(parser, input) {
        Ok((_, (r, obj))) if r.id == number => Ok(obj),
        Ok((_, (r, _))) => Err(Error::parse(
            offset,
            format!("expected object {} but found {}", number, r.id),
        )),
        Err(nom::Err::Failure(_)) => Err(Error::parse(
            offset,
            format!("object {} nests deeper than {}", number, max_nesting),
        )),
        Err(_) => Err(Error::parse(offset, format!("object {} is not a valid indirect object", number))),
    }
}

/// Without a usable index, objects living in object streams are only found by
/// opening every object stream.
fn expand_unlisted_members(objects: &mut BTreeMap<u32, (u16, Object)>, parser: &ObjectParser<'_>) {
    let streams: Vec<u32> = objects
        .iter()
        .filter(|(_, (_, obj))| obj.type_key() == Some("ObjStm"))
        .map(|(n, _)| *n)
        .collect();
    for number in streams {
        let members = match objects.get(&number).map(|(_, s)| parse_object_stream(s, parser)) {
            Some(Ok(members)) => members,
            Some(Err(e)) => {
                log::warn!("Skipping object stream {}: {}", number, e);
                continue;
            },
            None => continue,
        };
        for (member, obj) in members {
            objects.entry(member).or_insert((0, obj));
        }
    }
}

/// Fill `decoded` for unfiltered and Flate-only streams.
fn populate_decoded(objects: &mut BTreeMap<u32, (u16, Object)>) {
    let decoded: Vec<(u32, Bytes)> = objects
        .iter()
        .filter_map(|(number, (_, obj))| {
            let Object::Stream { dict, data, .. } = obj else {
                return None;
            };
            if filter_names(dict).is_empty() {
                return Some((*number, data.clone()));
            }
            let dict = direct_decode_params(dict, objects);
            match decode_stream(&dict, data) {
                Ok(Some(bytes)) => Some((*number, Bytes::from(bytes))),
                Ok(None) => None,
                Err(e) => {
                    log::warn!("Keeping stream {} as opaque bytes: {}", number, e);
                    None
                },
            }
        })
        .collect();

    for (number, bytes) in decoded {
        if let Some((_, Object::Stream { decoded, .. })) = objects.get_mut(&number) {
            *decoded = Some(bytes);
        }
    }
}

fn direct_decode_params<'a>(
    dict: &'a Dictionary,
    objects: &BTreeMap<u32, (u16, Object)>,
) -> Cow<'a, Dictionary> {
    match dict.get("DecodeParms") {
        Some(Object::Reference(r)) => {
            let mut owned = dict.clone();
            let params = objects.get(&r.id).map_or(Object::Null, |(_, o)| o.clone());
            owned.insert("DecodeParms".to_string(), params);
            Cow::Owned(owned)
        },
        _ => Cow::Borrowed(dict),
    }
}

fn check_references(objects: &BTreeMap<u32, (u16, Object)>) -> Result<()> {
    for (number, (_, obj)) in objects {
        if let Some(missing) = obj.references().into_iter().find(|r| !objects.contains_key(&r.id)) {
            return Err(Error::MalformedDocument(format!(
                "object {} references undefined object {}",
                number, missing
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &[u8] = b"%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >> endobj
trailer << /Root 1 0 R >>
";

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header(b"%PDF-1.7\n").unwrap(), (0, (1, 7)));
        assert_eq!(parse_header(b"junk\n%PDF-2.0\n").unwrap(), (5, (2, 0)));
        assert!(matches!(parse_header(b"hello"), Err(Error::MalformedDocument(_))));
        assert!(parse_header(b"%PDF-x.y").is_err());
    }

    #[test]
    fn test_header_beyond_window() {
        let mut bytes = vec![b' '; 2000];
        bytes.extend_from_slice(b"%PDF-1.4\n");
        assert!(parse_header(&bytes).is_err());
    }

    #[test]
    fn test_parse_without_xref_rebuilds_index() {
        let doc = parse(MINIMAL).unwrap();
        assert_eq!(doc.version(), (1, 4));
        assert_eq!(doc.page_count().unwrap(), 1);
        assert_eq!(doc.catalog_ref(), ObjectRef::new(1, 0));
    }

    #[test]
    fn test_encrypted_is_unsupported() {
        let bytes = b"%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [] /Count 0 >> endobj
4 0 obj << /Filter /Standard >> endobj
trailer << /Root 1 0 R /Encrypt 4 0 R >>
";
        assert!(matches!(parse(bytes), Err(Error::UnsupportedDocument(_))));
    }

    #[test]
    fn test_dangling_reference_strict_and_lenient() {
        let bytes = b"%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R /Outlines 9 0 R >> endobj
2 0 obj << /Type /Pages /Kids [] /Count 0 >> endobj
trailer << /Root 1 0 R >>
";
        assert!(matches!(parse(bytes), Err(Error::MalformedDocument(_))));

        let lenient = EngineConfig::default().with_strict_references(false);
        let doc = Document::parse(bytes, &lenient).unwrap();
        assert!(doc.resolve(ObjectRef::new(9, 0)).is_null());
    }

    #[test]
    fn test_missing_root_is_malformed() {
        let bytes = b"%PDF-1.4\n1 0 obj << /Type /Pages /Kids [] >> endobj\ntrailer << /Size 2 >>\n";
        assert!(matches!(parse(bytes), Err(Error::MalformedDocument(_))));
    }

    #[test]
    fn test_new_document_builder() {
        let mut doc = Document::new();
        assert_eq!(doc.page_count().unwrap(), 0);

        let page = doc
            .add_object(Object::Dictionary(dict([("Type", name("Page"))])))
            .unwrap();
        doc.append_page(page).unwrap();
        assert_eq!(doc.page_count().unwrap(), 1);
        assert_eq!(doc.resolve(page).get("Parent"), Some(&Object::Reference(doc.pages_root().unwrap())));

        let info = doc.set_info(dict([("Producer", Object::String(b"test".to_vec()))])).unwrap();
        assert_eq!(doc.info_ref(), Some(info));
    }

    #[test]
    fn test_insert_collision() {
        let mut doc = Document::new();
        let r = doc.allocate();
        doc.insert(r, Object::Null).unwrap();
        assert!(matches!(doc.insert(r, Object::Null), Err(Error::Serialization(_))));
        assert!(doc.insert(ObjectRef::new(0, 0), Object::Null).is_err());
    }

    #[test]
    fn test_document_ids_are_unique() {
        assert_ne!(Document::new().id(), Document::new().id());
    }

    #[test]
    fn test_page_index_out_of_range() {
        let doc = parse(MINIMAL).unwrap();
        assert!(doc.page(0).is_ok());
        assert!(matches!(
            doc.page(1),
            Err(Error::Copy(CopyError::IndexOutOfRange {
                index: 1,
                page_count: 1
            }))
        ));
    }

    #[test]
    fn test_flate_stream_decoded_on_load() {
        let body = crate::decoders::compress(b"0 0 m 10 10 l S").unwrap();
        let mut bytes = b"%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [] /Count 0 >> endobj
"
        .to_vec();
        bytes.extend_from_slice(
            format!("3 0 obj << /Length {} /Filter /FlateDecode >>\nstream\n", body.len()).as_bytes(),
        );
        bytes.extend_from_slice(&body);
        bytes.extend_from_slice(b"\nendstream\nendobj\ntrailer << /Root 1 0 R >>\n");

        let doc = parse(&bytes).unwrap();
        match doc.get(3) {
            Some(Object::Stream { data, decoded, .. }) => {
                assert_eq!(&data[..], &body[..]);
                assert_eq!(decoded.as_deref(), Some(&b"0 0 m 10 10 l S"[..]));
            },
            other => panic!("expected stream, got {:?}", other),
        }
    }
}
