//! Closure copier: page copy, merge and split.
//!
//! Copying a page clones the page dictionary and everything it transitively
//! references (content streams, resources, fonts, nested forms, annotations
//! and their appearance streams) into a destination [`Document`], rewriting
//! references to the destination's object numbers.
//!
//! A [`CopySession`] keeps one identity map keyed by
//! `(source document, source object number)` for the whole invocation, so an
//! object shared by several copied pages is cloned exactly once. Separate
//! sessions never share objects.
//!
//! The page tree itself is never followed: `/Parent` is dropped from copied
//! pages and references into pages outside the copy are removed.

use crate::cancel::{self, CancellationFlag};
use crate::config::EngineConfig;
use crate::document::{Document, DocumentId};
use crate::error::{CopyError, Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::page_tree::PageHandle;
use crate::writer::serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Source object -> destination object, for one invocation.
type IdentityMap = HashMap<(DocumentId, u32), ObjectRef>;

/// Letter, used for pages that carry no `/MediaBox` anywhere in their chain.
const FALLBACK_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// One input to a merge or split.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Display name used in error messages
    pub name: Option<String>,
    /// Raw PDF bytes
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// Unnamed source.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: None,
            bytes: bytes.into(),
        }
    }

    /// Source with a display name.
    pub fn named(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: Some(name.into()),
            bytes: bytes.into(),
        }
    }

    fn display_name(&self, position: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("document {}", position + 1))
    }
}

/// Identity map for one merge or split.
#[derive(Debug, Default)]
pub struct CopySession {
    identity: IdentityMap,
}

impl CopySession {
    /// Session with an empty identity map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct source objects cloned so far.
    pub fn copied_object_count(&self) -> usize {
        self.identity.len()
    }

    /// Copy `indices` of `source` to the end of `dest`, in the given order.
    ///
    /// Duplicate indices produce duplicate pages. Returns handles for the new
    /// pages. Every index is validated before anything is copied.
    pub fn copy_pages(
        &mut self,
        source: &Document,
        indices: &[usize],
        dest: &mut Document,
        cancel: Option<&CancellationFlag>,
    ) -> Result<Vec<PageHandle>> {
        let first_new = dest.page_count()?;
        let target = LocalTarget {
            identity: &mut self.identity,
            dest: &mut *dest,
        };
        let page_refs = copy_into(source, indices, target, cancel)?;
        for page in &page_refs {
            dest.append_page(*page)?;
        }
        let mut pages = dest.pages()?;
        Ok(pages.split_off(first_new.min(pages.len())))
    }

    /// Deep-copy the source's `/Info` dictionary into `dest` unless `dest`
    /// already has one.
    pub fn copy_info(&mut self, source: &Document, dest: &mut Document) -> Result<()> {
        if dest.info_ref().is_some() {
            return Ok(());
        }
        let target = LocalTarget {
            identity: &mut self.identity,
            dest: &mut *dest,
        };
        if let Some(info) = copy_info_dict(source, target)? {
            dest.set_info(info)?;
        }
        Ok(())
    }
}

/// Copy pages with a one-shot session.
pub fn copy_pages(
    source: &Document,
    indices: &[usize],
    dest: &mut Document,
    cancel: Option<&CancellationFlag>,
) -> Result<Vec<PageHandle>> {
    CopySession::new().copy_pages(source, indices, dest, cancel)
}

/// Concatenate every page of every source, in source order.
///
/// Failures caused by one source carry its display name (see
/// [`Error::source_name`]). `/Info` comes from the first source.
pub fn merge(
    sources: &[SourceDocument],
    config: &EngineConfig,
    cancel: Option<&CancellationFlag>,
) -> Result<Vec<u8>> {
    check_source_count(sources.len(), config)?;

    let mut dest = Document::new();
    let mut session = CopySession::new();
    for (position, source) in sources.iter().enumerate() {
        cancel::check(cancel)?;
        let name = source.display_name(position);
        let doc = Document::parse(&source.bytes, config).map_err(|e| attribute(e, &name))?;
        let indices: Vec<usize> = (0..doc.page_count()?).collect();
        session
            .copy_pages(&doc, &indices, &mut dest, cancel)
            .map_err(|e| attribute(e, &name))?;
        session
            .copy_info(&doc, &mut dest)
            .map_err(|e| attribute(e, &name))?;
        log::debug!("Merged {} pages from {}", indices.len(), name);
    }

    log::info!(
        "Merged {} documents: {} pages, {} objects",
        sources.len(),
        dest.page_count()?,
        dest.object_count()
    );
    serialize(&dest)
}

/// Build a new document from `indices` of `source`, in the given order.
pub fn split(
    source: &SourceDocument,
    indices: &[usize],
    config: &EngineConfig,
    cancel: Option<&CancellationFlag>,
) -> Result<Vec<u8>> {
    if indices.is_empty() {
        return Err(Error::Configuration("no pages selected".to_string()));
    }
    let name = source.display_name(0);
    let doc = Document::parse(&source.bytes, config).map_err(|e| attribute(e, &name))?;

    let mut dest = Document::new();
    let mut session = CopySession::new();
    session
        .copy_pages(&doc, indices, &mut dest, cancel)
        .map_err(|e| attribute(e, &name))?;
    session
        .copy_info(&doc, &mut dest)
        .map_err(|e| attribute(e, &name))?;

    log::info!(
        "Split {} pages from {} ({} objects)",
        indices.len(),
        name,
        dest.object_count()
    );
    serialize(&dest)
}

/// Destination state shared by parallel copy workers.
struct SharedDestination {
    identity: IdentityMap,
    dest: Document,
}

/// Like [`merge`], but each source is parsed and copied on its own thread.
///
/// The identity map, object counter and object store sit behind one mutex.
/// Object numbering depends on scheduling; page order does not.
pub fn merge_parallel(
    sources: &[SourceDocument],
    config: &EngineConfig,
    cancel: Option<&CancellationFlag>,
) -> Result<Vec<u8>> {
    check_source_count(sources.len(), config)?;

    let shared = Mutex::new(SharedDestination {
        identity: IdentityMap::new(),
        dest: Document::new(),
    });

    let results: Vec<Result<(Vec<ObjectRef>, Option<Dictionary>)>> = std::thread::scope(|scope| {
        let workers: Vec<_> = sources
            .iter()
            .enumerate()
            .map(|(position, source)| {
                let shared = &shared;
                scope.spawn(move || {
                    let name = source.display_name(position);
                    let run = || -> Result<(Vec<ObjectRef>, Option<Dictionary>)> {
                        let doc = Document::parse(&source.bytes, config)?;
                        let indices: Vec<usize> = (0..doc.page_count()?).collect();
                        let pages = copy_into(&doc, &indices, SharedTarget(shared), cancel)?;
                        let info = if position == 0 {
                            copy_info_dict(&doc, SharedTarget(shared))?
                        } else {
                            None
                        };
                        Ok((pages, info))
                    };
                    run().map_err(|e| attribute(e, &name))
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| {
                worker
                    .join()
                    .unwrap_or_else(|_| Err(Error::Serialization("copy worker panicked".to_string())))
            })
            .collect()
    });

    let SharedDestination { mut dest, .. } = shared.into_inner().map_err(|_| poisoned())?;
    for result in results {
        let (pages, info) = result?;
        for page in pages {
            dest.append_page(page)?;
        }
        if let Some(info) = info {
            dest.set_info(info)?;
        }
    }

    log::info!(
        "Merged {} documents in parallel: {} pages, {} objects",
        sources.len(),
        dest.page_count()?,
        dest.object_count()
    );
    serialize(&dest)
}

/// Parse a 1-based page selection such as `"1-3,5,9-7"` into 0-based
/// indices. Descending ranges are honoured.
///
/// ```
/// use pdf_splice::copier::parse_page_ranges;
///
/// assert_eq!(parse_page_ranges("5,1-3").unwrap(), vec![4, 0, 1, 2]);
/// assert_eq!(parse_page_ranges("3-1").unwrap(), vec![2, 1, 0]);
/// assert!(parse_page_ranges("0").is_err());
/// ```
pub fn parse_page_ranges(selection: &str) -> Result<Vec<usize>> {
    let page_number = |s: &str| -> Result<usize> {
        match s.trim().parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n - 1),
            _ => Err(Error::Configuration(format!("invalid page number '{}'", s.trim()))),
        }
    };

    let mut indices = Vec::new();
    for part in selection.split(',').map(str::trim) {
        if part.is_empty() {
            return Err(Error::Configuration(format!("empty entry in page selection '{}'", selection)));
        }
        match part.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (page_number(start)?, page_number(end)?);
                if start <= end {
                    indices.extend(start..=end);
                } else {
                    indices.extend((end..=start).rev());
                }
            },
            None => indices.push(page_number(part)?),
        }
    }
    Ok(indices)
}

fn check_source_count(count: usize, config: &EngineConfig) -> Result<()> {
    if count == 0 {
        return Err(Error::Configuration("no source documents".to_string()));
    }
    if count > config.max_source_documents {
        return Err(Error::Configuration(format!(
            "{} source documents exceed the limit of {}",
            count, config.max_source_documents
        )));
    }
    Ok(())
}

/// Name per-source failures; leave cancellation and internal errors alone.
fn attribute(error: Error, name: &str) -> Error {
    if error.is_per_source() {
        error.with_source_name(name)
    } else {
        error
    }
}

fn poisoned() -> Error {
    Error::Serialization("destination lock poisoned".to_string())
}

/// Where copied objects go.
trait CopyTarget {
    /// Destination reference for a source object, and whether it was newly
    /// allocated (and still has to be copied).
    fn map_object(&mut self, key: (DocumentId, u32)) -> Result<(ObjectRef, bool)>;

    /// A fresh destination number not tied to any source object.
    fn allocate(&mut self) -> Result<ObjectRef>;

    /// Store a copied object under its destination number.
    fn store(&mut self, r: ObjectRef, obj: Object) -> Result<()>;
}

struct LocalTarget<'a> {
    identity: &'a mut IdentityMap,
    dest: &'a mut Document,
}

impl CopyTarget for LocalTarget<'_> {
    fn map_object(&mut self, key: (DocumentId, u32)) -> Result<(ObjectRef, bool)> {
        if let Some(r) = self.identity.get(&key) {
            return Ok((*r, false));
        }
        let r = self.dest.allocate();
        self.identity.insert(key, r);
        Ok((r, true))
    }

    fn allocate(&mut self) -> Result<ObjectRef> {
        Ok(self.dest.allocate())
    }

    fn store(&mut self, r: ObjectRef, obj: Object) -> Result<()> {
        self.dest.insert(r, obj)
    }
}

struct SharedTarget<'a>(&'a Mutex<SharedDestination>);

impl CopyTarget for SharedTarget<'_> {
    fn map_object(&mut self, key: (DocumentId, u32)) -> Result<(ObjectRef, bool)> {
        let mut shared = self.0.lock().map_err(|_| poisoned())?;
        if let Some(r) = shared.identity.get(&key) {
            return Ok((*r, false));
        }
        let r = shared.dest.allocate();
        shared.identity.insert(key, r);
        Ok((r, true))
    }

    fn allocate(&mut self) -> Result<ObjectRef> {
        Ok(self.0.lock().map_err(|_| poisoned())?.dest.allocate())
    }

    fn store(&mut self, r: ObjectRef, obj: Object) -> Result<()> {
        self.0.lock().map_err(|_| poisoned())?.dest.insert(r, obj)
    }
}

/// Copy pages into `target` without touching its page tree. Returns the new
/// page dictionaries in request order.
fn copy_into<T: CopyTarget>(
    source: &Document,
    indices: &[usize],
    target: T,
    cancel: Option<&CancellationFlag>,
) -> Result<Vec<ObjectRef>> {
    let pages = source.pages()?;
    let tree_nodes = source.page_tree_nodes()?;
    let page_count = pages.len();
    if let Some(&index) = indices.iter().find(|&&i| i >= page_count) {
        return Err(CopyError::IndexOutOfRange { index, page_count }.into());
    }

    let mut copier = Copier {
        source,
        target,
        cancel,
        tree_nodes,
        page_targets: HashMap::new(),
        pending: Vec::new(),
        copied: 0,
    };

    let mut page_refs = Vec::with_capacity(indices.len());
    for &index in indices {
        let r = copier.target.allocate()?;
        // Links into a page copied twice land on its first copy
        copier.page_targets.entry(pages[index].reference.id).or_insert(r);
        page_refs.push(r);
    }

    for (&index, &dest_ref) in indices.iter().zip(&page_refs) {
        cancel::check(cancel)?;
        copier.copy_page(&pages[index], dest_ref)?;
    }
    Ok(page_refs)
}

fn copy_info_dict<T: CopyTarget>(source: &Document, target: T) -> Result<Option<Dictionary>> {
    let Some(info) = source.trailer_info() else {
        return Ok(None);
    };
    let mut copier = Copier {
        source,
        target,
        cancel: None,
        tree_nodes: source.page_tree_nodes()?,
        page_targets: HashMap::new(),
        pending: Vec::new(),
        copied: 0,
    };
    let info = copier.rewrite_dict(info)?;
    copier.drain()?;
    Ok(Some(info))
}

struct Copier<'s, T> {
    source: &'s Document,
    target: T,
    cancel: Option<&'s CancellationFlag>,
    /// Every page and intermediate node of the source page tree
    tree_nodes: HashSet<u32>,
    /// Source page number -> destination page, for pages in this copy
    page_targets: HashMap<u32, ObjectRef>,
    /// Allocated but not yet copied: (source, destination)
    pending: Vec<(ObjectRef, ObjectRef)>,
    copied: usize,
}

impl<'s, T: CopyTarget> Copier<'s, T> {
    fn copy_page(&mut self, page: &PageHandle, dest_ref: ObjectRef) -> Result<()> {
        let source = self.source;
        let dict = source.resolve(page.reference).as_dict().ok_or_else(|| {
            CopyError::SourceCorrupt(format!("page {} is not a dictionary", page.reference))
        })?;

        let mut materialised = dict.clone();
        materialised.shift_remove("Parent");
        for key in ["Resources", "MediaBox", "CropBox"] {
            if materialised.contains_key(key) {
                continue;
            }
            if let Some(value) = page.inherited(key) {
                materialised.insert(key.to_string(), value.clone());
            }
        }
        if page.rotate != 0 {
            materialised.insert("Rotate".to_string(), Object::Integer(page.rotate));
        }
        if !materialised.contains_key("Resources") {
            materialised.insert("Resources".to_string(), Object::Dictionary(Dictionary::new()));
        }
        if !materialised.contains_key("MediaBox") {
            log::warn!("Page {} has no /MediaBox, assuming Letter", page.reference);
            materialised.insert(
                "MediaBox".to_string(),
                Object::Array(FALLBACK_MEDIA_BOX.iter().map(|v| Object::Real(*v)).collect()),
            );
        }
        self.check_required(page.reference, &materialised)?;

        let before = self.copied;
        let copy = self.rewrite_dict(&materialised)?;
        self.target.store(dest_ref, Object::Dictionary(copy))?;
        self.drain()?;
        log::debug!(
            "Copied page {} as {} with {} new objects",
            page.reference,
            dest_ref,
            self.copied - before
        );
        Ok(())
    }

    /// `/Resources` and `/Contents` must resolve when they are references.
    fn check_required(&self, page: ObjectRef, dict: &Dictionary) -> Result<()> {
        let missing = |obj: &Object| matches!(obj, Object::Reference(r) if self.source.get(r.id).is_none());
        if let Some(resources) = dict.get("Resources").filter(|r| missing(r)) {
            return Err(CopyError::SourceCorrupt(format!(
                "page {} /Resources {:?} is unresolvable",
                page, resources
            ))
            .into());
        }
        let contents_missing = match dict.get("Contents") {
            Some(Object::Array(parts)) => parts.iter().any(|p| missing(p)),
            Some(other) => missing(other),
            None => false,
        };
        if contents_missing {
            return Err(CopyError::SourceCorrupt(format!("page {} /Contents is unresolvable", page)).into());
        }
        Ok(())
    }

    /// Copy every allocated but not yet stored object.
    fn drain(&mut self) -> Result<()> {
        let source = self.source;
        while let Some((from, to)) = self.pending.pop() {
            cancel::check(self.cancel)?;
            let copy = self.rewrite(source.resolve(from))?.unwrap_or(Object::Null);
            self.target.store(to, copy)?;
            self.copied += 1;
        }
        Ok(())
    }

    /// Clone `obj` with references rewritten. `None` means the value points
    /// somewhere the copy must not go and is dropped.
    fn rewrite(&mut self, obj: &Object) -> Result<Option<Object>> {
        Ok(Some(match obj {
            Object::Reference(r) => match self.map_reference(*r)? {
                Some(r) => Object::Reference(r),
                None => return Ok(None),
            },
            Object::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.rewrite(item)?.unwrap_or(Object::Null));
                }
                Object::Array(out)
            },
            Object::Dictionary(dict) => Object::Dictionary(self.rewrite_dict(dict)?),
            Object::Stream { dict, data, decoded } => Object::Stream {
                dict: self.rewrite_dict(dict)?,
                data: data.clone(),
                decoded: decoded.clone(),
            },
            Object::Null
            | Object::Boolean(_)
            | Object::Integer(_)
            | Object::Real(_)
            | Object::String(_)
            | Object::Name(_) => obj.clone(),
        }))
    }

    fn rewrite_dict(&mut self, dict: &Dictionary) -> Result<Dictionary> {
        let mut out = Dictionary::with_capacity(dict.len());
        for (key, value) in dict {
            if matches!(key.as_str(), "Dest" | "A") && self.targets_foreign_page(value) {
                log::debug!("Dropping /{} into a page outside the copy", key);
                continue;
            }
            if let Some(value) = self.rewrite(value)? {
                out.insert(key.clone(), value);
            }
        }
        Ok(out)
    }

    fn map_reference(&mut self, r: ObjectRef) -> Result<Option<ObjectRef>> {
        let source = self.source;
        let Some(target) = source.get(r.id) else {
            log::debug!("Dropping dangling reference {}", r);
            return Ok(None);
        };
        if self.is_page_node(r, target) {
            return Ok(self.page_targets.get(&r.id).copied());
        }
        let (dest, fresh) = self.target.map_object((source.id(), r.id))?;
        if fresh {
            self.pending.push((r, dest));
        }
        Ok(Some(dest))
    }

    /// Explicit destination (`[page /XYZ ...]`) or GoTo action whose target
    /// page is not part of this copy.
    fn targets_foreign_page(&self, value: &Object) -> bool {
        let source = self.source;
        let first = match source.deref(value) {
            Object::Array(dest) => dest.first(),
            Object::Dictionary(action) => match action.get("D").map(|d| source.deref(d)) {
                Some(Object::Array(dest)) => dest.first(),
                _ => None,
            },
            _ => None,
        };
        match first.and_then(Object::as_reference) {
            Some(r) => self.is_page_node(r, source.resolve(r)) && !self.page_targets.contains_key(&r.id),
            None => false,
        }
    }

    /// Page or page tree node, typed or not. Orphaned `/Type /Page`
    /// dictionaries outside the tree count too.
    fn is_page_node(&self, r: ObjectRef, obj: &Object) -> bool {
        self.tree_nodes.contains(&r.id) || matches!(obj.type_key(), Some("Page") | Some("Pages"))
    }
}
