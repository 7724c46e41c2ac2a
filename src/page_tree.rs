//! Page tree traversal.
//!
//! Pages are collected in pre-order from the catalog's `/Pages` node. The
//! inheritable attributes (`/Resources`, `/MediaBox`, `/CropBox`, `/Rotate`)
//! are passed down the tree so each [`PageHandle`] carries the values in
//! effect for that page, whether it declares them itself or an ancestor does.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::HashSet;

/// Attributes a page inherits from its ancestors.
pub const INHERITABLE_KEYS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// One page of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct PageHandle {
    /// Zero-based position in document order
    pub index: usize,
    /// The page dictionary
    pub reference: ObjectRef,
    /// `/Resources` in effect, as written (often a reference)
    pub resources: Option<Object>,
    /// `/MediaBox` in effect
    pub media_box: Option<Object>,
    /// `/CropBox` in effect
    pub crop_box: Option<Object>,
    /// `/Rotate` in effect, normalised to 0, 90, 180 or 270
    pub rotate: i64,
}

impl PageHandle {
    /// Effective value of an inheritable attribute, as written.
    pub fn inherited(&self, key: &str) -> Option<&Object> {
        match key {
            "Resources" => self.resources.as_ref(),
            "MediaBox" => self.media_box.as_ref(),
            "CropBox" => self.crop_box.as_ref(),
            _ => None,
        }
    }

    /// Media box as `[llx, lly, urx, ury]`, if present and numeric.
    pub fn media_box_rect(&self, doc: &Document) -> Option<[f64; 4]> {
        let values = doc.deref(self.media_box.as_ref()?).as_array()?;
        if values.len() != 4 {
            return None;
        }
        let mut rect = [0.0; 4];
        for (slot, value) in rect.iter_mut().zip(values) {
            *slot = doc.deref(value).as_number()?;
        }
        Some(rect)
    }
}

#[derive(Debug, Clone, Default)]
struct Inherited {
    resources: Option<Object>,
    media_box: Option<Object>,
    crop_box: Option<Object>,
    rotate: Option<Object>,
}

impl Inherited {
    fn overlay(&self, node: &Dictionary) -> Self {
        let pick = |key: &str, parent: &Option<Object>| node.get(key).cloned().or_else(|| parent.clone());
        Inherited {
            resources: pick("Resources", &self.resources),
            media_box: pick("MediaBox", &self.media_box),
            crop_box: pick("CropBox", &self.crop_box),
            rotate: pick("Rotate", &self.rotate),
        }
    }
}

struct Walker<'d> {
    doc: &'d Document,
    max_depth: usize,
    in_progress: HashSet<u32>,
    visited: HashSet<u32>,
    pages: Vec<PageHandle>,
}

/// Collect every page of `doc` in document order.
///
/// Fails with `MalformedDocument` when the tree is cyclic, when a node is
/// reachable twice, when it is deeper than `max_depth`, or when a `/Kids`
/// entry is not a reference.
pub fn collect_pages(doc: &Document, max_depth: usize) -> Result<Vec<PageHandle>> {
    Ok(walk(doc, max_depth)?.pages)
}

/// Object numbers of every node in the page tree, intermediate nodes
/// included. Untyped nodes count the same as `/Type /Page` and `/Pages`.
pub fn tree_node_ids(doc: &Document, max_depth: usize) -> Result<HashSet<u32>> {
    Ok(walk(doc, max_depth)?.visited)
}

fn walk(doc: &Document, max_depth: usize) -> Result<Walker<'_>> {
    let root = doc.pages_root()?;
    let mut walker = Walker {
        doc,
        max_depth,
        in_progress: HashSet::new(),
        visited: HashSet::new(),
        pages: Vec::new(),
    };
    walker.visit(root, &Inherited::default(), 0)?;
    Ok(walker)
}

impl Walker<'_> {
    fn visit(&mut self, node_ref: ObjectRef, inherited: &Inherited, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::MalformedDocument(format!(
                "page tree is deeper than {} levels",
                self.max_depth
            )));
        }
        if self.in_progress.contains(&node_ref.id) {
            return Err(Error::MalformedDocument(format!("page tree cycle through {}", node_ref)));
        }
        if !self.visited.insert(node_ref.id) {
            return Err(Error::MalformedDocument(format!(
                "page tree node {} appears more than once",
                node_ref
            )));
        }

        let node = match self.doc.resolve(node_ref) {
            Object::Dictionary(dict) => dict,
            Object::Null => {
                log::warn!("Skipping missing page tree node {}", node_ref);
                return Ok(());
            },
            other => {
                return Err(Error::MalformedDocument(format!(
                    "page tree node {} is a {}",
                    node_ref,
                    other.type_name()
                )))
            },
        };

        let is_pages = match node.get("Type").and_then(Object::as_name) {
            Some("Pages") => true,
            Some("Page") => false,
            _ => node.contains_key("Kids"),
        };

        let inherited = inherited.overlay(node);
        if !is_pages {
            self.pages.push(PageHandle {
                index: self.pages.len(),
                reference: node_ref,
                rotate: normalize_rotation(inherited.rotate.as_ref().map(|r| self.doc.deref(r))),
                resources: inherited.resources,
                media_box: inherited.media_box,
                crop_box: inherited.crop_box,
            });
            return Ok(());
        }

        let kids = match node.get("Kids").map(|k| self.doc.deref(k)) {
            Some(Object::Array(kids)) => kids,
            Some(other) => {
                return Err(Error::MalformedDocument(format!(
                    "/Kids of {} is a {}",
                    node_ref,
                    other.type_name()
                )))
            },
            None => return Ok(()),
        };

        self.in_progress.insert(node_ref.id);
        for kid in kids {
            let kid = kid.as_reference().ok_or_else(|| {
                Error::MalformedDocument(format!("/Kids of {} contains a direct {}", node_ref, kid.type_name()))
            })?;
            self.visit(kid, &inherited, depth + 1)?;
        }
        self.in_progress.remove(&node_ref.id);
        Ok(())
    }
}

/// Round `/Rotate` to a quarter turn in `0..360`.
fn normalize_rotation(value: Option<&Object>) -> i64 {
    let degrees = value.and_then(Object::as_number).unwrap_or(0.0);
    let turns = (degrees / 90.0).round().rem_euclid(4.0);
    if turns.is_finite() {
        turns as i64 * 90
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(body: &str) -> Document {
        let bytes = format!("%PDF-1.4\n{}\ntrailer << /Root 1 0 R >>\n", body);
        crate::document::parse(bytes.as_bytes()).unwrap()
    }

    #[test]
    fn test_inheritance_and_order() {
        let doc = tree(
            "1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R 5 0 R] /Count 3 /MediaBox [0 0 612 792] /Rotate 90 /Resources 9 0 R >> endobj
3 0 obj << /Type /Pages /Kids [4 0 R] /Count 1 /Rotate -90 >> endobj
4 0 obj << /Type /Page /Parent 3 0 R >> endobj
5 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 100 200] >> endobj
9 0 obj << >> endobj",
        );
        let pages = doc.pages().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].reference, ObjectRef::new(4, 0));
        assert_eq!(pages[0].rotate, 270);
        assert_eq!(pages[0].resources, Some(Object::Reference(ObjectRef::new(9, 0))));
        assert_eq!(pages[0].media_box_rect(&doc), Some([0.0, 0.0, 612.0, 792.0]));
        assert_eq!(pages[1].index, 1);
        assert_eq!(pages[1].rotate, 90);
        assert_eq!(pages[1].media_box_rect(&doc), Some([0.0, 0.0, 100.0, 200.0]));
    }

    #[test]
    fn test_cycle_is_malformed() {
        let bytes = b"%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj
3 0 obj << /Type /Pages /Kids [2 0 R] /Count 1 >> endobj
trailer << /Root 1 0 R >>
";
        assert!(matches!(crate::document::parse(bytes), Err(Error::MalformedDocument(_))));
    }

    #[test]
    fn test_depth_limit() {
        let doc = tree(
            "1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R] >> endobj
3 0 obj << /Type /Pages /Kids [4 0 R] >> endobj
4 0 obj << /Type /Page >> endobj",
        );
        assert_eq!(collect_pages(&doc, 2).unwrap().len(), 1);
        assert!(matches!(collect_pages(&doc, 1), Err(Error::MalformedDocument(_))));
    }

    #[test]
    fn test_untyped_nodes() {
        let doc = tree(
            "1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Kids [3 0 R 4 0 R] >> endobj
3 0 obj << /Contents 5 0 R >> endobj
4 0 obj << /Type /Page >> endobj
5 0 obj << /Length 0 >> stream
endstream endobj",
        );
        assert_eq!(doc.page_count().unwrap(), 2);
        let nodes = tree_node_ids(&doc, 8).unwrap();
        assert_eq!(nodes, HashSet::from([2, 3, 4]));
    }

    #[test]
    fn test_rotation_normalisation() {
        assert_eq!(normalize_rotation(None), 0);
        assert_eq!(normalize_rotation(Some(&Object::Integer(450))), 90);
        assert_eq!(normalize_rotation(Some(&Object::Integer(-180))), 180);
        assert_eq!(normalize_rotation(Some(&Object::Real(89.0))), 90);
        assert_eq!(normalize_rotation(Some(&Object::Real(-1e23))), 0);
        assert_eq!(normalize_rotation(Some(&Object::Real(f64::MAX))), 0);
    }

    #[test]
    fn test_huge_rotate_does_not_overflow() {
        let doc = tree(
            "1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj
3 0 obj << /Type /Page /Parent 2 0 R /Rotate 100000000000000000000000.0 >> endobj",
        );
        assert_eq!(doc.page_count().unwrap(), 1);
        assert_eq!(doc.page(0).unwrap().rotate, 0);
    }
}
