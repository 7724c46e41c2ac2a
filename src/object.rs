//! PDF object types.

use bytes::Bytes;
use indexmap::IndexMap;

/// Dictionary payload. Insertion order is preserved so serialization is byte-stable.
pub type Dictionary = IndexMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (without the leading /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + data)
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Raw stream bytes exactly as stored in the file
        data: Bytes,
        /// Decoded bytes, present when the filter chain is empty or Flate only
        decoded: Option<Bytes>,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Build a stream object whose decoded form is unknown.
    pub fn stream(dict: Dictionary, data: impl Into<Bytes>) -> Self {
        Object::Stream {
            dict,
            data: data.into(),
            decoded: None,
        }
    }

    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an Integer or Real.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Mutable access to a dictionary or a stream's dictionary.
    /// Mutable variant of [`Object::as_dict`].
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Look up `key` when this object is a dictionary or stream.
    pub fn get(&self, key: &str) -> Option<&Object> {
        self.as_dict().and_then(|d| d.get(key))
    }

    /// Value of `/Type`, if present.
    pub fn type_key(&self) -> Option<&str> {
        self.get("Type").and_then(Object::as_name)
    }

    /// Filter names of a stream, in application order.
    ///
    /// Returns an empty list for unfiltered streams and non-stream objects.
    pub fn filters(&self) -> Vec<String> {
        self.as_dict().map(filter_names).unwrap_or_default()
    }

    /// Every reference directly or transitively embedded in this object's
    /// inline structure (does not follow references).
    pub fn references(&self) -> Vec<ObjectRef> {
        let mut out = Vec::new();
        collect_refs(self, &mut out);
        out
    }
}

/// Filter names listed under `/Filter` in a stream dictionary.
pub fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get("Filter") {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn collect_refs(obj: &Object, out: &mut Vec<ObjectRef>) {
    match obj {
        Object::Reference(r) => out.push(*r),
        Object::Array(items) => items.iter().for_each(|o| collect_refs(o, out)),
        Object::Dictionary(dict) | Object::Stream { dict, .. } => {
            dict.values().for_each(|o| collect_refs(o, out))
        },
        _ => {},
    }
}

impl From<ObjectRef> for Object {
    fn from(r: ObjectRef) -> Self {
        Object::Reference(r)
    }
}

impl From<Dictionary> for Object {
    fn from(d: Dictionary) -> Self {
        Object::Dictionary(d)
    }
}

/// Build a dictionary from `(key, value)` pairs, keeping their order.
pub fn dict<const N: usize>(entries: [(&str, Object); N]) -> Dictionary {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Create a Name object.
pub fn name(s: &str) -> Object {
    Object::Name(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_display() {
        assert_eq!(ObjectRef::new(12, 0).to_string(), "12 0 R");
    }

    #[test]
    fn test_as_dict_on_stream() {
        let stream = Object::stream(dict([("Length", Object::Integer(3))]), &b"abc"[..]);
        assert_eq!(stream.get("Length"), Some(&Object::Integer(3)));
        assert_eq!(stream.type_name(), "Stream");
    }

    #[test]
    fn test_filters_single_and_chain() {
        let single = Object::Dictionary(dict([("Filter", name("FlateDecode"))]));
        assert_eq!(single.filters(), vec!["FlateDecode".to_string()]);

        let chain = Object::Dictionary(dict([(
            "Filter",
            Object::Array(vec![name("ASCII85Decode"), name("LZWDecode")]),
        )]));
        assert_eq!(chain.filters(), vec!["ASCII85Decode", "LZWDecode"]);
        assert!(Object::Null.filters().is_empty());
    }

    #[test]
    fn test_references_nested() {
        let obj = Object::Dictionary(dict([
            ("A", Object::Reference(ObjectRef::new(1, 0))),
            (
                "B",
                Object::Array(vec![
                    Object::Integer(3),
                    Object::Dictionary(dict([("C", Object::Reference(ObjectRef::new(7, 0)))])),
                ]),
            ),
        ]));
        assert_eq!(obj.references(), vec![ObjectRef::new(1, 0), ObjectRef::new(7, 0)]);
    }

    #[test]
    fn test_dict_preserves_order() {
        let d = dict([("Z", Object::Null), ("A", Object::Null), ("M", Object::Null)]);
        let keys: Vec<_> = d.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Z", "A", "M"]);
    }

    #[test]
    fn test_as_number() {
        assert_eq!(Object::Integer(4).as_number(), Some(4.0));
        assert_eq!(Object::Real(2.5).as_number(), Some(2.5));
        assert_eq!(name("x").as_number(), None);
    }
}
