//! Trailer metadata.
//!
//! The trailer names the document-level objects (/Root, /Info,
//! /Encrypt, /ID) and carries the revision-chain plumbing: /Size,
//! /Prev and, in hybrid files, /XRefStm. The chain offsets live in
//! [`OffsetCell`]s so linking a revision to its predecessor is a cell
//! aliasing operation, not a number copy.

use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use crate::offset::OffsetCell;

/// Keys the trailer models explicitly; everything else rides in
/// `extra` for round-tripping.
const KNOWN_KEYS: &[&str] = &["Size", "Root", "Info", "Encrypt", "ID", "Prev", "XRefStm"];

/// Parsed trailer state for one revision.
#[derive(Debug, Clone, Default)]
pub struct Trailer {
    /// One greater than the highest object number used so far.
    pub size: i64,
    /// Reference to the document catalog.
    pub root: Option<Object>,
    /// Reference to the information dictionary.
    pub info: Option<Object>,
    /// Reference to the encryption dictionary.
    pub encrypt: Option<Object>,
    /// File identifier array.
    pub id: Option<Object>,
    prev: Option<OffsetCell>,
    xref_stm: Option<OffsetCell>,
    extra: Dict,
}

impl Trailer {
    /// Build from a trailer dictionary. /Size is mandatory.
    pub fn from_dict(dict: &Dict) -> Result<Self> {
        let size = dict
            .get("Size")
            .and_then(Object::as_integer)
            .ok_or(Error::MissingSize)?;
        let cell_from = |key: &str| {
            dict.get(key)
                .and_then(Object::as_integer)
                .map(|v| OffsetCell::new(v as u64))
        };
        let mut extra = Dict::new();
        for (key, value) in dict {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                extra.insert(key.clone(), value.clone());
            }
        }
        Ok(Self {
            size,
            root: dict.get("Root").cloned(),
            info: dict.get("Info").cloned(),
            encrypt: dict.get("Encrypt").cloned(),
            id: dict.get("ID").cloned(),
            prev: cell_from("Prev"),
            xref_stm: cell_from("XRefStm"),
            extra,
        })
    }

    /// Render as a trailer dictionary, reading chain offsets from
    /// their cells at call time.
    pub fn to_dict(&self) -> Dict {
        let mut dict = Dict::new();
        dict.insert("Size".to_string(), Object::Integer(self.size));
        if let Some(root) = &self.root {
            dict.insert("Root".to_string(), root.clone());
        }
        if let Some(info) = &self.info {
            dict.insert("Info".to_string(), info.clone());
        }
        if let Some(encrypt) = &self.encrypt {
            dict.insert("Encrypt".to_string(), encrypt.clone());
        }
        if let Some(id) = &self.id {
            dict.insert("ID".to_string(), id.clone());
        }
        if let Some(prev) = &self.prev {
            dict.insert("Prev".to_string(), Object::Integer(prev.get() as i64));
        }
        if let Some(xref_stm) = &self.xref_stm {
            dict.insert("XRefStm".to_string(), Object::Integer(xref_stm.get() as i64));
        }
        for (key, value) in &self.extra {
            dict.insert(key.clone(), value.clone());
        }
        dict
    }

    /// Fold an older revision's trailer into this one: /Size stays
    /// monotonic, document keys fill in only where unset. Chain
    /// offsets are per-revision and never merge.
    pub fn merge_from(&mut self, older: &Trailer) {
        self.size = self.size.max(older.size);
        if self.root.is_none() {
            self.root = older.root.clone();
        }
        if self.info.is_none() {
            self.info = older.info.clone();
        }
        if self.encrypt.is_none() {
            self.encrypt = older.encrypt.clone();
        }
        if self.id.is_none() {
            self.id = older.id.clone();
        }
        for (key, value) in &older.extra {
            if !self.extra.contains_key(key) {
                self.extra.insert(key.clone(), value.clone());
            }
        }
    }

    /// The /Prev offset cell, if this revision has a predecessor.
    pub fn prev(&self) -> Option<&OffsetCell> {
        self.prev.as_ref()
    }

    /// Point /Prev at a predecessor's offset cell.
    pub fn set_prev(&mut self, cell: OffsetCell) {
        self.prev = Some(cell);
    }

    /// The /XRefStm offset cell, if this is a hybrid revision.
    pub fn xref_stm(&self) -> Option<&OffsetCell> {
        self.xref_stm.as_ref()
    }

    /// Point /XRefStm at the companion stream's offset cell.
    pub fn set_xref_stm(&mut self, cell: OffsetCell) {
        self.xref_stm = Some(cell);
    }

    /// Drop the /XRefStm link.
    pub fn clear_xref_stm(&mut self) {
        self.xref_stm = None;
    }

    /// Drop every direct key whose value references `target`, after
    /// that object was deleted. Indirect reachability is not chased.
    pub fn scrub_target(&mut self, target: crate::object::ObjectRef) {
        let hits = |slot: &Option<Object>| {
            slot.as_ref().and_then(Object::as_reference) == Some(target)
        };
        if hits(&self.root) {
            self.root = None;
        }
        if hits(&self.info) {
            self.info = None;
        }
        if hits(&self.encrypt) {
            self.encrypt = None;
        }
        if hits(&self.id) {
            self.id = None;
        }
        self.extra.retain(|_, value| value.as_reference() != Some(target));
    }

    /// Remove a document key by name (after its target object was
    /// deleted). Only the explicit keys and extras are reachable here.
    pub fn remove_key(&mut self, key: &str) {
        match key {
            "Root" => self.root = None,
            "Info" => self.info = None,
            "Encrypt" => self.encrypt = None,
            "ID" => self.id = None,
            other => {
                self.extra.shift_remove(other);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;

    fn sample_dict() -> Dict {
        Object::dict(vec![
            ("Size", Object::Integer(10)),
            ("Root", Object::Reference(ObjectRef::new(1, 0))),
            ("Prev", Object::Integer(1234)),
            ("Custom", Object::name("Kept")),
        ])
        .as_dict()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_round_trip() {
        let trailer = Trailer::from_dict(&sample_dict()).unwrap();
        assert_eq!(trailer.size, 10);
        assert_eq!(trailer.prev().unwrap().get(), 1234);

        let dict = trailer.to_dict();
        assert_eq!(dict.get("Size").and_then(Object::as_integer), Some(10));
        assert_eq!(dict.get("Prev").and_then(Object::as_integer), Some(1234));
        assert_eq!(
            dict.get("Custom").and_then(Object::as_name),
            Some("Kept")
        );
    }

    #[test]
    fn test_missing_size_rejected() {
        let dict = Object::dict(vec![("Root", Object::Reference(ObjectRef::new(1, 0)))])
            .as_dict()
            .unwrap()
            .clone();
        assert!(matches!(Trailer::from_dict(&dict), Err(Error::MissingSize)));
    }

    #[test]
    fn test_to_dict_reads_cells_live() {
        let mut trailer = Trailer::from_dict(&sample_dict()).unwrap();
        let cell = OffsetCell::new(0);
        trailer.set_prev(cell.clone());
        cell.set(9999);
        assert_eq!(
            trailer.to_dict().get("Prev").and_then(Object::as_integer),
            Some(9999)
        );
    }

    #[test]
    fn test_merge_size_monotonic() {
        let mut newer = Trailer::from_dict(&sample_dict()).unwrap();
        let mut older = Trailer::from_dict(&sample_dict()).unwrap();
        older.size = 25;
        older.info = Some(Object::Reference(ObjectRef::new(3, 0)));
        older.root = Some(Object::Reference(ObjectRef::new(99, 0)));

        newer.merge_from(&older);
        assert_eq!(newer.size, 25);
        // Newer revision's Root wins; Info fills from the older one.
        assert_eq!(
            newer.root.as_ref().and_then(Object::as_reference),
            Some(ObjectRef::new(1, 0))
        );
        assert_eq!(
            newer.info.as_ref().and_then(Object::as_reference),
            Some(ObjectRef::new(3, 0))
        );
    }

    #[test]
    fn test_scrub_target() {
        let mut trailer = Trailer::from_dict(&sample_dict()).unwrap();
        trailer.info = Some(Object::Reference(ObjectRef::new(2, 0)));
        trailer.id = Some(Object::Reference(ObjectRef::new(1, 0)));
        trailer.scrub_target(ObjectRef::new(1, 0));
        assert!(trailer.root.is_none());
        assert!(trailer.id.is_none());
        // Different target: untouched.
        assert!(trailer.info.is_some());
    }

    #[test]
    fn test_remove_key() {
        let mut trailer = Trailer::from_dict(&sample_dict()).unwrap();
        trailer.remove_key("Root");
        trailer.remove_key("Custom");
        let dict = trailer.to_dict();
        assert!(!dict.contains_key("Root"));
        assert!(!dict.contains_key("Custom"));
    }
}
