//! Indirect objects and live references.
//!
//! An [`IndirectObject`] is a numbered container: identity, exclusively
//! owned content, a deferred byte-offset cell, and lifecycle flags. An
//! object starts as a placeholder (number -1) until a revision index
//! assigns it a number.
//!
//! A [`TrackedRef`] is the non-owning counterpart: the identity pair
//! plus an optional resolver capability for lazy dereferencing through
//! the host document's read path.

use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::offset::OffsetCell;
use std::rc::Rc;

/// Object number marking an unplaced object awaiting numbering.
pub const PLACEHOLDER_NUMBER: i64 = -1;

/// A numbered container for one content tree.
///
/// Ownership is exclusive: the only mutation path is
/// [`content_mut`](Self::content_mut), which is how the modified flag
/// aggregates over the whole owned tree and how immutability is
/// enforced.
#[derive(Debug)]
pub struct IndirectObject {
    number: i64,
    generation: u16,
    content: Object,
    offset: OffsetCell,
    compressed: bool,
    modified: bool,
    immutable: bool,
    encryptable: bool,
}

impl IndirectObject {
    /// Create an object with an explicit number (>= 1) or the
    /// placeholder number -1.
    pub fn new(number: i64, generation: u16, content: Object) -> Result<Self> {
        if number != PLACEHOLDER_NUMBER && number < 1 {
            return Err(Error::InvalidObjectNumber(number));
        }
        Ok(Self {
            number,
            generation,
            content,
            offset: OffsetCell::new(0),
            compressed: false,
            modified: true,
            immutable: false,
            encryptable: true,
        })
    }

    /// Create an unplaced object; a revision index assigns the number.
    pub fn placeholder(content: Object) -> Self {
        Self::new(PLACEHOLDER_NUMBER, 0, content).expect("placeholder number is valid")
    }

    /// Rebuild an object parsed from file bytes: numbered, positioned,
    /// and clean (not modified).
    pub fn parsed(number: u32, generation: u16, content: Object, offset: u64) -> Self {
        Self {
            number: i64::from(number),
            generation,
            content,
            offset: OffsetCell::new(offset),
            compressed: false,
            modified: false,
            immutable: false,
            encryptable: true,
        }
    }

    /// Raw object number (-1 while a placeholder).
    pub fn number(&self) -> i64 {
        self.number
    }

    /// Generation number.
    pub fn generation(&self) -> u16 {
        self.generation
    }

    /// Whether this object still awaits numbering.
    pub fn is_placeholder(&self) -> bool {
        self.number == PLACEHOLDER_NUMBER
    }

    /// Assign a number to a placeholder.
    pub fn assign_number(&mut self, number: u32) -> Result<()> {
        if !self.is_placeholder() {
            return Err(Error::InvalidObjectNumber(self.number));
        }
        if number < 1 {
            return Err(Error::InvalidObjectNumber(i64::from(number)));
        }
        self.number = i64::from(number);
        Ok(())
    }

    /// Reference view over this object's current identity.
    ///
    /// The view is computed from the live fields, so a placeholder that
    /// has since been numbered yields its assigned number, never a
    /// stale snapshot. Returns `None` while unplaced.
    pub fn object_ref(&self) -> Option<ObjectRef> {
        if self.is_placeholder() {
            None
        } else {
            Some(ObjectRef::new(self.number as u32, self.generation))
        }
    }

    /// Immutable view of the content tree.
    pub fn content(&self) -> &Object {
        &self.content
    }

    /// Mutable access to the content tree.
    ///
    /// Fails when the object is immutable; otherwise marks the object
    /// modified, since any edit to the owned tree flows through here.
    pub fn content_mut(&mut self) -> Result<&mut Object> {
        if self.immutable {
            return Err(Error::Immutable(self.number, self.generation));
        }
        self.modified = true;
        Ok(&mut self.content)
    }

    /// Replace the whole content tree.
    pub fn set_content(&mut self, content: Object) -> Result<()> {
        *self.content_mut()? = content;
        Ok(())
    }

    /// The deferred byte-offset cell for this object's position.
    pub fn offset(&self) -> &OffsetCell {
        &self.offset
    }

    /// Whether this object lives inside an object stream.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Mark the object as an object-stream member (or not).
    pub fn set_compressed(&mut self, compressed: bool) {
        self.compressed = compressed;
    }

    /// Whether this object (or anything it owns) has been edited.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Set or clear the modified flag.
    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Freeze or unfreeze the object.
    pub fn set_immutable(&mut self, immutable: bool) {
        self.immutable = immutable;
    }

    /// Whether mutation is currently rejected.
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Whether a security handler may transform this object's strings
    /// and stream payload. True by default; the document's own
    /// cross-reference stream must stay clear so a reader can bootstrap
    /// decryption.
    pub fn is_encryptable(&self) -> bool {
        self.encryptable
    }

    /// Opt this object out of (or back into) encryption.
    pub fn set_encryptable(&mut self, encryptable: bool) {
        self.encryptable = encryptable;
    }
}

impl Clone for IndirectObject {
    /// Clones get their own offset cell and are always editable; only
    /// the identity and content carry over.
    fn clone(&self) -> Self {
        Self {
            number: self.number,
            generation: self.generation,
            content: self.content.clone(),
            offset: OffsetCell::new(self.offset.get()),
            compressed: self.compressed,
            modified: true,
            immutable: false,
            encryptable: self.encryptable,
        }
    }
}

/// The host document's object-read path.
///
/// Dereferencing suspends on this collaborator, which may itself read,
/// decompress, and decrypt before returning the live object.
pub trait Resolver {
    /// Fetch the object identified by (number, generation).
    fn read_object(&self, number: u32, generation: u16) -> Result<Object>;
}

/// A non-owning pointer value with an optional resolver capability.
#[derive(Clone)]
pub struct TrackedRef {
    target: ObjectRef,
    resolver: Option<Rc<dyn Resolver>>,
}

impl TrackedRef {
    /// A bare reference with no resolver; resolving it fails.
    pub fn new(target: ObjectRef) -> Self {
        Self {
            target,
            resolver: None,
        }
    }

    /// A reference bound to a resolver.
    pub fn with_resolver(target: ObjectRef, resolver: Rc<dyn Resolver>) -> Self {
        Self {
            target,
            resolver: Some(resolver),
        }
    }

    /// The identity pair this reference points at.
    pub fn target(&self) -> ObjectRef {
        self.target
    }

    /// Attach (or replace) the resolver capability.
    pub fn bind(&mut self, resolver: Rc<dyn Resolver>) {
        self.resolver = Some(resolver);
    }

    /// Fetch the live referenced object through the resolver.
    pub fn resolve(&self) -> Result<Object> {
        match &self.resolver {
            Some(resolver) => resolver.read_object(self.target.number, self.target.generation),
            None => Err(Error::NoResolver(self.target.number, self.target.generation)),
        }
    }

    /// Resolve and require a dictionary (or stream header).
    pub fn resolve_dict(&self) -> Result<Object> {
        let obj = self.resolve()?;
        if obj.as_dict().is_some() {
            Ok(obj)
        } else {
            Err(Error::InvalidObjectType {
                expected: "Dictionary",
                found: obj.type_name(),
            })
        }
    }
}

impl PartialEq for TrackedRef {
    /// Equality is identity equality; the resolver capability does not
    /// participate.
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl Eq for TrackedRef {}

impl std::fmt::Debug for TrackedRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedRef")
            .field("target", &self.target)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dict;
    use std::cell::RefCell;

    #[test]
    fn test_object_number_validation() {
        assert!(IndirectObject::new(1, 0, Object::Null).is_ok());
        assert!(IndirectObject::new(-1, 0, Object::Null).is_ok());
        assert!(IndirectObject::new(0, 0, Object::Null).is_err());
        assert!(IndirectObject::new(-2, 0, Object::Null).is_err());
    }

    #[test]
    fn test_placeholder_numbering() {
        let mut obj = IndirectObject::placeholder(Object::Integer(1));
        assert!(obj.is_placeholder());
        assert!(obj.object_ref().is_none());

        obj.assign_number(5).unwrap();
        assert_eq!(obj.number(), 5);
        assert_eq!(obj.object_ref(), Some(ObjectRef::new(5, 0)));

        // Already numbered: renumbering is rejected.
        assert!(obj.assign_number(6).is_err());
    }

    #[test]
    fn test_reference_view_tracks_identity() {
        let mut obj = IndirectObject::placeholder(Object::Null);
        assert!(obj.object_ref().is_none());
        obj.assign_number(9).unwrap();
        // The view reflects the current identity, not a snapshot.
        assert_eq!(obj.object_ref().unwrap().number, 9);
    }

    #[test]
    fn test_immutable_rejects_mutation() {
        let mut obj = IndirectObject::new(3, 0, Object::Integer(1)).unwrap();
        obj.set_modified(false);
        obj.set_immutable(true);

        let err = obj.content_mut().unwrap_err();
        assert!(matches!(err, Error::Immutable(3, 0)));
        assert!(!obj.is_modified());

        obj.set_immutable(false);
        *obj.content_mut().unwrap() = Object::Integer(2);
        assert!(obj.is_modified());
        assert_eq!(obj.content().as_integer(), Some(2));
    }

    #[test]
    fn test_parsed_objects_start_clean() {
        let obj = IndirectObject::parsed(4, 0, Object::Null, 1200);
        assert!(!obj.is_modified());
        assert_eq!(obj.offset().get(), 1200);
    }

    #[test]
    fn test_clone_gets_independent_cell() {
        let obj = IndirectObject::parsed(4, 0, Object::Null, 100);
        let copy = obj.clone();
        obj.offset().set(999);
        assert_eq!(copy.offset().get(), 100);
        assert!(copy.is_modified());
        assert!(!copy.is_immutable());
    }

    #[test]
    fn test_encryptable_default() {
        let obj = IndirectObject::new(1, 0, Object::Null).unwrap();
        assert!(obj.is_encryptable());
    }

    struct MapResolver {
        objects: RefCell<Dict>,
    }

    impl Resolver for MapResolver {
        fn read_object(&self, number: u32, _generation: u16) -> Result<Object> {
            self.objects
                .borrow()
                .get(&number.to_string())
                .cloned()
                .ok_or(Error::InvalidPdf(format!("no object {}", number)))
        }
    }

    #[test]
    fn test_resolve_without_resolver_fails() {
        let tracked = TrackedRef::new(ObjectRef::new(10, 0));
        assert!(matches!(tracked.resolve(), Err(Error::NoResolver(10, 0))));
    }

    #[test]
    fn test_resolve_through_resolver() {
        let mut objects = Dict::new();
        objects.insert("10".to_string(), Object::Integer(42));
        let resolver = Rc::new(MapResolver {
            objects: RefCell::new(objects),
        });

        let mut tracked = TrackedRef::new(ObjectRef::new(10, 0));
        tracked.bind(resolver);
        assert_eq!(tracked.resolve().unwrap().as_integer(), Some(42));
    }

    #[test]
    fn test_tracked_ref_equality_ignores_resolver() {
        let resolver = Rc::new(MapResolver {
            objects: RefCell::new(Dict::new()),
        });
        let bare = TrackedRef::new(ObjectRef::new(2, 0));
        let bound = TrackedRef::with_resolver(ObjectRef::new(2, 0), resolver);
        assert_eq!(bare, bound);
        assert_ne!(bare, TrackedRef::new(ObjectRef::new(2, 1)));
    }

    #[test]
    fn test_resolve_dict_type_check() {
        struct IntResolver;
        impl Resolver for IntResolver {
            fn read_object(&self, _: u32, _: u16) -> Result<Object> {
                Ok(Object::Integer(1))
            }
        }
        let tracked = TrackedRef::with_resolver(ObjectRef::new(1, 0), Rc::new(IntResolver));
        let err = tracked.resolve_dict().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidObjectType {
                expected: "Dictionary",
                found: "Integer"
            }
        ));
    }
}
