//! Per-revision cross-reference coordination.
//!
//! A [`RevisionIndex`] owns one revision's entry set, its trailer, and
//! the choice of physical encoding. Revisions chain through /Prev into
//! the full document history; lookups walk the chain newest-first so
//! the latest definition of an object shadows older ones.
//!
//! Offsets flow through [`OffsetCell`]s everywhere: an in-use entry
//! shares its cell with the object it describes, a /Prev value aliases
//! the predecessor revision's own position, and the startxref target
//! forwards to the cross-reference stream object in stream-encoded
//! revisions. Rendering therefore never edits numbers after the fact;
//! it just sets cells and lets every reader observe the new value.

use crate::codec;
use crate::error::{Error, Result};
use crate::indirect::IndirectObject;
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm;
use crate::offset::OffsetCell;
use crate::parse;
use crate::trailer::Trailer;
use crate::writer::Serializer;
use crate::xref::{self, XrefEntry};
use bytes::Bytes;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

/// Physical encoding of a revision's cross-reference data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Traditional ASCII table plus a trailer dictionary. Grows a
    /// hybrid companion stream when compressed entries are present.
    Table,
    /// Cross-reference stream object carrying the trailer keys itself.
    Stream,
}

/// One revision's cross-reference index.
pub struct RevisionIndex {
    kind: SectionKind,
    entries: BTreeMap<u32, XrefEntry>,
    /// Trailer state; for stream revisions these keys ride in the
    /// stream dictionary.
    pub trailer: Trailer,
    offset: OffsetCell,
    prev: Option<Rc<RefCell<RevisionIndex>>>,
    /// Companion /XRefStm object for hybrid table revisions.
    hybrid: Option<IndirectObject>,
    hybrid_number: Option<u32>,
    /// Subsection headers of a parsed table, kept so an untouched
    /// entry set re-renders with the original boundaries.
    sections: Option<Vec<(u32, u32)>>,
    /// The /Type /XRef object itself, for stream revisions.
    stream_object: Option<IndirectObject>,
}

impl RevisionIndex {
    /// Fresh index for a new revision. Starts with the free-list head
    /// (object 0) and an empty trailer.
    pub fn new(kind: SectionKind) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            0,
            XrefEntry::Free {
                number: 0,
                generation: 65535,
                next_free: 0,
            },
        );
        Self {
            kind,
            entries,
            trailer: Trailer::default(),
            offset: OffsetCell::new(0),
            prev: None,
            hybrid: None,
            hybrid_number: None,
            sections: None,
            stream_object: None,
        }
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    /// Byte position of this revision's cross-reference section (the
    /// startxref target). For stream revisions this forwards to the
    /// stream object's own offset cell.
    pub fn offset(&self) -> &OffsetCell {
        &self.offset
    }

    /// The previous revision, if any.
    pub fn prev(&self) -> Option<&Rc<RefCell<RevisionIndex>>> {
        self.prev.as_ref()
    }

    /// Entries local to this revision, in object-number order.
    pub fn entries(&self) -> impl Iterator<Item = &XrefEntry> {
        self.entries.values()
    }

    /// Find an entry, walking the revision chain newest-first.
    pub fn lookup(&self, number: u32) -> Option<XrefEntry> {
        if let Some(entry) = self.entries.get(&number) {
            return Some(entry.clone());
        }
        self.prev
            .as_ref()
            .and_then(|prev| prev.borrow().lookup(number))
    }

    /// Next free object number: the current /Size.
    pub fn next_number(&mut self) -> u32 {
        self.refresh_size();
        self.trailer.size as u32
    }

    /// Register an object in this revision, numbering it first if it is
    /// still a placeholder. The entry shares the object's offset cell.
    ///
    /// An object-stream container also registers a compressed entry
    /// for every member it holds, at the member's stream position.
    pub fn add_object(&mut self, obj: &mut IndirectObject) -> Result<ObjectRef> {
        if obj.is_placeholder() {
            let number = self.next_number();
            obj.assign_number(number)?;
        }
        let number = obj.number() as u32;
        self.entries.insert(
            number,
            XrefEntry::InUse {
                number,
                generation: obj.generation(),
                offset: obj.offset().clone(),
            },
        );
        self.trailer.size = self.trailer.size.max(i64::from(number) + 1);

        if obj.content().is_stream_of_type("ObjStm") {
            for (index, member) in objstm::unpack(obj.content())?.iter().enumerate() {
                let member_number = member.number() as u32;
                if matches!(member.content(), Object::Stream { .. }) {
                    return Err(Error::NestedObjectStream(member_number));
                }
                self.entries.insert(
                    member_number,
                    XrefEntry::Compressed {
                        number: member_number,
                        stream_number: number,
                        index: index as u32,
                    },
                );
                self.trailer.size =
                    self.trailer.size.max(i64::from(member_number) + 1);
            }
        }
        obj.object_ref()
            .ok_or(Error::InvalidObjectNumber(obj.number()))
    }

    /// Register an object-stream member: a type-2 entry pointing into
    /// `stream_number` at position `index`.
    pub fn add_compressed(
        &mut self,
        obj: &mut IndirectObject,
        stream_number: u32,
        index: u32,
    ) -> Result<ObjectRef> {
        if obj.generation() != 0 {
            return Err(Error::CompressedGeneration(
                obj.number().max(0) as u32,
                obj.generation(),
            ));
        }
        if obj.is_placeholder() {
            let number = self.next_number();
            obj.assign_number(number)?;
        }
        obj.set_compressed(true);
        let number = obj.number() as u32;
        self.entries.insert(
            number,
            XrefEntry::Compressed {
                number,
                stream_number,
                index,
            },
        );
        self.trailer.size = self.trailer.size.max(i64::from(number) + 1);
        obj.object_ref()
            .ok_or(Error::InvalidObjectNumber(obj.number()))
    }

    /// Delete an object: its entry joins the free list with a bumped
    /// generation, and any direct trailer key referencing it is
    /// dropped.
    pub fn remove_object(&mut self, number: u32, generation: u16) {
        let head_next = match self.entries.get(&0) {
            Some(XrefEntry::Free { next_free, .. }) => *next_free,
            _ => 0,
        };
        self.entries.insert(
            number,
            XrefEntry::Free {
                number,
                generation: generation.saturating_add(1),
                next_free: head_next,
            },
        );
        let head = self.entries.entry(0).or_insert(XrefEntry::Free {
            number: 0,
            generation: 65535,
            next_free: 0,
        });
        if let XrefEntry::Free { next_free, .. } = head {
            *next_free = number;
        }
        self.trailer.scrub_target(ObjectRef::new(number, generation));
    }

    /// Alias in-use entry cells onto the live objects they describe, so
    /// re-rendering the objects moves the entries with them.
    ///
    /// An object must match by number and by recorded offset; a copy
    /// of the same number parsed from an older revision does not
    /// capture this revision's entry.
    pub fn link_objects(&mut self, objects: &[IndirectObject]) {
        for obj in objects {
            if obj.is_placeholder() {
                continue;
            }
            if let Some(XrefEntry::InUse { offset, .. }) =
                self.entries.get(&(obj.number() as u32))
            {
                if offset.get() == obj.offset().get() {
                    offset.forward_to(obj.offset());
                }
            }
        }
    }

    /// Chain this revision onto its predecessor: /Prev aliases the
    /// predecessor's offset cell and document keys merge forward.
    ///
    /// Linking to an index at this revision's own physical offset is
    /// fatal, whether the two share a cell or were parsed
    /// independently at the same position.
    pub fn link_prev(&mut self, older: Rc<RefCell<RevisionIndex>>) -> Result<()> {
        let position = self.offset.get();
        if self.offset.same_cell(older.borrow().offset())
            || (position != 0 && position == older.borrow().offset().get())
        {
            return Err(Error::CircularPrev(position));
        }
        {
            let older_ref = older.borrow();
            self.trailer.merge_from(&older_ref.trailer);
            self.trailer.set_prev(older_ref.offset().clone());
        }
        self.prev = Some(older);
        Ok(())
    }

    fn refresh_size(&mut self) {
        let computed = self
            .entries
            .keys()
            .next_back()
            .map(|n| i64::from(*n) + 1)
            .unwrap_or(0);
        self.trailer.size = self.trailer.size.max(computed);
        if let Some(prev) = &self.prev {
            self.trailer.size = self.trailer.size.max(prev.borrow().trailer.size);
        }
    }

    fn has_compressed(&self) -> bool {
        self.entries
            .values()
            .any(|e| matches!(e, XrefEntry::Compressed { .. }))
    }

    /// Refresh derived state: /Size, and the encoding-specific carrier
    /// objects. Idempotent; called before every render and safe to call
    /// after any batch of mutations.
    pub fn update(&mut self) -> Result<()> {
        self.refresh_size();
        match self.kind {
            SectionKind::Stream => {
                if self.stream_object.is_none() {
                    let number = self.trailer.size as u32;
                    let mut obj = IndirectObject::new(i64::from(number), 0, Object::Null)?;
                    obj.set_encryptable(false);
                    self.entries.insert(
                        number,
                        XrefEntry::InUse {
                            number,
                            generation: 0,
                            offset: obj.offset().clone(),
                        },
                    );
                    self.offset.forward_to(obj.offset());
                    self.trailer.size += 1;
                    self.stream_object = Some(obj);
                }
                self.trailer.clear_xref_stm();
            },
            SectionKind::Table => {
                if self.has_compressed() {
                    if self.hybrid.is_none() {
                        let number = match self.hybrid_number {
                            Some(n) => n,
                            None => {
                                let n = self.trailer.size as u32;
                                self.trailer.size += 1;
                                n
                            },
                        };
                        self.hybrid_number = Some(number);
                        let mut obj =
                            IndirectObject::new(i64::from(number), 0, Object::Null)?;
                        obj.set_encryptable(false);
                        self.hybrid = Some(obj);
                    }
                    if let Some(hybrid) = &self.hybrid {
                        self.trailer.set_xref_stm(hybrid.offset().clone());
                    }
                } else if self.hybrid.take().is_some() {
                    self.trailer.clear_xref_stm();
                }
            },
        }
        Ok(())
    }

    /// Build a /Type /XRef stream object's content for the given
    /// entries. Trailer keys ride along when `trailer` is given (the
    /// stream-encoded form); the hybrid companion carries only the
    /// structural keys.
    fn xref_stream_content(
        entries: &[XrefEntry],
        size: i64,
        trailer: Option<&Trailer>,
    ) -> Result<Object> {
        let widths = xref::field_widths(entries);
        let runs = xref::index_runs(entries);
        let payload = xref::encode_stream_payload(entries, widths)?;
        let compressed = codec::encode_flate(&payload)?;

        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("XRef"));
        dict.insert("Size".to_string(), Object::Integer(size));
        dict.insert(
            "W".to_string(),
            Object::Array(widths.iter().map(|&w| Object::Integer(w as i64)).collect()),
        );
        dict.insert(
            "Index".to_string(),
            Object::Array(
                runs.iter()
                    .flat_map(|&(start, count)| {
                        [
                            Object::Integer(i64::from(start)),
                            Object::Integer(i64::from(count)),
                        ]
                    })
                    .collect(),
            ),
        );
        if let Some(trailer) = trailer {
            for (key, value) in trailer.to_dict() {
                if key != "Size" && key != "XRefStm" {
                    dict.insert(key, value);
                }
            }
        }
        dict.insert("Filter".to_string(), Object::name("FlateDecode"));
        dict.insert(
            "Length".to_string(),
            Object::Integer(compressed.len() as i64),
        );
        Ok(Object::Stream {
            dict,
            data: Bytes::from(compressed),
        })
    }

    /// Render this revision's whole trailer section at byte position
    /// `base`: hybrid companion (if any), then the table or stream,
    /// then startxref and the end-of-file marker.
    pub fn render_section(&mut self, base: u64, serializer: &Serializer) -> Result<Vec<u8>> {
        self.update()?;
        let mut out: Vec<u8> = Vec::new();
        match self.kind {
            SectionKind::Table => {
                if let Some(hybrid) = self.hybrid.as_mut() {
                    hybrid.offset().set(base);
                    let mut list: Vec<XrefEntry> = self
                        .entries
                        .values()
                        .filter(|e| matches!(e, XrefEntry::Compressed { .. }))
                        .cloned()
                        .collect();
                    // The companion describes itself too, so a
                    // stream-aware reader can load it as an object.
                    list.push(XrefEntry::InUse {
                        number: hybrid.number() as u32,
                        generation: 0,
                        offset: hybrid.offset().clone(),
                    });
                    list.sort_by_key(XrefEntry::number);
                    let content =
                        Self::xref_stream_content(&list, self.trailer.size, None)?;
                    hybrid.set_content(content)?;
                    out.extend_from_slice(&serializer.serialize_indirect(hybrid)?);
                }
                self.offset.set(base + out.len() as u64);
                let table_entries: Vec<XrefEntry> = self
                    .entries
                    .values()
                    .filter(|e| !matches!(e, XrefEntry::Compressed { .. }))
                    .cloned()
                    .collect();
                out.extend_from_slice(&xref::encode_table(
                    &table_entries,
                    self.sections.as_deref(),
                )?);
                out.extend_from_slice(b"trailer\n");
                out.extend_from_slice(
                    &serializer.serialize(&Object::Dictionary(self.trailer.to_dict())),
                );
                out.push(b'\n');
            },
            SectionKind::Stream => {
                let obj = self
                    .stream_object
                    .as_mut()
                    .ok_or_else(|| Error::InvalidPdf("missing xref stream object".into()))?;
                obj.offset().set(base);
                let list: Vec<XrefEntry> = self.entries.values().cloned().collect();
                let content =
                    Self::xref_stream_content(&list, self.trailer.size, Some(&self.trailer))?;
                obj.set_content(content)?;
                out.extend_from_slice(&serializer.serialize_indirect(obj)?);
            },
        }
        out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", self.offset.get()).as_bytes());
        Ok(out)
    }

    fn parse_failed(offset: u64, what: &str) -> Error {
        Error::Parse {
            offset,
            reason: what.to_string(),
        }
    }

    /// Parse the revision whose cross-reference section starts at
    /// `offset` (a startxref or /Prev target).
    pub fn parse_at(bytes: &[u8], offset: u64) -> Result<Self> {
        let slice = bytes
            .get(offset as usize..)
            .ok_or(Error::UnresolvedPrev(offset))?;
        if parse::skip_ws(slice).starts_with(b"xref") {
            Self::parse_table_revision(bytes, slice, offset)
        } else {
            let (_, (number, generation, content)) = parse::parse_indirect(slice)
                .map_err(|_| Self::parse_failed(offset, "expected xref table or stream"))?;
            Self::from_xref_stream(number, generation, content, offset)
        }
    }

    fn parse_table_revision(bytes: &[u8], slice: &[u8], offset: u64) -> Result<Self> {
        let (entries, sections, rest) = xref::parse_table(slice)?;
        let rest = parse::skip_ws(rest)
            .strip_prefix(b"trailer")
            .ok_or_else(|| Self::parse_failed(offset, "expected trailer keyword"))?;
        let (_, dict_obj) = parse::parse_object(rest)
            .map_err(|_| Self::parse_failed(offset, "malformed trailer dictionary"))?;
        let dict = dict_obj.as_dict().ok_or(Error::InvalidObjectType {
            expected: "trailer Dictionary",
            found: dict_obj.type_name(),
        })?;
        let trailer = Trailer::from_dict(dict)?;

        let mut rev = Self {
            kind: SectionKind::Table,
            entries: entries.into_iter().map(|e| (e.number(), e)).collect(),
            trailer,
            offset: OffsetCell::new(offset),
            prev: None,
            hybrid: None,
            hybrid_number: None,
            sections: Some(sections),
            stream_object: None,
        };

        if let Some(stm_offset) = rev.trailer.xref_stm().map(OffsetCell::get) {
            let companion = bytes
                .get(stm_offset as usize..)
                .ok_or(Error::UnresolvedPrev(stm_offset))?;
            let (_, (number, _, content)) = parse::parse_indirect(companion)
                .map_err(|_| Self::parse_failed(stm_offset, "malformed /XRefStm object"))?;
            rev.hybrid_number = Some(number);
            for entry in xref::parse_stream(&content)? {
                if entry.number() == number {
                    continue;
                }
                // Companion entries beat free (or missing) table slots.
                match rev.entries.get(&entry.number()) {
                    None | Some(XrefEntry::Free { .. }) => {
                        rev.entries.insert(entry.number(), entry);
                    },
                    _ => {},
                }
            }
        }
        Ok(rev)
    }

    /// Reinterpret a parsed indirect object as this revision's
    /// cross-reference stream. The object keeps its number when the
    /// revision is re-rendered.
    pub fn from_xref_stream(
        number: u32,
        generation: u16,
        content: Object,
        offset: u64,
    ) -> Result<Self> {
        let entries = xref::parse_stream(&content)?;
        let dict = content.as_dict().ok_or(Error::InvalidObjectType {
            expected: "XRef stream",
            found: content.type_name(),
        })?;
        let trailer = Trailer::from_dict(dict)?;

        let mut obj = IndirectObject::parsed(number, generation, content, offset);
        obj.set_encryptable(false);
        let mut map: BTreeMap<u32, XrefEntry> =
            entries.into_iter().map(|e| (e.number(), e)).collect();
        map.insert(
            number,
            XrefEntry::InUse {
                number,
                generation,
                offset: obj.offset().clone(),
            },
        );
        let cell = OffsetCell::new(offset);
        cell.forward_to(obj.offset());

        Ok(Self {
            kind: SectionKind::Stream,
            entries: map,
            trailer,
            offset: cell,
            prev: None,
            hybrid: None,
            hybrid_number: None,
            sections: None,
            stream_object: Some(obj),
        })
    }

    /// Load the full revision chain of a file: locate startxref, parse
    /// each revision, and follow /Prev until the first revision.
    /// Returns the newest revision; older ones hang off `prev()`.
    pub fn chain(bytes: &[u8]) -> Result<Rc<RefCell<RevisionIndex>>> {
        let start = parse::find_startxref(bytes)?;
        let mut visited = HashSet::new();
        visited.insert(start);

        let newest = Rc::new(RefCell::new(Self::parse_at(bytes, start)?));
        let mut cursor = Rc::clone(&newest);
        loop {
            let prev_offset = cursor.borrow().trailer.prev().map(OffsetCell::get);
            let Some(offset) = prev_offset else { break };
            if !visited.insert(offset) {
                return Err(Error::CircularPrev(offset));
            }
            let older = Rc::new(RefCell::new(Self::parse_at(bytes, offset)?));
            {
                let mut current = cursor.borrow_mut();
                let older_ref = older.borrow();
                current.trailer.merge_from(&older_ref.trailer);
                current.trailer.set_prev(older_ref.offset().clone());
                current.prev = Some(Rc::clone(&older));
            }
            cursor = older;
        }
        Ok(newest)
    }
}

impl std::fmt::Debug for RevisionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionIndex")
            .field("kind", &self.kind)
            .field("entries", &self.entries.len())
            .field("size", &self.trailer.size)
            .field("has_prev", &self.prev.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholder() -> IndirectObject {
        IndirectObject::placeholder(Object::Null)
    }

    #[test]
    fn test_placeholder_numbering_is_sequential() {
        let mut rev = RevisionIndex::new(SectionKind::Table);
        rev.trailer.size = 5;

        let mut a = placeholder();
        let mut b = placeholder();
        let mut c = placeholder();
        assert_eq!(rev.add_object(&mut a).unwrap(), ObjectRef::new(5, 0));
        assert_eq!(rev.add_object(&mut b).unwrap(), ObjectRef::new(6, 0));
        assert_eq!(rev.add_object(&mut c).unwrap(), ObjectRef::new(7, 0));
        assert_eq!(rev.trailer.size, 8);
    }

    #[test]
    fn test_entry_shares_object_cell() {
        let mut rev = RevisionIndex::new(SectionKind::Table);
        let mut obj = placeholder();
        rev.add_object(&mut obj).unwrap();

        obj.offset().set(4321);
        let entry = rev.lookup(obj.number() as u32).unwrap();
        match entry {
            XrefEntry::InUse { offset, .. } => assert_eq!(offset.get(), 4321),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_lookup_shadows_older_revision() {
        let mut old = RevisionIndex::new(SectionKind::Table);
        let mut obj_v1 = IndirectObject::new(3, 0, Object::Integer(1)).unwrap();
        obj_v1.offset().set(100);
        old.add_object(&mut obj_v1).unwrap();
        let old = Rc::new(RefCell::new(old));

        let mut new = RevisionIndex::new(SectionKind::Table);
        new.offset().set(9000);
        let mut obj_v2 = IndirectObject::new(3, 0, Object::Integer(2)).unwrap();
        obj_v2.offset().set(200);
        new.add_object(&mut obj_v2).unwrap();
        new.link_prev(Rc::clone(&old)).unwrap();

        match new.lookup(3).unwrap() {
            XrefEntry::InUse { offset, .. } => assert_eq!(offset.get(), 200),
            other => panic!("unexpected entry {:?}", other),
        }
        // Unshadowed numbers fall through to the older revision.
        assert!(new.lookup(0).is_some());
        assert!(new.lookup(99).is_none());
    }

    #[test]
    fn test_adding_container_registers_members() {
        let mut rev = RevisionIndex::new(SectionKind::Stream);
        let members = [
            IndirectObject::new(10, 0, Object::Integer(1)).unwrap(),
            IndirectObject::new(11, 0, Object::name("Tag")).unwrap(),
        ];
        let mut container =
            IndirectObject::new(12, 0, objstm::pack(&members).unwrap()).unwrap();
        rev.add_object(&mut container).unwrap();

        match rev.lookup(10).unwrap() {
            XrefEntry::Compressed {
                stream_number,
                index,
                ..
            } => {
                assert_eq!(stream_number, 12);
                assert_eq!(index, 0);
            },
            other => panic!("unexpected entry {:?}", other),
        }
        assert!(matches!(
            rev.lookup(11).unwrap(),
            XrefEntry::Compressed { index: 1, .. }
        ));
        assert!(rev.trailer.size >= 13);
    }

    #[test]
    fn test_link_objects_requires_matching_offset() {
        let mut rev = RevisionIndex::new(SectionKind::Table);
        rev.entries.insert(
            3,
            XrefEntry::InUse {
                number: 3,
                generation: 0,
                offset: OffsetCell::new(400),
            },
        );

        // Same number parsed from an older revision: offsets differ,
        // so the entry keeps its own cell.
        let stale = IndirectObject::parsed(3, 0, Object::Integer(1), 100);
        rev.link_objects(std::slice::from_ref(&stale));
        stale.offset().set(999);
        match rev.lookup(3).unwrap() {
            XrefEntry::InUse { offset, .. } => assert_eq!(offset.get(), 400),
            other => panic!("unexpected entry {:?}", other),
        }

        let current = IndirectObject::parsed(3, 0, Object::Integer(2), 400);
        rev.link_objects(std::slice::from_ref(&current));
        current.offset().set(888);
        match rev.lookup(3).unwrap() {
            XrefEntry::InUse { offset, .. } => assert_eq!(offset.get(), 888),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_link_prev_rejects_equal_offset_value() {
        let old = RevisionIndex::new(SectionKind::Table);
        old.offset().set(700);
        let old = Rc::new(RefCell::new(old));

        // Independently parsed index at the same position: distinct
        // cells, same value.
        let mut new = RevisionIndex::new(SectionKind::Table);
        new.offset().set(700);
        assert!(matches!(
            new.link_prev(old),
            Err(Error::CircularPrev(700))
        ));
    }

    #[test]
    fn test_parsed_sections_survive_rerender() {
        let table = b"xref\n\
            0 1\n\
            0000000000 65535 f \n\
            1 1\n\
            0000000015 00000 n \n\
            trailer\n<< /Size 2 >>\nstartxref\n0\n%%EOF\n";
        let mut rev = RevisionIndex::parse_at(table, 0).unwrap();
        let rendered = rev.render_section(0, &Serializer::new()).unwrap();
        let text = String::from_utf8(rendered).unwrap();
        // The writer's split boundaries survive, not a merged 0 2 run.
        assert!(text.contains("xref\n0 1\n"));
        assert!(text.contains("\n1 1\n"));
        assert!(!text.contains("\n0 2\n"));
    }

    #[test]
    fn test_link_prev_rejects_self() {
        let rev = Rc::new(RefCell::new(RevisionIndex::new(SectionKind::Table)));
        let mut other = RevisionIndex::new(SectionKind::Table);
        // Same cell on both sides: the chain would loop.
        other.offset = rev.borrow().offset().clone();
        assert!(matches!(
            other.link_prev(Rc::clone(&rev)),
            Err(Error::CircularPrev(_))
        ));
    }

    #[test]
    fn test_size_is_monotonic_across_chain() {
        let mut old = RevisionIndex::new(SectionKind::Table);
        old.trailer.size = 40;
        old.offset().set(1);
        let old = Rc::new(RefCell::new(old));

        let mut new = RevisionIndex::new(SectionKind::Table);
        new.link_prev(old).unwrap();
        new.update().unwrap();
        assert!(new.trailer.size >= 40);
    }

    #[test]
    fn test_remove_object_joins_free_list() {
        let mut rev = RevisionIndex::new(SectionKind::Table);
        let mut obj = IndirectObject::new(4, 0, Object::Null).unwrap();
        rev.add_object(&mut obj).unwrap();
        rev.trailer.root = Some(Object::reference(4, 0));

        rev.remove_object(4, 0);
        match rev.lookup(4).unwrap() {
            XrefEntry::Free { generation, .. } => assert_eq!(generation, 1),
            other => panic!("unexpected entry {:?}", other),
        }
        match rev.lookup(0).unwrap() {
            XrefEntry::Free { next_free, .. } => assert_eq!(next_free, 4),
            other => panic!("unexpected entry {:?}", other),
        }
        assert!(rev.trailer.root.is_none());
    }

    #[test]
    fn test_compressed_rejects_nonzero_generation() {
        let mut rev = RevisionIndex::new(SectionKind::Stream);
        let mut obj = IndirectObject::new(7, 2, Object::Null).unwrap();
        assert!(matches!(
            rev.add_compressed(&mut obj, 3, 0),
            Err(Error::CompressedGeneration(7, 2))
        ));
    }

    #[test]
    fn test_update_idempotent_for_stream_kind() {
        let mut rev = RevisionIndex::new(SectionKind::Stream);
        rev.update().unwrap();
        let size_after_first = rev.trailer.size;
        let stream_number = rev
            .entries()
            .filter_map(|e| match e {
                XrefEntry::InUse { number, .. } => Some(*number),
                _ => None,
            })
            .next()
            .unwrap();
        rev.update().unwrap();
        rev.update().unwrap();
        assert_eq!(rev.trailer.size, size_after_first);
        // The stream object's number never churns.
        assert!(rev.lookup(stream_number).is_some());
    }

    #[test]
    fn test_hybrid_companion_appears_and_disappears() {
        let mut rev = RevisionIndex::new(SectionKind::Table);
        let mut member = placeholder();
        rev.add_compressed(&mut member, 10, 0).unwrap();
        rev.update().unwrap();
        assert!(rev.trailer.xref_stm().is_some());

        let number = member.number() as u32;
        rev.remove_object(number, 0);
        rev.update().unwrap();
        assert!(rev.trailer.xref_stm().is_none());
    }

    #[test]
    fn test_render_table_section() {
        let mut rev = RevisionIndex::new(SectionKind::Table);
        let mut obj = IndirectObject::new(1, 0, Object::Null).unwrap();
        obj.offset().set(15);
        rev.add_object(&mut obj).unwrap();
        rev.trailer.root = Some(Object::reference(1, 0));

        let bytes = rev.render_section(100, &Serializer::new()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("xref\n0 2\n"));
        assert!(text.contains("0000000015 00000 n \n"));
        assert!(text.contains("trailer\n<< /Size 2 /Root 1 0 R >>"));
        assert!(text.ends_with("startxref\n100\n%%EOF\n"));
    }

    #[test]
    fn test_render_stream_section_parses_back() {
        let mut rev = RevisionIndex::new(SectionKind::Stream);
        let mut obj = IndirectObject::new(1, 0, Object::Null).unwrap();
        obj.offset().set(20);
        rev.add_object(&mut obj).unwrap();
        rev.trailer.root = Some(Object::reference(1, 0));

        let bytes = rev.render_section(500, &Serializer::new()).unwrap();
        assert_eq!(rev.offset().get(), 500);

        let parsed = RevisionIndex::parse_at(&bytes, 0).unwrap();
        assert_eq!(parsed.kind(), SectionKind::Stream);
        match parsed.lookup(1).unwrap() {
            XrefEntry::InUse { offset, .. } => assert_eq!(offset.get(), 20),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_parse_table_revision_round_trip() {
        let mut rev = RevisionIndex::new(SectionKind::Table);
        let mut obj = IndirectObject::new(1, 0, Object::Null).unwrap();
        obj.offset().set(15);
        rev.add_object(&mut obj).unwrap();
        rev.trailer.root = Some(Object::reference(1, 0));

        let bytes = rev.render_section(0, &Serializer::new()).unwrap();
        let parsed = RevisionIndex::parse_at(&bytes, 0).unwrap();
        assert_eq!(parsed.kind(), SectionKind::Table);
        assert_eq!(parsed.trailer.size, 2);
        assert!(parsed.lookup(1).is_some());
    }
}
