//! # pdf_forge
//!
//! A mutable in-memory PDF object graph with incremental-update
//! serialization.
//!
//! The crate models a document as numbered [`IndirectObject`]s indexed
//! by a chain of [`RevisionIndex`]es, one per file revision. Byte
//! positions flow through shared [`OffsetCell`]s, so serialization is a
//! two-pass measure-then-emit walk that needs no seekable output:
//! every offset-bearing token (cross-reference entries, /Prev,
//! /XRefStm, startxref) points backwards and reads its cell at emit
//! time.
//!
//! Both cross-reference encodings are supported and round-trip: the
//! traditional fixed-width table and the binary cross-reference
//! stream, including hybrid files carrying both. Small objects can be
//! packed into object streams via [`objstm`].
//!
//! ## Example
//!
//! ```no_run
//! use pdf_forge::{render_file, IndirectObject, Object, RevisionIndex, SectionKind};
//!
//! # fn main() -> pdf_forge::Result<()> {
//! let mut revision = RevisionIndex::new(SectionKind::Table);
//! let mut catalog = IndirectObject::placeholder(Object::dict(vec![
//!     ("Type", Object::name("Catalog")),
//! ]));
//! let root = revision.add_object(&mut catalog)?;
//! revision.trailer.root = Some(Object::Reference(root));
//!
//! let bytes = render_file("1.7", &[catalog], &mut revision, None)?;
//! std::fs::write("out.pdf", bytes)?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod encryption;
pub mod error;
pub mod indirect;
pub mod object;
pub mod objstm;
pub mod offset;
pub mod parse;
pub mod revision;
pub mod trailer;
pub mod writer;
pub mod xref;

pub use encryption::{CryptKind, SecurityHandler};
pub use error::{Error, Result};
pub use indirect::{IndirectObject, Resolver, TrackedRef, PLACEHOLDER_NUMBER};
pub use object::{Dict, Object, ObjectRef};
pub use offset::OffsetCell;
pub use revision::{RevisionIndex, SectionKind};
pub use trailer::Trailer;
pub use writer::{render_file, render_update, Serializer};
pub use xref::XrefEntry;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "pdf_forge");
    }
}
