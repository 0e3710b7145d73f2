//! Object serialization and two-pass file rendering.
//!
//! [`Serializer`] turns content nodes into bytes per ISO 32000 syntax
//! rules. The render functions assemble whole files or incremental
//! updates: a first pass walks the output measuring positions and
//! patching every deferred offset cell, a second pass emits final
//! bytes. Since every offset-bearing token points backwards (body
//! before index, index before startxref), the two passes agree and no
//! seekable output is needed.

use crate::encryption::{CryptKind, SecurityHandler};
use crate::error::{Error, Result};
use crate::indirect::IndirectObject;
use crate::object::{Dict, Object};
use crate::revision::RevisionIndex;
use std::io::Write;

/// Header comment marking the file as binary, as recommended by
/// ISO 32000 §7.5.2.
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Serializer for content nodes.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    _private: (),
}

impl Serializer {
    /// Create a serializer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj, None, 0, 0)
            .expect("writing to Vec cannot fail");
        buf
    }

    /// Serialize an indirect object definition:
    /// `{n} {g} obj\n{content}\nendobj\n`.
    pub fn serialize_indirect(&self, obj: &IndirectObject) -> Result<Vec<u8>> {
        self.serialize_indirect_with(obj, None)
    }

    /// Serialize an indirect object, encrypting strings and stream
    /// payloads through `handler` unless the object opted out.
    pub fn serialize_indirect_with(
        &self,
        obj: &IndirectObject,
        handler: Option<&dyn SecurityHandler>,
    ) -> Result<Vec<u8>> {
        if obj.is_placeholder() {
            return Err(Error::InvalidObjectNumber(obj.number()));
        }
        let number = obj.number() as u32;
        let generation = obj.generation();
        let handler = if obj.is_encryptable() { handler } else { None };

        let mut buf = Vec::new();
        writeln!(buf, "{} {} obj", number, generation)?;
        self.write_object(&mut buf, obj.content(), handler, number, generation)?;
        write!(buf, "\nendobj\n")?;
        Ok(buf)
    }

    fn write_object<W: Write>(
        &self,
        w: &mut W,
        obj: &Object,
        handler: Option<&dyn SecurityHandler>,
        number: u32,
        generation: u16,
    ) -> Result<()> {
        match obj {
            Object::Null => write!(w, "null")?,
            Object::Boolean(b) => write!(w, "{}", if *b { "true" } else { "false" })?,
            Object::Integer(i) => write!(w, "{}", i)?,
            Object::Real(r) => self.write_real(w, *r)?,
            Object::String(s) => {
                let encrypted;
                let bytes: &[u8] = match handler {
                    Some(handler) => {
                        encrypted = handler.encrypt(CryptKind::String, s, number, generation)?;
                        &encrypted
                    },
                    None => s,
                };
                self.write_string(w, bytes)?;
            },
            Object::Name(n) => self.write_name(w, n)?,
            Object::Array(arr) => {
                write!(w, "[")?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(w, " ")?;
                    }
                    self.write_object(w, item, handler, number, generation)?;
                }
                write!(w, "]")?;
            },
            Object::Dictionary(dict) => {
                self.write_dict(w, dict, handler, number, generation)?;
            },
            Object::Stream { dict, data } => {
                let encrypted;
                let payload: &[u8] = match handler {
                    Some(handler) => {
                        encrypted =
                            handler.encrypt(CryptKind::Stream, data, number, generation)?;
                        &encrypted
                    },
                    None => data,
                };
                // The written /Length always reflects the bytes that
                // actually follow.
                let mut dict = dict.clone();
                dict.insert("Length".to_string(), Object::Integer(payload.len() as i64));
                self.write_dict(w, &dict, handler, number, generation)?;
                write!(w, "\nstream\n")?;
                w.write_all(payload)?;
                write!(w, "\nendstream")?;
            },
            Object::Reference(r) => write!(w, "{} {} R", r.number, r.generation)?,
        }
        Ok(())
    }

    fn write_dict<W: Write>(
        &self,
        w: &mut W,
        dict: &Dict,
        handler: Option<&dyn SecurityHandler>,
        number: u32,
        generation: u16,
    ) -> Result<()> {
        write!(w, "<<")?;
        for (key, value) in dict {
            write!(w, " ")?;
            self.write_name(w, key)?;
            write!(w, " ")?;
            self.write_object(w, value, handler, number, generation)?;
        }
        write!(w, " >>")?;
        Ok(())
    }

    /// Write a real with trailing zeros trimmed; integral values are
    /// written without a decimal point.
    fn write_real<W: Write>(&self, w: &mut W, value: f64) -> Result<()> {
        if value.fract() == 0.0 {
            write!(w, "{}", value as i64)?;
        } else {
            let formatted = format!("{:.5}", value);
            write!(w, "{}", formatted.trim_end_matches('0').trim_end_matches('.'))?;
        }
        Ok(())
    }

    /// Write a string as a literal `(...)` when printable, otherwise as
    /// hex `<...>`.
    fn write_string<W: Write>(&self, w: &mut W, data: &[u8]) -> Result<()> {
        let printable = data
            .iter()
            .all(|&b| matches!(b, b'\n' | b'\r' | b'\t') || (0x20..=0x7E).contains(&b));
        if printable {
            write!(w, "(")?;
            for &b in data {
                match b {
                    b'(' => write!(w, "\\(")?,
                    b')' => write!(w, "\\)")?,
                    b'\\' => write!(w, "\\\\")?,
                    b'\n' => write!(w, "\\n")?,
                    b'\r' => write!(w, "\\r")?,
                    b'\t' => write!(w, "\\t")?,
                    _ => w.write_all(&[b])?,
                }
            }
            write!(w, ")")?;
        } else {
            write!(w, "<")?;
            for b in data {
                write!(w, "{:02X}", b)?;
            }
            write!(w, ">")?;
        }
        Ok(())
    }

    /// Write a name, escaping bytes outside the regular range as `#XX`.
    fn write_name<W: Write>(&self, w: &mut W, name: &str) -> Result<()> {
        write!(w, "/")?;
        for b in name.bytes() {
            let regular = (0x21..=0x7E).contains(&b)
                && !matches!(b, b'#' | b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}');
            if regular {
                w.write_all(&[b])?;
            } else {
                write!(w, "#{:02X}", b)?;
            }
        }
        Ok(())
    }
}

/// Emit body objects at their measured positions, patching each
/// object's offset cell. Object-stream members are skipped; their bytes
/// live inside their container.
fn write_body(
    out: &mut Vec<u8>,
    base: u64,
    objects: &[IndirectObject],
    serializer: &Serializer,
    handler: Option<&dyn SecurityHandler>,
) -> Result<()> {
    for obj in objects {
        if obj.is_compressed() {
            continue;
        }
        obj.offset().set(base + out.len() as u64);
        out.extend_from_slice(&serializer.serialize_indirect_with(obj, handler)?);
    }
    Ok(())
}

fn render_once(
    base: u64,
    header: Option<&str>,
    objects: &[IndirectObject],
    revision: &mut RevisionIndex,
    handler: Option<&dyn SecurityHandler>,
) -> Result<Vec<u8>> {
    let serializer = Serializer::new();
    let mut out = Vec::new();
    if let Some(version) = header {
        writeln!(out, "%PDF-{}", version)?;
        out.extend_from_slice(BINARY_MARKER);
    }
    write_body(&mut out, base, objects, &serializer, handler)?;
    let section = revision.render_section(base + out.len() as u64, &serializer)?;
    out.extend_from_slice(&section);
    Ok(out)
}

/// Render a complete file: header, body, and trailer section.
///
/// Two passes: the first measures and patches offset cells, the second
/// emits final bytes.
pub fn render_file(
    version: &str,
    objects: &[IndirectObject],
    revision: &mut RevisionIndex,
    handler: Option<&dyn SecurityHandler>,
) -> Result<Vec<u8>> {
    render_once(0, Some(version), objects, revision, handler)?;
    render_once(0, Some(version), objects, revision, handler)
}

/// Render an incremental update: only new/changed objects plus the new
/// cross-reference section, for appending after `prev_len` bytes of an
/// existing file.
pub fn render_update(
    prev_len: u64,
    objects: &[IndirectObject],
    revision: &mut RevisionIndex,
    handler: Option<&dyn SecurityHandler>,
) -> Result<Vec<u8>> {
    render_once(prev_len, None, objects, revision, handler)?;
    render_once(prev_len, None, objects, revision, handler)
}
