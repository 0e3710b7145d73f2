//! Object streams (/Type /ObjStm, ISO 32000 §7.5.7).
//!
//! An object stream packs the contents of many small objects into a
//! single compressed stream: a header of `number offset` pairs, then
//! the serialized bodies. Members lose their individual byte offsets;
//! the cross-reference side records them as type-2 entries pointing at
//! the container (see `xref::XrefEntry::Compressed`).

use crate::codec;
use crate::error::{Error, Result};
use crate::indirect::IndirectObject;
use crate::object::{Dict, Object};
use crate::parse;
use crate::writer::Serializer;
use bytes::Bytes;

/// Build an object-stream container holding the given members.
///
/// Members must carry generation 0 (the compressed entry format has no
/// generation field) and must not themselves be streams. The returned
/// stream is Flate-compressed.
pub fn pack(members: &[IndirectObject]) -> Result<Object> {
    let serializer = Serializer::new();
    let mut header = String::new();
    let mut bodies: Vec<u8> = Vec::new();

    for member in members {
        if member.is_placeholder() {
            return Err(Error::InvalidObjectNumber(member.number()));
        }
        if member.generation() != 0 {
            return Err(Error::CompressedGeneration(
                member.number() as u32,
                member.generation(),
            ));
        }
        if matches!(member.content(), Object::Stream { .. }) {
            return Err(Error::NestedObjectStream(member.number() as u32));
        }
        if !bodies.is_empty() {
            bodies.push(b'\n');
        }
        header.push_str(&format!("{} {} ", member.number(), bodies.len()));
        bodies.extend_from_slice(&serializer.serialize(member.content()));
    }
    // Newline terminates the pair header; offsets are relative to First.
    header.push('\n');

    let mut raw = header.into_bytes();
    let first = raw.len();
    raw.extend_from_slice(&bodies);
    let compressed = codec::encode_flate(&raw)?;

    let mut dict = Dict::new();
    dict.insert("Type".to_string(), Object::name("ObjStm"));
    dict.insert("N".to_string(), Object::Integer(members.len() as i64));
    dict.insert("First".to_string(), Object::Integer(first as i64));
    dict.insert("Filter".to_string(), Object::name("FlateDecode"));
    dict.insert("Length".to_string(), Object::Integer(compressed.len() as i64));
    Ok(Object::Stream {
        dict,
        data: Bytes::from(compressed),
    })
}

/// Unpack an object-stream container into its member objects.
///
/// Members come back flagged compressed and unmodified, in stream
/// order, all with generation 0.
pub fn unpack(container: &Object) -> Result<Vec<IndirectObject>> {
    let (dict, data) = match container {
        Object::Stream { dict, data } => (dict, data),
        other => {
            return Err(Error::InvalidObjectType {
                expected: "ObjStm stream",
                found: other.type_name(),
            })
        },
    };
    if !container.is_stream_of_type("ObjStm") {
        return Err(Error::InvalidObjectType {
            expected: "ObjStm stream",
            found: "stream",
        });
    }
    let count = dict
        .get("N")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N".to_string()))?;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First".to_string()))?
        as usize;

    let raw = codec::decode_filtered(data, &codec::filter_names(dict.get("Filter")))?;
    if first > raw.len() {
        return Err(Error::InvalidPdf(format!(
            "object stream /First {} beyond payload of {} bytes",
            first,
            raw.len()
        )));
    }

    let mut pairs = Vec::with_capacity(count as usize);
    let mut rest = &raw[..first];
    for _ in 0..count {
        let (after, number) = parse_pair_int(rest)?;
        let (after, offset) = parse_pair_int(after)?;
        rest = after;
        pairs.push((number as u32, offset as usize));
    }

    let bodies = &raw[first..];
    let mut members = Vec::with_capacity(pairs.len());
    for (number, offset) in pairs {
        if offset > bodies.len() {
            return Err(Error::InvalidPdf(format!(
                "object {} offset {} beyond object stream payload",
                number, offset
            )));
        }
        let (_, content) = parse::parse_object(&bodies[offset..]).map_err(|_| {
            Error::InvalidPdf(format!("malformed object {} in object stream", number))
        })?;
        let mut member = IndirectObject::parsed(number, 0, content, 0);
        member.set_compressed(true);
        members.push(member);
    }
    Ok(members)
}

fn parse_pair_int(input: &[u8]) -> Result<(&[u8], u64)> {
    parse::unsigned(parse::skip_ws(input))
        .map_err(|_| Error::InvalidPdf("malformed object stream pair header".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(number: i64, content: Object) -> IndirectObject {
        IndirectObject::new(number, 0, content).unwrap()
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let members = vec![
            member(11, Object::Integer(42)),
            member(12, Object::dict(vec![("Kind", Object::name("Note"))])),
            member(13, Object::Array(vec![Object::Boolean(true), Object::Null])),
        ];
        let container = pack(&members).unwrap();
        assert!(container.is_stream_of_type("ObjStm"));

        let unpacked = unpack(&container).unwrap();
        assert_eq!(unpacked.len(), 3);
        for (orig, got) in members.iter().zip(&unpacked) {
            assert_eq!(got.number(), orig.number());
            assert_eq!(got.generation(), 0);
            assert_eq!(got.content(), orig.content());
            assert!(got.is_compressed());
            assert!(!got.is_modified());
        }
    }

    #[test]
    fn test_pack_sets_n_and_first() {
        let members = vec![member(5, Object::Integer(1)), member(6, Object::Integer(2))];
        let container = pack(&members).unwrap();
        let dict = container.as_dict().unwrap();
        assert_eq!(dict.get("N").and_then(Object::as_integer), Some(2));
        let first = dict.get("First").and_then(Object::as_integer).unwrap();
        assert_eq!(first, b"5 0 6 2 \n".len() as i64);
    }

    #[test]
    fn test_pack_rejects_nonzero_generation() {
        let members = vec![IndirectObject::new(9, 1, Object::Null).unwrap()];
        let err = pack(&members).unwrap_err();
        assert!(matches!(err, Error::CompressedGeneration(9, 1)));
    }

    #[test]
    fn test_pack_rejects_streams() {
        let members = vec![member(
            4,
            Object::Stream {
                dict: Dict::new(),
                data: Bytes::from_static(b"data"),
            },
        )];
        let err = pack(&members).unwrap_err();
        assert!(matches!(err, Error::NestedObjectStream(4)));
    }

    #[test]
    fn test_pack_rejects_placeholder() {
        let members = vec![IndirectObject::placeholder(Object::Null)];
        assert!(pack(&members).is_err());
    }

    #[test]
    fn test_unpack_rejects_wrong_type() {
        let err = unpack(&Object::Integer(3)).unwrap_err();
        assert!(matches!(err, Error::InvalidObjectType { .. }));

        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("XRef"));
        let stream = Object::Stream {
            dict,
            data: Bytes::new(),
        };
        assert!(unpack(&stream).is_err());
    }

    #[test]
    fn test_unpack_empty_stream() {
        let container = pack(&[]).unwrap();
        assert!(unpack(&container).unwrap().is_empty());
    }
}
