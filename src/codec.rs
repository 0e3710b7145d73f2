//! Stream filter codecs.
//!
//! The engine treats compression as a collaborator concern: object
//! streams and cross-reference streams only call `encode`/`decode`
//! here. Flate is provided because both stream kinds conventionally
//! carry it; anything else surfaces `Error::UnsupportedFilter` so a
//! richer filter pipeline can sit in front.

use crate::error::{Error, Result};
use crate::object::Object;
use std::io::{Read, Write};

/// Compress data with Flate (zlib), suitable for a /FlateDecode filter.
pub fn encode_flate(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress Flate (zlib) data.
pub fn decode_flate(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;

    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decode(format!("flate: {}", e)))?;
    Ok(out)
}

/// Extract filter names from a /Filter entry (a single name or an
/// array of names).
pub fn filter_names(filter: Option<&Object>) -> Vec<String> {
    match filter {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode stream data through its filter chain, in order.
pub fn decode_filtered(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for filter in filters {
        current = match filter.as_str() {
            "FlateDecode" | "Fl" => decode_flate(&current)?,
            other => return Err(Error::UnsupportedFilter(other.to_string())),
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flate_round_trip() {
        let data = b"repetitive repetitive repetitive payload".repeat(8);
        let encoded = encode_flate(&data).unwrap();
        assert!(encoded.len() < data.len());
        assert_eq!(decode_flate(&encoded).unwrap(), data);
    }

    #[test]
    fn test_decode_flate_rejects_garbage() {
        assert!(decode_flate(b"not zlib data").is_err());
    }

    #[test]
    fn test_filter_names() {
        assert_eq!(filter_names(Some(&Object::name("FlateDecode"))), vec!["FlateDecode"]);
        assert_eq!(
            filter_names(Some(&Object::Array(vec![
                Object::name("ASCII85Decode"),
                Object::name("FlateDecode"),
            ]))),
            vec!["ASCII85Decode", "FlateDecode"]
        );
        assert!(filter_names(None).is_empty());
        assert!(filter_names(Some(&Object::Integer(3))).is_empty());
    }

    #[test]
    fn test_decode_filtered_unknown_filter() {
        let err = decode_filtered(b"x", &["LZWDecode".to_string()]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFilter(name) if name == "LZWDecode"));
    }

    #[test]
    fn test_decode_filtered_identity() {
        assert_eq!(decode_filtered(b"plain", &[]).unwrap(), b"plain");
    }
}
