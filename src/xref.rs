//! Cross-reference entries and their two physical encodings.
//!
//! One logical entry set, two renderings: the traditional fixed-width
//! ASCII table (ISO 32000 §7.5.4) and the binary cross-reference
//! stream (§7.5.8) with big-endian fields sized by /W. In-use entries
//! hold their offset through an [`OffsetCell`] so the byte position can
//! be patched after the entry is registered.

use crate::codec;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::offset::OffsetCell;
use crate::parse;
use byteorder::{BigEndian, WriteBytesExt};

/// Widest field the stream encoding will accept, in bytes.
const MAX_FIELD_WIDTH: usize = 8;

/// One cross-reference entry.
#[derive(Debug, Clone, PartialEq)]
pub enum XrefEntry {
    /// Type 0: a member of the free list.
    Free {
        number: u32,
        generation: u16,
        /// Object number of the next free object.
        next_free: u32,
    },
    /// Type 1: a live object at a byte offset.
    InUse {
        number: u32,
        generation: u16,
        offset: OffsetCell,
    },
    /// Type 2: a live object stored inside an object stream.
    Compressed {
        number: u32,
        /// Number of the containing object stream.
        stream_number: u32,
        /// Position within the container, in stream order.
        index: u32,
    },
}

impl XrefEntry {
    /// Object number this entry describes.
    pub fn number(&self) -> u32 {
        match self {
            XrefEntry::Free { number, .. }
            | XrefEntry::InUse { number, .. }
            | XrefEntry::Compressed { number, .. } => *number,
        }
    }

    /// The three stream-encoding fields (type, second, third).
    pub fn fields(&self) -> [u64; 3] {
        match self {
            XrefEntry::Free {
                generation,
                next_free,
                ..
            } => [0, u64::from(*next_free), u64::from(*generation)],
            XrefEntry::InUse {
                generation, offset, ..
            } => [1, offset.get(), u64::from(*generation)],
            XrefEntry::Compressed {
                stream_number,
                index,
                ..
            } => [2, u64::from(*stream_number), u64::from(*index)],
        }
    }
}

/// Minimal big-endian width for a value, never less than one byte.
fn bytes_for(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

/// The minimal /W widths covering every entry. The type field is
/// always one byte.
pub fn field_widths(entries: &[XrefEntry]) -> [usize; 3] {
    let mut widths = [1, 1, 1];
    for entry in entries {
        let fields = entry.fields();
        widths[1] = widths[1].max(bytes_for(fields[1]));
        widths[2] = widths[2].max(bytes_for(fields[2]));
    }
    widths
}

/// Split entries into maximal runs of consecutive object numbers, for
/// an /Index array or table subsection headers. Input must be sorted
/// by object number.
pub fn index_runs(entries: &[XrefEntry]) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for entry in entries {
        match runs.last_mut() {
            Some((start, count)) if *start + *count == entry.number() => *count += 1,
            _ => runs.push((entry.number(), 1)),
        }
    }
    runs
}

/// Encode entries as a cross-reference stream payload: three
/// big-endian fields per entry, packed with the given widths.
pub fn encode_stream_payload(entries: &[XrefEntry], widths: [usize; 3]) -> Result<Vec<u8>> {
    for &w in &widths {
        if w == 0 || w > MAX_FIELD_WIDTH {
            return Err(Error::InvalidWidths(w));
        }
    }
    let mut out = Vec::with_capacity(entries.len() * widths.iter().sum::<usize>());
    for entry in entries {
        for (field, &width) in entry.fields().iter().zip(&widths) {
            out.write_uint::<BigEndian>(*field, width)?;
        }
    }
    Ok(out)
}

/// Decode a cross-reference stream payload.
///
/// `index` gives the (start, count) runs the payload covers; a zero
/// type width defaults every entry to type 1 per §7.5.8.2.
pub fn decode_stream_payload(
    data: &[u8],
    widths: &[usize],
    index: &[(u32, u32)],
) -> Result<Vec<XrefEntry>> {
    if widths.len() != 3 {
        return Err(Error::InvalidWidths(widths.len()));
    }
    for &w in widths {
        if w > MAX_FIELD_WIDTH {
            return Err(Error::InvalidWidths(w));
        }
    }
    let record = widths.iter().sum::<usize>();
    let total: usize = index.iter().map(|(_, count)| *count as usize).sum();
    if data.len() < total * record {
        return Err(Error::TruncatedPayload {
            expected: total * record,
            actual: data.len(),
        });
    }

    let mut entries = Vec::with_capacity(total);
    let mut pos = 0;
    for &(start, count) in index {
        for i in 0..count {
            let number = start + i;
            let mut fields = [0u64; 3];
            for (field, &width) in fields.iter_mut().zip(widths) {
                *field = read_be(&data[pos..pos + width]);
                pos += width;
            }
            if widths[0] == 0 {
                fields[0] = 1;
            }
            entries.push(match fields[0] {
                0 => XrefEntry::Free {
                    number,
                    generation: fields[2] as u16,
                    next_free: fields[1] as u32,
                },
                1 => XrefEntry::InUse {
                    number,
                    generation: fields[2] as u16,
                    offset: OffsetCell::new(fields[1]),
                },
                2 => XrefEntry::Compressed {
                    number,
                    stream_number: fields[1] as u32,
                    index: fields[2] as u32,
                },
                other => return Err(Error::UnknownEntryType(other)),
            });
        }
    }
    Ok(entries)
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b))
}

/// Parse a cross-reference stream object (/Type /XRef), yielding its
/// entries. The caller keeps the header dict for trailer keys.
pub fn parse_stream(obj: &Object) -> Result<Vec<XrefEntry>> {
    let (dict, data) = match obj {
        Object::Stream { dict, data } => (dict, data),
        other => {
            return Err(Error::InvalidObjectType {
                expected: "XRef stream",
                found: other.type_name(),
            })
        },
    };
    if !obj.is_stream_of_type("XRef") {
        return Err(Error::InvalidObjectType {
            expected: "XRef stream",
            found: "stream",
        });
    }
    let size = dict
        .get("Size")
        .and_then(Object::as_integer)
        .ok_or(Error::MissingSize)?;
    let widths: Vec<usize> = match dict.get("W") {
        Some(Object::Array(arr)) => arr
            .iter()
            .map(|o| o.as_integer().map(|v| v as usize))
            .collect::<Option<_>>()
            .ok_or(Error::InvalidWidths(0))?,
        _ => return Err(Error::InvalidWidths(0)),
    };
    let index: Vec<(u32, u32)> = match dict.get("Index") {
        Some(Object::Array(arr)) => arr
            .chunks(2)
            .map(|pair| match pair {
                [a, b] => match (a.as_integer(), b.as_integer()) {
                    (Some(start), Some(count)) => Some((start as u32, count as u32)),
                    _ => None,
                },
                _ => None,
            })
            .collect::<Option<_>>()
            .ok_or_else(|| Error::InvalidPdf("malformed /Index array".to_string()))?,
        _ => vec![(0, size as u32)],
    };

    let raw = codec::decode_filtered(data, &codec::filter_names(dict.get("Filter")))?;
    decode_stream_payload(&raw, &widths, &index)
}

/// Whether `sections` describes exactly `entries`, in order, with
/// consecutive numbers per section.
fn sections_cover(entries: &[XrefEntry], sections: &[(u32, u32)]) -> bool {
    let mut iter = entries.iter();
    for &(start, count) in sections {
        for i in 0..count {
            match iter.next() {
                Some(entry) if entry.number() == start + i => {},
                _ => return false,
            }
        }
    }
    iter.next().is_none()
}

/// Render entries as a traditional table section: `xref`, subsection
/// headers, then 20-byte fixed-width records.
///
/// When `sections` is given and still describes the entry set exactly,
/// its subsection boundaries are reused, so re-rendering a parsed
/// table that was not touched is byte-stable even if the original
/// writer split runs non-maximally. Otherwise maximal contiguous runs
/// are computed.
///
/// Compressed entries have no table representation and are rejected;
/// in hybrid files they belong in the companion stream.
pub fn encode_table(entries: &[XrefEntry], sections: Option<&[(u32, u32)]>) -> Result<Vec<u8>> {
    let runs = match sections {
        Some(sections) if sections_cover(entries, sections) => sections.to_vec(),
        _ => index_runs(entries),
    };
    let mut out = Vec::new();
    out.extend_from_slice(b"xref\n");
    let mut pos = 0;
    for (start, count) in runs {
        out.extend_from_slice(format!("{} {}\n", start, count).as_bytes());
        for entry in &entries[pos..pos + count as usize] {
            match entry {
                XrefEntry::Free {
                    generation,
                    next_free,
                    ..
                } => {
                    out.extend_from_slice(
                        format!("{:010} {:05} f \n", next_free, generation).as_bytes(),
                    );
                },
                XrefEntry::InUse {
                    generation, offset, ..
                } => {
                    out.extend_from_slice(
                        format!("{:010} {:05} n \n", offset.get(), generation).as_bytes(),
                    );
                },
                XrefEntry::Compressed { number, .. } => {
                    return Err(Error::InvalidPdf(format!(
                        "compressed entry {} cannot appear in a table",
                        number
                    )))
                },
            }
        }
        pos += count as usize;
    }
    Ok(out)
}

/// Parse a traditional table section starting at the `xref` keyword.
/// Returns the entries, the subsection headers as written, and the
/// remaining input positioned at the `trailer` keyword.
pub fn parse_table(input: &[u8]) -> Result<(Vec<XrefEntry>, Vec<(u32, u32)>, &[u8])> {
    let start_len = input.len();
    let rest = parse::skip_ws(input);
    let mut rest = match rest.strip_prefix(b"xref") {
        Some(rest) => rest,
        None => {
            return Err(Error::Parse {
                offset: (start_len - rest.len()) as u64,
                reason: "expected xref keyword".to_string(),
            })
        },
    };

    let mut entries = Vec::new();
    let mut sections = Vec::new();
    loop {
        let after_ws = parse::skip_ws(rest);
        let Ok((after_start, start)) = parse::unsigned(after_ws) else {
            // No further subsection header; the trailer follows.
            rest = after_ws;
            break;
        };
        let (after_count, count) = parse::unsigned(parse::skip_ws(after_start)).map_err(|_| {
            Error::Parse {
                offset: (start_len - after_start.len()) as u64,
                reason: "malformed subsection header".to_string(),
            }
        })?;
        sections.push((start as u32, count as u32));
        rest = after_count;
        for i in 0..count {
            let number = (start + i) as u32;
            let line = parse::skip_ws(rest);
            let (line, offset) = parse::unsigned(line).map_err(|_| Error::Parse {
                offset: (start_len - line.len()) as u64,
                reason: format!("malformed entry for object {}", number),
            })?;
            let line = parse::skip_ws(line);
            let (line, generation) = parse::unsigned(line).map_err(|_| Error::Parse {
                offset: (start_len - line.len()) as u64,
                reason: format!("malformed entry for object {}", number),
            })?;
            let line = parse::skip_ws(line);
            match line.first() {
                Some(b'n') => entries.push(XrefEntry::InUse {
                    number,
                    generation: generation as u16,
                    offset: OffsetCell::new(offset),
                }),
                Some(b'f') => entries.push(XrefEntry::Free {
                    number,
                    generation: generation as u16,
                    next_free: offset as u32,
                }),
                other => {
                    return Err(Error::Parse {
                        offset: (start_len - line.len()) as u64,
                        reason: format!("bad entry type {:?} for object {}", other, number),
                    })
                },
            }
            rest = &line[1..];
        }
    }
    Ok((entries, sections, rest))
}
