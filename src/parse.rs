//! PDF object syntax parsing.
//!
//! Recursive-descent parsing of PDF object syntax on byte slices,
//! returning `nom::IResult` so callers can compose and resume. Unlike a
//! full document loader, this module only understands object syntax:
//! primitives, arrays, dictionaries, streams, references, and indirect
//! object wrappers. Escape decoding (literal string escapes, `#XX`
//! name escapes) happens during the scan.

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use nom::error::ErrorKind;
use nom::IResult;

/// PDF whitespace per ISO 32000 §7.2.2: NUL, TAB, LF, FF, CR, SPACE.
fn is_pdf_whitespace(b: u8) -> bool {
    matches!(b, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

/// Delimiters that terminate a bare token.
fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn parse_err<T>(input: &[u8], kind: ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// Skip whitespace and `%` comments.
pub fn skip_ws(mut input: &[u8]) -> &[u8] {
    loop {
        let before = input.len();
        while let [b, rest @ ..] = input {
            if is_pdf_whitespace(*b) {
                input = rest;
            } else {
                break;
            }
        }
        if input.first() == Some(&b'%') {
            while let [b, rest @ ..] = input {
                if *b == b'\r' || *b == b'\n' {
                    break;
                }
                input = rest;
            }
        }
        if input.len() == before {
            return input;
        }
    }
}

/// Match a keyword followed by a token boundary (whitespace, delimiter,
/// or end of input).
fn keyword<'a>(input: &'a [u8], word: &str) -> Option<&'a [u8]> {
    let word = word.as_bytes();
    let rest = input.strip_prefix(word)?;
    match rest.first() {
        Some(&b) if !is_pdf_whitespace(b) && !is_delimiter(b) => None,
        _ => Some(rest),
    }
}

/// Read an unsigned decimal number.
pub(crate) fn unsigned(input: &[u8]) -> IResult<&[u8], u64> {
    let end = input
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(input.len());
    if end == 0 {
        return parse_err(input, ErrorKind::Digit);
    }
    let text = std::str::from_utf8(&input[..end]).expect("digits are ASCII");
    match text.parse() {
        Ok(v) => Ok((&input[end..], v)),
        Err(_) => parse_err(input, ErrorKind::Digit),
    }
}

/// Parse an integer or real, with optional sign and bare fractions
/// (`.5`, `5.`, `-.002`).
fn number(input: &[u8]) -> IResult<&[u8], Object> {
    let mut pos = 0;
    if matches!(input.first(), Some(b'+') | Some(b'-')) {
        pos += 1;
    }
    let int_digits = input[pos..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    pos += int_digits;
    let mut is_real = false;
    if input.get(pos) == Some(&b'.') {
        is_real = true;
        pos += 1;
        pos += input[pos..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
    }
    if int_digits == 0 && !is_real {
        return parse_err(input, ErrorKind::Digit);
    }
    let text = std::str::from_utf8(&input[..pos]).expect("number bytes are ASCII");
    let rest = &input[pos..];
    if is_real {
        match text.parse::<f64>() {
            Ok(v) => Ok((rest, Object::Real(v))),
            Err(_) => parse_err(input, ErrorKind::Float),
        }
    } else {
        match text.parse::<i64>() {
            Ok(v) => Ok((rest, Object::Integer(v))),
            Err(_) => parse_err(input, ErrorKind::Digit),
        }
    }
}

/// Parse a name, decoding `#XX` escapes (ISO 32000 §7.3.5).
fn name(input: &[u8]) -> IResult<&[u8], Object> {
    let Some(mut rest) = input.strip_prefix(b"/") else {
        return parse_err(input, ErrorKind::Char);
    };
    let mut out = String::new();
    while let Some(&b) = rest.first() {
        if is_pdf_whitespace(b) || is_delimiter(b) {
            break;
        }
        if b == b'#' && rest.len() >= 3 {
            let hex = std::str::from_utf8(&rest[1..3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte as char);
                rest = &rest[3..];
                continue;
            }
        }
        out.push(b as char);
        rest = &rest[1..];
    }
    Ok((rest, Object::Name(out)))
}

/// Parse a literal string, decoding escapes and balancing nested
/// parentheses (ISO 32000 §7.3.4.2).
fn literal_string(input: &[u8]) -> IResult<&[u8], Object> {
    let Some(rest) = input.strip_prefix(b"(") else {
        return parse_err(input, ErrorKind::Char);
    };
    let mut out = Vec::new();
    let mut depth = 1usize;
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            b'\\' => {
                i += 1;
                match rest.get(i) {
                    Some(b'n') => out.push(b'\n'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'b') => out.push(0x08),
                    Some(b'f') => out.push(0x0C),
                    Some(b'(') => out.push(b'('),
                    Some(b')') => out.push(b')'),
                    Some(b'\\') => out.push(b'\\'),
                    // Line continuation: backslash-EOL is dropped.
                    Some(b'\n') => {},
                    Some(b'\r') => {
                        if rest.get(i + 1) == Some(&b'\n') {
                            i += 1;
                        }
                    },
                    Some(&d) if (b'0'..b'8').contains(&d) => {
                        let mut value = 0u32;
                        let mut digits = 0;
                        while digits < 3 {
                            match rest.get(i) {
                                Some(&d) if (b'0'..b'8').contains(&d) => {
                                    value = value * 8 + u32::from(d - b'0');
                                    digits += 1;
                                    i += 1;
                                },
                                _ => break,
                            }
                        }
                        out.push((value & 0xFF) as u8);
                        continue;
                    },
                    // Unknown escape: the backslash is dropped, the
                    // character kept.
                    Some(&other) => out.push(other),
                    None => break,
                }
                i += 1;
            },
            b'(' => {
                depth += 1;
                out.push(b'(');
                i += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&rest[i + 1..], Object::String(out)));
                }
                out.push(b')');
                i += 1;
            },
            b => {
                out.push(b);
                i += 1;
            },
        }
    }
    parse_err(input, ErrorKind::Tag)
}

/// Parse a hex string `<...>`, ignoring interior whitespace and padding
/// an odd digit count with zero.
fn hex_string(input: &[u8]) -> IResult<&[u8], Object> {
    let Some(rest) = input.strip_prefix(b"<") else {
        return parse_err(input, ErrorKind::Char);
    };
    let mut digits = Vec::new();
    for (i, &b) in rest.iter().enumerate() {
        if b == b'>' {
            if digits.len() % 2 == 1 {
                digits.push(b'0');
            }
            let bytes = digits
                .chunks(2)
                .map(|pair| {
                    let hi = (pair[0] as char).to_digit(16).expect("checked hex digit");
                    let lo = (pair[1] as char).to_digit(16).expect("checked hex digit");
                    (hi * 16 + lo) as u8
                })
                .collect();
            return Ok((&rest[i + 1..], Object::String(bytes)));
        }
        if b.is_ascii_hexdigit() {
            digits.push(b);
        } else if !is_pdf_whitespace(b) {
            return parse_err(input, ErrorKind::HexDigit);
        }
    }
    parse_err(input, ErrorKind::Tag)
}

/// Parse an array `[ obj ... ]`.
fn array(input: &[u8]) -> IResult<&[u8], Object> {
    let Some(mut rest) = input.strip_prefix(b"[") else {
        return parse_err(input, ErrorKind::Char);
    };
    let mut items = Vec::new();
    loop {
        rest = skip_ws(rest);
        if let Some(after) = rest.strip_prefix(b"]") {
            return Ok((after, Object::Array(items)));
        }
        let (after, obj) = parse_object(rest)?;
        items.push(obj);
        rest = after;
    }
}

/// Parse a dictionary `<< /Key value ... >>`, and, if followed by the
/// `stream` keyword, the stream payload as well.
fn dictionary(input: &[u8]) -> IResult<&[u8], Object> {
    let Some(mut rest) = input.strip_prefix(b"<<") else {
        return parse_err(input, ErrorKind::Tag);
    };
    let mut dict = Dict::new();
    loop {
        rest = skip_ws(rest);
        if let Some(after) = rest.strip_prefix(b">>") {
            rest = after;
            break;
        }
        let (after_key, key) = name(rest)?;
        let (after_value, value) = parse_object(after_key)?;
        if let Object::Name(key) = key {
            dict.insert(key, value);
        }
        rest = after_value;
    }

    let lookahead = skip_ws(rest);
    if let Some(after_keyword) = keyword(lookahead, "stream") {
        let (after_data, data) = stream_payload(after_keyword, &dict)?;
        return Ok((
            after_data,
            Object::Stream {
                dict,
                data: bytes::Bytes::from(data),
            },
        ));
    }
    Ok((rest, Object::Dictionary(dict)))
}

/// Read stream payload bytes after the `stream` keyword.
///
/// The /Length entry drives the read; when it is absent or indirect a
/// scan for `endstream` is used as a fallback (common in malformed
/// files, same leniency as parsing entries).
fn stream_payload<'a>(input: &'a [u8], dict: &Dict) -> IResult<&'a [u8], Vec<u8>> {
    // The keyword must be followed by CRLF or LF; CR alone is accepted
    // leniently.
    let input = if let Some(rest) = input.strip_prefix(b"\r\n") {
        rest
    } else if let Some(rest) = input.strip_prefix(b"\n") {
        rest
    } else if let Some(rest) = input.strip_prefix(b"\r") {
        log::warn!("stream keyword followed by CR alone");
        rest
    } else {
        log::warn!("no newline after stream keyword");
        input
    };

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        let length = length as usize;
        if input.len() >= length {
            let rest = skip_ws(&input[length..]);
            if let Some(after) = keyword(rest, "endstream") {
                return Ok((after, input[..length].to_vec()));
            }
        }
        log::warn!("/Length {} inconsistent with endstream, rescanning", length);
    }

    let pos = input
        .windows(b"endstream".len())
        .position(|w| w == b"endstream");
    match pos {
        Some(pos) => {
            let data = input[..pos].to_vec();
            // Back off the EOL that precedes the keyword.
            let data = match data.as_slice() {
                [head @ .., b'\r', b'\n'] => head.to_vec(),
                [head @ .., b'\n'] | [head @ .., b'\r'] => head.to_vec(),
                _ => data,
            };
            Ok((&input[pos + b"endstream".len()..], data))
        },
        None => parse_err(input, ErrorKind::Eof),
    }
}

/// Parse one PDF object.
///
/// Handles every content node shape, including `n g R` reference
/// lookahead after an integer.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let input = skip_ws(input);
    match input.first() {
        None => parse_err(input, ErrorKind::Eof),
        Some(b'/') => name(input),
        Some(b'[') => array(input),
        Some(b'(') => literal_string(input),
        Some(b'<') => {
            if input.starts_with(b"<<") {
                dictionary(input)
            } else {
                hex_string(input)
            }
        },
        Some(b't') | Some(b'f') | Some(b'n') => {
            if let Some(rest) = keyword(input, "true") {
                Ok((rest, Object::Boolean(true)))
            } else if let Some(rest) = keyword(input, "false") {
                Ok((rest, Object::Boolean(false)))
            } else if let Some(rest) = keyword(input, "null") {
                Ok((rest, Object::Null))
            } else {
                parse_err(input, ErrorKind::Tag)
            }
        },
        Some(_) => {
            let (rest, obj) = number(input)?;
            // An unsigned integer may open a reference: `n g R`.
            if let Object::Integer(n) = obj {
                if n >= 0 {
                    if let Some((rest, generation)) = reference_tail(rest) {
                        return Ok((
                            rest,
                            Object::Reference(ObjectRef::new(n as u32, generation)),
                        ));
                    }
                }
            }
            Ok((rest, obj))
        },
    }
}

/// Lookahead for ` g R` after an integer. Returns `None` when the input
/// is a plain integer.
fn reference_tail(input: &[u8]) -> Option<(&[u8], u16)> {
    let rest = skip_ws(input);
    if rest.len() == input.len() {
        return None; // A boundary is required between number and generation.
    }
    let (rest, generation) = unsigned(rest).ok()?;
    let generation = u16::try_from(generation).ok()?;
    let rest = skip_ws(rest);
    let rest = keyword(rest, "R")?;
    Some((rest, generation))
}

/// Parse an indirect object wrapper: `n g obj <object> endobj`.
pub fn parse_indirect(input: &[u8]) -> IResult<&[u8], (u32, u16, Object)> {
    let rest = skip_ws(input);
    let (rest, number) = unsigned(rest)?;
    let Ok(number) = u32::try_from(number) else {
        return parse_err(input, ErrorKind::Digit);
    };
    let rest = skip_ws(rest);
    let (rest, generation) = unsigned(rest)?;
    let Ok(generation) = u16::try_from(generation) else {
        return parse_err(input, ErrorKind::Digit);
    };
    let rest = skip_ws(rest);
    let Some(rest) = keyword(rest, "obj") else {
        return parse_err(input, ErrorKind::Tag);
    };
    let (rest, obj) = parse_object(rest)?;
    let rest = skip_ws(rest);
    let Some(rest) = keyword(rest, "endobj") else {
        return parse_err(input, ErrorKind::Tag);
    };
    Ok((rest, (number, generation, obj)))
}

/// Locate the file's final `startxref` entry point by scanning the tail
/// of the buffer.
pub fn find_startxref(bytes: &[u8]) -> Result<u64> {
    let tail_len = bytes.len().min(2048);
    let tail = &bytes[bytes.len() - tail_len..];
    let key = b"startxref";
    let pos = tail
        .windows(key.len())
        .rposition(|w| w == key)
        .ok_or_else(|| Error::InvalidPdf("startxref not found".to_string()))?;
    let rest = skip_ws(&tail[pos + key.len()..]);
    let (_, offset) = unsigned(rest)
        .map_err(|_| Error::InvalidPdf("startxref offset is not a number".to_string()))?;
    Ok(offset)
}
