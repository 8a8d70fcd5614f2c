//! Transport encoding of part trees.
//!
//! Headers are folded at 78 columns, non-ASCII header text is RFC 2047
//! encoded, text bodies are CRLF-normalized before encoding and binary bodies
//! are base64 wrapped at 76 columns.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, FixedOffset};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use super::{DataPart, Part, TextPart, TransferEncoding};
use crate::config::DEFAULT_CONTENT_ID_DOMAIN;
use crate::errors::{ErrorKind, FrameworkError, FrameworkResult};

impl Part {
    /// Serializes the part, headers included.
    pub fn to_bytes(&self) -> FrameworkResult<Vec<u8>> {
        let mut output = Vec::new();
        self.write_to(&mut output)?;
        Ok(output)
    }

    /// Appends the serialized part to `output`.
    pub fn write_to(&self, output: &mut Vec<u8>) -> FrameworkResult<()> {
        match self {
            Part::Text(text) => write_text(output, text),
            Part::Data(data) => write_data(output, data),
            Part::Alternative(alt) => write_multipart(output, "alternative", alt.boundary(), alt.parts().iter()),
            Part::Related(rel) => write_multipart(
                output,
                "related",
                rel.boundary(),
                std::iter::once(rel.main()).chain(rel.related().iter()),
            ),
            Part::Mixed(mixed) => write_multipart(output, "mixed", mixed.boundary(), mixed.parts().iter()),
        }
    }
}

fn write_text(output: &mut Vec<u8>, part: &TextPart) -> FrameworkResult<()> {
    write_header(
        output,
        "Content-Type",
        &format!("{}; charset={}", part.media_type(), part.charset),
    )?;
    write_header(output, "Content-Transfer-Encoding", part.encoding.header_value())?;
    output.extend_from_slice(b"\r\n");

    let body = normalize_line_endings(&part.body);
    match part.encoding {
        TransferEncoding::QuotedPrintable => {
            output.extend_from_slice(&quoted_printable::encode(body.as_bytes()));
        }
        TransferEncoding::Base64 => write_base64(output, body.as_bytes()),
        TransferEncoding::SevenBit | TransferEncoding::EightBit => {
            output.extend_from_slice(body.as_bytes());
        }
    }
    Ok(())
}

fn write_data(output: &mut Vec<u8>, part: &DataPart) -> FrameworkResult<()> {
    let content_type = match &part.name {
        Some(name) => format!("{}; {}", part.media_type, filename_param("name", name)),
        None => part.media_type.clone(),
    };
    write_header(output, "Content-Type", &content_type)?;
    write_header(output, "Content-Transfer-Encoding", TransferEncoding::Base64.header_value())?;

    let disposition = match &part.name {
        Some(name) => format!(
            "{}; {}; {}",
            part.disposition,
            filename_param("name", name),
            filename_param("filename", name)
        ),
        None => part.disposition.to_string(),
    };
    write_header(output, "Content-Disposition", &disposition)?;

    if part.is_inline() || part.has_content_id() {
        write_header(
            output,
            "Content-ID",
            &format!("<{}>", part.content_id(DEFAULT_CONTENT_ID_DOMAIN)),
        )?;
    }
    output.extend_from_slice(b"\r\n");

    write_base64(output, &part.bytes()?);
    Ok(())
}

fn write_multipart<'a>(
    output: &mut Vec<u8>,
    subtype: &str,
    boundary: &str,
    parts: impl Iterator<Item = &'a Part>,
) -> FrameworkResult<()> {
    write_header(
        output,
        "Content-Type",
        &format!("multipart/{}; boundary=\"{}\"", subtype, boundary),
    )?;
    output.extend_from_slice(b"\r\n");

    for part in parts {
        output.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        part.write_to(output)?;
        output.extend_from_slice(b"\r\n");
    }

    output.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    Ok(())
}

/// Renders a `name`/`filename` parameter, switching to RFC 2231 for
/// non-ASCII values.
fn filename_param(param: &str, value: &str) -> String {
    if value.is_ascii() && !value.contains('"') {
        format!("{}=\"{}\"", param, value)
    } else {
        format!("{}*=utf-8''{}", param, utf8_percent_encode(value, NON_ALPHANUMERIC))
    }
}

fn write_base64(output: &mut Vec<u8>, data: &[u8]) {
    let encoded = BASE64.encode(data);
    for chunk in encoded.as_bytes().chunks(76) {
        output.extend_from_slice(chunk);
        output.extend_from_slice(b"\r\n");
    }
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").replace('\n', "\r\n")
}

/// Writes a folded header line.
pub(crate) fn write_header(output: &mut Vec<u8>, name: &str, value: &str) -> FrameworkResult<()> {
    if name.is_empty() || name.chars().any(|c| c.is_control() || c == ':' || c == ' ') {
        return Err(FrameworkError::new(
            ErrorKind::InvalidHeader,
            format!("Invalid header name: {}", name),
        ));
    }
    if value.contains(['\r', '\n']) {
        return Err(FrameworkError::new(
            ErrorKind::InvalidHeader,
            format!("Header \"{}\" cannot contain line breaks", name),
        ));
    }

    let header = format!("{}: {}", name, value);
    output.extend_from_slice(fold_header(&header).as_bytes());
    output.extend_from_slice(b"\r\n");
    Ok(())
}

/// Folds a header line at 78 characters.
pub(crate) fn fold_header(header: &str) -> String {
    if header.len() <= 78 {
        return header.to_string();
    }

    let mut result = String::new();
    let mut current_line = String::new();

    for word in header.split(' ') {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= 76 {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            result.push_str(&current_line);
            result.push_str("\r\n ");
            current_line = word.to_string();
        }
    }

    result.push_str(&current_line);
    result
}

/// Largest UTF-8 chunk whose base64 form keeps an encoded word within the
/// 75 characters RFC 2047 allows.
const ENCODED_WORD_MAX_BYTES: usize = 45;

/// Encodes a header value using RFC 2047 when it is not plain ASCII.
///
/// Long values become several space-separated encoded words, split on char
/// boundaries, so folding can break between them.
pub(crate) fn encode_header(value: &str) -> String {
    if value.chars().all(|c| c.is_ascii() && !c.is_control()) {
        return value.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_MAX_BYTES {
            words.push(encoded_word(&chunk));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk));
    }
    words.join(" ")
}

fn encoded_word(chunk: &str) -> String {
    format!("=?utf-8?B?{}?=", BASE64.encode(chunk.as_bytes()))
}

/// Formats a date for the `Date` header.
pub(crate) fn format_date(date: &DateTime<FixedOffset>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S %z").to_string()
}
