//! MIME body parts.
//!
//! A message body is an immutable tree of [`Part`] values:
//! - [`TextPart`] leaves for plain text and HTML
//! - [`DataPart`] leaves for attachments and inline resources
//! - [`AlternativePart`], [`RelatedPart`] and [`MixedPart`] containers
//!
//! Trees are built by [`synthesizer::BodySynthesizer`] and serialized by
//! [`Part::to_bytes`].

pub mod encoder;
pub mod synthesizer;

use std::fmt;
use std::borrow::Cow;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{DEFAULT_CHARSET, DEFAULT_CONTENT_ID_DOMAIN};
use crate::errors::{FrameworkError, FrameworkResult};

pub use synthesizer::BodySynthesizer;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferEncoding {
    /// 7-bit ASCII (no encoding).
    #[serde(rename = "7bit")]
    SevenBit,
    /// 8-bit data.
    #[serde(rename = "8bit")]
    EightBit,
    /// Quoted-printable encoding.
    #[default]
    QuotedPrintable,
    /// Base64 encoding.
    Base64,
}

impl TransferEncoding {
    /// Returns the header value.
    pub fn header_value(&self) -> &'static str {
        match self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
        }
    }
}

/// Content disposition of a data part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentDisposition {
    /// Shown as a separate file.
    #[default]
    Attachment,
    /// Rendered inside the message body.
    Inline,
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentDisposition::Attachment => write!(f, "attachment"),
            ContentDisposition::Inline => write!(f, "inline"),
        }
    }
}

/// Subtype of a text part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSubtype {
    /// `text/plain`
    #[default]
    Plain,
    /// `text/html`
    Html,
}

/// A text leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPart {
    /// Text content.
    pub body: String,
    /// Charset label.
    pub charset: String,
    /// Plain or HTML.
    pub subtype: TextSubtype,
    /// Content transfer encoding.
    pub encoding: TransferEncoding,
}

impl TextPart {
    /// Creates a `text/plain` part.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            charset: DEFAULT_CHARSET.to_string(),
            subtype: TextSubtype::Plain,
            encoding: TransferEncoding::default(),
        }
    }

    /// Creates a `text/html` part.
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            subtype: TextSubtype::Html,
            ..Self::new(body)
        }
    }

    /// Sets the charset.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Sets the transfer encoding.
    pub fn with_encoding(mut self, encoding: TransferEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Returns the media type without parameters.
    pub fn media_type(&self) -> &'static str {
        match self.subtype {
            TextSubtype::Plain => "text/plain",
            TextSubtype::Html => "text/html",
        }
    }
}

/// Body of a data part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataBody {
    /// Bytes captured in memory, serialized as base64.
    Bytes(#[serde(with = "base64_bytes")] Arc<[u8]>),
    /// File read when the part is encoded.
    File(PathBuf),
}

mod base64_bytes {
    use std::sync::Arc;

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<[u8]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map(Arc::from)
            .map_err(serde::de::Error::custom)
    }
}

/// A binary leaf: an attachment or an inline resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPart {
    /// Content.
    pub body: DataBody,
    /// File name, also the key `cid:` references match against.
    pub name: Option<String>,
    /// Media type (e.g., "image/gif").
    pub media_type: String,
    /// Explicit content ID (without angle brackets).
    pub content_id: Option<String>,
    /// Attachment or inline.
    pub disposition: ContentDisposition,
}

const DEFAULT_DATA_MEDIA_TYPE: &str = "application/octet-stream";

impl DataPart {
    /// Creates a part from in-memory bytes.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        let body: Vec<u8> = body.into();
        Self {
            body: DataBody::Bytes(Arc::from(body)),
            name: None,
            media_type: DEFAULT_DATA_MEDIA_TYPE.to_string(),
            content_id: None,
            disposition: ContentDisposition::Attachment,
        }
    }

    /// Creates a part by draining a reader.
    ///
    /// The reader is consumed from its current position; the caller keeps
    /// ownership of the handle.
    pub fn from_reader<R: Read + ?Sized>(reader: &mut R) -> FrameworkResult<Self> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| FrameworkError::io("Failed to read attachment stream", e))?;
        Ok(Self::new(buf))
    }

    /// Creates a part backed by a file.
    ///
    /// The path must name a readable file now; its bytes are read each time
    /// the part is encoded. Media type is guessed from the extension and the
    /// name defaults to the file name.
    pub fn from_path(path: impl AsRef<Path>) -> FrameworkResult<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| {
            FrameworkError::io(format!("Path \"{}\" is not readable", path.display()), e)
        })?;
        if !metadata.is_file() {
            return Err(FrameworkError::invalid_argument(format!(
                "Path \"{}\" is not a file",
                path.display()
            )));
        }

        let media_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(DEFAULT_DATA_MEDIA_TYPE)
            .to_string();

        Ok(Self {
            body: DataBody::File(path.to_path_buf()),
            name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            media_type,
            content_id: None,
            disposition: ContentDisposition::Attachment,
        })
    }

    /// Sets the file name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the media type after validating it.
    pub fn with_media_type(mut self, media_type: &str) -> FrameworkResult<Self> {
        let parsed: mime::Mime = media_type.parse().map_err(|_| {
            FrameworkError::invalid_argument(format!("Invalid media type \"{}\"", media_type))
        })?;
        self.media_type = parsed.essence_str().to_string();
        Ok(self)
    }

    /// Marks the part as inline.
    pub fn as_inline(mut self) -> Self {
        self.disposition = ContentDisposition::Inline;
        self
    }

    /// Sets an explicit content ID.
    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    /// Returns true for inline parts.
    pub fn is_inline(&self) -> bool {
        self.disposition == ContentDisposition::Inline
    }

    /// Returns true when an explicit content ID was set.
    pub fn has_content_id(&self) -> bool {
        self.content_id.is_some()
    }

    /// Returns the content ID, deriving one from the part identity when none
    /// was set.
    ///
    /// Derived IDs hash the name, else the file path, else the bytes, so the
    /// same resource always maps to the same `cid:` value.
    pub fn content_id(&self, domain: &str) -> String {
        if let Some(id) = &self.content_id {
            return id.clone();
        }

        let key: Cow<'_, [u8]> = match (&self.name, &self.body) {
            (Some(name), _) => Cow::Borrowed(name.as_bytes()),
            (None, DataBody::File(path)) => Cow::Owned(path.to_string_lossy().into_owned().into_bytes()),
            (None, DataBody::Bytes(bytes)) => Cow::Borrowed(bytes),
        };

        format!("{}@{}", Uuid::new_v5(&Uuid::NAMESPACE_URL, &key).simple(), domain)
    }

    /// Returns the identifier embeds are deduplicated on.
    pub fn identifier(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.content_id(DEFAULT_CONTENT_ID_DOMAIN),
        }
    }

    /// Returns the bytes, reading the backing file if needed.
    pub fn bytes(&self) -> FrameworkResult<Cow<'_, [u8]>> {
        match &self.body {
            DataBody::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
            DataBody::File(path) => std::fs::read(path).map(Cow::Owned).map_err(|e| {
                FrameworkError::io(format!("Failed to read \"{}\"", path.display()), e)
            }),
        }
    }
}

fn generate_boundary() -> String {
    format!("----=_Part_{}", Uuid::new_v4().simple())
}

/// Alternative renderings of the same content, least preferred first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativePart {
    parts: Vec<Part>,
    boundary: String,
}

impl AlternativePart {
    /// Creates the container; at least two renderings are required.
    pub fn new(parts: Vec<Part>) -> FrameworkResult<Self> {
        if parts.len() < 2 {
            return Err(FrameworkError::invalid_argument(
                "An alternative part needs at least two parts",
            ));
        }
        Ok(Self {
            parts,
            boundary: generate_boundary(),
        })
    }

    /// Returns the renderings.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Returns the boundary.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }
}

impl PartialEq for AlternativePart {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

/// A main part plus the resources it references by content ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedPart {
    main: Box<Part>,
    related: Vec<Part>,
    boundary: String,
}

impl RelatedPart {
    /// Creates the container; at least one related part is required.
    pub fn new(main: Part, related: Vec<Part>) -> FrameworkResult<Self> {
        if related.is_empty() {
            return Err(FrameworkError::invalid_argument(
                "A related part needs at least one related part",
            ));
        }
        Ok(Self {
            main: Box::new(main),
            related,
            boundary: generate_boundary(),
        })
    }

    /// Returns the main part.
    pub fn main(&self) -> &Part {
        &self.main
    }

    /// Returns the referenced parts.
    pub fn related(&self) -> &[Part] {
        &self.related
    }

    /// Returns the boundary.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }
}

impl PartialEq for RelatedPart {
    fn eq(&self, other: &Self) -> bool {
        self.main == other.main && self.related == other.related
    }
}

/// Heterogeneous parts, typically a body followed by attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixedPart {
    parts: Vec<Part>,
    boundary: String,
}

impl MixedPart {
    /// Creates the container; at least one part is required.
    pub fn new(parts: Vec<Part>) -> FrameworkResult<Self> {
        if parts.is_empty() {
            return Err(FrameworkError::invalid_argument("A mixed part needs at least one part"));
        }
        Ok(Self {
            parts,
            boundary: generate_boundary(),
        })
    }

    /// Returns the children.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Returns the boundary.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }
}

impl PartialEq for MixedPart {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

/// A node of a MIME body tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    /// Text leaf.
    Text(TextPart),
    /// Binary leaf.
    Data(DataPart),
    /// `multipart/alternative`
    Alternative(AlternativePart),
    /// `multipart/related`
    Related(RelatedPart),
    /// `multipart/mixed`
    Mixed(MixedPart),
}

impl Part {
    /// Returns the media type without parameters.
    pub fn media_type(&self) -> &str {
        match self {
            Part::Text(text) => text.media_type(),
            Part::Data(data) => &data.media_type,
            Part::Alternative(_) => "multipart/alternative",
            Part::Related(_) => "multipart/related",
            Part::Mixed(_) => "multipart/mixed",
        }
    }

    /// Returns the direct children of a container part.
    pub fn children(&self) -> Vec<&Part> {
        match self {
            Part::Text(_) | Part::Data(_) => Vec::new(),
            Part::Alternative(alt) => alt.parts.iter().collect(),
            Part::Related(rel) => std::iter::once(rel.main.as_ref()).chain(rel.related.iter()).collect(),
            Part::Mixed(mixed) => mixed.parts.iter().collect(),
        }
    }

    /// Renders an indented outline of the tree.
    pub fn as_debug_string(&self) -> String {
        let mut out = String::new();
        self.write_debug(&mut out, 0);
        out
    }

    fn write_debug(&self, out: &mut String, depth: usize) {
        if depth > 0 {
            out.push_str(&"  ".repeat(depth - 1));
            out.push_str("└ ");
        }
        out.push_str(self.media_type());
        match self {
            Part::Text(text) => {
                out.push_str(&format!(" charset: {}", text.charset));
            }
            Part::Data(data) => {
                out.push_str(&format!(" disposition: {}", data.disposition));
                if let Some(name) = &data.name {
                    out.push_str(&format!(" filename: {}", name));
                }
            }
            _ => {}
        }
        out.push('\n');
        for child in self.children() {
            child.write_debug(out, depth + 1);
        }
    }
}

impl From<TextPart> for Part {
    fn from(part: TextPart) -> Self {
        Part::Text(part)
    }
}

impl From<DataPart> for Part {
    fn from(part: DataPart) -> Self {
        Part::Data(part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_part_defaults() {
        let part = TextPart::new("hello");
        assert_eq!(part.charset, "utf-8");
        assert_eq!(part.encoding, TransferEncoding::QuotedPrintable);
        assert_eq!(part.media_type(), "text/plain");
        assert_eq!(TextPart::html("<p>").media_type(), "text/html");
    }

    #[test]
    fn test_content_id_is_deterministic() {
        let a = DataPart::new(b"GIF89a".to_vec()).with_name("test.gif");
        let b = DataPart::new(b"other".to_vec()).with_name("test.gif");
        assert_eq!(a.content_id("symfony"), b.content_id("symfony"));
        assert!(a.content_id("symfony").ends_with("@symfony"));

        let c = DataPart::new(b"GIF89a".to_vec()).with_content_id("logo@example.com");
        assert_eq!(c.content_id("symfony"), "logo@example.com");
    }

    #[test]
    fn test_media_type_validation() {
        assert!(DataPart::new(Vec::new()).with_media_type("image/png").is_ok());
        assert!(DataPart::new(Vec::new()).with_media_type("not a type").is_err());
    }

    #[test]
    fn test_from_reader_leaves_handle_usable() {
        let mut cursor = std::io::Cursor::new(b"abc".to_vec());
        let part = DataPart::from_reader(&mut cursor).unwrap();
        assert_eq!(part.bytes().unwrap().as_ref(), b"abc");
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_from_path_rejects_missing_file() {
        let err = DataPart::from_path("/definitely/not/here.pdf").unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Io);
    }

    #[test]
    fn test_container_arity() {
        assert!(AlternativePart::new(vec![TextPart::new("a").into()]).is_err());
        assert!(RelatedPart::new(TextPart::new("a").into(), vec![]).is_err());
        assert!(MixedPart::new(vec![]).is_err());
    }

    #[test]
    fn test_equality_ignores_boundary() {
        let a = MixedPart::new(vec![TextPart::new("a").into()]).unwrap();
        let b = MixedPart::new(vec![TextPart::new("a").into()]).unwrap();
        assert_ne!(a.boundary(), b.boundary());
        assert_eq!(a, b);
    }

    #[test]
    fn test_debug_string_outlines_tree() {
        let alt = AlternativePart::new(vec![TextPart::new("a").into(), TextPart::html("b").into()]).unwrap();
        let outline = Part::Alternative(alt).as_debug_string();
        assert!(outline.starts_with("multipart/alternative\n"));
        assert!(outline.contains("└ text/plain charset: utf-8"));
        assert!(outline.contains("└ text/html charset: utf-8"));
    }
}
