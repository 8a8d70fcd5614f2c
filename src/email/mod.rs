//! The `Email` aggregate.
//!
//! Accumulates envelope headers, text and HTML bodies, attachments and
//! embeds, and exposes the synthesized body tree. The body is memoized:
//! repeated [`Email::body`] calls return the same `Arc` until a
//! body-affecting field (text, html, attachments, embeds) changes.

use std::cell::RefCell;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MimeConfig;
use crate::errors::{ErrorKind, FrameworkError, FrameworkResult};
use crate::mime::encoder::{encode_header, format_date, write_header};
use crate::mime::{BodySynthesizer, DataPart, Part, TextPart};
use crate::types::{collect_addresses, Address, IntoAddress, Priority};

/// An email message under construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Email {
    #[serde(default)]
    config: MimeConfig,
    subject: Option<String>,
    date: Option<DateTime<FixedOffset>>,
    message_id: Option<String>,
    #[serde(default)]
    from: Vec<Address>,
    #[serde(default)]
    to: Vec<Address>,
    #[serde(default)]
    cc: Vec<Address>,
    #[serde(default)]
    bcc: Vec<Address>,
    #[serde(default)]
    reply_to: Vec<Address>,
    sender: Option<Address>,
    return_path: Option<Address>,
    priority: Option<Priority>,
    #[serde(default)]
    headers: Vec<(String, String)>,
    text: Option<TextPart>,
    html: Option<TextPart>,
    /// Attachments and embeds in registration order; embeds are inline.
    #[serde(default)]
    attachments: Vec<DataPart>,
    /// Body set explicitly; suspends synthesis until a body input changes.
    body: Option<Arc<Part>>,
    #[serde(skip)]
    cached_body: RefCell<Option<Arc<Part>>>,
}

impl Email {
    /// Creates an empty email with default MIME settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty email with the given MIME settings.
    pub fn with_config(config: MimeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns the MIME settings.
    pub fn config(&self) -> &MimeConfig {
        &self.config
    }

    // Single-value headers

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.subject = Some(subject.into());
        self
    }

    /// Returns the subject.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Sets the date.
    pub fn set_date(&mut self, date: DateTime<FixedOffset>) -> &mut Self {
        self.date = Some(date);
        self
    }

    /// Returns the date.
    pub fn date(&self) -> Option<&DateTime<FixedOffset>> {
        self.date.as_ref()
    }

    /// Sets the message ID (without angle brackets).
    pub fn set_message_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.message_id = Some(id.into());
        self
    }

    /// Returns the message ID.
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Sets the sender.
    pub fn set_sender(&mut self, address: impl IntoAddress) -> FrameworkResult<&mut Self> {
        self.sender = Some(address.into_address()?);
        Ok(self)
    }

    /// Returns the sender.
    pub fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    /// Sets the return path.
    pub fn set_return_path(&mut self, address: impl IntoAddress) -> FrameworkResult<&mut Self> {
        self.return_path = Some(address.into_address()?);
        Ok(self)
    }

    /// Returns the return path.
    pub fn return_path(&self) -> Option<&Address> {
        self.return_path.as_ref()
    }

    /// Sets the priority, clamped to 1..=5.
    pub fn set_priority(&mut self, priority: i64) -> &mut Self {
        self.priority = Some(Priority::from_level(priority));
        self
    }

    /// Returns the priority (normal when unset).
    pub fn priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }

    /// Adds a custom text header.
    pub fn add_text_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> FrameworkResult<&mut Self> {
        let name = name.into();
        if name.is_empty() || name.chars().any(|c| c.is_control() || c == ':' || c == ' ') {
            return Err(FrameworkError::new(
                ErrorKind::InvalidHeader,
                format!("Invalid header name: {}", name),
            ));
        }
        self.headers.push((name, value.into()));
        Ok(self)
    }

    /// Returns the custom headers.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    // Multi-value headers

    /// Replaces the From addresses.
    pub fn set_from<I, A>(&mut self, addresses: I) -> FrameworkResult<&mut Self>
    where
        I: IntoIterator<Item = A>,
        A: IntoAddress,
    {
        self.from = collect_addresses(addresses)?;
        Ok(self)
    }

    /// Appends From addresses.
    pub fn add_from<I, A>(&mut self, addresses: I) -> FrameworkResult<&mut Self>
    where
        I: IntoIterator<Item = A>,
        A: IntoAddress,
    {
        self.from.extend(collect_addresses(addresses)?);
        Ok(self)
    }

    /// Returns the From addresses.
    pub fn from(&self) -> &[Address] {
        &self.from
    }

    /// Replaces the To addresses.
    pub fn set_to<I, A>(&mut self, addresses: I) -> FrameworkResult<&mut Self>
    where
        I: IntoIterator<Item = A>,
        A: IntoAddress,
    {
        self.to = collect_addresses(addresses)?;
        Ok(self)
    }

    /// Appends To addresses.
    pub fn add_to<I, A>(&mut self, addresses: I) -> FrameworkResult<&mut Self>
    where
        I: IntoIterator<Item = A>,
        A: IntoAddress,
    {
        self.to.extend(collect_addresses(addresses)?);
        Ok(self)
    }

    /// Returns the To addresses.
    pub fn to(&self) -> &[Address] {
        &self.to
    }

    /// Replaces the Cc addresses.
    pub fn set_cc<I, A>(&mut self, addresses: I) -> FrameworkResult<&mut Self>
    where
        I: IntoIterator<Item = A>,
        A: IntoAddress,
    {
        self.cc = collect_addresses(addresses)?;
        Ok(self)
    }

    /// Appends Cc addresses.
    pub fn add_cc<I, A>(&mut self, addresses: I) -> FrameworkResult<&mut Self>
    where
        I: IntoIterator<Item = A>,
        A: IntoAddress,
    {
        self.cc.extend(collect_addresses(addresses)?);
        Ok(self)
    }

    /// Returns the Cc addresses.
    pub fn cc(&self) -> &[Address] {
        &self.cc
    }

    /// Replaces the Bcc addresses.
    pub fn set_bcc<I, A>(&mut self, addresses: I) -> FrameworkResult<&mut Self>
    where
        I: IntoIterator<Item = A>,
        A: IntoAddress,
    {
        self.bcc = collect_addresses(addresses)?;
        Ok(self)
    }

    /// Appends Bcc addresses.
    pub fn add_bcc<I, A>(&mut self, addresses: I) -> FrameworkResult<&mut Self>
    where
        I: IntoIterator<Item = A>,
        A: IntoAddress,
    {
        self.bcc.extend(collect_addresses(addresses)?);
        Ok(self)
    }

    /// Returns the Bcc addresses.
    pub fn bcc(&self) -> &[Address] {
        &self.bcc
    }

    /// Replaces the Reply-To addresses.
    pub fn set_reply_to<I, A>(&mut self, addresses: I) -> FrameworkResult<&mut Self>
    where
        I: IntoIterator<Item = A>,
        A: IntoAddress,
    {
        self.reply_to = collect_addresses(addresses)?;
        Ok(self)
    }

    /// Appends Reply-To addresses.
    pub fn add_reply_to<I, A>(&mut self, addresses: I) -> FrameworkResult<&mut Self>
    where
        I: IntoIterator<Item = A>,
        A: IntoAddress,
    {
        self.reply_to.extend(collect_addresses(addresses)?);
        Ok(self)
    }

    /// Returns the Reply-To addresses.
    pub fn reply_to(&self) -> &[Address] {
        &self.reply_to
    }

    // Bodies

    /// Sets the text body with the configured charset.
    pub fn set_text(&mut self, body: impl Into<String>) -> &mut Self {
        let charset = self.config.default_charset.clone();
        self.set_text_with_charset(body, charset)
    }

    /// Sets the text body with an explicit charset.
    pub fn set_text_with_charset(&mut self, body: impl Into<String>, charset: impl Into<String>) -> &mut Self {
        self.text = Some(
            TextPart::new(body)
                .with_charset(charset)
                .with_encoding(self.config.text_encoding),
        );
        self.invalidate_body();
        self
    }

    /// Sets the text body by draining a reader.
    pub fn set_text_from_reader<R: Read + ?Sized>(&mut self, reader: &mut R) -> FrameworkResult<&mut Self> {
        let body = read_text(reader)?;
        Ok(self.set_text(body))
    }

    /// Removes the text body.
    pub fn clear_text(&mut self) -> &mut Self {
        self.text = None;
        self.invalidate_body();
        self
    }

    /// Returns the text body.
    pub fn text(&self) -> Option<&str> {
        self.text.as_ref().map(|t| t.body.as_str())
    }

    /// Returns the text charset.
    pub fn text_charset(&self) -> Option<&str> {
        self.text.as_ref().map(|t| t.charset.as_str())
    }

    /// Sets the HTML body with the configured charset.
    pub fn set_html(&mut self, body: impl Into<String>) -> &mut Self {
        let charset = self.config.default_charset.clone();
        self.set_html_with_charset(body, charset)
    }

    /// Sets the HTML body with an explicit charset.
    pub fn set_html_with_charset(&mut self, body: impl Into<String>, charset: impl Into<String>) -> &mut Self {
        self.html = Some(
            TextPart::html(body)
                .with_charset(charset)
                .with_encoding(self.config.text_encoding),
        );
        self.invalidate_body();
        self
    }

    /// Sets the HTML body by draining a reader.
    pub fn set_html_from_reader<R: Read + ?Sized>(&mut self, reader: &mut R) -> FrameworkResult<&mut Self> {
        let body = read_text(reader)?;
        Ok(self.set_html(body))
    }

    /// Removes the HTML body.
    pub fn clear_html(&mut self) -> &mut Self {
        self.html = None;
        self.invalidate_body();
        self
    }

    /// Returns the HTML body.
    pub fn html(&self) -> Option<&str> {
        self.html.as_ref().map(|h| h.body.as_str())
    }

    /// Returns the HTML charset.
    pub fn html_charset(&self) -> Option<&str> {
        self.html.as_ref().map(|h| h.charset.as_str())
    }

    // Attachments and embeds

    /// Attaches in-memory bytes.
    pub fn attach(
        &mut self,
        body: impl Into<Vec<u8>>,
        name: Option<&str>,
        content_type: Option<&str>,
    ) -> FrameworkResult<&mut Self> {
        let part = describe(DataPart::new(body), name, content_type)?;
        Ok(self.add_part(part))
    }

    /// Attaches the contents of a reader, read now.
    pub fn attach_from_reader<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        name: Option<&str>,
        content_type: Option<&str>,
    ) -> FrameworkResult<&mut Self> {
        let part = describe(DataPart::from_reader(reader)?, name, content_type)?;
        Ok(self.add_part(part))
    }

    /// Attaches a file, read when the message is encoded.
    pub fn attach_from_path(
        &mut self,
        path: impl AsRef<Path>,
        name: Option<&str>,
        content_type: Option<&str>,
    ) -> FrameworkResult<&mut Self> {
        let part = describe(DataPart::from_path(path)?, name, content_type)?;
        Ok(self.add_part(part))
    }

    /// Embeds in-memory bytes for reference from the HTML body.
    pub fn embed(
        &mut self,
        body: impl Into<Vec<u8>>,
        name: Option<&str>,
        content_type: Option<&str>,
    ) -> FrameworkResult<&mut Self> {
        let part = describe(DataPart::new(body), name, content_type)?;
        Ok(self.add_part(part.as_inline()))
    }

    /// Embeds the contents of a reader, read now.
    pub fn embed_from_reader<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        name: Option<&str>,
        content_type: Option<&str>,
    ) -> FrameworkResult<&mut Self> {
        let part = describe(DataPart::from_reader(reader)?, name, content_type)?;
        Ok(self.add_part(part.as_inline()))
    }

    /// Embeds a file, read when the message is encoded.
    pub fn embed_from_path(
        &mut self,
        path: impl AsRef<Path>,
        name: Option<&str>,
        content_type: Option<&str>,
    ) -> FrameworkResult<&mut Self> {
        let part = describe(DataPart::from_path(path)?, name, content_type)?;
        Ok(self.add_part(part.as_inline()))
    }

    /// Registers a prepared data part.
    ///
    /// Inline parts are deduplicated on their identifier: registering an
    /// inline part whose name (or derived content ID) is already embedded
    /// leaves the email untouched.
    pub fn add_part(&mut self, part: DataPart) -> &mut Self {
        if part.is_inline() {
            let identifier = part.identifier();
            if self
                .attachments
                .iter()
                .any(|p| p.is_inline() && p.identifier() == identifier)
            {
                #[cfg(feature = "tracing")]
                tracing::debug!(identifier = %identifier, "Embed already registered");
                return self;
            }
        }

        self.attachments.push(part);
        self.invalidate_body();
        self
    }

    /// Returns attachments and embeds in registration order.
    pub fn attachments(&self) -> &[DataPart] {
        &self.attachments
    }

    // Body

    /// Replaces the synthesized body with an explicit part tree.
    ///
    /// The explicit body is returned until text, html, attachments or embeds
    /// change, after which synthesis resumes from those fields.
    pub fn set_body(&mut self, body: Part) -> &mut Self {
        self.cached_body.get_mut().take();
        self.body = Some(Arc::new(body));
        self
    }

    /// Returns the body tree, synthesizing it when needed.
    pub fn body(&self) -> FrameworkResult<Arc<Part>> {
        if let Some(body) = &self.body {
            return Ok(Arc::clone(body));
        }

        if let Some(cached) = self.cached_body.borrow().as_ref() {
            return Ok(Arc::clone(cached));
        }

        let synthesizer = BodySynthesizer::new(self.config.content_id_domain.as_str());
        let body = Arc::new(synthesizer.synthesize(
            self.text.as_ref(),
            self.html.as_ref(),
            &self.attachments,
        )?);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            media_type = body.media_type(),
            attachments = self.attachments.len(),
            "Body cache miss"
        );

        *self.cached_body.borrow_mut() = Some(Arc::clone(&body));
        Ok(body)
    }

    fn invalidate_body(&mut self) {
        self.body = None;
        self.cached_body.get_mut().take();
    }

    // Validation and rendering

    /// Checks that the email can be sent.
    pub fn ensure_validity(&self) -> FrameworkResult<()> {
        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(FrameworkError::logic(
                "An email must have a \"To\", \"Cc\", or \"Bcc\" header.",
            ));
        }

        if self.from.is_empty() && self.sender.is_none() {
            return Err(FrameworkError::logic(
                "An email must have a \"From\" or a \"Sender\" header.",
            ));
        }

        if self.from.len() > 1 && self.sender.is_none() {
            return Err(FrameworkError::logic(
                "A \"Sender\" header must be defined when there are several \"From\" addresses.",
            ));
        }

        if self.body.is_none() && self.text.is_none() && self.html.is_none() {
            return Err(FrameworkError::logic("A message must have a text or an HTML part."));
        }

        Ok(())
    }

    /// Renders the full message: headers, then the body tree.
    ///
    /// Bcc and Return-Path are envelope data and are not written.
    pub fn to_message_bytes(&self) -> FrameworkResult<Vec<u8>> {
        self.ensure_validity()?;

        let mut output = Vec::new();

        let date = self.date.unwrap_or_else(|| Utc::now().into());
        write_header(&mut output, "Date", &format_date(&date))?;

        if !self.from.is_empty() {
            write_header(&mut output, "From", &address_list(&self.from))?;
        }
        if let Some(sender) = &self.sender {
            write_header(&mut output, "Sender", &sender.to_header())?;
        }
        if !self.reply_to.is_empty() {
            write_header(&mut output, "Reply-To", &address_list(&self.reply_to))?;
        }
        if !self.to.is_empty() {
            write_header(&mut output, "To", &address_list(&self.to))?;
        }
        if !self.cc.is_empty() {
            write_header(&mut output, "Cc", &address_list(&self.cc))?;
        }
        if let Some(subject) = &self.subject {
            write_header(&mut output, "Subject", &encode_header(subject))?;
        }

        let message_id = self.message_id.clone().unwrap_or_else(|| {
            format!(
                "{}.{}@{}",
                Uuid::new_v4().simple(),
                date.timestamp(),
                self.config.message_id_domain
            )
        });
        write_header(&mut output, "Message-ID", &format!("<{}>", message_id))?;

        if let Some(priority) = self.priority {
            write_header(&mut output, "X-Priority", &priority.header_value())?;
        }

        for (name, value) in &self.headers {
            write_header(&mut output, name, &encode_header(value))?;
        }

        write_header(&mut output, "MIME-Version", "1.0")?;
        self.body()?.write_to(&mut output)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            message_id = %message_id,
            recipients = self.to.len() + self.cc.len() + self.bcc.len(),
            size = output.len(),
            "Rendered message"
        );

        Ok(output)
    }
}

fn address_list(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(Address::to_header)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe(mut part: DataPart, name: Option<&str>, content_type: Option<&str>) -> FrameworkResult<DataPart> {
    if let Some(name) = name {
        part = part.with_name(name);
    }
    match content_type {
        Some(content_type) => part.with_media_type(content_type),
        None => Ok(part),
    }
}

fn read_text<R: Read + ?Sized>(reader: &mut R) -> FrameworkResult<String> {
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|e| FrameworkError::io("Failed to read body stream", e))?;
    String::from_utf8(buf)
        .map_err(|e| FrameworkError::invalid_argument("Body stream is not valid UTF-8").with_cause(e))
}
