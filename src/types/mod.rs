//! Core value types for message composition.
//!
//! This module provides:
//! - Address types with validation
//! - The [`IntoAddress`] conversion used by every address accumulator
//! - Message priority with clamping

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::errors::{FrameworkError, FrameworkResult};
use crate::mime::encoder::encode_header;

/// Email address with optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Email address (e.g., "fabien@example.com").
    pub email: String,
    /// Display name (e.g., "Fabien").
    pub name: Option<String>,
}

impl Address {
    /// Creates a new address with just an email.
    pub fn new(email: impl Into<String>) -> FrameworkResult<Self> {
        let email = email.into();
        Self::validate_email(&email)?;
        Ok(Self { email, name: None })
    }

    /// Creates a new address with display name and email.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> FrameworkResult<Self> {
        let email = email.into();
        Self::validate_email(&email)?;
        let name = name.into();
        Ok(Self {
            email,
            name: if name.is_empty() { None } else { Some(name) },
        })
    }

    /// Parses an address from a string (e.g., "Fabien <fabien@example.com>").
    pub fn parse(s: &str) -> FrameworkResult<Self> {
        let s = s.trim();

        if let (Some(start), Some(end)) = (s.rfind('<'), s.rfind('>')) {
            if start < end {
                let name = s[..start].trim().trim_matches('"');
                let email = s[start + 1..end].trim();
                return Self::with_name(name, email);
            }
        }

        Self::new(s)
    }

    /// Validates an email address according to RFC 5321/5322.
    fn validate_email(email: &str) -> FrameworkResult<()> {
        if email.is_empty() {
            return Err(FrameworkError::invalid_address("Email address cannot be empty"));
        }

        if email.len() > 254 {
            return Err(FrameworkError::invalid_address(format!(
                "Email \"{}\" is too long (max 254 characters)",
                email
            )));
        }

        if email.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(FrameworkError::invalid_address(format!(
                "Email \"{}\" cannot contain whitespace or control characters",
                email
            )));
        }

        let (local, domain) = match email.split_once('@') {
            Some((local, domain)) if !domain.contains('@') => (local, domain),
            _ => {
                return Err(FrameworkError::invalid_address(format!(
                    "Email \"{}\" must contain exactly one @",
                    email
                )))
            }
        };

        if local.is_empty() || local.len() > 64 {
            return Err(FrameworkError::invalid_address(format!(
                "Email \"{}\" local part must be 1-64 characters",
                email
            )));
        }

        if domain.is_empty() {
            return Err(FrameworkError::invalid_address(format!(
                "Email \"{}\" domain cannot be empty",
                email
            )));
        }

        Ok(())
    }

    /// Returns the email part only.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the display name if present.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Formats the address for email headers.
    pub fn to_header(&self) -> String {
        match &self.name {
            Some(name) if !name.is_ascii() => {
                format!("{} <{}>", encode_header(name), self.email)
            }
            Some(name) => {
                if name.contains(|c: char| !c.is_alphanumeric() && c != ' ') {
                    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                    format!("\"{}\" <{}>", escaped, self.email)
                } else {
                    format!("{} <{}>", name, self.email)
                }
            }
            None => self.email.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_header())
    }
}

impl TryFrom<&str> for Address {
    type Error = FrameworkError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = FrameworkError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Address::parse(&s)
    }
}

/// Anything accepted where an address is expected.
///
/// Raw strings are parsed; pre-built [`Address`] values are moved in as-is.
pub trait IntoAddress {
    /// Converts into an [`Address`].
    fn into_address(self) -> FrameworkResult<Address>;
}

impl IntoAddress for Address {
    fn into_address(self) -> FrameworkResult<Address> {
        Ok(self)
    }
}

impl IntoAddress for &Address {
    fn into_address(self) -> FrameworkResult<Address> {
        Ok(self.clone())
    }
}

impl IntoAddress for &str {
    fn into_address(self) -> FrameworkResult<Address> {
        Address::parse(self)
    }
}

impl IntoAddress for String {
    fn into_address(self) -> FrameworkResult<Address> {
        Address::parse(&self)
    }
}

impl IntoAddress for &String {
    fn into_address(self) -> FrameworkResult<Address> {
        Address::parse(self)
    }
}

/// Converts a sequence of address inputs, preserving order.
pub fn collect_addresses<I, A>(addresses: I) -> FrameworkResult<Vec<Address>>
where
    I: IntoIterator<Item = A>,
    A: IntoAddress,
{
    addresses.into_iter().map(IntoAddress::into_address).collect()
}

/// Message priority, 1 (highest) to 5 (lowest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
pub enum Priority {
    /// 1 (Highest)
    Highest,
    /// 2 (High)
    High,
    /// 3 (Normal)
    #[default]
    Normal,
    /// 4 (Low)
    Low,
    /// 5 (Lowest)
    Lowest,
}

impl Priority {
    /// Creates a priority from any integer, clamping to [1, 5].
    pub fn from_level(level: i64) -> Self {
        match level.clamp(1, 5) {
            1 => Priority::Highest,
            2 => Priority::High,
            3 => Priority::Normal,
            4 => Priority::Low,
            _ => Priority::Lowest,
        }
    }

    /// Returns the numeric level.
    pub fn level(&self) -> u8 {
        match self {
            Priority::Highest => 1,
            Priority::High => 2,
            Priority::Normal => 3,
            Priority::Low => 4,
            Priority::Lowest => 5,
        }
    }

    /// Returns the label used in the `X-Priority` header.
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Highest => "Highest",
            Priority::High => "High",
            Priority::Normal => "Normal",
            Priority::Low => "Low",
            Priority::Lowest => "Lowest",
        }
    }

    /// Returns the `X-Priority` header value (e.g., "1 (Highest)").
    pub fn header_value(&self) -> String {
        format!("{} ({})", self.level(), self.label())
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.level()
    }
}

impl From<u8> for Priority {
    fn from(level: u8) -> Self {
        Priority::from_level(i64::from(level))
    }
}
