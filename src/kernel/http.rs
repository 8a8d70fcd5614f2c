//! Request and response values the kernel passes around.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::Value;

use crate::errors::{ErrorKind, FrameworkError, FrameworkResult};

/// Whether a request is the outermost one or issued while handling another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    /// The request that entered the application.
    Main,
    /// A request issued while handling another request.
    Sub,
}

/// An incoming request.
///
/// Attributes can be written through a shared reference so that request
/// listeners can annotate a request already on the stack (for example with
/// the `_controller` attribute).
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: BTreeMap<String, String>,
    headers: HeaderMap,
    attributes: RwLock<BTreeMap<String, Value>>,
}

impl Request {
    /// Creates a request from a method and a URI (path plus optional query).
    pub fn new(method: Method, uri: &str) -> FrameworkResult<Self> {
        let uri: Uri = uri.parse().map_err(|e| {
            FrameworkError::invalid_argument(format!("Invalid request URI \"{}\"", uri)).with_cause(e)
        })?;

        let query = uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default();

        Ok(Self {
            method,
            path: uri.path().to_string(),
            query,
            headers: HeaderMap::new(),
            attributes: RwLock::new(BTreeMap::new()),
        })
    }

    /// Creates a GET request.
    pub fn get(uri: &str) -> FrameworkResult<Self> {
        Self::new(Method::GET, uri)
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> FrameworkResult<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Sets an attribute.
    pub fn with_attribute(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Returns the method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns a query parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Returns the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns an attribute.
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Returns true if the attribute is set.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Sets an attribute.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }
}

/// An outgoing response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    content: String,
}

impl Default for Response {
    fn default() -> Self {
        Self::new("")
    }
}

impl Response {
    /// Creates a 200 response.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            content: content.into(),
        }
    }

    /// Sets the status code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Returns the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status code from a number.
    pub fn set_status_code(&mut self, code: u16) -> FrameworkResult<()> {
        self.status = StatusCode::from_u16(code).map_err(|e| {
            FrameworkError::invalid_argument(format!("The HTTP status code \"{}\" is not valid.", code))
                .with_cause(e)
        })?;
        Ok(())
    }

    /// Returns the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets a header, replacing existing values.
    pub fn insert_header(&mut self, name: &str, value: &str) -> FrameworkResult<()> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Returns the body.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replaces the body.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// 4xx
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// 5xx
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// 3xx
    pub fn is_redirection(&self) -> bool {
        self.status.is_redirection()
    }
}

fn parse_header(name: &str, value: &str) -> FrameworkResult<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
        FrameworkError::new(ErrorKind::InvalidHeader, format!("Invalid header name: {}", name)).with_cause(e)
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| {
        FrameworkError::new(ErrorKind::InvalidHeader, format!("Invalid value for header {}", name))
            .with_cause(e)
    })?;
    Ok((header_name, header_value))
}
