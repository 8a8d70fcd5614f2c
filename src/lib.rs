//! # Integrations Framework
//!
//! Building blocks shared by web integrations:
//! - MIME body-tree synthesis from text, html, attachments and embedded
//!   images, with `cid:` reference rewriting
//! - An email aggregate with memoized body synthesis and RFC 5322 output
//! - An event-driven HTTP kernel (request, controller, view, response,
//!   exception, finish and terminate stages) with a balanced request stack
//! - Lock-store and cache-adapter selection from pre-built clients or
//!   connection strings
//!
//! ## Quick Start
//!
//! ```rust
//! use integrations_framework::{Email, Part};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut email = Email::new();
//! email
//!     .add_from(["sender@example.com"])?
//!     .add_to(["recipient@example.com"])?
//!     .set_subject("Hello")
//!     .set_text("Plain body")
//!     .set_html("<p>Rich body</p>");
//!
//! let body = email.body()?;
//! assert!(matches!(body.as_ref(), Part::Alternative(_)));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod types;

// MIME composition
pub mod mime;
pub mod email;

// HTTP kernel
pub mod kernel;

// Backend selection
pub mod store;
pub mod cache;

// Observability
pub mod observability;

// Mocks for testing
pub mod mocks;

// Re-exports for convenience
pub use config::{
    BackendConfig, BackendConfigBuilder, FrameworkConfig, KernelConfig, MimeConfig, MimeConfigBuilder,
};
pub use errors::{ErrorKind, ErrorSeverity, FrameworkError, FrameworkResult};
pub use types::{Address, IntoAddress, Priority};
pub use mime::{
    AlternativePart, BodySynthesizer, ContentDisposition, DataBody, DataPart, MixedPart, Part, RelatedPart,
    TextPart, TextSubtype, TransferEncoding,
};
pub use email::Email;
pub use kernel::{HttpKernel, HttpKernelBuilder};
pub use kernel::events::KernelEvents;
pub use kernel::http::{Request, RequestType, Response};
pub use kernel::request_stack::RequestStack;
pub use kernel::resolver::{
    ArgumentResolver, AttributeControllerResolver, Controller, ControllerResolver, ControllerResult,
    RequestAttributeArgumentResolver,
};
pub use store::{
    create_store, BackendClient, Capabilities, ClientLibraries, Connection, Key, PersistingStore, RedisClientKind, Store,
};
pub use cache::{create_adapter, create_connection, CacheAdapter, CacheConnection};
pub use observability::{KernelMetrics, KernelMetricsSnapshot, Timer};
