//! Sonda - client-side network traffic interceptor with heuristic tagging
//!
//! This library wraps the four transport entry points a page sends traffic
//! through (simple requests, streaming requests, fire-and-forget beacons and
//! persistent connections), turns every call into one uniform
//! [`CapturedRequest`], tags it with security-relevant categories and keeps
//! the result in an in-memory [`Session`] log for inspection and export.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sonda::transport::{HttpRequest, TransportHost, Transports};
//! use sonda::{CaptureConfig, Session, Tag};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let host = Arc::new(TransportHost::new(Transports::http_default()?));
//! let session = Session::new(CaptureConfig::default())?;
//! session.start(&host);
//!
//! host.request().send(HttpRequest::get("https://example.com/login")).await?;
//!
//! assert!(session.find_by_tag(Tag::Auth).len() == 1);
//! println!("{}", session.table());
//! session.stop();
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod body;
pub mod classify;
pub mod cli;
pub mod config;
pub mod context;
pub mod csv_output;
pub mod curl_output;
pub mod error;
pub mod export;
pub mod filter;
pub mod har_output;
pub mod json_output;
pub mod overlay;
pub mod race;
pub mod record;
pub mod session;
pub mod table;
pub mod transport;

pub use body::RequestBody;
pub use classify::Classifier;
pub use config::CaptureConfig;
pub use error::{Result, SondaError, TransportError};
pub use export::ExportFormat;
pub use filter::RecordFilter;
pub use record::{CapturedRequest, Tag, TagSet, TransportKind};
pub use session::{Session, SessionListener, Tally};
