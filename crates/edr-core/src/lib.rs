//! EDR Printer Core Library
//!
//! Logs into the event-management portal, fetches Event Detail Report data,
//! renders it as markup or a paginated document, and saves or prints the result.

pub mod auth;
pub mod clock;
pub mod codes;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod format;
pub mod http;
pub mod pipeline;
pub mod render;
pub mod types;

// Re-export commonly used items at crate root
pub use auth::{CodePrompt, LoginObserver, LoginStage, Session};
pub use clock::{Clock, FixedClock, SystemClock};
pub use codes::{CodeCategory, describe_event_status, describe_event_type};
pub use config::{EdrConfig, LoginCredentials, PortalConfig};
pub use dispatch::{CommandRunner, Dispatcher, Platform, PrintMechanism, SystemCommandRunner};
pub use error::{AuthError, EventFailure, FetchError, PrintError, RenderError};
pub use fetch::{BrowseQuery, ReportFetcher, ResolvedBrowse};
pub use format::{format_browse_table, format_status_parts, format_summary};
pub use http::{HttpClient, MockHttpClient, ReqwestHttpClient};
pub use pipeline::{BatchMode, BatchObserver, BatchOptions, BatchReport, BatchRunner, EventOutcome};
pub use render::{ArtifactKind, HtmlRenderer, PdfRenderer, RenderedArtifact, Renderer};
pub use types::{Credential, EventRecord, EventSummary, ItemRecord};
