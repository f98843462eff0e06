//! Turning event records into printable artifacts.
//!
//! Two renderers implement [`Renderer`]: [`HtmlRenderer`] produces one styled
//! markup document, [`PdfRenderer`] a paginated letter-size document with a
//! cover page. Both stamp the time they were run from an injected [`Clock`].

mod html;
pub mod layout;
mod pdf;

use chrono::NaiveDateTime;

use crate::{clock::file_stamp, error::RenderError, types::EventRecord};

pub use html::HtmlRenderer;
pub use pdf::PdfRenderer;

pub const REPORT_TITLE: &str = "EVENT DETAIL REPORT";
pub const CONSOLIDATED_TITLE: &str = "CONSOLIDATED EVENT DETAILS REPORT";

pub const NOTICE_LEAD: &str = "IMPORTANT!!!";
pub const NOTICE_LINES: [&str; 5] = [
    "This report should be printed each morning prior to completing each event.",
    "1. The Event Details Report should be kept in the event prep area for each demonstrator to review instructions and item status.",
    "2. The Event Co-ordinator should use this sheet when visiting the event area. Comments should be written to enter into the system at a later time.",
    "3. Remember to scan items for product charge using the Club Use function on the handheld device.",
    "Retention: This report should be kept in a monthly folder with the most recent being put in the front. The previous 6 months need to be kept accessible in the event prep area. Reports older than 6 months should be boxed and stored. Discard any report over 18 months old.",
];

pub const ITEM_COLUMNS: [&str; 5] = [
    "Item Number",
    "Primary Item Number",
    "Description",
    "Vendor",
    "Category",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Html,
    Pdf,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Html => "html",
            ArtifactKind::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Rendered bytes plus what they were rendered from. Immutable once produced.
#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    kind: ArtifactKind,
    bytes: Vec<u8>,
    event_ids: Vec<String>,
    generated_at: NaiveDateTime,
    consolidated: bool,
}

impl RenderedArtifact {
    pub fn new(
        kind: ArtifactKind,
        bytes: Vec<u8>,
        event_ids: Vec<String>,
        generated_at: NaiveDateTime,
    ) -> Self {
        Self {
            kind,
            bytes,
            event_ids,
            generated_at,
            consolidated: false,
        }
    }

    /// Mark this artifact as the combined report of a batch, whatever the
    /// number of events it ended up holding.
    pub fn into_consolidated(self) -> Self {
        Self {
            consolidated: true,
            ..self
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn event_ids(&self) -> &[String] {
        &self.event_ids
    }

    /// `edr_report_<id>_<stamp>.<ext>` for a single event,
    /// `consolidated_edr_reports_<stamp>.<ext>` for a combined report.
    pub fn default_file_name(&self) -> String {
        let stamp = file_stamp(self.generated_at);
        let ext = self.kind.extension();
        match self.event_ids.as_slice() {
            [id] if !self.consolidated => format!("edr_report_{}_{stamp}.{ext}", sanitize_for_file_name(id)),
            _ => format!("consolidated_edr_reports_{stamp}.{ext}"),
        }
    }
}

/// Event ids come from the portal; keep only characters safe in a file name.
fn sanitize_for_file_name(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

pub trait Renderer: Send + Sync {
    fn render(&self, events: &[EventRecord]) -> Result<RenderedArtifact, RenderError>;
}
