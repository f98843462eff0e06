//! What goes on each logical page of the consolidated document.
//!
//! This module only decides content and order. Measuring, wrapping and
//! splitting across physical pages is left to the typesetter in `pdf.rs`.

use chrono::NaiveDateTime;

use crate::{
    codes::{describe_event_status, describe_event_type},
    types::EventRecord,
};

use super::{CONSOLIDATED_TITLE, ITEM_COLUMNS, NOTICE_LEAD, NOTICE_LINES, REPORT_TITLE};

/// Longest event name shown in the cover summary before it is cut
pub const SUMMARY_NAME_LIMIT: usize = 30;

const SIGNATURE_LABELS: [&str; 4] = [
    "Event Specialist Printed Name:",
    "Event Specialist Signature:",
    "Date Performed:",
    "Supervisor Signature:",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Column widths in inches
    pub widths: Vec<f32>,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub font_size: f32,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Heading(String),
    Paragraph {
        lead: Option<String>,
        lines: Vec<String>,
    },
    Table(Table),
    Signatures(Vec<String>),
    /// Vertical gap in points
    Spacer(f32),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogicalPage {
    pub blocks: Vec<Block>,
}

/// Cover page followed by one page per event.
pub fn consolidated_pages(events: &[EventRecord], generated_at: NaiveDateTime) -> Vec<LogicalPage> {
    let mut pages = Vec::with_capacity(events.len() + 1);
    pages.push(cover_page(events, generated_at));
    pages.extend(events.iter().map(event_page));
    pages
}

pub fn cover_page(events: &[EventRecord], generated_at: NaiveDateTime) -> LogicalPage {
    let mut blocks = vec![
        Block::Title(CONSOLIDATED_TITLE.to_string()),
        Block::Spacer(50.0),
        Block::Heading(format!(
            "Generated on {} at {}",
            generated_at.format("%Y-%m-%d"),
            generated_at.format("%H:%M:%S")
        )),
        Block::Spacer(30.0),
        Block::Heading(format!("Total Events: {}", events.len())),
        Block::Spacer(30.0),
    ];

    if !events.is_empty() {
        blocks.push(Block::Table(Table {
            widths: vec![1.2, 2.3, 1.5, 1.5],
            header: strings(&["Event ID", "Event Name", "Event Type", "Status"]),
            rows: events
                .iter()
                .map(|event| {
                    vec![
                        event.event_id.clone(),
                        truncate_name(&event.name),
                        describe_event_type(&event.type_code),
                        describe_event_status(&event.status_code),
                    ]
                })
                .collect(),
            font_size: 9.0,
            align: Align::Center,
        }));
    }

    LogicalPage { blocks }
}

pub fn event_page(event: &EventRecord) -> LogicalPage {
    let mut blocks = vec![
        Block::Title(REPORT_TITLE.to_string()),
        Block::Spacer(12.0),
        Block::Paragraph {
            lead: Some(NOTICE_LEAD.to_string()),
            lines: strings(&NOTICE_LINES),
        },
        Block::Spacer(20.0),
        Block::Table(header_table(
            vec![1.3, 2.0, 2.7],
            ["Event Number", "Event Type", "Event Locked"],
            [
                event.event_id.clone(),
                describe_event_type(&event.type_code),
                event.locked.clone(),
            ],
        )),
        Block::Spacer(3.0),
        Block::Table(header_table(
            vec![1.3, 1.5, 3.2],
            ["Event Status", "Event Date", "Event Name"],
            [
                describe_event_status(&event.status_code),
                event.date.clone(),
                event.name.clone(),
            ],
        )),
        Block::Spacer(20.0),
    ];

    if !event.items.is_empty() {
        blocks.push(Block::Table(Table {
            widths: vec![1.2, 1.2, 2.0, 1.0, 1.0],
            header: strings(&ITEM_COLUMNS),
            rows: event
                .items
                .iter()
                .map(|item| {
                    vec![
                        item.item_number.clone(),
                        item.primary_item_number.clone(),
                        item.description.clone(),
                        item.vendor.clone(),
                        item.department.clone(),
                    ]
                })
                .collect(),
            font_size: 9.0,
            align: Align::Center,
        }));
        blocks.push(Block::Spacer(20.0));
    }

    blocks.push(Block::Heading("MUST BE SIGNED AND DATED".to_string()));
    blocks.push(Block::Spacer(20.0));
    blocks.push(Block::Signatures(strings(&SIGNATURE_LABELS)));

    LogicalPage { blocks }
}

fn header_table(widths: Vec<f32>, labels: [&str; 3], values: [String; 3]) -> Table {
    Table {
        widths,
        header: strings(&labels),
        rows: vec![values.to_vec()],
        font_size: 10.0,
        align: Align::Left,
    }
}

/// Cut names longer than the cover-table limit and mark the cut with `...`.
pub fn truncate_name(name: &str) -> String {
    if name.chars().count() > SUMMARY_NAME_LIMIT {
        let head: String = name.chars().take(SUMMARY_NAME_LIMIT).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
