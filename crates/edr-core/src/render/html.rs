use chrono::NaiveDateTime;

use crate::{
    clock::Clock,
    codes::{describe_event_status, describe_event_type},
    error::RenderError,
    types::EventRecord,
};

use super::{
    ArtifactKind, ITEM_COLUMNS, NOTICE_LEAD, NOTICE_LINES, REPORT_TITLE, RenderedArtifact,
    Renderer,
};

const SIGNATURE_LINES: [&str; 5] = [
    "Club Associate Printed Name:",
    "Club Associate Signature:",
    "Club Associate Title:",
    "Date:",
    "Tastes & Tips Rep Signature:",
];

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; padding: 20px; margin: 0; }
        .detail-header { display: flex; justify-content: center; align-items: center; font-weight: 700; font-size: 24px; margin-bottom: 20px; }
        .element-padding { padding: 10px 0; }
        .run-stamp { font-size: 18px; margin: 10px 0; font-weight: bold; }
        .help-text { font-size: 14px; line-height: 1.2; }
        .notice-lead { margin-left: 20%; font-weight: bold; }
        .row { display: flex; padding: 5px; width: 100%; }
        .col { flex: 1; display: block; padding: 5px; }
        .col-25 { flex: 0 0 25%; max-width: 25%; }
        .col-40 { flex: 0 0 40%; max-width: 40%; }
        .demo-text { margin-left: 12px; font-weight: 700; }
        .instruction-heading { margin: 10px 0; font-size: 18px; font-weight: 500; }
        .report-footer div { padding: 2px 0; }
        .space-underlined { display: inline-block; width: calc(80% - 230px); border-bottom: 1px solid black; margin-left: 10px; }
        table { width: 100%; border-collapse: collapse; font-size: 94%; outline: #ccc solid 1px; table-layout: fixed; margin-bottom: 10px; }
        th { padding: 5px; background: #e2e1e1; font-size: 14px; font-weight: 400; color: grey; }
        td { padding: 8px; border-top: solid 1px #ccc; font-size: 12px; text-align: center; color: grey; line-height: 18px; }
        hr { border: 1px solid #ccc; margin: 10px 0; }
        .edr-page + .edr-page { page-break-before: always; break-before: page; }
        @media print {
            body { padding: 10px; }
            .print-button { display: none; }
        }
"#;

/// Styled markup renderer. All events go into one document, one page each.
pub struct HtmlRenderer {
    clock: Box<dyn Clock>,
}

impl HtmlRenderer {
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
        }
    }

    fn document(&self, events: &[EventRecord], now: NaiveDateTime) -> String {
        let date = now.format("%Y-%m-%d").to_string();
        let time = now.format("%H:%M:%S").to_string();

        let mut output = String::new();
        output.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        output.push_str("    <meta charset=\"utf-8\">\n");
        output.push_str("    <title>Event Management System - EDR Report</title>\n");
        output.push_str(&format!("    <style>{STYLE}    </style>\n"));
        output.push_str("</head>\n<body>\n");

        for event in events {
            output.push_str(&event_section(event, &date, &time));
        }

        output.push_str(concat!(
            "    <div class=\"print-button\" style=\"margin-top: 20px; text-align: right;\">\n",
            "        <button onclick=\"window.print()\">Print Report</button>\n",
            "    </div>\n",
        ));
        output.push_str("</body>\n</html>\n");
        output
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, events: &[EventRecord]) -> Result<RenderedArtifact, RenderError> {
        let generated_at = self.clock.now();
        let body = self.document(events, generated_at);
        tracing::debug!(events = events.len(), bytes = body.len(), "Rendered markup report");

        Ok(RenderedArtifact::new(
            ArtifactKind::Html,
            body.into_bytes(),
            events.iter().map(|e| e.event_id.clone()).collect(),
            generated_at,
        ))
    }
}

fn event_section(event: &EventRecord, date: &str, time: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "    <section class=\"edr-page\" id=\"edr-{}\">\n",
        escape(&event.event_id)
    ));
    output.push_str(&format!(
        "        <div class=\"detail-header\">{REPORT_TITLE}</div>\n"
    ));
    output.push_str(&format!(
        "        <div class=\"element-padding run-stamp\">RUN ON {date} AT {time}</div>\n"
    ));
    output.push_str("        <hr>\n");

    // Notice
    output.push_str("        <div class=\"element-padding help-text\">\n");
    output.push_str(&format!(
        "            <span class=\"notice-lead\">{NOTICE_LEAD}</span> {}<br>\n",
        escape(NOTICE_LINES[0])
    ));
    for line in &NOTICE_LINES[1..] {
        output.push_str(&format!("            {}<br>\n", escape(line)));
    }
    output.push_str("        </div>\n");
    output.push_str("        <hr>\n");

    // Header block
    let type_label = describe_event_type(&event.type_code);
    let status_label = describe_event_status(&event.status_code);
    output.push_str("        <div class=\"event-header\">\n");
    output.push_str(&header_row(&[
        ("col-25", "Event Number", event.event_id.as_str()),
        ("col-25", "Event Type", type_label.as_str()),
        ("col-40", "Event Locked", event.locked.as_str()),
    ]));
    output.push_str(&header_row(&[
        ("col-25", "Event Status", status_label.as_str()),
        ("col-25", "Event Date", event.date.as_str()),
        ("col-40", "Event Name", event.name.as_str()),
    ]));
    output.push_str("        </div>\n");

    // Items
    output.push_str("        <table class=\"items\">\n            <thead>\n                <tr>");
    for column in ITEM_COLUMNS {
        output.push_str(&format!("<th>{column}</th>"));
    }
    output.push_str("</tr>\n            </thead>\n            <tbody>\n");
    for item in &event.items {
        output.push_str(&format!(
            "                <tr class=\"item-row\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&item.item_number),
            escape(&item.primary_item_number),
            escape(&item.description),
            escape(&item.vendor),
            escape(&item.department),
        ));
    }
    output.push_str("            </tbody>\n        </table>\n");

    // Instructions
    output.push_str("        <h4 class=\"instruction-heading\">Instructions:</h4>\n");
    output.push_str(&format!(
        "        <div>Event Preparation: <span class=\"demo-text\">{}</span></div>\n",
        escape(&event.instructions.preparation)
    ));
    output.push_str(&format!(
        "        <div>Event Portion: <span class=\"demo-text\">{}</span></div>\n",
        escape(&event.instructions.portion)
    ));

    // Signatures
    output.push_str("        <div class=\"report-footer\">\n");
    for label in SIGNATURE_LINES {
        output.push_str(&format!(
            "            <div><span>{}</span><span class=\"space-underlined\"></span></div>\n",
            escape(label)
        ));
    }
    output.push_str("        </div>\n");
    output.push_str("    </section>\n");
    output
}

fn header_row(cells: &[(&str, &str, &str)]) -> String {
    let mut row = String::from("            <div class=\"row\">\n");
    for (width, label, value) in cells {
        row.push_str(&format!(
            "                <div class=\"col {width}\">{label} <span class=\"demo-text\">{}</span></div>\n",
            escape(value)
        ));
    }
    row.push_str("            </div>\n");
    row
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
