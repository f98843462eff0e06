use crate::{
    codes::{describe_event_status, describe_event_type},
    pipeline::{BatchReport, EventOutcome},
    types::EventSummary,
};

/// `Generated + Printed + Saved`, listing only the steps that happened
pub fn format_status_parts(outcome: &EventOutcome) -> String {
    let mut parts = vec!["Generated"];
    if outcome.printed {
        parts.push("Printed");
    }
    if outcome.saved_to.is_some() {
        parts.push("Saved");
    }
    parts.join(" + ")
}

/// Format the end-of-run summary as plain text
pub fn format_summary(report: &BatchReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Total Events: {}\n", report.total()));
    output.push_str(&format!("Successful: {}\n", report.successes().count()));
    output.push_str(&format!("Failed: {}\n", report.failures().count()));

    if report.failures().next().is_some() {
        output.push_str("\nFailed Events:\n");
        for outcome in report.failures() {
            let reason = outcome
                .failure
                .as_ref()
                .map(|f| f.to_string())
                .unwrap_or_default();
            output.push_str(&format!("  • {}: {}\n", outcome.event_id, reason));
        }
    }

    if report.successes().next().is_some() {
        output.push_str("\nSuccessful Events:\n");
        for outcome in report.successes() {
            output.push_str(&format!(
                "  • {}: {}\n",
                outcome.event_id,
                format_status_parts(outcome)
            ));
            if let Some(path) = &outcome.saved_to {
                output.push_str(&format!("    {}\n", path.display()));
            }
        }
    }

    if let Some(consolidated) = &report.consolidated {
        output.push('\n');
        let copies = report.outcomes.iter().filter(|o| o.saved_to.is_some()).count();
        output.push_str(&format!("Individual HTML reports: {copies}\n"));
        match &consolidated.saved_to {
            Some(path) => output.push_str(&format!(
                "Consolidated report ({} events): {}\n",
                consolidated.event_ids.len(),
                path.display()
            )),
            None => output.push_str(&format!(
                "Consolidated report ({} events) was not saved\n",
                consolidated.event_ids.len()
            )),
        }
        if let Some(Err(e)) = &consolidated.print {
            output.push_str(&format!("Consolidated print failed: {e}\n"));
        }
        if let Some(Err(e)) = &consolidated.opened {
            output.push_str(&format!("Could not open consolidated report: {e}\n"));
        }
    }

    output
}

/// Format browse results as an aligned table
pub fn format_browse_table(events: &[EventSummary]) -> String {
    if events.is_empty() {
        return "No events found.\n".to_string();
    }

    let rows: Vec<[String; 5]> = events
        .iter()
        .map(|e| {
            [
                e.event_id.clone(),
                e.date.clone(),
                describe_event_type(&e.type_code),
                describe_event_status(&e.status_code),
                e.name.clone(),
            ]
        })
        .collect();

    let header = ["Event ID", "Date", "Type", "Status", "Name"];
    let mut widths = header.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: [&str; 5]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut output = line(header);
    for row in &rows {
        output.push_str(&line(row.each_ref().map(String::as_str)));
    }
    output.push_str(&format!("\n{} event(s)\n", events.len()));
    output
}
