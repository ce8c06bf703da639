//! Payload projection: summary slots and table bodies.

use crate::format::{escape_html, PLACEHOLDER};
use crate::registry::{field_text, ReportDescriptor, SummaryField};
use crate::Payload;

/// Headline value for a summary card.
pub fn card_value(desc: &ReportDescriptor, payload: &Payload) -> String {
    (desc.card_value)(payload)
}

/// Resolve one declared summary slot. Slots the descriptor does not know,
/// and fields the payload does not carry, render as an em dash.
pub fn summary_value(desc: &ReportDescriptor, slot: &str, payload: &Payload) -> String {
    let Some((_, field)) = desc.summary_fields.iter().find(|(name, _)| *name == slot) else {
        return PLACEHOLDER.to_string();
    };
    match field {
        SummaryField::Field(path) => {
            field_text(payload, path).unwrap_or_else(|| PLACEHOLDER.to_string())
        }
        SummaryField::Compute(f) => f(payload),
    }
}

/// Table body markup for a payload: one rendered `<tr>` per extracted row,
/// or a single empty-state row spanning `columns` cells.
pub fn table_html(desc: &ReportDescriptor, payload: &Payload, columns: usize) -> String {
    let rows = (desc.rows)(payload);
    if rows.is_empty() {
        let span = columns.max(1);
        return format!(
            "<tr><td colspan=\"{span}\" class=\"report-empty\">{}</td></tr>",
            escape_html(desc.empty_message)
        );
    }
    rows.iter().map(|row| (desc.render_row)(row)).collect()
}
