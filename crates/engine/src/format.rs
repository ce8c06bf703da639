//! Number, currency and markup formatting helpers.
//!
//! The backend already ships `*_display` strings for most fields; these
//! helpers cover the places where the client formats on its own (card
//! fallbacks, row fragments) and must match the backend's conventions.

/// Em dash shown for missing or failed values.
pub const PLACEHOLDER: &str = "—";

/// Format a monetary amount the way the backend does: `RD$ 1,234.56`.
///
/// Two decimals, comma thousands separator, sign ahead of the amount.
pub fn format_currency(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as i64;
    let whole = format_int(cents / 100);
    let frac = cents % 100;
    let sign = if value < 0.0 && cents != 0 { "-" } else { "" };
    format!("RD$ {sign}{whole}.{frac:02}")
}

/// Integer with comma thousands separator.
pub fn format_int(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        out.push('-');
    }
    out.chars().rev().collect()
}

/// Escape a string for interpolation into an HTML fragment.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
