//! Rendering primitives shared by the command handlers.

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};

use super::context::UiContext;
use super::theme::{bold, dim, Badge};

/// Section header.
pub fn header(ctx: &UiContext, title: &str) -> String {
    bold(title, ctx.color)
}

/// Aligned key/value line.
pub fn kv(ctx: &UiContext, key: &str, value: &str) -> String {
    format!("{} {}", dim(&format!("{:<12}", format!("{}:", key)), ctx.color), value)
}

/// Status line with a leading badge.
pub fn badge(ctx: &UiContext, kind: Badge, message: &str) -> String {
    format!("{} {}", kind.styled(ctx.color), message)
}

/// Hint line, printed after errors and empty results.
pub fn hint(ctx: &UiContext, message: &str) -> String {
    dim(&format!("Hint: {}", message), ctx.color)
}

/// Success badge followed by key/value details.
pub fn receipt(ctx: &UiContext, message: &str, details: &[(&str, String)]) -> String {
    let mut lines = vec![badge(ctx, Badge::Ok, message)];
    for (key, value) in details {
        lines.push(format!("  {}", kv(ctx, key, value)));
    }
    lines.join("\n")
}

/// Table for pretty mode, tab-separated rows otherwise.
pub fn simple_table(ctx: &UiContext, headers: &[&str], rows: &[Vec<String>]) -> String {
    if !ctx.mode.is_pretty() {
        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            lines.push(row.join("\t"));
        }
        return lines.join("\n");
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| bold(h, ctx.color)));
    for row in rows {
        table.add_row(row.clone());
    }
    table.to_string()
}
