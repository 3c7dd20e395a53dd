//! Plain-text tables for source previews and target-field listings.

use std::borrow::Cow;
use std::fmt::Write as _;

/// Cells wider than this are cut and end in `…`.
pub const MAX_CELL_WIDTH: usize = 40;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let header_cells = headers.iter().map(|h| fit_cell(h)).collect::<Vec<_>>();
    let body = rows
        .iter()
        .map(|row| row.iter().take(headers.len()).map(|c| fit_cell(c)).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let mut widths = header_cells
        .iter()
        .map(|h| display_width(h).max(1))
        .collect::<Vec<_>>();
    for row in &body {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(&header_cells, &widths));
    let rule = widths.iter().map(|w| "-".repeat((*w).max(3))).collect::<Vec<_>>();
    let rule_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
    for row in &body {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row<S: AsRef<str>>(cells: &[S], widths: &[usize]) -> String {
    let mut line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let cell = cell.as_ref();
            let padding = width.saturating_sub(display_width(cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    let trimmed = line.trim_end().len();
    line.truncate(trimmed);
    line
}

/// Replaces control characters and truncates to [`MAX_CELL_WIDTH`].
fn fit_cell(value: &str) -> Cow<'_, str> {
    let sanitized: Cow<'_, str> = if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    };
    if display_width(&sanitized) <= MAX_CELL_WIDTH || sanitized.contains('\u{1b}') {
        return sanitized;
    }
    let mut cut = sanitized.chars().take(MAX_CELL_WIDTH - 1).collect::<String>();
    cut.push('…');
    Cow::Owned(cut)
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape such as \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_cells_are_truncated() {
        let headers = vec!["note".to_string()];
        let rows = vec![vec!["x".repeat(100)]];
        let rendered = render_table(&headers, &rows);
        let last = rendered.lines().last().unwrap();
        assert_eq!(last.chars().count(), MAX_CELL_WIDTH);
        assert!(last.ends_with('…'));
    }
}
