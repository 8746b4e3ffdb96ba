//! Table rendering for list output.

use serde_json::Value;

use crate::config::Theme;

const MAX_CELL: usize = 40;

/// Column header and the camelCase field it shows.
pub type Column = (&'static str, &'static str);

/// Render `items` as a table in the given theme. Light is plain
/// whitespace-aligned text; dark draws box borders.
pub fn render_table(items: &[Value], columns: &[Column], theme: Theme) -> String {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| columns.iter().map(|(_, key)| cell(&item[*key])).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, (header, _))| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(header.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let headers: Vec<String> = columns.iter().map(|(h, _)| h.to_string()).collect();
    match theme {
        Theme::Light => light(&headers, &rows, &widths),
        Theme::Dark => dark(&headers, &rows, &widths),
    }
}

fn light(headers: &[String], rows: &[Vec<String>], widths: &[usize]) -> String {
    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(widths)
            .map(|(c, w)| pad(c, *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let mut out = vec![line(headers)];
    out.extend(rows.iter().map(|r| line(r)));
    out.join("\n")
}

fn dark(headers: &[String], rows: &[Vec<String>], widths: &[usize]) -> String {
    let rule = |l: &str, m: &str, r: &str| -> String {
        let segs: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}", l, segs.join(m), r)
    };
    let line = |cells: &[String]| -> String {
        let segs: Vec<String> = cells.iter().zip(widths).map(|(c, w)| format!(" {} ", pad(c, *w))).collect();
        format!("│{}│", segs.join("│"))
    };

    let mut out = vec![rule("┌", "┬", "┐"), line(headers), rule("├", "┼", "┤")];
    out.extend(rows.iter().map(|r| line(r)));
    out.push(rule("└", "┴", "┘"));
    out.join("\n")
}

fn pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    format!("{}{}", s, " ".repeat(width.saturating_sub(len)))
}

fn cell(v: &Value) -> String {
    let s = match v {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if s.chars().count() > MAX_CELL {
        let cut: String = s.chars().take(MAX_CELL - 1).collect();
        format!("{}…", cut)
    } else {
        s
    }
}
