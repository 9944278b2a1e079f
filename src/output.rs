//! Rendering of pages for the terminal.

use serde_json::json;

use crate::cli::OutputFormat;
use crate::db::Row;
use crate::query::Page;

/// Widest a text column gets; longer cells are cut.
const MAX_COLUMN_WIDTH: usize = 40;

/// Navigation state printed along with a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub has_prev: bool,
    pub has_next: bool,
}

/// Renders one page with its navigation state.
pub fn render_page(
    format: OutputFormat,
    keys: &[String],
    page: &Page,
    navigation: Navigation,
) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = format_table(keys, &page.rows);
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&format!(
                "-- page {} | {} rows | has_prev: {} | has_next: {}",
                page.number,
                page.rows.len(),
                navigation.has_prev,
                navigation.has_next
            ));
            output
        }
        OutputFormat::Json => json!({
            "columns": keys,
            "rows": rows_to_json(&page.rows),
            "page": page.number,
            "has_prev": navigation.has_prev,
            "has_next": navigation.has_next,
        })
        .to_string(),
    }
}

/// Renders a complete result collected in one go.
pub fn render_all(format: OutputFormat, keys: &[String], rows: &[Row], complete: bool) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = format_table(keys, rows);
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&format!("-- {} rows", rows.len()));
            if !complete {
                output.push_str(" (interrupted)");
            }
            output
        }
        OutputFormat::Json => json!({
            "columns": keys,
            "rows": rows_to_json(rows),
            "complete": complete,
        })
        .to_string(),
    }
}

fn rows_to_json(rows: &[Row]) -> serde_json::Value {
    rows.iter()
        .map(|row| row.iter().map(|value| value.to_json()).collect::<Vec<_>>())
        .collect()
}

/// Formats rows as an aligned table under the given headers.
fn format_table(headers: &[String], rows: &[Row]) -> String {
    if headers.is_empty() {
        return String::new();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| clip(&value.to_display_string()))
                .collect()
        })
        .collect();
    let headers: Vec<String> = headers.iter().map(|h| clip(h)).collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut output = String::new();
    output.push_str(&format_line(&headers, &widths));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    output.push_str(&separator.join("─┼─"));

    for row in &cells {
        output.push('\n');
        output.push_str(&format_line(row, &widths));
    }

    output
}

fn format_line(cells: &[String], widths: &[usize]) -> String {
    let line: Vec<String> = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let width = widths.get(i).copied().unwrap_or(0);
            format!("{:width$}", cell, width = width)
        })
        .collect();
    line.join(" │ ").trim_end().to_string()
}

/// Cuts a cell to `MAX_COLUMN_WIDTH` characters and keeps it on one line.
fn clip(text: &str) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= MAX_COLUMN_WIDTH {
        return single_line;
    }

    let mut clipped: String = single_line.chars().take(MAX_COLUMN_WIDTH - 3).collect();
    clipped.push_str("...");
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Value;
    use pretty_assertions::assert_eq;

    fn keys() -> Vec<String> {
        vec!["id".to_string(), "name".to_string()]
    }

    fn page() -> Page {
        Page {
            number: 2,
            rows: vec![
                vec![Value::Int(1), Value::from("Alice")],
                vec![Value::Int(22), Value::Null],
            ],
            is_last: true,
        }
    }

    #[test]
    fn test_text_table() {
        let nav = Navigation {
            has_prev: true,
            has_next: true,
        };
        let output = render_page(OutputFormat::Text, &keys(), &page(), nav);

        assert_eq!(
            output,
            "id │ name\n\
             ───┼──────\n\
             1  │ Alice\n\
             22 │ NULL\n\
             -- page 2 | 2 rows | has_prev: true | has_next: true"
        );
    }

    #[test]
    fn test_long_cells_are_clipped() {
        let long = "x".repeat(100);
        let rows = vec![vec![Value::String(long)]];
        let output = format_table(&["v".to_string()], &rows);
        let last = output.lines().last().unwrap();
        assert_eq!(last.chars().count(), MAX_COLUMN_WIDTH);
        assert!(last.ends_with("..."));
    }

    #[test]
    fn test_multiline_cell_stays_on_one_line() {
        assert_eq!(clip("a\nb"), "a b");
    }

    #[test]
    fn test_json_page() {
        let nav = Navigation {
            has_prev: true,
            has_next: false,
        };
        let output = render_page(OutputFormat::Json, &keys(), &page(), nav);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(
            parsed,
            json!({
                "columns": ["id", "name"],
                "rows": [[1, "Alice"], [22, null]],
                "page": 2,
                "has_prev": true,
                "has_next": false,
            })
        );
    }

    #[test]
    fn test_render_all_interrupted() {
        let output = render_all(OutputFormat::Text, &keys(), &page().rows, false);
        assert!(output.ends_with("-- 2 rows (interrupted)"));

        let output = render_all(OutputFormat::Json, &keys(), &[], true);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["complete"], json!(true));
    }

    #[test]
    fn test_no_headers_only_status() {
        let output = render_page(
            OutputFormat::Text,
            &[],
            &Page::default(),
            Navigation {
                has_prev: false,
                has_next: false,
            },
        );
        assert_eq!(output, "-- page 0 | 0 rows | has_prev: false | has_next: false");
    }
}
