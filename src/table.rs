use std::borrow::Cow;
use std::fmt::Write as _;

/// Renders `rows` under `headers` as space-aligned plain text. Rows may be
/// ragged: missing cells render blank and cells beyond the last header are
/// dropped.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule = widths
        .iter()
        .map(|w| "-".repeat((*w).max(1)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// Like [`render_table`] with a leading `#` column numbering rows from
/// `first_number`.
pub fn render_numbered(headers: &[String], rows: &[Vec<String>], first_number: usize) -> String {
    let mut numbered_headers = Vec::with_capacity(headers.len() + 1);
    numbered_headers.push("#".to_string());
    numbered_headers.extend(headers.iter().cloned());
    let numbered_rows = rows
        .iter()
        .enumerate()
        .map(|(offset, row)| {
            let mut cells = Vec::with_capacity(row.len() + 1);
            cells.push((first_number + offset).to_string());
            cells.extend(row.iter().cloned());
            cells
        })
        .collect::<Vec<_>>();
    render_table(&numbered_headers, &numbered_rows)
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, width) in widths.iter().enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let cell = values
            .get(idx)
            .map(|value| sanitize_cell(value))
            .unwrap_or(Cow::Borrowed(""));
        let padding = width.saturating_sub(display_width(&cell));
        line.push_str(&cell);
        line.push_str(&" ".repeat(padding));
    }
    line.truncate(line.trim_end().len());
    line
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn aligns_columns_and_pads_ragged_rows() {
        let rendered = render_table(
            &owned(&["id", "name", "note"]),
            &[owned(&["1", "Alice", "x"]), owned(&["22"])],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec!["id  name   note", "--  -----  ----", "1   Alice  x", "22"]
        );
    }

    #[test]
    fn numbered_rows_start_at_requested_number() {
        let rendered = render_numbered(&owned(&["v"]), &[owned(&["a"]), owned(&["b"])], 1);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines, vec!["#  v", "-  -", "1  a", "2  b"]);
    }

    #[test]
    fn control_characters_become_spaces_and_extra_cells_drop() {
        let rendered = render_table(&owned(&["note"]), &[owned(&["line1\nline2", "extra"])]);
        assert_eq!(rendered.lines().nth(2), Some("line1 line2"));
    }
}
