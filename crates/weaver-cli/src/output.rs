use serde::Serialize;

/// Cells longer than this are cut with a trailing ellipsis so one long
/// log message cannot blow out every row of the table.
const MAX_CELL_WIDTH: usize = 72;

pub enum Align {
    Left,
    Right,
}

pub struct Column {
    pub header: &'static str,
    pub align: Align,
}

/// A left-aligned text column.
pub fn text(header: &'static str) -> Column {
    Column {
        header,
        align: Align::Left,
    }
}

/// A right-aligned column for ids, counts, and percentages.
pub fn numeric(header: &'static str) -> Column {
    Column {
        header,
        align: Align::Right,
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(columns: &[Column], rows: Vec<Vec<String>>) {
    print!("{}", render_table(columns, rows));
}

fn render_table(columns: &[Column], rows: Vec<Vec<String>>) -> String {
    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| row.into_iter().map(truncate).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.header.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, &w)| pad(c.header, w, &c.align))
        .collect();
    out.push_str(header.join("  ").trim_end());
    out.push('\n');

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&sep.join("  "));
    out.push('\n');

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                let align = columns.get(i).map(|c| &c.align).unwrap_or(&Align::Left);
                pad(cell, w, align)
            })
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }

    out
}

fn pad(cell: &str, width: usize, align: &Align) -> String {
    match align {
        Align::Left => format!("{cell:<width$}"),
        Align::Right => format!("{cell:>width$}"),
    }
}

fn truncate(cell: String) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        return cell;
    }
    let cut: String = cell.chars().take(MAX_CELL_WIDTH - 3).collect();
    format!("{cut}...")
}
