//! Formatted output helpers for CLI commands.

use std::fmt::Write;

use lustmolch_common::types::ContainerRecord;

const HEADER: [&str; 5] = ["NAME", "SSH PORT", "ADDRESS", "URL", "USERS"];

/// Renders containers as an aligned, whitespace-separated table.
#[must_use]
pub fn container_table<'a>(records: impl IntoIterator<Item = &'a ContainerRecord>) -> String {
    let rows: Vec<[String; 5]> = records.into_iter().map(row).collect();

    let mut widths = HEADER.map(str::len);
    for r in &rows {
        for (w, cell) in widths.iter_mut().zip(r) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = format_line(&HEADER.map(String::from), &widths);
    for r in &rows {
        out.push_str(&format_line(r, &widths));
    }
    out
}

/// Formats an address pair as `host <-> container/len`.
#[must_use]
pub fn format_link(record: &ContainerRecord) -> String {
    format!(
        "{} <-> {}/{}",
        record.ip_address_host, record.ip_address_container, record.ip_subnet_length
    )
}

fn row(record: &ContainerRecord) -> [String; 5] {
    let users = if record.users.is_empty() {
        "-".to_string()
    } else {
        record.users.join(",")
    };
    [
        record.name.to_string(),
        record.ssh_port.to_string(),
        format_link(record),
        record.url.clone(),
        users,
    ]
}

fn format_line(cells: &[String; 5], widths: &[usize; 5]) -> String {
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if i + 1 == cells.len() {
            line.push_str(cell);
        } else {
            let _ = write!(line, "{cell:<width$}  ");
        }
    }
    line.push('\n');
    line
}
