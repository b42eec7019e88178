use crate::seating::{Seat, SeatCounts, SeatStatus};
use chrono::NaiveDate;
use std::path::Path;

pub const STUDENT_HEADERS: [&str; 4] = ["ID", "Name", "Roll Number", "Special Requirements"];

pub const SEATING_HEADERS: [&str; 8] = [
    "Seat",
    "Row",
    "Column",
    "Status",
    "Student ID",
    "Student Name",
    "Roll Number",
    "Special Requirements",
];

pub fn csv_field(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Header line as-is, then one quoted line per record. No trailing newline.
pub fn build_csv(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));
    for row in rows {
        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        lines.push(fields.join(","));
    }
    lines.join("\n")
}

pub fn export_file_name(entity: &str, date: NaiveDate) -> String {
    format!("{}_{}.csv", entity, date.format("%Y-%m-%d"))
}

/// Lowercase ASCII slug for file names; runs of other characters become `_`.
pub fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_sep = false;
    for ch in s.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        "plan".to_string()
    } else {
        out
    }
}

pub fn seating_rows(seats: &[Seat]) -> Vec<Vec<String>> {
    seats
        .iter()
        .map(|seat| {
            let occ = seat.occupant();
            vec![
                seat.label.clone(),
                (seat.row + 1).to_string(),
                (seat.col + 1).to_string(),
                seat.status().as_str().to_string(),
                occ.map(|o| o.student_id.clone()).unwrap_or_default(),
                occ.map(|o| o.name.clone()).unwrap_or_default(),
                occ.map(|o| o.roll_no.clone()).unwrap_or_default(),
                occ.and_then(|o| o.special_requirement.clone())
                    .unwrap_or_default(),
            ]
        })
        .collect()
}

pub fn write_text_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, contents)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PrintOptions {
    pub title: String,
    pub show_generated_at: bool,
    pub show_legend: bool,
    pub cell_width_px: u32,
}

fn status_color(status: SeatStatus) -> &'static str {
    match status {
        SeatStatus::Available => "#dcfce7",
        SeatStatus::Occupied => "#dbeafe",
        SeatStatus::Blocked => "#fee2e2",
        SeatStatus::Reserved => "#fef9c3",
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
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

pub struct PrintPlan<'a> {
    pub plan_name: &'a str,
    pub hall_name: &'a str,
    pub mode: &'a str,
    pub cols: usize,
    pub seats: &'a [Seat],
    pub generated_at: &'a str,
}

/// Standalone printable page: a grid of seat cells colored by status.
pub fn render_print_layout(plan: &PrintPlan<'_>, opts: &PrintOptions) -> String {
    let counts = SeatCounts::tally(plan.seats);
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "<title>{} - {}</title>\n",
        html_escape(&opts.title),
        html_escape(plan.plan_name)
    ));
    html.push_str("</head>\n<body style=\"font-family: sans-serif; margin: 16px;\">\n");
    html.push_str(&format!(
        "<h1 style=\"font-size: 20px;\">{}</h1>\n",
        html_escape(&opts.title)
    ));
    html.push_str(&format!(
        "<p>{} &middot; {} &middot; {}</p>\n",
        html_escape(plan.plan_name),
        html_escape(plan.hall_name),
        html_escape(plan.mode)
    ));
    if opts.show_generated_at {
        html.push_str(&format!(
            "<p style=\"color: #6b7280;\">Generated {}</p>\n",
            html_escape(plan.generated_at)
        ));
    }
    html.push_str(&format!(
        "<p>Occupied: {} &middot; Available: {} &middot; Blocked: {} &middot; Reserved: {}</p>\n",
        counts.occupied, counts.available, counts.blocked, counts.reserved
    ));
    html.push_str(
        "<div style=\"text-align: center; padding: 4px; margin-bottom: 8px; border: 1px solid #9ca3af;\">FRONT</div>\n",
    );
    html.push_str(&format!(
        "<div style=\"display: grid; grid-template-columns: repeat({}, {}px); gap: 4px;\">\n",
        plan.cols.max(1),
        opts.cell_width_px
    ));
    for seat in plan.seats {
        let mut body = format!("<strong>{}</strong>", html_escape(&seat.label));
        if let Some(o) = seat.occupant() {
            body.push_str(&format!(
                "<br>{}<br><small>{}</small>",
                html_escape(&o.name),
                html_escape(&o.roll_no)
            ));
            if let Some(req) = &o.special_requirement {
                body.push_str(&format!("<br><em>{}</em>", html_escape(req)));
            }
        } else if seat.status() != SeatStatus::Available {
            body.push_str(&format!("<br><small>{}</small>", seat.status().as_str()));
        }
        html.push_str(&format!(
            "<div style=\"background: {}; border: 1px solid #9ca3af; padding: 4px; font-size: 11px; text-align: center;\">{}</div>\n",
            status_color(seat.status()),
            body
        ));
    }
    html.push_str("</div>\n");
    if opts.show_legend {
        html.push_str("<div style=\"margin-top: 12px;\">\n");
        for status in [
            SeatStatus::Available,
            SeatStatus::Occupied,
            SeatStatus::Blocked,
            SeatStatus::Reserved,
        ] {
            html.push_str(&format!(
                "<span style=\"display: inline-block; background: {}; border: 1px solid #9ca3af; padding: 2px 8px; margin-right: 8px;\">{}</span>\n",
                status_color(status),
                status.as_str()
            ));
        }
        html.push_str("</div>\n");
    }
    html.push_str("<script>window.print();</script>\n</body>\n</html>\n");
    html
}
