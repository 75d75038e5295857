//! Human-readable build report.
//!
//! Output depends only on the record and the generation timestamp: tag
//! groups are sorted by name, screenshots lexicographically, blank scalars
//! print a placeholder and the payload is reduced to its byte length.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};

use buildvault_catalog::{Build, FileData, Tag};

/// Printed for blank scalars and empty lists.
pub const PLACEHOLDER: &str = "N/A";

/// Printed when the payload could not be read.
pub const FILE_ERROR_PLACEHOLDER: &str = "error loading file data";

pub fn render_report(build: &Build, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();

    line(&mut out, "Build Report");
    line(&mut out, "============");
    field(
        &mut out,
        "Generated",
        &generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    out.push('\n');

    field(&mut out, "ID", &build.id.to_string());
    field(&mut out, "Name", scalar(Some(build.name.as_str())));
    field(&mut out, "Description", scalar(build.description.as_deref()));
    field(
        &mut out,
        "Creation notes",
        scalar(build.creation_notes.as_deref()),
    );
    out.push('\n');

    field(&mut out, "Authors", &tag_list(&build.authors));
    field(&mut out, "Themes", &tag_list(&build.themes));
    field(&mut out, "Colors", &tag_list(&build.colors));
    out.push('\n');

    let mut screenshots: Vec<&str> = build
        .screenshots
        .iter()
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
        .collect();
    screenshots.sort_unstable();
    if screenshots.is_empty() {
        field(&mut out, "Screenshots", PLACEHOLDER);
    } else {
        line(&mut out, "Screenshots:");
        for shot in screenshots {
            let _ = writeln!(out, "  - {}", shot);
        }
    }
    out.push('\n');

    field(&mut out, "File name", scalar(build.file_name.as_deref()));
    field(&mut out, "File size", &file_size(&build.file));

    out
}

fn line(out: &mut String, text: &str) {
    out.push_str(text);
    out.push('\n');
}

fn field(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out, "{}: {}", label, value);
}

fn scalar(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => PLACEHOLDER,
    }
}

fn tag_list(tags: &[Tag]) -> String {
    let mut names: Vec<&str> = tags
        .iter()
        .map(|t| t.name.as_str())
        .filter(|n| !n.trim().is_empty())
        .collect();
    if names.is_empty() {
        return PLACEHOLDER.to_string();
    }
    names.sort_unstable();
    names.join(", ")
}

fn file_size(file: &FileData) -> String {
    match file {
        FileData::Loaded(bytes) => format!("{} bytes", bytes.len()),
        FileData::Missing => PLACEHOLDER.to_string(),
        FileData::Unavailable(_) => FILE_ERROR_PLACEHOLDER.to_string(),
    }
}
