//! Format rebuild reports, lookups, root segments and diagnostics as text.

use crate::index::{Diagnostics, ResolvedPage};
use crate::rebuild::RebuildReport;
use crate::store::PageInfo;
use crate::types::{NodeId, PerLocale};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn format_report_text(report: &RebuildReport) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Rebuild"));
    if let Some(root) = report.root {
        out.push_str(&format!("  Started at node: {}\n", root));
    }
    out.push_str(&format!("  Nodes visited: {}\n", report.nodes));
    out.push_str(&format!("  Entries written: {}\n", report.written));
    out.push_str(&format!("  Duration: {} ms\n", report.duration_ms));
    if !report.corrected.is_empty() {
        let corrected: Vec<String> = report.corrected.iter().map(ToString::to_string).collect();
        out.push_str(&format!("  Corrected stale owners: {}\n", corrected.join(", ")));
    }
    if !report.failures.is_empty() {
        out.push_str(&format!("\n{}\n\n", format_section_heading("Failures")));
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Node", "Error"]);
        for failure in &report.failures {
            table.add_row(vec![failure.node_id.to_string(), failure.error.to_string()]);
        }
        out.push_str(&format!("{}\n", table));
    }
    out
}

pub fn format_report_json(report: &RebuildReport) -> Value {
    json!({
        "root": report.root,
        "nodes": report.nodes,
        "written": report.written,
        "duration_ms": report.duration_ms,
        "corrected": report.corrected,
        "failures": report
            .failures
            .iter()
            .map(|f| json!({ "node_id": f.node_id, "error": f.error.to_string() }))
            .collect::<Vec<_>>(),
    })
}

pub fn format_paths_text(node_id: NodeId, paths: &PerLocale) -> String {
    if paths.is_empty() {
        return format!("Node {} is not indexed", node_id);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Locale", "Path"]);
    for (locale, path) in paths.iter() {
        table.add_row(vec![locale.to_string(), path.to_string()]);
    }
    format!("{}\n\n{}", format_section_heading(&format!("Paths of node {}", node_id)), table)
}

/// JSON object keyed by locale label. Locale keys are not valid JSON map keys as-is.
pub fn format_paths_json(node_id: NodeId, paths: &PerLocale) -> Value {
    let by_locale: BTreeMap<String, String> = paths
        .iter()
        .map(|(locale, path)| (locale.to_string(), path.to_string()))
        .collect();
    json!({ "node_id": node_id, "paths": by_locale })
}

pub fn format_info_text(info: &PageInfo) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Page"));
    out.push_str(&format!("  Node: {}\n", info.node_id));
    out.push_str(&format!("  Locale: {}\n", info.locale));
    out.push_str(&format!("  Path: {}\n", info.path));
    out.push_str(&format!("  Type: {}\n", info.type_id));
    match info.parent_id {
        Some(parent) => out.push_str(&format!("  Parent: {}\n", parent)),
        None => out.push_str("  Parent: none (root)\n"),
    }
    out.push_str(&format!(
        "  Published: {}\n  Hidden: {}\n",
        yes_no(info.is_published()),
        yes_no(info.is_hidden())
    ));
    out
}

pub fn format_info_json(info: &PageInfo) -> Value {
    json!({
        "node_id": info.node_id,
        "locale_id": info.locale.id(),
        "path": info.path,
        "type_id": info.type_id,
        "parent_id": info.parent_id,
        "status": info.status,
        "published": info.is_published(),
        "hidden": info.is_hidden(),
    })
}

pub fn format_resolved_text(resolved: &ResolvedPage) -> String {
    let mut out = format_info_text(&resolved.info);
    out.push_str(&format!("  Requested locale: {}\n", resolved.locale));
    if let Some(prefix) = &resolved.prefix {
        out.push_str(&format!("  Locale segment: {}\n", prefix));
    }
    out
}

pub fn format_resolved_json(resolved: &ResolvedPage) -> Value {
    json!({
        "locale_id": resolved.locale.id(),
        "prefix": resolved.prefix,
        "page": format_info_json(&resolved.info),
    })
}

pub fn format_segments_text(segments: &BTreeMap<String, String>) -> String {
    if segments.is_empty() {
        return "No root segments".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Key", "Segment"]);
    for (key, segment) in segments {
        table.add_row(vec![key.clone(), segment.clone()]);
    }
    format!("{}\n\n{}", format_section_heading("Root segments"), table)
}

pub fn format_stats_text(diagnostics: &Diagnostics) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Path index"));
    out.push_str(&format!("  Rows: {}\n", diagnostics.rows));
    out.push_str(&format!("  Tree nodes: {}\n", diagnostics.nodes));
    out.push_str(&format!(
        "  Estimated full rebuild: {} ms\n",
        diagnostics.estimated_rebuild.as_millis()
    ));
    match diagnostics.last_rebuild {
        Some(at) => out.push_str(&format!("  Last rebuild: {}\n", at.to_rfc3339())),
        None => out.push_str("  Last rebuild: not in this session\n"),
    }
    out
}

pub fn format_stats_json(diagnostics: &Diagnostics) -> Value {
    json!({
        "rows": diagnostics.rows,
        "nodes": diagnostics.nodes,
        "estimated_rebuild_ms": diagnostics.estimated_rebuild.as_millis() as u64,
        "last_rebuild": diagnostics.last_rebuild.map(|at| at.to_rfc3339()),
    })
}

pub fn format_node_ids(ids: &[NodeId]) -> String {
    if ids.is_empty() {
        return "No matching nodes".to_string();
    }
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
