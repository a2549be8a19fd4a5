//! Markdown report generation
//!
//! This module generates human-readable markdown reports of crawl jobs,
//! including page summaries, heading outlines and link verdicts.

use crate::output::report::{JobReport, OutputResult};
use crate::url::LinkKind;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a markdown report of `reports` to `output_path`
///
/// # Arguments
///
/// * `reports` - One entry per crawl job
/// * `config_hash` - Hash of the configuration the jobs ran with
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn write_markdown_report(
    reports: &[JobReport],
    config_hash: Option<&str>,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_report(reports, config_hash);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats crawl jobs as a markdown document
pub fn format_markdown_report(reports: &[JobReport], config_hash: Option<&str>) -> String {
    let mut md = String::new();

    md.push_str("# SEO Crawl Report\n\n");
    md.push_str(&format!("- **Jobs**: {}\n", reports.len()));
    if let Some(hash) = config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    for report in reports {
        push_job(&mut md, report);
    }

    md
}

fn push_job(md: &mut String, report: &JobReport) {
    let job = &report.job;
    let summary = &job.summary;

    md.push_str(&format!("## {}\n\n", job.url));

    md.push_str("| Field | Value |\n");
    md.push_str("|-------|-------|\n");
    md.push_str(&format!("| Status | {} |\n", job.status));
    md.push_str(&format!("| Owner | {} |\n", job.owner));
    md.push_str(&format!(
        "| Doctype | {} |\n",
        summary.doctype.map(|d| d.as_str()).unwrap_or("-")
    ));
    md.push_str(&format!(
        "| Title | {} |\n",
        escape_cell(summary.title.as_deref().unwrap_or("-"))
    ));
    md.push_str(&format!(
        "| Login Form | {} |\n",
        if summary.has_login_form { "yes" } else { "no" }
    ));
    md.push_str(&format!("| Internal Links | {} |\n", summary.internal_links));
    md.push_str(&format!("| External Links | {} |\n", summary.external_links));
    md.push_str(&format!(
        "| Inaccessible Links | {} |\n",
        summary.inaccessible_links
    ));
    md.push_str(&format!("| Updated | {} |\n\n", job.updated_at));

    if !report.headings.is_empty() {
        md.push_str("### Headings\n\n");
        for heading in &report.headings {
            let depth = heading
                .level
                .trim_start_matches('h')
                .parse::<usize>()
                .unwrap_or(1);
            md.push_str(&format!(
                "{}- **{}** {}\n",
                "  ".repeat(depth.saturating_sub(1)),
                heading.level,
                heading.text
            ));
        }
        md.push('\n');
    }

    if !report.links.is_empty() {
        md.push_str("### Links\n\n");
        md.push_str("| URL | Kind | Status | Reachable |\n");
        md.push_str("|-----|------|--------|-----------|\n");

        for kind in [LinkKind::Internal, LinkKind::External] {
            for link in report.links_of_kind(kind) {
                let status = if link.status_code == 0 {
                    "-".to_string()
                } else {
                    link.status_code.to_string()
                };
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    escape_cell(&link.url),
                    link.kind,
                    status,
                    if link.reachable { "yes" } else { "no" }
                ));
            }
        }
        md.push('\n');
    }
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}
