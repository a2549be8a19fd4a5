//! Plain-text job reports for the terminal

use crate::output::report::JobReport;
use std::fmt;

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let job = &self.job;
        let summary = &job.summary;

        writeln!(f, "=== {} ===", job.url)?;
        writeln!(f, "  Job: {} (owner {})", job.id, job.owner)?;
        writeln!(f, "  Status: {}", job.status)?;
        writeln!(
            f,
            "  Doctype: {}",
            summary.doctype.map(|d| d.as_str()).unwrap_or("-")
        )?;
        writeln!(f, "  Title: {}", summary.title.as_deref().unwrap_or("-"))?;
        writeln!(
            f,
            "  Login form: {}",
            if summary.has_login_form { "yes" } else { "no" }
        )?;

        if !summary.headings.is_empty() {
            let counts: Vec<String> = summary
                .headings
                .iter()
                .map(|(level, count)| format!("{}={}", level, count))
                .collect();
            writeln!(
                f,
                "  Headings: {} ({})",
                summary.total_headings(),
                counts.join(" ")
            )?;
        }

        writeln!(
            f,
            "  Links: {} ({} internal, {} external), {} inaccessible",
            summary.total_links(),
            summary.internal_links,
            summary.external_links,
            summary.inaccessible_links
        )?;

        let unprobed = self.unprobed_links();
        if unprobed > 0 {
            writeln!(f, "  Unprobed links: {}", unprobed)?;
        }

        for link in self.broken_links() {
            match link.status_code {
                0 => writeln!(f, "    ! {} (no response)", link.url)?,
                status => writeln!(f, "    ! {} ({})", link.url, status)?,
            }
        }

        Ok(())
    }
}

/// Formats one job as a plain-text report
pub fn format_text_report(report: &JobReport) -> String {
    report.to_string()
}

/// Prints one job report to stdout
pub fn print_report(report: &JobReport) {
    println!("{}", report);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::report::fixtures::sample_report;

    #[test]
    fn test_text_report_contents() {
        let text = format_text_report(&sample_report());

        assert!(text.contains("=== https://example.com/ ==="));
        assert!(text.contains("Status: done"));
        assert!(text.contains("Doctype: modern"));
        assert!(text.contains("Title: Example"));
        assert!(text.contains("Login form: yes"));
        assert!(text.contains("Headings: 2 (h1=1 h2=1)"));
        assert!(text.contains("Links: 3 (1 internal, 2 external), 1 inaccessible"));
        assert!(text.contains("Unprobed links: 1"));
        assert!(text.contains("! https://external.test/ (404)"));
    }

    #[test]
    fn test_text_report_for_failed_job() {
        let mut report = sample_report();
        report.job.status = crate::state::JobStatus::Error;
        report.job.summary = Default::default();
        report.links.clear();
        report.headings.clear();

        let text = format_text_report(&report);
        assert!(text.contains("Status: error"));
        assert!(text.contains("Doctype: -"));
        assert!(!text.contains("Headings:"));
        assert!(text.contains("Links: 0 (0 internal, 0 external), 0 inaccessible"));
    }
}
