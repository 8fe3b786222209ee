//! HTML report with clustered heatmaps of the padded tables.

pub mod cluster;
pub mod heatmap;
pub mod writer;

pub use cluster::{average_linkage_order, euclidean_distances};
pub use heatmap::{prepare, render_heatmap, DEFAULT_MAX_LEN};
pub use writer::{HtmlReportWriter, ReportOutput, FIGURE_ORDER};

/// Escape text for inclusion in HTML element content or attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
