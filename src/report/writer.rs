//! Run report: commands, heatmap tabs, and warnings in one HTML page.

use super::escape_html;
use super::heatmap::{render_heatmap, DEFAULT_MAX_LEN};
use crate::error::Result;
use crate::predictor::OutputTable;
use log::info;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Order in which figures appear in the report.
pub const FIGURE_ORDER: [&str; 6] = [
    "amplicon_ec",
    "amplicon_ko",
    "amplicon_metacyc",
    "metagenome_ec",
    "metagenome_ko",
    "metagenome_metacyc",
];

/// Files produced by [`HtmlReportWriter::write`].
#[derive(Debug, Clone)]
pub struct ReportOutput {
    /// The main `report.html`
    pub html: PathBuf,
    /// Heatmaps that rendered, as (figure id, file)
    pub figures: Vec<(String, PathBuf)>,
    /// One message per figure that failed to render
    pub figure_warnings: Vec<String>,
}

/// Writes `report.html` and one heatmap page per table.
pub struct HtmlReportWriter {
    commands: Vec<String>,
    tables: Vec<(&'static OutputTable, PathBuf)>,
    report_dir: PathBuf,
    max_len: usize,
}

impl HtmlReportWriter {
    /// `tables` pairs each catalog entry with its padded TSV.
    pub fn new(
        commands: Vec<String>,
        tables: Vec<(&'static OutputTable, PathBuf)>,
        report_dir: &Path,
    ) -> Self {
        Self {
            commands,
            tables,
            report_dir: report_dir.to_path_buf(),
            max_len: DEFAULT_MAX_LEN,
        }
    }

    /// Cap on heatmap rows and columns.
    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Render every figure, then the report page listing `run_warnings`.
    ///
    /// A figure that fails to render is skipped and reported in
    /// [`ReportOutput::figure_warnings`]; the other figures still render.
    pub fn write(&self, run_warnings: &[String]) -> Result<ReportOutput> {
        fs::create_dir_all(&self.report_dir)?;

        let mut figures = Vec::new();
        let mut figure_warnings = Vec::new();

        for id in FIGURE_ORDER {
            let Some((table, tsv)) = self.tables.iter().find(|(t, _)| t.id == id) else {
                continue;
            };
            let html = self.report_dir.join(format!("{}.html", id));
            match render_heatmap(tsv, &html, table.axis_labels, self.max_len) {
                Ok(()) => {
                    info!("Rendered heatmap {}", html.display());
                    figures.push((id.to_string(), html));
                }
                Err(e) => {
                    figure_warnings.push(format!("Failed to render heatmap for {}: {}", id, e));
                }
            }
        }

        let html = self.report_dir.join("report.html");
        let mut writer = BufWriter::new(File::create(&html)?);
        self.write_page(&mut writer, &figures, run_warnings, &figure_warnings)?;
        writer.flush()?;

        Ok(ReportOutput {
            html,
            figures,
            figure_warnings,
        })
    }

    fn write_page<W: Write>(
        &self,
        w: &mut W,
        figures: &[(String, PathBuf)],
        run_warnings: &[String],
        figure_warnings: &[String],
    ) -> Result<()> {
        writeln!(w, "<!DOCTYPE html>")?;
        writeln!(w, "<html>\n<head>\n<meta charset=\"utf-8\">")?;
        writeln!(w, "<title>Functional prediction report</title>")?;
        writeln!(
            w,
            "<style>\n\
             body {{ font-family: sans-serif; }}\n\
             .tab {{ display: none; }}\n\
             .tab.active {{ display: block; }}\n\
             iframe {{ width: 100%; height: 800px; border: none; }}\n\
             </style>"
        )?;
        writeln!(w, "</head>\n<body>")?;

        writeln!(w, "<h2>Commands</h2>")?;
        for cmd in &self.commands {
            writeln!(w, "<pre>{}</pre>", escape_html(cmd))?;
        }

        writeln!(w, "<h2>Heatmaps</h2>")?;
        if figures.is_empty() {
            writeln!(w, "<p>No heatmaps were rendered.</p>")?;
        } else {
            writeln!(w, "<div>")?;
            for (id, _) in figures {
                writeln!(
                    w,
                    "<button onclick=\"showTab('{id}')\">{label}</button>",
                    id = escape_html(id),
                    label = escape_html(id),
                )?;
            }
            writeln!(w, "</div>")?;
            for (i, (id, path)) in figures.iter().enumerate() {
                let file = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                writeln!(
                    w,
                    "<div class=\"tab{active}\" id=\"tab-{id}\"><iframe src=\"{file}\"></iframe></div>",
                    active = if i == 0 { " active" } else { "" },
                    id = escape_html(id),
                    file = escape_html(&file),
                )?;
            }
            writeln!(
                w,
                "<script>\n\
                 function showTab(id) {{\n\
                 \x20 document.querySelectorAll('.tab').forEach(function (t) {{ t.classList.remove('active'); }});\n\
                 \x20 document.getElementById('tab-' + id).classList.add('active');\n\
                 }}\n\
                 </script>"
            )?;
        }

        let warnings: Vec<&String> = run_warnings.iter().chain(figure_warnings).collect();
        if !warnings.is_empty() {
            writeln!(w, "<h2>Warnings</h2>\n<ul>")?;
            for msg in warnings {
                writeln!(w, "<li>{}</li>", escape_html(msg))?;
            }
            writeln!(w, "</ul>")?;
        }

        writeln!(w, "</body>\n</html>")?;
        Ok(())
    }
}
