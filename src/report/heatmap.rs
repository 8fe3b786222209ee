//! Clustered heatmaps of predictor tables as standalone HTML.

use super::cluster::average_linkage_order;
use super::escape_html;
use crate::data::FunctionTable;
use crate::error::{PredictError, Result};
use log::debug;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Default cap on heatmap rows and columns.
pub const DEFAULT_MAX_LEN: usize = 500;

/// Indices of the `max_len` largest sums, largest first.
fn top_by_sum(sums: &[f64], max_len: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..sums.len()).collect();
    if sums.len() > max_len {
        idx.sort_by(|&a, &b| sums[b].total_cmp(&sums[a]));
        idx.truncate(max_len);
    }
    idx
}

/// Subset a table to at most `max_len` rows and columns, then cluster both axes.
///
/// Rows and columns beyond the cap are dropped by ascending sum. The result
/// is ordered by the leaf order of an average-linkage dendrogram on each axis.
/// Not-predicted cells count as zero for ordering but stay not-predicted.
pub fn prepare(table: &FunctionTable, max_len: usize) -> Result<FunctionTable> {
    if table.n_rows() == 0 || table.n_cols() == 0 {
        return Err(PredictError::EmptyData(format!(
            "Table is {} × {}",
            table.n_rows(),
            table.n_cols()
        )));
    }

    let rows = top_by_sum(&table.row_sums(), max_len);
    let cols = top_by_sum(&table.col_sums(), max_len);
    let subset = table.subset(&rows, &cols)?;
    debug!(
        "Heatmap subset {} × {} of {} × {}",
        subset.n_rows(),
        subset.n_cols(),
        table.n_rows(),
        table.n_cols()
    );

    let row_order = average_linkage_order(subset.data());
    let col_order = average_linkage_order(&subset.data().transpose());
    subset.subset(&row_order, &col_order)
}

#[derive(Serialize)]
struct Payload<'a> {
    row_label: &'a str,
    col_label: &'a str,
    row_ids: &'a [String],
    col_ids: &'a [String],
    values: Vec<Vec<Option<f64>>>,
    max: f64,
}

/// Render the table at `tsv` as a clustered heatmap written to `html`.
///
/// `axis_labels` is (row label, column label).
pub fn render_heatmap(
    tsv: &Path,
    html: &Path,
    axis_labels: (&str, &str),
    max_len: usize,
) -> Result<()> {
    let table = prepare(&FunctionTable::from_tsv(tsv)?, max_len)?;

    let values: Vec<Vec<Option<f64>>> = (0..table.n_rows())
        .map(|i| {
            table
                .row(i)
                .into_iter()
                .map(|v| if v.is_nan() { None } else { Some(v) })
                .collect()
        })
        .collect();
    let max = values
        .iter()
        .flatten()
        .flatten()
        .fold(0.0_f64, |acc, &v| acc.max(v));

    let payload = Payload {
        row_label: axis_labels.0,
        col_label: axis_labels.1,
        row_ids: table.row_ids(),
        col_ids: table.col_ids(),
        values,
        max,
    };
    // Keep the embedded JSON from closing the script element
    let json = serde_json::to_string(&payload)?.replace("</", "<\\/");

    let title = format!("{} × {}", axis_labels.0, axis_labels.1);
    let mut writer = BufWriter::new(File::create(html)?);
    write!(
        writer,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; font-size: 12px; }}
table.heatmap {{ border-collapse: collapse; }}
table.heatmap td {{ width: 10px; height: 10px; padding: 0; }}
table.heatmap th {{ font-weight: normal; white-space: nowrap; text-align: right; padding-right: 4px; }}
table.heatmap thead th {{ writing-mode: vertical-rl; transform: rotate(180deg); text-align: left; }}
</style>
</head>
<body>
<h3>{title}</h3>
<div id="heatmap"></div>
<script id="heatmap-data" type="application/json">{json}</script>
<script>
(function () {{
  var d = JSON.parse(document.getElementById("heatmap-data").textContent);
  var t = document.createElement("table");
  t.className = "heatmap";
  var head = t.createTHead().insertRow();
  var corner = document.createElement("th");
  corner.textContent = d.row_label + " \\ " + d.col_label;
  head.appendChild(corner);
  d.col_ids.forEach(function (c) {{
    var th = document.createElement("th");
    th.textContent = c;
    head.appendChild(th);
  }});
  var body = t.createTBody();
  d.row_ids.forEach(function (r, i) {{
    var tr = body.insertRow();
    var th = document.createElement("th");
    th.textContent = r;
    tr.appendChild(th);
    d.values[i].forEach(function (v, j) {{
      var td = tr.insertCell();
      td.title = d.row_label + ": " + r + "\n" + d.col_label + ": " + d.col_ids[j] +
        "\nvalue: " + (v === null ? "not predicted" : v);
      if (v !== null) {{
        var s = d.max > 0 ? v / d.max : 0;
        td.style.background = "rgba(49, 54, 149, " + s.toFixed(3) + ")";
      }}
    }});
  }});
  document.getElementById("heatmap").appendChild(t);
}})();
</script>
</body>
</html>
"#,
        title = escape_html(&title),
        json = json,
    )?;
    writer.flush()?;

    Ok(())
}
