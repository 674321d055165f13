//! CSV and browsable HTML renderings of the aggregated attachment data.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::aggregate::WorkspaceFiles;
use crate::analyze::AuditReport;
use crate::labels::{Labels, Locale};
use crate::model::{Attachment, PageRef, Workspace, WorkspaceReports, WorkspaceResult, bytes_to_mib};

pub const RUN_DIR_PREFIX: &str = "attachscan";
pub const INDEX_FILENAME: &str = "index.html";
pub const SUMMARY_FILENAME: &str = "summary.json";

/// Destination for everything a run produces.
pub trait ReportSink {
    fn write_workspace(
        &mut self,
        workspace: &Workspace,
        files: &WorkspaceFiles<'_>,
    ) -> Result<WorkspaceReports>;
    fn write_index(&mut self, results: &[WorkspaceResult]) -> Result<PathBuf>;
    fn write_summary(&mut self, report: &AuditReport) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub locale: Locale,
    pub top_rows: usize,
    /// Human-readable run timestamp shown in the index heading.
    pub run_label: String,
}

/// Writes reports below one timestamped run directory.
#[derive(Debug)]
pub struct FsReportWriter {
    run_dir: PathBuf,
    options: ReportOptions,
    used_dir_names: HashSet<String>,
}

impl FsReportWriter {
    pub fn new(run_dir: PathBuf, options: ReportOptions) -> Self {
        Self {
            run_dir,
            options,
            used_dir_names: HashSet::new(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    fn labels(&self) -> &'static Labels {
        self.options.locale.labels()
    }

    /// Directory name for `key`, unique within this run. Keys such as
    /// `A B` and `A-B` sanitize identically and get a numeric suffix.
    fn claim_dir_name(&mut self, key: &str) -> String {
        let base = workspace_dir_name(key);
        let mut name = base.clone();
        let mut suffix = 2;
        while !self.used_dir_names.insert(name.to_ascii_lowercase()) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        name
    }
}

impl ReportSink for FsReportWriter {
    fn write_workspace(
        &mut self,
        workspace: &Workspace,
        files: &WorkspaceFiles<'_>,
    ) -> Result<WorkspaceReports> {
        let stem = self.claim_dir_name(&workspace.key);
        let folder = self.run_dir.join(&stem);
        fs::create_dir_all(&folder)
            .with_context(|| format!("failed to create {}", folder.display()))?;

        let reports = WorkspaceReports {
            all_csv: folder.join(format!("{stem}_attachments.csv")),
            all_html: folder.join(format!("{stem}_attachments.html")),
            unreferenced_csv: folder.join(format!("{stem}_unreferenced.csv")),
            unreferenced_html: folder.join(format!("{stem}_unreferenced.html")),
        };
        let labels = self.labels();
        let unreferenced_title = format!("{} {}", workspace.name, labels.unreferenced_suffix);

        write_file(&reports.all_csv, &render_csv(&files.all, labels))?;
        write_file(
            &reports.all_html,
            &render_workspace_html(&files.all, &workspace.name, labels, self.options.top_rows),
        )?;
        write_file(
            &reports.unreferenced_csv,
            &render_csv(&files.unreferenced, labels),
        )?;
        write_file(
            &reports.unreferenced_html,
            &render_workspace_html(
                &files.unreferenced,
                &unreferenced_title,
                labels,
                self.options.top_rows,
            ),
        )?;
        Ok(reports)
    }

    fn write_index(&mut self, results: &[WorkspaceResult]) -> Result<PathBuf> {
        let path = self.run_dir.join(INDEX_FILENAME);
        let html = render_index_html(results, &self.run_dir, self.labels(), &self.options.run_label);
        write_file(&path, &html)?;
        Ok(path)
    }

    fn write_summary(&mut self, report: &AuditReport) -> Result<PathBuf> {
        let path = self.run_dir.join(SUMMARY_FILENAME);
        let json = serde_json::to_string_pretty(report).context("failed to serialize run summary")?;
        write_file(&path, &json)?;
        Ok(path)
    }
}

/// Timestamp used both in the run directory name and the index heading.
pub fn run_timestamp() -> String {
    Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Create `<output_dir>/attachscan_<timestamp>`, never reusing an existing
/// directory from an earlier run.
pub fn create_run_dir(output_dir: &Path, timestamp: &str) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let base_name = format!("{RUN_DIR_PREFIX}_{timestamp}");
    let mut candidate = output_dir.join(&base_name);
    let mut suffix = 2;
    while candidate.exists() {
        candidate = output_dir.join(format!("{base_name}_{suffix}"));
        suffix += 1;
    }
    fs::create_dir(&candidate)
        .with_context(|| format!("failed to create {}", candidate.display()))?;
    Ok(candidate)
}

pub fn sanitize_filename(value: &str) -> String {
    let mut output = String::new();
    let mut previous_dash = false;
    for ch in value.chars() {
        if ch.is_whitespace() || matches!(ch, '<' | '>' | ':' | '"' | '|' | '?' | '*' | '/' | '\\')
        {
            if !previous_dash && !output.is_empty() {
                output.push('-');
                previous_dash = true;
            }
            continue;
        }
        output.push(ch);
        previous_dash = false;
    }
    while output.ends_with('-') {
        output.pop();
    }
    output
}

fn workspace_dir_name(key: &str) -> String {
    let name = sanitize_filename(key);
    if name.is_empty() || name == "." || name == ".." {
        "workspace".to_string()
    } else {
        name
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

fn page_label(page: &PageRef) -> String {
    format!("{} ({})", page.title, page.url)
}

pub fn render_csv(attachments: &[&Attachment], labels: &Labels) -> String {
    let mut out = String::new();
    push_csv_row(
        &mut out,
        &[
            labels.filename,
            labels.size_bytes,
            labels.size_mib,
            labels.download_url,
            labels.owning_page,
            labels.linked_on_page,
            labels.linked_on_other_pages,
            labels.attachment_page,
            labels.api_delete,
        ],
    );
    for attachment in attachments {
        let other_pages = attachment
            .other_pages()
            .iter()
            .map(page_label)
            .collect::<Vec<_>>()
            .join(", ");
        let size = attachment.size.to_string();
        let size_mib = format!("{:.2}", attachment.size_mib());
        let owning_page = page_label(&attachment.owning_page);
        push_csv_row(
            &mut out,
            &[
                attachment.title.as_str(),
                size.as_str(),
                size_mib.as_str(),
                attachment.links.download.as_str(),
                owning_page.as_str(),
                labels.yes_no(attachment.referenced_on_owning_page),
                other_pages.as_str(),
                attachment.links.delete_ui.as_str(),
                attachment.links.delete_api.as_str(),
            ],
        );
    }
    out
}

fn push_csv_row(out: &mut String, fields: &[&str]) {
    let line = fields
        .iter()
        .map(|field| csv_field(field))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

pub fn render_workspace_html(
    attachments: &[&Attachment],
    title: &str,
    labels: &Labels,
    top_rows: usize,
) -> String {
    let mut rows = String::new();
    for attachment in attachments.iter().take(top_rows) {
        let other_pages = attachment
            .other_pages()
            .iter()
            .map(|page| link(&page.url, &page.title))
            .collect::<Vec<_>>()
            .join("<br>");
        rows.push_str(&format!(
            r#"
    <tr>
      <td>{name}</td>
      <td data-sort="{size}" style="text-align:right">{size_mib:.2} MB</td>
      <td>{download}</td>
      <td>{owner}</td>
      <td>{linked}</td>
      <td>{other_pages}</td>
      <td>{delete_ui}</td>
      <td>{delete_api}</td>
    </tr>"#,
            name = encode_text(&attachment.title),
            size = attachment.size,
            size_mib = attachment.size_mib(),
            download = link(&attachment.links.download, labels.download),
            owner = link(&attachment.owning_page.url, &attachment.owning_page.title),
            linked = labels.yes_no(attachment.referenced_on_owning_page),
            delete_ui = link(&attachment.links.delete_ui, labels.attachment_page),
            delete_api = link(&attachment.links.delete_api, labels.api_delete),
        ));
    }

    let headers = [
        labels.filename,
        labels.size,
        labels.download,
        labels.owning_page,
        labels.linked_on_page,
        labels.linked_on_other_pages,
        labels.attachment_page,
        labels.api_delete,
    ]
    .iter()
    .map(|header| format!("<th>{}</th>", encode_text(header)))
    .collect::<String>();

    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>{title} {report}</title>
<style>{style}</style>
<script>{script}</script>
</head>
<body>
<h1>{workspace}: {title}</h1>
<p><b>{total_files}:</b> {count} | <b>{top_rows}</b></p>
<table class="sortable">
<thead>
<tr>{headers}</tr>
</thead>
<tbody>{rows}
</tbody>
</table>
</body>
</html>
"#,
        title = encode_text(title),
        report = labels.report_suffix,
        style = TABLE_STYLE,
        script = SORT_SCRIPT,
        workspace = labels.workspace,
        total_files = labels.total_files,
        count = attachments.len(),
        top_rows = labels.top_rows(top_rows),
    )
}

pub fn render_index_html(
    results: &[WorkspaceResult],
    run_dir: &Path,
    labels: &Labels,
    run_label: &str,
) -> String {
    let mut rows = String::new();
    for result in results {
        let report = relative_link(run_dir, &result.reports.all_html);
        let unreferenced = relative_link(run_dir, &result.reports.unreferenced_html);
        rows.push_str(&format!(
            r#"
    <tr>
      <td>{name} ({key})</td>
      <td data-sort="{size}" style="text-align:right">{size_mib:.2} MB</td>
      <td data-sort="{count}">{count}</td>
      <td>{report}</td>
      <td>{unreferenced} ({unreferenced_count})</td>
    </tr>"#,
            name = encode_text(&result.name),
            key = encode_text(&result.key),
            size = result.total_size,
            size_mib = bytes_to_mib(result.total_size),
            count = result.file_count,
            report = link(&report, labels.report),
            unreferenced = link(&unreferenced, labels.unreferenced),
            unreferenced_count = result.unreferenced_count,
        ));
    }

    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>{index_title}</title>
<style>{style}</style>
<script>{script}</script>
</head>
<body>
<h1>{heading} {run_label}</h1>
<table class="sortable">
<thead>
<tr><th>{workspace}</th><th>{total_size}</th><th>{files}</th><th>{report}</th><th>{unreferenced_report}</th></tr>
</thead>
<tbody>{rows}
</tbody>
</table>
</body>
</html>
"#,
        index_title = encode_text(labels.index_title),
        style = TABLE_STYLE,
        script = SORT_SCRIPT,
        heading = encode_text(labels.index_heading),
        run_label = encode_text(run_label),
        workspace = labels.workspace,
        total_size = encode_text(labels.total_size_mib),
        files = labels.files,
        report = labels.report,
        unreferenced_report = labels.unreferenced_report,
    )
}

fn link(href: &str, text: &str) -> String {
    format!(
        r#"<a href="{}" target="_blank">{}</a>"#,
        encode_double_quoted_attribute(href),
        encode_text(text)
    )
}

fn relative_link(root: &Path, target: &Path) -> String {
    target
        .strip_prefix(root)
        .unwrap_or(target)
        .to_string_lossy()
        .replace('\\', "/")
}

const TABLE_STYLE: &str = r#"
body { font-family: Arial, sans-serif; padding: 18px; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ccc; padding: 6px; text-align: left; vertical-align: top; }
th { background: #f2f2f2; cursor: pointer; }
th.sort-asc::after { content: " \25B2"; }
th.sort-desc::after { content: " \25BC"; }
"#;

/// Click-to-sort for `table.sortable`: `data-sort` wins over cell text,
/// numbers compare numerically, everything else with `localeCompare`.
const SORT_SCRIPT: &str = r#"
document.addEventListener('DOMContentLoaded', function () {
  function cellValue(row, idx) {
    const cell = row.children[idx];
    if (!cell) return "";
    const sortAttr = cell.getAttribute("data-sort");
    if (sortAttr !== null) return sortAttr;
    return cell.textContent.trim();
  }
  function comparer(idx, asc) {
    return function (a, b) {
      const v1 = cellValue(asc ? a : b, idx);
      const v2 = cellValue(asc ? b : a, idx);
      const n1 = parseFloat(String(v1).replace(',', '.'));
      const n2 = parseFloat(String(v2).replace(',', '.'));
      if (!isNaN(n1) && !isNaN(n2)) return n1 - n2;
      return String(v1).localeCompare(String(v2), undefined, {numeric: true, sensitivity: 'base'});
    };
  }
  document.querySelectorAll("table.sortable").forEach(function (table) {
    const headers = table.querySelectorAll("th");
    headers.forEach(function (th, idx) {
      th.addEventListener('click', function () {
        const body = table.tBodies[0] || table;
        const rows = Array.from(body.querySelectorAll("tr"));
        const asc = !th.classList.contains('sort-asc');
        headers.forEach(function (h) { h.classList.remove('sort-asc', 'sort-desc'); });
        th.classList.add(asc ? 'sort-asc' : 'sort-desc');
        rows.sort(comparer(idx, asc));
        rows.forEach(function (r) { body.appendChild(r); });
      });
    });
  });
});
"#;
