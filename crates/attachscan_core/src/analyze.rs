use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::{AttachmentAggregator, Sighting};
use crate::client::ContentApi;
use crate::detect::is_referenced;
use crate::lookup::Lookup;
use crate::model::{
    AttachmentSnapshot, SiteUrls, Version, Workspace, WorkspaceResult, distinct_titles,
};
use crate::report::ReportSink;

#[derive(Debug, Clone, Default)]
pub struct AuditOptions {
    /// Restrict the run to these workspace keys (case-insensitive). Empty means all.
    pub workspace_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditProgress {
    WorkspacesListed { total: usize, selected: usize },
    WorkspaceStarted {
        key: String,
        name: String,
        position: usize,
        total: usize,
    },
    PagesEnumerated { key: String, pages: usize },
    WorkspaceFinished {
        key: String,
        files: usize,
        unreferenced: usize,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub results: Vec<WorkspaceResult>,
    pub total_size: u64,
    pub file_count: usize,
    pub unreferenced_count: usize,
    pub index_path: PathBuf,
    pub request_count: usize,
}

/// Enumerate one workspace, feed every sighting into the shared aggregator
/// and write that workspace's reports.
pub fn analyze_workspace(
    api: &mut dyn ContentApi,
    site: &SiteUrls,
    aggregator: &mut AttachmentAggregator,
    workspace: &Workspace,
    sink: &mut dyn ReportSink,
    progress: &mut dyn FnMut(AuditProgress),
) -> Result<WorkspaceResult> {
    let pages = api.list_pages(&workspace.key).unwrap_or_default();
    progress(AuditProgress::PagesEnumerated {
        key: workspace.key.clone(),
        pages: pages.len(),
    });

    for page in &pages {
        let attachments = api.list_attachments(&page.id).unwrap_or_default();
        if attachments.is_empty() {
            continue;
        }
        debug!(
            "page {} ({}) carries {} attachments",
            page.id,
            page.title,
            attachments.len()
        );

        let page_ref = site.page_ref(page, &workspace.key);
        let mut markup: Option<String> = None;
        for snapshot in &attachments {
            let versions = resolve_versions(api, &page.id, snapshot);
            let titles = distinct_titles(&snapshot.title, &versions);
            let body =
                markup.get_or_insert_with(|| api.page_markup(&page.id).unwrap_or_default());
            let referenced = is_referenced(body, &titles);

            aggregator.record_sighting(Sighting {
                id: snapshot.id.clone(),
                title: snapshot.title.clone(),
                size: snapshot.file_size,
                links: site.attachment_links(snapshot, &page.id),
                page: page_ref.clone(),
                versions,
                referenced_on_page: referenced,
            });
        }
    }

    let files = aggregator.partition_workspace(&workspace.key);
    let reports = sink.write_workspace(workspace, &files)?;
    let result = WorkspaceResult {
        key: workspace.key.clone(),
        name: workspace.name.clone(),
        total_size: files.total_size(),
        file_count: files.all.len(),
        unreferenced_count: files.unreferenced.len(),
        reports,
    };
    progress(AuditProgress::WorkspaceFinished {
        key: result.key.clone(),
        files: result.file_count,
        unreferenced: result.unreferenced_count,
    });
    Ok(result)
}

/// History lookups are best-effort; the sighting itself is always a version.
fn resolve_versions(
    api: &mut dyn ContentApi,
    page_id: &str,
    snapshot: &AttachmentSnapshot,
) -> Vec<Version> {
    let current = snapshot.current_version();
    let mut versions = match api.attachment_versions(page_id, &snapshot.id) {
        Lookup::Data(versions) => versions,
        Lookup::Empty => Vec::new(),
    };
    if !versions.contains(&current) {
        versions.insert(0, current);
    }
    versions
}

/// Run the whole audit: every selected workspace, then the index and summary.
pub fn run_audit(
    api: &mut dyn ContentApi,
    site: &SiteUrls,
    sink: &mut dyn ReportSink,
    options: &AuditOptions,
    progress: &mut dyn FnMut(AuditProgress),
) -> Result<AuditReport> {
    let workspaces = api.list_workspaces().unwrap_or_default();
    let total = workspaces.len();
    let selected = select_workspaces(workspaces, &options.workspace_keys);
    progress(AuditProgress::WorkspacesListed {
        total,
        selected: selected.len(),
    });
    info!("analyzing {} of {total} workspaces", selected.len());

    let mut aggregator = AttachmentAggregator::new();
    let mut results = Vec::with_capacity(selected.len());
    for (position, workspace) in selected.iter().enumerate() {
        progress(AuditProgress::WorkspaceStarted {
            key: workspace.key.clone(),
            name: workspace.name.clone(),
            position: position + 1,
            total: selected.len(),
        });
        let result = analyze_workspace(api, site, &mut aggregator, workspace, sink, progress)?;
        results.push(result);
    }

    let index_path = sink.write_index(&results)?;

    let report = AuditReport {
        total_size: results.iter().map(|result| result.total_size).sum(),
        file_count: results.iter().map(|result| result.file_count).sum(),
        unreferenced_count: results.iter().map(|result| result.unreferenced_count).sum(),
        results,
        index_path,
        request_count: api.request_count(),
    };
    sink.write_summary(&report)?;
    Ok(report)
}

fn select_workspaces(workspaces: Vec<Workspace>, keys: &[String]) -> Vec<Workspace> {
    if keys.is_empty() {
        return workspaces;
    }
    workspaces
        .into_iter()
        .filter(|workspace| {
            keys.iter()
                .any(|key| key.trim().eq_ignore_ascii_case(&workspace.key))
        })
        .collect()
}
