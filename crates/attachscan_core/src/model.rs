use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub key: String,
    pub name: String,
}

/// Page as listed by the content API, before URLs are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub id: String,
    pub title: String,
    pub webui: Option<String>,
}

/// Attachment metadata as listed under a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSnapshot {
    pub id: String,
    pub title: String,
    pub file_size: u64,
    pub download: Option<String>,
    pub webui: Option<String>,
    pub version: Option<u32>,
}

impl AttachmentSnapshot {
    /// The sighting itself, used whenever history lookups come back empty.
    pub fn current_version(&self) -> Version {
        Version {
            title: self.title.clone(),
            number: self.version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Version {
    pub title: String,
    pub number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRef {
    pub id: String,
    pub title: String,
    pub url: String,
    pub workspace_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentLinks {
    pub download: String,
    pub delete_ui: String,
    pub delete_api: String,
}

/// Merged record for one attachment identifier across the whole run.
///
/// Only the aggregator constructs and mutates these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub id: String,
    pub title: String,
    pub size: u64,
    pub links: AttachmentLinks,
    pub owning_page: PageRef,
    pub(crate) other_pages: Vec<PageRef>,
    pub(crate) versions: Vec<Version>,
    pub referenced_on_owning_page: bool,
}

impl Attachment {
    pub fn other_pages(&self) -> &[PageRef] {
        &self.other_pages
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn size_mib(&self) -> f64 {
        bytes_to_mib(self.size)
    }

    pub fn is_unreferenced(&self) -> bool {
        !self.referenced_on_owning_page && self.other_pages.is_empty()
    }

    /// Every distinct non-empty title this attachment has carried.
    pub fn titles(&self) -> Vec<String> {
        distinct_titles(&self.title, &self.versions)
    }
}

pub fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MIB
}

pub(crate) fn distinct_titles(primary: &str, versions: &[Version]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut titles = Vec::new();
    let candidates =
        std::iter::once(primary).chain(versions.iter().map(|version| version.title.as_str()));
    for title in candidates {
        if !title.is_empty() && seen.insert(title) {
            titles.push(title.to_string());
        }
    }
    titles
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceReports {
    pub all_csv: PathBuf,
    pub all_html: PathBuf,
    pub unreferenced_csv: PathBuf,
    pub unreferenced_html: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceResult {
    pub key: String,
    pub name: String,
    pub total_size: u64,
    pub file_count: usize,
    pub unreferenced_count: usize,
    pub reports: WorkspaceReports,
}

/// Derives every browsable or actionable URL from the site base address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteUrls {
    base_url: String,
}

impl SiteUrls {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn absolute(&self, path: Option<&str>) -> String {
        match path {
            Some(path) if path.starts_with("http://") || path.starts_with("https://") => {
                path.to_string()
            }
            Some(path) => format!("{}{}", self.base_url, path),
            None => self.base_url.clone(),
        }
    }

    pub fn page_ref(&self, page: &PageSummary, workspace_key: &str) -> PageRef {
        PageRef {
            id: page.id.clone(),
            title: page.title.clone(),
            url: self.absolute(page.webui.as_deref()),
            workspace_key: workspace_key.to_string(),
        }
    }

    pub fn attachment_links(
        &self,
        attachment: &AttachmentSnapshot,
        page_id: &str,
    ) -> AttachmentLinks {
        AttachmentLinks {
            download: self.absolute(attachment.download.as_deref()),
            delete_ui: format!(
                "{}/pages/viewpageattachments.action?pageId={page_id}",
                self.base_url
            ),
            delete_api: format!("{}/rest/api/content/{}", self.base_url, attachment.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_urls_trim_trailing_slash_and_join_paths() {
        let site = SiteUrls::new("https://example.atlassian.net/wiki/");
        assert_eq!(site.base_url(), "https://example.atlassian.net/wiki");
        assert_eq!(
            site.absolute(Some("/spaces/DOC/pages/1")),
            "https://example.atlassian.net/wiki/spaces/DOC/pages/1"
        );
        assert_eq!(
            site.absolute(Some("https://cdn.example.org/file")),
            "https://cdn.example.org/file"
        );
        assert_eq!(site.absolute(None), "https://example.atlassian.net/wiki");
    }

    #[test]
    fn attachment_links_point_at_ui_and_api() {
        let site = SiteUrls::new("https://wiki.example.org");
        let snapshot = AttachmentSnapshot {
            id: "att42".to_string(),
            title: "a.pdf".to_string(),
            file_size: 1,
            download: Some("/download/attachments/7/a.pdf".to_string()),
            webui: None,
            version: Some(1),
        };
        let links = site.attachment_links(&snapshot, "7");
        assert_eq!(links.download, "https://wiki.example.org/download/attachments/7/a.pdf");
        assert_eq!(
            links.delete_ui,
            "https://wiki.example.org/pages/viewpageattachments.action?pageId=7"
        );
        assert_eq!(links.delete_api, "https://wiki.example.org/rest/api/content/att42");
    }

    #[test]
    fn distinct_titles_skip_empty_and_duplicates() {
        let versions = vec![
            Version { title: "new.pdf".to_string(), number: Some(2) },
            Version { title: String::new(), number: None },
            Version { title: "old.pdf".to_string(), number: Some(1) },
            Version { title: "new.pdf".to_string(), number: Some(3) },
        ];
        assert_eq!(
            distinct_titles("new.pdf", &versions),
            vec!["new.pdf".to_string(), "old.pdf".to_string()]
        );
    }

    #[test]
    fn bytes_to_mib_converts_binary_megabytes() {
        assert_eq!(bytes_to_mib(1024 * 1024), 1.0);
        assert_eq!(format!("{:.2}", bytes_to_mib(1_572_864)), "1.50");
    }
}
