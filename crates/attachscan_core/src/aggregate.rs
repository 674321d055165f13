use std::cmp::Reverse;
use std::collections::HashMap;

use crate::model::{Attachment, AttachmentLinks, PageRef, Version};

/// One (attachment, page) observation made during enumeration.
#[derive(Debug, Clone)]
pub struct Sighting {
    pub id: String,
    pub title: String,
    pub size: u64,
    pub links: AttachmentLinks,
    pub page: PageRef,
    pub versions: Vec<Version>,
    pub referenced_on_page: bool,
}

/// Run-wide attachment bookkeeping keyed by platform identifier.
///
/// Records keep first-sighting order. `record_sighting` is the only write path.
#[derive(Debug, Default)]
pub struct AttachmentAggregator {
    records: Vec<Attachment>,
    index: HashMap<String, usize>,
}

/// Attachments owned by one workspace, biggest first.
#[derive(Debug, Default)]
pub struct WorkspaceFiles<'a> {
    pub all: Vec<&'a Attachment>,
    pub unreferenced: Vec<&'a Attachment>,
}

impl WorkspaceFiles<'_> {
    pub fn total_size(&self) -> u64 {
        self.all.iter().map(|attachment| attachment.size).sum()
    }
}

impl AttachmentAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sighting(&mut self, sighting: Sighting) {
        if let Some(&position) = self.index.get(&sighting.id) {
            let record = &mut self.records[position];
            let is_owner = record.owning_page.id == sighting.page.id;
            let already_listed = record
                .other_pages
                .iter()
                .any(|page| page.id == sighting.page.id);
            if !is_owner && !already_listed {
                record.other_pages.push(sighting.page);
            }
            for version in sighting.versions {
                if !record.versions.contains(&version) {
                    record.versions.push(version);
                }
            }
            return;
        }

        let mut versions: Vec<Version> = Vec::with_capacity(sighting.versions.len());
        for version in sighting.versions {
            if !versions.contains(&version) {
                versions.push(version);
            }
        }
        self.index.insert(sighting.id.clone(), self.records.len());
        self.records.push(Attachment {
            id: sighting.id,
            title: sighting.title,
            size: sighting.size,
            links: sighting.links,
            owning_page: sighting.page,
            other_pages: Vec::new(),
            versions,
            referenced_on_owning_page: sighting.referenced_on_page,
        });
    }

    pub fn get(&self, id: &str) -> Option<&Attachment> {
        self.index.get(id).map(|&position| &self.records[position])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.records.iter()
    }

    /// Split the attachments whose owning page lives in `workspace_key`.
    ///
    /// Both lists are sorted by size descending; equal sizes keep
    /// enumeration order.
    pub fn partition_workspace(&self, workspace_key: &str) -> WorkspaceFiles<'_> {
        let mut all = self
            .records
            .iter()
            .filter(|attachment| attachment.owning_page.workspace_key == workspace_key)
            .collect::<Vec<_>>();
        all.sort_by_key(|attachment| Reverse(attachment.size));
        let unreferenced = all
            .iter()
            .copied()
            .filter(|attachment| attachment.is_unreferenced())
            .collect();
        WorkspaceFiles { all, unreferenced }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: &str, workspace: &str) -> PageRef {
        PageRef {
            id: id.to_string(),
            title: format!("Page {id}"),
            url: format!("https://wiki.example.org/spaces/{workspace}/pages/{id}"),
            workspace_key: workspace.to_string(),
        }
    }

    fn sighting(id: &str, size: u64, page: PageRef, referenced: bool) -> Sighting {
        Sighting {
            id: id.to_string(),
            title: format!("{id}.bin"),
            size,
            links: AttachmentLinks {
                download: format!("https://wiki.example.org/download/attachments/{id}"),
                delete_ui: "https://wiki.example.org/pages/viewpageattachments.action".to_string(),
                delete_api: format!("https://wiki.example.org/rest/api/content/{id}"),
            },
            page,
            versions: vec![Version {
                title: format!("{id}.bin"),
                number: Some(1),
            }],
            referenced_on_page: referenced,
        }
    }

    #[test]
    fn repeated_identical_sighting_is_idempotent() {
        let mut aggregator = AttachmentAggregator::new();
        aggregator.record_sighting(sighting("att1", 10, page("A", "DOC"), false));
        aggregator.record_sighting(sighting("att1", 10, page("A", "DOC"), false));

        assert_eq!(aggregator.len(), 1);
        let record = aggregator.get("att1").expect("record");
        assert!(record.other_pages().is_empty());
        assert_eq!(record.versions().len(), 1);
    }

    #[test]
    fn second_page_is_recorded_as_other_page() {
        let mut aggregator = AttachmentAggregator::new();
        aggregator.record_sighting(sighting("att1", 10, page("A", "DOC"), false));
        aggregator.record_sighting(sighting("att1", 10, page("B", "DOC"), true));
        aggregator.record_sighting(sighting("att1", 10, page("B", "DOC"), true));

        let record = aggregator.get("att1").expect("record");
        assert_eq!(record.owning_page.id, "A");
        assert_eq!(
            record
                .other_pages()
                .iter()
                .map(|page| page.id.as_str())
                .collect::<Vec<_>>(),
            vec!["B"]
        );
        assert!(!record.referenced_on_owning_page);
        assert!(!record.is_unreferenced());
    }

    #[test]
    fn first_sighting_keeps_title_and_size() {
        let mut aggregator = AttachmentAggregator::new();
        aggregator.record_sighting(sighting("att1", 10, page("A", "DOC"), false));
        let mut later = sighting("att1", 999, page("B", "DOC"), false);
        later.title = "renamed.bin".to_string();
        later.versions = vec![Version {
            title: "renamed.bin".to_string(),
            number: Some(2),
        }];
        aggregator.record_sighting(later);

        let record = aggregator.get("att1").expect("record");
        assert_eq!(record.size, 10);
        assert_eq!(record.title, "att1.bin");
        assert_eq!(record.versions().len(), 2);
        assert_eq!(record.titles(), vec!["att1.bin".to_string(), "renamed.bin".to_string()]);
    }

    #[test]
    fn partition_sorts_by_size_and_keeps_ties_stable() {
        let mut aggregator = AttachmentAggregator::new();
        aggregator.record_sighting(sighting("small", 5, page("A", "DOC"), true));
        aggregator.record_sighting(sighting("tie1", 50, page("A", "DOC"), false));
        aggregator.record_sighting(sighting("big", 500, page("A", "DOC"), false));
        aggregator.record_sighting(sighting("tie2", 50, page("A", "DOC"), false));
        aggregator.record_sighting(sighting("elsewhere", 1000, page("X", "OPS"), false));

        let files = aggregator.partition_workspace("DOC");
        let ids = files
            .all
            .iter()
            .map(|attachment| attachment.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["big", "tie1", "tie2", "small"]);
        let unreferenced = files
            .unreferenced
            .iter()
            .map(|attachment| attachment.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(unreferenced, vec!["big", "tie1", "tie2"]);
        assert_eq!(files.total_size(), 605);
    }

    #[test]
    fn attachment_shared_across_workspaces_stays_with_first_owner() {
        let mut aggregator = AttachmentAggregator::new();
        aggregator.record_sighting(sighting("shared", 42, page("A", "DOC"), false));
        aggregator.record_sighting(sighting("shared", 42, page("Z", "OPS"), false));

        assert_eq!(aggregator.partition_workspace("DOC").all.len(), 1);
        assert!(aggregator.partition_workspace("OPS").all.is_empty());
        assert!(aggregator.partition_workspace("DOC").unreferenced.is_empty());
    }
}
