use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{AuditConfig, Credentials};
use crate::lookup::Lookup;
use crate::model::{AttachmentSnapshot, PageSummary, Version, Workspace};

pub const WORKSPACE_PAGE_SIZE: usize = 50;
pub const CONTENT_PAGE_SIZE: usize = 100;

/// Hard stop for endpoints that keep advertising a next page.
const MAX_PAGINATION_REQUESTS: usize = 10_000;

/// Read-only view of the content platform.
///
/// Every call is best-effort: failures come back as `Lookup::Empty` and are
/// never raised past this boundary.
pub trait ContentApi {
    fn list_workspaces(&mut self) -> Lookup<Vec<Workspace>>;
    fn list_pages(&mut self, workspace_key: &str) -> Lookup<Vec<PageSummary>>;
    fn list_attachments(&mut self, page_id: &str) -> Lookup<Vec<AttachmentSnapshot>>;
    fn attachment_versions(&mut self, page_id: &str, attachment_id: &str)
    -> Lookup<Vec<Version>>;
    fn page_markup(&mut self, page_id: &str) -> Lookup<String>;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct ConfluenceClientConfig {
    pub credentials: Credentials,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl ConfluenceClientConfig {
    pub fn from_config(config: &AuditConfig, credentials: Credentials) -> Self {
        Self {
            credentials,
            user_agent: config.user_agent(),
            timeout_ms: config.timeout_ms(),
        }
    }
}

pub struct ConfluenceClient {
    client: Client,
    config: ConfluenceClientConfig,
    api_base: Url,
    request_count: usize,
}

impl ConfluenceClient {
    pub fn new(config: ConfluenceClientConfig) -> Result<Self> {
        let base = config.credentials.base_url.trim_end_matches('/');
        let api_base = Url::parse(&format!("{base}/rest/api/"))
            .with_context(|| format!("invalid base URL: {}", config.credentials.base_url))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build content API HTTP client")?;

        Ok(Self {
            client,
            config,
            api_base,
            request_count: 0,
        })
    }

    fn request_json(&mut self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self
            .api_base
            .join(path)
            .with_context(|| format!("invalid API path: {path}"))?;
        debug!("GET {url} {params:?}");

        self.request_count += 1;
        let response = self
            .client
            .get(url.clone())
            .basic_auth(
                &self.config.credentials.user,
                Some(&self.config.credentials.api_token),
            )
            .header("Accept", "application/json")
            .query(params)
            .send()
            .with_context(|| format!("failed to call {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("content API request failed with HTTP {status} for {url}");
        }
        response
            .json::<Value>()
            .with_context(|| format!("failed to decode JSON response from {url}"))
    }

    fn paginated(
        &mut self,
        path: &str,
        params: &[(&str, String)],
        limit: usize,
    ) -> Lookup<Vec<Value>> {
        collect_paginated(path, limit, |start| {
            let mut query = params.to_vec();
            query.push(("limit", limit.to_string()));
            query.push(("start", start.to_string()));
            self.request_json(path, &query)
        })
    }
}

impl ContentApi for ConfluenceClient {
    fn list_workspaces(&mut self) -> Lookup<Vec<Workspace>> {
        self.paginated("space", &[], WORKSPACE_PAGE_SIZE).map(|items| {
            decode_records::<SpaceRecord>(items, "space")
                .into_iter()
                .map(Into::into)
                .collect()
        })
    }

    fn list_pages(&mut self, workspace_key: &str) -> Lookup<Vec<PageSummary>> {
        let params = [
            ("spaceKey", workspace_key.to_string()),
            ("type", "page".to_string()),
        ];
        self.paginated("content", &params, CONTENT_PAGE_SIZE).map(|items| {
            decode_records::<PageRecord>(items, "page")
                .into_iter()
                .map(Into::into)
                .collect()
        })
    }

    fn list_attachments(&mut self, page_id: &str) -> Lookup<Vec<AttachmentSnapshot>> {
        let path = format!("content/{page_id}/child/attachment");
        let params = [("expand", "version".to_string())];
        self.paginated(&path, &params, CONTENT_PAGE_SIZE).map(|items| {
            decode_records::<AttachmentRecord>(items, "attachment")
                .into_iter()
                .map(Into::into)
                .collect()
        })
    }

    fn attachment_versions(
        &mut self,
        page_id: &str,
        attachment_id: &str,
    ) -> Lookup<Vec<Version>> {
        let params = [("expand", "version".to_string())];
        lookup_versions(page_id, attachment_id, |path| {
            self.request_json(path, &params)
        })
    }

    fn page_markup(&mut self, page_id: &str) -> Lookup<String> {
        let path = format!("content/{page_id}");
        let params = [("expand", "body.storage".to_string())];
        markup_from_response(self.request_json(&path, &params))
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

/// Walk a `limit`/`start` cursor until the payload stops advertising a next
/// page or returns nothing.
///
/// A failure on the first request means no data at all; a later failure
/// keeps whatever was collected up to that point.
pub fn collect_paginated(
    what: &str,
    limit: usize,
    fetch: impl FnMut(usize) -> Result<Value>,
) -> Lookup<Vec<Value>> {
    collect_paginated_bounded(what, limit, MAX_PAGINATION_REQUESTS, fetch)
}

fn collect_paginated_bounded(
    what: &str,
    limit: usize,
    max_requests: usize,
    mut fetch: impl FnMut(usize) -> Result<Value>,
) -> Lookup<Vec<Value>> {
    let mut items = Vec::new();
    let mut start = 0usize;

    for request in 0..max_requests {
        let payload = match fetch(start) {
            Ok(payload) => payload,
            Err(error) if request == 0 => {
                return Lookup::from_result(Err(error), &format!("{what} listing"));
            }
            Err(error) => {
                warn!("{what} listing truncated after {} items ({error:#})", items.len());
                return Lookup::Data(items);
            }
        };

        let page = match payload.get("results").and_then(Value::as_array) {
            Some(results) if !results.is_empty() => results.clone(),
            _ => return Lookup::Data(items),
        };
        items.extend(page);

        if !has_next_link(&payload) {
            return Lookup::Data(items);
        }
        start += limit;
    }

    warn!(
        "{what} listing truncated after {max_requests} requests ({} items)",
        items.len()
    );
    Lookup::Data(items)
}

/// Version of an attachment: the page-scoped child endpoint first, then the
/// attachment's own content record. Either may legitimately have nothing.
fn lookup_versions(
    page_id: &str,
    attachment_id: &str,
    mut fetch: impl FnMut(&str) -> Result<Value>,
) -> Lookup<Vec<Version>> {
    let scoped_path = format!("content/{page_id}/child/attachment/{attachment_id}");
    let scoped =
        Lookup::from_optional_result(fetch(&scoped_path), "page-scoped attachment version lookup");
    if let Some(version) = scoped
        .into_option()
        .and_then(|payload| first_result_version(&payload))
    {
        return Lookup::Data(vec![version]);
    }

    let content_path = format!("content/{attachment_id}");
    Lookup::from_optional_result(fetch(&content_path), "attachment content version lookup")
        .into_option()
        .and_then(|payload| version_from_value(&payload))
        .map(|version| vec![version])
        .into()
}

fn has_next_link(payload: &Value) -> bool {
    payload
        .get("_links")
        .and_then(|links| links.get("next"))
        .is_some_and(|next| !next.is_null())
}

fn decode_records<T: DeserializeOwned>(items: Vec<Value>, kind: &str) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(record) => Some(record),
            Err(error) => {
                debug!("skipping malformed {kind} record: {error}");
                None
            }
        })
        .collect()
}

fn first_result_version(payload: &Value) -> Option<Version> {
    payload
        .get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .and_then(version_from_value)
}

fn version_from_value(value: &Value) -> Option<Version> {
    let record = serde_json::from_value::<VersionedRecord>(value.clone()).ok()?;
    Some(Version {
        title: record.title.unwrap_or_default(),
        number: record.version.and_then(|version| version.number),
    })
}

fn markup_from_response(response: Result<Value>) -> Lookup<String> {
    Lookup::from_result(response, "page markup lookup")
        .into_option()
        .and_then(|payload| storage_value(&payload))
        .into()
}

fn storage_value(payload: &Value) -> Option<String> {
    payload
        .get("body")
        .and_then(|body| body.get("storage"))
        .and_then(|storage| storage.get("value"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// `extensions.fileSize` arrives as a number on some deployments and a
/// string on others.
fn parse_file_size(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().map(|size| size.max(0.0) as u64))
            .unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

#[derive(Debug, Deserialize)]
struct SpaceRecord {
    key: String,
    name: Option<String>,
}

impl From<SpaceRecord> for Workspace {
    fn from(record: SpaceRecord) -> Self {
        let name = record
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| record.key.clone());
        Self {
            key: record.key,
            name,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RecordLinks {
    webui: Option<String>,
    download: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageRecord {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "_links")]
    links: RecordLinks,
}

impl From<PageRecord> for PageSummary {
    fn from(record: PageRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            webui: record.links.webui,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct VersionPayload {
    number: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AttachmentRecord {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    extensions: serde_json::Map<String, Value>,
    #[serde(default, rename = "_links")]
    links: RecordLinks,
    #[serde(default)]
    version: Option<VersionPayload>,
}

impl From<AttachmentRecord> for AttachmentSnapshot {
    fn from(record: AttachmentRecord) -> Self {
        Self {
            file_size: parse_file_size(record.extensions.get("fileSize")),
            id: record.id,
            title: record.title,
            download: record.links.download,
            webui: record.links.webui,
            version: record.version.and_then(|version| version.number),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VersionedRecord {
    title: Option<String>,
    version: Option<VersionPayload>,
}
