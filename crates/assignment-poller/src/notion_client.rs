//! HTTP client for the Notion task database.
//!
//! Only the operations the pipeline needs: creating task pages and querying
//! a database by status (used by the bootstrap to enumerate activities).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const NOTION_VERSION: &str = "2022-06-28";
const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";

/// Create-page payload for the tasks database. Constructed once per
/// extracted assignment, submitted, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub parent: Parent,
    pub properties: TaskProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct Parent {
    pub database_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskProperties {
    #[serde(rename = "Status")]
    pub status: StatusProperty,
    #[serde(rename = "Type")]
    pub task_type: SelectProperty,
    #[serde(rename = "Estimated Time")]
    pub estimated_time: RichTextProperty,
    #[serde(rename = "Priority")]
    pub priority: SelectProperty,
    #[serde(rename = "Due date")]
    pub due_date: DateProperty,
    #[serde(rename = "Note")]
    pub note: RichTextProperty,
    #[serde(rename = "Name")]
    pub name: TitleProperty,
    /// Omitted entirely (not an empty list) when no activity matched
    #[serde(rename = "Activity", skip_serializing_if = "Option::is_none")]
    pub activity: Option<RelationProperty>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusProperty {
    pub status: StatusValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusValue {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectProperty {
    pub select: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateProperty {
    pub date: Option<DateRange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateRange {
    pub start: String,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RichTextProperty {
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RichText {
    pub text: TextContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextContent {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TitleProperty {
    pub title: Vec<RichText>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationProperty {
    pub relation: Vec<RelationRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationRef {
    pub id: String,
}

impl TaskRecord {
    /// Title text, as shown in the external database.
    pub fn title(&self) -> &str {
        self.properties
            .name
            .title
            .first()
            .map(|t| t.text.content.as_str())
            .unwrap_or("")
    }

    /// Link attached to the title, empty when the source had none.
    pub fn link(&self) -> &str {
        self.properties
            .name
            .title
            .first()
            .and_then(|t| t.text.link.as_ref())
            .map(|l| l.url.as_str())
            .unwrap_or("")
    }
}

/// Page created by a successful create call.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPage {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Page returned by a database query.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl Page {
    /// Text of the page's Name title property, if present.
    pub fn title(&self) -> Option<String> {
        let fragment = self.properties.pointer("/Name/title/0")?;
        fragment
            .pointer("/plain_text")
            .or_else(|| fragment.pointer("/text/content"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Page>,
}

pub struct NotionClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl NotionClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            base_url,
        }
    }

    /// Create one task page.
    pub async fn create_page(&self, record: &TaskRecord) -> Result<CreatedPage> {
        let response = self
            .http
            .post(format!("{}/pages", self.base_url))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(record)
            .send()
            .await
            .context("Task create request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Task create returned {}: {}", status, body);
        }

        response
            .json::<CreatedPage>()
            .await
            .context("Malformed create response")
    }

    /// Query a database for pages whose Status equals any of the given values.
    pub async fn query_database(&self, database_id: &str, statuses: &[String]) -> Result<Vec<Page>> {
        let filters: Vec<serde_json::Value> = statuses
            .iter()
            .map(|status| {
                serde_json::json!({
                    "property": "Status",
                    "status": { "equals": status }
                })
            })
            .collect();

        let response = self
            .http
            .post(format!("{}/databases/{}/query", self.base_url, database_id))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&serde_json::json!({ "filter": { "or": filters } }))
            .send()
            .await
            .context("Database query request failed")?
            .error_for_status()
            .context("Database query failed")?;

        let query: QueryResponse = response
            .json()
            .await
            .context("Malformed query response")?;

        Ok(query.results)
    }
}
