//! Issue tools: listing, search, retrieval, creation and updates.
//!
//! Optional arguments left unset never reach Redmine. Their keys are
//! omitted entirely, which Redmine reads as "unfiltered" for listings and
//! "unchanged" for updates.

use redmine_core::{Result, SharedApi};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    default_limit, issue_envelope, opt_string_or_number, string_or_number, to_query, Tool,
    ToolRegistry, DEFAULT_LIMIT,
};

const ISSUES_PATH: &str = "/issues.json";
const SEARCH_PATH: &str = "/search.json";

fn issue_path(issue_id: u64) -> String {
    format!("/issues/{}.json", issue_id)
}

// =============================================================================
// Parameters
// =============================================================================

/// Arguments of `list_issues`; serializes directly into the query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListIssuesParams {
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub status_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<u64>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

impl Default for ListIssuesParams {
    fn default() -> Self {
        Self {
            project_id: None,
            status_id: None,
            assigned_to_id: None,
            tracker_id: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
            sort: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetIssueParams {
    #[serde(skip_serializing)]
    pub issue_id: u64,
    /// Comma-separated associations, forwarded as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchIssuesParams {
    pub query: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub project_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

/// Query sent to `/search.json`; `issues=1` restricts results to issues.
#[derive(Serialize)]
struct SearchQuery<'a> {
    q: &'a str,
    issues: u8,
    limit: u32,
    offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
}

/// Arguments of `create_issue`; serializes directly into the `issue` envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateIssueParams {
    #[serde(deserialize_with = "string_or_number")]
    pub project_id: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_issue_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
}

/// Arguments of `update_issue`; everything except `issue_id` goes in the envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateIssueParams {
    #[serde(skip_serializing)]
    pub issue_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Only sent together with a non-empty `notes`
    #[serde(default, skip_serializing_if = "super::is_false")]
    pub private_notes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_ratio: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddCommentParams {
    #[serde(skip_serializing)]
    pub issue_id: u64,
    pub notes: String,
    #[serde(default, skip_serializing_if = "super::is_false")]
    pub private_notes: bool,
}

/// Arguments of `bulk_update_issues`; the optional fields form the shared body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkUpdateParams {
    #[serde(skip_serializing)]
    pub issue_ids: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkStatus {
    Ok,
    Error,
}

/// Outcome of one issue within a bulk update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub id: u64,
    pub status: BulkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkUpdateResult {
    pub results: Vec<BulkItemResult>,
}

// =============================================================================
// Operations
// =============================================================================

pub async fn list_issues(api: SharedApi, params: ListIssuesParams) -> Result<Value> {
    let query = to_query(&params)?;
    api.get(ISSUES_PATH, Some(&query)).await
}

pub async fn get_issue(api: SharedApi, params: GetIssueParams) -> Result<Value> {
    let query = to_query(&params)?;
    api.get(&issue_path(params.issue_id), Some(&query)).await
}

pub async fn search_issues(api: SharedApi, params: SearchIssuesParams) -> Result<Value> {
    let query = to_query(&SearchQuery {
        q: &params.query,
        issues: 1,
        limit: params.limit,
        offset: params.offset,
        project_id: params.project_id.as_deref(),
    })?;
    api.get(SEARCH_PATH, Some(&query)).await
}

pub async fn create_issue(api: SharedApi, params: CreateIssueParams) -> Result<Value> {
    let body = issue_envelope(&params)?;
    api.post(ISSUES_PATH, Some(&body)).await
}

pub async fn update_issue(api: SharedApi, mut params: UpdateIssueParams) -> Result<Value> {
    let has_notes = params.notes.as_deref().is_some_and(|n| !n.is_empty());
    if !has_notes {
        params.private_notes = false;
    }
    let body = issue_envelope(&params)?;
    api.put(&issue_path(params.issue_id), Some(&body)).await
}

pub async fn add_comment(api: SharedApi, params: AddCommentParams) -> Result<Value> {
    let body = issue_envelope(&params)?;
    api.put(&issue_path(params.issue_id), Some(&body)).await
}

/// Apply one partial update to every issue in order. A failure is recorded
/// against its id and the remaining issues are still processed.
pub async fn bulk_update_issues(api: SharedApi, params: BulkUpdateParams) -> Result<Value> {
    let body = issue_envelope(&params)?;
    let mut results = Vec::with_capacity(params.issue_ids.len());

    for &id in &params.issue_ids {
        let outcome = match api.put(&issue_path(id), Some(&body)).await {
            Ok(_) => BulkItemResult {
                id,
                status: BulkStatus::Ok,
                message: None,
            },
            Err(e) => {
                warn!(issue_id = id, error = %e, "Bulk update failed for issue");
                BulkItemResult {
                    id,
                    status: BulkStatus::Error,
                    message: Some(e.to_string()),
                }
            }
        };
        results.push(outcome);
    }

    debug!(
        total = results.len(),
        failed = results.iter().filter(|r| r.status == BulkStatus::Error).count(),
        "Bulk update finished"
    );

    Ok(serde_json::to_value(BulkUpdateResult { results })?)
}

// =============================================================================
// Registration
// =============================================================================

pub fn register(registry: &mut ToolRegistry, api: &SharedApi) -> Result<()> {
    registry.register(Tool::new(
        "list_issues",
        "List Redmine issues with optional filters. Only the filters you pass are applied.",
        json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": ["string", "integer"],
                    "description": "Filter by project identifier or id"
                },
                "status_id": {
                    "type": ["string", "integer"],
                    "description": "Filter by status: \"open\", \"closed\", \"*\" or a numeric status id"
                },
                "assigned_to_id": {
                    "type": ["string", "integer"],
                    "description": "Filter by assignee id. Use \"me\" for the current user"
                },
                "tracker_id": {
                    "type": "integer",
                    "description": "Filter by tracker id"
                },
                "limit": {
                    "type": "integer",
                    "description": "Max number of issues to return (default: 25, max: 100)",
                    "default": 25
                },
                "offset": {
                    "type": "integer",
                    "description": "Number of issues to skip (default: 0)",
                    "default": 0
                },
                "sort": {
                    "type": "string",
                    "description": "Sort field and direction, e.g. \"updated_on:desc\""
                }
            }
        }),
        api,
        list_issues,
    ))?;

    registry.register(Tool::new(
        "get_issue",
        "Get detailed information about a specific Redmine issue.",
        json!({
            "type": "object",
            "properties": {
                "issue_id": {
                    "type": "integer",
                    "description": "The issue id"
                },
                "include": {
                    "type": "string",
                    "description": "Comma-separated associations to include: journals, children, attachments, relations, changesets, watchers"
                }
            },
            "required": ["issue_id"]
        }),
        api,
        get_issue,
    ))?;

    registry.register(Tool::new(
        "search_issues",
        "Search Redmine issues by keyword.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search keyword"
                },
                "project_id": {
                    "type": ["string", "integer"],
                    "description": "Limit the search to a project"
                },
                "limit": {
                    "type": "integer",
                    "description": "Max results (default: 25)",
                    "default": 25
                },
                "offset": {
                    "type": "integer",
                    "description": "Number of results to skip (default: 0)",
                    "default": 0
                }
            },
            "required": ["query"]
        }),
        api,
        search_issues,
    ))?;

    registry.register(Tool::new(
        "create_issue",
        "Create a new Redmine issue. Check get_ticket_rules first for project conventions.",
        json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": ["string", "integer"],
                    "description": "Project identifier or id"
                },
                "subject": {
                    "type": "string",
                    "description": "Issue subject"
                },
                "description": {
                    "type": "string",
                    "description": "Issue description (Textile or Markdown depending on Redmine settings)"
                },
                "tracker_id": { "type": "integer", "description": "Tracker id" },
                "status_id": { "type": "integer", "description": "Status id" },
                "priority_id": { "type": "integer", "description": "Priority id" },
                "assigned_to_id": { "type": "integer", "description": "Assignee user id" },
                "parent_issue_id": { "type": "integer", "description": "Parent issue id" },
                "start_date": { "type": "string", "description": "Start date (YYYY-MM-DD)" },
                "due_date": { "type": "string", "description": "Due date (YYYY-MM-DD)" },
                "estimated_hours": { "type": "number", "description": "Estimated hours" }
            },
            "required": ["project_id", "subject"]
        }),
        api,
        create_issue,
    ))?;

    registry.register(Tool::new(
        "update_issue",
        "Update an existing Redmine issue. Fields you omit are left unchanged.",
        json!({
            "type": "object",
            "properties": {
                "issue_id": { "type": "integer", "description": "The issue id to update" },
                "subject": { "type": "string", "description": "New subject" },
                "description": { "type": "string", "description": "New description" },
                "status_id": { "type": "integer", "description": "New status id" },
                "priority_id": { "type": "integer", "description": "New priority id" },
                "assigned_to_id": { "type": "integer", "description": "New assignee user id" },
                "tracker_id": { "type": "integer", "description": "New tracker id" },
                "notes": { "type": "string", "description": "Comment to add with the update" },
                "private_notes": {
                    "type": "boolean",
                    "description": "Whether the notes are private (only applies when notes are given)",
                    "default": false
                },
                "start_date": { "type": "string", "description": "New start date (YYYY-MM-DD)" },
                "due_date": { "type": "string", "description": "New due date (YYYY-MM-DD)" },
                "estimated_hours": { "type": "number", "description": "New estimated hours" },
                "done_ratio": {
                    "type": "integer",
                    "description": "Percentage done (0-100)",
                    "minimum": 0,
                    "maximum": 100
                }
            },
            "required": ["issue_id"]
        }),
        api,
        update_issue,
    ))?;

    registry.register(Tool::new(
        "add_comment",
        "Add a comment (journal note) to a Redmine issue.",
        json!({
            "type": "object",
            "properties": {
                "issue_id": { "type": "integer", "description": "The issue id" },
                "notes": { "type": "string", "description": "Comment text" },
                "private_notes": {
                    "type": "boolean",
                    "description": "Whether the comment is private",
                    "default": false
                }
            },
            "required": ["issue_id", "notes"]
        }),
        api,
        add_comment,
    ))?;

    registry.register(Tool::new(
        "bulk_update_issues",
        "Apply the same update to several Redmine issues. Each issue is updated independently; the result lists ok/error per id in input order.",
        json!({
            "type": "object",
            "properties": {
                "issue_ids": {
                    "type": "array",
                    "items": { "type": "integer" },
                    "description": "Issue ids to update"
                },
                "status_id": { "type": "integer", "description": "New status id for all issues" },
                "priority_id": { "type": "integer", "description": "New priority id for all issues" },
                "assigned_to_id": { "type": "integer", "description": "New assignee for all issues" },
                "notes": { "type": "string", "description": "Comment to add to all issues" }
            },
            "required": ["issue_ids"]
        }),
        api,
        bulk_update_issues,
    ))?;

    Ok(())
}
