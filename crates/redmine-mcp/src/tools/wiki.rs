//! Wiki tools, including the per-project ticket rules page.

use redmine_core::{Result, SharedApi};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{string_or_number, Tool, ToolRegistry};

/// Wiki page a project uses to document its issue-writing conventions.
pub const TICKET_RULES_PAGE: &str = "TicketRules";

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectParams {
    #[serde(deserialize_with = "string_or_number")]
    pub project_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiPageParams {
    #[serde(deserialize_with = "string_or_number")]
    pub project_id: String,
    pub title: String,
}

fn wiki_path(project_id: &str, page: &str) -> String {
    format!("/projects/{}/wiki/{}.json", project_id, page)
}

pub async fn list_wiki_pages(api: SharedApi, params: ProjectParams) -> Result<Value> {
    api.get(&wiki_path(&params.project_id, "index"), None).await
}

pub async fn get_wiki_page(api: SharedApi, params: WikiPageParams) -> Result<Value> {
    api.get(&wiki_path(&params.project_id, &params.title), None).await
}

/// A 404 here means the project defines no rules; it is reported unchanged.
pub async fn get_ticket_rules(api: SharedApi, params: ProjectParams) -> Result<Value> {
    api.get(&wiki_path(&params.project_id, TICKET_RULES_PAGE), None).await
}

fn project_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": {
                "type": ["string", "integer"],
                "description": "Project identifier or id"
            }
        },
        "required": ["project_id"]
    })
}

pub fn register(registry: &mut ToolRegistry, api: &SharedApi) -> Result<()> {
    registry.register(Tool::new(
        "list_wiki_pages",
        "List the wiki pages of a Redmine project.",
        project_schema(),
        api,
        list_wiki_pages,
    ))?;

    registry.register(Tool::new(
        "get_wiki_page",
        "Get the content of a Redmine wiki page. Titles are case-sensitive.",
        json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": ["string", "integer"],
                    "description": "Project identifier or id"
                },
                "title": {
                    "type": "string",
                    "description": "Wiki page title"
                }
            },
            "required": ["project_id", "title"]
        }),
        api,
        get_wiki_page,
    ))?;

    registry.register(Tool::new(
        "get_ticket_rules",
        "Get the ticket rules of a project (the \"TicketRules\" wiki page). Read these before creating or updating issues. A 404 means the project defines no rules.",
        project_schema(),
        api,
        get_ticket_rules,
    ))?;

    Ok(())
}
