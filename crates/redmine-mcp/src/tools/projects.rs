//! Project tools.

use redmine_core::{Result, SharedApi};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{default_limit, string_or_number, to_query, Tool, ToolRegistry, DEFAULT_LIMIT};

const PROJECTS_PATH: &str = "/projects.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListProjectsParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for ListProjectsParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetProjectParams {
    #[serde(skip_serializing, deserialize_with = "string_or_number")]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
}

pub async fn list_projects(api: SharedApi, params: ListProjectsParams) -> Result<Value> {
    let query = to_query(&params)?;
    api.get(PROJECTS_PATH, Some(&query)).await
}

pub async fn get_project(api: SharedApi, params: GetProjectParams) -> Result<Value> {
    let query = to_query(&params)?;
    let path = format!("/projects/{}.json", params.project_id);
    api.get(&path, Some(&query)).await
}

pub fn register(registry: &mut ToolRegistry, api: &SharedApi) -> Result<()> {
    registry.register(Tool::new(
        "list_projects",
        "List Redmine projects visible to the current user.",
        json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "description": "Max number of projects to return (default: 25)",
                    "default": 25
                },
                "offset": {
                    "type": "integer",
                    "description": "Number of projects to skip (default: 0)",
                    "default": 0
                }
            }
        }),
        api,
        list_projects,
    ))?;

    registry.register(Tool::new(
        "get_project",
        "Get details of a Redmine project.",
        json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": ["string", "integer"],
                    "description": "Project identifier or id"
                },
                "include": {
                    "type": "string",
                    "description": "Comma-separated associations to include: trackers, issue_categories, enabled_modules"
                }
            },
            "required": ["project_id"]
        }),
        api,
        get_project,
    ))?;

    Ok(())
}
