//! Reference data: statuses, trackers, priorities and users.

use redmine_core::{Result, SharedApi};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{default_limit, to_query, NoParams, Tool, ToolRegistry, DEFAULT_LIMIT};

const STATUSES_PATH: &str = "/issue_statuses.json";
const TRACKERS_PATH: &str = "/trackers.json";
const PRIORITIES_PATH: &str = "/enumerations/issue_priorities.json";
const USERS_PATH: &str = "/users.json";

/// Arguments of `list_users`. Listing users requires admin rights in Redmine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListUsersParams {
    /// 0 = anonymous, 1 = active, 2 = registered, 3 = locked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for ListUsersParams {
    fn default() -> Self {
        Self {
            status: None,
            name: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

pub async fn list_statuses(api: SharedApi, _: NoParams) -> Result<Value> {
    api.get(STATUSES_PATH, None).await
}

pub async fn list_trackers(api: SharedApi, _: NoParams) -> Result<Value> {
    api.get(TRACKERS_PATH, None).await
}

pub async fn list_priorities(api: SharedApi, _: NoParams) -> Result<Value> {
    api.get(PRIORITIES_PATH, None).await
}

pub async fn list_users(api: SharedApi, params: ListUsersParams) -> Result<Value> {
    let query = to_query(&params)?;
    api.get(USERS_PATH, Some(&query)).await
}

fn no_arguments() -> Value {
    json!({ "type": "object", "properties": {} })
}

pub fn register(registry: &mut ToolRegistry, api: &SharedApi) -> Result<()> {
    registry.register(Tool::new(
        "list_statuses",
        "List all issue statuses defined in Redmine, including whether each one closes the issue.",
        no_arguments(),
        api,
        list_statuses,
    ))?;

    registry.register(Tool::new(
        "list_trackers",
        "List all trackers (Bug, Feature, Support, ...) defined in Redmine.",
        no_arguments(),
        api,
        list_trackers,
    ))?;

    registry.register(Tool::new(
        "list_priorities",
        "List all issue priorities defined in Redmine.",
        no_arguments(),
        api,
        list_priorities,
    ))?;

    registry.register(Tool::new(
        "list_users",
        "List Redmine users. Requires administrator privileges.",
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "integer",
                    "description": "Filter by status: 0 = anonymous, 1 = active, 2 = registered, 3 = locked"
                },
                "name": {
                    "type": "string",
                    "description": "Filter by login, first name, last name or email"
                },
                "limit": {
                    "type": "integer",
                    "description": "Max number of users to return (default: 25)",
                    "default": 25
                },
                "offset": {
                    "type": "integer",
                    "description": "Number of users to skip (default: 0)",
                    "default": 0
                }
            }
        }),
        api,
        list_users,
    ))?;

    Ok(())
}
