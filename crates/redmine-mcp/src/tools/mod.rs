//! Tool registry and the Redmine tool groups.
//!
//! Each tool is an explicit record of name, description, input schema and
//! handler. The handler deserializes the call arguments into the
//! operation's parameter struct (serde applies defaults) and awaits the
//! operation, which performs exactly one request through [`RedmineApi`]
//! (bulk update performs one per issue).

pub mod issues;
pub mod master;
pub mod projects;
pub mod wiki;

#[cfg(test)]
pub(crate) mod fake;

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use redmine_core::{Error, JsonMap, Result, SharedApi};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::protocol::{ToolCallResult, ToolDefinition};

/// Default page size for collection endpoints.
pub const DEFAULT_LIMIT: u32 = 25;

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A named, independently invocable operation.
pub struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
    handler: Handler,
}

impl Tool {
    /// Bind `operation` to `api` under `name`.
    ///
    /// Arguments are deserialized into `P` before the operation runs; a
    /// mismatch is reported as [`Error::InvalidArguments`].
    pub fn new<P, F, Fut>(
        name: &'static str,
        description: &'static str,
        input_schema: Value,
        api: &SharedApi,
        operation: F,
    ) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(SharedApi, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let api = Arc::clone(api);
        let operation = Arc::new(operation);

        let handler: Handler = Arc::new(move |arguments: Value| {
            let api = Arc::clone(&api);
            let operation = Arc::clone(&operation);
            async move {
                let params: P = serde_json::from_value(arguments)
                    .map_err(|e| Error::InvalidArguments(e.to_string()))?;
                operation(api, params).await
            }
            .boxed()
        });

        Self {
            name,
            description,
            input_schema,
            handler,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// Definition advertised through `tools/list`.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.input_schema.clone(),
        }
    }

    /// Invoke the tool. Missing or `null` arguments mean "no arguments".
    pub async fn call(&self, arguments: Option<Value>) -> Result<Value> {
        let arguments = match arguments {
            None | Some(Value::Null) => Value::Object(JsonMap::new()),
            Some(value) => value,
        };
        (self.handler)(arguments).await
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name).finish()
    }
}

/// Ordered set of tools with unique names.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Names must be unique.
    pub fn register(&mut self, tool: Tool) -> Result<()> {
        if self.get(tool.name).is_some() {
            return Err(Error::DuplicateTool(tool.name.to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(Tool::definition).collect()
    }

    /// Call a tool by name, returning the raw JSON result.
    pub async fn call(&self, name: &str, arguments: Option<Value>) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;
        tool.call(arguments).await
    }

    /// Call a tool by name and render the outcome as an MCP tool result.
    pub async fn execute(&self, name: &str, arguments: Option<Value>) -> ToolCallResult {
        match self.call(name, arguments).await {
            Ok(value) => ToolCallResult::json(&value),
            Err(e) => {
                warn!(tool = name, error = %e, "Tool call failed");
                ToolCallResult::error(e.to_string())
            }
        }
    }
}

/// Register every Redmine tool group against one shared client.
pub fn redmine_tools(api: SharedApi) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    issues::register(&mut registry, &api)?;
    projects::register(&mut registry, &api)?;
    master::register(&mut registry, &api)?;
    wiki::register(&mut registry, &api)?;
    Ok(registry)
}

// =============================================================================
// Parameter helpers shared by the tool groups
// =============================================================================

/// Arguments of tools that take none.
#[derive(Debug, Default, Deserialize)]
pub struct NoParams {}

pub(crate) fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

/// Serialize a parameter struct into a query map; `None` fields are skipped
/// by their `skip_serializing_if` attributes.
pub(crate) fn to_query<T: Serialize>(params: &T) -> Result<JsonMap> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidData(format!(
            "Expected query parameters to serialize as an object, got {}",
            other
        ))),
    }
}

/// Wrap a partial issue under the `issue` key Redmine expects.
pub(crate) fn issue_envelope<T: Serialize>(fields: &T) -> Result<Value> {
    let mut body = JsonMap::new();
    body.insert("issue".to_string(), Value::Object(to_query(fields)?));
    Ok(Value::Object(body))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

/// Accept identifiers given either as `"web"` or as `42`.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

pub(crate) fn opt_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fake::FakeApi;
    use serde_json::json;

    /// Every tool the server exposes, grouped as registered.
    const ALL_TOOLS: &[&str] = &[
        "list_issues",
        "get_issue",
        "search_issues",
        "create_issue",
        "update_issue",
        "add_comment",
        "bulk_update_issues",
        "list_projects",
        "get_project",
        "list_statuses",
        "list_trackers",
        "list_priorities",
        "list_users",
        "list_wiki_pages",
        "get_wiki_page",
        "get_ticket_rules",
    ];

    fn registry() -> (Arc<FakeApi>, ToolRegistry) {
        let fake = FakeApi::new();
        let api: SharedApi = fake.clone();
        (fake, redmine_tools(api).unwrap())
    }

    #[test]
    fn test_all_tools_registered_once() {
        let (_, registry) = registry();
        assert_eq!(registry.names(), ALL_TOOLS);
        assert_eq!(registry.len(), ALL_TOOLS.len());
    }

    #[test]
    fn test_definitions_have_object_schemas() {
        let (_, registry) = registry();
        for def in registry.definitions() {
            assert!(!def.description.is_empty(), "{} has no description", def.name);
            assert_eq!(def.input_schema["type"], "object", "{}", def.name);
            assert!(def.input_schema["properties"].is_object(), "{}", def.name);
        }
    }

    #[test]
    fn test_required_arguments_are_declared() {
        let (_, registry) = registry();
        let required =
            |name: &str| registry.get(name).unwrap().input_schema()["required"].clone();

        assert_eq!(required("create_issue"), json!(["project_id", "subject"]));
        assert_eq!(required("update_issue"), json!(["issue_id"]));
        assert_eq!(required("bulk_update_issues"), json!(["issue_ids"]));
        assert_eq!(required("get_wiki_page"), json!(["project_id", "title"]));
        assert!(registry.get("list_statuses").unwrap().input_schema()["required"].is_null());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let fake = FakeApi::new();
        let api: SharedApi = fake;
        let mut registry = ToolRegistry::new();
        wiki::register(&mut registry, &api).unwrap();

        let err = wiki::register(&mut registry, &api).unwrap_err();
        assert!(matches!(err, Error::DuplicateTool(name) if name == "list_wiki_pages"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (fake, registry) = registry();
        let err = registry.call("delete_everything", None).await.unwrap_err();
        assert!(matches!(err, Error::UnknownTool(_)));

        let result = registry.execute("delete_everything", None).await;
        assert_eq!(result.is_error, Some(true));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_api() {
        let (fake, registry) = registry();

        let err = registry
            .call("get_issue", Some(json!({"issue_id": "not-a-number"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));

        let err = registry.call("create_issue", Some(json!({"subject": "x"}))).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));

        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_null_arguments_mean_defaults() {
        let (fake, registry) = registry();
        registry.call("list_projects", Some(Value::Null)).await.unwrap();

        let call = fake.last_call();
        assert_eq!(call.params, json!({"limit": 25, "offset": 0}).as_object().cloned());
    }

    #[tokio::test]
    async fn test_execute_renders_json_text() {
        let (fake, registry) = registry();
        fake.respond("/trackers.json", json!({"trackers": [{"id": 1, "name": "Bug"}]}));

        let result = registry.execute("list_trackers", None).await;
        assert!(result.is_error.is_none());
        let parsed: Value = serde_json::from_str(result.first_text().unwrap()).unwrap();
        assert_eq!(parsed["trackers"][0]["name"], "Bug");
    }

    #[tokio::test]
    async fn test_execute_renders_api_failure() {
        let (fake, registry) = registry();
        fake.fail("/projects/web/wiki/TicketRules.json", 404);

        let result = registry
            .execute("get_ticket_rules", Some(json!({"project_id": "web"})))
            .await;
        assert_eq!(result.is_error, Some(true));
        assert!(result.first_text().unwrap().contains("404"));
    }

    #[test]
    fn test_string_or_number() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(deserialize_with = "string_or_number")]
            id: String,
            #[serde(default, deserialize_with = "opt_string_or_number")]
            other: Option<String>,
        }

        let probe: Probe = serde_json::from_value(json!({"id": 42})).unwrap();
        assert_eq!(probe.id, "42");
        assert_eq!(probe.other, None);

        let probe: Probe = serde_json::from_value(json!({"id": "web", "other": "open"})).unwrap();
        assert_eq!(probe.id, "web");
        assert_eq!(probe.other.as_deref(), Some("open"));

        let probe: Probe = serde_json::from_value(json!({"id": "x", "other": null})).unwrap();
        assert_eq!(probe.other, None);

        assert!(serde_json::from_value::<Probe>(json!({"id": [1]})).is_err());
    }
}
