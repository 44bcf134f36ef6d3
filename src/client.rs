use crate::config::{Credentials, Settings};
use crate::error::{ApiError, CocalcError, ConfigError, Result};
use crate::models::{ExecOutput, ExecRequest, Invitation, ProjectUsers, Record, Upgrades};
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// Query table holding every project of the account
const ALL_PROJECTS: &str = "projects_all";
/// Query table holding the most recently used projects
const RECENT_PROJECTS: &str = "projects";

/// CoCalc API client
pub struct Client {
    http_client: HttpClient,
    credentials: Credentials,
    settings: Settings,
}

impl Client {
    /// Create a client, taking base URL and timeout overrides from the environment
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_settings(credentials, Settings::from_env()?)
    }

    /// Create a client from a YAML credentials file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Credentials::from_file(path)?)
    }

    /// Create a client with explicit connection settings
    pub fn with_settings(credentials: Credentials, settings: Settings) -> Result<Self> {
        credentials.validate()?;

        let http_client = HttpClient::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            http_client,
            credentials,
            settings,
        })
    }

    /// Send one API message and return the decoded JSON response.
    ///
    /// `message` is the last path segment, e.g. `query` or `create_project`.
    pub async fn call_api(&self, message: &str, payload: &Value) -> Result<Value> {
        self.post(message, payload, None).await
    }

    async fn post(&self, message: &str, payload: &Value, timeout: Option<Duration>) -> Result<Value> {
        let url = self.settings.endpoint(message);
        debug!("Request: POST {}", url);

        let mut request = self
            .http_client
            .post(&url)
            .basic_auth(&self.credentials.api_key, Some(""))
            .json(payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!("Response: {}", status);
        trace!(response = %body, "Response body");

        if !status.is_success() {
            return Err(status_error(status, body).into());
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|e| ApiError::ResponseParse(e.to_string()))?;

        if let Some(message) = remote_error(&value) {
            return Err(ApiError::Remote(message).into());
        }

        Ok(value)
    }

    /// All projects of the account
    pub async fn list_projects(&self) -> Result<Vec<Record>> {
        self.query_projects(ALL_PROJECTS).await
    }

    /// The most recently used projects; a cheaper query than `list_projects`
    pub async fn list_recent_projects(&self) -> Result<Vec<Record>> {
        self.query_projects(RECENT_PROJECTS).await
    }

    async fn query_projects(&self, table: &str) -> Result<Vec<Record>> {
        let payload = json!({
            "query": {
                table: [{"project_id": null, "title": null, "description": null}]
            }
        });
        let response = self.call_api("query", &payload).await?;

        into_rows(response, table)
    }

    /// Projects whose title equals `title` exactly (case-sensitive)
    pub async fn projects_by_title(&self, title: &str) -> Result<Vec<Record>> {
        if title.is_empty() {
            return Err(ApiError::InvalidRequest("project title must not be empty".to_string()).into());
        }

        let projects = self.list_projects().await?;

        Ok(projects
            .into_iter()
            .filter(|project| project.get("title").and_then(Value::as_str) == Some(title))
            .collect())
    }

    /// Ask the server which account the API key belongs to
    pub async fn fetch_account_id(&self) -> Result<String> {
        let payload = json!({"query": {"accounts": {"account_id": null}}});
        let response = self.call_api("query", &payload).await?;

        response
            .pointer("/query/accounts/account_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::UnexpectedResponse("no account_id in accounts query".to_string()).into()
            })
    }

    /// Account ids matching a user name or email address
    pub async fn search_users(&self, query: &str) -> Result<Vec<String>> {
        let response = self.call_api("user_search", &json!({"query": query})).await?;

        let results = response
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| ApiError::UnexpectedResponse("no results in user search".to_string()))?;

        results
            .iter()
            .map(|result| {
                result
                    .get("account_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        CocalcError::from(ApiError::UnexpectedResponse(
                            "user search result without account_id".to_string(),
                        ))
                    })
            })
            .collect()
    }

    /// Resolve a project UUID or title to a project id.
    ///
    /// A UUID is returned as is; a title must match exactly one project.
    pub async fn as_project_id(&self, projectish: &str) -> Result<String> {
        if is_uuid(projectish) {
            return Ok(projectish.to_string());
        }

        let ids = self
            .projects_by_title(projectish)
            .await?
            .iter()
            .map(|project| string_field(project, "project_id"))
            .collect::<Result<Vec<_>>>()?;

        exactly_one(ids, "project", projectish)
    }

    /// Resolve an account UUID, user name or email address to an account id
    pub async fn as_account_id(&self, accountish: &str) -> Result<String> {
        if is_uuid(accountish) {
            return Ok(accountish.to_string());
        }

        let ids = self.search_users(accountish).await?;

        exactly_one(ids, "user", accountish)
    }

    /// Mark the project as actively used so it does not idle out.
    /// Returns the response event.
    pub async fn touch_project(&self, projectish: &str) -> Result<String> {
        let project_id = self.as_project_id(projectish).await?;
        let payload = json!({"id": request_id(), "project_id": project_id});
        let response = self.call_api("touch_project", &payload).await?;

        event(&response)
    }

    /// Create a project and return its id.
    ///
    /// If exactly one project with `title` already exists its id is returned
    /// and nothing is created.
    pub async fn create_project(&self, title: &str, description: &str, start: bool) -> Result<String> {
        let mut existing = self.projects_by_title(title).await?;
        match existing.len() {
            0 => {}
            1 => {
                let project_id = string_field(&existing.remove(0), "project_id")?;
                info!(%project_id, title, "Project exists, skipping creation");
                return Ok(project_id);
            }
            _ => {
                return Err(ApiError::ManyFound {
                    kind: "project",
                    query: title.to_string(),
                }
                .into())
            }
        }

        info!(title, "Creating project");
        let payload = json!({"title": title, "description": description, "start": start});
        let response = self.call_api("create_project", &payload).await?;

        response
            .get("project_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::UnexpectedResponse("no project_id in create_project response".to_string())
                    .into()
            })
    }

    /// Owner and collaborators of a project
    pub async fn project_users(&self, projectish: &str) -> Result<ProjectUsers> {
        let project_id = self.as_project_id(projectish).await?;
        let payload = json!({"query": {"projects": {"project_id": project_id, "users": null}}});
        let response = self.call_api("query", &payload).await?;

        let users = response
            .pointer("/query/projects/users")
            .and_then(Value::as_object)
            .ok_or_else(|| ApiError::UnexpectedResponse("no users in projects query".to_string()))?;

        let mut project_users = ProjectUsers::default();
        for (account_id, info) in users {
            match info.get("group").and_then(Value::as_str) {
                Some("collaborator") => project_users.collaborators.push(account_id.clone()),
                Some("owner") if project_users.owner.is_none() => {
                    project_users.owner = Some(account_id.clone())
                }
                Some("owner") => {
                    return Err(ApiError::UnexpectedResponse(format!(
                        "project {project_id} has more than one owner"
                    ))
                    .into())
                }
                other => {
                    return Err(ApiError::UnexpectedResponse(format!(
                        "unknown user group {other:?} for {account_id}"
                    ))
                    .into())
                }
            }
        }

        Ok(project_users)
    }

    /// Invite a user to collaborate on a project
    pub async fn invite_collaborator(
        &self,
        accountish: &str,
        projectish: &str,
        invitation: &Invitation,
    ) -> Result<Value> {
        let account_id = self.as_account_id(accountish).await?;
        let project_id = self.as_project_id(projectish).await?;

        self.send_invitation(&account_id, &project_id, invitation).await
    }

    /// Invite every user in `accountishes` who is not yet on the project.
    /// Returns the account ids that were invited.
    pub async fn invite_collaborators<S: AsRef<str>>(
        &self,
        accountishes: &[S],
        projectish: &str,
        invitation: &Invitation,
    ) -> Result<Vec<String>> {
        let project_id = self.as_project_id(projectish).await?;

        let mut account_ids = Vec::with_capacity(accountishes.len());
        for accountish in accountishes {
            account_ids.push(self.as_account_id(accountish.as_ref()).await?);
        }

        let users = self.project_users(&project_id).await?;
        let mut seen = HashSet::new();
        let mut invited = Vec::new();
        for account_id in account_ids {
            if users.contains(&account_id) || !seen.insert(account_id.clone()) {
                continue;
            }
            self.send_invitation(&account_id, &project_id, invitation)
                .await?;
            invited.push(account_id);
        }

        Ok(invited)
    }

    async fn send_invitation(
        &self,
        account_id: &str,
        project_id: &str,
        invitation: &Invitation,
    ) -> Result<Value> {
        let replyto = match &invitation.replyto {
            Some(replyto) => replyto.clone(),
            None => self
                .credentials
                .email
                .clone()
                .ok_or(ConfigError::MissingField("email"))?,
        };
        let replyto_name = match &invitation.replyto_name {
            Some(name) => name.clone(),
            None => self
                .credentials
                .full_name()
                .ok_or(ConfigError::MissingField("first_name"))?,
        };

        info!(account_id, project_id, "Inviting collaborator");
        let payload = json!({
            "account_id": account_id,
            "project_id": project_id,
            "subject": invitation.subject,
            "email": invitation.body,
            "replyto": replyto,
            "replyto_name": replyto_name,
        });

        self.call_api("invite_collaborator", &payload).await
    }

    /// Run a command inside a project
    pub async fn project_exec(&self, projectish: &str, request: &ExecRequest) -> Result<ExecOutput> {
        // The server holds the response until the command finishes
        let timeout = self
            .settings
            .timeout
            .checked_add(Duration::from_secs(request.timeout))
            .ok_or_else(|| {
                ApiError::InvalidRequest(format!("exec timeout too large: {}s", request.timeout))
            })?;

        let project_id = self.as_project_id(projectish).await?;
        let payload = json!({
            "id": request_id(),
            "project_id": project_id,
            "path": request.cwd,
            "command": request.command,
            "timeout": request.timeout,
            "args": request.args,
            "bash": request.bash,
            "err_on_exit": request.err_on_exit,
        });

        let response = self.post("project_exec", &payload, Some(timeout)).await?;

        serde_json::from_value(response)
            .map_err(|e| ApiError::UnexpectedResponse(format!("project_exec: {e}")).into())
    }

    /// Write `content` to the text file at `path` inside a project
    pub async fn write_text_file_to_project(
        &self,
        projectish: &str,
        path: &str,
        content: &str,
    ) -> Result<Value> {
        let project_id = self.as_project_id(projectish).await?;
        let payload = json!({
            "id": request_id(),
            "project_id": project_id,
            "path": path,
            "content": content,
        });

        self.call_api("write_text_file_to_project", &payload).await
    }

    /// Apply quota upgrades to a project from an account's upgrade pool.
    ///
    /// The configured account pays for the upgrade when `accountish` is `None`.
    pub async fn upgrade_project(
        &self,
        projectish: &str,
        accountish: Option<&str>,
        upgrades: &Upgrades,
    ) -> Result<Value> {
        if upgrades.is_empty() {
            return Err(ApiError::InvalidRequest("no upgrades given".to_string()).into());
        }

        let project_id = self.as_project_id(projectish).await?;
        let account_id = match accountish {
            Some(accountish) => self.as_account_id(accountish).await?,
            None => self.credentials.account_id.clone(),
        };

        let payload = json!({
            "query": {
                "projects": {
                    "project_id": project_id,
                    "users": {
                        account_id: {"upgrades": upgrades}
                    }
                }
            }
        });

        self.call_api("query", &payload).await
    }

    /// Get a reference to the credentials
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Get a reference to the connection settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

fn status_error(status: StatusCode, body: String) -> ApiError {
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
    let status = status.as_u16();

    match status {
        401 | 403 => ApiError::Authentication { status, message },
        500..=599 => ApiError::Server { status, message },
        _ => ApiError::Status { status, message },
    }
}

/// The message of an `{"event": "error"}` response
fn remote_error(value: &Value) -> Option<String> {
    if value.get("event").and_then(Value::as_str) != Some("error") {
        return None;
    }

    Some(
        value
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
    )
}

/// Rows of a query response: either a bare array or `query.<table>`
fn into_rows(response: Value, table: &str) -> Result<Vec<Record>> {
    let rows = match response {
        Value::Array(rows) => rows,
        Value::Object(mut envelope) => match envelope
            .get_mut("query")
            .and_then(|query| query.get_mut(table))
            .map(Value::take)
        {
            Some(Value::Array(rows)) => rows,
            _ => {
                return Err(
                    ApiError::UnexpectedResponse(format!("no `query.{table}` rows in response")).into(),
                )
            }
        },
        other => {
            return Err(
                ApiError::UnexpectedResponse(format!("expected rows, got {other}")).into(),
            )
        }
    };

    rows.into_iter()
        .map(|row| match row {
            Value::Object(record) => Ok(record),
            other => Err(CocalcError::from(ApiError::UnexpectedResponse(format!(
                "expected object row, got {other}"
            )))),
        })
        .collect()
}

fn string_field(record: &Record, key: &str) -> Result<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::UnexpectedResponse(format!("record without `{key}`")).into())
}

fn event(response: &Value) -> Result<String> {
    response
        .get("event")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::UnexpectedResponse("response without event".to_string()).into())
}

fn exactly_one(mut ids: Vec<String>, kind: &'static str, query: &str) -> Result<String> {
    match ids.len() {
        0 => Err(CocalcError::Api(ApiError::NoneFound {
            kind,
            query: query.to_string(),
        })),
        1 => Ok(ids.remove(0)),
        _ => Err(CocalcError::Api(ApiError::ManyFound {
            kind,
            query: query.to_string(),
        })),
    }
}

/// Hyphenated UUID, the form CoCalc uses for ids
fn is_uuid(s: &str) -> bool {
    s.len() == 36 && Uuid::parse_str(s).is_ok()
}

fn request_id() -> String {
    Uuid::new_v4().to_string()
}
