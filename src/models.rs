use serde::{Deserialize, Serialize};

/// A row returned by the server. The schema belongs to CoCalc, so it is kept
/// as an ordered JSON object.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Owner and collaborators of a project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectUsers {
    pub owner: Option<String>,
    pub collaborators: Vec<String>,
}

impl ProjectUsers {
    /// True if `account_id` is the owner or a collaborator
    pub fn contains(&self, account_id: &str) -> bool {
        self.owner.as_deref() == Some(account_id)
            || self.collaborators.iter().any(|c| c == account_id)
    }
}

/// A command to run inside a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub command: String,
    pub args: Vec<String>,
    /// Working directory; empty means the project home directory
    pub cwd: String,
    /// Seconds the server waits for the command
    pub timeout: u64,
    pub bash: bool,
    pub err_on_exit: bool,
}

impl ExecRequest {
    /// Create a request for `command` with no arguments, run in the project
    /// home with a 10 second timeout
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: String::new(),
            timeout: 10,
            bash: false,
            err_on_exit: false,
        }
    }

    /// Set the arguments passed to the command
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the working directory, relative to the project home
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Set how many seconds the server waits for the command
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the command through bash
    pub fn with_bash(mut self, bash: bool) -> Self {
        self.bash = bash;
        self
    }

    /// Report a non-zero exit code as an error event
    pub fn with_err_on_exit(mut self, err_on_exit: bool) -> Self {
        self.err_on_exit = err_on_exit;
        self
    }
}

/// Output of a command run with `project_exec`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub exit_code: i32,
}

/// Collaboration invitation email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub subject: String,
    pub body: String,
    /// Defaults to the configured account email
    pub replyto: Option<String>,
    /// Defaults to the configured first and last name
    pub replyto_name: Option<String>,
}

impl Invitation {
    /// Create an invitation that replies to the configured account
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            replyto: None,
            replyto_name: None,
        }
    }

    /// Set the reply-to address and name
    pub fn with_replyto(mut self, email: impl Into<String>, name: impl Into<String>) -> Self {
        self.replyto = Some(email.into());
        self.replyto_name = Some(name.into());
        self
    }
}

/// Quota upgrades applied to a project. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upgrades {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u64>,
    /// Megabytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    /// Idle timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mintime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_shares: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_quota: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_host: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral_disk: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral_state: Option<u64>,
}

impl Upgrades {
    /// True if no upgrade is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_request_defaults() {
        let req = ExecRequest::new("ls").with_args(["-a", "-1"]);
        assert_eq!(req.args, vec!["-a".to_string(), "-1".to_string()]);
        assert_eq!(req.cwd, "");
        assert_eq!(req.timeout, 10);
        assert!(!req.bash);
    }

    #[test]
    fn test_exec_request_builders() {
        let req = ExecRequest::new("make")
            .with_cwd("course")
            .with_timeout(60)
            .with_bash(true)
            .with_err_on_exit(true);
        assert_eq!(req.cwd, "course");
        assert_eq!(req.timeout, 60);
        assert!(req.bash);
        assert!(req.err_on_exit);
    }

    #[test]
    fn test_invitation_replyto() {
        let invitation = Invitation::new("subject", "body");
        assert_eq!(invitation.replyto, None);

        let invitation = invitation.with_replyto("ta@example.com", "The TA");
        assert_eq!(invitation.replyto.as_deref(), Some("ta@example.com"));
        assert_eq!(invitation.replyto_name.as_deref(), Some("The TA"));
    }

    #[test]
    fn test_upgrades_skip_unset_fields() {
        let upgrades = Upgrades {
            cores: Some(2),
            memory: Some(1000),
            ..Default::default()
        };
        let json = serde_json::to_value(&upgrades).unwrap();
        assert_eq!(json, serde_json::json!({"cores": 2, "memory": 1000}));
        assert!(!upgrades.is_empty());
        assert!(Upgrades::default().is_empty());
    }

    #[test]
    fn test_exec_output_missing_streams() {
        let out: ExecOutput = serde_json::from_str(r#"{"exit_code": 0}"#).unwrap();
        assert_eq!(out.stdout, "");
        assert_eq!(out.exit_code, 0);
    }

    #[test]
    fn test_project_users_contains() {
        let users = ProjectUsers {
            owner: Some("o".to_string()),
            collaborators: vec!["c1".to_string()],
        };
        assert!(users.contains("o"));
        assert!(users.contains("c1"));
        assert!(!users.contains("c2"));
    }
}
