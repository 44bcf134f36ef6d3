use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CoCalc CLI - Manage CoCalc projects from the command line
#[derive(Parser, Debug)]
#[command(name = "cocalc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML credentials file (defaults to ~/.config/cocalc/config.yaml)
    #[arg(long, env = "COCALC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the CoCalc server
    #[arg(long, env = "COCALC_BASE_URL", default_value = "https://cocalc.com", global = true)]
    pub base_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "COCALC_TIMEOUT_SECS", default_value_t = 4, global = true)]
    pub timeout: u64,

    /// Log requests and responses
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show current configuration
    Config,

    /// List projects
    Projects {
        /// Only projects with exactly this title
        #[arg(long)]
        title: Option<String>,

        /// Only the most recently used projects
        #[arg(long, conflicts_with = "title")]
        recent: bool,
    },

    /// Search users by name or email
    Users {
        /// Name or email address
        query: String,
    },

    /// Keep a project from idling out
    Touch {
        /// Project title or UUID
        project: String,
    },

    /// Create a project unless one with the title exists
    Create {
        /// Project title
        title: String,

        /// Project description
        #[arg(long, default_value = "")]
        description: String,

        /// Start the project after creating it
        #[arg(long)]
        start: bool,
    },

    /// Run a command inside a project
    Exec {
        /// Project title or UUID
        project: String,

        /// Command to run
        command: String,

        /// Arguments to the command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        /// Working directory, relative to the project home
        #[arg(long, default_value = "")]
        cwd: String,

        /// Run the command through bash
        #[arg(long)]
        bash: bool,

        /// Seconds the server waits for the command
        #[arg(long, default_value_t = 10)]
        exec_timeout: u64,
    },

    /// Copy a local text file into a project
    Write {
        /// Project title or UUID
        project: String,

        /// Destination path inside the project
        dest: String,

        /// Local file to upload
        source: PathBuf,
    },

    /// Show the owner and collaborators of a project
    Collaborators {
        /// Project title or UUID
        project: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_projects_by_title() {
        let args = vec!["cocalc", "projects", "--title", "team-wildcard"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Projects { title, recent } => {
                assert_eq!(title.as_deref(), Some("team-wildcard"));
                assert!(!recent);
            }
            _ => panic!("Expected Projects command"),
        }
    }

    #[test]
    fn test_cli_parse_title_conflicts_with_recent() {
        let args = vec!["cocalc", "projects", "--title", "a", "--recent"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_cli_parse_with_config() {
        let args = vec!["cocalc", "--config", "/tmp/cc.yaml", "config"];
        let cli = Cli::try_parse_from(args).unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/cc.yaml")));
        assert!(matches!(cli.command, Commands::Config));
    }

    #[test]
    fn test_cli_parse_global_options_after_subcommand() {
        let args = vec!["cocalc", "users", "jane@example.com", "--timeout", "30", "-v"];
        let cli = Cli::try_parse_from(args).unwrap();

        assert_eq!(cli.timeout, 30);
        assert!(cli.verbose);
        match cli.command {
            Commands::Users { query } => assert_eq!(query, "jane@example.com"),
            _ => panic!("Expected Users command"),
        }
    }

    #[test]
    fn test_cli_parse_exec_with_hyphen_args() {
        let args = vec!["cocalc", "exec", "--bash", "project1", "ls", "-a", "-1"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Exec {
                project,
                command,
                args,
                bash,
                exec_timeout,
                ..
            } => {
                assert_eq!(project, "project1");
                assert_eq!(command, "ls");
                assert_eq!(args, vec!["-a", "-1"]);
                assert!(bash);
                assert_eq!(exec_timeout, 10);
            }
            _ => panic!("Expected Exec command"),
        }
    }

    #[test]
    fn test_cli_parse_create() {
        let args = vec!["cocalc", "create", "team-a", "--description", "Team A", "--start"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Create {
                title,
                description,
                start,
            } => {
                assert_eq!(title, "team-a");
                assert_eq!(description, "Team A");
                assert!(start);
            }
            _ => panic!("Expected Create command"),
        }
    }
}
