//! # cocalc-api
//!
//! A Rust library and CLI for the [CoCalc](https://cocalc.com) collaborative
//! computing API.
//!
//! ## Features
//!
//! - Credentials loaded from a YAML file
//! - Async client built on tokio and reqwest
//! - Typed errors for config, authentication, transport and response failures
//! - Server rows returned as ordered JSON records
//!
//! ## Example
//!
//! ```no_run
//! use cocalc_api::{Client, Credentials};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load credentials from ~/.config/cocalc/config.yaml or $COCALC_CONFIG
//!     let credentials = Credentials::load(None)?;
//!
//!     // Create a client
//!     let client = Client::new(credentials)?;
//!
//!     // Find projects by title
//!     for project in client.projects_by_title("team-wildcard").await? {
//!         println!("{}", project["project_id"]);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod models;

// Re-export main types
pub use client::Client;
pub use config::{Credentials, Settings, BASE_URL_ENV, CONFIG_ENV, TIMEOUT_ENV};
pub use error::{ApiError, CocalcError, ConfigError, Result};
pub use models::{ExecOutput, ExecRequest, Invitation, ProjectUsers, Record, Upgrades};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Ensure all main types are accessible
        let credentials = Credentials::new("abc", "key123");
        assert_eq!(credentials.api_key, "key123");
        assert_eq!(Settings::default().base_url, "https://cocalc.com");
    }
}
