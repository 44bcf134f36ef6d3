use anyhow::{Context, Result};
use clap::Parser;
use cocalc_api::{Client, Credentials, ExecRequest, Settings};
use serde::Serialize;
use std::time::Duration;

mod cli;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command.clone() {
        Commands::Config => {
            show_config(&cli)?;
        }
        Commands::Projects { title, recent } => {
            let client = build_client(&cli)?;
            let projects = match (title, recent) {
                (Some(title), _) => client.projects_by_title(&title).await?,
                (None, true) => client.list_recent_projects().await?,
                (None, false) => client.list_projects().await?,
            };
            print_json(&projects)?;
        }
        Commands::Users { query } => {
            let client = build_client(&cli)?;
            print_json(&client.search_users(&query).await?)?;
        }
        Commands::Touch { project } => {
            let client = build_client(&cli)?;
            println!("{}", client.touch_project(&project).await?);
        }
        Commands::Create {
            title,
            description,
            start,
        } => {
            let client = build_client(&cli)?;
            println!("{}", client.create_project(&title, &description, start).await?);
        }
        Commands::Exec {
            project,
            command,
            args,
            cwd,
            bash,
            exec_timeout,
        } => {
            let client = build_client(&cli)?;
            let request = ExecRequest::new(command)
                .with_args(args)
                .with_cwd(cwd)
                .with_bash(bash)
                .with_timeout(exec_timeout);
            let output = client.project_exec(&project, &request).await?;

            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
            if output.exit_code != 0 {
                std::process::exit(output.exit_code);
            }
        }
        Commands::Write {
            project,
            dest,
            source,
        } => {
            let client = build_client(&cli)?;
            let content = std::fs::read_to_string(&source)
                .with_context(|| format!("reading {}", source.display()))?;
            print_json(
                &client
                    .write_text_file_to_project(&project, &dest, &content)
                    .await?,
            )?;
        }
        Commands::Collaborators { project } => {
            let client = build_client(&cli)?;
            let users = client.project_users(&project).await?;
            if let Some(owner) = users.owner {
                println!("owner: {owner}");
            }
            for collaborator in users.collaborators {
                println!("collaborator: {collaborator}");
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,cocalc_api=debug" } else { "warn" };

    tracing_subscriber::fmt()
        .without_time()
        .with_writer(std::io::stderr)
        .with_env_filter(
            // let user override RUST_LOG if they want to
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn build_client(cli: &Cli) -> Result<Client> {
    let credentials = Credentials::load(cli.config.clone())?;
    let settings = Settings::from_overrides(Some(cli.base_url.clone()), None)?
        .with_timeout(Duration::from_secs(cli.timeout));

    Ok(Client::with_settings(credentials, settings)?)
}

fn show_config(cli: &Cli) -> Result<()> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Credentials::config_path()?,
    };
    let credentials = Credentials::load(Some(config_path.clone()))?;

    println!("Current Configuration:");
    println!("  Account ID: {}", credentials.account_id);
    println!("  API Key: {}", credentials.masked_api_key());
    if let Some(name) = credentials.full_name() {
        println!("  Name: {name}");
    }
    if let Some(email) = &credentials.email {
        println!("  Email: {email}");
    }
    println!("  Base URL: {}", cli.base_url);
    println!("  Timeout: {}s", cli.timeout);
    println!("\nConfig file location: {}", config_path.display());

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
