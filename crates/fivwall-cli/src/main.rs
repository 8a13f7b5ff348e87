//! FivWall CLI - pin notes to your wall from the terminal and sync them
//! through Google Drive.

mod cli;
mod commands;
mod config_profiles;
mod credentials;
mod error;
mod session;

use clap::{CommandFactory, Parser};

use cli::{Cli, Commands};
use commands::add::{run_add, AddArgs};
use commands::auth_cmd::run_auth;
use commands::clear::run_clear;
use commands::completions::run_completions;
use commands::config::run_config;
use commands::delete::run_delete;
use commands::edit::{run_edit, EditArgs};
use commands::export::run_export;
use commands::import::run_import;
use commands::list::run_list;
use commands::search_history::run_search_history;
use commands::sync::run_sync;
use error::CliError;
use session::CliContext;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "fivwall=info"
        .parse()
        .map_err(|error| CliError::Config(format!("Invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = CliContext {
        profile: cli.profile,
        state_path: cli.state_path,
    };

    match cli.command {
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        Some(Commands::Config { command }) => run_config(command, &context)?,
        Some(command) => run_command(command, &context).await?,
        None => {
            // Quick capture mode: fivwall "my note"
            if cli.note.is_empty() {
                Cli::command().print_help()?;
                println!();
            } else {
                let resolved = context.resolve()?;
                run_add(
                    AddArgs {
                        title: cli.note,
                        content: None,
                        color: None,
                        tags: Vec::new(),
                        x: 0.0,
                        y: 0.0,
                    },
                    &resolved,
                )
                .await?;
            }
        }
    }

    Ok(())
}

async fn run_command(command: Commands, context: &CliContext) -> Result<(), CliError> {
    let resolved = context.resolve()?;
    match command {
        Commands::Add {
            title,
            content,
            color,
            tags,
            x,
            y,
        } => {
            run_add(
                AddArgs {
                    title,
                    content,
                    color,
                    tags,
                    x,
                    y,
                },
                &resolved,
            )
            .await
        }
        Commands::List {
            limit,
            tag,
            query,
            json,
        } => run_list(limit, tag.as_deref(), query.as_deref(), json, &resolved),
        Commands::Edit {
            id,
            title,
            content,
            color,
            tags,
            clear_tags,
            x,
            y,
            front,
        } => {
            run_edit(
                EditArgs {
                    id,
                    title,
                    content,
                    color,
                    tags,
                    clear_tags,
                    x,
                    y,
                    front,
                },
                &resolved,
            )
            .await
        }
        Commands::Delete { id } => run_delete(&id, &resolved).await,
        Commands::Clear { yes } => run_clear(yes, &resolved).await,
        Commands::SearchHistory { command } => run_search_history(command, &resolved).await,
        Commands::Export { output } => run_export(output.as_deref(), &resolved),
        Commands::Import { path, mode } => run_import(&path, mode, &resolved).await,
        Commands::Sync { command } => run_sync(command, &resolved).await,
        Commands::Auth { command } => run_auth(command, &resolved).await,
        Commands::Completions { .. } | Commands::Config { .. } => Ok(()),
    }
}
