use clap::Subcommand;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::database::{registry_database_name, DatabaseManager};

#[derive(Subcommand)]
pub enum InitCommands {
    #[command(about = "Create the platform database if it does not exist")]
    Database,

    #[command(about = "Apply the tenant registry DDL to the platform database")]
    Registry,

    #[command(about = "Database and registry in one step")]
    All,
}

pub async fn handle(cmd: InitCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut created_database = false;
    let mut applied_registry = false;

    match cmd {
        InitCommands::Database => {
            created_database = init_database().await?;
        }
        InitCommands::Registry => {
            init_registry().await?;
            applied_registry = true;
        }
        InitCommands::All => {
            created_database = init_database().await?;
            init_registry().await?;
            applied_registry = true;
        }
    }

    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "database_created": created_database,
                    "registry_applied": applied_registry,
                }))?
            );
        }
        OutputFormat::Text => {
            if created_database {
                println!("Created platform database");
            }
            if applied_registry {
                println!("Tenant registry is up to date");
            }
            if !created_database && !applied_registry {
                println!("Platform database already exists");
            }
        }
    }

    Ok(())
}

async fn init_database() -> anyhow::Result<bool> {
    let name = registry_database_name()?;
    Ok(DatabaseManager::create_database(&name).await?)
}

async fn init_registry() -> anyhow::Result<()> {
    let pool = DatabaseManager::registry_pool().await?;
    DatabaseManager::bootstrap(&pool).await?;
    Ok(())
}
