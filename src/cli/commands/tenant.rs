use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::config;
use crate::database::DatabaseManager;
use crate::tenancy::lifecycle::PgSchemaProvisioner;
use crate::tenancy::store::PgDirectoryStore;
use crate::tenancy::{
    DirectoryStore, SchemaProvisioner, TenantDirectory, TenantLifecycleManager, TenantRecord,
    TenantStatus,
};

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "Provision a new tenant (schema included)")]
    Create {
        #[arg(help = "Tenant name")]
        name: String,

        #[arg(long, help = "Human-readable display name")]
        display_name: Option<String>,
    },

    #[command(about = "List tenants")]
    List {
        #[arg(long, help = "Filter by status (e.g. ACTIVE, SUSPENDED)")]
        status: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: i64,

        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    #[command(about = "Show tenant information")]
    Show {
        #[arg(help = "Tenant ID")]
        tenant: String,
    },

    #[command(about = "Suspend a tenant (new requests are rejected)")]
    Suspend {
        #[arg(help = "Tenant ID")]
        tenant: String,
    },

    #[command(about = "Resume a suspended tenant")]
    Resume {
        #[arg(help = "Tenant ID")]
        tenant: String,
    },

    #[command(about = "Delete a tenant")]
    Delete {
        #[arg(help = "Tenant ID")]
        tenant: String,

        #[arg(long, help = "Also drop the tenant's physical schema")]
        drop_schema: bool,
    },

    #[command(about = "Check whether a tenant ID exists")]
    Exists {
        #[arg(help = "Tenant ID")]
        tenant: String,
    },
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let lifecycle = build_lifecycle().await?;

    match cmd {
        TenantCommands::Create { name, display_name } => {
            let record = lifecycle.create(&name, display_name.as_deref()).await?;
            output_record(&output_format, &record)
        }
        TenantCommands::List {
            status,
            limit,
            offset,
        } => {
            let status = status
                .map(|s| TenantStatus::from_str(&s.to_uppercase()))
                .transpose()
                .map_err(|e| anyhow::anyhow!(e))?;
            let records = lifecycle.list(status, limit, offset).await?;

            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({ "tenants": records }))?
                    );
                }
                OutputFormat::Text => {
                    if records.is_empty() {
                        println!("No tenants found");
                        return Ok(());
                    }
                    println!(
                        "{:<24} {:<28} {:<28} {:<10} {}",
                        "TENANT", "DISPLAY NAME", "SCHEMA", "STATUS", "CREATED"
                    );
                    println!("{}", "-".repeat(110));
                    for record in &records {
                        println!(
                            "{:<24} {:<28} {:<28} {:<10} {}",
                            record.tenant_id,
                            record.display_name,
                            record.schema_name,
                            record.status,
                            record.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Show { tenant } => {
            let record = lifecycle.get(&tenant).await?;
            output_record(&output_format, &record)
        }
        TenantCommands::Suspend { tenant } => {
            let record = lifecycle
                .update_status(&tenant, TenantStatus::Suspended)
                .await?;
            output_record(&output_format, &record)
        }
        TenantCommands::Resume { tenant } => {
            let record = lifecycle
                .update_status(&tenant, TenantStatus::Active)
                .await?;
            output_record(&output_format, &record)
        }
        TenantCommands::Delete {
            tenant,
            drop_schema,
        } => {
            let record = lifecycle.delete(&tenant, drop_schema).await?;
            output_record(&output_format, &record)
        }
        TenantCommands::Exists { tenant } => {
            let exists = lifecycle.exists(&tenant).await?;
            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(
                            &json!({ "tenant_id": tenant, "exists": exists })
                        )?
                    );
                }
                OutputFormat::Text => {
                    println!("{}: {}", tenant, if exists { "exists" } else { "not found" });
                }
            }
            Ok(())
        }
    }
}

fn output_record(output_format: &OutputFormat, record: &TenantRecord) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        OutputFormat::Text => {
            println!("Tenant:   {}", record.tenant_id);
            println!("Name:     {}", record.display_name);
            println!("Schema:   {}", record.schema_name);
            println!("Status:   {}", record.status);
            println!("Version:  {}", record.version);
            println!("Created:  {}", record.created_at.format("%Y-%m-%d %H:%M:%S"));
            println!("Updated:  {}", record.updated_at.format("%Y-%m-%d %H:%M:%S"));
        }
    }
    Ok(())
}

/// The CLI operates on the registry directly rather than through the admin
/// API; it is an operator tool with database credentials in hand.
async fn build_lifecycle() -> anyhow::Result<TenantLifecycleManager> {
    let pool = DatabaseManager::registry_pool().await?;
    let store: Arc<dyn DirectoryStore> = Arc::new(PgDirectoryStore::new(pool.clone()));
    let provisioner: Arc<dyn SchemaProvisioner> = Arc::new(PgSchemaProvisioner::new(pool));
    let directory = Arc::new(TenantDirectory::new(
        store.clone(),
        Duration::from_secs(config::config().directory.cache_ttl_secs),
    ));
    Ok(TenantLifecycleManager::new(store, provisioner, directory))
}
