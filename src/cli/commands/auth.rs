use clap::Subcommand;
use serde_json::json;

use crate::auth;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Mint a bearer token for a tenant and subject")]
    Token {
        #[arg(help = "Tenant ID the token is bound to")]
        tenant: String,

        #[arg(long, default_value = "admin", help = "Subject (user) identifier")]
        subject: String,

        #[arg(long, help = "Role to include (repeatable)")]
        role: Vec<String>,
    },
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Token {
            tenant,
            subject,
            role,
        } => {
            let token = auth::issue_token(&tenant, &subject, role)?;
            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "token": token }))?);
                }
                OutputFormat::Text => {
                    println!("{}", token);
                }
            }
            Ok(())
        }
    }
}
