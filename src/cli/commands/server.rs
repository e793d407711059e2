use clap::Subcommand;

use crate::cli::OutputFormat;
use crate::gateway;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Run the gateway server in the foreground")]
    Start {
        #[arg(long, default_value_t = 8080, help = "Port to listen on")]
        port: u16,
    },
}

pub async fn handle(cmd: ServerCommands, _output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Start { port } => gateway::serve(port).await,
    }
}
