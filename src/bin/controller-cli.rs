use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use controller_gateway::rpc::MethodTable;
use controller_gateway::security::probe_secret;
use controller_gateway::NodeController;
use controller_sdk::ControllerClient;

#[derive(Parser)]
#[command(name = "controller-cli")]
#[command(about = "Call the node controller over its RPC gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "https://localhost:17443")]
    url: String,

    /// File holding the shared secret.
    #[arg(short, long, default_value = "/etc/appscale/secret.key")]
    secret_file: PathBuf,

    /// Verify the server certificate instead of accepting self-signed ones.
    #[arg(long)]
    verify_certs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call any registered method. The secret is appended automatically.
    Call {
        method: String,
        /// Parameters in order. Each is parsed as JSON, falling back to a string.
        params: Vec<String>,
    },
    /// Show the controller's status report
    Status,
    /// Show whether the controller has started and finished loading
    Ready,
    /// List the registered methods and their parameters
    Methods,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Methods = cli.command {
        let table = MethodTable::<NodeController>::new();
        for name in table.names() {
            if let Some(reg) = table.get(name) {
                println!("{}({})", name, reg.params.join(", "));
            }
        }
        return Ok(());
    }

    let secret = probe_secret(&cli.secret_file)
        .ok_or_else(|| format!("no secret in {}", cli.secret_file.display()))?;
    let client = ControllerClient::with_options(&cli.url, !cli.verify_certs)?;
    let secret = Value::String(secret.expose().to_string());

    let output = match cli.command {
        Commands::Call { method, params } => {
            let mut args: Vec<Value> = params.iter().map(|p| parse_param(p)).collect();
            args.push(secret);
            client.call(&method, args).await?
        }
        Commands::Status => client.call("status", vec![secret]).await?,
        Commands::Ready => {
            let initializing = client.call("is_done_initializing", vec![secret.clone()]).await?;
            let loading = client.call("is_done_loading", vec![secret]).await?;
            json!({ "done_initializing": initializing, "done_loading": loading })
        }
        Commands::Methods => return Ok(()),
    };

    match output {
        Value::String(text) => println!("{}", text),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}

fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
