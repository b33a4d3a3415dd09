use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Management CLI for the webhook relay", long_about = None)]
struct Cli {
    /// Relay base URL, including any configured base path.
    #[arg(short, long, default_value = "http://localhost:5454")]
    url: String,

    /// Admin API key.
    #[arg(short, long, env = "RELAY_ADMIN_API_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show phase, generation and bound address
    Status,
    /// List configured instances per family
    Instances,
    /// Reload configuration from disk
    Reload,
    /// Replace the webhook shared secret
    Rotate {
        /// The new secret
        api_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::Instances => client.get(format!("{base}/admin/instances")),
        Commands::Reload => client.post(format!("{base}/admin/reload")),
        Commands::Rotate { api_key } => client
            .post(format!("{base}/admin/rotate"))
            .json(&json!({ "api_key": api_key })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
