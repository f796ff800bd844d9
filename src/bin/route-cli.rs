use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "route-cli")]
#[command(about = "Inspect a running edge-router through its admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin bearer token; omit when the admin API is unauthenticated
    #[arg(short, long, env = "EDGE_ROUTER_ADMIN_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show init progress and route source versions
    Status,
    /// Dump dynamic route tables
    Routes {
        /// Only dump tables with this route_config_name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Resolve a request against every route source
    Check {
        host: String,
        path: String,
        #[arg(short, long, default_value = "GET")]
        method: String,
        /// Value sent as x-forwarded-proto
        #[arg(long)]
        proto: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/status", cli.url)),
        Commands::Routes { name } => {
            let mut query = Vec::new();
            if let Some(name) = name {
                query.push(("route_config_name", name));
            }
            client.get(format!("{}/routes", cli.url)).query(&query)
        }
        Commands::Check {
            host,
            path,
            method,
            proto,
        } => {
            let mut query = vec![("host", host), ("path", path), ("method", method)];
            if let Some(proto) = proto {
                query.push(("proto", proto));
            }
            client.get(format!("{}/route_check", cli.url)).query(&query)
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
