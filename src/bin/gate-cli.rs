use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use search_gate::security::hash_token;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Management CLI for the search gate", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "SEARCH_GATE_ADMIN_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gate status
    Status,
    /// List circuit breaker state per key
    Circuits,
    /// Force a circuit back to closed
    Reset {
        /// Circuit key (e.g. "search" or a model name)
        circuit: String,
    },
    /// Print the Argon2 hash to configure for a token
    HashToken {
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::HashToken { token } = &cli.command {
        println!("{}", hash_token(token)?);
        return Ok(());
    }

    let client = reqwest::Client::new();
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Circuits => {
            let res = client
                .get(format!("{}/admin/circuits", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Reset { circuit } => {
            // Model names may contain '/', so the key goes in as one encoded segment.
            let mut url = reqwest::Url::parse(&cli.url)?;
            url.path_segments_mut()
                .map_err(|_| "admin URL cannot be a base")?
                .pop_if_empty()
                .extend(["admin", "circuits", circuit.as_str(), "reset"]);

            let res = client
                .post(url)
                .headers(headers)
                .send()
                .await?;
            match res.status() {
                reqwest::StatusCode::NO_CONTENT => println!("Circuit `{circuit}` reset"),
                reqwest::StatusCode::NOT_FOUND => println!("Circuit `{circuit}` has no history"),
                status => eprintln!("Error: Admin API returned status {status}"),
            }
        }
        Commands::HashToken { .. } => unreachable!("handled before connecting"),
    }

    Ok(())
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
