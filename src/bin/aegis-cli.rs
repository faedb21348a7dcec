use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "aegis-cli")]
#[command(about = "Management CLI for the aegis resilience engine", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate engine status
    Status,
    /// List circuit breaker states
    Breakers,
    /// Force a breaker open
    ForceOpen { name: String },
    /// Force a breaker closed
    ForceClose { name: String },
    /// Inspect the fallback buffer
    Buffer,
    /// List health probe statuses
    Probes,
    /// Force a service's readiness probe to pass
    ForcePass { service: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
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
        Commands::Breakers => {
            let res = client
                .get(format!("{}/admin/breakers", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::ForceOpen { name } => {
            let res = client
                .post(format!("{}/admin/breakers/{}/open", cli.url, name))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::ForceClose { name } => {
            let res = client
                .post(format!("{}/admin/breakers/{}/close", cli.url, name))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Buffer => {
            let res = client
                .get(format!("{}/admin/buffer", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Probes => {
            let res = client
                .get(format!("{}/admin/probes", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::ForcePass { service } => {
            let res = client
                .post(format!("{}/admin/probes/{}/force-pass", cli.url, service))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
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
