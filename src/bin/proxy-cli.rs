use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Client CLI for the resilient proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call the upstream synchronously through the proxy
    Proxy,
    /// Submit a request to the async queue
    Submit {
        /// Request body (JSON or plain text)
        #[arg(default_value = "")]
        body: String,
    },
    /// Look up the status of an async request
    Status {
        /// Identifier returned by `submit`
        id: String,
    },
    /// Check proxy health and circuit state
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = match cli.command {
        Commands::Proxy => client.get(format!("{}/proxy", cli.url)).send().await?,
        Commands::Submit { body } => {
            client
                .post(format!("{}/async-proxy", cli.url))
                .body(body)
                .send()
                .await?
        }
        Commands::Status { id } => {
            client
                .get(format!("{}/requests/{}", cli.url, id))
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{}/health", cli.url)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            if status.is_success() {
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                eprintln!("Error: proxy returned status {}", status);
                eprintln!("{}", serde_json::to_string_pretty(&json)?);
            }
        }
        Err(_) => {
            eprintln!("Error: proxy returned status {} with non-JSON body", status);
            eprintln!("Response: {}", text);
        }
    }
    Ok(())
}
