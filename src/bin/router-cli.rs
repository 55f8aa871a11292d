use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "router-cli")]
#[command(about = "Operator CLI for the batch inference router", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overall and per-instance health
    Health,
    /// Per-instance and aggregate counters
    Stats,
    /// Probe every instance now
    Refresh,
    /// Route a batch of items (each parsed as JSON, else taken as a string)
    Infer {
        #[arg(required = true)]
        items: Vec<String>,

        #[arg(long)]
        max_tokens: Option<u32>,

        #[arg(long)]
        lora_adapter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Health => client.get(format!("{base}/health")).send().await?,
        Commands::Stats => client.get(format!("{base}/stats")).send().await?,
        Commands::Refresh => client.post(format!("{base}/health/refresh")).send().await?,
        Commands::Infer {
            items,
            max_tokens,
            lora_adapter,
        } => {
            let items: Vec<_> = items.iter().map(|s| parse_item(s)).collect();
            let mut body = json!({ "items": items });
            if let Some(max_tokens) = max_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(adapter) = lora_adapter {
                body["lora_adapter"] = json!(adapter);
            }
            client.post(format!("{base}/inference")).json(&body).send().await?
        }
    };

    print_response(res).await
}

fn parse_item(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: router returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }

    if status.is_success() {
        Ok(())
    } else {
        std::process::exit(1)
    }
}
