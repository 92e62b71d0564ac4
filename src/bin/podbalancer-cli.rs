use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "podbalancer-cli")]
#[command(about = "Client for a running podbalancer", long_about = None)]
struct Cli {
    /// Base URL of the balancer
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Path of the registration endpoint
    #[arg(long, default_value = "/lbregister")]
    register_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a pod, e.g. `register http://10.0.0.5:8080`
    Register { uri: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Register { uri } => {
            let res = client
                .post(format!("{}{}", cli.url.trim_end_matches('/'), cli.register_path))
                .json(&json!({ "uri": uri }))
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
        eprintln!("Error: balancer returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("{}", text);
        }
        std::process::exit(1);
    }

    let body: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
