//! Operator CLI for a running gofr frontend.
//!
//! Talks to the debug handlers, so it only works from inside the frontend's
//! debug networks (by default, the same machine or LAN).

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gofr-cli")]
#[command(about = "Inspect a running gofr frontend", long_about = None)]
struct Cli {
    /// Base URL of the frontend.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List endpoints and their live replicas.
    Backends,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Backends => {
            let res = client
                .get(format!("{}/__backends", cli.url))
                .send()
                .await?;
            let status = res.status();
            let text = res.text().await?;
            if !status.is_success() {
                eprintln!("error: frontend returned {status}");
                if !text.is_empty() {
                    eprintln!("{text}");
                }
                std::process::exit(1);
            }
            print!("{text}");
        }
    }

    Ok(())
}
