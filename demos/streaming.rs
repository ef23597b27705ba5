//! Streaming demo: print chunks as they arrive.
//!
//! # Running
//!
//! ```bash
//! cargo run --example streaming
//! ```
//!
//! # Prerequisites
//!
//! A credentials file written by the Gemini CLI at
//! `~/.gemini/oauth_creds.json` (or wherever
//! `GEMINI_GATE_CREDENTIALS_PATH` points).

use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;

use gemini_gate::{Config, FileCredentialStore, GeminiClient, Message};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::from_env();
    let client = GeminiClient::new(&config, Arc::new(FileCredentialStore::new()));

    let mut stream = client.generate_stream(
        None,
        vec![Message::user(
            "Write a short (3-4 sentence) story about a robot learning to paint.",
        )],
        None,
        None,
    );

    while let Some(result) = stream.next().await {
        match result {
            Ok(chunk) => {
                if let Some(text) = chunk.text {
                    print!("{text}");
                    let _ = std::io::stdout().flush();
                }
                if let Some(usage) = chunk.usage_metadata {
                    eprintln!("\n[{} tokens total]", usage.total_token_count);
                }
            }
            Err(e) => {
                eprintln!("\nstream error: {e}");
                std::process::exit(1);
            }
        }
    }
    println!();
}
