//! One-shot demo: ask a question, print the aggregated answer.
//!
//! # Running
//!
//! ```bash
//! cargo run --example ask -- "What is the capital of France?"
//! ```

use std::sync::Arc;

use gemini_gate::{Config, FileCredentialStore, GeminiClient, Message};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Explain what an OAuth refresh token is in one sentence.".to_string());

    let config = Config::from_env();
    let client = GeminiClient::new(&config, Arc::new(FileCredentialStore::new()));

    match client
        .generate(None, vec![Message::user(prompt)], None, None)
        .await
    {
        Ok(outcome) => {
            println!("{}", outcome.text);
            if let Some(usage) = outcome.usage_metadata {
                eprintln!(
                    "[prompt {} + output {} = {} tokens]",
                    usage.prompt_token_count,
                    usage.candidates_token_count,
                    usage.total_token_count
                );
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
