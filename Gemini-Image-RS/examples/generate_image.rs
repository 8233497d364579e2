use std::sync::Arc;

use gemini_image_rs::{GeminiConfig, GeminiImageClient};
use generation_queue::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "a red bicycle leaning on a brick wall".to_string());

    let client = GeminiImageClient::new(GeminiConfig::from_env()?)?;
    let store = Arc::new(SqliteResultStore::open(None)?);
    let (sink, mut events) = ChannelSink::new();
    let orchestrator = Orchestrator::builder(client)
        .with_events(sink)
        .with_store(Arc::clone(&store))
        .build();

    orchestrator.submit(
        GenerationRequest::new(prompt)
            .with_aspect_ratio("16:9".parse()?)
            .with_num_images(2),
    )?;
    orchestrator.wait_until_idle().await;

    while let Ok(event) = events.try_recv() {
        if let OrchestratorEvent::JobFinished(done) = event {
            for (i, result) in done.results.iter().enumerate() {
                let path = format!("gemini_{}.png", i);
                std::fs::write(&path, &result.image)?;
                println!("Saved {} ({}x{}, seed {})", path, result.width, result.height, result.seed);
            }
            if let Some(error) = done.error {
                eprintln!("Generation error: {}", error);
            }
        }
    }
    Ok(())
}
