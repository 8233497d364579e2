use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use generation_queue::*;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct SolidGenerator;

impl ImageGenerator for SolidGenerator {
    async fn generate(
        &self,
        _call: GenerationCall<'_>,
        _cancel: CancellationToken,
    ) -> Result<Vec<u8>, GeneratorError> {
        let img = image::RgbImage::from_pixel(640, 480, image::Rgb([30, 120, 200]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| GeneratorError::MalformedResponse(e.to_string()))?;
        Ok(out.into_inner())
    }
}

#[tokio::main]
async fn main() -> Result<(), GenerationError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let db_path = PathBuf::from("generation_history.db");
    let store = Arc::new(SqliteResultStore::open(Some(db_path.as_path()))?);

    let orchestrator = Orchestrator::builder(SolidGenerator)
        .with_store(Arc::clone(&store))
        .build();

    for prompt in ["a paper crane", "a glass teapot", "a neon street"] {
        orchestrator.submit(GenerationRequest::new(prompt).with_aspect_ratio("4:3".parse()?))?;
    }
    orchestrator.wait_until_idle().await;

    let recent = store.list_recent(10)?;
    println!("History ({} entries):", recent.len());
    for entry in &recent {
        println!(
            "  {} {} {}x{} thumb={}B fav={}",
            entry.created_at,
            entry.prompt,
            entry.width,
            entry.height,
            entry.thumbnail.len(),
            entry.favorite
        );
    }

    if let Some(first) = recent.first() {
        store.set_favorite(&first.id, true)?;
    }
    let pruned = store.prune(1)?;
    println!("Pruned {} entries (favorites are kept)", pruned);
    Ok(())
}
