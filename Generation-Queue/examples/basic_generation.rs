use std::io::Cursor;
use std::time::Duration;

use generation_queue::*;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Stand-in for a real model: waits a little and paints a gradient.
struct GradientGenerator;

impl ImageGenerator for GradientGenerator {
    async fn generate(
        &self,
        call: GenerationCall<'_>,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, GeneratorError> {
        println!("  -> generating: {}", call.prompt);
        tokio::select! {
            _ = cancel.cancelled() => return Err(GeneratorError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(300)) => {}
        }

        let seed = call.config.seed.unwrap_or_default();
        let img = image::RgbImage::from_fn(1200, 800, |x, y| {
            image::Rgb([(x / 5) as u8, (y / 4) as u8, (seed % 255) as u8])
        });
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

    let (sink, mut events) = ChannelSink::new();
    let orchestrator = Orchestrator::builder(GradientGenerator)
        .with_events(sink)
        .build();

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                OrchestratorEvent::JobFinished(done) => {
                    println!("Job {} finished with {} image(s)", done.job_id, done.results.len());
                    for result in &done.results {
                        println!(
                            "  {} {}x{} seed={} prompt={:?}",
                            result.id, result.width, result.height, result.seed, result.prompt
                        );
                    }
                    if let Some(error) = done.error {
                        println!("  error: {}", error);
                    }
                }
                other => println!("[{}]", other.name()),
            }
        }
    });

    // The second submit waits in the queue until the first job is done.
    let first = orchestrator.submit(
        GenerationRequest::new("a red bicycle")
            .with_aspect_ratio("1:1".parse()?)
            .with_num_images(2),
    )?;
    let second = orchestrator.submit(
        GenerationRequest::new("a lighthouse at dusk").with_aspect_ratio("16:9".parse()?),
    )?;
    println!("first:  {:?}", first);
    println!("second: {:?}", second);

    orchestrator.wait_until_idle().await;
    // Give the printer task a moment to catch up.
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
