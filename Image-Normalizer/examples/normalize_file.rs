//! Normalize an image file to a target aspect ratio.
//!
//! ```sh
//! cargo run --example normalize_file -- input.png 16:9 output.png
//! ```

use image_normalizer::{normalize, AspectRatio, NormalizeOptions};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(input), Some(ratio), Some(output)) = (args.next(), args.next(), args.next()) else {
        eprintln!("usage: normalize_file <input> <ratio|Auto> <output>");
        return Ok(());
    };

    let ratio: AspectRatio = ratio.parse()?;
    let raw = std::fs::read(&input)?;
    let out = normalize(&raw, ratio, &NormalizeOptions::default())?;
    std::fs::write(&output, &out.bytes)?;

    println!(
        "Wrote {} ({}x{}, {})",
        output, out.width, out.height, out.mime_type
    );
    Ok(())
}
