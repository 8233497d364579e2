use base64::Engine;
use generation_queue::{GenerationCall, ImageModel};
use serde_json::{json, Map, Value};

/// Prompt text with the negative prompt folded in.
pub fn prompt_text(call: &GenerationCall<'_>) -> String {
    match call.config.negative_prompt.as_deref().map(str::trim) {
        Some(negative) if !negative.is_empty() => {
            format!("{}\n\nAvoid: {}", call.prompt, negative)
        }
        _ => call.prompt.clone(),
    }
}

/// Build the `generateContent` payload for one call.
///
/// The text part comes first, followed by every image in dispatch order.
pub fn build_request_body(call: &GenerationCall<'_>) -> Value {
    let mut parts = vec![json!({ "text": prompt_text(call) })];
    for image in call.images {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": base64::engine::general_purpose::STANDARD.encode(&image.data),
            }
        }));
    }

    let mut image_config = Map::new();
    if !call.config.aspect_ratio.is_auto() {
        image_config.insert(
            "aspectRatio".to_string(),
            Value::String(call.config.aspect_ratio.to_string()),
        );
    }
    // Only the Pro tier accepts an explicit output size.
    if call.config.model == ImageModel::Pro {
        image_config.insert(
            "imageSize".to_string(),
            Value::String(call.config.resolution.as_str().to_string()),
        );
    }

    let mut generation_config = Map::new();
    generation_config.insert(
        "responseModalities".to_string(),
        json!(["TEXT", "IMAGE"]),
    );
    if let Some(seed) = call.config.seed {
        generation_config.insert("seed".to_string(), json!(seed));
    }
    if !image_config.is_empty() {
        generation_config.insert("imageConfig".to_string(), Value::Object(image_config));
    }

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": generation_config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use generation_queue::{AspectRatio, CallConfig, ImageBlob, Resolution};

    fn config() -> CallConfig {
        CallConfig {
            aspect_ratio: AspectRatio::fixed(16, 9).unwrap(),
            seed: Some(7),
            model: ImageModel::Standard,
            resolution: Resolution::TwoK,
            negative_prompt: Some("blurry".into()),
        }
    }

    #[test]
    fn test_body_has_text_then_images() {
        let images = vec![ImageBlob::png(vec![1]), ImageBlob::new("image/jpeg", vec![2])];
        let config = config();
        let call = GenerationCall {
            prompt: "a fox".into(),
            images: &images,
            config: &config,
        };
        let body = build_request_body(&call);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], "a fox\n\nAvoid: blurry");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "AQ==");
        assert_eq!(parts[2]["inlineData"]["mimeType"], "image/jpeg");

        let gen = &body["generationConfig"];
        assert_eq!(gen["seed"], 7);
        assert_eq!(gen["imageConfig"]["aspectRatio"], "16:9");
        assert!(gen["imageConfig"].get("imageSize").is_none());
    }

    #[test]
    fn test_pro_sends_size_and_auto_omits_ratio() {
        let mut config = config();
        config.model = ImageModel::Pro;
        config.aspect_ratio = AspectRatio::Auto;
        config.seed = None;
        config.negative_prompt = Some("  ".into());
        let call = GenerationCall {
            prompt: "a fox".into(),
            images: &[],
            config: &config,
        };
        let body = build_request_body(&call);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "a fox");
        let gen = &body["generationConfig"];
        assert!(gen.get("seed").is_none());
        assert!(gen["imageConfig"].get("aspectRatio").is_none());
        assert_eq!(gen["imageConfig"]["imageSize"], "2K");
    }
}
