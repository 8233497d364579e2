use std::time::Duration;

use gemini_image_rs::*;
use generation_queue::*;
use serde_json::json;

fn unreachable_client() -> GeminiImageClient {
    GeminiImageClient::new(
        GeminiConfig::new("test-key")
            .with_endpoint("http://127.0.0.1:1/v1beta")
            .with_timeout(Duration::from_secs(2)),
    )
    .unwrap()
}

#[test]
fn test_full_response_round_trip() {
    let response = json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    {"text": "Here is your image."},
                    {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                ]
            },
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": {"promptTokenCount": 12}
    });
    let bytes = parse_generate_response(&response).unwrap();
    assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
}

#[test]
fn test_request_carries_dispatch_images_in_order() {
    let request = GenerationRequest::new("duo portrait")
        .with_reference(ImageBlob::png(vec![1]))
        .with_character(CharacterReference {
            name: "Ada".into(),
            images: vec![ImageBlob::png(vec![2])],
        })
        .with_style_image(ImageBlob::png(vec![3]));
    let images = request.dispatch_images();
    let config = CallConfig {
        aspect_ratio: "4:5".parse().unwrap(),
        seed: Some(99),
        model: ImageModel::Pro,
        resolution: Resolution::FourK,
        negative_prompt: None,
    };
    let call = GenerationCall {
        prompt: "duo portrait".into(),
        images: &images,
        config: &config,
    };

    let body = build_request_body(&call);
    let data: Vec<&str> = body["contents"][0]["parts"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["inlineData"]["data"].as_str())
        .collect();
    assert_eq!(data, vec!["AQ==", "Ag==", "Aw=="]);
    assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "4:5");
    assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "4K");
}

#[tokio::test]
async fn test_network_failures_are_retried_by_orchestrator() {
    let config = OrchestratorConfig::builder()
        .with_max_attempts(3)
        .with_backoff(Duration::from_millis(1), Duration::from_millis(1))
        .build();
    let (sink, mut events) = ChannelSink::new();
    let orchestrator = Orchestrator::builder(unreachable_client())
        .with_config(config)
        .with_events(sink)
        .build();

    orchestrator
        .submit(GenerationRequest::new("a red bicycle"))
        .unwrap();
    orchestrator.wait_until_idle().await;

    let mut error = None;
    while let Ok(event) = events.try_recv() {
        if let OrchestratorEvent::JobFinished(done) = event {
            assert!(done.results.is_empty());
            error = done.error;
        }
    }
    let error = error.unwrap();
    assert!(error.contains("3 attempts"), "{}", error);
    assert!(error.contains("Network"), "{}", error);
}
