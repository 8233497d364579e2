use base64::Engine;
use generation_queue::GeneratorError;
use serde_json::Value;
use tracing::warn;

/// Map a non-success HTTP status onto the retry taxonomy.
pub fn classify_status(status: u16, body: &str) -> GeneratorError {
    let detail = format!("HTTP {}: {}", status, truncate(body, 300));
    match status {
        429 | 500 | 502 | 503 | 504 => GeneratorError::TransientOverload(detail),
        _ => GeneratorError::MalformedResponse(detail),
    }
}

/// Map a candidate finish reason that came without image data.
pub fn classify_finish_reason(reason: &str) -> Option<GeneratorError> {
    match reason {
        "RECITATION" | "IMAGE_RECITATION" => Some(GeneratorError::FilterRecitation),
        "OTHER" | "IMAGE_OTHER" => Some(GeneratorError::FilterOther(reason.to_string())),
        "SAFETY" | "IMAGE_SAFETY" | "PROHIBITED_CONTENT" | "IMAGE_PROHIBITED_CONTENT"
        | "BLOCKLIST" | "SPII" => Some(GeneratorError::SafetyBlock(reason.to_string())),
        _ => None,
    }
}

/// Extract the first inline image from a `generateContent` response.
pub fn parse_generate_response(json: &Value) -> Result<Vec<u8>, GeneratorError> {
    if let Some(reason) = json
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(GeneratorError::SafetyBlock(reason.to_string()));
    }

    let candidate = json
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| GeneratorError::MalformedResponse("response has no candidates".into()))?;

    let parts = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for part in parts {
        let data = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(|inline| inline.get("data"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        return base64::engine::general_purpose::STANDARD
            .decode(data.as_bytes())
            .map_err(|e| GeneratorError::MalformedResponse(format!("bad image base64: {}", e)));
    }

    let finish_reason = candidate
        .get("finishReason")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN");
    if let Some(err) = classify_finish_reason(finish_reason) {
        return Err(err);
    }

    let text: Vec<&str> = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    warn!(
        finish_reason,
        part_count = parts.len(),
        text = %truncate(&text.join(" "), 200),
        "Gemini response carried no image"
    );
    Err(GeneratorError::MalformedResponse(format!(
        "no image in response (finish reason {})",
        finish_reason
    )))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
