use crate::types::GenerationRequest;
use crate::PromptComposer;

/// Uses the prompt as written, followed by any studio fragments.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughComposer;

impl PromptComposer for PassthroughComposer {
    async fn compose(&self, request: &GenerationRequest) -> String {
        let prompt = request.prompt.trim();
        let fragments = request.studio.fragments();
        if fragments.is_empty() {
            return prompt.to_string();
        }
        let studio = fragments.join(", ");
        if prompt.is_empty() {
            studio
        } else {
            format!("{}, {}", prompt, studio)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StudioConfig;

    #[tokio::test]
    async fn test_prompt_is_unchanged_without_studio() {
        let req = GenerationRequest::new("a red bicycle");
        assert_eq!(PassthroughComposer.compose(&req).await, "a red bicycle");
    }

    #[tokio::test]
    async fn test_studio_fragments_are_appended() {
        let req = GenerationRequest::new(" portrait ").with_studio(StudioConfig {
            preset: None,
            lighting: Some("rim light".into()),
            camera: Some("85mm".into()),
            mood: None,
        });
        assert_eq!(
            PassthroughComposer.compose(&req).await,
            "portrait, rim light, 85mm"
        );
    }
}
