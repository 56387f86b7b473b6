//! Reply Generator — the coaching reply for one turn.
//!
//! Builds the persona system prompt, embeds the current extracted-profile
//! snapshot, and conditionally appends the conversion directive. Any call
//! failure degrades to a fixed fallback string; the turn still completes.

use solace_core::{
  llm::{CompletionClient, CompletionRequest, ResponseMode},
  message::ChatMessage,
  profile::ExtractedProfile,
};

/// Returned verbatim when the model call fails.
pub const FALLBACK_REPLY: &str =
  "I'm here to help you. Could you tell me more about what brings you here \
   today?";

const PERSONA: &str =
  "You are a compassionate, evidence-based wellness coach.\n\n\
   Your approach:\n\
   - Ask thoughtful questions to understand the person's situation\n\
   - Offer practical, evidence-based suggestions, one step at a time\n\
   - Be warm and supportive, especially with overwhelmed parents\n\
   - Learn about them naturally through conversation, never through forms\n\
   - Stay within coaching boundaries: no medical, legal, or financial advice";

const CONVERSION_DIRECTIVE: &str =
  "IMPORTANT: After your coaching response, naturally offer to save the \
   conversation so they can come back to it anytime, explaining you only \
   need an email address to create a free account. Keep the offer light; \
   do not pressure.";

/// Assemble the system prompt for this turn.
fn system_prompt(profile: &ExtractedProfile, prompt_conversion: bool) -> String {
  let snapshot = serde_json::to_string_pretty(profile)
    .unwrap_or_else(|_| "{}".to_string());

  let mut prompt = format!(
    "{PERSONA}\n\nWhat you know about them so far:\n{snapshot}"
  );
  if prompt_conversion {
    prompt.push_str("\n\n");
    prompt.push_str(CONVERSION_DIRECTIVE);
  }
  prompt
}

/// Generate the assistant reply, falling back to [`FALLBACK_REPLY`] on any
/// failure.
pub async fn generate_reply<C>(
  llm:               &C,
  transcript:        &[ChatMessage],
  profile:           &ExtractedProfile,
  prompt_conversion: bool,
) -> String
where
  C: CompletionClient,
{
  let request = CompletionRequest {
    system:      system_prompt(profile, prompt_conversion),
    messages:    transcript.to_vec(),
    temperature: 0.7,
    max_tokens:  Some(500),
    mode:        ResponseMode::Text,
  };

  match llm.complete(request).await {
    Ok(text) if !text.trim().is_empty() => text,
    Ok(_) => FALLBACK_REPLY.to_string(),
    Err(e) => {
      tracing::warn!(error = %e, "reply generation failed, using fallback");
      FALLBACK_REPLY.to_string()
    }
  }
}
