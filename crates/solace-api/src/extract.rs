//! Profile Extractor — structured fields from the raw transcript.
//!
//! Runs every turn after the safety and crisis checks pass, over the full
//! history, and its output replaces the stored profile wholesale. Any
//! failure — transport, timeout, unparseable JSON — is swallowed: the
//! pipeline proceeds with whatever was previously stored.

use solace_core::{
  llm::{CompletionClient, CompletionRequest, ResponseMode},
  message::{ChatMessage, Role},
  profile::ExtractedProfile,
};

const EXTRACTION_SYSTEM_PROMPT: &str =
  "You are a data extraction assistant. Extract information from \
   conversations and return ONLY valid JSON. Be conservative - only extract \
   information that is explicitly stated, and use null for anything missing.";

const EXTRACTION_SCHEMA: &str = r#"{
  "firstName": string | null,
  "lastName": string | null,
  "email": string | null,
  "phone": string | null,
  "childName": string | null,
  "childAge": number | null,
  "childSupportNeeds": string | null,
  "challenges": string[] | null,
  "currentInterventions": string[] | null,
  "primaryGoal": string | null,
  "painPoints": string[] | null,
  "motivationLevel": number | null (1-10)
}"#;

/// Serialise the transcript to the flat `role: content` block the
/// extraction prompt expects.
fn transcript_text(transcript: &[ChatMessage]) -> String {
  transcript
    .iter()
    .map(|m| {
      let role = match m.role {
        Role::User      => "user",
        Role::Assistant => "assistant",
      };
      format!("{role}: {content}", content = m.content)
    })
    .collect::<Vec<_>>()
    .join("\n")
}

fn extraction_instruction(transcript: &[ChatMessage]) -> String {
  format!(
    "Analyze this conversation and extract structured information. Return \
     ONLY valid JSON with these fields (use null for missing data):\n\n\
     {EXTRACTION_SCHEMA}\n\nConversation:\n{}",
    transcript_text(transcript)
  )
}

/// Extract a profile from the transcript, or `None` on any failure.
pub async fn extract_profile<C>(
  llm:        &C,
  transcript: &[ChatMessage],
) -> Option<ExtractedProfile>
where
  C: CompletionClient,
{
  let request = CompletionRequest {
    system:      EXTRACTION_SYSTEM_PROMPT.to_string(),
    messages:    vec![ChatMessage::user(extraction_instruction(transcript))],
    temperature: 0.1,
    max_tokens:  None,
    mode:        ResponseMode::StrictJson,
  };

  let raw = match llm.complete(request).await {
    Ok(raw) => raw,
    Err(e) => {
      tracing::warn!(error = %e, "profile extraction call failed");
      return None;
    }
  };

  match serde_json::from_str(&raw) {
    Ok(profile) => Some(profile),
    Err(e) => {
      tracing::warn!(error = %e, "profile extraction returned unparseable JSON");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transcript_flattens_in_order() {
    let t = vec![
      ChatMessage::user("hi, I'm Dana"),
      ChatMessage::assistant("welcome Dana"),
    ];
    assert_eq!(
      transcript_text(&t),
      "user: hi, I'm Dana\nassistant: welcome Dana"
    );
  }

  #[test]
  fn instruction_embeds_schema_and_conversation() {
    let t = vec![ChatMessage::user("my goal is better sleep")];
    let prompt = extraction_instruction(&t);
    assert!(prompt.contains("\"primaryGoal\""));
    assert!(prompt.contains("user: my goal is better sleep"));
  }

  #[test]
  fn profile_json_shape_matches_schema_keys() {
    // The schema advertised to the model must deserialise into the profile.
    let p: ExtractedProfile = serde_json::from_str(
      r#"{"firstName":"Dana","childAge":6,"painPoints":["bedtime battles"],
          "motivationLevel":8}"#,
    )
    .unwrap();
    assert_eq!(p.first_name.as_deref(), Some("Dana"));
    assert_eq!(p.child_age, Some(6));
    assert_eq!(p.motivation_level, Some(8));
  }
}
