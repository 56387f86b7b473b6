//! Best-effort profile data extracted from the conversation.
//!
//! Every field is optional; the extractor is instructed to omit rather than
//! guess. Extractions replace the stored profile wholesale — there is no
//! field-level merge.

use serde::{Deserialize, Serialize};

/// Structured fields pulled out of the transcript by the language model.
///
/// Serialised with camelCase keys so the same shape can be handed to the
/// model as the extraction schema and returned to API clients unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedProfile {
  pub first_name:            Option<String>,
  pub last_name:             Option<String>,
  pub email:                 Option<String>,
  pub phone:                 Option<String>,
  pub child_name:            Option<String>,
  pub child_age:             Option<u8>,
  pub child_support_needs:   Option<String>,
  pub challenges:            Option<Vec<String>>,
  pub current_interventions: Option<Vec<String>>,
  pub primary_goal:          Option<String>,
  pub pain_points:           Option<Vec<String>>,
  /// Self-reported motivation, 1–10.
  pub motivation_level:      Option<u8>,
}

impl ExtractedProfile {
  /// True when no field has been extracted yet.
  pub fn is_empty(&self) -> bool { *self == Self::default() }

  /// "First Last" if a first name is known, used when creating an account.
  pub fn display_name(&self) -> Option<String> {
    let first = self.first_name.as_deref()?;
    Some(match self.last_name.as_deref() {
      Some(last) => format!("{first} {last}"),
      None       => first.to_string(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_profile_is_empty() {
    assert!(ExtractedProfile::default().is_empty());
  }

  #[test]
  fn display_name_requires_first_name() {
    let mut p = ExtractedProfile::default();
    p.last_name = Some("Reyes".into());
    assert_eq!(p.display_name(), None);

    p.first_name = Some("Dana".into());
    assert_eq!(p.display_name().as_deref(), Some("Dana Reyes"));
  }

  #[test]
  fn unknown_json_fields_do_not_fail_parsing() {
    let p: ExtractedProfile =
      serde_json::from_str(r#"{"firstName":"Ana","favouriteColour":"teal"}"#)
        .unwrap();
    assert_eq!(p.first_name.as_deref(), Some("Ana"));
  }
}
