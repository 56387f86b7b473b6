//! Safety Screen — out-of-scope topic denylist.
//!
//! Coaching stays inside coaching boundaries: requests for medical, mental
//! health, legal, or financial advice get a canned redirect instead of a
//! model reply. The screen is a pure function over a fixed phrase list and
//! runs before every other pipeline stage. Absence of a match fails open to
//! the normal pipeline.

use serde::Serialize;

/// Categories of requests the coach must not answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
  MedicalAdvice,
  TherapyAdvice,
  LegalAdvice,
  FinancialAdvice,
}

impl SafetyCategory {
  /// The canned redirect shown in place of a coaching reply.
  pub fn redirect(self) -> &'static str {
    match self {
      SafetyCategory::MedicalAdvice => {
        "I can help with wellness strategies, but I can't provide medical \
         guidance. Please consult a qualified medical professional for \
         medical advice."
      }
      SafetyCategory::TherapyAdvice => {
        "I can support general wellness and emotional stability, but I can't \
         provide therapy or diagnose mental health conditions. Please reach \
         out to a licensed mental health professional."
      }
      SafetyCategory::LegalAdvice => {
        "I can help with mindset and strategy, but I can't provide legal \
         advice. Please consult a licensed attorney for legal matters."
      }
      SafetyCategory::FinancialAdvice => {
        "I can help with financial mindset and habits, but I can't provide \
         financial advice. Please consult a licensed financial advisor."
      }
    }
  }
}

/// A triggered screen: the matched category and its redirect message.
#[derive(Debug, Clone, Serialize)]
pub struct SafetyBlock {
  pub category: SafetyCategory,
  pub redirect: &'static str,
}

// Phrase lists are checked in order; the first category with a match wins.
const SCREEN_PHRASES: &[(SafetyCategory, &[&str])] = &[
  (SafetyCategory::MedicalAdvice, &[
    "diagnose me",
    "what medication",
    "medical advice",
    "what's wrong with me",
    "is this a symptom",
  ]),
  (SafetyCategory::TherapyAdvice, &[
    "am i depressed",
    "do i have anxiety",
    "what disorder do i have",
    "therapy session",
    "psychotherapy",
  ]),
  (SafetyCategory::LegalAdvice, &[
    "legal advice",
    "should i sue",
    "is this illegal",
    "court case",
  ]),
  (SafetyCategory::FinancialAdvice, &[
    "financial advice",
    "should i invest",
    "stock recommendation",
    "tax advice",
  ]),
];

/// Screen a user message against the denylist.
///
/// Returns `None` when the message is in scope. Matching is case-insensitive
/// substring matching; this is a deliberate, cheap pre-filter, not NLP.
pub fn screen(text: &str) -> Option<SafetyBlock> {
  let lower = text.to_lowercase();
  for (category, phrases) in SCREEN_PHRASES {
    if phrases.iter().any(|p| lower.contains(p)) {
      return Some(SafetyBlock { category: *category, redirect: category.redirect() });
    }
  }
  None
}
