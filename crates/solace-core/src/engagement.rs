//! Engagement scoring and the conversion gate.
//!
//! Both are pure functions; the pipeline recomputes them every turn from the
//! current transcript and session age. The exact thresholds are a product
//! policy surface, but the shape is contractual: higher engagement earns an
//! earlier ask, the floor band never prompts, and three prompts is a hard
//! ceiling.

use crate::message::{ChatMessage, Role};

/// Assistant turns required before value counts as delivered.
const VALUE_MIN_ASSISTANT_TURNS: usize = 3;
/// One assistant turn must exceed this many characters.
const VALUE_SUBSTANTIAL_CHARS: usize = 200;

/// Hard ceiling on conversion prompts per session.
pub const MAX_CONVERSION_PROMPTS: u32 = 3;

/// Engagement score in 0..=100.
///
/// - message component: 5 points per user message, capped at 50
/// - duration component: 1 point per minute, capped at 30
/// - value bonus: 20 if value has been delivered
pub fn engagement_score(
  message_count:    u32,
  duration_seconds: i64,
  value_delivered:  bool,
) -> u8 {
  let messages = (message_count.saturating_mul(5)).min(50);
  let minutes = (duration_seconds.max(0) / 60).min(30) as u32;
  let bonus = if value_delivered { 20 } else { 0 };
  (messages + minutes + bonus).min(100) as u8
}

/// Whether the assistant has said something substantial yet: at least three
/// assistant turns, one of them longer than 200 characters. A coarse proxy,
/// recomputed from the current transcript each turn.
pub fn value_delivered(transcript: &[ChatMessage]) -> bool {
  let assistant: Vec<&ChatMessage> = transcript
    .iter()
    .filter(|m| m.role == Role::Assistant)
    .collect();

  assistant.len() >= VALUE_MIN_ASSISTANT_TURNS
    && assistant.iter().any(|m| m.content.chars().count() > VALUE_SUBSTANTIAL_CHARS)
}

/// Decide whether to ask for account creation this turn.
///
/// High engagement (61+) prompts after 10 messages or 10 minutes; medium
/// (31–60) after 15 messages or 15 minutes; low engagement is never pushed.
pub fn should_prompt_conversion(
  score:              u8,
  message_count:      u32,
  duration_seconds:   i64,
  prior_prompt_count: u32,
) -> bool {
  if prior_prompt_count >= MAX_CONVERSION_PROMPTS {
    return false;
  }

  if score >= 61 {
    return message_count >= 10 || duration_seconds >= 600;
  }

  if score >= 31 {
    return message_count >= 15 || duration_seconds >= 900;
  }

  false
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn score_is_bounded() {
    for &(m, d, v) in &[
      (0u32, 0i64, false),
      (1_000_000, i64::MAX, true),
      (0, i64::MIN, false),
      (7, 425, true),
    ] {
      let s = engagement_score(m, d, v);
      assert!(s <= 100, "score({m}, {d}, {v}) = {s}");
    }
  }

  #[test]
  fn score_is_monotonic_in_messages_up_to_cap() {
    let mut prev = 0;
    for m in 0..=12 {
      let s = engagement_score(m, 0, false);
      assert!(s >= prev);
      prev = s;
    }
    assert_eq!(engagement_score(10, 0, false), engagement_score(20, 0, false));
  }

  #[test]
  fn score_is_monotonic_in_duration_up_to_cap() {
    let mut prev = 0;
    for minutes in 0..=32 {
      let s = engagement_score(0, minutes * 60, false);
      assert!(s >= prev);
      prev = s;
    }
    assert_eq!(
      engagement_score(0, 30 * 60, false),
      engagement_score(0, 120 * 60, false)
    );
  }

  #[test]
  fn engaged_session_scores_80() {
    // 10 messages → 50, 600s → 10, value → 20.
    assert_eq!(engagement_score(10, 600, true), 80);
  }

  #[test]
  fn cold_session_scores_10() {
    assert_eq!(engagement_score(2, 30, false), 10);
  }

  #[test]
  fn negative_duration_contributes_nothing() {
    assert_eq!(engagement_score(0, -300, false), 0);
  }

  #[test]
  fn value_needs_three_assistant_turns_and_one_substantial() {
    let long = "a".repeat(250);
    let mut t = vec![
      ChatMessage::user("hi"),
      ChatMessage::assistant("hello"),
      ChatMessage::assistant(&long),
    ];
    assert!(!value_delivered(&t), "only two assistant turns");

    t.push(ChatMessage::assistant("anything else?"));
    assert!(value_delivered(&t));
  }

  #[test]
  fn value_needs_substance_not_just_volume() {
    let t = vec![
      ChatMessage::assistant("ok"),
      ChatMessage::assistant("sure"),
      ChatMessage::assistant("yes"),
    ];
    assert!(!value_delivered(&t));
  }

  #[test]
  fn prompt_ceiling_is_absolute() {
    assert!(!should_prompt_conversion(100, 100, 100_000, 3));
    assert!(!should_prompt_conversion(100, 100, 100_000, 7));
  }

  #[test]
  fn low_engagement_is_never_prompted() {
    assert!(!should_prompt_conversion(30, 1_000, 1_000_000, 0));
    assert!(!should_prompt_conversion(10, 2, 30, 0));
  }

  #[test]
  fn high_engagement_prompts_after_ten_messages_or_minutes() {
    assert!(should_prompt_conversion(80, 10, 600, 0));
    assert!(should_prompt_conversion(61, 10, 0, 0));
    assert!(should_prompt_conversion(61, 0, 600, 0));
    assert!(!should_prompt_conversion(61, 9, 599, 0));
  }

  #[test]
  fn medium_engagement_prompts_later() {
    assert!(should_prompt_conversion(45, 15, 0, 0));
    assert!(should_prompt_conversion(31, 0, 900, 0));
    assert!(!should_prompt_conversion(45, 14, 899, 0));
  }
}
