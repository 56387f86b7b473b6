//! Crisis Detector — keyword screening for at-risk language.
//!
//! Categories are checked in a fixed, explicit priority order and the first
//! category with at least one keyword match wins; the detector does not
//! aggregate across categories. Base scores reflect clinical severity
//! ranking and their relative order must be preserved even if the exact
//! values are tuned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity-ranked crisis category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrisisCategory {
  Suicide,
  SelfHarm,
  Abuse,
  Violence,
  Substance,
}

impl CrisisCategory {
  pub fn as_str(self) -> &'static str {
    match self {
      CrisisCategory::Suicide   => "suicide",
      CrisisCategory::SelfHarm  => "self-harm",
      CrisisCategory::Abuse     => "abuse",
      CrisisCategory::Violence  => "violence",
      CrisisCategory::Substance => "substance",
    }
  }
}

/// One detected crisis event. Persisted as an append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrisisAlert {
  pub category:    CrisisCategory,
  /// Base score + 5 per additional matched keyword (bonus capped at 20),
  /// capped at 100.
  pub risk_score:  u8,
  pub keywords:    Vec<String>,
  /// First 200 characters of the triggering message.
  pub context:     String,
  pub detected_at: DateTime<Utc>,
}

/// Emergency contact points offered with a crisis response.
#[derive(Debug, Clone, Copy)]
pub struct EmergencyResources {
  pub hotline:   &'static str,
  pub text_line: &'static str,
  pub website:   &'static str,
}

struct CategorySpec {
  category:   CrisisCategory,
  base_score: u8,
  keywords:   &'static [&'static str],
}

// Priority order is part of the contract: a message matching several
// categories is reported under the first one listed here.
const CATEGORIES: &[CategorySpec] = &[
  CategorySpec {
    category:   CrisisCategory::Suicide,
    base_score: 95,
    keywords:   &[
      "kill myself",
      "end my life",
      "want to die",
      "suicide",
      "suicidal",
      "no reason to live",
      "better off dead",
      "end it all",
      "take my own life",
      "don't want to be here",
    ],
  },
  CategorySpec {
    category:   CrisisCategory::SelfHarm,
    base_score: 75,
    keywords:   &[
      "cut myself",
      "cutting",
      "self harm",
      "hurt myself",
      "burning myself",
      "hitting myself",
      "punish myself",
    ],
  },
  CategorySpec {
    category:   CrisisCategory::Abuse,
    base_score: 85,
    keywords:   &[
      "being abused",
      "hitting me",
      "hurting me",
      "threatening me",
      "violent towards me",
      "won't let me leave",
    ],
  },
  CategorySpec {
    category:   CrisisCategory::Violence,
    base_score: 90,
    keywords:   &[
      "hurt someone",
      "kill them",
      "make them pay",
      "violent thoughts",
      "harm others",
    ],
  },
  CategorySpec {
    category:   CrisisCategory::Substance,
    base_score: 70,
    keywords:   &[
      "overdose",
      "too many pills",
      "drink myself to death",
      "high all the time",
      "can't stop using",
    ],
  },
];

const KEYWORD_BONUS_STEP: u8 = 5;
const KEYWORD_BONUS_CAP: u8 = 20;

/// Scan `text` for crisis indicators.
///
/// Case-insensitive substring matching against each category's keyword list,
/// in priority order; returns on the first category with a match.
pub fn detect(text: &str) -> Option<CrisisAlert> {
  let lower = text.to_lowercase();

  for spec in CATEGORIES {
    let matched: Vec<String> = spec
      .keywords
      .iter()
      .filter(|kw| lower.contains(*kw))
      .map(|kw| kw.to_string())
      .collect();

    if matched.is_empty() {
      continue;
    }

    let bonus = KEYWORD_BONUS_CAP
      .min(KEYWORD_BONUS_STEP.saturating_mul((matched.len() as u8).saturating_sub(1)));
    let risk_score = 100.min(spec.base_score.saturating_add(bonus));

    return Some(CrisisAlert {
      category:    spec.category,
      risk_score,
      keywords:    matched,
      context:     text.chars().take(200).collect(),
      detected_at: Utc::now(),
    });
  }

  None
}

/// Emergency resources appropriate to a category.
pub fn emergency_resources(category: CrisisCategory) -> EmergencyResources {
  match category {
    CrisisCategory::Suicide => EmergencyResources {
      hotline:   "988 (Suicide & Crisis Lifeline)",
      text_line: "Text HOME to 741741 (Crisis Text Line)",
      website:   "https://988lifeline.org",
    },
    CrisisCategory::SelfHarm => EmergencyResources {
      hotline:   "988 (Suicide & Crisis Lifeline)",
      text_line: "Text HOME to 741741 (Crisis Text Line)",
      website:   "https://www.selfinjury.com",
    },
    CrisisCategory::Abuse => EmergencyResources {
      hotline:   "1-800-799-7233 (National Domestic Violence Hotline)",
      text_line: "Text START to 88788",
      website:   "https://www.thehotline.org",
    },
    CrisisCategory::Violence => EmergencyResources {
      hotline:   "911 (Emergency Services)",
      text_line: "Text 911 in participating areas",
      website:   "https://www.samhsa.gov",
    },
    CrisisCategory::Substance => EmergencyResources {
      hotline:   "1-800-662-4357 (SAMHSA National Helpline)",
      text_line: "Text HELLO to 741741",
      website:   "https://www.samhsa.gov/find-help/national-helpline",
    },
  }
}

/// The assistant message appended to the transcript when a crisis is
/// detected. No model call is made for this turn.
pub fn crisis_response(category: CrisisCategory) -> String {
  let r = emergency_resources(category);
  format!(
    "I'm really concerned about what you've shared. Your safety is the top \
     priority right now.\n\n\
     Immediate support is available:\n\n\
     Call: {hotline}\n\
     Text: {text_line}\n\
     Online: {website}\n\n\
     These services are free, confidential, available 24/7, and staffed by \
     trained crisis counselors.\n\n\
     If you're in immediate danger, please call 911 or go to your nearest \
     emergency room.\n\n\
     I'm here to support you, but I want to make sure you have access to the \
     immediate, professional help you need.",
    hotline = r.hotline,
    text_line = r.text_line,
    website = r.website,
  )
}
