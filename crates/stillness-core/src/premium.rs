//! Premium unlock gate for event creation.
//!
//! Purchasing is handled elsewhere; the core only sees a boolean and uses it
//! to decide which moods and backgrounds a draft may use.

use crate::error::ValidationError;
use crate::event::{EventDraft, Mood};

pub const FREE_MOODS: [Mood; 2] = [Mood::Hopeful, Mood::Melancholy];
pub const PREMIUM_MOODS: [Mood; 2] = [Mood::Peaceful, Mood::Silent];

const MAX_TITLE_CHARS: usize = 80;

pub fn is_premium_mood(mood: Mood) -> bool {
    PREMIUM_MOODS.contains(&mood)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PremiumGate {
    unlocked: bool,
}

impl PremiumGate {
    pub fn new(unlocked: bool) -> Self {
        Self { unlocked }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Premium features the draft uses, in display order.
    pub fn premium_features(draft: &EventDraft) -> Vec<String> {
        let mut features = Vec::new();
        if is_premium_mood(draft.mood) {
            features.push(format!("mood {}", draft.mood.as_str()));
        }
        if draft.background_image.is_some() {
            features.push("background image".to_string());
        }
        features
    }

    /// Validate a draft. Returns whether it uses any premium feature.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidValue`] for an empty or overlong
    /// title, and [`ValidationError::PremiumRequired`] when a premium-only
    /// choice is made without the unlock.
    pub fn check(&self, draft: &EventDraft) -> Result<bool, ValidationError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "title".into(),
                message: "must not be empty".into(),
            });
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(ValidationError::InvalidValue {
                field: "title".into(),
                message: format!("must be at most {MAX_TITLE_CHARS} characters"),
            });
        }

        let features = Self::premium_features(draft);
        match features.first() {
            Some(feature) if !self.unlocked => Err(ValidationError::PremiumRequired {
                feature: feature.clone(),
            }),
            _ => Ok(!features.is_empty()),
        }
    }
}
