//! Per-user learning from review decisions.
//!
//! A run of exact-title confirmations earns the user a "trust exact matches"
//! flag, which lets triage auto-commit exact titles at a lower confidence.
//! The state is explicit: triage receives a `TrustState` value and never
//! reads the tracker itself.

use std::sync::Mutex;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::FeedbackConfig;
use crate::models::{FeedbackKind, FeedbackRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustState {
    pub exact_streak: u32,
    pub trust_exact_matches: bool,
}

impl TrustState {
    /// State after one decision.
    pub fn apply(self, kind: FeedbackKind, exact_match: bool, config: &FeedbackConfig) -> Self {
        let mut next = self;
        match kind {
            FeedbackKind::Confirmation | FeedbackKind::Correction if exact_match => {
                next.exact_streak = next.exact_streak.saturating_add(1);
                if next.exact_streak >= config.exact_streak_threshold {
                    next.trust_exact_matches = true;
                }
            }
            FeedbackKind::Confirmation | FeedbackKind::Correction => {
                if config.reset_on_inexact_confirmation {
                    next.exact_streak = 0;
                }
            }
            FeedbackKind::Rejection => {
                if config.reset_on_skip {
                    next = TrustState::default();
                }
            }
        }
        next
    }
}

pub struct FeedbackTracker {
    config: FeedbackConfig,
    states: Mutex<FxHashMap<String, TrustState>>,
}

impl FeedbackTracker {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config,
            states: Mutex::new(FxHashMap::default()),
        }
    }

    fn with_states<R>(&self, f: impl FnOnce(&mut FxHashMap<String, TrustState>) -> R) -> R {
        let mut states = self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut states)
    }

    pub fn state(&self, user_id: &str) -> TrustState {
        self.with_states(|states| states.get(user_id).copied().unwrap_or_default())
    }

    pub fn observe(&self, record: &FeedbackRecord) -> TrustState {
        let config = &self.config;
        self.with_states(|states| {
            let entry = states.entry(record.user_id.clone()).or_default();
            let before = *entry;
            *entry = before.apply(record.kind, record.exact_match, config);
            if entry.trust_exact_matches != before.trust_exact_matches {
                info!(
                    user = %record.user_id,
                    trusted = entry.trust_exact_matches,
                    "exact-match trust changed"
                );
            }
            *entry
        })
    }

    /// Explicit user toggle. Turning trust off also clears the streak.
    pub fn set_trust(&self, user_id: &str, trusted: bool) -> TrustState {
        self.with_states(|states| {
            let entry = states.entry(user_id.to_string()).or_default();
            entry.trust_exact_matches = trusted;
            if !trusted {
                entry.exact_streak = 0;
            }
            *entry
        })
    }

    pub fn seed(&self, user_id: &str, state: TrustState) {
        self.with_states(|states| {
            states.insert(user_id.to_string(), state);
        });
    }
}
