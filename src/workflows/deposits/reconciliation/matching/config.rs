use chrono::Duration;
use serde::{Deserialize, Serialize};

const DEFAULT_GRACE_MINUTES: i64 = 30;
const DEFAULT_FALLBACK_WINDOW_DAYS: i64 = 14;
const DEFAULT_MIN_NAME_CHARS: usize = 2;

/// Tunable dials for candidate eligibility. The fallback window default is
/// a business heuristic awaiting product confirmation, so it is carried as
/// configuration rather than a constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPolicy {
    /// How far a payment may precede its application submission, covering
    /// clock skew and near-simultaneous submit-and-pay flows.
    pub early_payment_grace_minutes: i64,
    /// How long after submission a payment stays eligible when no session
    /// date bounds the window.
    pub fallback_window_days: i64,
    /// Names shorter than this after normalization are rejected as
    /// candidates outright; substring containment on them is mostly noise.
    pub min_name_chars: usize,
}

impl MatchPolicy {
    pub fn new(
        early_payment_grace_minutes: i64,
        fallback_window_days: i64,
        min_name_chars: usize,
    ) -> Self {
        Self {
            early_payment_grace_minutes: sanitize(
                early_payment_grace_minutes,
                DEFAULT_GRACE_MINUTES,
            ),
            fallback_window_days: sanitize(fallback_window_days, DEFAULT_FALLBACK_WINDOW_DAYS),
            min_name_chars: min_name_chars.max(1),
        }
    }

    pub fn early_payment_grace(&self) -> Duration {
        Duration::minutes(self.early_payment_grace_minutes)
    }

    pub fn fallback_window(&self) -> Duration {
        Duration::days(self.fallback_window_days)
    }
}

fn sanitize(value: i64, default: i64) -> i64 {
    if value > 0 {
        value
    } else {
        default
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            early_payment_grace_minutes: DEFAULT_GRACE_MINUTES,
            fallback_window_days: DEFAULT_FALLBACK_WINDOW_DAYS,
            min_name_chars: DEFAULT_MIN_NAME_CHARS,
        }
    }
}
