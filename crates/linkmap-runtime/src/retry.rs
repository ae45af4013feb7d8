// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry strategies for failed task attempts.

use serde::{Deserialize, Serialize};

/// How long to wait before re-running a failed task.
///
/// Serialized into the task row as JSON so the schedule survives restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryStrategy {
    /// `base_secs * factor^(attempt-1)`, optionally capped at `max_secs`.
    Exponential {
        base_secs: u64,
        factor: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_secs: Option<u64>,
    },
    /// The same delay after every failure.
    Fixed { base_secs: u64 },
}

impl RetryStrategy {
    /// Delay in seconds before retry number `attempt` (1-based: the first
    /// retry is attempt 1).
    pub fn delay_secs(&self, attempt: u32) -> u64 {
        match self {
            RetryStrategy::Fixed { base_secs } => *base_secs,
            RetryStrategy::Exponential {
                base_secs,
                factor,
                max_secs,
            } => {
                let exponent = attempt.saturating_sub(1);
                let delay = base_secs
                    .saturating_mul(u64::from(*factor).saturating_pow(exponent));
                match max_secs {
                    Some(cap) => delay.min(*cap),
                    None => delay,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_delay_is_constant() {
        let strategy = RetryStrategy::Fixed { base_secs: 30 };
        assert_eq!(strategy.delay_secs(1), 30);
        assert_eq!(strategy.delay_secs(5), 30);
    }

    #[test]
    fn exponential_grows_and_caps() {
        let strategy = RetryStrategy::Exponential {
            base_secs: 10,
            factor: 2,
            max_secs: Some(300),
        };
        assert_eq!(strategy.delay_secs(1), 10);
        assert_eq!(strategy.delay_secs(2), 20);
        assert_eq!(strategy.delay_secs(3), 40);
        assert_eq!(strategy.delay_secs(6), 300, "cap applies at 320");
        assert_eq!(strategy.delay_secs(30), 300);
    }

    #[test]
    fn exponential_without_cap() {
        let strategy = RetryStrategy::Exponential {
            base_secs: 1,
            factor: 3,
            max_secs: None,
        };
        assert_eq!(strategy.delay_secs(4), 27);
    }

    #[test]
    fn json_roundtrip() {
        let strategy = RetryStrategy::Exponential {
            base_secs: 10,
            factor: 2,
            max_secs: Some(300),
        };
        let json = serde_json::to_string(&strategy).unwrap();
        assert!(json.contains("\"kind\":\"exponential\""));
        let parsed: RetryStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, strategy);

        let fixed: RetryStrategy =
            serde_json::from_str(r#"{"kind":"fixed","base_secs":30}"#).unwrap();
        assert_eq!(fixed, RetryStrategy::Fixed { base_secs: 30 });
    }
}
