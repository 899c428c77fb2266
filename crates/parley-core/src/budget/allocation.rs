//! Context window split

use serde::{Deserialize, Serialize};

use crate::types::ModelContext;

/// Windows at or above this size use the large-model ratios
pub const LARGE_WINDOW_THRESHOLD: u64 = 300_000;

/// How a model's context window is shared out for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllocation {
    pub total_tokens: u64,
    /// Everything the prompt may use (files, history, instructions)
    pub content_tokens: u64,
    /// Held back for the model's answer
    pub response_tokens: u64,
    /// Portion of content available to embedded files
    pub file_tokens: u64,
    /// Portion of content available to conversation history
    pub history_tokens: u64,
}

struct Ratios {
    content: u64,
    files: u64,
    history: u64,
}

const SMALL_WINDOW: Ratios = Ratios {
    content: 60,
    files: 30,
    history: 50,
};

const LARGE_WINDOW: Ratios = Ratios {
    content: 80,
    files: 40,
    history: 40,
};

impl TokenAllocation {
    /// Split a context window; pure function of the window size
    pub fn for_window(total_tokens: u64) -> Self {
        let ratios = if total_tokens >= LARGE_WINDOW_THRESHOLD {
            &LARGE_WINDOW
        } else {
            &SMALL_WINDOW
        };

        let content_tokens = percent(total_tokens, ratios.content);
        Self {
            total_tokens,
            content_tokens,
            response_tokens: total_tokens - content_tokens,
            file_tokens: percent(content_tokens, ratios.files),
            history_tokens: percent(content_tokens, ratios.history),
        }
    }

    pub fn for_context(context: &ModelContext) -> Self {
        Self::for_window(context.context_window)
    }

    /// Content budget left once `used` tokens are spent, never below zero
    pub fn remaining_after(&self, used: u64) -> u64 {
        self.content_tokens.saturating_sub(used)
    }
}

fn percent(value: u64, pct: u64) -> u64 {
    value.saturating_mul(pct) / 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelCapabilities;

    #[test]
    fn small_window_ratios() {
        let a = TokenAllocation::for_window(200_000);
        assert_eq!(a.content_tokens, 120_000);
        assert_eq!(a.response_tokens, 80_000);
        assert_eq!(a.file_tokens, 36_000);
        assert_eq!(a.history_tokens, 60_000);
    }

    #[test]
    fn large_window_ratios() {
        let a = TokenAllocation::for_window(1_000_000);
        assert_eq!(a.content_tokens, 800_000);
        assert_eq!(a.response_tokens, 200_000);
        assert_eq!(a.file_tokens, 320_000);
        assert_eq!(a.history_tokens, 320_000);
    }

    #[test]
    fn larger_window_never_shrinks_content() {
        let windows = [0, 8_192, 32_000, 128_000, 299_999, 300_000, 1_048_576, 2_000_000];
        for pair in windows.windows(2) {
            let small = TokenAllocation::for_window(pair[0]);
            let large = TokenAllocation::for_window(pair[1]);
            assert!(
                small.content_tokens + small.file_tokens < large.content_tokens + large.file_tokens
                    || pair[0] == pair[1],
                "{} -> {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn built_from_model_context() {
        let caps = ModelCapabilities {
            context_window: 100_000,
            ..Default::default()
        };
        let ctx = ModelContext::new("flash", "gemini", &caps);
        assert_eq!(TokenAllocation::for_context(&ctx).content_tokens, 60_000);
    }

    #[test]
    fn remaining_floors_at_zero() {
        let a = TokenAllocation::for_window(10_000);
        assert_eq!(a.remaining_after(1_000), 5_000);
        assert_eq!(a.remaining_after(50_000), 0);
    }
}
