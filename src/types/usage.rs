//! Token usage accounting.

use serde::{Deserialize, Serialize};

/// Token usage reported by a provider for one model call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Whether the provider reported nothing.
    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }

    /// Merge another usage into this one (accumulate).
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_accumulates() {
        let mut total = Usage::default();
        total.merge(&Usage::new(10, 5));
        total.merge(&Usage::new(3, 2));
        assert_eq!(total, Usage::new(13, 7));
        assert_eq!(total.total_tokens(), 20);
        assert!(!total.is_zero());
    }
}
