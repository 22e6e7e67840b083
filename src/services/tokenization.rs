//! Card tokenization stub.
//!
//! Issues opaque tokens for card numbers and keeps only a masked form of
//! the PAN in memory. Stands in for an external vault; the token format
//! is deliberately unstructured so callers cannot grow a dependency on it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use uuid::Uuid;

pub struct TokenizationService {
    tokens: DashMap<String, String>,
}

impl TokenizationService {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
        }
    }

    /// Issues a fresh token for `card_number` and records the masked PAN.
    /// Two calls with the same card number produce distinct tokens.
    pub fn tokenize_card(&self, card_number: &str) -> String {
        let token = URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes());
        self.tokens.insert(token.clone(), mask_pan(card_number));
        token
    }

    pub fn validate_token(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    pub fn masked_card(&self, token: &str) -> Option<String> {
        self.tokens.get(token).map(|entry| entry.clone())
    }
}

impl Default for TokenizationService {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the last four digits and replaces everything else with `*`.
fn mask_pan(card_number: &str) -> String {
    let digits: String = card_number.chars().filter(|ch| ch.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return "*".repeat(digits.len());
    }
    let visible = &digits[digits.len() - 4..];
    format!("{}{}", "*".repeat(digits.len() - 4), visible)
}
