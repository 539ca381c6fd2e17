//! Raw token to canonical `Identifier`.

use crate::domain::Identifier;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizerConfig {
    /// Drop a leading country code when there are more digits than a national number has.
    pub strip_country_code: bool,
    pub national_number_length: usize,
    pub min_digits: usize,
    pub max_digits: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            strip_country_code: false,
            national_number_length: 10,
            min_digits: 1,
            max_digits: 15,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Normalizer {
    cfg: NormalizerConfig,
}

impl Normalizer {
    pub fn new(cfg: NormalizerConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.cfg
    }

    /// Returns `None` for tokens that cannot be turned into an identifier.
    pub fn normalize(&self, raw: &str) -> Option<Identifier> {
        let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        let national = self.cfg.national_number_length;

        if self.cfg.strip_country_code && national > 0 && digits.len() > national {
            digits = digits.split_off(digits.len() - national);
        }

        // Bounds apply to the stripped form too.
        if digits.is_empty()
            || digits.len() < self.cfg.min_digits
            || digits.len() > self.cfg.max_digits
        {
            return None;
        }
        Some(Identifier::from_canonical(digits))
    }
}

/// Split free text into raw tokens (one per comma or line).
pub fn split_tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| c == ',' || c == '\n' || c == '\r')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
