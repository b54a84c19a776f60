//! City extraction from free text.
//!
//! The extractor looks for the word "weather" and then takes everything after
//! a location preposition as the city:
//!
//! ```text
//! "What's the weather in New York?"  ->  Some("New York")
//! "weather around rio de janeiro"    ->  Some("Rio De Janeiro")
//! "is it raining in Paris"           ->  None   (no "weather")
//! "weather in"                       ->  None   (nothing after "in")
//! ```

use serde::{Deserialize, Serialize};

/// Token that must appear for a message to count as a weather request.
const WEATHER_KEYWORD: &str = "weather";

/// Location prepositions, in scan priority order.
pub const PREPOSITIONS: [&str; 6] = ["in", "for", "at", "of", "near", "around"];

/// Punctuation ignored at the end of the message and of keyword tokens.
const TRAILING_PUNCTUATION: &[char] = &['?', '!', '.', ',', ';', ':'];

/// How the split preposition is chosen when several appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrepositionScan {
    /// First preposition in [`PREPOSITIONS`] order that occurs anywhere in
    /// the message, so "weather near paris in france" splits on "in".
    #[default]
    Priority,
    /// Leftmost preposition in the message, so the same text splits on
    /// "near".
    Leftmost,
}

/// Result of running the extractor over one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Title-cased city, if one was recognized.
    pub city: Option<String>,
    /// The message as received.
    pub raw_text: String,
}

/// Extracts a target city from weather requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct CityExtractor {
    scan: PrepositionScan,
}

impl CityExtractor {
    /// Create an extractor with the given scan strategy.
    #[must_use]
    pub const fn new(scan: PrepositionScan) -> Self {
        Self { scan }
    }

    /// Parse `text` into a [`ParsedQuery`].
    #[must_use]
    pub fn parse(&self, text: &str) -> ParsedQuery {
        ParsedQuery {
            city: self.extract_city(text),
            raw_text: text.to_string(),
        }
    }

    /// The city named in `text`, if it is a weather request naming one.
    #[must_use]
    pub fn extract_city(&self, text: &str) -> Option<String> {
        let normalized = text.to_lowercase();
        let tokens: Vec<&str> = normalized
            .trim_end_matches(|c: char| c.is_whitespace() || TRAILING_PUNCTUATION.contains(&c))
            .split_whitespace()
            .collect();

        if !tokens.iter().any(|t| keyword(t) == WEATHER_KEYWORD) {
            return None;
        }

        let split = self.split_position(&tokens)?;
        let rest = &tokens[split + 1..];
        if rest.is_empty() {
            return None;
        }

        Some(title_case(&rest.join(" ")))
    }

    fn split_position(&self, tokens: &[&str]) -> Option<usize> {
        let position = |prep: &str| tokens.iter().position(|t| keyword(t) == prep);

        match self.scan {
            PrepositionScan::Priority => PREPOSITIONS.iter().find_map(|p| position(*p)),
            PrepositionScan::Leftmost => tokens
                .iter()
                .position(|t| PREPOSITIONS.contains(&keyword(t))),
        }
    }
}

fn keyword(token: &str) -> &str {
    token.trim_end_matches(TRAILING_PUNCTUATION)
}

/// Upper-case the first letter of every word and hyphenated part.
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;

    for c in text.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace() || c == '-';
    }

    out
}
