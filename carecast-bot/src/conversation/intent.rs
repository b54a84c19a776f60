//! Intent classification.
//!
//! Rules are tried in order and the first match decides the route; anything
//! no rule claims is [`Intent::Unrecognized`].

use regex::Regex;
use std::sync::OnceLock;

/// Route chosen for an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// `/start` command.
    Greeting,
    /// A request for weather somewhere.
    WeatherQuery,
    /// "yes" answer to the follow-up prompt.
    Affirmative,
    /// "no" answer to the follow-up prompt.
    Negative,
    /// Nothing matched.
    Unrecognized,
}

/// Predicate over the message text.
pub type Matcher = fn(&str) -> bool;

/// One routing rule.
#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    /// Intent selected when the matcher accepts the message.
    pub intent: Intent,
    /// Predicate over the raw message text.
    pub matcher: Matcher,
}

impl IntentRule {
    /// Create a rule.
    #[must_use]
    pub const fn new(intent: Intent, matcher: Matcher) -> Self {
        Self { intent, matcher }
    }
}

/// Ordered rule list, first match wins.
#[derive(Debug, Clone)]
pub struct IntentRouter {
    rules: Vec<IntentRule>,
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new(vec![
            IntentRule::new(Intent::Greeting, is_start_command),
            IntentRule::new(Intent::WeatherQuery, is_weather_phrasing),
            IntentRule::new(Intent::Affirmative, is_yes),
            IntentRule::new(Intent::Negative, is_no),
        ])
    }
}

impl IntentRouter {
    /// Create a router over `rules`, evaluated in the given order.
    #[must_use]
    pub const fn new(rules: Vec<IntentRule>) -> Self {
        Self { rules }
    }

    /// The rules, in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    /// Classify one message.
    #[must_use]
    pub fn classify(&self, text: &str) -> Intent {
        self.rules
            .iter()
            .find(|rule| (rule.matcher)(text))
            .map_or(Intent::Unrecognized, |rule| rule.intent)
    }
}

/// Sentence openers that count as weather requests on their own.
const WEATHER_OPENERS: [&str; 5] = [
    "what's the weather",
    "today's weather",
    "how's the weather",
    "tell me the weather",
    "give me the weather",
];

fn weather_shape() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^.*weather.*(in|for|at|of|near|around) .+$").expect("valid regex")
    })
}

/// `/start`, `/start@SomeBot`, or either followed by arguments.
#[must_use]
pub fn is_start_command(text: &str) -> bool {
    text.split_whitespace().next().is_some_and(|cmd| {
        let cmd = cmd.to_lowercase();
        cmd == "/start" || cmd.starts_with("/start@")
    })
}

/// "...weather... in X" shape, or one of the weather sentence openers.
#[must_use]
pub fn is_weather_phrasing(text: &str) -> bool {
    let normalized = text.trim().to_lowercase().replace('\u{2019}', "'");
    weather_shape().is_match(&normalized)
        || WEATHER_OPENERS
            .iter()
            .any(|opener| normalized.starts_with(opener))
}

/// The whole message is "yes".
#[must_use]
pub fn is_yes(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("yes")
}

/// The whole message is "no".
#[must_use]
pub fn is_no(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("no")
}
