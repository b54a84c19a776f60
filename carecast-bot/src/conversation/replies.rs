//! Reply wording.
//!
//! Templates use `{name}` placeholders. Unknown placeholders are left as-is
//! so a typo in a config file shows up in the chat instead of vanishing.

use crate::weather::WeatherSnapshot;
use serde::{Deserialize, Serialize};

/// Every piece of text the bot sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyTemplates {
    /// Answer to `/start`.
    pub greeting: String,
    /// A weather request with no recognizable city.
    pub clarification: String,
    /// Weather summary. Placeholders: `city`, `temperature`, `temperature_unit`,
    /// `humidity`, `wind_speed`, `wind_unit`, `condition`.
    pub summary: String,
    /// Yes/no prompt sent after the summary. Placeholder: `city`.
    pub follow_up_prompt: String,
    /// Apology when the lookup fails. Placeholder: `city`.
    pub fetch_failed: String,
    /// Answer to "yes". Placeholder: `city`.
    pub affirmative: String,
    /// Answer to "no".
    pub negative: String,
    /// Answer to anything unrecognized.
    pub unrecognized: String,
    /// City name used when the user has no session yet.
    pub placeholder_city: String,
}

impl Default for ReplyTemplates {
    fn default() -> Self {
        Self {
            greeting: "Hello! 😊 I'm CareCast, your weather assistant. \
                       Just ask me about the weather in any city 🌍"
                .to_string(),
            clarification: "I couldn't detect the city name. \
                            Try: 'What's the weather in Chennai?' 😊"
                .to_string(),
            summary: "🌍 Weather update for {city}:\n\
                      🌡 Temperature: {temperature}{temperature_unit}\n\
                      💧 Humidity: {humidity}%\n\
                      🌬 Wind Speed: {wind_speed} {wind_unit}\n\
                      ☁️ Condition: {condition}\n\n\
                      Stay safe and take care! 💙"
                .to_string(),
            follow_up_prompt: "Would you like to hear a fun fact about {city}? 😊 (Yes/No)"
                .to_string(),
            fetch_failed: "Oops! 😕 I couldn't fetch the weather for {city}. \
                           Check API settings and try again! 💙"
                .to_string(),
            affirmative: "Here's a fun fact about {city}! 🌍 Did you know...? \
                          (Feature coming soon) 💙"
                .to_string(),
            negative: "Got it! If you need more weather updates, just ask. Stay safe! ☀️💙"
                .to_string(),
            unrecognized: "I'm not sure I understood. I can provide today's weather \
                           updates, just ask! 🌍☀️"
                .to_string(),
            placeholder_city: "this city".to_string(),
        }
    }
}

impl ReplyTemplates {
    /// Summary text for `city`.
    #[must_use]
    pub fn summary(&self, city: &str, snapshot: &WeatherSnapshot) -> String {
        render(
            &self.summary,
            &[
                ("city", city),
                ("temperature", &snapshot.temperature_text()),
                ("temperature_unit", snapshot.units.temperature_label()),
                ("humidity", &snapshot.humidity_text()),
                ("wind_speed", &snapshot.wind_speed_text()),
                ("wind_unit", snapshot.units.wind_label()),
                ("condition", snapshot.condition_text()),
            ],
        )
    }

    /// Yes/no prompt for `city`.
    #[must_use]
    pub fn follow_up_prompt(&self, city: &str) -> String {
        render(&self.follow_up_prompt, &[("city", city)])
    }

    /// Lookup apology for `city`.
    #[must_use]
    pub fn fetch_failed(&self, city: &str) -> String {
        render(&self.fetch_failed, &[("city", city)])
    }

    /// Answer to "yes" for `city`.
    #[must_use]
    pub fn affirmative(&self, city: &str) -> String {
        render(&self.affirmative, &[("city", city)])
    }
}

/// Replace each `{key}` in `template` with its value.
#[must_use]
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::Units;

    #[test]
    fn test_render() {
        assert_eq!(render("hi {name}!", &[("name", "Ada")]), "hi Ada!");
        assert_eq!(render("{a}{a}", &[("a", "x")]), "xx");
        assert_eq!(render("{unknown}", &[("a", "x")]), "{unknown}");
    }

    #[test]
    fn test_summary_fields() {
        let templates = ReplyTemplates::default();
        let snapshot = WeatherSnapshot {
            temperature: Some(31.2),
            humidity_percent: Some(74.0),
            wind_speed: None,
            condition: Some("Haze".to_string()),
            units: Units::Metric,
        };

        let text = templates.summary("Chennai", &snapshot);
        assert!(text.contains("Weather update for Chennai"));
        assert!(text.contains("Temperature: 31.2°C"));
        assert!(text.contains("Humidity: 74%"));
        assert!(text.contains("Wind Speed: N/A m/s"));
        assert!(text.contains("Condition: Haze"));
        assert!(!text.contains('{'));
    }

    #[test]
    fn test_city_templates() {
        let templates = ReplyTemplates::default();
        assert!(templates.follow_up_prompt("Lima").contains("fun fact about Lima"));
        assert!(templates.fetch_failed("Lima").contains("weather for Lima"));
        assert!(templates.affirmative("this city").contains("about this city"));
    }
}
