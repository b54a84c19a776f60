//! Turns one inbound message into its replies.

use super::extract::CityExtractor;
use super::intent::{Intent, IntentRouter};
use super::replies::ReplyTemplates;
use crate::config::BotConfig;
use crate::events::{InboundMessage, OutboundMessage};
use crate::session::{MemorySessionStore, SessionStore};
use crate::util::truncate_str;
use crate::weather::WeatherFetcher;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Which branch of the follow-up prompt the user picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    /// "yes"
    Affirmative,
    /// "no"
    Negative,
}

/// Routes messages to the greeting, weather, follow-up and fallback
/// handlers.
pub struct Responder {
    router: IntentRouter,
    extractor: CityExtractor,
    sessions: Arc<dyn SessionStore>,
    weather: Arc<dyn WeatherFetcher>,
    replies: ReplyTemplates,
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("router", &self.router)
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}

impl Responder {
    /// Create a responder with default routing, extraction and wording.
    pub fn new(sessions: Arc<dyn SessionStore>, weather: Arc<dyn WeatherFetcher>) -> Self {
        Self {
            router: IntentRouter::default(),
            extractor: CityExtractor::default(),
            sessions,
            weather,
            replies: ReplyTemplates::default(),
        }
    }

    /// Create a responder from configuration, with an in-memory session
    /// store sized per `conversation.max_sessions`.
    pub fn from_config(config: &BotConfig, weather: Arc<dyn WeatherFetcher>) -> Self {
        let sessions: Arc<dyn SessionStore> = match config.conversation.max_sessions {
            Some(capacity) => Arc::new(MemorySessionStore::with_capacity(capacity)),
            None => Arc::new(MemorySessionStore::new()),
        };

        Self::new(sessions, weather)
            .with_extractor(CityExtractor::new(config.conversation.preposition_scan))
            .with_replies(config.replies.clone())
    }

    /// Replace the intent router.
    #[must_use]
    pub fn with_router(mut self, router: IntentRouter) -> Self {
        self.router = router;
        self
    }

    /// Replace the city extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: CityExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the reply wording.
    #[must_use]
    pub fn with_replies(mut self, replies: ReplyTemplates) -> Self {
        self.replies = replies;
        self
    }

    /// The session store this responder writes to.
    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Produce the ordered replies for `msg`.
    ///
    /// Never fails: every path ends in at least one reply.
    pub async fn respond(&self, msg: &InboundMessage) -> Vec<OutboundMessage> {
        let intent = self.router.classify(&msg.content);
        debug!(channel = %msg.channel, chat_id = %msg.chat_id, ?intent, "classified message");

        let texts = match intent {
            Intent::Greeting => {
                info!(chat_id = %msg.chat_id, "/start command received");
                vec![self.replies.greeting.clone()]
            }
            Intent::WeatherQuery => self.handle_weather(&msg.session_key(), &msg.content).await,
            Intent::Affirmative => vec![
                self.handle_follow_up(&msg.session_key(), FollowUp::Affirmative)
                    .await,
            ],
            Intent::Negative => vec![
                self.handle_follow_up(&msg.session_key(), FollowUp::Negative)
                    .await,
            ],
            Intent::Unrecognized => {
                info!(text = %truncate_str(&msg.content, 80), "unrecognized message");
                vec![self.replies.unrecognized.clone()]
            }
        };

        texts
            .into_iter()
            .map(|text| OutboundMessage::reply_to(msg, text))
            .collect()
    }

    /// Answer a weather request: the summary and the follow-up prompt, or a
    /// single clarification or apology.
    ///
    /// The city is recorded before the lookup, so it is remembered even when
    /// the lookup fails.
    pub async fn handle_weather(&self, session_key: &str, text: &str) -> Vec<String> {
        let query = self.extractor.parse(text);
        info!(city = ?query.city, "extracted city");

        let Some(city) = query.city else {
            debug!(text = %truncate_str(&query.raw_text, 80), "no city recognized");
            return vec![self.replies.clarification.clone()];
        };

        self.sessions.record_city(session_key, &city).await;

        match self.weather.fetch_weather(&city).await {
            Ok(snapshot) => vec![
                self.replies.summary(&city, &snapshot),
                self.replies.follow_up_prompt(&city),
            ],
            Err(e) => {
                error!(city = %city, error = %e, "failed to fetch weather");
                vec![self.replies.fetch_failed(&city)]
            }
        }
    }

    /// Answer the yes/no follow-up using the user's last city.
    pub async fn handle_follow_up(&self, session_key: &str, answer: FollowUp) -> String {
        match answer {
            FollowUp::Affirmative => {
                let city = self
                    .sessions
                    .last_city_or(session_key, &self.replies.placeholder_city)
                    .await;
                self.replies.affirmative(&city)
            }
            FollowUp::Negative => self.replies.negative.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{WeatherError, WeatherResult};
    use crate::weather::WeatherSnapshot;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records requested cities and answers from a fixed outcome.
    struct FakeWeather {
        fail: bool,
        requested: Mutex<Vec<String>>,
    }

    impl FakeWeather {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                fail: false,
                requested: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                requested: Mutex::new(Vec::new()),
            })
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WeatherFetcher for FakeWeather {
        async fn fetch_weather(&self, city: &str) -> WeatherResult<WeatherSnapshot> {
            self.requested.lock().unwrap().push(city.to_string());
            if self.fail {
                return Err(WeatherError::Status {
                    status: 401,
                    body: "invalid api key".to_string(),
                });
            }
            Ok(WeatherSnapshot {
                temperature: Some(30.0),
                humidity_percent: Some(80.0),
                wind_speed: Some(4.1),
                condition: Some("Light rain".to_string()),
                ..Default::default()
            })
        }
    }

    fn responder(weather: Arc<FakeWeather>) -> Responder {
        Responder::new(Arc::new(MemorySessionStore::new()), weather)
    }

    fn texts(replies: &[OutboundMessage]) -> Vec<&str> {
        replies.iter().map(|r| r.content.as_str()).collect()
    }

    #[tokio::test]
    async fn test_chennai_scenario() {
        let weather = FakeWeather::ok();
        let responder = responder(Arc::clone(&weather));

        let query = InboundMessage::new("telegram", "42", "42", "weather in Chennai");
        let replies = responder.respond(&query).await;

        assert_eq!(replies.len(), 2);
        assert!(replies[0].content.contains("Weather update for Chennai"));
        assert!(replies[0].content.contains("Condition: Light rain"));
        assert!(replies[1].content.contains("Chennai"));
        assert!(replies[1].content.contains("(Yes/No)"));
        assert_eq!(weather.requested(), vec!["Chennai".to_string()]);
        assert_eq!(
            responder.sessions().last_city_or("telegram:42", "-").await,
            "Chennai"
        );

        let yes = InboundMessage::new("telegram", "42", "42", "Yes");
        let replies = responder.respond(&yes).await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].content.contains("Chennai"));
    }

    #[tokio::test]
    async fn test_yes_without_session_uses_placeholder() {
        let responder = responder(FakeWeather::ok());
        let replies = responder
            .respond(&InboundMessage::new("telegram", "7", "7", "yes"))
            .await;

        assert_eq!(replies.len(), 1);
        assert!(replies[0].content.contains("this city"));
    }

    #[tokio::test]
    async fn test_no_reply_has_no_city() {
        let responder = responder(FakeWeather::ok());
        responder
            .respond(&InboundMessage::cli("local", "weather in Oslo"))
            .await;

        let replies = responder.respond(&InboundMessage::cli("local", "No")).await;
        assert_eq!(texts(&replies), vec![ReplyTemplates::default().negative.as_str()]);
    }

    #[tokio::test]
    async fn test_fetch_failure_single_apology() {
        let responder = responder(FakeWeather::failing());
        let replies = responder
            .respond(&InboundMessage::cli("local", "what's the weather in Atlantis"))
            .await;

        assert_eq!(replies.len(), 1);
        assert!(replies[0].content.contains("couldn't fetch the weather for Atlantis"));
        assert!(!replies[0].content.contains("invalid api key"));

        // The city is still remembered for the follow-up.
        assert_eq!(
            responder.sessions().last_city_or("cli:local", "-").await,
            "Atlantis"
        );
    }

    #[tokio::test]
    async fn test_clarification_leaves_session_untouched() {
        let weather = FakeWeather::ok();
        let responder = responder(Arc::clone(&weather));

        let replies = responder
            .respond(&InboundMessage::cli("local", "how's the weather"))
            .await;

        assert_eq!(replies.len(), 1);
        assert!(replies[0].content.contains("couldn't detect the city"));
        assert!(responder.sessions().is_empty().await);
        assert!(weather.requested().is_empty());
    }

    #[tokio::test]
    async fn test_greeting_and_unrecognized() {
        let responder = responder(FakeWeather::ok());
        let defaults = ReplyTemplates::default();

        let replies = responder.respond(&InboundMessage::cli("local", "/start")).await;
        assert_eq!(texts(&replies), vec![defaults.greeting.as_str()]);

        let replies = responder.respond(&InboundMessage::cli("local", "hello")).await;
        assert_eq!(texts(&replies), vec![defaults.unrecognized.as_str()]);
    }

    #[tokio::test]
    async fn test_sessions_are_per_user() {
        let responder = responder(FakeWeather::ok());
        responder
            .respond(&InboundMessage::new("telegram", "1", "1", "weather in Paris"))
            .await;
        responder
            .respond(&InboundMessage::new("telegram", "2", "2", "weather in Tokyo"))
            .await;

        let first = responder
            .respond(&InboundMessage::new("telegram", "1", "1", "yes"))
            .await;
        assert!(first[0].content.contains("Paris"));

        let second = responder
            .respond(&InboundMessage::new("telegram", "2", "2", "yes"))
            .await;
        assert!(second[0].content.contains("Tokyo"));
    }

    #[tokio::test]
    async fn test_custom_replies() {
        let replies = ReplyTemplates {
            affirmative: "Fact about {city}".to_string(),
            placeholder_city: "somewhere".to_string(),
            ..Default::default()
        };
        let responder = responder(FakeWeather::ok()).with_replies(replies);

        let out = responder.respond(&InboundMessage::cli("local", "YES")).await;
        assert_eq!(texts(&out), vec!["Fact about somewhere"]);
    }

    #[tokio::test]
    async fn test_replies_address_originating_chat() {
        let responder = responder(FakeWeather::ok());
        let msg = InboundMessage::new("telegram", "5", "99", "weather for Delhi");
        let replies = responder.respond(&msg).await;

        assert!(replies.iter().all(|r| r.channel == "telegram" && r.chat_id == "99"));
        assert!(replies.iter().all(|r| r.reply_to.as_deref() == Some(msg.id.as_str())));
    }
}
