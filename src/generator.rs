use async_trait::async_trait;
use chrono::Datelike;

use crate::clock::Clock;
use crate::delivery::ContentGenerator;

const TOPICS: &[&str] = &[
    "a trip to the local market",
    "an unexpected visitor",
    "a rainy afternoon",
    "the oldest building in town",
    "a letter that arrived late",
    "cooking a family recipe",
    "a walk along the river",
    "the neighbour's cat",
];

/// Stand-in for the real text-generation API: produces a short prompt-shaped
/// story line with a topic that rotates by calendar day.
pub struct PlaceholderStoryGenerator<C> {
    clock: C,
}

impl<C: Clock> PlaceholderStoryGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn topic_of_the_day(&self) -> &'static str {
        let ordinal = self.clock.now_utc().ordinal0() as usize;
        TOPICS[ordinal % TOPICS.len()]
    }
}

#[async_trait]
impl<C: Clock> ContentGenerator for PlaceholderStoryGenerator<C> {
    async fn generate(&self, language: &str, level: &str) -> anyhow::Result<String> {
        let topic = self.topic_of_the_day();
        Ok(format!(
            "Here is today's {language} story at level {level}: {topic}."
        ))
    }
}
