//! Conversational activity planner on top of a generative-text service.
//!
//! The planner owns the conversation history and attaches the current
//! weather snapshot as context to the latest user turn before each call.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;

use crate::{
    error::CompletionError,
    model::{AirQualityReading, UvReading, WeatherSnapshot},
};

pub const SYSTEM_PROMPT: &str = "\
You are Nimbus, a friendly and upbeat weather assistant who helps people plan their day around the weather.

Rules:
- Keep answers short and conversational.
- Stay positive and encouraging.
- If a question has nothing to do with weather, activities or planning, steer the conversation back to those topics.
- Never make up weather data. Use only the weather context you are given.";

/// Questions the front end can offer as one-tap prompts.
pub const SUGGESTIONS: &[&str] = &[
    "What's the best day for a hike?",
    "Should I wear a jacket tomorrow?",
    "Will it rain this weekend?",
    "Good time for outdoor yoga?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// A hosted generative-text completion endpoint.
#[async_trait]
pub trait TextCompletion: Send + Sync + Debug {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<String, CompletionError>;
}

/// Weather context block appended to a user turn.
pub fn weather_context(snapshot: &WeatherSnapshot) -> String {
    let mut context = format!(
        "For context, here is the current weather in {} ({}):\n\
         - Temperature: {:.0}°C (feels like {:.0}°C)\n\
         - Humidity: {}%\n\
         - Condition: {}",
        snapshot.reported_name,
        snapshot.display_name(),
        snapshot.temperature_c,
        snapshot.feels_like_c,
        snapshot.humidity_pct,
        snapshot.description().unwrap_or("clear"),
    );

    if let Some(uv) = &snapshot.uv {
        context.push_str(&format!("\n- UV index: {:.1} ({})", uv.index, uv.level()));
    }
    if let Some(air) = &snapshot.air_quality {
        context.push_str(&format!("\n- Air quality: AQI {} ({})", air.aqi, air.level));
    }

    context
}

pub fn summary_prompt(snapshot: &WeatherSnapshot) -> String {
    format!(
        "Based on this weather data:\n\
         - Location: {}\n\
         - Temperature: {:.0}°C\n\
         - Condition: {}\n\n\
         Write a cheerful one-sentence summary (under 15 words) of what the day feels like \
         and suggest one simple activity that fits it.",
        snapshot.reported_name,
        snapshot.temperature_c,
        snapshot.description().unwrap_or("clear"),
    )
}

pub fn uv_tip_prompt(uv: &UvReading) -> String {
    format!(
        "The current UV index is {:.1}, rated '{}'. Write a short, friendly and actionable health tip for it.",
        uv.index,
        uv.level()
    )
}

pub fn air_quality_tip_prompt(air: &AirQualityReading) -> String {
    format!(
        "The Air Quality Index (AQI) is {}, rated '{}'. Write a short, friendly and actionable health tip for it.",
        air.aqi, air.level
    )
}

/// Single-turn completion without the planner persona.
pub async fn one_shot(
    completion: &dyn TextCompletion,
    prompt: String,
) -> Result<String, CompletionError> {
    completion.complete(None, &[ChatMessage::user(prompt)]).await
}

#[derive(Debug)]
pub struct Planner {
    completion: Arc<dyn TextCompletion>,
    conversation: Vec<ChatMessage>,
}

impl Planner {
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        Self {
            completion,
            conversation: Vec::new(),
        }
    }

    pub fn conversation(&self) -> &[ChatMessage] {
        &self.conversation
    }

    /// Ask a question, optionally grounded in `snapshot`. On failure the
    /// question is dropped from the history.
    pub async fn ask(
        &mut self,
        question: &str,
        snapshot: Option<&WeatherSnapshot>,
    ) -> Result<String, CompletionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CompletionError::InvalidRequest("question is empty".into()));
        }

        self.conversation.push(ChatMessage::user(question));

        let mut outgoing = self.conversation.clone();
        if let (Some(snapshot), Some(last)) = (snapshot, outgoing.last_mut()) {
            last.text = format!(
                "{}\n\n{}\n\nAnswer briefly in a conversational, helpful way.",
                last.text,
                weather_context(snapshot)
            );
        }

        match self.completion.complete(Some(SYSTEM_PROMPT), &outgoing).await {
            Ok(reply) => {
                self.conversation.push(ChatMessage::model(reply.clone()));
                Ok(reply)
            }
            Err(err) => {
                tracing::warn!(error = %err, "planner completion failed");
                self.conversation.pop();
                Err(err)
            }
        }
    }
}
