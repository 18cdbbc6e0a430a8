use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    error::CompletionError,
    planner::{ChatMessage, Role, TextCompletion},
};

use super::truncate_body;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: Client,
}

impl GeminiClient {
    pub fn new(api_key: String, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: String,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "model",
    }
}

#[async_trait]
impl TextCompletion for GeminiClient {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let body = GenerateRequest {
            system_instruction: system_prompt.map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            contents: messages
                .iter()
                .map(|m| Content {
                    role: Some(role_name(m.role)),
                    parts: vec![Part { text: &m.text }],
                })
                .collect(),
        };

        tracing::debug!(model = %self.model, turns = messages.len(), "requesting completion");

        let res = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_builder() {
                    CompletionError::InvalidRequest(err.to_string())
                } else {
                    CompletionError::Unreachable(err.to_string())
                }
            })?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|err| CompletionError::Unreachable(err.to_string()))?;

        if !status.is_success() {
            return Err(CompletionError::Rejected {
                status: status.as_u16(),
                body: truncate_body(&text),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|err| {
            tracing::warn!(error = %err, "completion response did not parse");
            CompletionError::DecodingFailed
        })?;

        parsed.into_text().ok_or(CompletionError::DecodingFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_camel_case_and_roles() {
        let body = GenerateRequest {
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part { text: "be nice" }],
            }),
            contents: vec![Content {
                role: Some(role_name(Role::User)),
                parts: vec![Part { text: "hi" }],
            }],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be nice");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
    }

    #[test]
    fn response_without_candidates_has_no_text() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"promptFeedback": {}}"#).unwrap();
        assert_eq!(parsed.into_text(), None);
    }
}
