//! OpenAI-compatible `/chat/completions` client.

use serde::Serialize;
use serde_json::Value;

use super::types::{ChatResponse, LlmError, Message};

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    #[must_use]
    pub fn new(http: reqwest::Client, api_key: String, base_url: String) -> Self {
        Self { http, api_key, base_url }
    }

    pub async fn chat(
        &self,
        model: &str,
        max_tokens: u32,
        system: &str,
        messages: &[Message],
    ) -> Result<ChatResponse, LlmError> {
        let msgs = build_messages(system, messages);
        let body = CcRequest { model, max_tokens, messages: &msgs };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;
        if status != 200 {
            return Err(LlmError::ApiResponse { status, body: text });
        }
        parse_response(&text)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CcRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [Message],
}

fn build_messages(system: &str, messages: &[Message]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if !system.trim().is_empty() {
        out.push(Message { role: "system".into(), content: system.to_owned() });
    }
    out.extend_from_slice(messages);
    out
}

// =============================================================================
// PARSING
// =============================================================================

pub(crate) fn parse_response(json_text: &str) -> Result<ChatResponse, LlmError> {
    let root: Value = serde_json::from_str(json_text).map_err(|e| LlmError::ApiParse(e.to_string()))?;
    let model = root
        .get("model")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default();

    let Some(choice) = root
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
    else {
        return Err(LlmError::ApiParse("chat_completions: missing choices[0]".into()));
    };
    let text = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let stop_reason = match choice.get("finish_reason").and_then(Value::as_str) {
        Some("length") => "max_tokens",
        _ => "end_turn",
    };

    Ok(ChatResponse { text, model, stop_reason: stop_reason.into() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_response() {
        let json = serde_json::json!({
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Hello!" },
                "finish_reason": "stop"
            }]
        })
        .to_string();
        let resp = parse_response(&json).unwrap();
        assert_eq!(resp.text, "Hello!");
        assert_eq!(resp.model, "gpt-4o");
        assert_eq!(resp.stop_reason, "end_turn");
    }

    #[test]
    fn length_finish_maps_to_max_tokens() {
        let json = serde_json::json!({
            "choices": [{ "message": { "content": "cut" }, "finish_reason": "length" }]
        })
        .to_string();
        assert_eq!(parse_response(&json).unwrap().stop_reason, "max_tokens");
    }

    #[test]
    fn missing_choices_is_parse_error() {
        let json = serde_json::json!({ "model": "gpt-4o", "choices": [] }).to_string();
        assert!(matches!(parse_response(&json), Err(LlmError::ApiParse(_))));
    }

    #[test]
    fn system_prompt_leads_the_messages() {
        let msgs = build_messages("be brief", &[Message::user("hi")]);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1], Message::user("hi"));
        assert_eq!(build_messages("  ", &[Message::user("hi")]).len(), 1);
    }
}
