//! Chatbot proxy. Forwards a free-text message to the Groq completion API
//! and degrades to a deterministic local reply when the key is missing or
//! the call fails; the handler itself never errors.

use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const GROQ_MODEL: &str = "llama3-8b-8192";
const SYSTEM_PROMPT: &str = "You are EduTrack's helpful academic assistant.";

#[derive(Clone)]
pub struct ChatRelay {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl ChatRelay {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    pub async fn relay(&self, message: &str) -> String {
        let key = match &self.api_key {
            Some(key) => key,
            None => return fallback_unavailable(message),
        };
        match self.complete(key, message).await {
            Ok(reply) => reply,
            Err(err) => {
                log::warn!("Chat relay failed: {:?}", err);
                fallback_failed(message)
            }
        }
    }

    async fn complete(&self, key: &str, message: &str) -> Result<String, reqwest::Error> {
        let request = CompletionRequest {
            model: GROQ_MODEL,
            messages: vec![
                ChatTurn {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatTurn {
                    role: "user",
                    content: message.to_string(),
                },
            ],
        };
        let response = self
            .http
            .post(GROQ_URL)
            .bearer_auth(key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<CompletionResponse>()
            .await?;
        Ok(response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| "No reply from Groq".to_string()))
    }
}

fn fallback_unavailable(message: &str) -> String {
    format!("You said: \"{}\". (Groq API not available)", message)
}

fn fallback_failed(message: &str) -> String {
    format!("You said: \"{}\". (Groq API failed)", message)
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: &'static str,
    messages: Vec<ChatTurn>,
}

#[derive(Debug, Serialize)]
struct ChatTurn {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub ok: bool,
    pub reply: String,
}

pub async fn chat(
    Extension(relay): Extension<ChatRelay>,
    Json(body): Json<ChatMessage>,
) -> Json<ChatReply> {
    let message = body.message.as_deref().map(str::trim).unwrap_or("");
    if message.is_empty() {
        return Json(ChatReply {
            ok: false,
            reply: "Empty message".to_string(),
        });
    }
    Json(ChatReply {
        ok: true,
        reply: relay.relay(message).await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallbacks_quote_the_message() {
        assert_eq!(
            fallback_unavailable("hello"),
            "You said: \"hello\". (Groq API not available)"
        );
        assert_eq!(
            fallback_failed("hello"),
            "You said: \"hello\". (Groq API failed)"
        );
    }

    #[tokio::test]
    async fn missing_key_uses_local_fallback() {
        let relay = ChatRelay::new(None);
        assert_eq!(
            relay.relay("when is my exam?").await,
            "You said: \"when is my exam?\". (Groq API not available)"
        );
    }

    #[tokio::test]
    async fn blank_message_is_refused_without_relay_call() {
        let relay = ChatRelay::new(None);
        let Json(reply) = chat(
            Extension(relay),
            Json(ChatMessage {
                message: Some("   ".to_string()),
            }),
        )
        .await;
        assert!(!reply.ok);
        assert_eq!(reply.reply, "Empty message");
    }
}
