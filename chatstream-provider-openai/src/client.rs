//! OpenAI-compatible API client struct and builder.

use std::future::Future;

use chatstream_types::{ChatRequest, Provider, ProviderError, StreamHandle};

use crate::error::{map_http_status, map_reqwest_error};
use crate::streaming::stream_completion;

/// Default model used when none is configured.
const DEFAULT_MODEL: &str = "deepseek-reasoner";

/// Default chat-completions endpoint path.
const DEFAULT_ENDPOINT: &str = "/v1/chat/completions";

/// System prompt substituted when the request carries none.
const DEFAULT_SYSTEM_PROMPT: &str = "你是一个有帮助的AI助手";

/// Client for any endpoint speaking the OpenAI Chat Completions protocol.
///
/// Implements [`Provider`] for use anywhere a provider is accepted.
///
/// # Example
///
/// ```no_run
/// use chatstream_provider_openai::OpenAiCompatible;
///
/// let client = OpenAiCompatible::new("sk-...", "https://api.deepseek.com")
///     .model("deepseek-reasoner")
///     .endpoint("/v1/chat/completions");
/// ```
pub struct OpenAiCompatible {
    /// Bearer token for the `Authorization` header.
    pub(crate) api_key: String,
    /// API base URL, stored without trailing slashes.
    pub(crate) base_url: String,
    /// Model identifier sent with every request.
    pub(crate) model: String,
    /// Endpoint path appended to the base URL.
    pub(crate) endpoint: String,
    /// Shared HTTP client.
    pub(crate) client: reqwest::Client,
}

impl OpenAiCompatible {
    /// Create a new client for the given key and base URL.
    ///
    /// Default model: `deepseek-reasoner`.
    /// Default endpoint: `/v1/chat/completions`.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: trim_trailing_slashes(base_url.into()),
            model: DEFAULT_MODEL.into(),
            endpoint: DEFAULT_ENDPOINT.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the default model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the endpoint path.
    ///
    /// Useful for gateways that expose the protocol under a different path.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Build the chat completions URL.
    pub(crate) fn completions_url(&self) -> String {
        format!("{}{}", self.base_url, self.endpoint)
    }

    /// Reject missing configuration before any I/O happens.
    fn validate(&self) -> Result<(), ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::InvalidRequest("missing API key".into()));
        }
        if self.base_url.is_empty() {
            return Err(ProviderError::InvalidRequest("missing base URL".into()));
        }
        if self.model.is_empty() {
            return Err(ProviderError::InvalidRequest("missing model name".into()));
        }
        Ok(())
    }

    /// Build the request body: system prompt first, then the context window,
    /// with `stream: true`.
    fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let system = request
            .system
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": system,
        })];
        for msg in &request.messages {
            messages.push(serde_json::json!({
                "role": msg.role,
                "content": msg.content,
            }));
        }

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        })
    }
}

impl Provider for OpenAiCompatible {
    /// Send a streaming completion request.
    ///
    /// Returns a [`StreamHandle`] whose receiver emits one
    /// [`chatstream_types::StreamEvent::TextDelta`] per extracted fragment.
    /// A non-success status is mapped to a [`ProviderError`] before any
    /// event is produced.
    fn complete_stream(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<StreamHandle, ProviderError>> + Send {
        let validation = self.validate();
        let url = self.completions_url();
        let api_key = self.api_key.clone();
        let body = self.request_body(&request);
        let http_client = self.client.clone();

        async move {
            validation?;

            tracing::debug!(
                url = %url,
                model = %body["model"],
                message_count = body["messages"].as_array().map_or(0, Vec::len),
                "sending streaming completion request"
            );

            let response = http_client
                .post(&url)
                .bearer_auth(&api_key)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(map_reqwest_error)?;

            let status = response.status();
            if !status.is_success() {
                let body_text = response.text().await.map_err(map_reqwest_error)?;
                return Err(map_http_status(status, &body_text));
            }

            Ok(stream_completion(response))
        }
    }
}

fn trim_trailing_slashes(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use chatstream_types::{ContextMessage, Role};

    use super::*;

    #[test]
    fn default_model_is_set() {
        let client = OpenAiCompatible::new("key", "https://api.deepseek.com");
        assert_eq!(client.model, DEFAULT_MODEL);
    }

    #[test]
    fn default_endpoint_is_set() {
        let client = OpenAiCompatible::new("key", "https://api.deepseek.com");
        assert_eq!(client.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn base_url_trailing_slashes_are_trimmed() {
        let client = OpenAiCompatible::new("key", "http://localhost:9999///");
        assert_eq!(client.base_url, "http://localhost:9999");
        assert_eq!(
            client.completions_url(),
            "http://localhost:9999/v1/chat/completions"
        );
    }

    #[test]
    fn builder_overrides_model_and_endpoint() {
        let client = OpenAiCompatible::new("key", "http://localhost:9999")
            .model("gpt-4o-mini")
            .endpoint("/openai/v1/chat/completions");
        assert_eq!(client.model, "gpt-4o-mini");
        assert_eq!(
            client.completions_url(),
            "http://localhost:9999/openai/v1/chat/completions"
        );
    }

    #[test]
    fn validate_rejects_missing_api_key() {
        let client = OpenAiCompatible::new("", "http://localhost:9999");
        assert!(matches!(
            client.validate(),
            Err(ProviderError::InvalidRequest(msg)) if msg.contains("API key")
        ));
    }

    #[test]
    fn validate_rejects_missing_model() {
        let client = OpenAiCompatible::new("key", "http://localhost:9999").model("");
        assert!(matches!(
            client.validate(),
            Err(ProviderError::InvalidRequest(msg)) if msg.contains("model")
        ));
    }

    #[test]
    fn request_body_puts_system_prompt_first() {
        let client = OpenAiCompatible::new("key", "http://localhost:9999");
        let body = client.request_body(&ChatRequest {
            system: Some("You are terse.".into()),
            messages: vec![ContextMessage {
                role: Role::User,
                content: "hi".into(),
            }],
        });
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "You are terse.");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn request_body_substitutes_default_system_prompt() {
        let client = OpenAiCompatible::new("key", "http://localhost:9999");
        let body = client.request_body(&ChatRequest::default());
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["content"], DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn request_body_maps_assistant_role() {
        let client = OpenAiCompatible::new("key", "http://localhost:9999");
        let body = client.request_body(&ChatRequest {
            system: None,
            messages: vec![ContextMessage {
                role: Role::Assistant,
                content: "earlier answer".into(),
            }],
        });
        assert_eq!(body["messages"][1]["role"], "assistant");
    }
}
