use std::future::Future;
use std::time::Duration;

use async_openai::config::{AzureConfig, OpenAIConfig};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse, ImageDetail, ImageUrlArgs,
    ResponseFormat, ResponseFormatJsonSchema,
};
use async_openai::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::types::Story;

const CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Attempt limit shared by captioning, synopsis and storyline calls.
pub(crate) const MAX_ATTEMPTS: u32 = 3;

/// Appended to the text prompt once per failed attempt before retrying.
pub(crate) const REMEDIATION_NOTE: &str =
    "Your last response was filtered by the content filter. Please avoid using inappropriate language.";

const CAPTION_SYSTEM_PROMPT: &str = "You are good at analyzing videos and provide detailed \
     descriptions, including every object you see in the frames as well as its position.";

const STORY_SYSTEM_PROMPT: &str =
    "You are very helpful and very good at suggesting a storyline based on the provided footage.";

#[derive(Debug, Error)]
pub(crate) enum ModelError {
    #[error("model call failed: {0}")]
    Api(#[source] OpenAIError),
    #[error("model call timed out")]
    Timeout,
    #[error("model returned no content")]
    EmptyResponse,
    #[error("model returned malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    /// Request construction errors; retrying cannot help.
    #[error("model request invalid: {0}")]
    Fatal(#[source] OpenAIError),
}

impl From<OpenAIError> for ModelError {
    fn from(e: OpenAIError) -> Self {
        match e {
            OpenAIError::InvalidArgument(_) => ModelError::Fatal(e),
            _ => ModelError::Api(e),
        }
    }
}

impl ModelError {
    fn is_fatal(&self) -> bool {
        matches!(self, ModelError::Fatal(_))
    }
}

/// Runs `call` up to `max_attempts` times. Every failed attempt appends one
/// more remediation note to the string handed to the next attempt; the caller
/// folds it into its text prompt, leaving the frame set untouched. Fatal
/// errors short-circuit.
pub(crate) async fn call_with_retries<T, F, Fut>(
    max_attempts: u32,
    mut call: F,
) -> Result<T, ModelError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    let mut remediation = String::new();
    let mut last_err = ModelError::EmptyResponse;
    for attempt in 1..=max_attempts {
        match call(remediation.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "model call failed");
                remediation.push('\n');
                remediation.push_str(REMEDIATION_NOTE);
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// Structured captioning result for one chunk of frames.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChunkCaption {
    pub description: String,
    #[serde(rename = "aestheticRating")]
    pub aesthetic_rating: u8,
}

enum ClientKind {
    OpenAi(Client<OpenAIConfig>),
    Azure(Client<AzureConfig>),
}

/// Vision-language-model handle; one per pipeline run.
pub(crate) struct ModelClient {
    inner: ClientKind,
    model: String,
}

impl ModelClient {
    pub(crate) fn openai(api_key: Option<&str>, model: &str) -> Self {
        let config = match api_key {
            Some(key) => OpenAIConfig::new().with_api_key(key),
            None => OpenAIConfig::new(),
        };
        Self {
            inner: ClientKind::OpenAi(Client::with_config(config)),
            model: model.to_owned(),
        }
    }

    pub(crate) fn azure(api_key: &str, endpoint: &str, deployment: &str, model: &str) -> Self {
        let config = AzureConfig::new()
            .with_api_key(api_key)
            .with_api_base(endpoint)
            .with_deployment_id(deployment)
            .with_api_version("2024-10-01-preview");
        Self {
            inner: ClientKind::Azure(Client::with_config(config)),
            model: model.to_owned(),
        }
    }

    async fn create(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, ModelError> {
        let pending = async {
            match &self.inner {
                ClientKind::OpenAi(client) => client.chat().create(request).await,
                ClientKind::Azure(client) => client.chat().create(request).await,
            }
        };
        tokio::time::timeout(CALL_TIMEOUT, pending)
            .await
            .map_err(|_| ModelError::Timeout)?
            .map_err(ModelError::from)
    }

    fn content_of(response: CreateChatCompletionResponse) -> Result<String, ModelError> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ModelError::EmptyResponse)
    }

    /// One captioning attempt: system instruction, the text prompt and the
    /// chunk's frames as low-detail image attachments, in time order.
    pub(crate) async fn caption_frames(
        &self,
        prompt: &str,
        frames: &[String],
    ) -> Result<ChunkCaption, ModelError> {
        let mut parts = vec![ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(prompt)
                .build()?,
        )];
        for frame in frames {
            parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImageArgs::default()
                    .image_url(
                        ImageUrlArgs::default()
                            .url(frame.as_str())
                            .detail(ImageDetail::Low)
                            .build()?,
                    )
                    .build()?,
            ));
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(4000_u32)
            .response_format(caption_response_format())
            .messages([
                ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(CAPTION_SYSTEM_PROMPT)
                        .build()?,
                ),
                ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(ChatCompletionRequestUserMessageContent::Array(parts))
                        .build()?,
                ),
            ])
            .build()?;

        let content = Self::content_of(self.create(request).await?)?;
        serde_json::from_str(&content).map_err(ModelError::Malformed)
    }

    /// One synopsis attempt over a plain text prompt; free-text result.
    pub(crate) async fn summarize(&self, prompt: &str) -> Result<String, ModelError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(4000_u32)
            .messages([ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?,
            )])
            .build()?;
        Self::content_of(self.create(request).await?)
    }

    /// One storyline attempt: each block becomes its own text part of a
    /// single user message.
    pub(crate) async fn compose_story(&self, blocks: &[String]) -> Result<Story, ModelError> {
        let parts = blocks
            .iter()
            .map(|block| -> Result<_, OpenAIError> {
                Ok(ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartTextArgs::default()
                        .text(block.as_str())
                        .build()?,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(2000_u32)
            .response_format(story_response_format())
            .messages([
                ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(STORY_SYSTEM_PROMPT)
                        .build()?,
                ),
                ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(ChatCompletionRequestUserMessageContent::Array(parts))
                        .build()?,
                ),
            ])
            .build()?;

        let content = Self::content_of(self.create(request).await?)?;
        serde_json::from_str(&content).map_err(ModelError::Malformed)
    }
}

fn caption_response_format() -> ResponseFormat {
    ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
            name: "description".into(),
            description: None,
            schema: Some(serde_json::json!({
                "type": "object",
                "properties": {
                    "description": { "type": "string" },
                    "aestheticRating": { "type": "integer" }
                },
                "required": ["description", "aestheticRating"],
                "additionalProperties": false
            })),
            strict: Some(true),
        },
    }
}

fn story_response_format() -> ResponseFormat {
    ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
            name: "story".into(),
            description: None,
            schema: Some(serde_json::json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "whole_story": { "type": "string" },
                    "scenes": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "story": { "type": "string" },
                                "file_path": { "type": "string" },
                                "start": { "type": "integer" },
                                "end": { "type": "integer" }
                            },
                            "required": ["story", "file_path", "start", "end"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["title", "whole_story", "scenes"],
                "additionalProperties": false
            })),
            strict: Some(true),
        },
    }
}
