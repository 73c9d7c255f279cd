//! Turns an OpenAI-shaped chat/completions body into
//! `{prompt, imageRefs, modelKey, streaming}`, enforcing the image-count and
//! image-policy rules in §4.5.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::adapter::ImagePolicy;

use super::image::data_uri_to_jpeg_tempfile;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// The structured outcome of a successful parse.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub prompt: String,
    pub image_refs: Vec<PathBuf>,
    pub model_key: String,
    pub streaming: bool,
}

/// The closed set of pre-dispatch parse/admission failures, each mapped to
/// an HTTP status by the facade (§7).
#[derive(Debug, Clone, Serialize, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("messages must be a non-empty array containing at least one user message")]
    NoUserMessage,
    #[error("too many images: {count} exceeds the configured limit of {limit}")]
    TooManyImages { count: usize, limit: u32 },
    #[error("model '{0}' could not be resolved")]
    InvalidModel(String),
    #[error("this model requires at least one image")]
    ImageRequired,
    #[error("this model does not accept images")]
    ImageForbidden,
}

impl ParseError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoUserMessage => "NO_USER_MESSAGE",
            Self::TooManyImages { .. } => "TOO_MANY_IMAGES",
            Self::InvalidModel(_) => "INVALID_MODEL",
            Self::ImageRequired => "IMAGE_REQUIRED",
            Self::ImageForbidden => "IMAGE_FORBIDDEN",
        }
    }
}

/// Hard cap on images per request regardless of configuration — a browser
/// file-input limitation the adapters share, not a policy choice.
const HARD_IMAGE_CAP: usize = 10;

/// Steps 1-5 and 8 of §4.5: extract prompt/images from the last user
/// message, apply the image-count policy, and write images to temp files.
/// Steps 6-7 (model resolution, image-policy gate) are applied by the
/// caller once it has a pool handle, via [`check_model_and_policy`].
pub fn parse_request(
    request: &ChatCompletionRequest,
    image_limit: u32,
    temp_dir: &Path,
) -> Result<ParsedRequest, ParseError> {
    let last_user = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .ok_or(ParseError::NoUserMessage)?;

    let (prompt, raw_images) = match &last_user.content {
        MessageContent::Text(text) => (text.clone(), Vec::new()),
        MessageContent::Parts(parts) => {
            let mut prompt = String::new();
            let mut images = Vec::new();
            for part in parts {
                match part {
                    ContentPart::Text { text } => prompt.push_str(text),
                    ContentPart::ImageUrl { image_url } => {
                        if image_url.url.starts_with("data:image/") {
                            images.push(image_url.url.clone());
                        }
                    }
                }
            }
            (prompt, images)
        }
    };

    let images = if image_limit <= 10 {
        if raw_images.len() > image_limit as usize {
            return Err(ParseError::TooManyImages { count: raw_images.len(), limit: image_limit });
        }
        raw_images
    } else {
        raw_images.into_iter().take(HARD_IMAGE_CAP).collect()
    };

    let mut image_refs = Vec::with_capacity(images.len());
    for data_uri in &images {
        match data_uri_to_jpeg_tempfile(data_uri, temp_dir) {
            Ok(path) => image_refs.push(path),
            Err(_) => continue,
        }
    }

    Ok(ParsedRequest { prompt, image_refs, model_key: request.model.clone(), streaming: request.stream })
}

/// Steps 6-7: the model must be resolvable, and the image policy must
/// agree with whether the parsed request carries images.
pub fn check_model_and_policy(
    model_key: &str,
    has_images: bool,
    resolved: bool,
    image_policy: Option<ImagePolicy>,
) -> Result<(), ParseError> {
    if !resolved {
        return Err(ParseError::InvalidModel(model_key.to_string()));
    }
    match image_policy {
        Some(ImagePolicy::Required) if !has_images => Err(ParseError::ImageRequired),
        Some(ImagePolicy::Forbidden) if has_images => Err(ParseError::ImageForbidden),
        _ => Ok(()),
    }
}
