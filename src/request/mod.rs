//! Request normalization & image policy (component C).

pub mod image;
pub mod parser;

pub use parser::{parse_request, ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl, MessageContent, ParseError, ParsedRequest};
