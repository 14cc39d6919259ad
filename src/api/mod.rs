//! API Module
//!
//! Chat completion wire types and streaming support.

pub mod completion;
pub mod streaming;

pub use completion::{
    ChatMessage, ChatRequest, Choice, CompletionResponse, FunctionDefinition, ResponseMessage,
    Role, RoutingProfile, Tool, ToolChoice, Usage,
};
pub use streaming::{decode_stream, parse_sse_line, LineBuffer, SseLine, StreamChunk, StreamEvent};
