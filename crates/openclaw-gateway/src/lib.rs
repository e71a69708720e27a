//! LLM Gateway: an OpenAI-shaped multi-provider proxy the agent container
//! talks to as if it were a single hosted endpoint.

pub mod error;
pub mod interactions;
pub mod providers;
pub mod router;
pub mod schema;
pub mod sse;
pub mod thought_signature;

pub use error::{GatewayError, GatewayResult};
pub use interactions::{Interaction, InteractionLog};
pub use router::{router, GatewayState};
pub use schema::{detect_provider, ChatCompletionRequest, ChatCompletionResponse, Provider};
pub use thought_signature::ThoughtSignatureCache;
