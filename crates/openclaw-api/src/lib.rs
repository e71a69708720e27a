//! HTTP API surface: tasks, capability requests, deployments, and the
//! image builder contract, mounted alongside the LLM gateway's own router.

pub mod handlers;
pub mod problem;
pub mod router;
pub mod state;

pub use problem::Problem;
pub use router::router;
pub use state::AppState;
