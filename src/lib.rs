//! # MadSpark
//!
//! Multi-agent creative-ideation orchestrator. Given a topic and optional
//! constraints, four LLM-backed roles (idea generator, critic, advocate,
//! skeptic) run through a fixed six-stage pipeline producing a ranked list
//! of ideas with evaluations, advocacy, skeptical critique, an improved
//! revision, and a re-evaluation.
//!
//! The crate's core is the workflow orchestrator: batch-vs-individual call
//! strategy, parallel/sequential stage composition, cancellation, timeouts,
//! the response-parsing fallback chain, and the provider routing layer with
//! disk caching.

pub mod agents;
pub mod batch_fallback;
pub mod batch_monitor;
pub mod bookmark;
pub mod cache;
pub mod config;
pub mod display;
pub mod errors;
pub mod inference;
pub mod logging;
pub mod multidim;
pub mod novelty;
pub mod orchestrator;
pub mod parsing;
pub mod providers;
pub mod retry;
pub mod router;
pub mod schemas;
pub mod temperature;
pub mod types;

// Re-export the workflow entry points and their option types
pub use agents::{AgentSuite, RouterAgents};
pub use errors::{Result, WorkflowError};
pub use orchestrator::{run_workflow, run_workflow_with_progress, WorkflowOrchestrator};
pub use router::{get_router, LlmRouter};
pub use types::{EnrichedIdea, LlmResponse, OutputMode, WorkflowOptions};
