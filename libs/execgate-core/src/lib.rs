pub mod content;
pub mod error;
pub mod evaluator;
pub mod judge;
pub mod orchestrator;
pub mod ratelimit;
pub mod registry;
pub mod sandbox;
pub mod types;
pub mod validator;
