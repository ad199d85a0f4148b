//! Virtual waiter application: conversation orchestrator, generation
//! backends, REPL and terminal rendering.

pub mod cli;
pub mod display;
pub mod llm_client;
pub mod orchestrator;
pub mod repl;
