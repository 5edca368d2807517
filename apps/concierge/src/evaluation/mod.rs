pub mod classifier;
pub mod extract;
pub mod handlers;
pub mod prompts;
pub mod remote;
