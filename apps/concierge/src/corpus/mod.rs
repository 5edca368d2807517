pub mod dedup;
pub mod handlers;
pub mod loader;
pub mod render;

pub use loader::CorpusError;
