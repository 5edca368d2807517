pub mod distractor;
pub mod finetune;
pub mod handlers;
pub mod jsonl;
pub mod prompts;
