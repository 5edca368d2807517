// Prompt for the fine-tuning data: the model answers with the bare number.

use crate::llm_client::prompts::classifier_prompt;

pub fn number_only_prompt() -> String {
    classifier_prompt(
        &["Identify the intention number and name (e.g., \"INTENTION: #16 - Request room cleaning\")"],
        "   - Respond with only intention number (e.g., 16)",
    )
}
