// Prompt for interactive classification: intention line plus a short rationale.

use crate::llm_client::prompts::classifier_prompt;

pub fn reasoning_prompt() -> String {
    classifier_prompt(
        &[],
        "   - First identify the intention number and name (e.g., \"INTENTION: #16 - Request room cleaning\")\n   - Then explain your reasoning in 1-2 sentences",
    )
}
