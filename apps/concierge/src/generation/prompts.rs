// Prompts for synthetic example generation.

use crate::models::intention::intention_list;

/// System prompt. Replace `{intentions}` before sending.
const GENERATION_SYSTEM_TEMPLATE: &str = r#"You are an expert in creating challenging test cases for AI language models.
Your task is to generate vague, ambiguous messages that would be difficult for a hospitality chatbot to correctly classify.

For each message:
1. Create a vague user message for a hotel chatbot that contains subtle context clues pointing to a specific intention
2. The message should be deliberately ambiguous and indirect, avoiding obvious keywords
3. The message might include distractions or multiple possible interpretations
4. Specify which ONE of the 40 intentions listed below is the correct mapping
5. Briefly explain why this is the correct intention (this will be hidden from the test)

Format your response as a JSON list of objects with the following structure:
[
    {
        "message": "The vague message text...",
        "correct_mapping": "X - Intention name",
        "explanation": "Brief explanation of why this is the correct mapping"
    },
    ...
]

LIST OF INTENTIONS:
{intentions}"#;

/// User prompt. Replace `{count}` before sending.
const GENERATION_USER_TEMPLATE: &str = "Generate {count} challenging, vague messages that would be difficult for a hospitality chatbot to classify correctly.

These messages should:
- Be ambiguous enough that the correct intention is not immediately obvious
- Contain subtle clues to the true intention
- Avoid direct mention of the intention name or obvious keywords
- Include potential distractions or red herrings
- Appear realistic as something a hotel guest might actually write

Make sure to select a diverse range of intentions from the list of 40 provided.

Return your response in the exact JSON format specified in the system prompt.";

pub fn generation_system_prompt() -> String {
    GENERATION_SYSTEM_TEMPLATE.replace("{intentions}", &intention_list())
}

pub fn generation_user_prompt(count: usize) -> String {
    GENERATION_USER_TEMPLATE.replace("{count}", &count.to_string())
}
