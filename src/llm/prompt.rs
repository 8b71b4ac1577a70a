use crate::history::{Message, Role};

pub fn symptom_prompt(symptoms: &str) -> String {
    format!(
        r#"You are a medical AI assistant. Analyze the following symptoms and provide:
1. Risk level (Low, Medium, High)
2. Possible conditions (list 3-5 most likely conditions)
3. Medical advice (what should the person do)
4. When to seek immediate medical attention

Symptoms: {symptoms}

Provide the response in JSON format:
{{
  "riskLevel": "Low|Medium|High",
  "conditions": ["condition1", "condition2", "condition3"],
  "advice": "detailed advice",
  "urgency": "when to seek medical help"
}}

Important: This is for informational purposes only and not a replacement for professional medical advice."#
    )
}

/// One line per turn, `Patient:` or `AI:`.
pub fn transcript(history: &[Message]) -> String {
    history
        .iter()
        .map(|msg| {
            let speaker = match msg.role {
                Role::User => "Patient",
                Role::Assistant => "AI",
            };
            format!("{speaker}: {}", msg.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn chat_prompt(message: &str, history: &[Message]) -> String {
    format!(
        "You are a compassionate medical AI assistant. Provide helpful, accurate health information.\n\n\
         Previous conversation:\n{}\n\n\
         Patient: {message}\n\n\
         AI Assistant:",
        transcript(history)
    )
}
