// src/generate/prompt.rs
//! Prompt assembly for bid generation. Pure functions only.

use serde::Serialize;

use crate::config::Profile;

pub const SYSTEM_GUIDANCE: &str = "You are a professional freelancer. Write a polite, concise, convincing bid for a client. End each sentence with a line break.";
pub const LENGTH_INSTRUCTION: &str = "Characters must be no longer than 1500.";
pub const MAX_TOKENS: u32 = 1500;
pub const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// User turn of the prompt.
///
/// The description is always present. Profile name, title and summary are
/// appended only when non-blank. The operator guidance and the length cap
/// close the prompt.
pub fn build_prompt(description: &str, profile: &Profile, guidance: &str) -> String {
    let mut out = format!(
        "This is project description.(main):\n\n {}\n\n",
        description.trim()
    );
    if !profile.name.trim().is_empty() {
        out.push_str(&format!(
            "Also, reference this:This is my name:{}\n\n",
            profile.name.trim()
        ));
    }
    if !profile.title.trim().is_empty() {
        out.push_str(&format!(
            "This is my title/role : \n\n {}\n\n",
            profile.title.trim()
        ));
    }
    if !profile.summary.trim().is_empty() {
        out.push_str(&format!(
            "This is my summary(not essential):\n\n {}\n\n",
            profile.summary.trim()
        ));
    }
    if !guidance.trim().is_empty() {
        out.push_str(guidance.trim());
        out.push_str("\n\n");
    }
    out.push_str(LENGTH_INSTRUCTION);
    out
}

pub fn build_messages(description: &str, profile: &Profile, guidance: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system",
            content: SYSTEM_GUIDANCE.to_string(),
        },
        ChatMessage {
            role: "user",
            content: build_prompt(description, profile, guidance),
        },
    ]
}
