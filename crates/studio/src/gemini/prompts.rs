//! Fixed instructions sent alongside user input.

/// Wrap a user's edit instruction in the jewelry-editor preamble.
#[must_use]
pub fn edit_instruction(prompt: &str) -> String {
    let prompt = prompt.trim().trim_end_matches('.');
    format!(
        "Act as a professional high-end jewelry photo editor. {prompt}. \
         Return ONLY the edited image part. Maintain high resolution and realistic lighting."
    )
}

/// Instruction for dictated edit requests.
pub const TRANSCRIPTION_INSTRUCTION: &str = "Transcribe this audio exactly as spoken. \
The speaker is describing how a jewelry photo should be edited. \
Return only the transcribed text with no quotes, labels or commentary. \
If there is no speech, return an empty response.";

/// Call-to-action line for in-store pickup. Must appear in every caption.
pub const PICKUP_LINE: &str = "📍 Pickup available at our studio.";

/// Call-to-action line for orders. Must appear in every caption.
pub const ORDER_LINE: &str = "📩 Order by DM or WhatsApp.";

/// Build the caption instruction, optionally steered by the staff's idea.
#[must_use]
pub fn caption_instruction(idea: Option<&str>) -> String {
    let mut instruction = String::from(
        "You write Instagram captions for CM, a fine jewelry studio. \
         Look at the photo and write one caption in an elegant, warm and confident voice. \
         Describe the piece (metal, stones, finish) only as far as the photo shows it. \
         Keep it under 80 words, use at most three emojis, and add four to six relevant hashtags at the end.",
    );
    if let Some(idea) = idea.map(str::trim).filter(|idea| !idea.is_empty()) {
        instruction.push_str("\nStaff notes for this post: ");
        instruction.push_str(idea);
    }
    instruction.push_str("\nEnd the caption with these two lines, exactly as written:\n");
    instruction.push_str(PICKUP_LINE);
    instruction.push('\n');
    instruction.push_str(ORDER_LINE);
    instruction.push_str("\nReturn only the caption text.");
    instruction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_instruction_wraps_prompt() {
        let instruction = edit_instruction("  Remove the background. ");
        assert!(instruction.starts_with("Act as a professional high-end jewelry photo editor. "));
        assert!(instruction.contains("Remove the background. Return ONLY the edited image part."));
    }

    #[test]
    fn test_caption_instruction_requires_call_to_actions() {
        let instruction = caption_instruction(None);
        assert!(instruction.contains(PICKUP_LINE));
        assert!(instruction.contains(ORDER_LINE));
        assert!(!instruction.contains("Staff notes"));
    }

    #[test]
    fn test_caption_instruction_includes_idea() {
        let instruction = caption_instruction(Some("Valentine's Day launch"));
        assert!(instruction.contains("Staff notes for this post: Valentine's Day launch"));

        let blank = caption_instruction(Some("   "));
        assert!(!blank.contains("Staff notes"));
    }
}
