//! Instructions handed to the reply generator.

/// Board feedback when a rendered image accompanies the request.
pub fn board_image_instructions(summary: &str) -> String {
    format!(
        "The student updated their whiteboard. Analyze the provided image of the board and \
         give concise, useful tutoring feedback. Additional metadata: {summary} \
         If the board is empty or cleared, ask what they want to work on next."
    )
}

/// Board feedback when only the textual summary is available.
pub const BOARD_SUMMARY_INSTRUCTIONS: &str = "The student updated their whiteboard. Use the whiteboard summary as context. \
     Give concise, helpful tutoring feedback about likely intent. \
     If the board is empty or cleared, ask what they want to draw or solve next.";

/// The student pushed an image of their board and asked for a look.
pub const EXPLICIT_IMAGE_INSTRUCTIONS: &str = "The student explicitly asked you to look at their whiteboard. \
     Analyze the image carefully and give concise, helpful tutoring feedback. \
     If the writing is unclear, say what you can infer and ask a clarifying question.";
