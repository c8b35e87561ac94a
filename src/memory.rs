//! Short-term conversation memory.

use crate::models::Turn;

/// Render the last `window` turns, oldest first, as `User:` / `Assistant:`
/// lines. Each answer is cut to `answer_chars` characters.
pub fn render(history: &[Turn], window: usize, answer_chars: usize) -> String {
    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .map(|turn| {
            format!(
                "User: {}\nAssistant: {}",
                turn.question,
                truncate_chars(&turn.answer, answer_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}
