//! Renders retrieved memories into a block that can be inserted into a prompt.

use strata_types::memory::RetrievedMemory;

/// Default character cap for the rendered block.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 2000;

const HEADER: &str = "Known facts about the user:";

pub struct ContextFormatter {
    max_chars: usize,
}

impl ContextFormatter {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// One line per memory, in the given order:
    ///
    /// ```text
    /// Known facts about the user:
    /// - [preferences] Likes espresso (tags: coffee, drinks)
    /// ```
    ///
    /// Output longer than the cap is cut to exactly `max_chars` characters.
    /// No memories render as the empty string.
    pub fn format(&self, memories: &[RetrievedMemory]) -> String {
        if memories.is_empty() {
            return String::new();
        }

        let mut out = String::from(HEADER);
        for memory in memories {
            out.push_str("\n- [");
            out.push_str(memory.layer.as_str());
            out.push_str("] ");
            out.push_str(memory.display_text());
            if !memory.tags.is_empty() {
                out.push_str(" (tags: ");
                out.push_str(&memory.tags.join(", "));
                out.push(')');
            }
        }

        truncate_chars(out, self.max_chars)
    }
}

impl Default for ContextFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT_CHARS)
    }
}

/// Cut `text` to at most `max` characters, on a char boundary.
pub fn truncate_chars(mut text: String, max: usize) -> String {
    if let Some((byte_idx, _)) = text.char_indices().nth(max) {
        text.truncate(byte_idx);
    }
    text
}
