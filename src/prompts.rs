//! The instruction prompt sent with every image.
//!
//! The prompt is fixed and deliberately not configurable: cached
//! descriptions are keyed by image content only, so every cached entry must
//! have been produced by the same instruction.

/// Instruction sent alongside each embedded image.
pub const IMAGE_ANALYSIS_PROMPT: &str = r#"Please analyze this image and provide a brief description including:
1. Type of content (e.g., graph, chart, diagram, photo, logo, etc.)
2. Main elements and subject matter
3. Key information or data shown (if applicable)
4. Any text or numbers that are crucial to understanding the content

Be concise but thorough. If it's a graph or chart, include key trends and data points."#;

/// Placeholder stored when the service answers with an empty body.
pub const EMPTY_ANALYSIS: &str = "No analysis generated";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_asks_for_all_four_aspects() {
        for needle in ["Type of content", "Main elements", "Key information", "text or numbers"] {
            assert!(IMAGE_ANALYSIS_PROMPT.contains(needle), "missing {needle}");
        }
    }
}
