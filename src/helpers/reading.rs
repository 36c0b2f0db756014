//! Reading time estimation

use crate::content::ContentBlock;

/// Average reading speed
pub const WORDS_PER_MINUTE: usize = 200;

const _: () = assert!(WORDS_PER_MINUTE > 0);

/// Count whitespace-separated words in every heading and body
pub fn count_words(content: &[ContentBlock]) -> usize {
    content
        .iter()
        .map(|block| {
            let heading = block.heading.as_deref().map(count_text_words).unwrap_or(0);
            heading + count_text_words(&block.body.as_text())
        })
        .sum()
}

/// Minutes needed to read the content, rounded up
pub fn estimate_reading_time(content: &[ContentBlock]) -> u32 {
    let minutes = count_words(content).div_ceil(WORDS_PER_MINUTE);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

fn count_text_words(text: &str) -> usize {
    text.split_whitespace().count()
}
