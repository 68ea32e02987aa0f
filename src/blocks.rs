use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hard limit the API places on a single rich text element.
pub const MAX_TEXT_LEN: usize = 2000;
/// Hard limit the API places on children blocks in one page creation.
pub const MAX_BLOCKS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: TextContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
}

impl RichText {
    pub fn text(content: impl Into<String>) -> Self {
        RichText {
            kind: "text".to_string(),
            text: TextContent {
                content: content.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub object: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub paragraph: Paragraph,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub rich_text: Vec<RichText>,
}

impl Block {
    pub fn paragraph(rich_text: Vec<RichText>) -> Self {
        Block {
            object: "block".to_string(),
            kind: "paragraph".to_string(),
            paragraph: Paragraph { rich_text },
        }
    }
}

/// Render raw item content into page body blocks, one paragraph per
/// non-empty line. Output is capped at [`MAX_BLOCKS`] paragraphs; lines past
/// the cap are dropped.
pub fn content_to_blocks(content: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut dropped = 0usize;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if blocks.len() == MAX_BLOCKS {
            dropped += 1;
            continue;
        }
        blocks.push(Block::paragraph(chunk_text(line)));
    }

    if dropped > 0 {
        warn!("Content exceeds {} blocks, dropped {} paragraphs", MAX_BLOCKS, dropped);
    }

    blocks
}

/// Split a paragraph into rich text elements no longer than [`MAX_TEXT_LEN`]
/// characters, splitting on character boundaries.
pub fn chunk_text(text: &str) -> Vec<RichText> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut len = 0;

    for ch in text.chars() {
        if len == MAX_TEXT_LEN {
            chunks.push(RichText::text(std::mem::take(&mut current)));
            len = 0;
        }
        current.push(ch);
        len += 1;
    }

    if !current.is_empty() {
        chunks.push(RichText::text(current));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    mod chunk_text_tests {
        use super::*;

        #[test]
        fn test_short_text_is_single_chunk() {
            let chunks = chunk_text("hello world");
            assert_eq!(chunks, vec![RichText::text("hello world")]);
        }

        #[test]
        fn test_empty_text_has_no_chunks() {
            assert!(chunk_text("").is_empty());
        }

        #[test]
        fn test_text_at_limit_is_single_chunk() {
            let text = "a".repeat(MAX_TEXT_LEN);
            let chunks = chunk_text(&text);
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].text.content.len(), MAX_TEXT_LEN);
        }

        #[test]
        fn test_text_over_limit_is_split() {
            let text = "a".repeat(MAX_TEXT_LEN + 5);
            let chunks = chunk_text(&text);
            assert_eq!(chunks.len(), 2);
            assert_eq!(chunks[0].text.content.len(), MAX_TEXT_LEN);
            assert_eq!(chunks[1].text.content.len(), 5);
        }

        #[test]
        fn test_split_counts_chars_not_bytes() {
            // 3 bytes per char in UTF-8; a byte-based split would land
            // mid-character and panic or corrupt the text
            let text = "値".repeat(MAX_TEXT_LEN + 1);
            let chunks = chunk_text(&text);
            assert_eq!(chunks.len(), 2);
            assert_eq!(chunks[0].text.content.chars().count(), MAX_TEXT_LEN);
            assert_eq!(chunks[1].text.content, "値");
        }

        #[test]
        fn test_chunks_reassemble_to_original() {
            let text = "xy".repeat(MAX_TEXT_LEN);
            let rebuilt: String = chunk_text(&text)
                .into_iter()
                .map(|rt| rt.text.content)
                .collect();
            assert_eq!(rebuilt, text);
        }
    }

    mod content_to_blocks_tests {
        use super::*;

        #[test]
        fn test_empty_content_has_no_blocks() {
            assert!(content_to_blocks("").is_empty());
        }

        #[test]
        fn test_whitespace_only_content_has_no_blocks() {
            assert!(content_to_blocks("  \n\t\n   \n").is_empty());
        }

        #[test]
        fn test_single_line_is_one_paragraph() {
            let blocks = content_to_blocks("Just one line of text");
            assert_eq!(blocks.len(), 1);
            assert_eq!(
                blocks[0].paragraph.rich_text,
                vec![RichText::text("Just one line of text")]
            );
        }

        #[test]
        fn test_one_paragraph_per_line() {
            let blocks = content_to_blocks("first line\nsecond line\nthird line");
            assert_eq!(blocks.len(), 3);
            assert_eq!(blocks[1].paragraph.rich_text[0].text.content, "second line");
        }

        #[test]
        fn test_blank_lines_are_dropped() {
            let blocks = content_to_blocks("first\n\n\nsecond\n");
            assert_eq!(blocks.len(), 2);
            assert_eq!(blocks[0].paragraph.rich_text[0].text.content, "first");
            assert_eq!(blocks[1].paragraph.rich_text[0].text.content, "second");
        }

        #[test]
        fn test_lines_are_trimmed() {
            let blocks = content_to_blocks("   padded line   ");
            assert_eq!(blocks[0].paragraph.rich_text[0].text.content, "padded line");
        }

        #[test]
        fn test_long_line_gets_multiple_rich_text_elements() {
            let line = "b".repeat(MAX_TEXT_LEN * 2 + 1);
            let blocks = content_to_blocks(&line);
            assert_eq!(blocks.len(), 1);
            assert_eq!(blocks[0].paragraph.rich_text.len(), 3);
        }

        #[test]
        fn test_block_count_is_capped() {
            let content = (0..MAX_BLOCKS + 20)
                .map(|i| format!("line {}", i))
                .collect::<Vec<_>>()
                .join("\n");

            let blocks = content_to_blocks(&content);
            assert_eq!(blocks.len(), MAX_BLOCKS);
            assert_eq!(
                blocks.last().unwrap().paragraph.rich_text[0].text.content,
                format!("line {}", MAX_BLOCKS - 1)
            );
        }

        #[test]
        fn test_block_wire_format() {
            let blocks = content_to_blocks("hello");
            let json = serde_json::to_value(&blocks[0]).unwrap();
            assert_eq!(
                json,
                serde_json::json!({
                    "object": "block",
                    "type": "paragraph",
                    "paragraph": {
                        "rich_text": [
                            { "type": "text", "text": { "content": "hello" } }
                        ]
                    }
                })
            );
        }
    }
}
