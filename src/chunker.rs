//! Paragraph-boundary text chunking.
//!
//! [`chunk_paragraphs`] splits a paragraph sequence into chunks bounded by a
//! character target and minimum, carrying a configurable number of trailing
//! paragraphs into the next chunk so meaning survives the boundary. A
//! pathologically long paragraph is hard-split at character offsets so no
//! chunk grows past ~1.5x the target.
//!
//! [`PageChunker`] is the document-level companion used during ingestion:
//! the same character-target-driven policy applied over page-ordered
//! paragraph text, additionally recording which pages each chunk spans.

use crate::config::ChunkingConfig;

/// Collapse whitespace runs and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a block of text into normalized, non-empty paragraphs.
/// Paragraph boundaries are blank lines.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(clean_text(&current));
                current.clear();
            }
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        blocks.push(clean_text(&current));
    }

    blocks.retain(|b| !b.is_empty());
    blocks
}

/// Build chunks from consecutive paragraphs.
///
/// Flushes the running buffer once appending the next paragraph would push
/// it past `target_chars` and it already holds at least `min_chars`; the
/// last `overlap_paragraphs` paragraphs of the flushed chunk seed the next
/// buffer. A buffer past `1.5 x target_chars` is hard-split at exactly
/// `target_chars` characters. Every non-final chunk is therefore at least
/// `min_chars`, and only a single oversized paragraph can exceed the
/// 1.5x bound momentarily before being cut down.
pub fn chunk_paragraphs(
    paragraphs: &[String],
    target_chars: usize,
    min_chars: usize,
    overlap_paragraphs: usize,
) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut buffer: Vec<String> = Vec::new();
    let mut current_len = 0usize; // chars of the space-joined buffer

    for para in paragraphs {
        let para_len = para.chars().count();

        if current_len > 0 && current_len + 1 + para_len > target_chars && current_len >= min_chars
        {
            chunks.push(buffer.join(" "));
            let keep_from = buffer.len().saturating_sub(overlap_paragraphs);
            buffer.drain(..keep_from);
            current_len = joined_char_len(&buffer);
        }

        if !buffer.is_empty() {
            current_len += 1; // joining space
        }
        current_len += para_len;
        buffer.push(para.clone());

        // Hard character split for buffers far past the target (a single
        // very long paragraph). Emit target_chars characters, keep the rest
        // as the new buffer seed, repeat.
        while current_len * 2 > target_chars * 3 {
            let text = buffer.join(" ");
            let cut = byte_offset_of_char(&text, target_chars);
            let head = text[..cut].trim().to_string();
            let tail = text[cut..].trim().to_string();
            if !head.is_empty() {
                chunks.push(head);
            }
            buffer.clear();
            current_len = 0;
            if !tail.is_empty() {
                current_len = tail.chars().count();
                buffer.push(tail);
            }
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer.join(" "));
    }

    chunks
}

fn joined_char_len(buffer: &[String]) -> usize {
    if buffer.is_empty() {
        return 0;
    }
    let chars: usize = buffer.iter().map(|p| p.chars().count()).sum();
    chars + buffer.len() - 1
}

/// Byte offset of the `n`-th character, clamped to the end of the string.
fn byte_offset_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// A chunk produced during ingestion, tagged with the page span it covers.
#[derive(Debug, Clone)]
pub struct PagedChunk {
    pub text: String,
    pub page_start: Option<i64>,
    pub page_end: Option<i64>,
}

/// Incremental chunker fed one page of text at a time.
///
/// Applies the same flush policy as [`chunk_paragraphs`] while tracking the
/// first and last page contributing to the open buffer, so each flushed
/// chunk knows its page span. Feed pages in order via
/// [`push_page`](Self::push_page), then call [`finish`](Self::finish) to
/// flush the remainder.
pub struct PageChunker {
    target_chars: usize,
    min_chars: usize,
    overlap_paragraphs: usize,
    buffer: Vec<String>,
    buffer_start_page: Option<i64>,
    buffer_end_page: Option<i64>,
    chunks: Vec<PagedChunk>,
}

impl PageChunker {
    pub fn new(chunking: &ChunkingConfig) -> Self {
        Self {
            target_chars: chunking.target_chars,
            min_chars: chunking.min_chars,
            overlap_paragraphs: chunking.overlap_paragraphs,
            buffer: Vec::new(),
            buffer_start_page: None,
            buffer_end_page: None,
            chunks: Vec::new(),
        }
    }

    /// Add one page of raw text. `page_number` is 1-based.
    pub fn push_page(&mut self, page_number: i64, text: &str) {
        for para in split_paragraphs(text) {
            let para_len = para.chars().count();
            let current_len = joined_char_len(&self.buffer);
            if current_len > 0
                && current_len + 1 + para_len > self.target_chars
                && current_len >= self.min_chars
            {
                self.flush();
            }
            if self.buffer.is_empty() {
                self.buffer_start_page = Some(page_number);
            }
            self.buffer_end_page = Some(page_number);
            self.buffer.push(para);
        }

        // A page ending with an oversized buffer is flushed outright, with
        // no overlap carried.
        if joined_char_len(&self.buffer) * 2 > self.target_chars * 3 {
            self.chunks.push(PagedChunk {
                text: self.buffer.join(" "),
                page_start: self.buffer_start_page,
                page_end: self.buffer_end_page,
            });
            self.buffer.clear();
            self.buffer_start_page = None;
            self.buffer_end_page = None;
        }
    }

    fn flush(&mut self) {
        self.chunks.push(PagedChunk {
            text: self.buffer.join(" "),
            page_start: self.buffer_start_page,
            page_end: self.buffer_end_page,
        });
        let keep_from = self.buffer.len().saturating_sub(self.overlap_paragraphs);
        self.buffer.drain(..keep_from);
        if self.buffer.is_empty() {
            self.buffer_start_page = None;
            self.buffer_end_page = None;
        } else {
            // The overlap is the tail of the flushed chunk.
            self.buffer_start_page = self.buffer_end_page;
        }
    }

    /// Flush any remaining buffered text and return all chunks.
    pub fn finish(mut self) -> Vec<PagedChunk> {
        if !self.buffer.is_empty() {
            self.chunks.push(PagedChunk {
                text: self.buffer.join(" "),
                page_start: self.buffer_start_page,
                page_end: self.buffer_end_page,
            });
        }
        self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paras(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_input_no_chunks() {
        let chunks = chunk_paragraphs(&[], 100, 20, 1);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_small_input_single_chunk() {
        let chunks = chunk_paragraphs(&paras(&["Hello, world!"]), 100, 20, 1);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_non_final_chunks_meet_minimum() {
        let input: Vec<String> = (0..40)
            .map(|i| format!("Paragraph number {} with some filler text.", i))
            .collect();
        let chunks = chunk_paragraphs(&input, 120, 60, 1);
        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.chars().count() >= 60,
                "non-final chunk below minimum: {:?}",
                chunk
            );
        }
    }

    #[test]
    fn test_chunks_bounded_by_1_5x_target() {
        // No single paragraph exceeds the bound, so no chunk may either.
        let input: Vec<String> = (0..40)
            .map(|i| format!("Paragraph number {} with some filler text.", i))
            .collect();
        let chunks = chunk_paragraphs(&input, 120, 60, 1);
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= 180,
                "chunk exceeds 1.5x target: {} chars",
                chunk.chars().count()
            );
        }
    }

    #[test]
    fn test_overlap_continuity() {
        let input: Vec<String> = (0..10)
            .map(|i| format!("Unique paragraph marker {} trailing words.", i))
            .collect();
        let chunks = chunk_paragraphs(&input, 100, 40, 1);
        assert!(chunks.len() > 1);
        // Each consecutive pair shares the overlapped paragraph.
        for pair in chunks.windows(2) {
            let last_para = pair[0]
                .rsplit("Unique paragraph marker ")
                .next()
                .unwrap()
                .split(' ')
                .next()
                .unwrap();
            assert!(
                pair[1].contains(&format!("Unique paragraph marker {}", last_para)),
                "no shared paragraph between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_single_long_paragraph_hard_split() {
        let long = "x".repeat(1000);
        let chunks = chunk_paragraphs(&paras(&[&long]), 100, 20, 1);
        assert!(chunks.len() > 1);
        // Hard splits emit exactly target_chars characters.
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.chars().count(), 100);
        }
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert_eq!(total, 1000);
    }

    #[test]
    fn test_hard_split_is_char_aware() {
        // Multibyte chars must not be cut mid-codepoint.
        let long = "é".repeat(400);
        let chunks = chunk_paragraphs(&paras(&[&long]), 100, 20, 1);
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].chars().count(), 100);
    }

    #[test]
    fn test_zero_overlap_keeps_nothing() {
        let input: Vec<String> = (0..10)
            .map(|i| format!("Paragraph {} with enough text to matter here.", i))
            .collect();
        let chunks = chunk_paragraphs(&input, 100, 40, 0);
        assert!(chunks.len() > 1);
        // Without overlap no paragraph may appear twice.
        for i in 0..10 {
            let marker = format!("Paragraph {} ", i);
            let occurrences = chunks.iter().filter(|c| c.contains(&marker)).count();
            assert_eq!(occurrences, 1, "paragraph {} duplicated", i);
        }
    }

    #[test]
    fn test_split_paragraphs_blank_line_boundaries() {
        let text = "First  paragraph\nstill first.\n\nSecond paragraph.\n\n\n\nThird.";
        let blocks = split_paragraphs(text);
        assert_eq!(
            blocks,
            vec![
                "First paragraph still first.".to_string(),
                "Second paragraph.".to_string(),
                "Third.".to_string(),
            ]
        );
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  a\t b\n\nc  "), "a b c");
    }

    fn cfg(target_chars: usize, min_chars: usize, overlap_paragraphs: usize) -> ChunkingConfig {
        ChunkingConfig {
            target_chars,
            min_chars,
            overlap_paragraphs,
        }
    }

    #[test]
    fn test_page_chunker_tracks_page_span() {
        let mut pc = PageChunker::new(&cfg(80, 20, 1));
        pc.push_page(1, "Alpha paragraph with a fair amount of words inside it.");
        pc.push_page(
            2,
            "Beta paragraph that should push the buffer over the flush target size.",
        );
        pc.push_page(3, "Gamma closing remark.");
        let chunks = pc.finish();
        assert_eq!(chunks.len(), 3);

        // First flush holds only page-1 text.
        assert_eq!(chunks[0].page_start, Some(1));
        assert_eq!(chunks[0].page_end, Some(1));
        assert!(chunks[0].text.starts_with("Alpha"));

        // The overlapped paragraph carries the page-1 start into the
        // chunk that absorbed page 2.
        assert_eq!(chunks[1].page_start, Some(1));
        assert_eq!(chunks[1].page_end, Some(2));
        assert!(chunks[1].text.contains("Alpha"));
        assert!(chunks[1].text.contains("Beta"));

        let last = chunks.last().unwrap();
        assert_eq!(last.page_start, Some(3));
        assert_eq!(last.page_end, Some(3));
    }

    #[test]
    fn test_page_chunker_empty_pages_produce_nothing() {
        let mut pc = PageChunker::new(&cfg(100, 20, 1));
        pc.push_page(1, "");
        pc.push_page(2, "   \n\n  ");
        let chunks = pc.finish();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_page_chunker_zero_overlap_carries_nothing() {
        let mut pc = PageChunker::new(&cfg(40, 10, 0));
        pc.push_page(1, "First paragraph with plenty of characters.\n\nSecond paragraph also sized well.");
        pc.push_page(2, "Third paragraph closing the document.");
        let chunks = pc.finish();
        assert!(chunks.len() > 1);
        let firsts = chunks.iter().filter(|c| c.text.contains("First")).count();
        assert_eq!(firsts, 1);
    }
}
