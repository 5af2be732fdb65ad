//! Text chunking module
//!
//! Splits text into bounded, overlapping chunks for embedding. Lengths are in
//! characters; spans are byte offsets into the source text.
//!
//! Consecutive chunks share exactly `overlap` characters, so dropping that
//! prefix from every chunk after the first and concatenating rebuilds the
//! input byte-for-byte.

use dealflow_common::errors::{AppError, Result};
use dealflow_common::models::{Chunk, Document};
use tracing::debug;

/// Where a chunk may end, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    Word,
    Sentence,
    Line,
    Paragraph,
}

/// One chunk span, borrowed from the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunk<'a> {
    pub ordinal: u32,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    pub char_length: usize,
    pub text: &'a str,
}

/// Validated chunking parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_length: usize,
    overlap: usize,
}

impl Chunker {
    /// `max_length` must be positive and `overlap` strictly smaller
    pub fn new(max_length: usize, overlap: usize) -> Result<Self> {
        if max_length == 0 {
            return Err(AppError::invalid_argument("chunk max_length must be positive"));
        }
        if overlap >= max_length {
            return Err(AppError::invalid_argument(format!(
                "chunk overlap {} must be smaller than max_length {}",
                overlap, max_length
            )));
        }
        Ok(Self { max_length, overlap })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazy chunk sequence over `text`. Clone it to restart.
    pub fn chunk<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            max_length: self.max_length,
            overlap: self.overlap,
            pos: 0,
            ordinal: 0,
            done: text.is_empty(),
        }
    }

    /// Materialize a document's chunks with stable ids
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = self
            .chunk(&document.text)
            .map(|c| Chunk {
                id: Chunk::derive_id(document.id, c.ordinal),
                document_id: document.id,
                ordinal: c.ordinal,
                text: c.text.to_string(),
                start: c.start,
                end: c.end,
                char_length: c.char_length,
            })
            .collect();

        debug!(
            document_id = %document.id,
            input_len = document.text.len(),
            chunk_count = chunks.len(),
            max_length = self.max_length,
            overlap = self.overlap,
            "Text chunked"
        );
        chunks
    }
}

/// Split `text` into chunks of at most `max_length` characters
pub fn chunk(text: &str, max_length: usize, overlap: usize) -> Result<Chunks<'_>> {
    Ok(Chunker::new(max_length, overlap)?.chunk(text))
}

/// Iterator produced by [`Chunker::chunk`]
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    max_length: usize,
    overlap: usize,
    pos: usize,
    ordinal: u32,
    done: bool,
}

impl<'a> Chunks<'a> {
    /// Shortest chunk, in characters, that may end at a soft boundary
    fn min_split(&self) -> usize {
        self.overlap + ((self.max_length - self.overlap) / 2).max(1)
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let rest = &self.text[self.pos..];

        // offsets[n] = byte length of the first n characters of `rest`
        let mut offsets = Vec::with_capacity(self.max_length + 1);
        offsets.push(0);
        for (i, (b, c)) in rest.char_indices().enumerate() {
            if i == self.max_length {
                break;
            }
            offsets.push(b + c.len_utf8());
        }
        let window = offsets.len() - 1;

        let start = self.pos;
        let ordinal = self.ordinal;
        self.ordinal += 1;

        if offsets[window] == rest.len() {
            self.done = true;
            return Some(TextChunk {
                ordinal,
                start,
                end: self.text.len(),
                char_length: window,
                text: rest,
            });
        }

        let split = best_split(rest, &offsets, self.min_split().min(window)).unwrap_or(window);
        let end = start + offsets[split];
        self.pos = start + offsets[split - self.overlap];

        Some(TextChunk {
            ordinal,
            start,
            end,
            char_length: split,
            text: &self.text[start..end],
        })
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}

/// Character count at which to end the chunk: the strongest boundary kind
/// available, and the latest position of that kind.
fn best_split(rest: &str, offsets: &[usize], min_split: usize) -> Option<usize> {
    let window = offsets.len() - 1;
    let mut best: Option<(Boundary, usize)> = None;

    for n in (min_split..=window).rev() {
        if let Some(kind) = boundary_before(&rest[..offsets[n]]) {
            if best.map_or(true, |(b, _)| kind > b) {
                best = Some((kind, n));
                if kind == Boundary::Paragraph {
                    break;
                }
            }
        }
    }

    best.map(|(_, n)| n)
}

fn boundary_before(prefix: &str) -> Option<Boundary> {
    if prefix.ends_with("\n\n") {
        return Some(Boundary::Paragraph);
    }
    let mut tail = prefix.chars().rev();
    let last = tail.next()?;
    if last == '\n' {
        return Some(Boundary::Line);
    }
    if last.is_whitespace() {
        return match tail.next() {
            Some('.' | '!' | '?') => Some(Boundary::Sentence),
            _ => Some(Boundary::Word),
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebuild(chunks: &[TextChunk<'_>], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(c.text);
            } else {
                out.extend(c.text.chars().skip(overlap));
            }
        }
        out
    }

    fn assert_lossless(text: &str, max_length: usize, overlap: usize) {
        let chunks: Vec<_> = chunk(text, max_length, overlap).unwrap().collect();
        assert_eq!(rebuild(&chunks, overlap), text, "max={max_length} overlap={overlap}");
        assert_eq!(chunks.first().map(|c| c.start), Some(0));
        assert_eq!(chunks.last().map(|c| c.end), Some(text.len()));
        for c in &chunks {
            assert!(c.char_length <= max_length);
            assert_eq!(c.char_length, c.text.chars().count());
            assert_eq!(&text[c.start..c.end], c.text);
        }
        for (i, pair) in chunks.windows(2).enumerate() {
            assert_eq!(pair[0].ordinal as usize, i);
            let shared: String = pair[1].text.chars().take(overlap).collect();
            assert!(pair[0].text.ends_with(&shared));
        }
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(chunk("", 100, 10).unwrap().count(), 0);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks: Vec<_> = chunk("Short text.", 100, 10).unwrap().collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short text.");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 11));
    }

    #[test]
    fn test_exact_length_is_single_chunk() {
        let text = "a".repeat(50);
        assert_eq!(chunk(&text, 50, 5).unwrap().count(), 1);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(chunk("x", 0, 0), Err(AppError::InvalidArgument { .. })));
        assert!(matches!(chunk("x", 10, 10), Err(AppError::InvalidArgument { .. })));
        assert!(chunk("x", 10, 0).is_ok());
    }

    #[test]
    fn test_lossless_across_parameters() {
        let text = "Revenue grew 40% year over year. Margins expanded!\n\nThe company \
                    operates three plants.\nHeadcount is 420. Is growth durable? \
                    Management believes so.\n\nRisks include customer concentration."
            .repeat(7);
        for (max_length, overlap) in [(40, 0), (40, 10), (64, 20), (200, 50), (17, 16), (1, 0)] {
            assert_lossless(&text, max_length, overlap);
        }
    }

    #[test]
    fn test_lossless_multibyte() {
        let text = "Ünïcödé – naïve café façade. 日本語のテキストです。 Ελληνικά κείμενα εδώ.\n\n".repeat(5);
        for (max_length, overlap) in [(10, 3), (33, 0), (50, 12)] {
            assert_lossless(&text, max_length, overlap);
        }
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "x".repeat(250);
        let chunks: Vec<_> = chunk(&text, 100, 20).unwrap().collect();
        assert_eq!(chunks[0].char_length, 100);
        assert_eq!(chunks[1].start, 80);
        assert_lossless(&text, 100, 20);
    }

    #[test]
    fn test_prefers_paragraph_then_sentence() {
        let text = format!("{}\n\n{} tail words here", "a".repeat(60), "b. c".repeat(5));
        let first = chunk(&text, 80, 0).unwrap().next().unwrap();
        assert!(first.text.ends_with("\n\n"));

        let text = format!("{}. Then more words follow here", "a".repeat(50));
        let first = chunk(&text, 70, 0).unwrap().next().unwrap();
        assert!(first.text.ends_with(". "), "got {:?}", first.text);
    }

    #[test]
    fn test_restartable_and_idempotent() {
        let text = "One sentence. Another sentence. A third one here. ".repeat(10);
        let chunks = chunk(&text, 60, 15).unwrap();
        let a: Vec<_> = chunks.clone().collect();
        let b: Vec<_> = chunks.collect();
        assert_eq!(a, b);
        let c: Vec<_> = chunk(&text, 60, 15).unwrap().collect();
        assert_eq!(a, c);
    }

    #[test]
    fn test_chunk_document_ids_are_stable() {
        let doc = Document::new(
            uuid::Uuid::from_u128(1),
            "memo.txt",
            dealflow_common::models::DocumentType::Other,
            "Alpha beta gamma. ".repeat(20),
        );
        let chunker = Chunker::new(50, 10).unwrap();
        let first = chunker.chunk_document(&doc);
        let second = chunker.chunk_document(&doc);
        assert!(first.len() > 1);
        assert_eq!(first, second);
        assert_eq!(first[1].id, Chunk::derive_id(doc.id, 1));
    }
}
