//! Splitting raw document text into retrievable chunks
//!
//! Three policies are supported:
//! - `SENTENCE`: UAX#29 sentence boundaries, `size` sentences per chunk
//! - `PARAGRAPH`: blank-line separated paragraphs, one per chunk (`size` is ignored)
//! - `WORD`: alphabetic or numeric words, `size` words per chunk

mod document;

pub use document::{Chunk, Document};

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("Invalid chunk mode '{0}'. Choose from 'SENTENCE', 'PARAGRAPH', or 'WORD'")]
    InvalidMode(String),

    #[error("Chunk size must be greater than 0 for {0} chunking")]
    InvalidSize(ChunkMode),
}

/// Chunking policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkMode {
    Sentence,
    Paragraph,
    Word,
}

impl FromStr for ChunkMode {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SENTENCE" => Ok(Self::Sentence),
            "PARAGRAPH" => Ok(Self::Paragraph),
            "WORD" => Ok(Self::Word),
            _ => Err(ChunkError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for ChunkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sentence => "SENTENCE",
            Self::Paragraph => "PARAGRAPH",
            Self::Word => "WORD",
        };
        f.write_str(name)
    }
}

/// A validated (mode, size) chunking policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    mode: ChunkMode,
    size: usize,
}

impl Chunker {
    /// Create a chunker. `size` must be positive unless the mode is `PARAGRAPH`.
    pub fn new(mode: ChunkMode, size: usize) -> Result<Self, ChunkError> {
        if size == 0 && mode != ChunkMode::Paragraph {
            return Err(ChunkError::InvalidSize(mode));
        }
        Ok(Self { mode, size })
    }

    /// Parse the mode from its configuration string
    pub fn from_config(mode: &str, size: usize) -> Result<Self, ChunkError> {
        Self::new(mode.parse()?, size)
    }

    pub fn mode(&self) -> ChunkMode {
        self.mode
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Split raw text into chunk texts, in document order
    pub fn split(&self, text: &str) -> Vec<String> {
        let pieces = match self.mode {
            ChunkMode::Sentence => group(&sentences(text), self.size),
            ChunkMode::Paragraph => paragraphs(text),
            ChunkMode::Word => group(&words(text), self.size),
        };

        pieces
            .into_iter()
            .map(|piece| piece.trim().to_string())
            .filter(|piece| !piece.is_empty())
            .collect()
    }

    /// Chunk a document, numbering chunks from zero
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let source = document.shared_name();
        self.split(document.text())
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk::new(source.clone(), index, text))
            .collect()
    }
}

/// Chunk `text` with a mode given by name
pub fn chunk(text: &str, mode: &str, size: usize) -> Result<Vec<String>, ChunkError> {
    Ok(Chunker::from_config(mode, size)?.split(text))
}

fn group(units: &[String], size: usize) -> Vec<String> {
    units.chunks(size).map(|g| g.join(" ")).collect()
}

/// Paragraphs are runs of non-blank lines
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }

    out
}

/// Sentences never span a paragraph break; hard line wraps inside a
/// paragraph are folded into spaces before segmentation.
fn sentences(text: &str) -> Vec<String> {
    paragraphs(text)
        .iter()
        .flat_map(|paragraph| {
            let folded = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
            folded
                .split_sentence_bounds()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn words(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(contraction_head)
        .filter(|w| !w.is_empty())
        .filter(|w| w.chars().all(char::is_alphabetic) || w.chars().all(char::is_numeric))
        .map(str::to_string)
        .collect()
}

fn is_apostrophe(c: char) -> bool {
    c == '\'' || c == '\u{2019}'
}

/// The word part of a contraction: `don't` -> `do`, `it's` -> `it`.
/// Clitics (`n't`, `'s`, `'ll`) are punctuation-bearing and not kept.
fn contraction_head(word: &str) -> &str {
    if !word.contains(is_apostrophe) {
        return word;
    }

    let mut tail = word.char_indices().rev();
    if let (Some((_, t)), Some((_, a)), Some((n_at, n))) = (tail.next(), tail.next(), tail.next())
    {
        if t.eq_ignore_ascii_case(&'t') && is_apostrophe(a) && n.eq_ignore_ascii_case(&'n') {
            return &word[..n_at];
        }
    }

    word.split(is_apostrophe).next().unwrap_or_default()
}
