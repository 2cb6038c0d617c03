use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;

static HEADING_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,3})\s+(.+?)\s*#*\s*$").unwrap());

/// Separators tried in order, coarsest first. The empty separator splits
/// into single characters.
const SEPARATORS: [&str; 7] = ["\n### ", "\n## ", "\n# ", "\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    /// Enclosing headings joined with " > ", empty above the first heading
    pub heading_path: String,
}

/// Text under one combination of headings.
#[derive(Debug, Clone, PartialEq)]
struct Section {
    heading_path: String,
    content: String,
}

pub struct ChunkEngine {
    config: ChunkConfig,
}

impl ChunkEngine {
    pub fn new(config: ChunkConfig) -> Self {
        let overlap = config.overlap.min(config.chunk_size.saturating_sub(1));
        Self {
            config: ChunkConfig {
                chunk_size: config.chunk_size.max(1),
                overlap,
            },
        }
    }

    /// Split a Markdown document by `#`..`###` headings, then split each
    /// section into overlapping chunks.
    pub fn split_markdown(&self, markdown: &str) -> Vec<Chunk> {
        split_by_headings(markdown)
            .into_iter()
            .flat_map(|section| {
                self.split_text(&section.content)
                    .into_iter()
                    .map(move |content| Chunk {
                        content,
                        heading_path: section.heading_path.clone(),
                    })
            })
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
            .into_iter()
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut small_pieces: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.config.chunk_size {
                small_pieces.push(piece);
                continue;
            }

            if !small_pieces.is_empty() {
                chunks.extend(self.merge_pieces(&small_pieces));
                small_pieces.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !small_pieces.is_empty() {
            chunks.extend(self.merge_pieces(&small_pieces));
        }

        chunks
    }

    /// Greedily pack pieces into chunks, keeping up to `overlap` characters of
    /// trailing pieces at the start of the next chunk.
    fn merge_pieces(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.config.chunk_size && !current.is_empty() {
                chunks.push(current.iter().copied().collect::<String>());

                while total > self.config.overlap
                    || (total + len > self.config.chunk_size && total > 0)
                {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        if !current.is_empty() {
            chunks.push(current.iter().copied().collect::<String>());
        }

        chunks
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split on `separator`, attaching each separator to the piece that follows it.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }

    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > last {
            pieces.push(text[last..idx].to_string());
        }
        last = idx;
    }
    if last < text.len() {
        pieces.push(text[last..].to_string());
    }
    pieces
}

fn split_by_headings(markdown: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut headings: [Option<String>; 3] = [None, None, None];
    let mut lines: Vec<&str> = Vec::new();
    let mut in_code_block = false;

    let flush = |lines: &mut Vec<&str>, headings: &[Option<String>; 3], sections: &mut Vec<Section>| {
        let content = lines.join("\n").trim().to_string();
        lines.clear();
        if content.is_empty() {
            return;
        }
        let heading_path = headings
            .iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(" > ");
        sections.push(Section {
            heading_path,
            content,
        });
    };

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_code_block = !in_code_block;
            lines.push(line);
            continue;
        }

        if !in_code_block {
            if let Some(caps) = HEADING_PATTERN.captures(line) {
                flush(&mut lines, &headings, &mut sections);
                let level = caps[1].len();
                headings[level - 1] = Some(caps[2].to_string());
                for deeper in headings.iter_mut().skip(level) {
                    *deeper = None;
                }
                continue;
            }
        }

        lines.push(line);
    }
    flush(&mut lines, &headings, &mut sections);

    sections
}
