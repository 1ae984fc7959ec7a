use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::ops::Range;

/// A blank line (possibly holding spaces) plus any whitespace that follows it
static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[^\S\n]*\n\s*").expect("paragraph pattern is valid"));

/// End of a sentence: Latin terminators need trailing whitespace so that
/// `3.14` or `e.g.x` stay intact; CJK, Devanagari and Arabic terminators do not.
/// Closing quotes/brackets stay with the sentence they close.
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[.!?…]+["'”’»)\]]*\s+|[。！？；]+["'”’」』）]*\s*|[।॥؟۔]+\s*"#)
        .expect("sentence pattern is valid")
});

/// Contiguous slice of the source text.
///
/// `content` is the exact slice, including surrounding whitespace, so that the
/// contents of all chunks concatenate back to the source. Offsets are counted
/// in characters (Unicode scalar values), end exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    pub index: usize,
    pub content: String,
    pub char_offset_start: usize,
    pub char_offset_end: usize,
}

impl TextChunk {
    /// What gets sent to a backend
    pub fn speakable(&self) -> &str {
        self.content.trim()
    }

    pub fn char_len(&self) -> usize {
        self.char_offset_end - self.char_offset_start
    }

    /// Shift offsets when the chunked text was a suffix of a larger document
    pub fn offset_by(mut self, chars: usize) -> Self {
        self.char_offset_start += chars;
        self.char_offset_end += chars;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    max_chars: usize,
}

impl TextChunker {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        chunk_text(text, self.max_chars)
    }
}

/// Split `text` into ordered chunks of at most `max_chars` characters.
///
/// Paragraphs are kept whole when they fit. Longer paragraphs are cut at
/// sentence ends and sentences are packed greedily; a sentence that alone
/// exceeds the limit is cut at whitespace, or mid-word as a last resort.
/// A final pass merges neighbours whose combined length still fits.
/// Whitespace-only input produces no chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<TextChunk> {
    let max_chars = max_chars.max(1);

    let mut spans = Vec::new();
    for paragraph in paragraph_spans(text) {
        if char_len(&text[paragraph.clone()]) <= max_chars {
            spans.push(paragraph);
        } else {
            pack_sentences(text, paragraph, max_chars, &mut spans);
        }
    }

    let spans = absorb_blank_spans(text, spans);
    let spans = merge_adjacent(text, spans, max_chars);
    build_chunks(text, spans)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn paragraph_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for m in PARAGRAPH_BREAK.find_iter(text) {
        spans.push(start..m.end());
        start = m.end();
    }
    if start < text.len() {
        spans.push(start..text.len());
    }
    spans
}

fn sentence_spans(text: &str, paragraph: Range<usize>) -> Vec<Range<usize>> {
    let slice = &text[paragraph.clone()];
    let base = paragraph.start;
    let mut spans = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(slice) {
        spans.push(base + start..base + m.end());
        start = m.end();
    }
    if start < slice.len() {
        spans.push(base + start..paragraph.end);
    }
    spans
}

fn pack_sentences(
    text: &str,
    paragraph: Range<usize>,
    max_chars: usize,
    out: &mut Vec<Range<usize>>,
) {
    let mut buffer: Option<Range<usize>> = None;

    for sentence in sentence_spans(text, paragraph) {
        if char_len(&text[sentence.clone()]) > max_chars {
            if let Some(pending) = buffer.take() {
                out.push(pending);
            }
            hard_split(text, sentence, max_chars, out);
            continue;
        }

        buffer = match buffer {
            Some(pending) if char_len(&text[pending.start..sentence.end]) <= max_chars => {
                Some(pending.start..sentence.end)
            }
            Some(pending) => {
                out.push(pending);
                Some(sentence)
            }
            None => Some(sentence),
        };
    }

    if let Some(pending) = buffer {
        out.push(pending);
    }
}

fn hard_split(text: &str, range: Range<usize>, max_chars: usize, out: &mut Vec<Range<usize>>) {
    let mut start = range.start;

    while char_len(&text[start..range.end]) > max_chars {
        let window = &text[start..range.end];
        let limit = window
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(window.len());

        let cut = window[..limit]
            .char_indices()
            .filter(|(_, c)| c.is_whitespace())
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(limit);

        out.push(start..start + cut);
        start += cut;
    }

    if start < range.end {
        out.push(start..range.end);
    }
}

/// Fold whitespace-only spans into the previous span (or the next one when
/// nothing precedes them) so no text is lost and no blank chunk is emitted.
fn absorb_blank_spans(text: &str, spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
    let mut result: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    let mut pending_start: Option<usize> = None;

    for span in spans {
        if text[span.clone()].trim().is_empty() {
            match result.last_mut() {
                Some(last) => last.end = span.end,
                None => {
                    pending_start.get_or_insert(span.start);
                }
            }
            continue;
        }
        let start = pending_start.take().unwrap_or(span.start);
        result.push(start..span.end);
    }

    result
}

fn merge_adjacent(text: &str, spans: Vec<Range<usize>>, max_chars: usize) -> Vec<Range<usize>> {
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());

    for span in spans {
        if let Some(last) = merged.last_mut() {
            if char_len(&text[last.start..span.end]) <= max_chars {
                last.end = span.end;
                continue;
            }
        }
        merged.push(span);
    }

    merged
}

fn build_chunks(text: &str, spans: Vec<Range<usize>>) -> Vec<TextChunk> {
    let mut offset = 0;
    spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| {
            let content = text[span].to_string();
            let len = char_len(&content);
            let chunk = TextChunk {
                index,
                content,
                char_offset_start: offset,
                char_offset_end: offset + len,
            };
            offset += len;
            chunk
        })
        .collect()
}
