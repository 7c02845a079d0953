//! Character-window chunking for bill text.
//!
//! Bill text is split into windows of at most `chunk_size` characters before indexing.
//! Highlights:
//!
//! - Boundary pullback: a window that would end mid-sentence is shortened to the nearest preceding
//!   section marker (past 70% of the window), else paragraph break (past 70%), else sentence break
//!   (past 50%). It never shrinks past the window start.
//! - Overlap: the next window starts `overlap` characters before the previous end, but always
//!   strictly after the previous start, so the loop terminates for every `overlap < chunk_size`.
//! - Offsets are character offsets, never byte offsets, so multi-byte text is never split inside
//!   a code point.

use super::types::{ChunkSettings, ChunkingError};

const SECTION_MARKERS: [&str; 2] = ["SEC. ", "SECTION "];
const SECTION_PULLBACK: f64 = 0.7;
const PARAGRAPH_PULLBACK: f64 = 0.7;
const SENTENCE_PULLBACK: f64 = 0.5;

/// One window of the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Character offset where the window starts.
    pub start: usize,
    /// Character offset one past the window end.
    pub end: usize,
    /// Window text, untrimmed.
    pub text: String,
}

/// Split `text` into trimmed, non-empty chunks in read order.
pub fn chunk_text(text: &str, settings: ChunkSettings) -> Result<Vec<String>, ChunkingError> {
    Ok(chunk_spans(text, settings)?
        .into_iter()
        .map(|span| span.text.trim().to_string())
        .collect())
}

/// Split `text` into windows, keeping their character offsets.
///
/// Windows whose text is blank are dropped. Text no longer than `chunk_size` yields one window.
pub fn chunk_spans(text: &str, settings: ChunkSettings) -> Result<Vec<ChunkSpan>, ChunkingError> {
    settings.validate()?;
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    if len <= settings.chunk_size {
        return Ok(vec![ChunkSpan {
            start: 0,
            end: len,
            text: text.to_string(),
        }]);
    }

    let mut spans = Vec::with_capacity(len / (settings.chunk_size - settings.overlap) + 1);
    let mut start = 0;
    while start < len {
        let naive_end = (start + settings.chunk_size).min(len);
        let end = if naive_end < len {
            pull_back_boundary(&chars, start, naive_end)
        } else {
            naive_end
        };

        let window: String = chars[start..end].iter().collect();
        if !window.trim().is_empty() {
            spans.push(ChunkSpan {
                start,
                end,
                text: window,
            });
        }

        if end >= len {
            break;
        }
        start = next_start(start, end, settings.overlap);
    }

    Ok(spans)
}

fn next_start(start: usize, end: usize, overlap: usize) -> usize {
    let overlapped = end.saturating_sub(overlap);
    if overlapped > start { overlapped } else { end }
}

/// Choose where a window starting at `start` with naive end `end` should stop.
fn pull_back_boundary(chars: &[char], start: usize, end: usize) -> usize {
    if is_clean_boundary(chars, end) {
        return end;
    }
    let width = end - start;
    let floor = |ratio: f64| start + ((width as f64) * ratio).ceil() as usize;

    if let Some(position) = last_section_marker(chars, floor(SECTION_PULLBACK), end) {
        return position;
    }
    if let Some(position) = last_paragraph_break(chars, floor(PARAGRAPH_PULLBACK), end) {
        return position;
    }
    if let Some(position) = last_sentence_break(chars, floor(SENTENCE_PULLBACK), end) {
        return position;
    }
    end
}

/// A boundary is clean when it falls between a sentence terminator and whitespace.
fn is_clean_boundary(chars: &[char], end: usize) -> bool {
    end == 0
        || end >= chars.len()
        || (is_sentence_terminator(chars[end - 1]) && chars[end].is_whitespace())
}

fn last_section_marker(chars: &[char], floor: usize, end: usize) -> Option<usize> {
    (floor.max(1)..end).rev().find(|&position| {
        chars[position - 1].is_whitespace()
            && SECTION_MARKERS
                .iter()
                .any(|marker| starts_with_at(chars, position, marker))
    })
}

fn last_paragraph_break(chars: &[char], floor: usize, end: usize) -> Option<usize> {
    (floor.max(2)..end)
        .rev()
        .find(|&position| chars[position - 1] == '\n' && chars[position - 2] == '\n')
}

fn last_sentence_break(chars: &[char], floor: usize, end: usize) -> Option<usize> {
    (floor.max(1)..end).rev().find(|&position| {
        is_sentence_terminator(chars[position - 1]) && chars[position].is_whitespace()
    })
}

fn starts_with_at(chars: &[char], position: usize, marker: &str) -> bool {
    let mut index = position;
    for expected in marker.chars() {
        match chars.get(index) {
            Some(&actual) if actual == expected => index += 1,
            _ => return false,
        }
    }
    true
}

fn is_sentence_terminator(c: char) -> bool {
    matches!(c, '.' | '?' | '!' | ';')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(chunk_size: usize, overlap: usize) -> ChunkSettings {
        ChunkSettings {
            chunk_size,
            overlap,
        }
    }

    /// Concatenate the part of each span that the next span does not repeat.
    fn reconstruct(spans: &[ChunkSpan], text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut rebuilt = String::new();
        for (position, span) in spans.iter().enumerate() {
            let stop = spans
                .get(position + 1)
                .map(|next| next.start)
                .unwrap_or(span.end);
            rebuilt.extend(&chars[span.start..stop]);
        }
        rebuilt
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("The Act may be cited as the Test Act.", settings(2000, 200))
            .expect("chunked");
        assert_eq!(chunks, vec!["The Act may be cited as the Test Act."]);
    }

    #[test]
    fn blank_text_yields_nothing() {
        assert!(chunk_text("   \n ", settings(10, 2)).unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_settings() {
        assert_eq!(
            chunk_text("text", settings(0, 0)).unwrap_err(),
            ChunkingError::InvalidChunkSize
        );
        assert!(matches!(
            chunk_text("text", settings(5, 5)).unwrap_err(),
            ChunkingError::InvalidOverlap { .. }
        ));
    }

    #[test]
    fn long_text_round_trips_through_non_overlapping_prefixes() {
        let sentence = "The Secretary shall submit a report to Congress. ";
        let text = sentence.repeat(200);
        let spans = chunk_spans(&text, settings(500, 50)).expect("chunked");
        assert!(spans.len() > 1);
        assert_eq!(reconstruct(&spans, &text), text);
        for span in &spans {
            assert!(span.end - span.start <= 500);
        }
    }

    #[test]
    fn text_without_breaks_round_trips() {
        let text = "x".repeat(1234);
        let spans = chunk_spans(&text, settings(100, 99)).expect("chunked");
        assert_eq!(spans.last().map(|span| span.end), Some(1234));
        assert_eq!(reconstruct(&spans, &text), text);
    }

    #[test]
    fn window_count_stays_within_iteration_bound() {
        let cases = [(10_000, 2000, 200), (1234, 100, 99), (5000, 7, 6), (3001, 100, 10)];
        for (length, size, overlap) in cases {
            let text = "x".repeat(length);
            let spans = chunk_spans(&text, settings(size, overlap)).expect("chunked");
            let bound = length.div_ceil(size - overlap);
            assert!(spans.len() <= bound, "{length}/{size}/{overlap}: {} > {bound}", spans.len());
            assert_eq!(reconstruct(&spans, &text), text);
        }
    }

    #[test]
    fn pulled_back_windows_still_advance() {
        // Pullback keeps at least half a window, so each step covers half a window minus overlap.
        let cases = [(10_000, 2000, 200), (3000, 100, 10), (999, 2, 1), (64, 3, 2)];
        for (length, size, overlap) in cases {
            let text = "ab. ".repeat(length / 4 + 1).trim_end().to_string();
            let total = text.chars().count();
            let spans = chunk_spans(&text, settings(size, overlap)).expect("chunked");
            let step = size.div_ceil(2).saturating_sub(overlap).max(1);
            let bound = total.div_ceil(step);
            assert!(spans.len() <= bound, "{length}/{size}/{overlap}: {} > {bound}", spans.len());
            assert_eq!(reconstruct(&spans, &text), text);
        }
    }

    #[test]
    fn pulls_boundary_back_to_section_marker() {
        let head = "a".repeat(80);
        let text = format!("{head} SEC. 2. More text follows here and keeps going on.");
        let spans = chunk_spans(&text, settings(90, 0)).expect("chunked");
        assert!(spans[1].text.starts_with("SEC. 2."), "{:?}", spans[1].text);
    }

    #[test]
    fn pulls_boundary_back_to_sentence_end() {
        let text = "First sentence is here. Second sentence runs much longer than the window allows.";
        let spans = chunk_spans(text, settings(40, 0)).expect("chunked");
        assert_eq!(spans[0].text, "First sentence is here.");
    }

    #[test]
    fn keeps_multibyte_characters_intact() {
        let text = "é".repeat(25);
        let chunks = chunk_text(&text, settings(10, 3)).expect("chunked");
        assert!(chunks.iter().all(|chunk| chunk.chars().all(|c| c == 'é')));
        assert_eq!(chunks[0].chars().count(), 10);
    }
}
