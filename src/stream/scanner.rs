// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Incremental delimiter scanner
//!
//! Splits a growing text stream into prose and tag-delimited spans. The
//! scanner is a two-state machine (outside a tag / inside a tag) that owns
//! the only buffer of the stream. Outside a tag it keeps back at most a
//! partial start marker; inside a tag it remembers how far it has already
//! searched so a long payload is never rescanned from the beginning.

/// Scanner state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Reading prose, looking for a start marker
    OutsideTag,
    /// Reading a payload, looking for the end marker
    InsideTag,
}

/// A piece of scanned output, in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Untagged text
    Prose(String),
    /// Interior of a complete start/end span
    Span(String),
    /// Interior of a span whose end marker never arrived
    Unterminated(String),
}

/// Incremental start/end marker scanner
#[derive(Debug, Clone)]
pub struct DelimiterScanner {
    start_tag: String,
    end_tag: String,
    state: ScanState,
    buffer: String,
    /// Bytes of `buffer` already searched for the end marker
    searched: usize,
}

impl DelimiterScanner {
    /// Create a scanner for the given markers
    pub fn new(start_tag: impl Into<String>, end_tag: impl Into<String>) -> Self {
        Self {
            start_tag: start_tag.into(),
            end_tag: end_tag.into(),
            state: ScanState::OutsideTag,
            buffer: String::new(),
            searched: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Bytes currently held in the buffer
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feed text and return every segment completed by it
    pub fn push(&mut self, text: &str) -> Vec<Segment> {
        self.buffer.push_str(text);
        let mut segments = Vec::new();

        loop {
            match self.state {
                ScanState::OutsideTag => {
                    if let Some(pos) = self.buffer.find(self.start_tag.as_str()) {
                        if pos > 0 {
                            segments.push(Segment::Prose(self.buffer[..pos].to_string()));
                        }
                        self.buffer.drain(..pos + self.start_tag.len());
                        self.state = ScanState::InsideTag;
                        self.searched = 0;
                    } else {
                        let held = partial_suffix_len(&self.buffer, &self.start_tag);
                        let emit = self.buffer.len() - held;
                        if emit > 0 {
                            segments.push(Segment::Prose(self.buffer[..emit].to_string()));
                            self.buffer.drain(..emit);
                        }
                        break;
                    }
                }
                ScanState::InsideTag => {
                    let overlap = self.end_tag.len().saturating_sub(1);
                    let from = floor_char_boundary(&self.buffer, self.searched.saturating_sub(overlap));
                    if let Some(rel) = self.buffer[from..].find(self.end_tag.as_str()) {
                        let pos = from + rel;
                        segments.push(Segment::Span(self.buffer[..pos].to_string()));
                        self.buffer.drain(..pos + self.end_tag.len());
                        self.state = ScanState::OutsideTag;
                        self.searched = 0;
                    } else {
                        self.searched = self.buffer.len();
                        break;
                    }
                }
            }
        }

        segments
    }

    /// Release prose held back as a possible partial start marker.
    ///
    /// Returns `None` inside a tag; a pending payload is never flushed as prose.
    pub fn flush_prose(&mut self) -> Option<Segment> {
        if self.state == ScanState::InsideTag || self.buffer.is_empty() {
            return None;
        }
        Some(Segment::Prose(std::mem::take(&mut self.buffer)))
    }

    /// End of stream: release whatever is left and reset the scanner
    pub fn finish(&mut self) -> Option<Segment> {
        match self.state {
            ScanState::OutsideTag => self.flush_prose(),
            ScanState::InsideTag => {
                self.state = ScanState::OutsideTag;
                self.searched = 0;
                Some(Segment::Unterminated(std::mem::take(&mut self.buffer)))
            }
        }
    }
}

/// Length of the longest proper prefix of `tag` that `buffer` ends with
fn partial_suffix_len(buffer: &str, tag: &str) -> usize {
    let max = tag.len().saturating_sub(1).min(buffer.len());
    (1..=max)
        .rev()
        .find(|&k| {
            tag.is_char_boundary(k)
                && buffer.is_char_boundary(buffer.len() - k)
                && buffer.ends_with(&tag[..k])
        })
        .unwrap_or(0)
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> DelimiterScanner {
        DelimiterScanner::new("<tag>", "</tag>")
    }

    fn feed(scanner: &mut DelimiterScanner, chunks: &[&str]) -> Vec<Segment> {
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(scanner.push(chunk));
        }
        out.extend(scanner.finish());
        out
    }

    /// Merge adjacent prose so chunk boundaries don't matter for comparison
    fn normalize(segments: Vec<Segment>) -> Vec<Segment> {
        let mut out: Vec<Segment> = Vec::new();
        for segment in segments {
            match (out.last_mut(), segment) {
                (Some(Segment::Prose(prev)), Segment::Prose(next)) => prev.push_str(&next),
                (_, segment) => out.push(segment),
            }
        }
        out
    }

    #[test]
    fn test_plain_text_passes_through() {
        let mut s = scanner();
        let out = feed(&mut s, &["Hello ", "world"]);
        assert_eq!(
            out,
            vec![
                Segment::Prose("Hello ".to_string()),
                Segment::Prose("world".to_string())
            ]
        );
    }

    #[test]
    fn test_single_span_with_prose() {
        let mut s = scanner();
        let out = feed(&mut s, &["Before <tag>{\"a\":1}</tag> After"]);
        assert_eq!(
            out,
            vec![
                Segment::Prose("Before ".to_string()),
                Segment::Span("{\"a\":1}".to_string()),
                Segment::Prose(" After".to_string()),
            ]
        );
    }

    #[test]
    fn test_markers_split_across_chunks() {
        let mut s = scanner();
        let out = feed(&mut s, &["Before <t", "ag>{\"a\"", ":1}</ta", "g> After"]);
        assert_eq!(
            normalize(out),
            vec![
                Segment::Prose("Before ".to_string()),
                Segment::Span("{\"a\":1}".to_string()),
                Segment::Prose(" After".to_string()),
            ]
        );
    }

    #[test]
    fn test_partial_marker_is_held_back_then_released() {
        let mut s = scanner();
        assert_eq!(s.push("a <ta"), vec![Segment::Prose("a ".to_string())]);
        assert_eq!(s.buffered_len(), 3);
        assert_eq!(s.push("ble"), vec![Segment::Prose("<table".to_string())]);
        assert_eq!(s.buffered_len(), 0);
    }

    #[test]
    fn test_two_spans_in_one_chunk() {
        let mut s = scanner();
        let out = s.push("<tag>1</tag><tag>2</tag>");
        assert_eq!(
            out,
            vec![
                Segment::Span("1".to_string()),
                Segment::Span("2".to_string())
            ]
        );
        assert_eq!(s.state(), ScanState::OutsideTag);
    }

    #[test]
    fn test_unterminated_span_at_finish() {
        let mut s = scanner();
        assert_eq!(s.push("x <tag>{\"a\":"), vec![Segment::Prose("x ".to_string())]);
        assert_eq!(s.state(), ScanState::InsideTag);
        assert_eq!(
            s.finish(),
            Some(Segment::Unterminated("{\"a\":".to_string()))
        );
        assert_eq!(s.state(), ScanState::OutsideTag);
        assert_eq!(s.finish(), None);
    }

    #[test]
    fn test_flush_prose_only_outside_tag() {
        let mut s = scanner();
        s.push("text <");
        assert_eq!(s.flush_prose(), Some(Segment::Prose("<".to_string())));

        s.push("<tag>{");
        assert_eq!(s.flush_prose(), None);
        assert_eq!(s.state(), ScanState::InsideTag);
    }

    #[test]
    fn test_end_marker_split_after_long_payload() {
        let mut s = scanner();
        s.push("<tag>");
        let payload = "x".repeat(1000);
        assert!(s.push(&payload).is_empty());
        assert!(s.push("</t").is_empty());
        assert_eq!(s.push("ag>"), vec![Segment::Span(payload)]);
    }

    #[test]
    fn test_multibyte_text_around_markers() {
        let mut s = scanner();
        let out = feed(&mut s, &["世界 <", "tag>é</tag> 🎉"]);
        assert_eq!(
            normalize(out),
            vec![
                Segment::Prose("世界 ".to_string()),
                Segment::Span("é".to_string()),
                Segment::Prose(" 🎉".to_string()),
            ]
        );
    }

    #[test]
    fn test_partial_suffix_len() {
        assert_eq!(partial_suffix_len("abc <ta", "<tag>"), 3);
        assert_eq!(partial_suffix_len("abc", "<tag>"), 0);
        assert_eq!(partial_suffix_len("<tag", "<tag>"), 4);
        assert_eq!(partial_suffix_len("", "<tag>"), 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn chunked(input: &str, cuts: &[usize]) -> Vec<String> {
            let chars: Vec<char> = input.chars().collect();
            let mut points: Vec<usize> = cuts.iter().map(|c| c % (chars.len() + 1)).collect();
            points.push(0);
            points.push(chars.len());
            points.sort_unstable();
            points.dedup();
            points
                .windows(2)
                .map(|w| chars[w[0]..w[1]].iter().collect())
                .collect()
        }

        proptest! {
            #[test]
            fn chunking_does_not_change_segments(
                parts in proptest::collection::vec(
                    prop_oneof![
                        "[a-z <>/é]{0,12}",
                        Just("<tag>".to_string()),
                        Just("</tag>".to_string()),
                    ],
                    0..12,
                ),
                cuts in proptest::collection::vec(0usize..200, 0..10),
            ) {
                let input: String = parts.concat();

                let mut whole = scanner();
                let expected = normalize(feed(&mut whole, &[input.as_str()]));

                let pieces = chunked(&input, &cuts);
                let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
                let mut split = scanner();
                let actual = normalize(feed(&mut split, &refs));

                prop_assert_eq!(expected, actual);
            }
        }
    }
}
