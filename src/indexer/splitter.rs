//! Token-bounded splitting of candidate chunks
//!
//! A candidate that fits the budget passes through untouched. Anything
//! larger is cut into line windows packed greedily up to the budget, each
//! window repeating the tail of the previous one's new lines as context.

use crate::embedding::TokenCounter;
use crate::error::{ChunkingError, EmbeddingError};

/// One bounded piece of a candidate chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub text: String,
    pub token_count: usize,
    /// Leading lines repeated from the previous window
    pub overlap_lines: usize,
    /// Lines this window contributes for the first time
    pub new_lines: usize,
    /// A single line that alone exceeds the budget
    pub oversized: bool,
}

/// Splits text into windows of at most `max_tokens` tokens
pub struct RecursiveSplitter<'a> {
    counter: &'a dyn TokenCounter,
    max_tokens: usize,
    overlap_lines: usize,
}

impl<'a> RecursiveSplitter<'a> {
    pub fn new(
        counter: &'a dyn TokenCounter,
        max_tokens: usize,
        overlap_lines: usize,
    ) -> Result<Self, ChunkingError> {
        if max_tokens == 0 {
            return Err(ChunkingError::InvalidTokenBudget(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            counter,
            max_tokens,
            overlap_lines,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Lazily produce the windows covering `text`
    pub fn split<'t>(&'t self, text: &'t str) -> LineWindows<'t> {
        LineWindows {
            splitter: self,
            text,
            lines: Vec::new(),
            state: State::Start,
            cursor: 0,
            previous_new: 0,
        }
    }

    fn count(&self, text: &str) -> Result<usize, EmbeddingError> {
        self.counter.count_tokens(text)
    }
}

enum State {
    Start,
    Lines,
    Done,
}

/// Iterator over the windows of one text
pub struct LineWindows<'t> {
    splitter: &'t RecursiveSplitter<'t>,
    text: &'t str,
    lines: Vec<&'t str>,
    state: State,
    cursor: usize,
    previous_new: usize,
}

impl<'t> LineWindows<'t> {
    fn whole_or_lines(&mut self) -> Result<Option<Window>, EmbeddingError> {
        let token_count = self.splitter.count(self.text)?;
        if token_count <= self.splitter.max_tokens {
            self.state = State::Done;
            return Ok(Some(Window {
                text: self.text.to_string(),
                token_count,
                overlap_lines: 0,
                new_lines: self.text.lines().count(),
                oversized: false,
            }));
        }

        self.lines = self.text.lines().collect();
        self.state = State::Lines;
        self.next_window()
    }

    /// Next window after the cursor
    ///
    /// The window opens with up to `overlap_lines` of the previous window's
    /// new lines. The token budget takes precedence over that overlap: when
    /// the first new line does not fit behind the full prefix, prefix lines
    /// are dropped from the front until it does, so such a window repeats
    /// fewer than `min(overlap_lines, previous new lines)` lines. Only a
    /// single line that exceeds the budget on its own is emitted over it.
    fn next_window(&mut self) -> Result<Option<Window>, EmbeddingError> {
        if self.cursor >= self.lines.len() {
            self.state = State::Done;
            return Ok(None);
        }

        let max = self.splitter.max_tokens;
        let prefix = self.previous_new.min(self.splitter.overlap_lines);
        let mut start = self.cursor - prefix;

        let (mut end, mut fitted) = self.pack(start, self.cursor)?;

        if end == self.cursor {
            // Not even one new line fits: shed overlap until it does
            let mut found = None;
            for trimmed_start in (start + 1)..=self.cursor {
                let text = self.lines[trimmed_start..=self.cursor].join("\n");
                let count = self.splitter.count(&text)?;
                if count <= max {
                    found = Some((trimmed_start, text, count));
                    break;
                }
            }

            match found {
                Some((trimmed_start, text, count)) => {
                    start = trimmed_start;
                    fitted = Some((text, count));
                    let (packed_end, packed) = self.pack(start, self.cursor + 1)?;
                    end = packed_end;
                    if packed.is_some() {
                        fitted = packed;
                    }
                }
                None => {
                    let line = self.lines[self.cursor];
                    let count = self.splitter.count(line)?;
                    tracing::warn!(
                        "Line of {} tokens exceeds the {} token budget, emitting it alone",
                        count,
                        max
                    );
                    self.cursor += 1;
                    self.previous_new = 1;
                    return Ok(Some(Window {
                        text: line.to_string(),
                        token_count: count,
                        overlap_lines: 0,
                        new_lines: 1,
                        oversized: true,
                    }));
                }
            }
        }

        let (text, token_count) = match fitted {
            Some(fitted) => fitted,
            None => return Ok(None),
        };

        let new_lines = end - self.cursor;
        let window = Window {
            text,
            token_count,
            overlap_lines: self.cursor - start,
            new_lines,
            oversized: false,
        };

        tracing::debug!(
            "Window of {} lines ({} overlap), {} tokens",
            window.overlap_lines + window.new_lines,
            window.overlap_lines,
            window.token_count
        );

        self.cursor = end;
        self.previous_new = new_lines;
        Ok(Some(window))
    }

    /// Extend `lines[start..from]` one line at a time while it fits.
    ///
    /// Returns the exclusive end and the last fitting text with its count.
    fn pack(
        &self,
        start: usize,
        from: usize,
    ) -> Result<(usize, Option<(String, usize)>), EmbeddingError> {
        let mut end = from;
        let mut fitted = None;

        while end < self.lines.len() {
            let text = self.lines[start..=end].join("\n");
            let count = self.splitter.count(&text)?;
            if count > self.splitter.max_tokens {
                break;
            }
            fitted = Some((text, count));
            end += 1;
        }

        Ok((end, fitted))
    }
}

impl Iterator for LineWindows<'_> {
    type Item = Result<Window, EmbeddingError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = match self.state {
            State::Done => return None,
            State::Start => self.whole_or_lines(),
            State::Lines => self.next_window(),
        };

        match result {
            Ok(Some(window)) => Some(Ok(window)),
            Ok(None) => None,
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One token per whitespace-separated word
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count_tokens(&self, text: &str) -> Result<usize, EmbeddingError> {
            Ok(text.split_whitespace().count())
        }
    }

    struct FailingCounter;

    impl TokenCounter for FailingCounter {
        fn count_tokens(&self, _text: &str) -> Result<usize, EmbeddingError> {
            Err(EmbeddingError::TokenizationFailed("boom".to_string()))
        }
    }

    fn windows(text: &str, max: usize, overlap: usize) -> Vec<Window> {
        let splitter = RecursiveSplitter::new(&WordCounter, max, overlap).unwrap();
        splitter.split(text).collect::<Result<Vec<_>, _>>().unwrap()
    }

    fn numbered(n: usize, words_per_line: usize) -> String {
        (1..=n)
            .map(|i| {
                std::iter::repeat_n(format!("l{}", i), words_per_line)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Drop each window's overlap prefix and rejoin
    fn reconstruct(windows: &[Window]) -> Vec<String> {
        windows
            .iter()
            .flat_map(|w| {
                w.text
                    .split('\n')
                    .skip(w.overlap_lines)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_small_text_passes_through_unchanged() {
        let text = "public void Run()\n{\n}\n";
        let result = windows(text, 100, 5);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, text);
        assert_eq!(result[0].overlap_lines, 0);
        assert!(!result[0].oversized);
    }

    #[test]
    fn test_every_window_respects_budget() {
        let text = numbered(60, 3);
        let result = windows(&text, 20, 5);
        assert!(result.len() > 1);
        for window in &result {
            assert!(window.token_count <= 20, "{:?}", window);
            assert_eq!(window.token_count, window.text.split_whitespace().count());
        }
    }

    #[test]
    fn test_coverage_reconstructs_all_lines() {
        let text = numbered(40, 2);
        let result = windows(&text, 15, 5);
        let original: Vec<String> = text.lines().map(str::to_string).collect();
        assert_eq!(reconstruct(&result), original);
    }

    #[test]
    fn test_overlap_repeats_previous_new_lines() {
        let text = numbered(50, 2);
        let result = windows(&text, 24, 5);
        assert!(result.len() >= 3);

        for pair in result.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let prev_lines: Vec<&str> = prev.text.split('\n').collect();
            let prev_new = &prev_lines[prev.overlap_lines..];
            let expected = prev_new.len().min(5);
            assert_eq!(next.overlap_lines, expected);

            let next_lines: Vec<&str> = next.text.split('\n').collect();
            assert_eq!(
                &next_lines[..expected],
                &prev_new[prev_new.len() - expected..]
            );
        }
    }

    #[test]
    fn test_first_window_has_no_prefix() {
        let result = windows(&numbered(30, 2), 10, 5);
        assert_eq!(result[0].overlap_lines, 0);
        assert!(result[0].text.starts_with("l1 l1"));
    }

    #[test]
    fn test_blank_lines_are_preserved() {
        let text = "a b c\n\nd e f\n\ng h i\n\nj k l";
        let result = windows(text, 6, 1);
        let original: Vec<String> = text.lines().map(str::to_string).collect();
        assert_eq!(reconstruct(&result), original);
    }

    #[test]
    fn test_oversized_line_emitted_alone_and_flagged() {
        let long_line = vec!["w"; 30].join(" ");
        let text = format!("a b\n{}\nc d", long_line);
        let result = windows(&text, 10, 5);

        let oversized: Vec<_> = result.iter().filter(|w| w.oversized).collect();
        assert_eq!(oversized.len(), 1);
        assert_eq!(oversized[0].text, long_line);
        assert_eq!(oversized[0].token_count, 30);

        for window in result.iter().filter(|w| !w.oversized) {
            assert!(window.token_count <= 10);
        }
        let original: Vec<String> = text.lines().map(str::to_string).collect();
        assert_eq!(reconstruct(&result), original);
    }

    #[test]
    fn test_overlap_is_shed_when_next_line_would_not_fit() {
        // Line 2 fits alone but not together with line 1 as overlap
        let text = "a b c d\ne f g h i j\nk";
        let result = windows(text, 7, 5);
        assert_eq!(result[0].text, "a b c d");
        assert_eq!(result[1].overlap_lines, 0);
        assert!(result[1].text.starts_with("e f g h i j"));
        for window in &result {
            assert!(window.token_count <= 7);
        }
    }

    #[test]
    fn test_zero_overlap() {
        let text = numbered(12, 2);
        let result = windows(&text, 6, 0);
        assert!(result.iter().all(|w| w.overlap_lines == 0));
        let original: Vec<String> = text.lines().map(str::to_string).collect();
        assert_eq!(reconstruct(&result), original);
    }

    #[test]
    fn test_zero_budget_rejected() {
        assert!(RecursiveSplitter::new(&WordCounter, 0, 5).is_err());
    }

    #[test]
    fn test_counter_error_ends_iteration() {
        let splitter = RecursiveSplitter::new(&FailingCounter, 10, 5).unwrap();
        let mut iter = splitter.split("a\nb");
        assert!(matches!(
            iter.next(),
            Some(Err(EmbeddingError::TokenizationFailed(_)))
        ));
        assert!(iter.next().is_none());
    }
}
