//! Resumable statement splitter.
//!
//! Text arrives in arbitrary pieces. The splitter appends each piece to an
//! internal buffer, scans only the bytes it has not scanned before, and yields
//! every statement whose terminator it has seen. Bytes after the last
//! terminator stay buffered until more text arrives or the input ends.
//!
//! Terminators inside quoted strings, quoted identifiers, `--` line comments,
//! `/* */` block comments and `CREATE TRIGGER ... END` bodies are ignored.
//! Scanning never commits to a decision that depends on a byte it has not
//! seen yet, so feeding the same text in any split produces the same
//! statements.
//!
//! A splitter built with a size limit measures each statement over its whole
//! span, terminator and preceding comments included. A statement above the
//! limit is yielded as [`Split::Oversized`] with only its head kept, and once
//! the buffered fragment passes the limit its middle is dropped as scanning
//! goes on. Both depend only on the text, never on where it was split.

use regex::Regex;
use std::sync::OnceLock;

/// Statement terminator.
pub const TERMINATOR: char = ';';

/// Bytes kept from the start of an oversized statement.
const HEAD_BYTES: usize = 4096;

/// Scanned bytes kept at the end of an oversized fragment.
const TAIL_BYTES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    SingleQuote,
    DoubleQuote,
    Backtick,
    Bracket,
    LineComment,
    BlockComment,
}

/// One unit yielded by the splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Split {
    /// Complete statement, leading trivia removed, terminator included
    Statement(String),
    /// Statement whose span exceeded the size limit
    Oversized {
        /// Leading text of the statement, trivia removed
        head: String,
        /// Full span in bytes
        bytes: usize,
    },
}

impl Split {
    /// Statement text, `None` for an oversized statement.
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Statement(text) => Some(text),
            Self::Oversized { .. } => None,
        }
    }
}

impl PartialEq<&str> for Split {
    fn eq(&self, other: &&str) -> bool {
        self.statement() == Some(*other)
    }
}

/// Incremental splitter over a growing text buffer.
///
/// # Example
/// ```rust
/// use dbferry_core::splitter::StatementSplitter;
///
/// let mut splitter = StatementSplitter::new();
/// assert!(splitter.push("INSERT INTO t VALUES ('a;").is_empty());
/// let statements = splitter.push("b');\nSELECT");
/// assert_eq!(statements, vec!["INSERT INTO t VALUES ('a;b');"]);
/// assert_eq!(splitter.pending(), "\nSELECT");
/// ```
#[derive(Debug)]
pub struct StatementSplitter {
    buffer: String,
    scan_pos: usize,
    stmt_start: usize,
    state: ScanState,
    limit: Option<usize>,
    /// Bytes of the current statement dropped from the buffer
    elided: usize,
    /// End of the kept head once bytes have been dropped
    head_end: usize,
}

impl Default for StatementSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSplitter {
    /// Creates an empty splitter without a size limit.
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            scan_pos: 0,
            stmt_start: 0,
            state: ScanState::Normal,
            limit: None,
            elided: 0,
            head_end: 0,
        }
    }

    /// Creates an empty splitter that reports statements spanning more than
    /// `limit` bytes as [`Split::Oversized`].
    pub fn with_max_statement_bytes(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new()
        }
    }

    /// Appends text and returns the statements completed by it.
    ///
    /// Returned statements have leading whitespace and comments removed and
    /// end with the terminator. Empty statements (a bare `;`) are dropped.
    pub fn push(&mut self, text: &str) -> Vec<Split> {
        self.buffer.push_str(text);
        let statements = self.scan();
        self.compact();
        self.elide();
        statements
    }

    /// The unterminated tail currently buffered.
    pub fn pending(&self) -> &str {
        &self.buffer[self.stmt_start..]
    }

    /// Size in bytes of the unterminated tail, dropped bytes included.
    pub fn pending_len(&self) -> usize {
        self.buffer
            .len()
            .saturating_sub(self.stmt_start)
            .saturating_add(self.elided)
    }

    /// Consumes the splitter at end of input.
    ///
    /// Returns the trailing fragment if anything other than whitespace and
    /// comments remains after the last terminator.
    pub fn finish(self) -> Option<Split> {
        settle(self.pending(), self.elided, self.head_end, self.limit)
    }

    fn scan(&mut self) -> Vec<Split> {
        let mut statements = Vec::new();
        let bytes = self.buffer.as_bytes();
        let len = bytes.len();
        let mut i = self.scan_pos;

        while i < len {
            let b = bytes[i];
            let next = bytes.get(i.saturating_add(1)).copied();

            match self.state {
                ScanState::Normal => match b {
                    b'\'' => self.state = ScanState::SingleQuote,
                    b'"' => self.state = ScanState::DoubleQuote,
                    b'`' => self.state = ScanState::Backtick,
                    b'[' => self.state = ScanState::Bracket,
                    b'-' | b'/' => {
                        let opener = if b == b'-' { b'-' } else { b'*' };
                        match next {
                            // Need one more byte to tell a comment from an operator
                            None => break,
                            Some(n) if n == opener => {
                                self.state = if b == b'-' {
                                    ScanState::LineComment
                                } else {
                                    ScanState::BlockComment
                                };
                                i = i.saturating_add(2);
                                continue;
                            }
                            Some(_) => {}
                        }
                    }
                    b';' => {
                        let candidate = &self.buffer[self.stmt_start..i];
                        if !inside_trigger_body(candidate) {
                            let end = i.saturating_add(1);
                            let raw = &self.buffer[self.stmt_start..end];
                            if let Some(split) =
                                settle(raw, self.elided, self.head_end, self.limit)
                            {
                                statements.push(split);
                            }
                            self.stmt_start = end;
                            self.elided = 0;
                            self.head_end = 0;
                        }
                    }
                    _ => {}
                },
                ScanState::SingleQuote => {
                    // A doubled quote leaves and immediately re-enters the string
                    if b == b'\'' {
                        self.state = ScanState::Normal;
                    }
                }
                ScanState::DoubleQuote => {
                    if b == b'"' {
                        self.state = ScanState::Normal;
                    }
                }
                ScanState::Backtick => {
                    if b == b'`' {
                        self.state = ScanState::Normal;
                    }
                }
                ScanState::Bracket => {
                    if b == b']' {
                        self.state = ScanState::Normal;
                    }
                }
                ScanState::LineComment => {
                    if b == b'\n' {
                        self.state = ScanState::Normal;
                    }
                }
                ScanState::BlockComment => {
                    if b == b'*' {
                        match next {
                            None => break,
                            Some(b'/') => {
                                self.state = ScanState::Normal;
                                i = i.saturating_add(2);
                                continue;
                            }
                            Some(_) => {}
                        }
                    }
                }
            }
            i = i.saturating_add(1);
        }

        self.scan_pos = i;
        statements
    }

    /// Drops the settled prefix; everything after the last terminator is kept.
    fn compact(&mut self) {
        if self.stmt_start > 0 {
            self.buffer.drain(..self.stmt_start);
            self.scan_pos = self.scan_pos.saturating_sub(self.stmt_start);
            self.stmt_start = 0;
        }
    }

    /// Drops the scanned middle of a fragment that has outgrown the limit.
    ///
    /// The head is kept for the excerpt and the trigger header check. The
    /// kept tail starts at a non-letter so the word before the next
    /// terminator stays whole.
    fn elide(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        if self.pending_len() <= limit {
            return;
        }
        let scanned = &self.buffer[self.stmt_start..self.scan_pos];
        let from = if self.elided > 0 {
            self.head_end
        } else {
            floor_boundary(scanned, HEAD_BYTES)
        };
        let tail_at = floor_boundary(scanned, scanned.len().saturating_sub(TAIL_BYTES));
        if tail_at <= from {
            return;
        }
        let to = scanned[from..tail_at]
            .rfind(|c: char| c.is_ascii() && !c.is_ascii_alphabetic())
            .map_or(tail_at, |pos| from.saturating_add(pos));
        if to <= from {
            return;
        }

        let dropped = to.saturating_sub(from);
        let start = self.stmt_start.saturating_add(from);
        self.buffer.drain(start..start.saturating_add(dropped));
        self.scan_pos = self.scan_pos.saturating_sub(dropped);
        self.elided = self.elided.saturating_add(dropped);
        self.head_end = from;
    }
}

/// Turns a terminated span (or the final tail) into a [`Split`].
fn settle(raw: &str, elided: usize, head_end: usize, limit: Option<usize>) -> Option<Split> {
    let bytes = raw.len().saturating_add(elided);
    match limit {
        Some(max) if bytes > max => {
            let head_end = if elided > 0 {
                head_end
            } else {
                floor_boundary(raw, HEAD_BYTES)
            };
            let head = strip_leading_trivia(&raw[..head_end]);
            Some(Split::Oversized {
                head: head.to_string(),
                bytes,
            })
        }
        _ => clean_statement(raw).map(Split::Statement),
    }
}

/// Largest char boundary of `text` at or below `index`.
fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index = index.saturating_sub(1);
    }
    index
}

/// Splits a complete text into statements plus the unterminated remainder.
///
/// Pure convenience wrapper over an unlimited [`StatementSplitter`].
pub fn split_statements(text: &str) -> (Vec<String>, String) {
    let mut splitter = StatementSplitter::new();
    let statements = splitter
        .push(text)
        .into_iter()
        .filter_map(|split| match split {
            Split::Statement(statement) => Some(statement),
            Split::Oversized { .. } => None,
        })
        .collect();
    (statements, splitter.pending().to_string())
}

/// Removes leading whitespace, `--` line comments and `/* */` block comments.
pub fn strip_leading_trivia(mut text: &str) -> &str {
    loop {
        text = text.trim_start();
        if let Some(rest) = text.strip_prefix("--") {
            text = match rest.find('\n') {
                Some(pos) => &rest[pos..],
                None => "",
            };
        } else if let Some(rest) = text.strip_prefix("/*") {
            text = match rest.find("*/") {
                Some(pos) => &rest[pos.saturating_add(2)..],
                None => "",
            };
        } else {
            return text;
        }
    }
}

fn clean_statement(raw: &str) -> Option<String> {
    let text = strip_leading_trivia(raw).trim_end();
    if text.is_empty() || text == ";" {
        None
    } else {
        Some(text.to_string())
    }
}

fn trigger_header() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)^CREATE\s+(?:TEMP\s+|TEMPORARY\s+)?TRIGGER\b")
            .expect("Invalid trigger header pattern")
    })
}

/// True when `candidate` is an open `CREATE TRIGGER` whose body has not
/// reached its closing `END` yet.
fn inside_trigger_body(candidate: &str) -> bool {
    let text = strip_leading_trivia(candidate);
    if !trigger_header().is_match(text) {
        return false;
    }
    let trimmed = text.trim_end();
    let word_start = trimmed
        .rfind(|c: char| !c.is_ascii_alphabetic())
        .map_or(0, |pos| pos.saturating_add(1));
    !trimmed[word_start..].eq_ignore_ascii_case("END")
}
