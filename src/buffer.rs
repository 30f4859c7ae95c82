//! Character cursor shared by the Izu and template parsers.
//!
//! [`ScanBuffer`] owns a normalized copy of the input text and a cursor
//! position with line/column tracking. Both parsers are built on the same
//! three primitives: literal prefix matching ([`ScanBuffer::starts_with`]),
//! skip-to-a-delimiter ([`ScanBuffer::skip_until`]) and whitespace-delimited
//! token reading ([`ScanBuffer::next_token`]).
//!
//! None of the primitives fail. Malformed input yields empty or partial
//! results; it is the calling parser that decides whether that violates its
//! grammar.

/// Cursor over an immutable text buffer.
///
/// Line endings are normalized to `\n` at construction (`\r\n` and bare
/// `\r` both collapse), so line counting only ever looks for one separator.
/// Line and column are 1-based and always describe the current cursor
/// position. The cursor only moves forward.
#[derive(Debug)]
pub struct ScanBuffer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl ScanBuffer {
    pub fn new(text: &str) -> Self {
        let mut chars = Vec::with_capacity(text.len());
        let mut iter = text.chars().peekable();
        while let Some(c) = iter.next() {
            if c == '\r' {
                if iter.peek() == Some(&'\n') {
                    iter.next();
                }
                chars.push('\n');
            } else {
                chars.push(c);
            }
        }
        Self {
            chars,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Current character without consuming it.
    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Advance the cursor by `n` characters, keeping line/column in sync.
    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            match self.chars.get(self.pos) {
                Some('\n') => {
                    self.line += 1;
                    self.column = 1;
                }
                Some(_) => self.column += 1,
                None => return,
            }
            self.pos += 1;
        }
    }

    /// Does `word` match literally at the cursor?
    ///
    /// With `require_trailing_ws`, the character after the match must be
    /// whitespace (or end of input). With `consume`, a successful match
    /// advances past the word and, when trailing whitespace was required,
    /// past the whitespace run as well.
    ///
    /// An empty `word` or an exhausted buffer never matches.
    pub fn starts_with(&mut self, word: &str, require_trailing_ws: bool, consume: bool) -> bool {
        if word.is_empty() || self.at_end() {
            return false;
        }
        let mut len = 0;
        for c in word.chars() {
            if self.chars.get(self.pos + len) != Some(&c) {
                return false;
            }
            len += 1;
        }
        if require_trailing_ws {
            match self.chars.get(self.pos + len) {
                Some(c) if !c.is_whitespace() => return false,
                _ => {}
            }
        }
        if consume {
            self.advance(len);
            if require_trailing_ws {
                while self.peek().is_some_and(|c| c.is_whitespace()) {
                    self.advance(1);
                }
            }
        }
        true
    }

    /// Advance to the first occurrence of `word`, returning everything
    /// skipped. The word itself is not consumed. If the word does not occur,
    /// the rest of the buffer is consumed and returned.
    ///
    /// Empty `word`, exhausted buffer, or `word` already at the cursor all
    /// skip nothing and return an empty string.
    pub fn skip_until(&mut self, word: &str) -> String {
        if word.is_empty() || self.at_end() {
            return String::new();
        }
        let needle: Vec<char> = word.chars().collect();
        let end = self.find_from(self.pos, &needle).unwrap_or(self.chars.len());
        let skipped: String = self.chars[self.pos..end].iter().collect();
        self.advance(end - self.pos);
        skipped
    }

    fn find_from(&self, start: usize, needle: &[char]) -> Option<usize> {
        if needle.is_empty() || needle.len() > self.chars.len() {
            return None;
        }
        (start..=self.chars.len() - needle.len()).find(|&i| self.chars[i..i + needle.len()] == *needle)
    }

    /// Read the next whitespace-delimited token, consuming it.
    ///
    /// Leading whitespace and line separators are skipped. The token ends
    /// before the next whitespace, separator, or `[[`/`]]` marker. A marker
    /// or whitespace unit sitting directly under the cursor with no token
    /// characters read yet is consumed and skipped, so runs of pure
    /// whitespace and marker-adjacent tokens both scan cleanly.
    ///
    /// Returns an empty string at end of input.
    pub fn next_token(&mut self) -> String {
        let mut token = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                if !token.is_empty() {
                    break;
                }
                self.advance(1);
                continue;
            }
            if self.at_marker() {
                if !token.is_empty() {
                    break;
                }
                self.advance(2);
                continue;
            }
            token.push(c);
            self.advance(1);
        }
        token
    }

    fn at_marker(&self) -> bool {
        matches!(
            (self.chars.get(self.pos), self.chars.get(self.pos + 1)),
            (Some('['), Some('[')) | (Some(']'), Some(']'))
        )
    }
}
