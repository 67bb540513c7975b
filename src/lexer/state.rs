use super::IndentStyle;
use regex::{Captures, Regex};

/// Mutable lex state: the normalized source plus the cursor over it.
///
/// Positions count Unicode scalar values, not bytes. `line` is 1-based,
/// `offset` is the 0-based column within the current line and resets on every
/// consumed newline.
#[derive(Debug)]
pub struct State {
    source: String,
    /// Total character length of the normalized source.
    length: usize,
    /// Byte index of the cursor into `source`.
    byte_pos: usize,
    /// Characters consumed so far.
    position: usize,
    line: usize,
    offset: usize,
    pub(crate) level: usize,
    pub(crate) indent_style: Option<IndentStyle>,
    pub(crate) indent_width: Option<usize>,
}

impl State {
    pub fn new(
        input: &str,
        indent_style: Option<IndentStyle>,
        indent_width: Option<usize>,
    ) -> Self {
        let source = normalize(input);
        let length = source.chars().count();
        Self {
            source,
            length,
            byte_pos: 0,
            position: 0,
            line: 1,
            offset: 0,
            level: 0,
            indent_style,
            indent_width,
        }
    }

    // === Cursor primitives ===

    pub fn is_at_end(&self) -> bool {
        self.position >= self.length
    }

    /// The unconsumed remainder of the source.
    pub fn remaining(&self) -> &str {
        &self.source[self.byte_pos..]
    }

    pub fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// The first `n` characters of the remaining input, without consuming.
    pub fn peek(&self, n: usize) -> &str {
        let rem = self.remaining();
        match rem.char_indices().nth(n) {
            Some((idx, _)) => &rem[..idx],
            None => rem,
        }
    }

    /// Consume `n` characters, updating line and offset accounting. Newlines
    /// inside the consumed span advance `line` and reset `offset`.
    pub fn consume_chars(&mut self, n: usize) {
        for _ in 0..n {
            let Some(ch) = self.peek_char() else { break };
            self.byte_pos += ch.len_utf8();
            self.position += 1;
            if ch == '\n' {
                self.line += 1;
                self.offset = 0;
            } else {
                self.offset += 1;
            }
        }
    }

    /// Attempt an anchored regex match at the head of the remaining input.
    /// Patterns are written with an explicit leading `^`.
    pub fn match_head<'a>(&'a self, re: &Regex) -> Option<Captures<'a>> {
        re.captures(self.remaining())
    }

    /// Consume a matched span, except for trailing newlines: those stay in
    /// the input for the newline scanner, which owns line accounting.
    pub fn consume_match(&mut self, full_match: &str) {
        let kept = full_match.trim_end_matches('\n');
        self.consume_chars(kept.chars().count());
    }

    /// Consume characters while the predicate accepts them, returning the
    /// consumed text.
    pub fn read_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(ch) = self.peek_char() {
            if !pred(ch) {
                break;
            }
            out.push(ch);
            self.consume_chars(1);
        }
        out
    }

    /// Consume a run of spaces and tabs.
    pub fn read_spaces(&mut self) -> String {
        self.read_while(|c| c == ' ' || c == '\t')
    }

    /// Consume spaces, tabs and newlines. Used inside attribute blocks, the
    /// one place where constructs may span lines.
    pub fn skip_whitespace(&mut self) {
        self.read_while(|c| c == ' ' || c == '\t' || c == '\n');
    }

    /// Consume the rest of the current line, exclusive of the newline.
    pub fn read_until_newline(&mut self) -> String {
        self.read_while(|c| c != '\n')
    }

    // === Bracket reader ===

    /// Read a substring honoring quoted strings and balanced `()`, `[]`,
    /// `{}`. Stops, without consuming the terminator, at a `)` on the
    /// outermost level or at any of `breaks` at depth zero outside strings.
    /// The result is trimmed of surrounding whitespace.
    pub fn read_bracket_contents(&mut self, breaks: &[char]) -> String {
        let mut out = String::new();
        let mut depth = 0i32;
        let mut in_string = false;
        let mut string_kind = '"';

        while let Some(ch) = self.peek_char() {
            match ch {
                '"' | '\'' => {
                    if in_string && ch == string_kind && !out.ends_with('\\') {
                        in_string = false;
                    } else if !in_string {
                        in_string = true;
                        string_kind = ch;
                    }
                }
                '(' | '[' | '{' if !in_string => depth += 1,
                ')' | ']' | '}' if !in_string => {
                    if depth == 0 && ch == ')' {
                        break;
                    }
                    depth -= 1;
                }
                _ => {
                    if !in_string && depth == 0 && breaks.contains(&ch) {
                        break;
                    }
                }
            }
            out.push(ch);
            self.consume_chars(1);
        }

        out.trim().to_string()
    }

    // === Read-only snapshots ===

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn indent_style(&self) -> Option<IndentStyle> {
        self.indent_style
    }

    pub fn indent_width(&self) -> Option<usize> {
        self.indent_width
    }
}

/// Normalize raw template source: strip `\r` and `\0`, trim trailing
/// whitespace, terminate with a single `\n`. An all-whitespace source
/// normalizes to the empty string.
fn normalize(input: &str) -> String {
    let mut source: String = input.chars().filter(|&c| c != '\r' && c != '\0').collect();
    source.truncate(source.trim_end().len());
    if !source.is_empty() {
        source.push('\n');
    }
    source
}
