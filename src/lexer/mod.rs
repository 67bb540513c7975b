//! The lexing engine: dispatch loop, lazy token stream and entry points.

mod scanners;
mod state;

use crate::error::{ErrorKind, LexError};
use crate::token::{Token, TokenKind};
use state::State;
use std::collections::VecDeque;

/// Indentation style of a document, fixed by the first indented line (or
/// forced up front through [`Options`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentStyle {
    Tab,
    Space,
}

/// Lexer configuration. Everything defaults to auto-detection.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Force an indentation style; lines using the other style fail.
    pub indent_style: Option<IndentStyle>,
    /// Force the indentation width instead of inferring it from the first
    /// indented line.
    pub indent_width: Option<usize>,
}

/// Scanner identities, in dispatch order. The top-level order is fixed:
/// keyword-prefixed constructs come before the generic tag scanner, and the
/// catch-all text scanner runs last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scanner {
    NewLine,
    Indent,
    Import,
    Block,
    Conditional,
    Each,
    Case,
    When,
    Do,
    While,
    Mixin,
    MixinCall,
    Doctype,
    Tag,
    Classes,
    Id,
    Attributes,
    Assignment,
    Comment,
    Filter,
    Expression,
    Markup,
    TextLine,
    Text,
}

impl Scanner {
    fn name(self) -> &'static str {
        match self {
            Scanner::NewLine => "newLine",
            Scanner::Indent => "indent",
            Scanner::Import => "import",
            Scanner::Block => "block",
            Scanner::Conditional => "conditional",
            Scanner::Each => "each",
            Scanner::Case => "case",
            Scanner::When => "when",
            Scanner::Do => "do",
            Scanner::While => "while",
            Scanner::Mixin => "mixin",
            Scanner::MixinCall => "mixinCall",
            Scanner::Doctype => "doctype",
            Scanner::Tag => "tag",
            Scanner::Classes => "classes",
            Scanner::Id => "id",
            Scanner::Attributes => "attributes",
            Scanner::Assignment => "assignment",
            Scanner::Comment => "comment",
            Scanner::Filter => "filter",
            Scanner::Expression => "expression",
            Scanner::Markup => "markup",
            Scanner::TextLine => "textLine",
            Scanner::Text => "text",
        }
    }

    fn run(self, state: &mut State, out: &mut Vec<Token>) -> Result<(), LexError> {
        match self {
            Scanner::NewLine => {
                state.scan_new_line(out);
                Ok(())
            }
            Scanner::Indent => state.scan_indent(out).map(|_| ()),
            Scanner::Import => state.scan_import(out),
            Scanner::Block => state.scan_block(out),
            Scanner::Conditional => state.scan_conditional(out),
            Scanner::Each => state.scan_each(out),
            Scanner::Case => state.scan_case(out),
            Scanner::When => state.scan_when(out),
            Scanner::Do => state.scan_do(out),
            Scanner::While => state.scan_while(out),
            Scanner::Mixin => state.scan_mixin(out),
            Scanner::MixinCall => state.scan_mixin_call(out),
            Scanner::Doctype => state.scan_doctype(out),
            Scanner::Tag => state.scan_tag(out),
            Scanner::Classes => state.scan_classes(out),
            Scanner::Id => state.scan_id(out),
            Scanner::Attributes => state.scan_attributes(out),
            Scanner::Assignment => state.scan_assignment(out),
            Scanner::Comment => state.scan_comment(out),
            Scanner::Filter => state.scan_filter(out),
            Scanner::Expression => state.scan_expression(out),
            Scanner::Markup => {
                state.scan_markup(out);
                Ok(())
            }
            Scanner::TextLine => state.scan_text_line(out),
            Scanner::Text => {
                state.scan_text(out);
                Ok(())
            }
        }
    }
}

const TOP_LEVEL: &[Scanner] = &[
    Scanner::NewLine,
    Scanner::Indent,
    Scanner::Import,
    Scanner::Block,
    Scanner::Conditional,
    Scanner::Each,
    Scanner::Case,
    Scanner::When,
    Scanner::Do,
    Scanner::While,
    Scanner::Mixin,
    Scanner::MixinCall,
    Scanner::Doctype,
    Scanner::Tag,
    Scanner::Classes,
    Scanner::Id,
    Scanner::Attributes,
    Scanner::Assignment,
    Scanner::Comment,
    Scanner::Filter,
    Scanner::Expression,
    Scanner::Markup,
    Scanner::TextLine,
    Scanner::Text,
];

/// One dispatch round: try the scanners in order and return the first
/// non-empty batch of tokens. A scanner wins by yielding at least one token;
/// consuming input without yielding (a text match that trims to nothing, an
/// unchanged indentation run) still counts as progress and keeps the strict
/// failure at bay. At end of input, open indentation levels are flushed as
/// `outdent` tokens.
fn scan_batch(state: &mut State) -> Result<Vec<Token>, LexError> {
    let mut out = Vec::new();
    while !state.is_at_end() {
        let start_position = state.position();
        for &scanner in TOP_LEVEL {
            scanner.run(state, &mut out)?;
            if !out.is_empty() {
                return Ok(out);
            }
        }
        if state.position() > start_position {
            continue;
        }
        let spaces = state.read_spaces();
        if !spaces.is_empty() && !state.is_at_end() {
            continue;
        }
        let expected = TOP_LEVEL
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(LexError::new(
            ErrorKind::UnexpectedInput,
            format!(
                "unexpected input `{}`, expected one of {}",
                state.peek(20),
                expected
            ),
            state.line(),
            state.offset(),
        ));
    }

    while state.level > 0 {
        state.level -= 1;
        out.push(Token::new(TokenKind::Outdent, state.line(), state.offset()));
    }
    Ok(out)
}

/// Lexer for the template language. Holds only configuration; each call to
/// [`Lexer::lex`] owns its own state, so independent lexes may run on
/// separate threads.
#[derive(Debug, Clone, Default)]
pub struct Lexer {
    options: Options,
}

impl Lexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self { options }
    }

    /// Lex a template source into a lazy token stream. No token is computed
    /// until the iterator asks for it; the first failure ends the stream.
    pub fn lex(&self, input: &str) -> Tokens {
        Tokens {
            state: State::new(
                input,
                self.options.indent_style,
                self.options.indent_width,
            ),
            queue: VecDeque::new(),
            done: false,
        }
    }

    /// Human-readable linearization of the token stream, one
    /// `[kind(line:offset) key=value, …]` entry per token with a line break
    /// after every `newLine`.
    pub fn dump(&self, input: &str) -> Result<String, LexError> {
        let mut out = String::new();
        for token in self.lex(input) {
            let token = token?;
            out.push_str(&token.to_string());
            if matches!(token.kind, TokenKind::NewLine) {
                out.push('\n');
            } else {
                out.push(' ');
            }
        }
        Ok(out)
    }
}

/// Lazy token stream over one lex session. Also exposes read-only snapshots
/// of the scan state, which advance as the stream is consumed.
#[derive(Debug)]
pub struct Tokens {
    state: State,
    queue: VecDeque<Token>,
    done: bool,
}

impl Iterator for Tokens {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(token) = self.queue.pop_front() {
            return Some(Ok(token));
        }
        if self.done {
            return None;
        }
        match scan_batch(&mut self.state) {
            Ok(batch) => {
                if batch.is_empty() {
                    self.done = true;
                    return None;
                }
                self.queue.extend(batch);
                self.queue.pop_front().map(Ok)
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl Tokens {
    /// Total character length of the normalized input.
    pub fn length(&self) -> usize {
        self.state.length()
    }

    /// Characters consumed so far.
    pub fn position(&self) -> usize {
        self.state.position()
    }

    pub fn line(&self) -> usize {
        self.state.line()
    }

    pub fn offset(&self) -> usize {
        self.state.offset()
    }

    /// Current indentation depth in units of the indent width.
    pub fn level(&self) -> usize {
        self.state.level()
    }

    pub fn indent_style(&self) -> Option<IndentStyle> {
        self.state.indent_style()
    }

    pub fn indent_width(&self) -> Option<usize> {
        self.state.indent_width()
    }

    /// The unconsumed remainder of the normalized input.
    pub fn remaining_input(&self) -> &str {
        self.state.remaining()
    }
}
