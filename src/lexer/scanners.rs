//! The scanner suite: one recognizer per token family, plus the indent
//! tracker and the shared text-block machinery.
//!
//! Every scanner appends zero or more tokens to the caller's buffer and
//! leaves the cursor at the first unconsumed character. Token positions are
//! captured before any consumption so they point at the start of the token's
//! source text.

use super::state::State;
use super::IndentStyle;
use crate::error::{ErrorKind, LexError};
use crate::token::{Token, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;

type Scan = Result<(), LexError>;

/// Compiled patterns for the token families. All patterns are anchored with
/// an explicit `^`; the regex crate has no lookaround, so keyword boundaries
/// are checked in code after matching.
struct Patterns {
    tag: Regex,
    class: Regex,
    id: Regex,
    assignment: Regex,
    mixin: Regex,
    mixin_call: Regex,
    comment: Regex,
    filter: Regex,
    import: Regex,
    block_mode_named: Regex,
    mode_word: Regex,
    ident: Regex,
    expression: Regex,
    each_head: Regex,
    attribute_name: Regex,
}

impl Patterns {
    fn new() -> Self {
        let ident = r"[a-zA-Z_][a-zA-Z0-9_-]*";
        Self {
            tag: Regex::new(&format!("^(?P<name>{ident})")).expect("valid pattern"),
            class: Regex::new(&format!(r"^\.(?P<name>{ident})")).expect("valid pattern"),
            id: Regex::new(&format!("^#(?P<name>{ident})")).expect("valid pattern"),
            assignment: Regex::new(&format!("^&(?P<name>{ident})")).expect("valid pattern"),
            mixin: Regex::new(&format!("^mixin[\t ]+(?P<name>{ident})")).expect("valid pattern"),
            mixin_call: Regex::new(&format!(r"^\+(?P<name>{ident})")).expect("valid pattern"),
            comment: Regex::new("^//(?P<unrendered>-)?[\t ]*").expect("valid pattern"),
            filter: Regex::new(&format!("^:(?P<name>{ident})")).expect("valid pattern"),
            import: Regex::new(&format!(
                "^(?P<kind>extends|include)(?::(?P<filter>{ident}))?[\t ]+(?P<path>[^\n]+)"
            ))
            .expect("valid pattern"),
            block_mode_named: Regex::new(&format!(
                "^(?P<mode>append|prepend|replace)[\t ]+(?P<name>{ident})"
            ))
            .expect("valid pattern"),
            mode_word: Regex::new("^(?:append|prepend|replace)").expect("valid pattern"),
            ident: Regex::new(&format!("^{ident}")).expect("valid pattern"),
            expression: Regex::new("^(?P<flag>!?=)[\t ]*").expect("valid pattern"),
            each_head: Regex::new(concat!(
                r"^\$?(?P<item>[a-zA-Z_][a-zA-Z0-9_]*)",
                r"(?:[\t ]*,[\t ]*\$?(?P<key>[a-zA-Z_][a-zA-Z0-9_]*))?",
                "[\t ]+in[\t ]+"
            ))
            .expect("valid pattern"),
            attribute_name: Regex::new(&format!(r"^(?P<name>(?:\.\.\.)?{ident})"))
                .expect("valid pattern"),
        }
    }
}

static PATTERNS: Lazy<Patterns> = Lazy::new(Patterns::new);

impl State {
    fn fail(&self, kind: ErrorKind, message: impl Into<String>) -> LexError {
        LexError::new(kind, message, self.line(), self.offset())
    }

    /// Match one of `keywords` at the head, requiring a `:`, space, tab or
    /// newline right after it so identifiers sharing a keyword prefix fall
    /// through to the tag scanner.
    fn match_keyword_head(&self, keywords: &[&'static str]) -> Option<&'static str> {
        let rem = self.remaining();
        for &kw in keywords {
            if let Some(rest) = rem.strip_prefix(kw) {
                if matches!(rest.chars().next(), Some(':' | ' ' | '\t' | '\n') | None) {
                    return Some(kw);
                }
            }
        }
        None
    }

    // === Structural scanners ===

    pub(super) fn scan_new_line(&mut self, out: &mut Vec<Token>) {
        if self.peek_char() == Some('\n') {
            out.push(Token::new(TokenKind::NewLine, self.line(), self.offset()));
            self.consume_chars(1);
        }
    }

    /// The indent tracker. Fires only at column zero; detects style and
    /// width on the first indented line and emits the level delta as
    /// `indent`/`outdent` tokens. Returns `true` when the line was empty and
    /// a bare `newLine` was emitted instead.
    pub(super) fn scan_indent(&mut self, out: &mut Vec<Token>) -> Result<bool, LexError> {
        if self.offset() != 0 || self.is_at_end() {
            return Ok(false);
        }
        let (line, offset) = (self.line(), self.offset());
        let indent = self.read_spaces();

        // Empty line: the indentation is discarded, only the line break counts
        if self.peek_char() == Some('\n') {
            out.push(Token::new(TokenKind::NewLine, line, offset));
            self.consume_chars(1);
            return Ok(true);
        }

        let has_tabs = indent.contains('\t');
        let has_spaces = indent.contains(' ');
        if has_tabs && has_spaces {
            return Err(self.fail(
                ErrorKind::MixedIndentation,
                "you mixed tabs and spaces in the indentation of a single line",
            ));
        }

        let indent_len = indent.chars().count();
        if indent_len > 0 {
            let style = if has_tabs {
                IndentStyle::Tab
            } else {
                IndentStyle::Space
            };
            match self.indent_style {
                Some(existing) if existing != style => {
                    return Err(self
                        .fail(
                            ErrorKind::IndentStyleMismatch,
                            "indentation style changed between lines",
                        )
                        .with_help("Use either tabs or spaces throughout the document, not both"));
                }
                None => self.indent_style = Some(style),
                _ => {}
            }
        }

        let new_level = if indent_len == 0 {
            0
        } else {
            // The first indented line defines the indentation unit
            let width = *self.indent_width.get_or_insert(indent_len);
            ((indent_len as f64) / (width as f64)).round() as usize
        };

        if new_level > self.level + 1 {
            return Err(self.fail(
                ErrorKind::OverIndent,
                "you should indent in by one level only",
            ));
        }

        let old_level = self.level;
        self.level = new_level;
        if new_level > old_level {
            for _ in 0..(new_level - old_level) {
                out.push(Token::new(TokenKind::Indent, line, offset));
            }
        } else {
            for _ in 0..(old_level - new_level) {
                out.push(Token::new(TokenKind::Outdent, line, offset));
            }
        }
        Ok(false)
    }

    // === Text scanners ===

    /// The rest of the current line as a single `text` token, skipped
    /// entirely when it trims to nothing.
    pub(super) fn scan_text(&mut self, out: &mut Vec<Token>) {
        let (line, offset) = (self.line(), self.offset());
        let raw = self.read_until_newline();
        let value = raw.trim();
        if !value.is_empty() {
            out.push(Token::new(
                TokenKind::Text {
                    value: value.to_string(),
                },
                line,
                offset,
            ));
        }
    }

    /// A text block: the remainder of the current line plus every following
    /// line indented deeper than the block's anchor. Emits the interleaved
    /// `newLine`/`indent`/`outdent` structure alongside the `text` tokens.
    pub(super) fn scan_text_block(&mut self, out: &mut Vec<Token>) -> Scan {
        self.scan_text(out);
        let entry_level = self.level();
        loop {
            if self.is_at_end() {
                break;
            }
            if self.peek_char() == Some('\n') {
                self.scan_new_line(out);
                continue;
            }
            if self.offset() != 0 {
                break;
            }
            let empty_line = self.scan_indent(out)?;
            if empty_line {
                continue;
            }
            if self.level() <= entry_level {
                break;
            }
            self.scan_text(out);
        }
        Ok(())
    }

    /// `|` piped text line.
    pub(super) fn scan_text_line(&mut self, out: &mut Vec<Token>) -> Scan {
        if self.peek_char() != Some('|') {
            return Ok(());
        }
        self.consume_chars(1);
        self.scan_text_block(out)
    }

    /// Raw markup passthrough: a line starting with `<` is kept verbatim.
    pub(super) fn scan_markup(&mut self, out: &mut Vec<Token>) {
        if self.peek_char() != Some('<') {
            return;
        }
        let (line, offset) = (self.line(), self.offset());
        let value = self.read_until_newline();
        out.push(Token::new(TokenKind::Text { value }, line, offset));
    }

    // === Sub-scanning ===

    /// Trailing constructs after a primary one: `.` opens a text block, `:`
    /// expands into a second construct on the same line.
    pub(super) fn scan_sub(&mut self, out: &mut Vec<Token>) -> Scan {
        if self.peek_char() == Some('.') {
            self.consume_chars(1);
            self.scan_text_block(out)?;
        }
        if self.peek_char() == Some(':') {
            let (line, offset) = (self.line(), self.offset());
            self.consume_chars(1);
            let spaces = self.read_spaces();
            out.push(Token::new(
                TokenKind::Expansion {
                    with_space: !spaces.is_empty(),
                },
                line,
                offset,
            ));
        }
        Ok(())
    }

    // === Tag family ===

    pub(super) fn scan_tag(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(caps) = self.match_head(&PATTERNS.tag) else {
            return Ok(());
        };
        let name = caps["name"].to_string();
        let full = caps[0].to_string();
        let (line, offset) = (self.line(), self.offset());
        self.consume_match(&full);
        out.push(Token::new(TokenKind::Tag { name }, line, offset));
        self.scan_classes(out)?;
        self.scan_sub(out)
    }

    pub(super) fn scan_classes(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(caps) = self.match_head(&PATTERNS.class) else {
            return Ok(());
        };
        let name = caps["name"].to_string();
        let full = caps[0].to_string();
        let (line, offset) = (self.line(), self.offset());
        self.consume_match(&full);
        out.push(Token::new(TokenKind::Class { name }, line, offset));
        self.scan_classes(out)?;
        self.scan_sub(out)
    }

    pub(super) fn scan_id(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(caps) = self.match_head(&PATTERNS.id) else {
            return Ok(());
        };
        let name = caps["name"].to_string();
        let full = caps[0].to_string();
        let (line, offset) = (self.line(), self.offset());
        self.consume_match(&full);
        out.push(Token::new(TokenKind::Id { name }, line, offset));
        self.scan_classes(out)?;
        self.scan_sub(out)
    }

    pub(super) fn scan_assignment(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(caps) = self.match_head(&PATTERNS.assignment) else {
            return Ok(());
        };
        let name = caps["name"].to_string();
        let full = caps[0].to_string();
        let (line, offset) = (self.line(), self.offset());
        self.consume_match(&full);
        out.push(Token::new(TokenKind::Assignment { name }, line, offset));
        Ok(())
    }

    // === Mixins ===

    pub(super) fn scan_mixin(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(caps) = self.match_head(&PATTERNS.mixin) else {
            return Ok(());
        };
        let name = caps["name"].to_string();
        let full = caps[0].to_string();
        let (line, offset) = (self.line(), self.offset());
        self.consume_match(&full);
        out.push(Token::new(TokenKind::Mixin { name }, line, offset));
        self.scan_classes(out)?;
        self.scan_sub(out)
    }

    pub(super) fn scan_mixin_call(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(caps) = self.match_head(&PATTERNS.mixin_call) else {
            return Ok(());
        };
        let name = caps["name"].to_string();
        let full = caps[0].to_string();
        let (line, offset) = (self.line(), self.offset());
        self.consume_match(&full);
        out.push(Token::new(TokenKind::MixinCall { name }, line, offset));
        self.scan_classes(out)?;
        self.scan_sub(out)
    }

    // === Comments, filters, imports ===

    pub(super) fn scan_comment(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(caps) = self.match_head(&PATTERNS.comment) else {
            return Ok(());
        };
        let rendered = caps.name("unrendered").is_none();
        let full = caps[0].to_string();
        let (line, offset) = (self.line(), self.offset());
        self.consume_match(&full);
        out.push(Token::new(TokenKind::Comment { rendered }, line, offset));
        self.scan_text_block(out)
    }

    pub(super) fn scan_filter(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(caps) = self.match_head(&PATTERNS.filter) else {
            return Ok(());
        };
        let name = caps["name"].to_string();
        let full = caps[0].to_string();
        let (line, offset) = (self.line(), self.offset());
        self.consume_match(&full);
        out.push(Token::new(TokenKind::Filter { name }, line, offset));
        self.scan_text_block(out)
    }

    pub(super) fn scan_import(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(caps) = self.match_head(&PATTERNS.import) else {
            return Ok(());
        };
        let import_type = caps["kind"].to_string();
        let filter = caps.name("filter").map(|m| m.as_str().to_string());
        let path = caps["path"].trim().to_string();
        let full = caps[0].to_string();
        let (line, offset) = (self.line(), self.offset());
        self.consume_match(&full);
        out.push(Token::new(
            TokenKind::Import {
                import_type,
                filter,
                path,
            },
            line,
            offset,
        ));
        Ok(())
    }

    // === Blocks ===

    /// `block [append|prepend|replace] [name]`, with a second standalone
    /// recognizer for `append|prepend|replace name`.
    pub(super) fn scan_block(&mut self, out: &mut Vec<Token>) -> Scan {
        let (line, offset) = (self.line(), self.offset());
        if self.match_keyword_head(&["block"]).is_some() {
            self.consume_chars(5);
            self.read_spaces();
            let mut mode = None;
            if let Some(caps) = self.match_head(&PATTERNS.mode_word) {
                let word = caps[0].to_string();
                // Boundary check so `block appendix` reads as a plain name
                let next = self.remaining()[word.len()..].chars().next();
                if matches!(next, Some(':' | ' ' | '\t' | '\n') | None) {
                    self.consume_chars(word.chars().count());
                    self.read_spaces();
                    mode = Some(word);
                }
            }
            let name = match self.match_head(&PATTERNS.ident) {
                Some(caps) => {
                    let name = caps[0].to_string();
                    self.consume_chars(name.chars().count());
                    Some(name)
                }
                None => None,
            };
            out.push(Token::new(TokenKind::Block { mode, name }, line, offset));
            return self.scan_sub(out);
        }

        if let Some(caps) = self.match_head(&PATTERNS.block_mode_named) {
            let mode = caps["mode"].to_string();
            let name = caps["name"].to_string();
            let full = caps[0].to_string();
            self.consume_match(&full);
            out.push(Token::new(
                TokenKind::Block {
                    mode: Some(mode),
                    name: Some(name),
                },
                line,
                offset,
            ));
            return self.scan_sub(out);
        }
        Ok(())
    }

    // === Control statements ===

    /// Read a control-statement subject: parenthesized (bracket-aware, may
    /// span lines) or the trimmed remainder of the line. A following `:` or
    /// newline means there is no subject at all.
    fn read_subject(&mut self) -> Result<Option<String>, LexError> {
        match self.peek_char() {
            Some('(') => {
                self.consume_chars(1);
                let subject = self.read_bracket_contents(&[]);
                if self.peek_char() != Some(')') {
                    return Err(self.fail(
                        ErrorKind::UnclosedSubject,
                        "the subject of the statement is not closed",
                    ));
                }
                self.consume_chars(1);
                Ok(Some(subject))
            }
            Some(':') | Some('\n') | None => Ok(None),
            _ => Ok(Some(self.read_until_newline().trim().to_string())),
        }
    }

    pub(super) fn scan_conditional(&mut self, out: &mut Vec<Token>) -> Scan {
        const KEYWORDS: &[&str] = &["if", "unless", "elseif", "else if", "else"];
        let Some(keyword) = self.match_keyword_head(KEYWORDS) else {
            return Ok(());
        };
        let (line, offset) = (self.line(), self.offset());
        self.consume_chars(keyword.chars().count());
        self.read_spaces();
        let name = keyword.replace(' ', "");
        let subject = self.read_subject()?;
        out.push(Token::new(
            TokenKind::Conditional { name, subject },
            line,
            offset,
        ));
        self.scan_sub(out)
    }

    pub(super) fn scan_each(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(keyword) = self.match_keyword_head(&["each"]) else {
            return Ok(());
        };
        let (line, offset) = (self.line(), self.offset());
        self.consume_chars(keyword.chars().count());
        self.read_spaces();
        let Some(caps) = self.match_head(&PATTERNS.each_head) else {
            return Err(self.fail(
                ErrorKind::MalformedEach,
                "each statement must be in the form: each [$]itemName[, [$]keyName] in <subject>",
            ));
        };
        let item_name = caps["item"].to_string();
        let key_name = caps.name("key").map(|m| m.as_str().to_string());
        let full = caps[0].to_string();
        self.consume_match(&full);
        self.read_spaces();
        let subject = self.read_subject()?;
        out.push(Token::new(
            TokenKind::Each {
                item_name,
                key_name,
                subject,
            },
            line,
            offset,
        ));
        self.scan_sub(out)
    }

    pub(super) fn scan_case(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(keyword) = self.match_keyword_head(&["case"]) else {
            return Ok(());
        };
        let (line, offset) = (self.line(), self.offset());
        self.consume_chars(keyword.chars().count());
        self.read_spaces();
        let subject = self.read_subject()?;
        out.push(Token::new(TokenKind::Case { subject }, line, offset));
        self.scan_sub(out)
    }

    pub(super) fn scan_when(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(keyword) = self.match_keyword_head(&["when", "default"]) else {
            return Ok(());
        };
        let (line, offset) = (self.line(), self.offset());
        self.consume_chars(keyword.chars().count());
        self.read_spaces();
        let subject = self.read_subject()?;
        out.push(Token::new(
            TokenKind::When {
                subject,
                default: keyword == "default",
            },
            line,
            offset,
        ));
        self.scan_sub(out)
    }

    pub(super) fn scan_do(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(keyword) = self.match_keyword_head(&["do"]) else {
            return Ok(());
        };
        let (line, offset) = (self.line(), self.offset());
        self.consume_chars(keyword.chars().count());
        self.read_spaces();
        let subject = self.read_subject()?;
        out.push(Token::new(TokenKind::Do { subject }, line, offset));
        self.scan_sub(out)
    }

    pub(super) fn scan_while(&mut self, out: &mut Vec<Token>) -> Scan {
        let Some(keyword) = self.match_keyword_head(&["while"]) else {
            return Ok(());
        };
        let (line, offset) = (self.line(), self.offset());
        self.consume_chars(keyword.chars().count());
        self.read_spaces();
        let subject = self.read_subject()?;
        out.push(Token::new(TokenKind::While { subject }, line, offset));
        self.scan_sub(out)
    }

    // === Doctype ===

    pub(super) fn scan_doctype(&mut self, out: &mut Vec<Token>) -> Scan {
        let (line, offset) = (self.line(), self.offset());
        if self.match_keyword_head(&["doctype"]).is_some() {
            self.consume_chars("doctype".len());
        } else if self.remaining().starts_with("!!!") {
            self.consume_chars(3);
        } else {
            return Ok(());
        }
        self.read_spaces();
        let name = self.read_until_newline().trim().to_string();
        out.push(Token::new(
            TokenKind::Doctype {
                name: if name.is_empty() { None } else { Some(name) },
            },
            line,
            offset,
        ));
        Ok(())
    }

    // === Expressions ===

    pub(super) fn scan_expression(&mut self, out: &mut Vec<Token>) -> Scan {
        if self.peek_char() == Some('-') {
            let (line, offset) = (self.line(), self.offset());
            self.consume_chars(1);
            self.read_spaces();
            out.push(Token::new(
                TokenKind::Expression {
                    escaped: false,
                    returns: false,
                },
                line,
                offset,
            ));
            return self.scan_text_block(out);
        }

        let Some(caps) = self.match_head(&PATTERNS.expression) else {
            return Ok(());
        };
        let escaped = &caps["flag"] != "!=";
        let full = caps[0].to_string();
        let (line, offset) = (self.line(), self.offset());
        self.consume_match(&full);
        out.push(Token::new(
            TokenKind::Expression {
                escaped,
                returns: true,
            },
            line,
            offset,
        ));
        self.scan_text(out);
        Ok(())
    }

    // === Attributes ===

    /// Parenthesized attribute block. Entries are `name`, `name=value`,
    /// `name!=value` or a bare positional value; the bracket reader keeps
    /// commas inside strings and nested brackets out of the separator logic.
    pub(super) fn scan_attributes(&mut self, out: &mut Vec<Token>) -> Scan {
        if self.peek_char() != Some('(') {
            return Ok(());
        }
        out.push(Token::new(
            TokenKind::AttributeStart,
            self.line(),
            self.offset(),
        ));
        self.consume_chars(1);
        self.skip_whitespace();

        while self.peek_char() != Some(')') && !self.is_at_end() {
            let (line, offset) = (self.line(), self.offset());
            let mut name = None;
            let mut escaped = true;

            if let Some(caps) = self.match_head(&PATTERNS.attribute_name) {
                let matched = caps["name"].to_string();
                let full = caps[0].to_string();
                self.consume_match(&full);
                name = Some(matched);
                self.skip_whitespace();
            }
            if self.peek_char() == Some('!') {
                self.consume_chars(1);
                escaped = false;
            }

            let mut value = None;
            if name.is_none() || self.peek_char() == Some('=') {
                if name.is_some() {
                    self.consume_chars(1);
                    self.skip_whitespace();
                }
                let read = self.read_bracket_contents(&[',']);
                if !read.is_empty() {
                    value = Some(read);
                }
            }

            out.push(Token::new(
                TokenKind::Attribute {
                    name,
                    value,
                    escaped,
                },
                line,
                offset,
            ));

            if self.peek_char() == Some(',') {
                self.consume_chars(1);
                self.skip_whitespace();
            } else {
                break;
            }
        }

        if self.peek_char() != Some(')') {
            return Err(self.fail(
                ErrorKind::UnclosedAttributeBlock,
                "the attribute block is not closed",
            ));
        }
        out.push(Token::new(
            TokenKind::AttributeEnd,
            self.line(),
            self.offset(),
        ));
        self.consume_chars(1);
        self.scan_classes(out)?;
        self.scan_sub(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::token::{Token, TokenKind};
    use crate::tokenize;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source).expect("lex should succeed")
    }

    fn lex_err(source: &str) -> crate::error::LexError {
        tokenize(source).expect_err("lex should fail")
    }

    fn kinds(tokens: &[Token]) -> Vec<&'static str> {
        tokens.iter().map(|t| t.kind_name()).collect()
    }

    // === Tags, classes, ids ===

    #[test]
    fn test_simple_tag_and_class() {
        let tokens = lex("div.hello\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Tag { name } if name == "div"));
        assert!(matches!(&tokens[1].kind, TokenKind::Class { name } if name == "hello"));
        assert!(matches!(&tokens[2].kind, TokenKind::NewLine));
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_chained_classes() {
        let tokens = lex("div.a.b.c\n");
        assert_eq!(kinds(&tokens), vec!["tag", "class", "class", "class", "newLine"]);
    }

    #[test]
    fn test_id_after_tag() {
        let tokens = lex("div#main.big\n");
        assert_eq!(kinds(&tokens), vec!["tag", "id", "class", "newLine"]);
        assert!(matches!(&tokens[1].kind, TokenKind::Id { name } if name == "main"));
    }

    #[test]
    fn test_standalone_class_line() {
        let tokens = lex(".hello\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Class { name } if name == "hello"));
    }

    #[test]
    fn test_tag_with_inline_text() {
        let tokens = lex("li a\n");
        assert_eq!(kinds(&tokens), vec!["tag", "text", "newLine"]);
        assert!(matches!(&tokens[1].kind, TokenKind::Text { value } if value == "a"));
    }

    #[test]
    fn test_tag_name_preserves_case() {
        let tokens = lex("MyWidget\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Tag { name } if name == "MyWidget"));
    }

    // === Indentation ===

    #[test]
    fn test_indent_outdent() {
        let tokens = lex("ul\n  li a\n  li b\n");
        assert_eq!(
            kinds(&tokens),
            vec![
                "tag", "newLine", "indent", "tag", "text", "newLine", "tag", "text", "newLine",
                "outdent"
            ]
        );
    }

    #[test]
    fn test_indent_token_position() {
        let tokens = lex("ul\n  li\n");
        let indent = tokens
            .iter()
            .find(|t| matches!(t.kind, TokenKind::Indent))
            .unwrap();
        assert_eq!((indent.line, indent.offset), (2, 0));
    }

    #[test]
    fn test_multiple_outdents_in_one_line() {
        let tokens = lex("a\n  b\n    c\nd\n");
        assert_eq!(
            kinds(&tokens),
            vec![
                "tag", "newLine", "indent", "tag", "newLine", "indent", "tag", "newLine",
                "outdent", "outdent", "tag", "newLine"
            ]
        );
    }

    #[test]
    fn test_indents_balance_outdents() {
        let tokens = lex("html\n  body\n    div\n      p deep\n  footer\n");
        let indents = tokens.iter().filter(|t| matches!(t.kind, TokenKind::Indent)).count();
        let outdents = tokens.iter().filter(|t| matches!(t.kind, TokenKind::Outdent)).count();
        assert_eq!(indents, outdents);
    }

    #[test]
    fn test_over_indent_fails() {
        let err = lex_err("a\n  b\n      c\n");
        assert_eq!(err.kind, ErrorKind::OverIndent);
        assert!(err.message.contains("one level only"));
    }

    #[test]
    fn test_one_level_steps_are_legal() {
        lex("a\n  b\n    c\n");
    }

    #[test]
    fn test_mixed_indent_within_line_fails() {
        let err = lex_err("a\n\t b\n");
        assert_eq!(err.kind, ErrorKind::MixedIndentation);
    }

    #[test]
    fn test_mixed_style_across_lines_fails() {
        let err = lex_err("a\n\tb\n  c\n");
        assert_eq!(err.kind, ErrorKind::IndentStyleMismatch);
    }

    #[test]
    fn test_blank_line_is_only_a_newline() {
        let tokens = lex("a\n\nb\n");
        assert_eq!(kinds(&tokens), vec!["tag", "newLine", "newLine", "tag", "newLine"]);
    }

    #[test]
    fn test_whitespace_only_line_never_indents() {
        let tokens = lex("a\n   \nb\n");
        assert_eq!(kinds(&tokens), vec!["tag", "newLine", "newLine", "tag", "newLine"]);
    }

    // === Attributes ===

    #[test]
    fn test_attributes_with_nested_brackets_and_strings() {
        let tokens = lex("a(href=\"/x,y\", data-n=foo(1, 2))\n");
        assert_eq!(
            kinds(&tokens),
            vec!["tag", "attributeStart", "attribute", "attribute", "attributeEnd", "newLine"]
        );
        assert!(matches!(
            &tokens[2].kind,
            TokenKind::Attribute { name: Some(n), value: Some(v), escaped: true }
                if n == "href" && v == "\"/x,y\""
        ));
        assert!(matches!(
            &tokens[3].kind,
            TokenKind::Attribute { name: Some(n), value: Some(v), escaped: true }
                if n == "data-n" && v == "foo(1, 2)"
        ));
    }

    #[test]
    fn test_boolean_attribute() {
        let tokens = lex("input(disabled)\n");
        assert!(matches!(
            &tokens[2].kind,
            TokenKind::Attribute { name: Some(n), value: None, escaped: true } if n == "disabled"
        ));
    }

    #[test]
    fn test_unescaped_attribute() {
        let tokens = lex("a(href!=$url)\n");
        assert!(matches!(
            &tokens[2].kind,
            TokenKind::Attribute { name: Some(n), value: Some(v), escaped: false }
                if n == "href" && v == "$url"
        ));
    }

    #[test]
    fn test_positional_attribute_values() {
        let tokens = lex("+card(1, \"a\")\n");
        assert!(matches!(&tokens[0].kind, TokenKind::MixinCall { name } if name == "card"));
        assert!(matches!(
            &tokens[2].kind,
            TokenKind::Attribute { name: None, value: Some(v), .. } if v == "1"
        ));
        assert!(matches!(
            &tokens[3].kind,
            TokenKind::Attribute { name: None, value: Some(v), .. } if v == "\"a\""
        ));
    }

    #[test]
    fn test_spread_attribute_name() {
        let tokens = lex("+card(...rest)\n");
        assert!(matches!(
            &tokens[2].kind,
            TokenKind::Attribute { name: Some(n), value: None, .. } if n == "...rest"
        ));
    }

    #[test]
    fn test_empty_attribute_block() {
        let tokens = lex("a()\n");
        assert_eq!(kinds(&tokens), vec!["tag", "attributeStart", "attributeEnd", "newLine"]);
    }

    #[test]
    fn test_attribute_block_spanning_lines() {
        let tokens = lex("a(href=\"x\",\n  title=\"y\")\n");
        assert_eq!(
            kinds(&tokens),
            vec!["tag", "attributeStart", "attribute", "attribute", "attributeEnd", "newLine"]
        );
        assert_eq!(tokens[3].line, 2);
    }

    #[test]
    fn test_attributes_then_class() {
        let tokens = lex("a(href=\"x\").big\n");
        assert_eq!(
            kinds(&tokens),
            vec!["tag", "attributeStart", "attribute", "attributeEnd", "class", "newLine"]
        );
    }

    #[test]
    fn test_unclosed_attribute_block_fails() {
        let err = lex_err("a(href=\"x\"\n");
        assert_eq!(err.kind, ErrorKind::UnclosedAttributeBlock);
    }

    #[test]
    fn test_attribute_start_end_pairing() {
        for source in ["a(x=1)\n", "a(x=1)\nb(y=2)\n", "+m(1)(2)\n"] {
            let tokens = lex(source);
            let mut open = false;
            for token in &tokens {
                match token.kind {
                    TokenKind::AttributeStart => {
                        assert!(!open, "nested attributeStart in {:?}", source);
                        open = true;
                    }
                    TokenKind::AttributeEnd => {
                        assert!(open, "unmatched attributeEnd in {:?}", source);
                        open = false;
                    }
                    _ => {}
                }
            }
            assert!(!open, "unterminated attributeStart in {:?}", source);
        }
    }

    // === Control statements ===

    #[test]
    fn test_each_with_key() {
        let tokens = lex("each $item, $k in items\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Each { item_name, key_name: Some(k), subject: Some(s) }
                if item_name == "item" && k == "k" && s == "items"
        ));
    }

    #[test]
    fn test_each_without_key() {
        let tokens = lex("each item in items\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Each { item_name, key_name: None, subject: Some(s) }
                if item_name == "item" && s == "items"
        ));
    }

    #[test]
    fn test_each_with_parenthesized_subject() {
        let tokens = lex("each $i in (list)\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Each { subject: Some(s), .. } if s == "list"
        ));
    }

    #[test]
    fn test_malformed_each_fails() {
        let err = lex_err("each foo bar\n");
        assert_eq!(err.kind, ErrorKind::MalformedEach);
    }

    #[test]
    fn test_conditional_with_subject() {
        let tokens = lex("if $x > 1\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Conditional { name, subject: Some(s) } if name == "if" && s == "$x > 1"
        ));
    }

    #[test]
    fn test_else_if_name_is_collapsed() {
        let tokens = lex("else if $x\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Conditional { name, subject: Some(s) } if name == "elseif" && s == "$x"
        ));
    }

    #[test]
    fn test_else_without_subject() {
        let tokens = lex("else\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Conditional { name, subject: None } if name == "else"
        ));
    }

    #[test]
    fn test_parenthesized_subject_allows_expansion() {
        let tokens = lex("if ($ok): p Hi\n");
        assert_eq!(kinds(&tokens), vec!["conditional", "expansion", "tag", "text", "newLine"]);
        assert!(matches!(
            &tokens[1].kind,
            TokenKind::Expansion { with_space: true }
        ));
    }

    #[test]
    fn test_unclosed_subject_fails() {
        let err = lex_err("while (a\n");
        assert_eq!(err.kind, ErrorKind::UnclosedSubject);
    }

    #[test]
    fn test_case_and_when() {
        let tokens = lex("case $x\n  when \"a\"\n  default\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Case { subject: Some(s) } if s == "$x"));
        assert!(matches!(
            &tokens[3].kind,
            TokenKind::When { subject: Some(s), default: false } if s == "\"a\""
        ));
        assert!(matches!(
            &tokens[5].kind,
            TokenKind::When { subject: None, default: true }
        ));
    }

    #[test]
    fn test_do_while() {
        let tokens = lex("do\n  p x\nwhile ($more)\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Do { subject: None }));
        let while_token = tokens
            .iter()
            .find(|t| matches!(t.kind, TokenKind::While { .. }))
            .unwrap();
        assert!(matches!(
            &while_token.kind,
            TokenKind::While { subject: Some(s) } if s == "$more"
        ));
    }

    #[test]
    fn test_keyword_prefixed_identifier_is_a_tag() {
        let tokens = lex("iframe\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Tag { name } if name == "iframe"));
        let tokens = lex("dodo\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Tag { name } if name == "dodo"));
    }

    // === Blocks, imports, mixins ===

    #[test]
    fn test_named_block() {
        let tokens = lex("block content\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Block { mode: None, name: Some(n) } if n == "content"
        ));
    }

    #[test]
    fn test_block_with_mode() {
        let tokens = lex("block append head\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Block { mode: Some(m), name: Some(n) } if m == "append" && n == "head"
        ));
    }

    #[test]
    fn test_standalone_mode_block() {
        let tokens = lex("prepend scripts\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Block { mode: Some(m), name: Some(n) } if m == "prepend" && n == "scripts"
        ));
    }

    #[test]
    fn test_bare_block() {
        let tokens = lex("block\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Block { mode: None, name: None }
        ));
    }

    #[test]
    fn test_blockquote_is_a_tag() {
        let tokens = lex("blockquote\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Tag { name } if name == "blockquote"));
    }

    #[test]
    fn test_block_name_resembling_mode() {
        let tokens = lex("block appendix\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Block { mode: None, name: Some(n) } if n == "appendix"
        ));
    }

    #[test]
    fn test_extends_import() {
        let tokens = lex("extends layout\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Import { import_type, filter: None, path }
                if import_type == "extends" && path == "layout"
        ));
    }

    #[test]
    fn test_include_with_filter() {
        let tokens = lex("include:markdown partials/intro.md\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Import { import_type, filter: Some(f), path }
                if import_type == "include" && f == "markdown" && path == "partials/intro.md"
        ));
    }

    #[test]
    fn test_mixin_declaration() {
        let tokens = lex("mixin card\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Mixin { name } if name == "card"));
    }

    #[test]
    fn test_mixin_call_with_args() {
        let tokens = lex("+card(\"title\")\n");
        assert_eq!(
            kinds(&tokens),
            vec!["mixinCall", "attributeStart", "attribute", "attributeEnd", "newLine"]
        );
    }

    // === Doctype, comments, filters ===

    #[test]
    fn test_doctype() {
        let tokens = lex("doctype html\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Doctype { name: Some(n) } if n == "html"));
    }

    #[test]
    fn test_doctype_shorthand() {
        let tokens = lex("!!! 5\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Doctype { name: Some(n) } if n == "5"));
    }

    #[test]
    fn test_bare_doctype() {
        let tokens = lex("doctype\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Doctype { name: None }));
    }

    #[test]
    fn test_rendered_comment() {
        let tokens = lex("// shown\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Comment { rendered: true }));
        assert!(matches!(&tokens[1].kind, TokenKind::Text { value } if value == "shown"));
    }

    #[test]
    fn test_unrendered_comment() {
        let tokens = lex("//- hidden\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Comment { rendered: false }));
    }

    #[test]
    fn test_comment_with_indented_body() {
        let tokens = lex("// note\n  more\nafter\n");
        assert_eq!(
            kinds(&tokens),
            vec![
                "comment", "text", "newLine", "indent", "text", "newLine", "outdent", "tag",
                "newLine"
            ]
        );
    }

    #[test]
    fn test_filter_with_body() {
        let tokens = lex(":coffee\n  code here\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Filter { name } if name == "coffee"));
        assert_eq!(
            kinds(&tokens),
            vec!["filter", "newLine", "indent", "text", "newLine", "outdent"]
        );
    }

    // === Text, markup, expressions ===

    #[test]
    fn test_piped_text_line() {
        let tokens = lex("| hello there\n");
        assert_eq!(kinds(&tokens), vec!["text", "newLine"]);
        assert!(matches!(&tokens[0].kind, TokenKind::Text { value } if value == "hello there"));
    }

    #[test]
    fn test_markup_line_is_raw_text() {
        let tokens = lex("<div class=\"x\">\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Text { value } if value == "<div class=\"x\">"
        ));
    }

    #[test]
    fn test_tag_text_block() {
        let tokens = lex("p.\n  line one\n  line two\n");
        assert_eq!(
            kinds(&tokens),
            vec!["tag", "newLine", "indent", "text", "newLine", "text", "newLine", "outdent"]
        );
    }

    #[test]
    fn test_text_block_with_blank_interior_line() {
        let tokens = lex("p.\n  one\n\n  two\n");
        assert_eq!(
            kinds(&tokens),
            vec!["tag", "newLine", "indent", "text", "newLine", "newLine", "text", "newLine", "outdent"]
        );
    }

    #[test]
    fn test_output_expression() {
        let tokens = lex("= $x + 1\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Expression { escaped: true, returns: true }
        ));
        assert!(matches!(&tokens[1].kind, TokenKind::Text { value } if value == "$x + 1"));
    }

    #[test]
    fn test_unescaped_output_expression() {
        let tokens = lex("!= raw($html)\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Expression { escaped: false, returns: true }
        ));
    }

    #[test]
    fn test_statement_expression_with_block() {
        let tokens = lex("- $total = 0\n  $total++\n");
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Expression { escaped: false, returns: false }
        ));
        assert_eq!(
            kinds(&tokens),
            vec!["expression", "text", "newLine", "indent", "text", "newLine", "outdent"]
        );
    }

    #[test]
    fn test_assignment() {
        let tokens = lex("&attributes($val)\n");
        assert!(matches!(&tokens[0].kind, TokenKind::Assignment { name } if name == "attributes"));
        assert_eq!(
            kinds(&tokens),
            vec!["assignment", "attributeStart", "attribute", "attributeEnd", "newLine"]
        );
    }

    #[test]
    fn test_block_expansion() {
        let tokens = lex("li: a link\n");
        assert_eq!(kinds(&tokens), vec!["tag", "expansion", "tag", "text", "newLine"]);
        assert!(matches!(&tokens[1].kind, TokenKind::Expansion { with_space: true }));
    }

    #[test]
    fn test_block_expansion_without_space() {
        let tokens = lex("li:a\n");
        assert!(matches!(&tokens[1].kind, TokenKind::Expansion { with_space: false }));
    }

    // === Stream-level properties ===

    #[test]
    fn test_empty_input_is_empty_stream() {
        assert!(lex("").is_empty());
        assert!(lex("   \n  \n").is_empty());
    }

    #[test]
    fn test_determinism() {
        let source = "doctype html\nhtml\n  body\n    h1.title Hello\n    p= $msg\n";
        assert_eq!(lex(source), lex(source));
    }

    #[test]
    fn test_carriage_returns_are_transparent() {
        assert_eq!(lex("ul\r\n  li a\r\n"), lex("ul\n  li a\n"));
    }

    #[test]
    fn test_lines_are_non_decreasing() {
        let tokens = lex("html\n  body\n    p one\n    p two\n  footer\n");
        for pair in tokens.windows(2) {
            assert!(pair[0].line <= pair[1].line);
        }
    }

    #[test]
    fn test_newline_tokens_advance_lines() {
        let tokens = lex("a\nb\nc\n");
        let newline_lines: Vec<usize> = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::NewLine))
            .map(|t| t.line)
            .collect();
        assert_eq!(newline_lines, vec![1, 2, 3]);
    }

    #[test]
    fn test_token_positions_in_simple_line() {
        let tokens = lex("div.hello\n");
        assert_eq!((tokens[0].line, tokens[0].offset), (1, 0));
        assert_eq!((tokens[1].line, tokens[1].offset), (1, 3));
        assert_eq!((tokens[2].line, tokens[2].offset), (1, 9));
    }

    #[test]
    fn test_error_reports_position() {
        let err = lex_err("a\n  b\n      c\n");
        assert_eq!(err.line, 3);
        assert!(err.to_string().starts_with("Failed to parse jade:"));
        assert!(err.to_string().contains("(Line: 3, Offset:"));
    }
}
