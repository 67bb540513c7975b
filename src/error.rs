use std::fmt;

/// Kind of lex failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MixedIndentation,
    IndentStyleMismatch,
    OverIndent,
    UnclosedSubject,
    UnclosedAttributeBlock,
    MalformedEach,
    UnexpectedInput,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MixedIndentation => "Mixed indentation",
            ErrorKind::IndentStyleMismatch => "Indent style mismatch",
            ErrorKind::OverIndent => "Over-indent",
            ErrorKind::UnclosedSubject => "Unclosed subject",
            ErrorKind::UnclosedAttributeBlock => "Unclosed attribute block",
            ErrorKind::MalformedEach => "Malformed each statement",
            ErrorKind::UnexpectedInput => "Unexpected input",
        }
    }
}

/// Error during lexing. All lex failures are fatal; the token stream ends at
/// the first one.
#[derive(Debug, Clone)]
pub struct LexError {
    pub kind: ErrorKind,
    pub message: String,
    /// 1-based line at the moment of failure.
    pub line: usize,
    /// 0-based column at the moment of failure.
    pub offset: usize,
    pub help: Option<String>,
}

impl LexError {
    /// Create a new lex error
    pub fn new(kind: ErrorKind, message: impl Into<String>, line: usize, offset: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
            offset,
            help: None,
        }
    }

    /// Add help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render the error with source context
    pub fn render(&self, source: &str, filename: &str) -> String {
        self.render_inner(source, filename, false)
    }

    /// Render the error with ANSI color codes
    pub fn render_color(&self, source: &str, filename: &str) -> String {
        self.render_inner(source, filename, true)
    }

    fn render_inner(&self, source: &str, filename: &str, color: bool) -> String {
        // Red for the error itself, dim for structural chrome
        let red = if color { "\x1b[1;31m" } else { "" };
        let dim = if color { "\x1b[2m" } else { "" };
        let cyan = if color { "\x1b[1;36m" } else { "" };
        let reset = if color { "\x1b[0m" } else { "" };

        let mut output = String::new();
        output.push('\n');

        output.push_str(&format!(
            " {}file:{} {}:{}:{}\n",
            dim,
            reset,
            filename,
            self.line,
            self.offset + 1
        ));
        output.push_str(&format!("{}error:{} {}\n", red, reset, self.message));

        if let Some(source_line) = source.lines().nth(self.line.saturating_sub(1)) {
            let line_num_width = format!("{}", self.line).len().max(2);
            output.push_str(&format!(
                "{}{:>width$} |{}\n",
                dim,
                "",
                reset,
                width = line_num_width
            ));
            output.push_str(&format!(
                "{}{:>width$} |{} {}\n",
                dim,
                self.line,
                reset,
                source_line,
                width = line_num_width
            ));

            // Caret column, clamped to the line in case the failure sits at EOL
            let caret_col = self.offset.min(source_line.chars().count());
            let spaces = " ".repeat(caret_col);
            output.push_str(&format!(
                "{}{:>width$} |{} {}{}^{}\n",
                dim,
                "",
                reset,
                spaces,
                red,
                reset,
                width = line_num_width
            ));
        }

        if let Some(ref help) = self.help {
            output.push('\n');
            for (i, help_line) in help.lines().enumerate() {
                if i == 0 {
                    output.push_str(&format!(" {}help:{} {}\n", cyan, reset, help_line));
                } else {
                    output.push_str(&format!("       {}\n", help_line));
                }
            }
        }

        output.push('\n');
        output
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to parse jade: {} (Line: {}, Offset: {})",
            self.message, self.line, self.offset
        )
    }
}

impl std::error::Error for LexError {}
