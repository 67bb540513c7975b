use serde::Serialize;
use std::fmt;

/// A lexed token with its source position.
///
/// `line` is 1-based, `offset` is the 0-based column; both point at the first
/// character of the token's source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub line: usize,
    pub offset: usize,
    #[serde(flatten)]
    pub kind: TokenKind,
}

/// The closed set of token kinds produced by the lexer.
///
/// Attribute values embedded in the source (control-statement subjects,
/// attribute expressions) are carried as opaque substrings; the lexer never
/// interprets them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TokenKind {
    NewLine,
    /// Indentation increased by one level.
    Indent,
    /// Indentation decreased by one level (one token per level dropped).
    Outdent,
    /// `extends`/`include`, optionally piped through a filter.
    Import {
        import_type: String,
        filter: Option<String>,
        path: String,
    },
    Block {
        mode: Option<String>,
        name: Option<String>,
    },
    /// `if`, `unless`, `elseif`/`else if` (normalized to `elseif`) or `else`.
    Conditional {
        name: String,
        subject: Option<String>,
    },
    Each {
        item_name: String,
        key_name: Option<String>,
        subject: Option<String>,
    },
    Case {
        subject: Option<String>,
    },
    When {
        subject: Option<String>,
        default: bool,
    },
    Do {
        subject: Option<String>,
    },
    While {
        subject: Option<String>,
    },
    Mixin {
        name: String,
    },
    MixinCall {
        name: String,
    },
    Doctype {
        name: Option<String>,
    },
    Tag {
        name: String,
    },
    Class {
        name: String,
    },
    Id {
        name: String,
    },
    AttributeStart,
    /// One entry of an attribute block. `name` is absent for positional
    /// values (mixin call arguments), `value` for boolean attributes.
    Attribute {
        name: Option<String>,
        value: Option<String>,
        escaped: bool,
    },
    AttributeEnd,
    /// `&name` attribute assignment.
    Assignment {
        name: String,
    },
    Comment {
        rendered: bool,
    },
    Filter {
        name: String,
    },
    /// `-` (statement, no output) or `=`/`!=` (output expression). The code
    /// itself follows as `text` tokens.
    Expression {
        escaped: bool,
        #[serde(rename = "return")]
        returns: bool,
    },
    Text {
        value: String,
    },
    /// `:` block expansion separating two constructs on one line.
    Expansion {
        with_space: bool,
    },
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, offset: usize) -> Self {
        Self { line, offset, kind }
    }

    /// The wire-level kind name, matching the JSON `type` tag.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            TokenKind::NewLine => "newLine",
            TokenKind::Indent => "indent",
            TokenKind::Outdent => "outdent",
            TokenKind::Import { .. } => "import",
            TokenKind::Block { .. } => "block",
            TokenKind::Conditional { .. } => "conditional",
            TokenKind::Each { .. } => "each",
            TokenKind::Case { .. } => "case",
            TokenKind::When { .. } => "when",
            TokenKind::Do { .. } => "do",
            TokenKind::While { .. } => "while",
            TokenKind::Mixin { .. } => "mixin",
            TokenKind::MixinCall { .. } => "mixinCall",
            TokenKind::Doctype { .. } => "doctype",
            TokenKind::Tag { .. } => "tag",
            TokenKind::Class { .. } => "class",
            TokenKind::Id { .. } => "id",
            TokenKind::AttributeStart => "attributeStart",
            TokenKind::Attribute { .. } => "attribute",
            TokenKind::AttributeEnd => "attributeEnd",
            TokenKind::Assignment { .. } => "assignment",
            TokenKind::Comment { .. } => "comment",
            TokenKind::Filter { .. } => "filter",
            TokenKind::Expression { .. } => "expression",
            TokenKind::Text { .. } => "text",
            TokenKind::Expansion { .. } => "expansion",
        }
    }

    /// Attribute key/value pairs for display purposes. Absent optional
    /// attributes are omitted; booleans render as `true`/`false`.
    pub fn attrs(&self) -> Vec<(&'static str, String)> {
        fn opt(out: &mut Vec<(&'static str, String)>, key: &'static str, v: &Option<String>) {
            if let Some(v) = v {
                out.push((key, v.clone()));
            }
        }

        let mut out = Vec::new();
        match &self.kind {
            TokenKind::Import {
                import_type,
                filter,
                path,
            } => {
                out.push(("importType", import_type.clone()));
                opt(&mut out, "filter", filter);
                out.push(("path", path.clone()));
            }
            TokenKind::Block { mode, name } => {
                opt(&mut out, "mode", mode);
                opt(&mut out, "name", name);
            }
            TokenKind::Conditional { name, subject } => {
                out.push(("name", name.clone()));
                opt(&mut out, "subject", subject);
            }
            TokenKind::Each {
                item_name,
                key_name,
                subject,
            } => {
                out.push(("itemName", item_name.clone()));
                opt(&mut out, "keyName", key_name);
                opt(&mut out, "subject", subject);
            }
            TokenKind::Case { subject }
            | TokenKind::Do { subject }
            | TokenKind::While { subject } => {
                opt(&mut out, "subject", subject);
            }
            TokenKind::When { subject, default } => {
                opt(&mut out, "subject", subject);
                out.push(("default", default.to_string()));
            }
            TokenKind::Mixin { name }
            | TokenKind::MixinCall { name }
            | TokenKind::Tag { name }
            | TokenKind::Class { name }
            | TokenKind::Id { name }
            | TokenKind::Assignment { name }
            | TokenKind::Filter { name } => {
                out.push(("name", name.clone()));
            }
            TokenKind::Doctype { name } => {
                opt(&mut out, "name", name);
            }
            TokenKind::Attribute {
                name,
                value,
                escaped,
            } => {
                opt(&mut out, "name", name);
                opt(&mut out, "value", value);
                out.push(("escaped", escaped.to_string()));
            }
            TokenKind::Comment { rendered } => {
                out.push(("rendered", rendered.to_string()));
            }
            TokenKind::Expression { escaped, returns } => {
                out.push(("escaped", escaped.to_string()));
                out.push(("return", returns.to_string()));
            }
            TokenKind::Text { value } => {
                out.push(("value", value.clone()));
            }
            TokenKind::Expansion { with_space } => {
                out.push(("withSpace", with_space.to_string()));
            }
            TokenKind::NewLine
            | TokenKind::Indent
            | TokenKind::Outdent
            | TokenKind::AttributeStart
            | TokenKind::AttributeEnd => {}
        }
        out
    }
}

impl fmt::Display for Token {
    /// `[kind(line:offset) key=value, …]`, the dump linearization of a token.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}({}:{})", self.kind_name(), self.line, self.offset)?;
        let attrs = self.attrs();
        if !attrs.is_empty() {
            let joined = attrs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " {}", joined)?;
        }
        write!(f, "]")
    }
}
