//! Lexer for a Jade/Pug-style indentation-sensitive template language.
//!
//! The lexer consumes a template source and produces a lazy stream of typed
//! tokens for a downstream parser. Indentation width and style are inferred
//! from the first indented line and enforced for the rest of the document;
//! level changes surface as explicit `indent`/`outdent` tokens.
//!
//! # Example
//!
//! ```
//! use jade_lexer::{Lexer, TokenKind};
//!
//! let lexer = Lexer::new();
//! let tokens: Result<Vec<_>, _> = lexer.lex("div.hello\n").collect();
//! let tokens = tokens.unwrap();
//! assert!(matches!(&tokens[0].kind, TokenKind::Tag { name } if name == "div"));
//! assert!(matches!(&tokens[1].kind, TokenKind::Class { name } if name == "hello"));
//! ```

pub mod error;
pub mod lexer;
pub mod token;

pub use error::{ErrorKind, LexError};
pub use lexer::{IndentStyle, Lexer, Options, Tokens};
pub use token::{Token, TokenKind};

/// Lex a source eagerly into a vector of tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new().lex(input).collect()
}
