//! domq — query an HTML document with CSS-selector syntax.
//!
//! The crate is a thin library around four pieces: a tolerant HTML parser
//! that builds an arena [`Dom`], a selector compiler ([`parse_selector`]),
//! a matching engine ([`query`]) and a renderer that projects matched nodes
//! to output text. The command-line binary wires them together; everything
//! here is callable as a pure function so the whole pipeline is testable
//! without a process boundary.

use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong inside a selector string, beyond a bad character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnsupportedCombinator,
    UnsupportedPseudoClass,
    UnterminatedLiteral,
    EmptyCompound,
    UnexpectedToken,
}

impl ParseErrorKind {
    fn message(self) -> &'static str {
        match self {
            Self::UnsupportedCombinator => "unsupported combinator",
            Self::UnsupportedPseudoClass => "unsupported pseudo-class",
            Self::UnterminatedLiteral => "unterminated string literal",
            Self::EmptyCompound => "empty compound selector",
            Self::UnexpectedToken => "unexpected token",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A character the selector lexer cannot start a token with.
    Lex { offset: usize, ch: char },
    /// A structurally invalid selector; `fragment` is the offending slice.
    Parse {
        position: usize,
        kind: ParseErrorKind,
        fragment: String,
    },
    /// Malformed HTML the tolerant parser could not recover.
    HtmlParse(String),
    /// The HTML source could not be read at all.
    Input(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex { offset, ch } => {
                write!(f, "invalid character {ch:?} in selector at offset {offset}")
            }
            Self::Parse {
                position,
                kind,
                fragment,
            } => {
                write!(f, "{} at offset {position}: {fragment:?}", kind.message())
            }
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::Input(msg) => write!(f, "input error: {msg}"),
        }
    }
}

impl StdError for Error {}

mod dom;
mod html;
mod matcher;
mod render;
mod selector;

pub use dom::{Dom, NodeId};
pub use html::parse_html;
pub use matcher::query;
pub use render::{render, Projection, RenderSettings};
pub use selector::{parse_selector, AttrTest, Compound, PseudoClass, Selector};

pub(crate) use dom::{Attr, NodeKind};
