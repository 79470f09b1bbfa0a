//! # reparser core
//!
//! A single-pass, regex-driven lexer/parser for inline markup.
//!
//! Callers describe their markup as an ordered list of [`TokenDefinition`]s.
//! The parser compiles them once into one composite automaton and turns any
//! input into a flat, ordered sequence of [`Fragment`]s, each carrying the
//! attributes of every token that covers it. No parse tree is built.
//!
//! ## Quick Start
//!
//! ```rust
//! use reparser_core::{AttrValue, Parser, TokenDefinition};
//!
//! let parser = Parser::new([
//!     TokenDefinition::paired("bold", r"\*\*", r"\*\*").with_attr("bold", true),
//!     TokenDefinition::paired("code", "`", "`").with_skip(true).with_attr("code", true),
//! ])
//! .unwrap();
//!
//! let fragments = parser.parse_to_vec("say **hi** to `**this**`").unwrap();
//! let texts: Vec<_> = fragments.iter().map(|f| f.text.as_str()).collect();
//! assert_eq!(texts, ["say ", "hi", " to ", "**this**"]);
//! assert_eq!(fragments[1].attr("bold"), Some(&AttrValue::Bool(true)));
//! ```
//!
//! ## Malformed markup
//!
//! Parsing never fails because of the input. Unclosed tokens keep styling
//! the rest of the text and stray end delimiters are swallowed:
//!
//! ```rust
//! use reparser_core::{Parser, TokenDefinition};
//!
//! let parser = Parser::new([
//!     TokenDefinition::paired("b", r"\[b\]", r"\[/b\]").with_attr("bold", true),
//! ])
//! .unwrap();
//!
//! let fragments = parser.parse_to_vec("plain[/b] [b]open").unwrap();
//! assert_eq!(fragments.len(), 3);
//! assert_eq!(fragments[2].text, "open");
//! assert!(fragments[2].attr("bold").is_some());
//! ```
//!
//! ## Hooks
//!
//! Implement [`Hooks`] to rewrite the whole input before scanning
//! (`preprocess`) or each plain-text span afterwards (`postprocess`).

mod automaton;
pub mod error;
pub mod fragment;
pub mod parser;
pub mod span;
pub mod token;

pub use error::{ConfigError, HookError, HookStage};
pub use fragment::{Attributes, Fragment};
pub use parser::{Fragments, Hooks, Identity, Parser, ParserOptions};
pub use span::Span;
pub use token::{AttrValue, CaptureRef, Role, TokenDefinition, Transform, ValueSource};
