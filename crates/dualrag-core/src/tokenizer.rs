//! Whitespace tokenizer shared by chunking and prompt budgeting
//!
//! A token is a maximal run of non-whitespace characters. Tokens carry their
//! byte range, so any run of tokens maps back to an exact slice of the
//! original text.

use regex::Regex;
use std::sync::LazyLock;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+").expect("token pattern is a valid regex"));

/// Byte range of one token within its source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn as_str<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

pub fn tokenize(text: &str) -> Vec<Token> {
    TOKEN_PATTERN
        .find_iter(text)
        .map(|m| Token {
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

pub fn count_tokens(text: &str) -> usize {
    TOKEN_PATTERN.find_iter(text).count()
}
