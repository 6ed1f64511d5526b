//! Tokenizer for CCL source text.
//!
//! Produces a flat token stream with line/column positions. Statements are
//! newline-separated; `#` starts a comment running to end of line. Strings
//! may be single- or double-quoted; bare `/`-prefixed paths are lexed as
//! string literals for convenience.

use crate::PactumError;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum TokenType {
    Permit,
    Deny,
    Require,
    Limit,
    On,
    When,
    Severity,
    Per,
    TimeUnit, // seconds, minutes, hours, days
    Identifier,
    Number,
    StringLit,
    Operator,
    And,
    Or,
    Not,
    Dot,
    Wildcard,
    DoubleWildcard,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Newline,
    Comment,
    Eof,
}

#[derive(Debug, Clone)]
pub(super) struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub line: usize,
    pub column: usize,
}

const WORD_OPERATORS: [&str; 7] = [
    "contains",
    "not_contains",
    "in",
    "not_in",
    "matches",
    "starts_with",
    "ends_with",
];

pub(super) fn tokenize(source: &str) -> Result<Vec<Token>, PactumError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    let mut column = 1;

    let keywords: HashMap<&str, TokenType> = [
        ("permit", TokenType::Permit),
        ("deny", TokenType::Deny),
        ("require", TokenType::Require),
        ("limit", TokenType::Limit),
        ("on", TokenType::On),
        ("when", TokenType::When),
        ("severity", TokenType::Severity),
        ("per", TokenType::Per),
        ("seconds", TokenType::TimeUnit),
        ("second", TokenType::TimeUnit),
        ("minutes", TokenType::TimeUnit),
        ("minute", TokenType::TimeUnit),
        ("hours", TokenType::TimeUnit),
        ("hour", TokenType::TimeUnit),
        ("days", TokenType::TimeUnit),
        ("day", TokenType::TimeUnit),
        ("and", TokenType::And),
        ("or", TokenType::Or),
        ("not", TokenType::Not),
    ]
    .into_iter()
    .collect();

    while pos < chars.len() {
        let ch = chars[pos];

        // Skip spaces and tabs
        if ch == ' ' || ch == '\t' || ch == '\r' {
            pos += 1;
            column += 1;
            continue;
        }

        // Newlines (collapsed: at most one Newline token in a row)
        if ch == '\n' {
            let start_line = line;
            let start_col = column;
            pos += 1;
            line += 1;
            column = 1;
            if let Some(last) = tokens.last() {
                if last.token_type != TokenType::Newline {
                    tokens.push(Token {
                        token_type: TokenType::Newline,
                        value: "\n".to_string(),
                        line: start_line,
                        column: start_col,
                    });
                }
            }
            continue;
        }

        // Comments: # until end of line
        if ch == '#' {
            let start_line = line;
            let start_col = column;
            let mut comment = String::new();
            while pos < chars.len() && chars[pos] != '\n' {
                comment.push(chars[pos]);
                pos += 1;
                column += 1;
            }
            tokens.push(Token {
                token_type: TokenType::Comment,
                value: comment,
                line: start_line,
                column: start_col,
            });
            continue;
        }

        // Single- or double-quoted strings
        if ch == '\'' || ch == '"' {
            let quote = ch;
            let start_line = line;
            let start_col = column;
            pos += 1; // consume opening quote
            column += 1;
            let mut s = String::new();
            while pos < chars.len() && chars[pos] != quote {
                if chars[pos] == '\n' {
                    line += 1;
                    column = 0;
                }
                s.push(chars[pos]);
                pos += 1;
                column += 1;
            }
            if pos >= chars.len() {
                return Err(PactumError::CclSyntax {
                    line: start_line,
                    col: start_col,
                    message: "Unterminated string literal".to_string(),
                });
            }
            pos += 1; // consume closing quote
            column += 1;
            tokens.push(Token {
                token_type: TokenType::StringLit,
                value: s,
                line: start_line,
                column: start_col,
            });
            continue;
        }

        // Single-character punctuation
        if let Some(tt) = match ch {
            '(' => Some(TokenType::LParen),
            ')' => Some(TokenType::RParen),
            '[' => Some(TokenType::LBracket),
            ']' => Some(TokenType::RBracket),
            ',' => Some(TokenType::Comma),
            _ => None,
        } {
            tokens.push(Token {
                token_type: tt,
                value: ch.to_string(),
                line,
                column,
            });
            pos += 1;
            column += 1;
            continue;
        }

        // Operators: !=, <=, >=, <, >, =
        if ch == '!' || ch == '<' || ch == '>' || ch == '=' {
            let start_col = column;
            let two = pos + 1 < chars.len() && chars[pos + 1] == '=';
            let op = match (ch, two) {
                ('!', true) => Some("!="),
                ('<', true) => Some("<="),
                ('>', true) => Some(">="),
                ('<', false) => Some("<"),
                ('>', false) => Some(">"),
                ('=', false) => Some("="),
                _ => None,
            };
            let op = op.ok_or_else(|| PactumError::CclSyntax {
                line,
                col: start_col,
                message: format!("Unexpected character '{}'", ch),
            })?;
            tokens.push(Token {
                token_type: TokenType::Operator,
                value: op.to_string(),
                line,
                column: start_col,
            });
            let len = op.len();
            pos += len;
            column += len;
            continue;
        }

        // Wildcards: ** and *
        if ch == '*' {
            let start_line = line;
            let start_col = column;
            pos += 1;
            column += 1;
            if pos < chars.len() && chars[pos] == '*' {
                pos += 1;
                column += 1;
                tokens.push(Token {
                    token_type: TokenType::DoubleWildcard,
                    value: "**".to_string(),
                    line: start_line,
                    column: start_col,
                });
            } else {
                tokens.push(Token {
                    token_type: TokenType::Wildcard,
                    value: "*".to_string(),
                    line: start_line,
                    column: start_col,
                });
            }
            continue;
        }

        // Numbers (integer or decimal)
        if ch.is_ascii_digit() {
            let start_line = line;
            let start_col = column;
            let mut num = String::new();
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                num.push(chars[pos]);
                pos += 1;
                column += 1;
            }
            if pos + 1 < chars.len() && chars[pos] == '.' && chars[pos + 1].is_ascii_digit() {
                num.push('.');
                pos += 1;
                column += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    num.push(chars[pos]);
                    pos += 1;
                    column += 1;
                }
            }
            tokens.push(Token {
                token_type: TokenType::Number,
                value: num,
                line: start_line,
                column: start_col,
            });
            continue;
        }

        // Identifiers, keywords, and word operators
        if ch.is_ascii_alphabetic() || ch == '_' {
            let start_line = line;
            let start_col = column;
            let mut ident = String::new();
            while pos < chars.len()
                && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_' || chars[pos] == '-')
            {
                ident.push(chars[pos]);
                pos += 1;
                column += 1;
            }

            if WORD_OPERATORS.contains(&ident.as_str()) {
                tokens.push(Token {
                    token_type: TokenType::Operator,
                    value: ident,
                    line: start_line,
                    column: start_col,
                });
                continue;
            }

            let lower = ident.to_lowercase();
            if let Some(kw) = keywords.get(lower.as_str()) {
                tokens.push(Token {
                    token_type: kw.clone(),
                    value: ident,
                    line: start_line,
                    column: start_col,
                });
                continue;
            }

            tokens.push(Token {
                token_type: TokenType::Identifier,
                value: ident,
                line: start_line,
                column: start_col,
            });
            continue;
        }

        // Dot
        if ch == '.' {
            tokens.push(Token {
                token_type: TokenType::Dot,
                value: ".".to_string(),
                line,
                column,
            });
            pos += 1;
            column += 1;
            continue;
        }

        // Bare /-prefixed resource path
        if ch == '/' {
            let start_line = line;
            let start_col = column;
            let mut path = String::new();
            while pos < chars.len() && !chars[pos].is_ascii_whitespace() {
                path.push(chars[pos]);
                pos += 1;
                column += 1;
            }
            tokens.push(Token {
                token_type: TokenType::StringLit,
                value: path,
                line: start_line,
                column: start_col,
            });
            continue;
        }

        return Err(PactumError::CclSyntax {
            line,
            col: column,
            message: format!("Unexpected character '{}'", ch),
        });
    }

    tokens.push(Token {
        token_type: TokenType::Eof,
        value: String::new(),
        line,
        column,
    });

    Ok(tokens)
}
