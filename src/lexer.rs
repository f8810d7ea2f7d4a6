//! Minimal tokeniser.
//!
//! Character-level scanning is treated as an external collaborator's job,
//! handing the parser a raw token stream; this crate has no separate
//! crate to delegate that to, so this module is the thin bridge: plain
//! upper-stropping scanning only (no listing side-channel, no alternate
//! stropping modes), just enough to produce the tokens the parser's first
//! phase consumes.

use regex::Regex;

use crate::diag::{Diagnostics, SourcePos, SourceSpan, Severity};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    /// An upper-stropped reserved word, kept as its exact spelling so the
    /// parser can match on it (`"INT"`, `"BEGIN"`, `"REF"`, ...).
    Keyword(String),
    IntDenotation(String),
    RealDenotation(String),
    BoolDenotation(bool),
    CharDenotation(char),
    StringDenotation(String),
    /// Any operator symbol, predefined or user-declared (`+`, `*:=`, `MOD`
    /// spelled as letters is instead a `Keyword`/`Identifier`-shaped
    /// operator handled by the parser, since Algol 68 allows both symbolic
    /// and word operators).
    Operator(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,
    Becomes,
    Bar,
    At,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: SourceSpan,
}

const KEYWORDS: &[&str] = &[
    "PROGRAM", "BEGIN", "END", "IF", "THEN", "ELSE", "ELIF", "FI", "FOR", "FROM", "BY", "TO",
    "DOWNTO", "WHILE", "DO", "UNTIL", "OD", "CASE", "IN", "OUSE", "OUT", "ESAC", "MODE", "OP",
    "PRIO", "PROC", "REF", "FLEX", "STRUCT", "UNION", "LONG", "SHORT", "INT", "REAL", "BOOL",
    "CHAR", "BITS", "BYTES", "COMPLEX", "STRING", "VOID", "FORMAT", "TRUE", "FALSE", "NIL",
    "SKIP", "EMPTY", "GOTO", "EXIT", "HEAP", "LOC", "IS", "ISNT", "OF", "AT", "PAR", "ANDF",
    "ORF",
];

pub struct Lexer<'a> {
    file: String,
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    real_re: Regex,
    int_re: Regex,
}

impl<'a> Lexer<'a> {
    pub fn new(file: impl Into<String>, src: &'a str) -> Self {
        Lexer {
            file: file.into(),
            src,
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            col: 0,
            real_re: Regex::new(r"^[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?").unwrap(),
            int_re: Regex::new(r"^[0-9]+").unwrap(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn pos_mark(&self) -> SourcePos {
        SourcePos {
            line: self.line,
            col: self.col,
        }
    }

    fn span_from(&self, start: SourcePos) -> SourceSpan {
        SourceSpan {
            file: self.file.clone(),
            start,
            end: self.pos_mark(),
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    // `# comment #` — Algol 68's bracketed comment.
                    self.bump();
                    while let Some(c) = self.peek() {
                        if c == '#' {
                            self.bump();
                            break;
                        }
                        self.bump();
                    }
                }
                Some('C') if self.looks_like_co_comment() => {
                    // `CO comment CO`
                    self.bump_word();
                    loop {
                        if self.looks_like_co_comment() {
                            self.bump_word();
                            break;
                        }
                        if self.bump().is_none() {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn looks_like_co_comment(&self) -> bool {
        self.peek() == Some('C')
            && self.peek_at(1) == Some('O')
            && !self.peek_at(2).map(|c| c.is_alphanumeric()).unwrap_or(false)
    }

    fn bump_word(&mut self) {
        self.bump();
        self.bump();
    }

    fn rest(&self) -> String {
        self.chars[self.pos..].iter().collect()
    }

    /// Produce the full flat token stream for one source file, pushing any
    /// scan errors into `diags` and continuing
    /// (no recovery parsing, but the lexer itself keeps scanning so later
    /// genuine errors aren't hidden by the first one).
    pub fn tokenize(mut self, diags: &mut Diagnostics) -> Vec<Token> {
        let mut out = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos_mark();
            let Some(c) = self.peek() else {
                out.push(Token {
                    kind: TokenKind::Eof,
                    span: self.span_from(start),
                });
                break;
            };
            let tok = if c.is_ascii_digit() {
                self.scan_number(start)
            } else if c.is_alphabetic() || c == '_' {
                self.scan_word(start)
            } else if c == '"' {
                self.scan_string(start, diags)
            } else {
                self.scan_symbol(start, diags)
            };
            if let Some(tok) = tok {
                out.push(tok);
            }
        }
        out
    }

    fn scan_number(&mut self, start: SourcePos) -> Option<Token> {
        let rest = self.rest();
        if let Some(m) = self.real_re.find(&rest) {
            let text = m.as_str().to_string();
            for _ in 0..text.chars().count() {
                self.bump();
            }
            return Some(Token {
                kind: TokenKind::RealDenotation(text),
                span: self.span_from(start),
            });
        }
        let m = self.int_re.find(&rest).expect("caller checked a leading digit");
        let text = m.as_str().to_string();
        for _ in 0..text.chars().count() {
            self.bump();
        }
        Some(Token {
            kind: TokenKind::IntDenotation(text),
            span: self.span_from(start),
        })
    }

    fn scan_word(&mut self, start: SourcePos) -> Option<Token> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let span = self.span_from(start);
        let kind = if KEYWORDS.contains(&text.as_str()) {
            match text.as_str() {
                "TRUE" => TokenKind::BoolDenotation(true),
                "FALSE" => TokenKind::BoolDenotation(false),
                _ => TokenKind::Keyword(text),
            }
        } else if text.chars().next().map(char::is_uppercase).unwrap_or(false)
            && text.chars().all(|c| c.is_uppercase() || c == '_')
        {
            // Per plain upper-stropping convention: an all-uppercase word
            // that is not a reserved keyword is a user-declared operator
            // spelled with letters (`LWB`, `MOD`, ...) or an indicant; the
            // parser disambiguates by context, so both are handed over as
            // ordinary identifiers at the lexical level.
            TokenKind::Identifier(text)
        } else {
            TokenKind::Identifier(text)
        };
        Some(Token { kind, span })
    }

    fn scan_string(&mut self, start: SourcePos, diags: &mut Diagnostics) -> Option<Token> {
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.bump();
                    if self.peek() == Some('"') {
                        // `""` is an escaped quote inside the literal.
                        text.push('"');
                        self.bump();
                        continue;
                    }
                    break;
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
                None => {
                    diags.error(Severity::Scan, Some(self.span_from(start)), "unterminated string denotation");
                    break;
                }
            }
        }
        Some(Token {
            kind: TokenKind::StringDenotation(text),
            span: self.span_from(start),
        })
    }

    fn scan_symbol(&mut self, start: SourcePos, diags: &mut Diagnostics) -> Option<Token> {
        let c = self.bump().unwrap();
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '|' => TokenKind::Bar,
            '@' => TokenKind::At,
            '\'' => {
                // Quote-stropped reserved word: 'begin' ... Treated as a
                // keyword by uppercasing, matching QUOTESTROPPING option.
                let mut text = String::new();
                while let Some(c) = self.peek() {
                    if c == '\'' {
                        self.bump();
                        break;
                    }
                    text.push(c.to_ascii_uppercase());
                    self.bump();
                }
                TokenKind::Keyword(text)
            }
            ':' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Becomes
                } else {
                    TokenKind::Colon
                }
            }
            _ => {
                // Accumulate a run of operator-symbol characters
                // (`+`, `-`, `*`, `/`, `=`, `<`, `>`, `~`, ...).
                let mut text = String::new();
                text.push(c);
                while let Some(c2) = self.peek() {
                    if is_operator_char(c2) {
                        text.push(c2);
                        self.bump();
                    } else {
                        break;
                    }
                }
                if text.is_empty() || !text.chars().all(is_operator_char) {
                    diags.error(Severity::Scan, Some(self.span_from(start)), format!("unrecognized character '{}'", c));
                    return None;
                }
                TokenKind::Operator(text)
            }
        };
        Some(Token {
            kind,
            span: self.span_from(start),
        })
    }
}

fn is_operator_char(c: char) -> bool {
    "+-*/=<>~^&%!?$".contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<TokenKind> {
        let mut diags = Diagnostics::new();
        Lexer::new("t.a68", src)
            .tokenize(&mut diags)
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_keywords_and_identifiers() {
        let t = toks("INT i := 0");
        assert_eq!(
            t,
            vec![
                TokenKind::Keyword("INT".into()),
                TokenKind::Identifier("i".into()),
                TokenKind::Becomes,
                TokenKind::IntDenotation("0".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_real_denotation_before_int() {
        let t = toks("3.14");
        assert_eq!(t, vec![TokenKind::RealDenotation("3.14".into()), TokenKind::Eof]);
    }

    #[test]
    fn skips_hash_comments() {
        let t = toks("INT # comment # i");
        assert_eq!(
            t,
            vec![
                TokenKind::Keyword("INT".into()),
                TokenKind::Identifier("i".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_string_with_escaped_quote() {
        let t = toks("\"a\"\"b\"");
        assert_eq!(t, vec![TokenKind::StringDenotation("a\"b".into()), TokenKind::Eof]);
    }

    #[test]
    fn scans_operator_run() {
        let t = toks("i +:= 1");
        assert_eq!(
            t,
            vec![
                TokenKind::Identifier("i".into()),
                TokenKind::Operator("+:=".into()),
                TokenKind::IntDenotation("1".into()),
                TokenKind::Eof,
            ]
        );
    }
}
