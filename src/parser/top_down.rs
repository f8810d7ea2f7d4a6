//! Bracket-balance pass over the flat token stream.
//!
//! Runs before the real recursive-descent parse so that a mismatched
//! paren/bracket/brace is reported as a single clear syntax error rather
//! than as a cascade of confusing failures deeper in the grammar. When the
//! `BRACKETS` option is enabled, `[]`/`{}` are folded onto `()` first, so
//! the rest of the pipeline only ever has to deal with one bracket kind.

use crate::diag::{Diagnostics, Severity};
use crate::lexer::{Token, TokenKind};
use crate::options::Options;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    Paren,
    Bracket,
    Brace,
}

/// Validates matching and nesting of `()`/`[]`/`{}`, rewriting `[]`/`{}`
/// tokens to `()` in place when `opts.brackets` is set. Returns `false`
/// (having pushed a syntax error) on any mismatch.
pub fn run(tokens: &mut [Token], opts: &Options, diags: &mut Diagnostics) -> bool {
    let mut stack: Vec<(Open, usize)> = Vec::new();
    let before = diags.error_count();
    for i in 0..tokens.len() {
        if opts.brackets {
            match tokens[i].kind {
                TokenKind::LBracket => tokens[i].kind = TokenKind::LParen,
                TokenKind::RBracket => tokens[i].kind = TokenKind::RParen,
                TokenKind::LBrace => tokens[i].kind = TokenKind::LParen,
                TokenKind::RBrace => tokens[i].kind = TokenKind::RParen,
                _ => {}
            }
        }
        match tokens[i].kind {
            TokenKind::LParen => stack.push((Open::Paren, i)),
            TokenKind::LBracket => stack.push((Open::Bracket, i)),
            TokenKind::LBrace => stack.push((Open::Brace, i)),
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                let want = match tokens[i].kind {
                    TokenKind::RParen => Open::Paren,
                    TokenKind::RBracket => Open::Bracket,
                    _ => Open::Brace,
                };
                match stack.pop() {
                    Some((got, _)) if got == want => {}
                    Some(_) | None => {
                        diags.error(
                            Severity::Syntax,
                            Some(tokens[i].span.clone()),
                            "mismatched closing bracket",
                        );
                    }
                }
            }
            _ => {}
        }
    }
    for (_, idx) in stack {
        diags.error(Severity::Syntax, Some(tokens[idx].span.clone()), "unclosed bracket");
    }
    !diags.should_skip_next_phase(before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn lex(src: &str) -> Vec<Token> {
        let mut diags = Diagnostics::new();
        Lexer::new("t.a68", src).tokenize(&mut diags)
    }

    #[test]
    fn balanced_brackets_pass() {
        let mut toks = lex("(1 + 2) * [3]");
        let opts = Options::default();
        let mut diags = Diagnostics::new();
        assert!(run(&mut toks, &opts, &mut diags));
    }

    #[test]
    fn unclosed_paren_is_a_syntax_error() {
        let mut toks = lex("(1 + 2");
        let opts = Options::default();
        let mut diags = Diagnostics::new();
        assert!(!run(&mut toks, &opts, &mut diags));
    }

    #[test]
    fn brackets_option_folds_square_brackets_to_parens() {
        let mut toks = lex("[1]");
        let mut opts = Options::default();
        opts.brackets = true;
        let mut diags = Diagnostics::new();
        run(&mut toks, &opts, &mut diags);
        assert_eq!(toks[0].kind, TokenKind::LParen);
        assert_eq!(toks[2].kind, TokenKind::RParen);
    }
}
