//! Splits the source of a neighbor script into tokens.

use crate::Error;

/// A single token of the script language. Keywords are returned as
/// identifiers and recognized by the parser.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Token<'src> {
    Ident(&'src str),
    Number(i64),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Incr,
    Decr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Not,
    Eof,
}

/// Lexer over the source text. Positions are byte offsets into the source.
pub struct Lexer<'src> {
    src: &'src str,
    pos: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Lexer { src, pos: 0 }
    }

    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), Error> {
        loop {
            match (self.peek_byte(0), self.peek_byte(1)) {
                (Some(b), _) if b.is_ascii_whitespace() => self.pos += 1,
                (Some(b'/'), Some(b'/')) => {
                    while !matches!(self.peek_byte(0), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let start = self.pos;
                    match self.src[self.pos + 2..].find("*/") {
                        Some(end) => self.pos += end + 4,
                        None => return Err(Error::syntax("comment not closed", start)),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Return the next token together with its starting position. After the
    /// end of the input, [`Token::Eof`] is returned repeatedly.
    pub fn next_token(&mut self) -> Result<(usize, Token<'src>), Error> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(first) = self.peek_byte(0) else {
            return Ok((start, Token::Eof));
        };
        if first.is_ascii_alphabetic() || first == b'_' || first == b'$' {
            while let Some(b) = self.peek_byte(0) {
                if b.is_ascii_alphanumeric() || b == b'_' || b == b'$' {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            return Ok((start, Token::Ident(&self.src[start..self.pos])));
        }
        if first.is_ascii_digit() {
            while matches!(self.peek_byte(0), Some(b) if b.is_ascii_digit()) {
                self.pos += 1;
            }
            let value = self.src[start..self.pos]
                .parse()
                .map_err(|_| Error::syntax("integer literal too large", start))?;
            return Ok((start, Token::Number(value)));
        }
        let second = self.peek_byte(1);
        let third = self.peek_byte(2);
        let (len, token) = match (first, second, third) {
            (b'=', Some(b'='), Some(b'=')) => (3, Token::Eq),
            (b'!', Some(b'='), Some(b'=')) => (3, Token::Ne),
            (b'=', Some(b'='), _) => (2, Token::Eq),
            (b'!', Some(b'='), _) => (2, Token::Ne),
            (b'<', Some(b'='), _) => (2, Token::Le),
            (b'>', Some(b'='), _) => (2, Token::Ge),
            (b'+', Some(b'+'), _) => (2, Token::Incr),
            (b'-', Some(b'-'), _) => (2, Token::Decr),
            (b'+', Some(b'='), _) => (2, Token::PlusAssign),
            (b'-', Some(b'='), _) => (2, Token::MinusAssign),
            (b'*', Some(b'='), _) => (2, Token::StarAssign),
            (b'/', Some(b'='), _) => (2, Token::SlashAssign),
            (b'%', Some(b'='), _) => (2, Token::PercentAssign),
            (b'&', Some(b'&'), _) => (2, Token::And),
            (b'|', Some(b'|'), _) => (2, Token::Or),
            (b'(', _, _) => (1, Token::LParen),
            (b')', _, _) => (1, Token::RParen),
            (b'{', _, _) => (1, Token::LBrace),
            (b'}', _, _) => (1, Token::RBrace),
            (b'[', _, _) => (1, Token::LBracket),
            (b']', _, _) => (1, Token::RBracket),
            (b';', _, _) => (1, Token::Semi),
            (b',', _, _) => (1, Token::Comma),
            (b'=', _, _) => (1, Token::Assign),
            (b'+', _, _) => (1, Token::Plus),
            (b'-', _, _) => (1, Token::Minus),
            (b'*', _, _) => (1, Token::Star),
            (b'/', _, _) => (1, Token::Slash),
            (b'%', _, _) => (1, Token::Percent),
            (b'<', _, _) => (1, Token::Lt),
            (b'>', _, _) => (1, Token::Gt),
            (b'!', _, _) => (1, Token::Not),
            _ => {
                let char = self.src[start..].chars().next().unwrap_or('?');
                return Err(Error::syntax(format!("unexpected character `{char}`"), start));
            }
        };
        self.pos += len;
        Ok((start, token))
    }
}

/// Split the whole source into tokens. The last token is always [`Token::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<(usize, Token<'_>)>, Error> {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    loop {
        let (pos, token) = lexer.next_token()?;
        tokens.push((pos, token));
        if token == Token::Eof {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{tokenize, Token::*};
    use crate::Error;

    #[test]
    fn tokenizing_splits_operators() -> Result<(), Error> {
        let tokens: Vec<_> = tokenize("a+=b++<=c===d&&!e")?
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        assert_eq!(
            tokens,
            vec![
                Ident("a"),
                PlusAssign,
                Ident("b"),
                Incr,
                Le,
                Ident("c"),
                Eq,
                Ident("d"),
                And,
                Not,
                Ident("e"),
                Eof,
            ]
        );
        Ok(())
    }

    #[test]
    fn tokenizing_records_positions() -> Result<(), Error> {
        let tokens = tokenize("  x = 42; // comment\n /* block */ y")?;
        assert_eq!(
            tokens,
            vec![
                (2, Ident("x")),
                (4, Assign),
                (6, Number(42)),
                (8, Semi),
                (34, Ident("y")),
                (35, Eof),
            ]
        );
        Ok(())
    }

    #[test]
    fn tokenizing_unknown_character_returns_error() {
        match tokenize("a # b") {
            Err(Error::Syntax { position, .. }) => assert_eq!(position, 2),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn tokenizing_unclosed_comment_returns_error() {
        match tokenize("a /* b") {
            Err(Error::Syntax { position, .. }) => assert_eq!(position, 2),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn tokenizing_huge_literal_returns_error() {
        assert!(matches!(
            tokenize("99999999999999999999"),
            Err(Error::Syntax { position: 0, .. })
        ));
    }
}
