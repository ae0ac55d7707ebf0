use std::{fmt, iter::Peekable, str::CharIndices};

use super::{CompareOp, SearchError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Ident(String),
    /// Quoted with `'` or `"`.
    Str(String),
    /// Bare `dd/mm/yyyy` or `dd/Mon/yyyy`.
    Date(String),
    /// Delimited by `/`.
    Regex(String),
    Cmp(CompareOp),
    Tilde,
    And,
    Or,
    LParen,
    RParen,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "`{name}`"),
            Token::Str(value) => write!(f, "{value:?}"),
            Token::Date(value) => write!(f, "date {value}"),
            Token::Regex(pattern) => write!(f, "/{pattern}/"),
            Token::Cmp(op) => write!(f, "`{op}`"),
            Token::Tilde => f.write_str("`~`"),
            Token::And => f.write_str("`&`"),
            Token::Or => f.write_str("`|`"),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

/// Token and the byte offset it starts at.
pub(crate) type Spanned = (usize, Token);

/// Split `src` into tokens. The last token is always [`Token::Eof`].
pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, SearchError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        let token = match ch {
            c if c.is_whitespace() => continue,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '&' => {
                next_is(&mut chars, '&');
                Token::And
            }
            '|' => {
                next_is(&mut chars, '|');
                Token::Or
            }
            '=' => {
                next_is(&mut chars, '=');
                Token::Cmp(CompareOp::Eq)
            }
            '!' if next_is(&mut chars, '=') => Token::Cmp(CompareOp::Ne),
            '<' if next_is(&mut chars, '=') => Token::Cmp(CompareOp::Le),
            '<' => Token::Cmp(CompareOp::Lt),
            '>' if next_is(&mut chars, '=') => Token::Cmp(CompareOp::Ge),
            '>' => Token::Cmp(CompareOp::Gt),
            '~' => {
                next_is(&mut chars, '=');
                Token::Tilde
            }
            '\'' | '"' => Token::Str(read_until(&mut chars, ch).ok_or(
                SearchError::Unterminated {
                    position,
                    what: "string",
                },
            )?),
            '/' => Token::Regex(read_until(&mut chars, '/').ok_or(
                SearchError::Unterminated {
                    position,
                    what: "regex",
                },
            )?),
            c if c.is_ascii_alphabetic() || c == '_' => {
                Token::Ident(read_while(&mut chars, c, |c| {
                    c.is_ascii_alphanumeric() || c == '_'
                }))
            }
            c if c.is_ascii_digit() => Token::Date(read_while(&mut chars, c, |c| {
                c.is_ascii_alphanumeric() || c == '/'
            })),
            other => {
                return Err(SearchError::UnexpectedChar {
                    position,
                    ch: other,
                });
            }
        };
        tokens.push((position, token));
    }

    tokens.push((src.len(), Token::Eof));
    Ok(tokens)
}

fn next_is(chars: &mut Peekable<CharIndices<'_>>, expected: char) -> bool {
    chars.next_if(|&(_, c)| c == expected).is_some()
}

fn read_until(chars: &mut Peekable<CharIndices<'_>>, end: char) -> Option<String> {
    let mut out = String::new();
    for (_, c) in chars.by_ref() {
        if c == end {
            return Some(out);
        }
        out.push(c);
    }
    None
}

fn read_while(
    chars: &mut Peekable<CharIndices<'_>>,
    first: char,
    accept: impl Fn(char) -> bool,
) -> String {
    let mut out = String::from(first);
    while let Some((_, c)) = chars.next_if(|&(_, c)| accept(c)) {
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|(_, t)| t).collect()
    }

    #[test]
    fn operators_and_doubled_connectives() {
        assert_eq!(
            kinds("name != 'a' && date >= 01/02/2022 || tag ~ /^s/"),
            vec![
                Token::Ident("name".into()),
                Token::Cmp(CompareOp::Ne),
                Token::Str("a".into()),
                Token::And,
                Token::Ident("date".into()),
                Token::Cmp(CompareOp::Ge),
                Token::Date("01/02/2022".into()),
                Token::Or,
                Token::Ident("tag".into()),
                Token::Tilde,
                Token::Regex("^s".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn quotes_keep_spaces_and_the_other_quote() {
        assert_eq!(
            kinds(r#"name = "it's here""#)[2],
            Token::Str("it's here".into())
        );
    }

    #[test]
    fn positions_are_byte_offsets() {
        let tokens = tokenize("  (name)").unwrap();
        let positions: Vec<usize> = tokens.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, [2, 3, 7, 8]);
    }

    #[test]
    fn lexing_errors() {
        assert!(matches!(
            tokenize("name = 'open"),
            Err(SearchError::Unterminated {
                position: 7,
                what: "string"
            })
        ));
        assert!(matches!(
            tokenize("name ! 'a'"),
            Err(SearchError::UnexpectedChar { position: 5, ch: '!' })
        ));
        assert!(matches!(
            tokenize("name = 'a' # x"),
            Err(SearchError::UnexpectedChar { ch: '#', .. })
        ));
    }
}
