//! Recursive-descent parser.
//!
//! ```text
//! or         := and ( '|' and )*
//! and        := primary ( '&' primary )*
//! primary    := '(' or ')' | comparison
//! comparison := FIELD ( CMP | '~' ) value
//! ```

use super::{
    CompareOp, Comparison, Field, SearchError, SearchExpr, TextField, compile_regex,
    lexer::{Spanned, Token},
    parse_date,
};

#[derive(Clone, Copy)]
enum Operator {
    Compare(CompareOp),
    Match,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Operator::Compare(op) => op.as_str(),
            Operator::Match => "~",
        }
    }
}

pub(crate) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) fn parse(mut self) -> Result<SearchExpr, SearchError> {
        if matches!(self.peek(), Token::Eof) {
            return Err(SearchError::Empty);
        }
        let expr = self.or()?;
        self.expect_end()?;
        Ok(expr)
    }

    fn peek(&self) -> &Token {
        // tokenize always ends the stream with Eof and advance never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    fn advance(&mut self) -> Spanned {
        let last = self.tokens.len() - 1;
        let token = self.tokens[self.pos.min(last)].clone();
        if self.pos < last {
            self.pos += 1;
        }
        token
    }

    fn expect_end(&mut self) -> Result<(), SearchError> {
        match self.advance() {
            (_, Token::Eof) => Ok(()),
            (position, found) => Err(SearchError::Unexpected {
                position,
                expected: "`&`, `|` or end of input",
                found: found.to_string(),
            }),
        }
    }

    fn or(&mut self) -> Result<SearchExpr, SearchError> {
        let mut left = self.and()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            let right = self.and()?;
            left = SearchExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<SearchExpr, SearchError> {
        let mut left = self.primary()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            let right = self.primary()?;
            left = SearchExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<SearchExpr, SearchError> {
        if matches!(self.peek(), Token::LParen) {
            self.advance();
            let inner = self.or()?;
            return match self.advance() {
                (_, Token::RParen) => Ok(inner),
                (position, found) => Err(SearchError::Unexpected {
                    position,
                    expected: "`)`",
                    found: found.to_string(),
                }),
            };
        }
        self.comparison().map(SearchExpr::Compare)
    }

    fn comparison(&mut self) -> Result<Comparison, SearchError> {
        let field = match self.advance() {
            (position, Token::Ident(name)) => name
                .parse::<Field>()
                .map_err(|()| SearchError::FieldNotFound {
                    position,
                    field: name,
                })?,
            (position, found) => {
                return Err(SearchError::Unexpected {
                    position,
                    expected: "field name or `(`",
                    found: found.to_string(),
                });
            }
        };

        let op = match self.advance() {
            (_, Token::Cmp(op)) => Operator::Compare(op),
            (_, Token::Tilde) => Operator::Match,
            (position, found) => {
                return Err(SearchError::Unexpected {
                    position,
                    expected: "comparison operator",
                    found: found.to_string(),
                });
            }
        };

        let value = match self.advance() {
            (_, Token::Str(value) | Token::Date(value)) => value,
            (position, Token::Regex(pattern)) => {
                if !matches!(op, Operator::Match) {
                    return Err(SearchError::RegexWithoutMatch { position });
                }
                pattern
            }
            (position, found) => {
                return Err(SearchError::Unexpected {
                    position,
                    expected: "quoted value, date or /regex/",
                    found: found.to_string(),
                });
            }
        };

        build(field, op, value)
    }
}

/// Check `op` against `field` and type the value. With `~` the value is a
/// regex whether it was written quoted or between slashes.
fn build(field: Field, op: Operator, value: String) -> Result<Comparison, SearchError> {
    let wrong = |op: &Operator| SearchError::WrongOperator {
        field,
        op: op.as_str(),
    };

    match field {
        Field::Name | Field::Description | Field::Location => {
            let field = match field {
                Field::Name => TextField::Name,
                Field::Description => TextField::Description,
                _ => TextField::Location,
            };
            Ok(match op {
                Operator::Compare(op) => Comparison::Text {
                    field,
                    op,
                    value,
                },
                Operator::Match => Comparison::TextMatches {
                    field,
                    pattern: compile_regex(value)?,
                },
            })
        }
        Field::Date => match op {
            Operator::Compare(op) => Ok(Comparison::Date {
                op,
                day: parse_date(&value)?,
            }),
            Operator::Match => Err(wrong(&op)),
        },
        Field::Tag => match op {
            Operator::Compare(CompareOp::Eq) => Ok(Comparison::Tag {
                name: value,
                negated: false,
            }),
            Operator::Compare(CompareOp::Ne) => Ok(Comparison::Tag {
                name: value,
                negated: true,
            }),
            Operator::Match => Ok(Comparison::TagMatches {
                pattern: compile_regex(value)?,
            }),
            Operator::Compare(_) => Err(wrong(&op)),
        },
    }
}
