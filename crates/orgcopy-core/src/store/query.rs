//! The select-query subset the engine builds and stores execute.
//!
//! Grammar: `SELECT f1, f2 FROM Object [WHERE field = 'value'] [LIMIT n]`.
//! Keywords are case-insensitive; string values use single quotes with `\'` and
//! `\\` escapes.

use logos::Logos;

use crate::error::StoreError;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[token("select", ignore(ascii_case))]
    Select,
    #[token("from", ignore(ascii_case))]
    From,
    #[token("where", ignore(ascii_case))]
    Where,
    #[token("limit", ignore(ascii_case))]
    Limit,
    #[token(",")]
    Comma,
    #[token("=")]
    Eq,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"'([^'\\]|\\.)*'", |lex| {
        let s = lex.slice();
        unescape(&s[1..s.len() - 1])
    })]
    Str(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<usize>().ok())]
    Int(usize),
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// A select query in the supported subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    object: String,
    fields: Vec<String>,
    filter: Option<(String, String)>,
    limit: Option<usize>,
}

impl SelectQuery {
    /// Start a query over an object type.
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            fields: Vec::new(),
            filter: None,
            limit: None,
        }
    }

    /// Select these fields, skipping names already selected.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !self.fields.contains(&field) {
                self.fields.push(field);
            }
        }
        self
    }

    /// Restrict to rows where `field` equals `value`.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some((field.into(), value.into()));
        self
    }

    /// Cap the number of rows.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Object type queried.
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Selected fields in order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Equality filter, if any.
    pub fn filter(&self) -> Option<(&str, &str)> {
        self.filter.as_ref().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    /// Row limit, if any.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Render the query string.
    pub fn to_query_string(&self) -> String {
        let mut out = format!("SELECT {} FROM {}", self.fields.join(", "), self.object);
        if let Some((field, value)) = &self.filter {
            out.push_str(&format!(" WHERE {} = '{}'", field, escape(value)));
        }
        if let Some(limit) = self.limit {
            out.push_str(&format!(" LIMIT {}", limit));
        }
        out
    }

    /// Parse a query string in the supported subset.
    pub fn parse(source: &str) -> Result<Self, StoreError> {
        let mut tokens = Vec::new();
        for (token, span) in Token::lexer(source).spanned() {
            match token {
                Ok(token) => tokens.push(token),
                Err(()) => {
                    return Err(StoreError::InvalidQuery(format!(
                        "unexpected input at offset {}: {:?}",
                        span.start,
                        &source[span.clone()]
                    )))
                }
            }
        }
        QueryParser {
            tokens: tokens.into_iter(),
        }
        .parse()
    }
}

impl std::fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

struct QueryParser {
    tokens: std::vec::IntoIter<Token>,
}

impl QueryParser {
    fn parse(mut self) -> Result<SelectQuery, StoreError> {
        self.expect(Token::Select)?;

        let mut fields = vec![self.expect_ident()?];
        let object = loop {
            match self.next()? {
                Token::Comma => fields.push(self.expect_ident()?),
                Token::From => break self.expect_ident()?,
                other => return Err(unexpected("',' or FROM", &other)),
            }
        };

        let mut query = SelectQuery::new(object).with_fields(fields);
        let mut next = self.tokens.next();

        if next == Some(Token::Where) {
            let field = self.expect_ident()?;
            self.expect(Token::Eq)?;
            let value = match self.next()? {
                Token::Str(value) => value,
                other => return Err(unexpected("quoted value", &other)),
            };
            query = query.where_eq(field, value);
            next = self.tokens.next();
        }

        if next == Some(Token::Limit) {
            match self.next()? {
                Token::Int(limit) => query = query.with_limit(Some(limit)),
                other => return Err(unexpected("row limit", &other)),
            }
            next = self.tokens.next();
        }

        match next {
            None => Ok(query),
            Some(other) => Err(unexpected("end of query", &other)),
        }
    }

    fn next(&mut self) -> Result<Token, StoreError> {
        self.tokens
            .next()
            .ok_or_else(|| StoreError::InvalidQuery("unexpected end of query".to_string()))
    }

    fn expect(&mut self, expected: Token) -> Result<(), StoreError> {
        let token = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(unexpected(&format!("{:?}", expected), &token))
        }
    }

    fn expect_ident(&mut self) -> Result<String, StoreError> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            other => Err(unexpected("identifier", &other)),
        }
    }
}

fn unexpected(expected: &str, found: &Token) -> StoreError {
    StoreError::InvalidQuery(format!("expected {}, found {:?}", expected, found))
}
