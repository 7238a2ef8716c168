use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    Group,
    By,
    Order,
    Asc,
    Desc,
    Limit,
    Like,
    In,
    Between,
    Is,
    Null,
    Count,
    Sum,
    Avg,
    Min,
    Max,

    // Literals; numbers keep their raw text because the comparison being
    // evaluated decides how (and whether) they parse.
    Number(String),
    Str(String),
    Ident(String),

    // Operators
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Punctuation
    Star,
    Comma,
    LParen,
    RParen,
}

impl Token {
    pub fn is_clause_keyword(&self) -> bool {
        matches!(
            self,
            Token::From | Token::Where | Token::Group | Token::Order | Token::Limit
        )
    }
}

/// Tokenizer for machine-generated SQL. Keywords match case-insensitively
/// while identifiers and string literals keep their case. Input the
/// generator mangles is absorbed instead of rejected: unknown characters
/// and semicolons are skipped, comments are stripped, and an unterminated
/// string literal runs to the end of the input.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        tokens
    }

    fn next_token(&mut self) -> Option<Token> {
        loop {
            self.skip_whitespace();
            let c = *self.chars.peek()?;

            match c {
                ',' => {
                    self.chars.next();
                    return Some(Token::Comma);
                }
                '(' => {
                    self.chars.next();
                    return Some(Token::LParen);
                }
                ')' => {
                    self.chars.next();
                    return Some(Token::RParen);
                }
                '*' => {
                    self.chars.next();
                    return Some(Token::Star);
                }
                '=' => {
                    self.chars.next();
                    // Tolerate the '==' spelling some generators emit.
                    if self.chars.peek() == Some(&'=') {
                        self.chars.next();
                    }
                    return Some(Token::Eq);
                }
                '<' => {
                    self.chars.next();
                    return Some(match self.chars.peek() {
                        Some('=') => {
                            self.chars.next();
                            Token::LtEq
                        }
                        Some('>') => {
                            self.chars.next();
                            Token::NotEq
                        }
                        _ => Token::Lt,
                    });
                }
                '>' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'=') {
                        self.chars.next();
                        return Some(Token::GtEq);
                    }
                    return Some(Token::Gt);
                }
                '!' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'=') {
                        self.chars.next();
                        return Some(Token::NotEq);
                    }
                    // Stray '!': drop it and keep scanning.
                }
                '-' => {
                    self.chars.next();
                    match self.chars.peek() {
                        Some('-') => self.skip_line_comment(),
                        Some(d) if d.is_ascii_digit() => return Some(self.read_number(true)),
                        // A lone '-' has no meaning in this grammar.
                        _ => {}
                    }
                }
                '/' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'*') {
                        self.chars.next();
                        self.skip_block_comment();
                    }
                }
                '\'' => return Some(self.read_string()),
                '"' | '`' => return Some(self.read_quoted_ident(c)),
                c if c.is_ascii_digit() => return Some(self.read_number(false)),
                c if c.is_alphabetic() || c == '_' => return Some(self.read_word()),
                // Anything else (';', stray punctuation) is junk; skip it.
                _ => {
                    self.chars.next();
                }
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn skip_line_comment(&mut self) {
        for c in self.chars.by_ref() {
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) {
        while let Some(c) = self.chars.next() {
            if c == '*' && self.chars.peek() == Some(&'/') {
                self.chars.next();
                break;
            }
        }
    }

    fn read_string(&mut self) -> Token {
        self.chars.next(); // opening quote
        let mut value = String::new();
        while let Some(c) = self.chars.next() {
            if c == '\'' {
                // '' escapes a quote; anything else ends the literal.
                if self.chars.peek() == Some(&'\'') {
                    value.push('\'');
                    self.chars.next();
                } else {
                    return Token::Str(value);
                }
            } else {
                value.push(c);
            }
        }
        // Unterminated literal: take what we have.
        Token::Str(value)
    }

    fn read_quoted_ident(&mut self, quote: char) -> Token {
        self.chars.next(); // opening quote
        let mut value = String::new();
        while let Some(c) = self.chars.next() {
            if c == quote {
                if self.chars.peek() == Some(&quote) {
                    value.push(quote);
                    self.chars.next();
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        Token::Ident(value)
    }

    fn read_number(&mut self, negative: bool) -> Token {
        let mut text = String::new();
        if negative {
            text.push('-');
        }
        let mut seen_dot = false;
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.chars.next();
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        Token::Number(text)
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }

        match word.to_uppercase().as_str() {
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            "AS" => Token::As,
            "GROUP" => Token::Group,
            "BY" => Token::By,
            "ORDER" => Token::Order,
            "ASC" => Token::Asc,
            "DESC" => Token::Desc,
            "LIMIT" => Token::Limit,
            "LIKE" => Token::Like,
            "IN" => Token::In,
            "BETWEEN" => Token::Between,
            "IS" => Token::Is,
            "NULL" => Token::Null,
            "COUNT" => Token::Count,
            "SUM" => Token::Sum,
            "AVG" => Token::Avg,
            "MIN" => Token::Min,
            "MAX" => Token::Max,
            _ => Token::Ident(word),
        }
    }
}
