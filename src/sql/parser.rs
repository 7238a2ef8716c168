use thiserror::Error;

use super::ast::*;
use super::lexer::{Lexer, Token};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("only SELECT statements are supported")]
    UnsupportedStatement,
    #[error("query has no FROM clause")]
    MissingFromClause,
    #[error("could not extract a SELECT column list")]
    MalformedSelectClause,
}

/// Recursive-descent parser over the lenient token stream. Clause bodies
/// that fail to parse are ignored rather than fatal; the only hard
/// failures are a non-SELECT statement, a missing FROM, and a SELECT
/// list that is empty after every recovery the tokenizer provides.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn parse(input: &str) -> Result<Query, ParseError> {
        let tokens = Lexer::new(&strip_code_fence(input)).tokenize();
        let mut parser = Self {
            tokens,
            position: 0,
        };
        parser.parse_query()
    }

    fn parse_query(&mut self) -> Result<Query, ParseError> {
        if self.peek() != Some(&Token::Select) {
            return Err(ParseError::UnsupportedStatement);
        }
        self.advance();

        // The projection list is everything between SELECT and FROM.
        let select_run = self.take_until(|t| *t == Token::From);
        if self.peek() != Some(&Token::From) {
            return Err(ParseError::MissingFromClause);
        }
        self.advance();

        let projection = parse_select_items(&select_run);
        if projection.is_empty() {
            return Err(ParseError::MalformedSelectClause);
        }

        let table = match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.advance();
                name
            }
            _ => return Err(ParseError::MissingFromClause),
        };
        // Absorb an optional table alias and any junk before the next clause.
        self.skip_to_clause_keyword();

        let mut filter = None;
        let mut group_by = None;
        let mut order_by = Vec::new();
        let mut limit = None;

        while let Some(token) = self.peek() {
            match token {
                Token::Where => {
                    self.advance();
                    filter = self.parse_or_expr();
                }
                Token::Group => {
                    self.advance();
                    if self.peek() == Some(&Token::By) {
                        self.advance();
                    }
                    group_by = self.parse_group_column();
                    self.skip_to_clause_keyword();
                }
                Token::Order => {
                    self.advance();
                    if self.peek() == Some(&Token::By) {
                        self.advance();
                    }
                    order_by = self.parse_sort_keys();
                }
                Token::Limit => {
                    self.advance();
                    limit = self.parse_limit();
                    self.skip_to_clause_keyword();
                }
                _ => {
                    self.advance();
                }
            }
        }

        Ok(Query {
            projection,
            table,
            filter,
            group_by,
            order_by,
            limit,
        })
    }

    // WHERE grammar: Expr := OrTerm ('OR' OrTerm)*, OrTerm := Condition
    // ('AND' Condition)*, Condition := '(' Expr ')' | leaf.

    fn parse_or_expr(&mut self) -> Option<WhereExpr> {
        let mut terms = Vec::new();
        if let Some(term) = self.parse_and_expr() {
            terms.push(term);
        }
        while self.peek() == Some(&Token::Or) {
            self.advance();
            if let Some(term) = self.parse_and_expr() {
                terms.push(term);
            }
        }
        match terms.len() {
            0 => None,
            1 => terms.pop(),
            _ => Some(WhereExpr::Or(terms)),
        }
    }

    fn parse_and_expr(&mut self) -> Option<WhereExpr> {
        let mut parts = Vec::new();
        if let Some(part) = self.parse_condition() {
            parts.push(part);
        }
        while self.peek() == Some(&Token::And) {
            self.advance();
            if let Some(part) = self.parse_condition() {
                parts.push(part);
            }
        }
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(WhereExpr::And(parts)),
        }
    }

    fn parse_condition(&mut self) -> Option<WhereExpr> {
        if self.peek() == Some(&Token::LParen) {
            self.advance();
            let inner = self.parse_or_expr();
            if self.peek() == Some(&Token::RParen) {
                self.advance();
            }
            return inner;
        }

        let run = self.take_condition_run();
        if run.is_empty() {
            None
        } else {
            Some(WhereExpr::Cond(classify_condition(&run)))
        }
    }

    /// Collect one leaf condition's tokens. Stops at AND/OR/')' and
    /// clause keywords, except that the AND inside `BETWEEN a AND b`
    /// belongs to the condition.
    fn take_condition_run(&mut self) -> Vec<Token> {
        let mut run = Vec::new();
        let mut depth = 0usize;
        let mut between_pending = false;

        while let Some(token) = self.peek() {
            if depth == 0 {
                match token {
                    Token::Or | Token::RParen => break,
                    Token::And if !between_pending => break,
                    Token::And => between_pending = false,
                    t if t.is_clause_keyword() => break,
                    _ => {}
                }
            }
            match token {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                Token::Between => between_pending = true,
                _ => {}
            }
            run.push(token.clone());
            self.advance();
        }
        run
    }

    fn parse_group_column(&mut self) -> Option<String> {
        while let Some(token) = self.peek() {
            if token.is_clause_keyword() {
                break;
            }
            if let Token::Ident(name) = token {
                let name = name.clone();
                self.advance();
                return Some(name);
            }
            self.advance();
        }
        None
    }

    fn parse_sort_keys(&mut self) -> Vec<SortKey> {
        let mut keys = Vec::new();
        while let Some(token) = self.peek() {
            if token.is_clause_keyword() {
                break;
            }
            if let Token::Ident(name) = token {
                let column = name.clone();
                self.advance();
                let ascending = match self.peek() {
                    Some(Token::Desc) => {
                        self.advance();
                        false
                    }
                    Some(Token::Asc) => {
                        self.advance();
                        true
                    }
                    _ => true,
                };
                keys.push(SortKey { column, ascending });
            } else {
                self.advance();
            }
        }
        keys
    }

    fn parse_limit(&mut self) -> Option<usize> {
        if let Some(Token::Number(text)) = self.peek() {
            let text = text.clone();
            self.advance();
            // A negative or unparseable count means no truncation.
            return text.parse::<usize>().ok();
        }
        None
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn take_until(&mut self, stop: impl Fn(&Token) -> bool) -> Vec<Token> {
        let mut run = Vec::new();
        while let Some(token) = self.peek() {
            if stop(token) {
                break;
            }
            run.push(token.clone());
            self.advance();
        }
        run
    }

    fn skip_to_clause_keyword(&mut self) {
        while let Some(token) = self.peek() {
            if token.is_clause_keyword() {
                break;
            }
            self.advance();
        }
    }
}

/// Generators sometimes wrap the statement in a markdown code fence;
/// drop fence lines before lexing.
fn strip_code_fence(input: &str) -> String {
    if !input.contains("```") {
        return input.to_string();
    }
    input
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_select_items(run: &[Token]) -> Vec<SelectItem> {
    split_top_level(run)
        .into_iter()
        .filter_map(parse_select_item)
        .collect()
}

/// Split on commas outside parentheses.
fn split_top_level(run: &[Token]) -> Vec<&[Token]> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    for (i, token) in run.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                entries.push(&run[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&run[start..]);
    entries
}

fn parse_select_item(entry: &[Token]) -> Option<SelectItem> {
    match entry {
        [] => None,
        [Token::Star] => Some(SelectItem::Wildcard),
        [first, rest @ ..] => {
            if let Some(func) = aggregate_fn(first) {
                parse_aggregate_item(func, rest)
            } else if let Token::Ident(source) = first {
                Some(SelectItem::Column {
                    source: source.clone(),
                    alias: parse_alias(rest),
                })
            } else {
                None
            }
        }
    }
}

fn parse_aggregate_item(func: AggregateFn, rest: &[Token]) -> Option<SelectItem> {
    if rest.first() != Some(&Token::LParen) {
        return None;
    }
    let close = rest.iter().position(|t| *t == Token::RParen)?;
    let args = &rest[1..close];

    // `*` means "the whole row"; otherwise the last identifier wins, which
    // also skips a DISTINCT the generator may have slipped in.
    let argument = if args.contains(&Token::Star) {
        None
    } else {
        args.iter().rev().find_map(|t| match t {
            Token::Ident(name) => Some(name.clone()),
            _ => None,
        })
    };

    Some(SelectItem::Aggregate {
        func,
        argument,
        alias: parse_alias(&rest[close + 1..]),
    })
}

fn parse_alias(rest: &[Token]) -> Option<String> {
    match rest {
        [Token::As, Token::Ident(alias), ..] => Some(alias.clone()),
        [Token::Ident(alias), ..] => Some(alias.clone()),
        _ => None,
    }
}

fn aggregate_fn(token: &Token) -> Option<AggregateFn> {
    match token {
        Token::Count => Some(AggregateFn::Count),
        Token::Sum => Some(AggregateFn::Sum),
        Token::Avg => Some(AggregateFn::Avg),
        Token::Min => Some(AggregateFn::Min),
        Token::Max => Some(AggregateFn::Max),
        _ => None,
    }
}

/// Classify a leaf condition's tokens against the fixed pattern order:
/// LIKE, IN, BETWEEN, IS [NOT] NULL, then generic comparison. Tokens that
/// match nothing become the Opaque no-op condition.
fn classify_condition(run: &[Token]) -> Condition {
    parse_like(run)
        .or_else(|| parse_in_list(run))
        .or_else(|| parse_between(run))
        .or_else(|| parse_is_null(run))
        .or_else(|| parse_compare(run))
        .unwrap_or(Condition::Opaque)
}

fn column_before(run: &[Token], index: usize) -> Option<String> {
    match run.get(index.checked_sub(1)?) {
        Some(Token::Ident(name)) => Some(name.clone()),
        _ => None,
    }
}

fn parse_like(run: &[Token]) -> Option<Condition> {
    let at = run.iter().position(|t| *t == Token::Like)?;
    let column = column_before(run, at)?;
    let needle = run[at..].iter().find_map(|t| match t {
        Token::Str(s) => Some(s.trim_matches('%').to_string()),
        _ => None,
    })?;
    Some(Condition::Like { column, needle })
}

fn parse_in_list(run: &[Token]) -> Option<Condition> {
    let at = run.iter().position(|t| *t == Token::In)?;
    let column = column_before(run, at)?;
    let options: Vec<String> = run[at..]
        .iter()
        .filter_map(|t| match t {
            Token::Str(s) => Some(s.clone()),
            Token::Number(n) => Some(n.clone()),
            Token::Ident(w) => Some(w.clone()),
            _ => None,
        })
        .collect();
    if options.is_empty() {
        return None;
    }
    Some(Condition::InList { column, options })
}

fn parse_between(run: &[Token]) -> Option<Condition> {
    let at = run.iter().position(|t| *t == Token::Between)?;
    let column = column_before(run, at)?;
    let bounds: Vec<&str> = run[at..]
        .iter()
        .filter_map(|t| match t {
            Token::Number(n) => Some(n.as_str()),
            Token::Str(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();
    if bounds.len() < 2 {
        return None;
    }
    Some(Condition::Between {
        column,
        low: bounds[0].trim().parse().ok(),
        high: bounds[1].trim().parse().ok(),
    })
}

fn parse_is_null(run: &[Token]) -> Option<Condition> {
    let at = run.iter().position(|t| *t == Token::Is)?;
    let column = column_before(run, at)?;
    run[at..].iter().position(|t| *t == Token::Null)?;
    let negated = run[at..].iter().any(|t| *t == Token::Not);
    Some(Condition::IsNull { column, negated })
}

fn parse_compare(run: &[Token]) -> Option<Condition> {
    let (at, op) = run.iter().enumerate().find_map(|(i, t)| {
        let op = match t {
            Token::Eq => CompareOp::Eq,
            Token::NotEq => CompareOp::NotEq,
            Token::Lt => CompareOp::Lt,
            Token::LtEq => CompareOp::LtEq,
            Token::Gt => CompareOp::Gt,
            Token::GtEq => CompareOp::GtEq,
            _ => return None,
        };
        Some((i, op))
    })?;
    let column = column_before(run, at)?;
    let operand = match run.get(at + 1)? {
        Token::Str(s) => s.clone(),
        Token::Number(n) => n.clone(),
        Token::Ident(w) => w.clone(),
        _ => return None,
    };
    Some(Condition::Compare {
        column,
        op,
        operand,
    })
}
