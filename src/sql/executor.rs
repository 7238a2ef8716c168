use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::ast::*;
use super::parser::{ParseError, Parser};
use crate::storage::infer::parse_date_time;
use crate::storage::table::{Record, Value};
use crate::storage::TableStore;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("no dataset is loaded")]
    NotInitialized,
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Record>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.rows
            .first()
            .map(|row| row.columns().collect())
            .unwrap_or_default()
    }
}

/// Run one query through the pipeline: resolve table, filter, group or
/// aggregate, sort, limit, project. Stored rows are never mutated; every
/// stage works on per-query copies.
pub fn execute_query(store: &TableStore, sql: &str) -> Result<QueryResult, QueryError> {
    if !store.is_initialized() {
        return Err(QueryError::NotInitialized);
    }

    let query = Parser::parse(sql)?;
    let table = store
        .table(&query.table)
        .ok_or_else(|| QueryError::UnknownTable(query.table.clone()))?;

    let mut rows = apply_filter(&table.rows, query.filter.as_ref());

    let aggregated = query.group_by.is_some() || query.has_aggregates();
    if aggregated {
        rows = aggregate_rows(&rows, query.group_by.as_deref(), &query.projection);
    }

    sort_rows(&mut rows, &query.order_by);

    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }

    // Aggregation already shaped its rows from the SELECT list.
    if !aggregated && !query.is_select_star() {
        rows = project_rows(&rows, &query.projection);
    }

    Ok(QueryResult { rows })
}

fn apply_filter(rows: &[Record], filter: Option<&WhereExpr>) -> Vec<Record> {
    match filter {
        None => rows.to_vec(),
        Some(expr) => {
            let input: Vec<usize> = (0..rows.len()).collect();
            eval_expr(expr, &input, rows)
                .into_iter()
                .map(|i| rows[i].clone())
                .collect()
        }
    }
}

/// Set-based evaluation over row indices. AND chains filters left to
/// right; OR evaluates every operand against the same input set and
/// unions the hits, keeping original row order and collapsing duplicates.
fn eval_expr(expr: &WhereExpr, input: &[usize], rows: &[Record]) -> Vec<usize> {
    match expr {
        WhereExpr::And(parts) => parts
            .iter()
            .fold(input.to_vec(), |acc, part| eval_expr(part, &acc, rows)),
        WhereExpr::Or(terms) => {
            let hits: Vec<HashSet<usize>> = terms
                .iter()
                .map(|term| eval_expr(term, input, rows).into_iter().collect())
                .collect();
            input
                .iter()
                .copied()
                .filter(|i| hits.iter().any(|set| set.contains(i)))
                .collect()
        }
        WhereExpr::Cond(cond) => input
            .iter()
            .copied()
            .filter(|&i| matches_condition(cond, &rows[i]))
            .collect(),
    }
}

fn matches_condition(cond: &Condition, row: &Record) -> bool {
    match cond {
        // Substring test on string values only; everything else never
        // matches.
        Condition::Like { column, needle } => match row.get(column) {
            Some(Value::Str(s)) => s.to_lowercase().contains(&needle.to_lowercase()),
            _ => false,
        },
        Condition::InList { column, options } => {
            let text = row
                .get(column)
                .map(|v| v.to_string().to_lowercase())
                .unwrap_or_default();
            options.iter().any(|option| option.to_lowercase() == text)
        }
        Condition::Between { column, low, high } => {
            let (Some(low), Some(high)) = (low, high) else {
                return false;
            };
            match row.get(column).and_then(|v| v.as_number()) {
                Some(n) => n >= *low && n <= *high,
                None => false,
            }
        }
        Condition::IsNull { column, negated } => {
            let blank = row.get(column).map_or(true, |v| v.is_blank());
            blank != *negated
        }
        Condition::Compare {
            column,
            op,
            operand,
        } => matches_compare(row.get(column), *op, operand),
        Condition::Opaque => true,
    }
}

fn matches_compare(value: Option<&Value>, op: CompareOp, operand: &str) -> bool {
    // A null or absent value satisfies only "not equal".
    let Some(value) = value else {
        return op == CompareOp::NotEq;
    };
    if value.is_null() {
        return op == CompareOp::NotEq;
    }

    // Numeric when both sides parse as numbers.
    if let (Some(a), Some(b)) = (value.as_number(), operand.trim().parse::<f64>().ok()) {
        return match op {
            CompareOp::Eq => a == b,
            CompareOp::NotEq => a != b,
            CompareOp::Lt => a < b,
            CompareOp::LtEq => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::GtEq => a >= b,
        };
    }

    // String fallback: equality is case-insensitive, ordering is not.
    let text = value.to_string();
    match op {
        CompareOp::Eq => text.to_lowercase() == operand.to_lowercase(),
        CompareOp::NotEq => text.to_lowercase() != operand.to_lowercase(),
        CompareOp::Lt => text.as_str() < operand,
        CompareOp::LtEq => text.as_str() <= operand,
        CompareOp::Gt => text.as_str() > operand,
        CompareOp::GtEq => text.as_str() >= operand,
    }
}

/// Partition rows by the grouping column and reduce each partition to one
/// output row shaped by the SELECT list. Null, missing and empty grouping
/// values share the "NULL" sentinel group. Groups emit in first-encounter
/// order. Without a grouping column all rows form a single group.
fn aggregate_rows(rows: &[Record], group_by: Option<&str>, items: &[SelectItem]) -> Vec<Record> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (Value, Vec<usize>)> = HashMap::new();

    match group_by {
        Some(column) => {
            for (i, row) in rows.iter().enumerate() {
                let value = row.get(column).filter(|v| !v.is_blank());
                let key = value.map(|v| v.to_string()).unwrap_or_else(|| "NULL".to_string());
                groups
                    .entry(key.clone())
                    .or_insert_with(|| {
                        order.push(key);
                        (value.cloned().unwrap_or(Value::Null), Vec::new())
                    })
                    .1
                    .push(i);
            }
        }
        None => {
            order.push("*".to_string());
            groups.insert("*".to_string(), (Value::Null, (0..rows.len()).collect()));
        }
    }

    order
        .iter()
        .map(|key| {
            let (key_value, members) = &groups[key];
            build_group_row(rows, members, key_value, group_by, items)
        })
        .collect()
}

fn build_group_row(
    rows: &[Record],
    members: &[usize],
    key_value: &Value,
    group_by: Option<&str>,
    items: &[SelectItem],
) -> Record {
    let mut out = Record::new();
    for item in items {
        match item {
            SelectItem::Wildcard => {}
            SelectItem::Column { source, alias } => {
                // Only the grouping column has a defined per-group value;
                // other plain columns are dropped.
                if Some(source.as_str()) == group_by {
                    let name = alias.clone().unwrap_or_else(|| source.clone());
                    out.insert(name, key_value.clone());
                }
            }
            SelectItem::Aggregate { func, argument, .. } => {
                let name = item.output_name().unwrap_or_default();
                out.insert(name, compute_aggregate(*func, argument.as_deref(), members, rows));
            }
        }
    }
    out
}

fn compute_aggregate(
    func: AggregateFn,
    argument: Option<&str>,
    members: &[usize],
    rows: &[Record],
) -> Value {
    match func {
        AggregateFn::Count => Value::Int(members.len() as i64),
        AggregateFn::Sum => Value::Real(coerced_sum(argument, members, rows)),
        AggregateFn::Avg => {
            if members.is_empty() {
                return Value::Null;
            }
            // Divisor is the group's row count, not the count of values
            // that parsed; rows failing coercion contribute 0.
            let mean = coerced_sum(argument, members, rows) / members.len() as f64;
            Value::Real(round2(mean))
        }
        AggregateFn::Min => fold_numeric(argument, members, rows, f64::min),
        AggregateFn::Max => fold_numeric(argument, members, rows, f64::max),
    }
}

fn coerced_sum(argument: Option<&str>, members: &[usize], rows: &[Record]) -> f64 {
    members
        .iter()
        .map(|&i| numeric_argument(argument, &rows[i]).unwrap_or(0.0))
        .sum()
}

fn fold_numeric(
    argument: Option<&str>,
    members: &[usize],
    rows: &[Record],
    pick: fn(f64, f64) -> f64,
) -> Value {
    members
        .iter()
        .filter_map(|&i| numeric_argument(argument, &rows[i]))
        .reduce(pick)
        .map(Value::Real)
        .unwrap_or(Value::Null)
}

fn numeric_argument(argument: Option<&str>, row: &Record) -> Option<f64> {
    row.get(argument?).and_then(|v| v.as_number())
}

fn round2(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

/// Stable multi-key sort. Per key, null or absent values sort last
/// regardless of direction; two nulls tie and fall through to the next
/// key, as do equal values. Ties on every key keep original order.
fn sort_rows(rows: &mut [Record], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for key in keys {
            let ord = compare_by_key(a, b, key);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn compare_by_key(a: &Record, b: &Record, key: &SortKey) -> Ordering {
    let left = a.get(&key.column).filter(|v| !v.is_null());
    let right = b.get(&key.column).filter(|v| !v.is_null());
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(left), Some(right)) => {
            let ord = compare_values(left, right);
            if key.ascending {
                ord
            } else {
                ord.reverse()
            }
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    if let (Value::Str(x), Value::Str(y)) = (a, b) {
        return compare_strings(x, y);
    }
    if let (Some(x), Some(y)) = (numeric_value(a), numeric_value(b)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    let (x, y) = (a.to_string(), b.to_string());
    if let (Some(dx), Some(dy)) = (parse_date_time(&x), parse_date_time(&y)) {
        return dx.cmp(&dy);
    }
    x.cmp(&y)
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Int(_) | Value::Real(_) => value.as_number(),
        _ => None,
    }
}

// Case-insensitive first, raw tiebreak: the ordering ASCII datasets get
// from a collating compare, without a collation dependency.
fn compare_strings(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn project_rows(rows: &[Record], items: &[SelectItem]) -> Vec<Record> {
    rows.iter()
        .map(|row| {
            let mut out = Record::new();
            for item in items {
                match item {
                    SelectItem::Wildcard => {
                        for (name, value) in row.iter() {
                            out.insert(name, value.clone());
                        }
                    }
                    SelectItem::Column { source, alias } => {
                        // Exact, case-sensitive lookup; a missing source
                        // writes nothing rather than a null filler.
                        if let Some(value) = row.get(source) {
                            let name = alias.clone().unwrap_or_else(|| source.clone());
                            out.insert(name, value.clone());
                        }
                    }
                    SelectItem::Aggregate { .. } => {}
                }
            }
            out
        })
        .collect()
}
