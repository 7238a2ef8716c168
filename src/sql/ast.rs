use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub projection: Vec<SelectItem>,
    pub table: String,
    pub filter: Option<WhereExpr>,
    pub group_by: Option<String>,
    pub order_by: Vec<SortKey>,
    pub limit: Option<usize>,
}

impl Query {
    /// A projection of exactly `*` skips the projection stage entirely.
    pub fn is_select_star(&self) -> bool {
        matches!(self.projection.as_slice(), [SelectItem::Wildcard])
    }

    pub fn has_aggregates(&self) -> bool {
        self.projection
            .iter()
            .any(|item| matches!(item, SelectItem::Aggregate { .. }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    Column {
        source: String,
        alias: Option<String>,
    },
    Aggregate {
        func: AggregateFn,
        // None is the `*` argument.
        argument: Option<String>,
        alias: Option<String>,
    },
}

impl SelectItem {
    /// The column name this item produces in output rows: the alias when
    /// one was written, otherwise the item's own source text.
    pub fn output_name(&self) -> Option<String> {
        match self {
            SelectItem::Wildcard => None,
            SelectItem::Column { source, alias } => {
                Some(alias.clone().unwrap_or_else(|| source.clone()))
            }
            SelectItem::Aggregate {
                func,
                argument,
                alias,
            } => Some(alias.clone().unwrap_or_else(|| {
                format!("{}({})", func, argument.as_deref().unwrap_or("*"))
            })),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        };
        write!(f, "{}", name)
    }
}

/// WHERE tree: OR binds loosest, AND next, conditions may parenthesize.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereExpr {
    Or(Vec<WhereExpr>),
    And(Vec<WhereExpr>),
    Cond(Condition),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Case-insensitive substring test on string-typed values.
    Like { column: String, needle: String },
    /// Case-insensitive string equality against any listed option.
    InList { column: String, options: Vec<String> },
    /// Inclusive numeric range; a bound that did not parse matches nothing.
    Between {
        column: String,
        low: Option<f64>,
        high: Option<f64>,
    },
    IsNull { column: String, negated: bool },
    Compare {
        column: String,
        op: CompareOp,
        operand: String,
    },
    /// Condition text no pattern matched. Evaluates as a no-op filter,
    /// a deliberate tolerance for imperfect generated predicates.
    Opaque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub column: String,
    pub ascending: bool,
}
