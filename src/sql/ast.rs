// Predicate model - flat condition chains and the evaluator seam
use crate::error::{Error, Result};
use ahash::AHashMap;
use std::fmt;

/// Named join/filter parameters: `"alias.column"` to the row's value.
pub type Parameters = AHashMap<String, String>;

/// Boolean test over a row's (or a row combination's) parameters.
///
/// `validate` runs once before any row is tested and reports structural
/// problems; `evaluate` errors are per-row and callers may recover from them.
pub trait Predicate {
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn evaluate(&self, params: &Parameters) -> Result<bool>;
}

impl<F> Predicate for F
where
    F: Fn(&Parameters) -> Result<bool>,
{
    fn evaluate(&self, params: &Parameters) -> Result<bool> {
        self(params)
    }
}

/// Predicate that accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTrue;

impl Predicate for AlwaysTrue {
    fn evaluate(&self, _params: &Parameters) -> Result<bool> {
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
}

impl Comparator {
    fn apply(self, equal: bool) -> bool {
        match self {
            Comparator::Eq => equal,
            Comparator::Ne => !equal,
        }
    }
}

/// Qualified column reference `relation.column`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub relation: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(relation: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnRef {
            relation: relation.into(),
            column: column.into(),
        }
    }

    /// Parse `alias.column`; both parts must be non-empty.
    pub fn parse(text: &str) -> Option<Self> {
        let (relation, column) = text.split_once('.')?;
        if relation.is_empty() || column.is_empty() || column.contains('.') {
            return None;
        }
        Some(ColumnRef::new(relation, column))
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.relation, self.column)
    }

    fn lookup<'p>(&self, params: &'p Parameters) -> Option<&'p str> {
        let key = self.qualified();
        params
            .get(&key)
            .or_else(|| params.get(&key.to_lowercase()))
            .map(String::as_str)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.relation, self.column)
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Numeric constant, kept in its source text
    Number(String),
    Text(String),
    Column(ColumnRef),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Number(n) => write!(f, "{}", n),
            Operand::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Operand::Column(c) => write!(f, "{}", c),
        }
    }
}

/// One term of a WHERE/ON chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub logic_op: LogicOp,
    pub left: ColumnRef,
    pub comparator: Comparator,
    pub right: Operand,
}

impl Condition {
    pub fn new(logic_op: LogicOp, left: ColumnRef, comparator: Comparator, right: Operand) -> Self {
        Condition {
            logic_op,
            left,
            comparator,
            right,
        }
    }

    /// `left <cmp> right` where both sides are columns
    pub fn columns(
        logic_op: LogicOp,
        left: (&str, &str),
        comparator: Comparator,
        right: (&str, &str),
    ) -> Self {
        Condition::new(
            logic_op,
            ColumnRef::new(left.0, left.1),
            comparator,
            Operand::Column(ColumnRef::new(right.0, right.1)),
        )
    }

    /// `left <cmp> 'text'`
    pub fn text(logic_op: LogicOp, left: (&str, &str), comparator: Comparator, value: &str) -> Self {
        Condition::new(
            logic_op,
            ColumnRef::new(left.0, left.1),
            comparator,
            Operand::Text(value.to_string()),
        )
    }

    /// `left <cmp> number`
    pub fn number(
        logic_op: LogicOp,
        left: (&str, &str),
        comparator: Comparator,
        value: impl fmt::Display,
    ) -> Self {
        Condition::new(
            logic_op,
            ColumnRef::new(left.0, left.1),
            comparator,
            Operand::Number(value.to_string()),
        )
    }

    /// Column references on either side
    pub fn references(&self) -> impl Iterator<Item = &ColumnRef> {
        let right = match &self.right {
            Operand::Column(c) => Some(c),
            _ => None,
        };
        std::iter::once(&self.left).chain(right)
    }

    /// True when every referenced column belongs to `alias`.
    pub fn only_references(&self, alias: &str) -> bool {
        self.references().all(|c| c.relation == alias)
    }

    /// Evaluate against `params`. A missing operand is a non-match.
    pub fn evaluate(&self, params: &Parameters) -> Result<bool> {
        let left = match self.left.lookup(params) {
            Some(v) => v,
            None => return Ok(false),
        };

        let equal = match &self.right {
            Operand::Column(col) => match col.lookup(params) {
                Some(right) => left == right,
                None => return Ok(false),
            },
            Operand::Text(text) => left == text.as_str(),
            Operand::Number(number) => {
                let expected: f64 = number.parse().map_err(|_| {
                    Error::PredicateEvaluation(format!("'{}' is not a number", number))
                })?;
                let actual: f64 = left.trim().parse().map_err(|_| {
                    Error::PredicateEvaluation(format!(
                        "cannot compare {} = '{}' with number {}",
                        self.left, left, number
                    ))
                })?;
                actual == expected
            }
        };

        Ok(self.comparator.apply(equal))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.comparator {
            Comparator::Eq => "=",
            Comparator::Ne => "!=",
        };
        write!(f, "{} {} {}", self.left, op, self.right)
    }
}

/// Flat, left-to-right chain of conditions.
///
/// Each term combines with the value accumulated so far through its own
/// `logic_op`; there is no precedence. The first term's `logic_op` is
/// ignored and an empty chain is always true.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionChain {
    conditions: Vec<Condition>,
}

impl ConditionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_conditions(conditions: Vec<Condition>) -> Self {
        ConditionChain { conditions }
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// No OR connective after the first term.
    pub fn is_conjunctive(&self) -> bool {
        self.conditions
            .iter()
            .skip(1)
            .all(|c| c.logic_op == LogicOp::And)
    }

    /// Terms that can be tested on `alias` alone.
    ///
    /// Only defined for conjunctive chains, where any row rejected by these
    /// terms can never take part in a combination satisfying the chain.
    pub fn restricted_to(&self, alias: &str) -> Option<ConditionChain> {
        if !self.is_conjunctive() {
            return None;
        }
        let local: Vec<Condition> = self
            .conditions
            .iter()
            .filter(|c| c.only_references(alias))
            .cloned()
            .map(|mut c| {
                c.logic_op = LogicOp::And;
                c
            })
            .collect();

        if local.is_empty() {
            None
        } else {
            Some(ConditionChain::from_conditions(local))
        }
    }
}

impl Predicate for ConditionChain {
    fn validate(&self) -> Result<()> {
        for condition in &self.conditions {
            for col in condition.references() {
                if col.relation.is_empty() || col.column.is_empty() {
                    return Err(Error::InvalidPredicate(format!(
                        "incomplete column reference in '{}'",
                        condition
                    )));
                }
            }
            if let Operand::Number(n) = &condition.right {
                if n.parse::<f64>().is_err() {
                    return Err(Error::InvalidPredicate(format!(
                        "'{}' is not a number in '{}'",
                        n, condition
                    )));
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, params: &Parameters) -> Result<bool> {
        let mut terms = self.conditions.iter();
        let mut acc = match terms.next() {
            Some(first) => first.evaluate(params)?,
            None => return Ok(true),
        };

        for condition in terms {
            acc = match condition.logic_op {
                LogicOp::And => acc && condition.evaluate(params)?,
                LogicOp::Or => acc || condition.evaluate(params)?,
            };
        }

        Ok(acc)
    }
}

impl fmt::Display for ConditionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                match condition.logic_op {
                    LogicOp::And => write!(f, " and ")?,
                    LogicOp::Or => write!(f, " or ")?,
                }
            }
            write!(f, "{}", condition)?;
        }
        Ok(())
    }
}
