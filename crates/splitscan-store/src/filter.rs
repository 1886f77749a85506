//! Filter expressions pushed down into the store.
//!
//! The scan engine treats a filter as opaque and hands it to the store with
//! the cursor request. Column references are physical ordinals of the
//! table, not positions in the projection. Evaluation uses SQL three-valued
//! logic: a row passes only when the predicate is definitely true.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use splitscan_common::error::{StoreError, StoreResult};

use crate::types::RawValue;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        };
        write!(f, "{}", s)
    }
}

/// A predicate over one table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpr {
    /// `column <op> literal`.
    Compare {
        /// Physical column ordinal.
        column: usize,
        /// Operator.
        op: CompareOp,
        /// Literal operand.
        value: RawValue,
    },
    /// `column IS NULL`.
    IsNull(usize),
    /// `column IS NOT NULL`.
    IsNotNull(usize),
    /// Conjunction.
    And(Vec<FilterExpr>),
    /// Disjunction.
    Or(Vec<FilterExpr>),
    /// Negation.
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    /// Builds `column <op> value`.
    pub fn compare(column: usize, op: CompareOp, value: RawValue) -> Self {
        FilterExpr::Compare { column, op, value }
    }

    /// Builds `column = value`.
    pub fn eq(column: usize, value: RawValue) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// Builds `column < value`.
    pub fn lt(column: usize, value: RawValue) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    /// Builds `column >= value`.
    pub fn gt_eq(column: usize, value: RawValue) -> Self {
        Self::compare(column, CompareOp::GtEq, value)
    }

    /// Conjoins two predicates.
    pub fn and(self, other: FilterExpr) -> Self {
        match self {
            FilterExpr::And(mut parts) => {
                parts.push(other);
                FilterExpr::And(parts)
            }
            first => FilterExpr::And(vec![first, other]),
        }
    }

    /// Negates the predicate.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        FilterExpr::Not(Box::new(self))
    }

    /// Returns the largest column ordinal referenced, if any.
    pub fn max_column(&self) -> Option<usize> {
        match self {
            FilterExpr::Compare { column, .. }
            | FilterExpr::IsNull(column)
            | FilterExpr::IsNotNull(column) => Some(*column),
            FilterExpr::And(parts) | FilterExpr::Or(parts) => {
                parts.iter().filter_map(FilterExpr::max_column).max()
            }
            FilterExpr::Not(inner) => inner.max_column(),
        }
    }

    /// Evaluates the predicate against a full table row.
    ///
    /// Returns `Ok(true)` only when the predicate is definitely true.
    pub fn matches(&self, row: &[RawValue]) -> StoreResult<bool> {
        Ok(self.evaluate(row)? == Some(true))
    }

    fn evaluate(&self, row: &[RawValue]) -> StoreResult<Option<bool>> {
        let column = |index: usize| {
            row.get(index).ok_or_else(|| {
                StoreError::InvalidFilter(format!(
                    "column {} out of range for {} columns",
                    index,
                    row.len()
                ))
            })
        };

        match self {
            FilterExpr::Compare {
                column: index,
                op,
                value,
            } => {
                let lhs = column(*index)?;
                if lhs.is_null() || value.is_null() {
                    return Ok(None);
                }
                match lhs.compare(value) {
                    Some(ordering) => Ok(Some(op.holds(ordering))),
                    None => Err(StoreError::InvalidFilter(format!(
                        "cannot compare {} with {}",
                        lhs.kind(),
                        value.kind()
                    ))),
                }
            }
            FilterExpr::IsNull(index) => Ok(Some(column(*index)?.is_null())),
            FilterExpr::IsNotNull(index) => Ok(Some(!column(*index)?.is_null())),
            FilterExpr::And(parts) => {
                let mut result = Some(true);
                for part in parts {
                    match part.evaluate(row)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                Ok(result)
            }
            FilterExpr::Or(parts) => {
                let mut result = Some(false);
                for part in parts {
                    match part.evaluate(row)? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                Ok(result)
            }
            FilterExpr::Not(inner) => Ok(inner.evaluate(row)?.map(|b| !b)),
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Compare { column, op, value } => write!(f, "#{} {} {}", column, op, value),
            FilterExpr::IsNull(column) => write!(f, "#{} IS NULL", column),
            FilterExpr::IsNotNull(column) => write!(f, "#{} IS NOT NULL", column),
            FilterExpr::And(parts) => write_joined(f, parts, "AND"),
            FilterExpr::Or(parts) => write_joined(f, parts, "OR"),
            FilterExpr::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[FilterExpr], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        write!(f, "{}", part)?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Vec<RawValue> {
        vec![
            RawValue::Int(7),
            RawValue::String("alice".into()),
            RawValue::Null,
        ]
    }

    #[test]
    fn test_compare() {
        assert!(FilterExpr::eq(0, RawValue::Int(7)).matches(&row()).unwrap());
        assert!(!FilterExpr::lt(0, RawValue::Int(7)).matches(&row()).unwrap());
        assert!(FilterExpr::gt_eq(0, RawValue::Double(6.5)).matches(&row()).unwrap());
        assert!(FilterExpr::eq(1, RawValue::String("alice".into()))
            .matches(&row())
            .unwrap());
    }

    #[test]
    fn test_null_semantics() {
        // NULL = 1 is unknown, and so is its negation.
        let pred = FilterExpr::eq(2, RawValue::Int(1));
        assert!(!pred.matches(&row()).unwrap());
        assert!(!pred.clone().not().matches(&row()).unwrap());

        assert!(FilterExpr::IsNull(2).matches(&row()).unwrap());
        assert!(FilterExpr::IsNotNull(0).matches(&row()).unwrap());
    }

    #[test]
    fn test_and_or() {
        let both = FilterExpr::eq(0, RawValue::Int(7)).and(FilterExpr::IsNull(2));
        assert!(both.matches(&row()).unwrap());

        let unknown_or_true = FilterExpr::Or(vec![
            FilterExpr::eq(2, RawValue::Int(1)),
            FilterExpr::eq(0, RawValue::Int(7)),
        ]);
        assert!(unknown_or_true.matches(&row()).unwrap());

        let unknown_and_true = FilterExpr::eq(2, RawValue::Int(1)).and(FilterExpr::IsNull(2));
        assert!(!unknown_and_true.matches(&row()).unwrap());
    }

    #[test]
    fn test_invalid_filters() {
        let out_of_range = FilterExpr::IsNull(9);
        assert!(matches!(
            out_of_range.matches(&row()),
            Err(StoreError::InvalidFilter(_))
        ));

        let mismatched = FilterExpr::eq(1, RawValue::Int(3));
        assert!(mismatched.matches(&row()).is_err());
    }

    #[test]
    fn test_max_column_and_display() {
        let pred = FilterExpr::eq(0, RawValue::Int(1)).and(FilterExpr::IsNull(4));
        assert_eq!(pred.max_column(), Some(4));
        assert_eq!(pred.to_string(), "(#0 = 1 AND #4 IS NULL)");
    }
}
