//! Equality and range predicates over indexed document fields

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gte,
    Lte,
}

#[derive(Debug, Clone)]
struct Clause {
    field: &'static str,
    op: Op,
    value: String,
}

/// A conjunction of field predicates
///
/// Comparisons are on the string form of the field, which is what the
/// `YYYY-MM` / `YYYY-MM-DD` keys are designed for.
#[derive(Debug, Clone, Default)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    /// Match every live document
    pub fn all() -> Self {
        Self::default()
    }

    fn clause(mut self, field: &'static str, op: Op, value: impl Into<String>) -> Self {
        self.clauses.push(Clause {
            field,
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: &'static str, value: impl Into<String>) -> Self {
        self.clause(field, Op::Eq, value)
    }

    pub fn ne(self, field: &'static str, value: impl Into<String>) -> Self {
        self.clause(field, Op::Ne, value)
    }

    pub fn gte(self, field: &'static str, value: impl Into<String>) -> Self {
        self.clause(field, Op::Gte, value)
    }

    pub fn lte(self, field: &'static str, value: impl Into<String>) -> Self {
        self.clause(field, Op::Lte, value)
    }

    /// Inclusive range `low <= field <= high`
    pub fn between(
        self,
        field: &'static str,
        low: impl Into<String>,
        high: impl Into<String>,
    ) -> Self {
        self.gte(field, low).lte(field, high)
    }

    /// Evaluate the query against a field accessor.
    ///
    /// A field the document doesn't expose never matches.
    pub fn matches<'a, F>(&self, field: F) -> bool
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        self.clauses.iter().all(|clause| match field(clause.field) {
            Some(actual) => match clause.op {
                Op::Eq => actual == clause.value,
                Op::Ne => actual != clause.value,
                Op::Gte => actual >= clause.value.as_str(),
                Op::Lte => actual <= clause.value.as_str(),
            },
            None => false,
        })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return f.write_str("*");
        }
        let parts: Vec<String> = self
            .clauses
            .iter()
            .map(|c| {
                let op = match c.op {
                    Op::Eq => "==",
                    Op::Ne => "!=",
                    Op::Gte => ">=",
                    Op::Lte => "<=",
                };
                format!("{} {} {:?}", c.field, op, c.value)
            })
            .collect();
        f.write_str(&parts.join(" && "))
    }
}
