//! Month summary
//!
//! Per-budget spending for one month, with a synthetic "Total" row that is
//! never stored.

use std::collections::HashMap;

use crate::models::{Budget, Expense, Month, TOTAL_BUDGET_NAME};

/// Spending against one budget
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetRow {
    pub name: String,
    pub value: f64,
    pub spent: f64,
}

impl BudgetRow {
    pub fn remaining(&self) -> f64 {
        self.value - self.spent
    }

    pub fn is_overspent(&self) -> bool {
        self.spent > self.value
    }
}

/// Spending per budget for one month
#[derive(Debug, Clone, PartialEq)]
pub struct MonthSummary {
    pub month: Month,
    /// Most remaining first
    pub rows: Vec<BudgetRow>,
    /// Sum of every budget value and every expense cost of the month
    pub total: BudgetRow,
}

impl MonthSummary {
    /// Summarize a month's budgets and expenses.
    ///
    /// Expenses are matched to budgets by name. Duplicate budgets each get
    /// a row showing the full spending under their name.
    pub fn compute(month: Month, budgets: &[Budget], expenses: &[Expense]) -> Self {
        let mut spent_by_budget: HashMap<&str, f64> = HashMap::new();
        for expense in expenses {
            *spent_by_budget.entry(expense.budget.as_str()).or_default() += expense.cost;
        }

        let mut rows: Vec<BudgetRow> = budgets
            .iter()
            .map(|budget| BudgetRow {
                name: budget.name.clone(),
                value: budget.value,
                spent: spent_by_budget
                    .get(budget.name.as_str())
                    .copied()
                    .unwrap_or_default(),
            })
            .collect();
        rows.sort_by(|a, b| b.remaining().total_cmp(&a.remaining()));

        let total = BudgetRow {
            name: TOTAL_BUDGET_NAME.to_string(),
            value: budgets.iter().map(|b| b.value).sum(),
            spent: expenses.iter().map(|e| e.cost).sum(),
        };

        Self { month, rows, total }
    }

    /// Rows followed by the total row
    pub fn rows_with_total(&self) -> impl Iterator<Item = &BudgetRow> {
        self.rows.iter().chain(std::iter::once(&self.total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetDraft, ExpenseDraft};

    fn budget(name: &str, value: f64) -> Budget {
        Budget::from_draft(name.to_lowercase(), BudgetDraft::new(name, "2025-03", value))
    }

    fn expense(cost: f64, budget: &str) -> Expense {
        Expense::from_draft(
            format!("{}-{}", budget, cost),
            ExpenseDraft::new(cost, "Thing", budget, "2025-03-10"),
        )
    }

    #[test]
    fn test_rows_sorted_by_remaining() {
        let month = Month::new(2025, 3).unwrap();
        let budgets = vec![budget("Food", 300.0), budget("Fun", 50.0), budget("Rent", 1000.0)];
        let expenses = vec![
            expense(120.0, "Food"),
            expense(30.0, "Food"),
            expense(80.0, "Fun"),
            expense(1000.0, "Rent"),
        ];

        let summary = MonthSummary::compute(month, &budgets, &expenses);

        let order: Vec<_> = summary.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["Food", "Rent", "Fun"]);
        assert_eq!(summary.rows[0].spent, 150.0);
        assert!(summary.rows[2].is_overspent());
        assert_eq!(summary.rows[2].remaining(), -30.0);
    }

    #[test]
    fn test_total_row() {
        let month = Month::new(2025, 3).unwrap();
        let budgets = vec![budget("Food", 300.0), budget("Fun", 50.0)];
        let expenses = vec![expense(20.0, "Food"), expense(5.0, "Gone")];

        let summary = MonthSummary::compute(month, &budgets, &expenses);

        assert_eq!(summary.total.name, TOTAL_BUDGET_NAME);
        assert_eq!(summary.total.value, 350.0);
        assert_eq!(summary.total.spent, 25.0);
        assert_eq!(summary.rows_with_total().count(), 3);
    }

    #[test]
    fn test_empty_month() {
        let summary = MonthSummary::compute(Month::new(2025, 3).unwrap(), &[], &[]);
        assert!(summary.rows.is_empty());
        assert_eq!(summary.total.remaining(), 0.0);
    }
}
