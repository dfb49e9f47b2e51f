//! Budget service
//!
//! Enforces the budget invariants on save and delete: reserved and empty
//! names, positive values, per-month name uniqueness, rename cascades to
//! expenses, and the "no delete while expenses use it" guard.

use tracing::{debug, info, warn};

use super::sort_by_name;
use crate::error::{TallyError, TallyResult};
use crate::models::{mint_id, Budget, BudgetDraft, Month, SaveRequest, TOTAL_BUDGET_NAME};
use crate::storage::{Query, Store};

/// Service for budget management
pub struct BudgetService<'a> {
    store: &'a Store,
}

impl<'a> BudgetService<'a> {
    /// Create a new budget service
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Budgets of a month, sorted by name (case-insensitive)
    pub fn fetch_for_month(&self, month: &str) -> TallyResult<Vec<Budget>> {
        let mut budgets = self.store.budgets.find(&Query::all().eq("month", month))?;
        sort_by_name(&mut budgets);
        Ok(budgets)
    }

    /// Look up a budget by id
    pub fn get(&self, id: &str) -> TallyResult<Budget> {
        self.store
            .budgets
            .get(id)?
            .ok_or_else(|| TallyError::budget_not_found(id))
    }

    /// Check the caller-supplied fields, defaulting a malformed month
    fn validate(draft: &mut BudgetDraft) -> TallyResult<()> {
        if draft.name == TOTAL_BUDGET_NAME {
            return Err(TallyError::Validation(
                "Cannot create budget named \"Total\".".into(),
            ));
        }

        if draft.name.trim().is_empty() {
            return Err(TallyError::Validation(
                "The budget needs a valid name.".into(),
            ));
        }

        // Written this way so NaN is rejected too
        if !(draft.value > 0.0) {
            return Err(TallyError::Validation(
                "The budget needs a valid value.".into(),
            ));
        }

        if Month::parse(&draft.month).is_none() {
            draft.month = Month::current().to_string();
        }

        Ok(())
    }

    /// Fail if another budget in `month` already uses `name`
    fn ensure_unique(&self, month: &str, name: &str, own_id: Option<&str>) -> TallyResult<()> {
        let query = Query::all()
            .eq("month", month)
            .eq("name", name)
            .ne("id", own_id.unwrap_or_default());

        if self.store.budgets.find_one(&query)?.is_some() {
            return Err(TallyError::Validation(
                "A budget with the same name for the same month already exists.".into(),
            ));
        }
        Ok(())
    }

    /// Create or update a budget
    pub fn save(&self, request: SaveRequest<BudgetDraft>) -> TallyResult<Budget> {
        match request {
            SaveRequest::Create(mut draft) => {
                Self::validate(&mut draft)?;
                self.ensure_unique(&draft.month, &draft.name, None)?;

                let budget = self
                    .store
                    .budgets
                    .insert(Budget::from_draft(mint_id(), draft))?;
                debug!(id = %budget.id, name = %budget.name, month = %budget.month, "budget created");
                Ok(budget)
            }
            SaveRequest::Update { id, fields: mut draft } => {
                Self::validate(&mut draft)?;

                let existing = self.get(&id)?;

                // The month of a stored budget never changes, so uniqueness
                // is checked against the month it already lives in.
                self.ensure_unique(&existing.month, &draft.name, Some(&id))?;

                let updated = self.store.budgets.update(&id, |budget| {
                    budget.name = draft.name.clone();
                    budget.value = draft.value;
                })?;

                if existing.name != updated.name {
                    self.cascade_rename(&existing.month, &existing.name, &updated.name)?;
                }
                Ok(updated)
            }
        }
    }

    /// Point every expense of `month` that used `old_name` at `new_name`.
    ///
    /// Expenses are rewritten one by one with no transaction around them. A
    /// crash or a replicated write in between can leave some expenses on the
    /// old name.
    fn cascade_rename(&self, month: &str, old_name: &str, new_name: &str) -> TallyResult<usize> {
        let Some(month) = Month::parse(month) else {
            warn!(month, "budget has a malformed month, skipping rename cascade");
            return Ok(0);
        };

        let query = Query::all()
            .between("date", month.first_day_key(), month.last_day_key())
            .eq("budget", old_name);
        let matching = self.store.expenses.find(&query)?;

        for expense in &matching {
            self.store.expenses.update(&expense.id, |e| {
                e.budget = new_name.to_string();
            })?;
        }

        info!(
            %month,
            from = old_name,
            to = new_name,
            expenses = matching.len(),
            "budget renamed"
        );
        Ok(matching.len())
    }

    /// Delete a budget that no expense uses.
    ///
    /// A budget with expenses may still go when another budget with the same
    /// month and name exists, which happens when two replicas created it.
    pub fn delete(&self, id: &str) -> TallyResult<()> {
        let budget = self.get(id)?;

        if self.has_expenses(&budget)? {
            let copies = self.store.budgets.find(
                &Query::all()
                    .eq("month", budget.month.as_str())
                    .eq("name", budget.name.as_str()),
            )?;

            if copies.len() <= 1 {
                return Err(TallyError::Validation(
                    "There are expenses using this budget. You can't delete a budget with expenses."
                        .into(),
                ));
            }
            info!(id, name = %budget.name, copies = copies.len(), "deleting duplicate budget");
        }

        self.store.budgets.remove(id)
    }

    fn has_expenses(&self, budget: &Budget) -> TallyResult<bool> {
        let Some(month) = Month::parse(&budget.month) else {
            return Ok(false);
        };
        let query = Query::all()
            .between("date", month.first_day_key(), month.last_day_key())
            .eq("budget", budget.name.as_str());
        Ok(self.store.expenses.find_one(&query)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Expense, ExpenseDraft};
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, Store) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path().join("db")).unwrap();
        (temp_dir, store)
    }

    fn create(service: &BudgetService, name: &str, month: &str) -> Budget {
        service
            .save(SaveRequest::Create(BudgetDraft::new(name, month, 200.0)))
            .unwrap()
    }

    fn add_expense(store: &Store, id: &str, budget: &str, date: &str) {
        store
            .expenses
            .insert(Expense::from_draft(
                id.into(),
                ExpenseDraft::new(10.0, "Something", budget, date),
            ))
            .unwrap();
    }

    #[test]
    fn test_total_is_reserved() {
        let (_temp_dir, store) = create_test_store();
        let service = BudgetService::new(&store);

        let err = service
            .save(SaveRequest::Create(BudgetDraft::new("Total", "2025-01", 50.0)))
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(store.budgets.count().unwrap(), 0);
    }

    #[test]
    fn test_rejects_blank_name_and_bad_values() {
        let (_temp_dir, store) = create_test_store();
        let service = BudgetService::new(&store);

        for draft in [
            BudgetDraft::new("   ", "2025-01", 50.0),
            BudgetDraft::new("Food", "2025-01", 0.0),
            BudgetDraft::new("Food", "2025-01", -3.0),
            BudgetDraft::new("Food", "2025-01", f64::NAN),
        ] {
            let err = service.save(SaveRequest::Create(draft)).unwrap_err();
            assert!(err.is_validation());
        }
        assert_eq!(store.budgets.count().unwrap(), 0);
    }

    #[test]
    fn test_malformed_month_defaults_to_current() {
        let (_temp_dir, store) = create_test_store();
        let service = BudgetService::new(&store);

        let budget = create(&service, "Food", "someday");
        assert_eq!(budget.month, Month::current().to_string());
    }

    #[test]
    fn test_non_canonical_month_defaults_to_current() {
        let (_temp_dir, store) = create_test_store();
        let service = BudgetService::new(&store);

        for (name, month) in [("Food", "+2025-1"), ("Rent", "2025- 1"), ("Fun", "-202-01")] {
            let budget = create(&service, name, month);
            assert_eq!(budget.month, Month::current().to_string());
        }
        assert_eq!(
            service
                .fetch_for_month(&Month::current().to_string())
                .unwrap()
                .len(),
            3
        );
    }

    #[test]
    fn test_duplicate_name_in_month_rejected() {
        let (_temp_dir, store) = create_test_store();
        let service = BudgetService::new(&store);

        create(&service, "Food", "2025-01");
        create(&service, "Food", "2025-02");

        let err = service
            .save(SaveRequest::Create(BudgetDraft::new("Food", "2025-01", 10.0)))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.budgets.count().unwrap(), 2);
    }

    #[test]
    fn test_update_keeps_own_name() {
        let (_temp_dir, store) = create_test_store();
        let service = BudgetService::new(&store);
        let budget = create(&service, "Food", "2025-01");

        let updated = service
            .save(SaveRequest::Update {
                id: budget.id.clone(),
                fields: BudgetDraft::new("Food", "2025-01", 450.0),
            })
            .unwrap();

        assert_eq!(updated.value, 450.0);
        assert_eq!(store.budgets.count().unwrap(), 1);
    }

    #[test]
    fn test_update_missing_budget_is_not_found() {
        let (_temp_dir, store) = create_test_store();
        let service = BudgetService::new(&store);

        let err = service
            .save(SaveRequest::Update {
                id: "missing".into(),
                fields: BudgetDraft::new("Food", "2025-01", 10.0),
            })
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rename_cascades_within_month_only() {
        let (_temp_dir, store) = create_test_store();
        let service = BudgetService::new(&store);
        let budget = create(&service, "Food", "2025-01");
        create(&service, "Food", "2025-02");

        add_expense(&store, "e1", "Food", "2025-01-03");
        add_expense(&store, "e2", "Food", "2025-01-31");
        add_expense(&store, "e3", "Food", "2025-02-01");
        add_expense(&store, "e4", "Rent", "2025-01-05");

        service
            .save(SaveRequest::Update {
                id: budget.id,
                fields: BudgetDraft::new("Groceries", "2025-01", 200.0),
            })
            .unwrap();

        let budget_of = |id: &str| store.expenses.get(id).unwrap().unwrap().budget;
        assert_eq!(budget_of("e1"), "Groceries");
        assert_eq!(budget_of("e2"), "Groceries");
        assert_eq!(budget_of("e3"), "Food");
        assert_eq!(budget_of("e4"), "Rent");
    }

    #[test]
    fn test_delete_guarded_by_expenses() {
        let (_temp_dir, store) = create_test_store();
        let service = BudgetService::new(&store);
        let budget = create(&service, "Food", "2025-01");
        add_expense(&store, "e1", "Food", "2025-01-10");

        let err = service.delete(&budget.id).unwrap_err();
        assert!(err.is_validation());
        assert!(store.budgets.get(&budget.id).unwrap().is_some());
    }

    #[test]
    fn test_delete_allowed_when_duplicates_exist() {
        let (_temp_dir, store) = create_test_store();
        let service = BudgetService::new(&store);
        let budget = create(&service, "Food", "2025-01");
        // A second copy, as a replica would have written it
        store
            .budgets
            .insert(Budget::from_draft(
                "replica-copy".into(),
                BudgetDraft::new("Food", "2025-01", 200.0),
            ))
            .unwrap();
        add_expense(&store, "e1", "Food", "2025-01-10");

        service.delete(&budget.id).unwrap();

        let remaining = service.fetch_for_month("2025-01").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "replica-copy");
    }

    #[test]
    fn test_delete_unused_budget() {
        let (_temp_dir, store) = create_test_store();
        let service = BudgetService::new(&store);
        let budget = create(&service, "Food", "2025-01");
        add_expense(&store, "e1", "Food", "2025-02-10");

        service.delete(&budget.id).unwrap();
        assert!(service.delete(&budget.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_fetch_sorted_case_insensitively() {
        let (_temp_dir, store) = create_test_store();
        let service = BudgetService::new(&store);
        create(&service, "rent", "2025-01");
        create(&service, "Food", "2025-01");
        create(&service, "bills", "2025-01");

        let names: Vec<_> = service
            .fetch_for_month("2025-01")
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["bills", "Food", "rent"]);
    }
}
