//! Expense service
//!
//! Validates expenses, infers a budget for new ones from earlier expenses with
//! the same description, and makes sure the budget an expense points at
//! exists in the expense's month.

use tracing::{debug, info};

use super::{sort_by_date_desc, BudgetService};
use crate::error::{TallyError, TallyResult};
use crate::models::{
    mint_id, parse_date, today_string, BudgetDraft, Expense, ExpenseDraft, Month, SaveRequest,
    DEFAULT_BUDGET_VALUE, MISC_BUDGET_NAME,
};
use crate::storage::{Query, Store};

/// Service for expense management
pub struct ExpenseService<'a> {
    store: &'a Store,
}

impl<'a> ExpenseService<'a> {
    /// Create a new expense service
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Expenses of a month, newest first
    pub fn fetch_for_month(&self, month: &Month) -> TallyResult<Vec<Expense>> {
        let mut expenses = self.store.expenses.find(
            &Query::all().between("date", month.first_day_key(), month.last_day_key()),
        )?;
        sort_by_date_desc(&mut expenses);
        Ok(expenses)
    }

    /// Look up an expense by id
    pub fn get(&self, id: &str) -> TallyResult<Expense> {
        self.store
            .expenses
            .get(id)?
            .ok_or_else(|| TallyError::expense_not_found(id))
    }

    fn validate(draft: &mut ExpenseDraft) -> TallyResult<()> {
        if draft.description.trim().is_empty() {
            return Err(TallyError::Validation(
                "The expense needs a valid description.".into(),
            ));
        }

        if !(draft.cost > 0.0) {
            return Err(TallyError::Validation(
                "The expense needs a valid cost.".into(),
            ));
        }

        if parse_date(&draft.date).is_none() {
            draft.date = today_string();
        }

        Ok(())
    }

    /// Budget of the most recent earlier expense with this exact description.
    ///
    /// Ties on date go to the greatest id, so the answer does not depend on
    /// scan order.
    pub fn infer_budget(&self, description: &str) -> TallyResult<Option<String>> {
        let matches = self
            .store
            .expenses
            .find(&Query::all().eq("description", description))?;

        Ok(matches
            .into_iter()
            .filter(|e| !e.budget.is_empty())
            .max_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)))
            .map(|e| e.budget))
    }

    /// Create the budget an expense refers to if its month doesn't have it.
    ///
    /// The existence check and the insert are separate steps; a replica can
    /// create the same budget in between, leaving two copies.
    fn ensure_budget(&self, month: &str, name: &str) -> TallyResult<()> {
        let existing = self
            .store
            .budgets
            .find_one(&Query::all().eq("month", month).eq("name", name))?;

        if existing.is_none() {
            BudgetService::new(self.store).save(SaveRequest::Create(BudgetDraft::new(
                name,
                month,
                DEFAULT_BUDGET_VALUE,
            )))?;
            info!(month, budget = name, "created missing budget for expense");
        }
        Ok(())
    }

    /// Create or update an expense
    pub fn save(&self, request: SaveRequest<ExpenseDraft>) -> TallyResult<Expense> {
        let is_create = request.is_create();
        let (id, mut draft) = match request {
            SaveRequest::Create(draft) => (None, draft),
            SaveRequest::Update { id, fields } => (Some(id), fields),
        };

        Self::validate(&mut draft)?;

        if is_create && (draft.budget.is_empty() || draft.budget == MISC_BUDGET_NAME) {
            if let Some(budget) = self.infer_budget(&draft.description)? {
                debug!(description = %draft.description, %budget, "inferred budget");
                draft.budget = budget;
            }
        }

        if draft.budget.is_empty() {
            draft.budget = MISC_BUDGET_NAME.to_string();
        }

        // validate() guarantees a well-formed date, so the prefix is the month
        let month = draft.date[..7].to_string();
        self.ensure_budget(&month, &draft.budget)?;

        match id {
            None => self.store.expenses.insert(Expense::from_draft(mint_id(), draft)),
            Some(id) => self.store.expenses.update(&id, |expense| {
                expense.cost = draft.cost;
                expense.description = draft.description;
                expense.budget = draft.budget;
                expense.date = draft.date;
            }),
        }
    }

    /// Delete an expense by id
    pub fn delete(&self, id: &str) -> TallyResult<()> {
        self.store.expenses.remove(id)
    }
}
