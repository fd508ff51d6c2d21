//! In-memory ledger
//!
//! Append-only expense and income records with aggregate queries.
//! One ledger is shared by every session of the process.
//!
//! Totals are kept alongside the entries. A write that would push the
//! expense total, the income total or the balance outside the `Decimal`
//! range is refused, so the aggregate queries never fail.

use crate::error::AgentError;
use crate::models::LedgerEntry;
use crate::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Debug, Default)]
struct Book {
    expenses: Vec<LedgerEntry>,
    incomes: Vec<LedgerEntry>,
    expense_total: Decimal,
    income_total: Decimal,
}

impl Book {
    fn balance(&self) -> Option<Decimal> {
        self.income_total.checked_sub(self.expense_total)
    }
}

/// Optional date bounds passed by the model to `getTotalExpense`.
///
/// The bounds are recorded but not applied: the total always covers every
/// expense.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub struct Ledger {
    book: Arc<RwLock<Book>>,
    currency: String,
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_currency(DEFAULT_CURRENCY)
    }

    pub fn with_currency(currency: impl Into<String>) -> Self {
        Self {
            book: Arc::new(RwLock::new(Book::default())),
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub async fn record_expense(&self, name: &str, amount: Decimal) -> Result<String> {
        let mut book = self.book.write().await;

        let expense_total = book
            .expense_total
            .checked_add(amount)
            .filter(|total| book.income_total.checked_sub(*total).is_some())
            .ok_or_else(|| out_of_range("expense", amount))?;

        book.expenses.push(new_entry(name, amount));
        book.expense_total = expense_total;
        debug!(name, %amount, count = book.expenses.len(), "Expense recorded");

        Ok("Added to the expense database.".to_string())
    }

    pub async fn record_income(&self, name: &str, amount: Decimal) -> Result<String> {
        let mut book = self.book.write().await;

        let income_total = book
            .income_total
            .checked_add(amount)
            .filter(|total| total.checked_sub(book.expense_total).is_some())
            .ok_or_else(|| out_of_range("income", amount))?;

        book.incomes.push(new_entry(name, amount));
        book.income_total = income_total;
        debug!(name, %amount, count = book.incomes.len(), "Income recorded");

        Ok("Added to the income database.".to_string())
    }

    pub async fn total_expense(&self, range: &ExpenseRange) -> String {
        debug!(from = ?range.from, to = ?range.to, "Total expense requested (range not applied)");

        let book = self.book.read().await;
        self.format_amount(book.expense_total)
    }

    pub async fn balance(&self) -> String {
        let book = self.book.read().await;
        // Writes keep the balance in range.
        self.format_amount(book.balance().unwrap_or_default())
    }

    pub async fn expenses(&self) -> Vec<LedgerEntry> {
        self.book.read().await.expenses.clone()
    }

    pub async fn incomes(&self) -> Vec<LedgerEntry> {
        self.book.read().await.incomes.clone()
    }

    fn format_amount(&self, amount: Decimal) -> String {
        format!("{} {}", amount.normalize(), self.currency)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

fn new_entry(name: &str, amount: Decimal) -> LedgerEntry {
    LedgerEntry {
        name: name.to_string(),
        amount,
        recorded_at: Utc::now(),
    }
}

fn out_of_range(kind: &str, amount: Decimal) -> AgentError {
    AgentError::AmountOutOfRange(format!(
        "{} of {} would overflow the ledger totals; nothing was recorded",
        kind, amount
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_empty_ledger() {
        let ledger = Ledger::new();
        assert_eq!(ledger.total_expense(&ExpenseRange::default()).await, "0 INR");
        assert_eq!(ledger.balance().await, "0 INR");
    }

    #[tokio::test]
    async fn test_balance_matches_independent_sums() {
        let ledger = Ledger::with_currency("EUR");
        let incomes = [dec!(2500), dec!(120.75), dec!(0), dec!(-20)];
        let expenses = [dec!(19.99), dec!(800), dec!(3.01), dec!(-5), dec!(0.5)];

        // Interleave writes so insertion order differs from the arrays.
        for i in 0..expenses.len() {
            ledger.record_expense("expense", expenses[i]).await.unwrap();
            if let Some(amount) = incomes.get(i) {
                ledger.record_income("income", *amount).await.unwrap();
            }
        }

        let expected = incomes.iter().sum::<Decimal>() - expenses.iter().sum::<Decimal>();
        assert_eq!(ledger.balance().await, format!("{} EUR", expected.normalize()));
        assert_eq!(ledger.balance().await, "1782.25 EUR");
    }

    #[tokio::test]
    async fn test_total_expense_ignores_range() {
        let ledger = Ledger::new();
        ledger.record_expense("rent", dec!(12000)).await.unwrap();
        ledger.record_expense("coffee", dec!(5)).await.unwrap();
        ledger.record_income("salary", dec!(50000)).await.unwrap();

        let unbounded = ledger.total_expense(&ExpenseRange::default()).await;
        let bounded = ledger
            .total_expense(&ExpenseRange {
                from: Some("2020-01-01".to_string()),
                to: Some("2020-01-02".to_string()),
            })
            .await;

        assert_eq!(unbounded, "12005 INR");
        assert_eq!(bounded, unbounded);
    }

    #[tokio::test]
    async fn test_confirmation_messages_and_entries() {
        let ledger = Ledger::new();
        assert_eq!(
            ledger.record_expense("Bought an iphone", dec!(79999)).await.unwrap(),
            "Added to the expense database."
        );
        assert_eq!(
            ledger.record_income("Got salary", dec!(100000)).await.unwrap(),
            "Added to the income database."
        );

        let expenses = ledger.expenses().await;
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].name, "Bought an iphone");
        assert_eq!(expenses[0].amount, dec!(79999));
        assert_eq!(ledger.incomes().await.len(), 1);
        assert_eq!(ledger.balance().await, "20001 INR");
    }

    #[tokio::test]
    async fn test_concurrent_writers_lose_nothing() {
        let ledger = Arc::new(Ledger::new());
        let mut handles = Vec::new();

        for session in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                for _ in 0..25 {
                    ledger.record_expense(&format!("session-{}", session), dec!(2)).await.unwrap();
                    ledger.record_income(&format!("session-{}", session), dec!(3)).await.unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(ledger.expenses().await.len(), 200);
        assert_eq!(ledger.incomes().await.len(), 200);
        assert_eq!(ledger.total_expense(&ExpenseRange::default()).await, "400 INR");
        assert_eq!(ledger.balance().await, "200 INR");
    }

    #[tokio::test]
    async fn test_overflowing_amounts_are_refused() {
        let ledger = Ledger::new();

        ledger.record_expense("yacht", Decimal::MAX).await.unwrap();
        let err = ledger.record_expense("second yacht", Decimal::MAX).await.unwrap_err();
        assert!(matches!(err, AgentError::AmountOutOfRange(_)));
        assert!(err.is_tool_error());

        // A negative income would take the balance below -MAX.
        ledger.record_income("refund", dec!(-1)).await.unwrap_err();

        assert_eq!(ledger.expenses().await.len(), 1);
        assert_eq!(
            ledger.total_expense(&ExpenseRange::default()).await,
            format!("{} INR", Decimal::MAX)
        );
        assert_eq!(ledger.balance().await, format!("{} INR", -Decimal::MAX));

        // Bringing the total back down is still allowed.
        ledger.record_expense("sold yacht", -Decimal::MAX).await.unwrap();
        assert_eq!(ledger.balance().await, "0 INR");
    }
}
