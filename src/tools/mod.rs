//! Ledger tools and registry
//!
//! The tool set is closed: every tool the model can call is a variant of
//! [`LedgerTool`], resolved from its wire name at dispatch time.

use crate::error::AgentError;
use crate::ledger::{ExpenseRange, Ledger};
use crate::models::ToolDeclaration;
use crate::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerTool {
    GetTotalExpense,
    AddExpense,
    AddIncome,
    GetMoneyBalance,
}

impl LedgerTool {
    /// Declaration order, as sent to the model.
    pub const ALL: [LedgerTool; 4] = [
        LedgerTool::GetTotalExpense,
        LedgerTool::AddExpense,
        LedgerTool::AddIncome,
        LedgerTool::GetMoneyBalance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LedgerTool::GetTotalExpense => "getTotalExpense",
            LedgerTool::AddExpense => "addExpense",
            LedgerTool::AddIncome => "addIncome",
            LedgerTool::GetMoneyBalance => "getMoneyBalance",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            LedgerTool::GetTotalExpense => "Get total expense from date to date.",
            LedgerTool::AddExpense => "Add new expense entry to the expense database.",
            LedgerTool::AddIncome => "Add new income entry to income database",
            LedgerTool::GetMoneyBalance => "Get remaining money balance from database.",
        }
    }

    fn parameters(self) -> Option<Value> {
        match self {
            LedgerTool::GetTotalExpense => Some(json!({
                "type": "object",
                "properties": {
                    "from": {
                        "type": "string",
                        "description": "From date to get the expense."
                    },
                    "to": {
                        "type": "string",
                        "description": "To date to get the expense."
                    }
                }
            })),
            LedgerTool::AddExpense => Some(entry_schema(
                "Name of the expense. e.g., Bought an iphone",
                "Amount of the expense.",
            )),
            LedgerTool::AddIncome => Some(entry_schema(
                "Name of the income. e.g., Got salary",
                "Amount of the income.",
            )),
            LedgerTool::GetMoneyBalance => None,
        }
    }

    pub fn declaration(self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }

    /// Run the tool against the ledger with already-decoded arguments.
    pub async fn execute(self, ledger: &Ledger, arguments: Value) -> Result<String> {
        match self {
            LedgerTool::GetTotalExpense => {
                let args: RangeArgs = decode(self, arguments)?;
                let range = ExpenseRange {
                    from: args.from,
                    to: args.to,
                };
                Ok(ledger.total_expense(&range).await)
            }
            LedgerTool::AddExpense => {
                let entry = EntryArgs::parse(self, arguments)?;
                ledger.record_expense(&entry.name, entry.amount).await
            }
            LedgerTool::AddIncome => {
                let entry = EntryArgs::parse(self, arguments)?;
                ledger.record_income(&entry.name, entry.amount).await
            }
            LedgerTool::GetMoneyBalance => Ok(ledger.balance().await),
        }
    }
}

fn entry_schema(name_description: &str, amount_description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {
                "type": "string",
                "description": name_description
            },
            "amount": {
                "type": "string",
                "description": amount_description
            }
        },
        "required": ["name", "amount"]
    })
}

#[derive(Debug, Deserialize)]
struct RangeArgs {
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEntryArgs {
    name: Option<String>,
    amount: Option<Value>,
}

struct EntryArgs {
    name: String,
    amount: Decimal,
}

impl EntryArgs {
    fn parse(tool: LedgerTool, arguments: Value) -> Result<Self> {
        let raw: RawEntryArgs = decode(tool, arguments)?;

        let name = raw
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                AgentError::ArgumentParse(format!("{} requires a non-empty 'name'", tool.name()))
            })?;

        let amount = raw
            .amount
            .ok_or_else(|| {
                AgentError::ArgumentParse(format!("{} requires an 'amount'", tool.name()))
            })
            .and_then(|value| parse_amount(&value))?;

        Ok(Self { name, amount })
    }
}

fn decode<T: serde::de::DeserializeOwned>(tool: LedgerTool, arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| {
        AgentError::ArgumentParse(format!("{}: {}", tool.name(), e))
    })
}

/// Accepts JSON numbers and numeric strings ("500", " 12.50 ").
pub fn parse_amount(value: &Value) -> Result<Decimal> {
    let parsed = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Decimal::from(i)),
            None => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        },
        Value::String(s) => {
            let trimmed = s.trim();
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .ok()
        }
        _ => None,
    };

    parsed.ok_or_else(|| {
        AgentError::ArgumentParse(format!("'amount' is not a number: {}", value))
    })
}

/// Decode the model's JSON-encoded argument string into an object.
/// Empty and `null` arguments mean "no arguments".
pub fn parse_arguments(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| AgentError::ArgumentParse(format!("arguments are not valid JSON: {}", e)))?;

    match value {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) => Ok(value),
        other => Err(AgentError::ArgumentParse(format!(
            "arguments must be a JSON object, got {}",
            other
        ))),
    }
}

/// Registry of ledger tools, immutable after construction.
pub struct ToolRegistry {
    ledger: Arc<Ledger>,
    declarations: Vec<ToolDeclaration>,
}

impl ToolRegistry {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        let declarations = LedgerTool::ALL
            .into_iter()
            .map(LedgerTool::declaration)
            .collect();

        Self {
            ledger,
            declarations,
        }
    }

    pub fn declarations(&self) -> &[ToolDeclaration] {
        &self.declarations
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn list(&self) -> Vec<&'static str> {
        self.declarations.iter().map(|d| d.name).collect()
    }

    /// Resolve `tool_name` and run it with the raw JSON argument string.
    pub async fn dispatch(&self, tool_name: &str, arguments: &str) -> Result<String> {
        let tool = LedgerTool::from_name(tool_name)
            .ok_or_else(|| AgentError::UnknownTool(tool_name.to_string()))?;

        let arguments = parse_arguments(arguments)?;
        debug!(tool = tool.name(), %arguments, "Dispatching tool");

        tool.execute(&self.ledger, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio_test::assert_ok;

    fn registry() -> ToolRegistry {
        ToolRegistry::new(Arc::new(Ledger::new()))
    }

    #[test]
    fn test_declarations_in_catalog_order() {
        let registry = registry();
        assert_eq!(
            registry.list(),
            vec!["getTotalExpense", "addExpense", "addIncome", "getMoneyBalance"]
        );
        assert!(registry.declarations()[3].parameters.is_none());
        assert_eq!(
            registry.declarations()[1].parameters.as_ref().unwrap()["required"],
            json!(["name", "amount"])
        );
    }

    #[test]
    fn test_name_lookup_is_exhaustive() {
        for tool in LedgerTool::ALL {
            assert_eq!(LedgerTool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(LedgerTool::from_name("deleteExpense"), None);
    }

    #[tokio::test]
    async fn test_add_expense_with_numeric_string() {
        let registry = registry();
        let reply = assert_ok!(
            registry
                .dispatch("addExpense", r#"{"name":"Bought an iphone","amount":" 79999.50 "}"#)
                .await
        );
        assert_eq!(reply, "Added to the expense database.");

        let expenses = registry.ledger().expenses().await;
        assert_eq!(expenses[0].amount, dec!(79999.50));
    }

    #[tokio::test]
    async fn test_add_income_then_balance() {
        let registry = registry();
        assert_ok!(registry.dispatch("addIncome", r#"{"name":"Got salary","amount":1000}"#).await);
        assert_ok!(registry.dispatch("addExpense", r#"{"name":"groceries","amount":250.5}"#).await);

        let balance = assert_ok!(registry.dispatch("getMoneyBalance", "").await);
        assert_eq!(balance, "749.5 INR");

        let total = assert_ok!(
            registry
                .dispatch("getTotalExpense", r#"{"from":"2024-01-01","to":"2024-01-31"}"#)
                .await
        );
        assert_eq!(total, "250.5 INR");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = registry().dispatch("transferFunds", "{}").await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(ref name) if name == "transferFunds"));
        assert!(err.is_tool_error());
    }

    #[tokio::test]
    async fn test_argument_errors() {
        let registry = registry();

        let cases = [
            r#"{"name":"coffee","amount":"five"}"#,
            r#"{"name":"coffee"}"#,
            r#"{"name":"   ","amount":5}"#,
            r#"{"amount":5}"#,
            r#"[1, 2]"#,
            r#"{"name":"coffee","amount":5"#,
            r#"{"name":"coffee","amount":true}"#,
        ];

        for args in cases {
            let err = registry.dispatch("addExpense", args).await.unwrap_err();
            assert!(
                matches!(err, AgentError::ArgumentParse(_)),
                "expected argument error for {}, got {:?}",
                args,
                err
            );
        }

        assert!(registry.ledger().expenses().await.is_empty());
    }

    #[test]
    fn test_parse_arguments_empty_and_null() {
        assert_eq!(parse_arguments("").unwrap(), json!({}));
        assert_eq!(parse_arguments("null").unwrap(), json!({}));
        assert_eq!(parse_arguments(r#"{"a":1}"#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_parse_amount_accepts_negative_and_zero() {
        assert_eq!(parse_amount(&json!(-12)).unwrap(), dec!(-12));
        assert_eq!(parse_amount(&json!("0")).unwrap(), dec!(0));
        assert_eq!(parse_amount(&json!("1e3")).unwrap(), dec!(1000));
    }
}
