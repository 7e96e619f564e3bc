mod config;
mod policy;
mod rules;

pub use config::UnderwritingParameters;
pub use policy::UnderwritingDecision;

use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationStatus, FinancialStatement, StatementKind, ValidationError,
    MINIMUM_LOAN_TERM_MONTHS,
};
use policy::decide;

/// Stateless evaluator applying the underwriting thresholds to a pair of statements.
///
/// Performs no I/O; the same inputs always produce the same outcome.
#[derive(Debug, Clone)]
pub struct LoanUnderwriter {
    parameters: UnderwritingParameters,
}

impl LoanUnderwriter {
    pub fn new(parameters: UnderwritingParameters) -> Self {
        Self { parameters }
    }

    /// Runs every check and combines them into a decision.
    ///
    /// An `Err` means the inputs could not be evaluated at all, which callers record as
    /// [`ApplicationStatus::UnderwritingFailure`] rather than a rejection.
    pub fn process(
        &self,
        loan_amount: Decimal,
        loan_term: u32,
        profit_and_loss: &FinancialStatement,
        balance_sheet: &FinancialStatement,
    ) -> Result<UnderwritingOutcome, StatementError> {
        if loan_amount <= Decimal::ZERO || loan_term < MINIMUM_LOAN_TERM_MONTHS {
            return Err(StatementError::InvalidLoan(
                ValidationError::InvalidLoanTerms {
                    loan_amount,
                    loan_term,
                },
            ));
        }
        check_structure(profit_and_loss, StatementKind::ProfitAndLoss)?;
        check_structure(balance_sheet, StatementKind::BalanceSheet)?;

        let checks = vec![
            rules::gross_profit_margin(profit_and_loss, &self.parameters)?,
            rules::revenue_to_repayment(profit_and_loss, loan_amount, loan_term, &self.parameters)?,
            rules::gearing_ratio(balance_sheet, &self.parameters)?,
        ];
        let decision = decide(&checks);

        Ok(UnderwritingOutcome { decision, checks })
    }

    /// Collapses [`LoanUnderwriter::process`] into the terminal status it leads to.
    #[cfg(test)]
    pub(crate) fn status_for(
        &self,
        loan_amount: Decimal,
        loan_term: u32,
        profit_and_loss: &FinancialStatement,
        balance_sheet: &FinancialStatement,
    ) -> ApplicationStatus {
        match self.process(loan_amount, loan_term, profit_and_loss, balance_sheet) {
            Ok(outcome) => outcome.status(),
            Err(_) => ApplicationStatus::UnderwritingFailure,
        }
    }
}

fn check_structure(
    statement: &FinancialStatement,
    expected: StatementKind,
) -> Result<(), StatementError> {
    if statement.kind != expected {
        return Err(StatementError::WrongKind {
            expected,
            found: statement.kind,
        });
    }

    if let Some(index) = statement
        .lines
        .iter()
        .position(|line| line.account_category.trim().is_empty())
    {
        return Err(StatementError::MissingCategory {
            kind: expected,
            index,
        });
    }

    let periods: BTreeSet<_> = statement.lines.iter().map(|line| line.date).collect();
    if periods.len() > 1 {
        return Err(StatementError::MultiplePeriods {
            kind: expected,
            periods: periods.len(),
        });
    }

    Ok(())
}

/// The three checks every application must pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnderwritingRule {
    GrossProfitMargin,
    RevenueToRepayment,
    GearingRatio,
}

impl UnderwritingRule {
    pub const fn label(self) -> &'static str {
        match self {
            UnderwritingRule::GrossProfitMargin => "gross profit margin",
            UnderwritingRule::RevenueToRepayment => "revenue to repayment",
            UnderwritingRule::GearingRatio => "gearing ratio",
        }
    }
}

impl fmt::Display for UnderwritingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Computed value of one check next to the threshold it was held against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCheck {
    pub rule: UnderwritingRule,
    pub value: Decimal,
    pub threshold: Decimal,
    pub passed: bool,
    pub notes: String,
}

/// Decision plus the audit trail that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderwritingOutcome {
    pub decision: UnderwritingDecision,
    pub checks: Vec<RuleCheck>,
}

impl UnderwritingOutcome {
    pub fn status(&self) -> ApplicationStatus {
        self.decision.status()
    }

    pub fn check(&self, rule: UnderwritingRule) -> Option<&RuleCheck> {
        self.checks.iter().find(|check| check.rule == rule)
    }
}

/// Statements (or loan terms) that cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatementError {
    #[error("expected a {expected} statement but received {found}")]
    WrongKind {
        expected: StatementKind,
        found: StatementKind,
    },
    #[error("{kind} line {index} has no account category")]
    MissingCategory { kind: StatementKind, index: usize },
    #[error("{kind} spans {periods} reporting periods, expected exactly one")]
    MultiplePeriods { kind: StatementKind, periods: usize },
    #[error("arithmetic overflow while evaluating {rule}")]
    Overflow { rule: UnderwritingRule },
    #[error(transparent)]
    InvalidLoan(ValidationError),
}
