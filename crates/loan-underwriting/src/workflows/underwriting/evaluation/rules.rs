use rust_decimal::Decimal;

use super::super::domain::FinancialStatement;
use super::config::UnderwritingParameters;
use super::{RuleCheck, StatementError, UnderwritingRule};

pub(crate) const OPERATING_INCOME: &str = "Income.Operating";
pub(crate) const COST_OF_SALES: &str = "Expense.CostOfSales";
pub(crate) const ASSETS: &str = "Asset";
pub(crate) const LOANS_PAYABLE: &str = "Liability.NonCurrent.LoansPayable";

const MONTHS_PER_YEAR: i64 = 12;

/// Passes when the gross margin is strictly above the configured minimum.
pub(crate) fn gross_profit_margin(
    profit_and_loss: &FinancialStatement,
    parameters: &UnderwritingParameters,
) -> Result<RuleCheck, StatementError> {
    let rule = UnderwritingRule::GrossProfitMargin;
    let net_sales = sum_under(profit_and_loss, OPERATING_INCOME, rule)?;
    let cost_of_sales = sum_under(profit_and_loss, COST_OF_SALES, rule)?;
    let gross_profit = net_sales
        .checked_sub(cost_of_sales)
        .ok_or(StatementError::Overflow { rule })?;
    let margin = ratio(gross_profit, net_sales, rule)?;

    let threshold = parameters.min_gross_profit_margin;
    Ok(RuleCheck {
        rule,
        value: margin,
        threshold,
        passed: threshold < margin,
        notes: format!(
            "gross profit {} on net sales {} gives margin {} against minimum {}",
            gross_profit.round_dp(2),
            net_sales.round_dp(2),
            margin.round_dp(4),
            threshold
        ),
    })
}

/// Passes when the monthly repayment is strictly below the configured share of monthly revenue.
pub(crate) fn revenue_to_repayment(
    profit_and_loss: &FinancialStatement,
    loan_amount: Decimal,
    loan_term: u32,
    parameters: &UnderwritingParameters,
) -> Result<RuleCheck, StatementError> {
    let rule = UnderwritingRule::RevenueToRepayment;
    let overflow = StatementError::Overflow { rule };

    let operating_income = sum_under(profit_and_loss, OPERATING_INCOME, rule)?;
    let total_loan_amount = Decimal::ONE
        .checked_add(parameters.loan_commission_percentage)
        .and_then(|factor| loan_amount.checked_mul(factor))
        .ok_or_else(|| overflow.clone())?;

    let monthly_revenue = operating_income
        .checked_div(Decimal::from(MONTHS_PER_YEAR))
        .ok_or_else(|| overflow.clone())?;
    let monthly_payment = total_loan_amount
        .checked_div(Decimal::from(loan_term))
        .ok_or(overflow)?;
    let revenue_percentage = ratio(monthly_payment, monthly_revenue, rule)?;

    let threshold = parameters.revenue_threshold;
    Ok(RuleCheck {
        rule,
        value: revenue_percentage,
        threshold,
        passed: revenue_percentage < threshold,
        notes: format!(
            "monthly payment {} against monthly revenue {} is {} of revenue (limit {})",
            monthly_payment.round_dp(2),
            monthly_revenue.round_dp(2),
            revenue_percentage.round_dp(4),
            threshold
        ),
    })
}

/// Passes when long-term loans over total assets stay at or below the configured maximum.
pub(crate) fn gearing_ratio(
    balance_sheet: &FinancialStatement,
    parameters: &UnderwritingParameters,
) -> Result<RuleCheck, StatementError> {
    let rule = UnderwritingRule::GearingRatio;
    let total_assets = sum_under(balance_sheet, ASSETS, rule)?;
    let total_debt = sum_under(balance_sheet, LOANS_PAYABLE, rule)?;
    let gearing = ratio(total_debt, total_assets, rule)?;

    let threshold = parameters.max_gearing_ratio;
    Ok(RuleCheck {
        rule,
        value: gearing,
        threshold,
        passed: gearing <= threshold,
        notes: format!(
            "debt {} over assets {} gives gearing {} against maximum {}",
            total_debt.round_dp(2),
            total_assets.round_dp(2),
            gearing.round_dp(4),
            threshold
        ),
    })
}

fn sum_under(
    statement: &FinancialStatement,
    prefix: &str,
    rule: UnderwritingRule,
) -> Result<Decimal, StatementError> {
    statement
        .lines_under(prefix)
        .try_fold(Decimal::ZERO, |total, line| {
            total
                .checked_add(line.balance)
                .ok_or(StatementError::Overflow { rule })
        })
}

/// Zero denominators yield a zero ratio.
fn ratio(
    numerator: Decimal,
    denominator: Decimal,
    rule: UnderwritingRule,
) -> Result<Decimal, StatementError> {
    if denominator.is_zero() {
        return Ok(Decimal::ZERO);
    }
    numerator
        .checked_div(denominator)
        .ok_or(StatementError::Overflow { rule })
}
