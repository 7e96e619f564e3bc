use clap::Args;
use loan_underwriting::config::AppConfig;
use loan_underwriting::error::AppError;
use loan_underwriting::workflows::underwriting::{
    FinancialStatement, LoanUnderwriter, StatementKind, UnderwritingOutcome,
};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// Requested loan amount
    #[arg(long)]
    pub(crate) amount: Decimal,
    /// Loan term in months (at least 12)
    #[arg(long)]
    pub(crate) term: u32,
    /// Profit and loss statement as JSON (`kind` + categorized `lines`)
    #[arg(long)]
    pub(crate) profit_and_loss: PathBuf,
    /// Balance sheet statement as JSON
    #[arg(long)]
    pub(crate) balance_sheet: PathBuf,
    /// Print the outcome as JSON instead of a report
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_evaluation(args: EvaluateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let underwriter = LoanUnderwriter::new(config.underwriting);

    let profit_and_loss = load_statement(&args.profit_and_loss, StatementKind::ProfitAndLoss)?;
    let balance_sheet = load_statement(&args.balance_sheet, StatementKind::BalanceSheet)?;

    let outcome = underwriter.process(args.amount, args.term, &profit_and_loss, &balance_sheet)?;

    if args.json {
        let rendered = serde_json::to_string_pretty(&outcome)
            .map_err(|err| AppError::Input(format!("unable to render outcome: {err}")))?;
        println!("{rendered}");
    } else {
        render_outcome(args.amount, args.term, &outcome);
    }
    Ok(())
}

/// Reads a statement file, accepting a bare line list as shorthand for `expected`.
pub(crate) fn load_statement(
    path: &Path,
    expected: StatementKind,
) -> Result<FinancialStatement, AppError> {
    let raw = std::fs::read_to_string(path)?;
    parse_statement(&raw, expected)
        .map_err(|err| AppError::Input(format!("{}: {err}", path.display())))
}

fn parse_statement(
    raw: &str,
    expected: StatementKind,
) -> Result<FinancialStatement, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if value.is_array() {
        let lines = serde_json::from_value(value)?;
        return Ok(FinancialStatement::new(expected, lines));
    }
    serde_json::from_value(value)
}

fn render_outcome(amount: Decimal, term: u32, outcome: &UnderwritingOutcome) {
    println!("Loan underwriting evaluation");
    println!("Requested: {amount} over {term} months");
    println!("\nChecks");
    for check in &outcome.checks {
        println!(
            "- {:<22} {:>4}  value {:.4} threshold {}",
            check.rule.label(),
            if check.passed { "pass" } else { "fail" },
            check.value,
            check.threshold
        );
        println!("  {}", check.notes);
    }
    println!("\nDecision: {}", outcome.decision.summary());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bare_line_lists_take_the_expected_kind() {
        let raw = r#"[
            { "accountCategory": "Asset.Current.Cash", "date": "2025-02-01", "balance": 1500.25 }
        ]"#;

        let statement = parse_statement(raw, StatementKind::BalanceSheet).expect("parses");

        assert_eq!(statement.kind, StatementKind::BalanceSheet);
        assert_eq!(statement.lines.len(), 1);
        assert_eq!(statement.lines[0].balance, Decimal::new(150025, 2));
    }

    #[test]
    fn full_statements_keep_their_declared_kind() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{ "kind": "ProfitAndLoss", "lines": [
                {{ "accountCategory": "Income.Operating.Sales", "date": "2025-02-01", "balance": 1000 }}
            ] }}"#
        )
        .expect("write statement");

        let statement =
            load_statement(file.path(), StatementKind::BalanceSheet).expect("statement loads");

        // kind mismatches are left for the underwriter to report
        assert_eq!(statement.kind, StatementKind::ProfitAndLoss);
    }

    #[test]
    fn malformed_files_are_input_errors() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{ not json").expect("write statement");

        match load_statement(file.path(), StatementKind::ProfitAndLoss) {
            Err(AppError::Input(message)) => {
                assert!(message.contains(&file.path().display().to_string()))
            }
            other => panic!("expected input error, got {other:?}"),
        }
    }
}
