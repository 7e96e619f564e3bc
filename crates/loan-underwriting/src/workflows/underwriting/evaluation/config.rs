use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Thresholds applied to every application, expressed as decimal fractions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderwritingParameters {
    pub min_gross_profit_margin: Decimal,
    pub loan_commission_percentage: Decimal,
    pub revenue_threshold: Decimal,
    pub max_gearing_ratio: Decimal,
}

impl Default for UnderwritingParameters {
    fn default() -> Self {
        Self {
            min_gross_profit_margin: Decimal::new(4, 1),
            loan_commission_percentage: Decimal::new(1, 1),
            revenue_threshold: Decimal::new(5, 1),
            max_gearing_ratio: Decimal::new(5, 1),
        }
    }
}
