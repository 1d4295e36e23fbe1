use serde::Serialize;

/// One enrolled subject with its fixed fee and any recorded result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentFeeRecord {
    pub subject_name: String,
    pub standard_fee: f64,
    pub marks: Option<f64>,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConcessionRecord {
    pub reason: String,
    pub discount_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub subject_name: String,
    pub amount: f64,
    pub payment_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub raw_total: f64,
    pub discount_amount: f64,
    pub total_due: f64,
    pub total_paid: f64,
    pub balance: f64,
}

/// Summary plus the rendered concession list, both derived from the same
/// concession traversal so they cannot drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct FeePosition {
    pub summary: FinancialSummary,
    pub active_concessions: String,
}

/// Combine the three record sets for one student into a fee position.
///
/// Concession percentages are additive and capped at 100; a negative sum is
/// not clamped and raises the due amount. An overpaid account yields a
/// negative balance (credit). Empty inputs yield the all-zero summary and an
/// empty description string.
pub fn compute_fee_position(
    enrollments: &[EnrollmentFeeRecord],
    concessions: &[ConcessionRecord],
    payments: &[PaymentRecord],
) -> FeePosition {
    let raw_total: f64 = enrollments.iter().map(|e| e.standard_fee).sum();

    let mut total_discount_percent: f64 = 0.0;
    let mut rendered: Vec<String> = Vec::with_capacity(concessions.len());
    for c in concessions {
        total_discount_percent += c.discount_percent;
        rendered.push(format!("{} ({}%)", c.reason, c.discount_percent));
    }
    if total_discount_percent > 100.0 {
        total_discount_percent = 100.0;
    }

    let discount_amount = raw_total * total_discount_percent / 100.0;
    let total_due = raw_total - discount_amount;
    let total_paid: f64 = payments.iter().map(|p| p.amount).sum();

    FeePosition {
        summary: FinancialSummary {
            raw_total,
            discount_amount,
            total_due,
            total_paid,
            balance: total_due - total_paid,
        },
        active_concessions: rendered.join(", "),
    }
}
