//! Static tax-deadline calendar.

use chrono::NaiveDate;

/// A statutory filing deadline. Not persisted; declared here and
/// re-evaluated on every sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxDeadline {
    pub date: NaiveDate,
    pub label: &'static str,
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date")
}

/// Indian statutory deadlines for the current assessment year.
pub fn tax_deadlines() -> Vec<TaxDeadline> {
    vec![
        TaxDeadline {
            date: date(2026, 3, 15),
            label: "Advance Tax Q4",
        },
        TaxDeadline {
            date: date(2026, 3, 31),
            label: "Financial Year End",
        },
        TaxDeadline {
            date: date(2026, 6, 15),
            label: "Advance Tax Q1",
        },
        TaxDeadline {
            date: date(2026, 7, 31),
            label: "ITR Filing Deadline for Individuals",
        },
        TaxDeadline {
            date: date(2026, 9, 15),
            label: "Advance Tax Q2",
        },
        TaxDeadline {
            date: date(2026, 10, 31),
            label: "ITR Filing Deadline for Audit Cases",
        },
        TaxDeadline {
            date: date(2026, 12, 15),
            label: "Advance Tax Q3",
        },
    ]
}
