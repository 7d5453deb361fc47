// src/quality.rs - milk quality standards, grading and compliance checks
//
// Bounded parameters (fat, protein, lactose, SNF) have a min/target/max
// band. Cell and bacteria counts only have an upper limit.


use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::models::QualityParameters;

/// Distance beyond min/max that still scores as `Average`.
pub const TOLERANCE: f64 = 0.3;
const TARGET_WINDOW: f64 = 0.1;
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedStandard {
    pub min: f64,
    pub target: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountLimit {
    pub max: f64,
    /// Multiple of `max` below which the count is still `Average`.
    pub average_factor: f64,
}

pub const FAT: BoundedStandard = BoundedStandard { min: 3.5, target: 3.8, max: 4.2 };
pub const PROTEIN: BoundedStandard = BoundedStandard { min: 3.0, target: 3.3, max: 3.6 };
pub const LACTOSE: BoundedStandard = BoundedStandard { min: 4.5, target: 4.8, max: 5.0 };
pub const SNF: BoundedStandard = BoundedStandard { min: 8.25, target: 8.5, max: 9.0 };
pub const SOMATIC_CELLS: CountLimit = CountLimit { max: 200.0, average_factor: 1.3 };
pub const BACTERIA: CountLimit = CountLimit { max: 20000.0, average_factor: 1.5 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, strum::Display)]
pub enum QualityGrade {
    Excellent,
    Good,
    Average,
    Poor,
}

impl QualityGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 4.5 {
            QualityGrade::Excellent
        } else if score >= 3.5 {
            QualityGrade::Good
        } else if score >= 2.5 {
            QualityGrade::Average
        } else {
            QualityGrade::Poor
        }
    }

    fn from_points(points: u8) -> Self {
        Self::from_score(points as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
pub enum Parameter {
    #[strum(serialize = "Fat")]
    Fat,
    #[strum(serialize = "Protein")]
    Protein,
    #[strum(serialize = "Lactose")]
    Lactose,
    #[strum(serialize = "SNF")]
    Snf,
    #[strum(serialize = "Somatic Cell Count")]
    SomaticCellCount,
    #[strum(serialize = "Bacteria Count")]
    BacteriaCount,
}

/// Parameters that enter the overall compliance rate.
pub const COMPLIANCE_PARAMETERS: [Parameter; 5] = [
    Parameter::Fat,
    Parameter::Protein,
    Parameter::Lactose,
    Parameter::SomaticCellCount,
    Parameter::BacteriaCount,
];

pub enum Limit {
    Bounded(BoundedStandard),
    Count(CountLimit),
}

impl Parameter {
    pub fn limit(self) -> Limit {
        match self {
            Parameter::Fat => Limit::Bounded(FAT),
            Parameter::Protein => Limit::Bounded(PROTEIN),
            Parameter::Lactose => Limit::Bounded(LACTOSE),
            Parameter::Snf => Limit::Bounded(SNF),
            Parameter::SomaticCellCount => Limit::Count(SOMATIC_CELLS),
            Parameter::BacteriaCount => Limit::Count(BACTERIA),
        }
    }

    /// Name of the request/column field holding the reading.
    pub fn field_name(self) -> &'static str {
        match self {
            Parameter::Fat => "fat",
            Parameter::Protein => "protein",
            Parameter::Lactose => "lactose",
            Parameter::Snf => "snf",
            Parameter::SomaticCellCount => "somatic_cell_count",
            Parameter::BacteriaCount => "bacteria_count",
        }
    }

    pub fn value(self, params: &QualityParameters) -> Option<f64> {
        match self {
            Parameter::Fat => params.fat,
            Parameter::Protein => params.protein,
            Parameter::Lactose => params.lactose,
            Parameter::Snf => params.snf,
            Parameter::SomaticCellCount => params.somatic_cell_count,
            Parameter::BacteriaCount => params.bacteria_count,
        }
    }

    /// Within bounds, or at most the limit for counts.
    pub fn is_compliant(self, value: f64) -> bool {
        match self.limit() {
            Limit::Bounded(s) => value >= s.min - EPSILON && value <= s.max + EPSILON,
            Limit::Count(c) => value <= c.max,
        }
    }

    pub fn status(self, value: f64) -> QualityGrade {
        match self.limit() {
            Limit::Bounded(s) => QualityGrade::from_points(bounded_score(value, s)),
            Limit::Count(c) => count_status(value, c),
        }
    }

    /// Human readable breach, `None` when compliant.
    pub fn violation(self, value: f64) -> Option<String> {
        if self.is_compliant(value) {
            return None;
        }
        let message = match (self, self.limit()) {
            (Parameter::SomaticCellCount, Limit::Count(c)) => format!(
                "Somatic cell count too high: {} (max: {})",
                format_number(value), format_number(c.max)
            ),
            (Parameter::BacteriaCount, Limit::Count(c)) => format!(
                "Bacteria count too high: {} (max: {})",
                format_number(value), format_number(c.max)
            ),
            (param, Limit::Bounded(s)) => {
                let subject = match param {
                    Parameter::Fat => "Fat content",
                    Parameter::Protein => "Protein content",
                    Parameter::Lactose => "Lactose content",
                    _ => "SNF content",
                };
                if value < s.min {
                    format!("{} too low: {}% (min: {}%)", subject, format_number(value), format_number(s.min))
                } else {
                    format!("{} too high: {}% (max: {}%)", subject, format_number(value), format_number(s.max))
                }
            }
            (param, Limit::Count(c)) => format!(
                "{} too high: {} (max: {})",
                param, format_number(value), format_number(c.max)
            ),
        };
        Some(message)
    }
}

/// 5 near target, 4 within bounds, 3 within tolerance, else 2.
pub fn bounded_score(value: f64, standard: BoundedStandard) -> u8 {
    if (value - standard.target).abs() <= TARGET_WINDOW + EPSILON {
        5
    } else if value >= standard.min - EPSILON && value <= standard.max + EPSILON {
        4
    } else if value >= standard.min - TOLERANCE - EPSILON && value <= standard.max + TOLERANCE + EPSILON {
        3
    } else {
        2
    }
}

fn count_status(value: f64, limit: CountLimit) -> QualityGrade {
    if value < 0.7 * limit.max {
        QualityGrade::Excellent
    } else if value < limit.max {
        QualityGrade::Good
    } else if value < limit.average_factor * limit.max {
        QualityGrade::Average
    } else {
        QualityGrade::Poor
    }
}

/// Average score of the bounded readings present. Counts are reported
/// per parameter but do not move the grade.
pub fn grade(params: &QualityParameters) -> QualityGrade {
    let scores: Vec<u8> = [Parameter::Fat, Parameter::Protein, Parameter::Lactose, Parameter::Snf]
        .iter()
        .filter_map(|p| match (p.value(params), p.limit()) {
            (Some(v), Limit::Bounded(s)) => Some(bounded_score(v, s)),
            _ => None,
        })
        .collect();

    if scores.is_empty() {
        return QualityGrade::Good;
    }
    let average = scores.iter().map(|&s| s as f64).sum::<f64>() / scores.len() as f64;
    QualityGrade::from_score(average)
}

pub fn parameter_statuses(params: &QualityParameters) -> Vec<(Parameter, f64, QualityGrade)> {
    [
        Parameter::Fat,
        Parameter::Protein,
        Parameter::Lactose,
        Parameter::Snf,
        Parameter::SomaticCellCount,
        Parameter::BacteriaCount,
    ]
    .iter()
    .filter_map(|&p| p.value(params).map(|v| (p, v, p.status(v))))
    .collect()
}

/// One message per breached parameter, in display order.
pub fn violations(params: &QualityParameters) -> Vec<String> {
    COMPLIANCE_PARAMETERS
        .iter()
        .filter_map(|&p| p.value(params).and_then(|v| p.violation(v)))
        .collect()
}

/// 64-bit FNV-1a of the id bytes; fixed across toolchains.
fn record_seed(record_id: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    record_id
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}

/// Fills absent readings with plausible values seeded from the record id,
/// so the same record always yields the same numbers. Returns whether
/// anything was filled in.
pub fn fill_missing(record_id: &str, params: &QualityParameters) -> (QualityParameters, bool) {
    let mut rng = StdRng::seed_from_u64(record_seed(record_id));

    let simulated = QualityParameters {
        fat: Some(round2(rng.gen_range(3.3..4.4))),
        protein: Some(round2(rng.gen_range(2.9..3.7))),
        lactose: Some(round2(rng.gen_range(4.4..5.1))),
        snf: None,
        somatic_cell_count: Some(rng.gen_range(100.0_f64..260.0).round()),
        bacteria_count: Some(rng.gen_range(8000.0_f64..28000.0).round()),
    };

    let filled = params.or(simulated);
    let changed = filled != *params;
    (filled, changed)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Two decimals with trailing zeros dropped: 3.50 -> "3.5", 200.00 -> "200".
pub fn format_number(value: f64) -> String {
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
