// src/reports/aggregate.rs
//! Turns raw collection rows into the figures each report type shows.
//! Everything accumulates in f64; rounding happens when cells are rendered.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{MilkCollectionWithCow, QualityParameters, ReportType, Shift};
use crate::quality::{self, Parameter, QualityGrade, COMPLIANCE_PARAMETERS};

pub const DAILY_TOP_COWS: usize = 5;
pub const WEEKLY_TOP_COWS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct CowTotal {
    pub cow_id: String,
    pub cow_name: String,
    pub tag_number: String,
    pub total: f64,
    pub collections: usize,
    pub days_collected: usize,
    pub average_per_collection: f64,
    pub average_per_day: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub morning: f64,
    pub evening: f64,
    pub total: f64,
    pub collections: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekTotal {
    pub iso_year: i32,
    pub week: u32,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub total: f64,
    pub collections: usize,
    pub days: usize,
}

impl WeekTotal {
    pub fn label(&self) -> String {
        format!("{}-W{:02}", self.iso_year, self.week)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub morning_total: f64,
    pub evening_total: f64,
    pub total: f64,
    pub collection_count: usize,
    pub top_cows: Vec<CowTotal>,
    pub collections: Vec<MilkCollectionWithCow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    pub days: Vec<DayTotal>,
    pub total: f64,
    pub average_per_day: f64,
    pub collection_count: usize,
    pub top_cows: Vec<CowTotal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReport {
    pub weeks: Vec<WeekTotal>,
    pub total: f64,
    pub average_per_day: f64,
    pub days_collected: usize,
    pub collection_count: usize,
    pub cow_stats: Vec<CowTotal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualitySample {
    pub collection: MilkCollectionWithCow,
    /// Actual readings with any gaps filled in.
    pub parameters: QualityParameters,
    pub simulated: bool,
    pub grade: QualityGrade,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterAverage {
    pub parameter: Parameter,
    pub average: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityTrendPoint {
    pub date: NaiveDate,
    pub samples: usize,
    pub averages: Vec<ParameterAverage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceRate {
    pub parameter: Parameter,
    pub compliant: usize,
    pub samples: usize,
    /// Percent, 0 when there are no samples.
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub samples: Vec<QualitySample>,
    pub averages: Vec<ParameterAverage>,
    pub trend: Vec<QualityTrendPoint>,
    pub compliance: Vec<ComplianceRate>,
    pub overall_compliance: f64,
    pub grade_distribution: Vec<(QualityGrade, usize)>,
    pub simulated_count: usize,
}

impl QualityReport {
    pub fn violating_samples(&self) -> impl Iterator<Item = &QualitySample> {
        self.samples.iter().filter(|s| !s.violations.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Aggregation {
    Daily(DailyReport),
    Weekly(WeeklyReport),
    Monthly(MonthlyReport),
    Quality(QualityReport),
    Compliance(QualityReport),
}

pub fn aggregate(
    report_type: ReportType,
    collections: &[MilkCollectionWithCow],
    simulate_missing_quality: bool,
) -> Aggregation {
    match report_type {
        ReportType::Daily => Aggregation::Daily(daily(collections)),
        ReportType::Weekly => Aggregation::Weekly(weekly(collections)),
        ReportType::Monthly => Aggregation::Monthly(monthly(collections)),
        ReportType::Quality => Aggregation::Quality(quality_analysis(collections, simulate_missing_quality)),
        ReportType::Compliance => Aggregation::Compliance(quality_analysis(collections, simulate_missing_quality)),
    }
}

fn total(collections: &[MilkCollectionWithCow]) -> f64 {
    collections.iter().map(|c| c.record.amount).sum()
}

fn distinct_dates(collections: &[MilkCollectionWithCow]) -> usize {
    collections.iter().map(|c| c.record.date).collect::<BTreeSet<_>>().len()
}

fn per_day(total: f64, days: usize) -> f64 {
    if days == 0 {
        0.0
    } else {
        total / days as f64
    }
}

/// Per-cow totals, highest producer first; ties broken by tag.
pub fn cow_totals(collections: &[MilkCollectionWithCow]) -> Vec<CowTotal> {
    struct Acc<'a> {
        first: &'a MilkCollectionWithCow,
        total: f64,
        collections: usize,
        days: BTreeSet<NaiveDate>,
    }

    let mut by_cow: HashMap<&str, Acc> = HashMap::new();
    for c in collections {
        let acc = by_cow.entry(c.record.cow_id.as_str()).or_insert_with(|| Acc {
            first: c,
            total: 0.0,
            collections: 0,
            days: BTreeSet::new(),
        });
        acc.total += c.record.amount;
        acc.collections += 1;
        acc.days.insert(c.record.date);
    }

    let mut totals: Vec<CowTotal> = by_cow
        .into_iter()
        .map(|(cow_id, acc)| CowTotal {
            cow_id: cow_id.to_string(),
            cow_name: acc.first.cow_name.clone().unwrap_or_else(|| "Unknown".to_string()),
            tag_number: acc.first.cow_tag.clone().unwrap_or_default(),
            total: acc.total,
            collections: acc.collections,
            days_collected: acc.days.len(),
            average_per_collection: per_day(acc.total, acc.collections),
            average_per_day: per_day(acc.total, acc.days.len()),
        })
        .collect();

    totals.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.tag_number.cmp(&b.tag_number))
    });
    totals
}

pub fn day_totals(collections: &[MilkCollectionWithCow]) -> Vec<DayTotal> {
    let mut by_date: BTreeMap<NaiveDate, DayTotal> = BTreeMap::new();
    for c in collections {
        let day = by_date.entry(c.record.date).or_insert_with(|| DayTotal {
            date: c.record.date,
            morning: 0.0,
            evening: 0.0,
            total: 0.0,
            collections: 0,
        });
        match c.record.shift {
            Shift::Morning => day.morning += c.record.amount,
            Shift::Evening => day.evening += c.record.amount,
        }
        day.total += c.record.amount;
        day.collections += 1;
    }
    by_date.into_values().collect()
}

pub fn daily(collections: &[MilkCollectionWithCow]) -> DailyReport {
    let shift_total = |shift: Shift| -> f64 {
        collections
            .iter()
            .filter(|c| c.record.shift == shift)
            .map(|c| c.record.amount)
            .sum()
    };
    let morning_total = shift_total(Shift::Morning);
    let evening_total = shift_total(Shift::Evening);

    let mut top_cows = cow_totals(collections);
    top_cows.truncate(DAILY_TOP_COWS);

    DailyReport {
        morning_total,
        evening_total,
        total: total(collections),
        collection_count: collections.len(),
        top_cows,
        collections: collections.to_vec(),
    }
}

pub fn weekly(collections: &[MilkCollectionWithCow]) -> WeeklyReport {
    let days = day_totals(collections);
    let total = total(collections);

    let mut top_cows = cow_totals(collections);
    top_cows.truncate(WEEKLY_TOP_COWS);

    WeeklyReport {
        average_per_day: per_day(total, days.len()),
        days,
        total,
        collection_count: collections.len(),
        top_cows,
    }
}

pub fn monthly(collections: &[MilkCollectionWithCow]) -> MonthlyReport {
    let mut by_week: BTreeMap<(i32, u32), (Vec<NaiveDate>, f64, usize)> = BTreeMap::new();
    for c in collections {
        let iso = c.record.date.iso_week();
        let entry = by_week.entry((iso.year(), iso.week())).or_insert_with(|| (Vec::new(), 0.0, 0));
        entry.0.push(c.record.date);
        entry.1 += c.record.amount;
        entry.2 += 1;
    }

    let weeks = by_week
        .into_iter()
        .map(|((iso_year, week), (dates, total, count))| {
            let distinct: BTreeSet<NaiveDate> = dates.into_iter().collect();
            WeekTotal {
                iso_year,
                week,
                first_date: *distinct.iter().next().unwrap_or(&NaiveDate::MIN),
                last_date: *distinct.iter().next_back().unwrap_or(&NaiveDate::MIN),
                total,
                collections: count,
                days: distinct.len(),
            }
        })
        .collect();

    let total = total(collections);
    let days_collected = distinct_dates(collections);

    MonthlyReport {
        weeks,
        total,
        average_per_day: per_day(total, days_collected),
        days_collected,
        collection_count: collections.len(),
        cow_stats: cow_totals(collections),
    }
}

fn averages_of<'a>(params: impl Iterator<Item = &'a QualityParameters> + Clone) -> Vec<ParameterAverage> {
    [
        Parameter::Fat,
        Parameter::Protein,
        Parameter::Lactose,
        Parameter::Snf,
        Parameter::SomaticCellCount,
        Parameter::BacteriaCount,
    ]
    .iter()
    .filter_map(|&parameter| {
        let values: Vec<f64> = params.clone().filter_map(|p| parameter.value(p)).collect();
        if values.is_empty() {
            None
        } else {
            Some(ParameterAverage {
                parameter,
                average: values.iter().sum::<f64>() / values.len() as f64,
                samples: values.len(),
            })
        }
    })
    .collect()
}

pub fn quality_analysis(collections: &[MilkCollectionWithCow], simulate_missing: bool) -> QualityReport {
    let samples: Vec<QualitySample> = collections
        .iter()
        .map(|collection| {
            let actual = collection.record.quality_parameters;
            let (parameters, simulated) = if simulate_missing {
                quality::fill_missing(&collection.record.id, &actual)
            } else {
                (actual, false)
            };
            QualitySample {
                grade: quality::grade(&parameters),
                violations: quality::violations(&parameters),
                parameters,
                simulated,
                collection: collection.clone(),
            }
        })
        .collect();

    let averages = averages_of(samples.iter().map(|s| &s.parameters));

    let mut by_date: BTreeMap<NaiveDate, Vec<&QualityParameters>> = BTreeMap::new();
    for s in &samples {
        by_date.entry(s.collection.record.date).or_default().push(&s.parameters);
    }
    let trend = by_date
        .into_iter()
        .map(|(date, params)| QualityTrendPoint {
            date,
            samples: params.len(),
            averages: averages_of(params.iter().copied()),
        })
        .collect();

    let compliance: Vec<ComplianceRate> = COMPLIANCE_PARAMETERS
        .iter()
        .map(|&parameter| {
            let values: Vec<f64> = samples.iter().filter_map(|s| parameter.value(&s.parameters)).collect();
            let compliant = values.iter().filter(|&&v| parameter.is_compliant(v)).count();
            let rate = if values.is_empty() {
                0.0
            } else {
                compliant as f64 / values.len() as f64 * 100.0
            };
            ComplianceRate { parameter, compliant, samples: values.len(), rate }
        })
        .collect();
    let overall_compliance = compliance.iter().map(|c| c.rate).sum::<f64>() / compliance.len() as f64;

    let grade_distribution = [
        QualityGrade::Excellent,
        QualityGrade::Good,
        QualityGrade::Average,
        QualityGrade::Poor,
    ]
    .iter()
    .map(|&g| (g, samples.iter().filter(|s| s.grade == g).count()))
    .collect();

    QualityReport {
        simulated_count: samples.iter().filter(|s| s.simulated).count(),
        samples,
        averages,
        trend,
        compliance,
        overall_compliance,
        grade_distribution,
    }
}
