use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::LoggedRecord;
use crate::windows::TimeWindow;

/// Chart label for records logged without a category.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Total quantity for one category.
///
/// `category` is `None` for records logged without one; those form their
/// own bucket rather than being folded into a named category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: Option<String>,
    pub total: f64,
}

/// Per-category totals, in the order categories were first seen.
pub type AggregatedSeries = Vec<CategoryTotal>;

/// Sums `quantity` per category in a single pass.
///
/// Categories are compared verbatim: no case folding, no trimming.
/// Records without a usable quantity contribute nothing.
pub fn aggregate_by_category<'a, I>(records: I) -> AggregatedSeries
where
    I: IntoIterator<Item = &'a LoggedRecord>,
{
    let mut series: AggregatedSeries = Vec::new();
    let mut index: HashMap<Option<&str>, usize> = HashMap::new();

    for record in records {
        let Some(quantity) = record.quantity else {
            continue;
        };
        let key = record.category.as_deref();
        match index.get(&key) {
            Some(&idx) => series[idx].total += quantity,
            None => {
                index.insert(key, series.len());
                series.push(CategoryTotal {
                    category: key.map(str::to_string),
                    total: quantity,
                });
            }
        }
    }

    series
}

/// Known categories with no record in `records`, in the order of `known`.
pub fn recommend_missing<'a, I>(records: I, known: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = &'a LoggedRecord>,
{
    let present: HashSet<&str> = records
        .into_iter()
        .filter_map(|record| record.category.as_deref())
        .collect();

    let mut emitted: HashSet<&str> = HashSet::new();
    let mut missing = Vec::new();
    for category in known {
        if !present.contains(category.as_str()) && emitted.insert(category.as_str()) {
            missing.push(category.clone());
        }
    }
    missing
}

/// Missing categories plus whether there was anything to look at.
///
/// An empty `missing` list means a balanced mix only when `has_data` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub missing: Vec<String>,
    pub has_data: bool,
}

impl Recommendation {
    pub fn build<'a, I>(records: I, known: &[String]) -> Self
    where
        I: IntoIterator<Item = &'a LoggedRecord>,
    {
        let records: Vec<&LoggedRecord> = records.into_iter().collect();
        Self {
            missing: recommend_missing(records.iter().copied(), known),
            has_data: !records.is_empty(),
        }
    }
}

/// Series flattened into parallel label/value lists for charting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl ChartData {
    pub fn from_series(series: &[CategoryTotal]) -> Self {
        Self {
            labels: series
                .iter()
                .map(|c| c.category.clone().unwrap_or_else(|| UNCATEGORIZED.to_string()))
                .collect(),
            values: series.iter().map(|c| c.total).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: Option<String>,
    pub total: f64,
    pub percentage: f64,
}

/// Windowed series with shares and chart form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub window: TimeWindow,
    pub categories: Vec<CategoryShare>,
    pub total: f64,
    pub record_count: usize,
    pub chart: ChartData,
}

impl SeriesSummary {
    pub fn build(window: TimeWindow, filtered: &[&LoggedRecord]) -> Self {
        let series = aggregate_by_category(filtered.iter().copied());
        let total: f64 = series.iter().map(|c| c.total).sum();

        let categories = series
            .iter()
            .map(|c| CategoryShare {
                category: c.category.clone(),
                total: c.total,
                percentage: if total > 0.0 { c.total / total * 100.0 } else { 0.0 },
            })
            .collect();

        Self {
            window,
            categories,
            total,
            record_count: filtered.len(),
            chart: ChartData::from_series(&series),
        }
    }
}

/// `"running: 30 mins, yoga: 20 mins"` in input order.
pub fn activity_summary<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a LoggedRecord>,
{
    records
        .into_iter()
        .filter_map(|record| {
            let minutes = record.quantity?;
            let name = record.category.as_deref().unwrap_or(UNCATEGORIZED);
            Some(format!("{}: {} mins", name, minutes))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prompt sent to the text-completion service for motivational feedback.
pub fn insight_prompt(summary: &str) -> String {
    format!(
        "Analyze the following fitness activities and provide motivational feedback:\n\
         {}.\n\
         Focus on celebrating progress and encouraging consistency.",
        summary
    )
}
