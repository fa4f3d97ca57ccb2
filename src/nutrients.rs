//! Nutrient totals and remaining daily allowance.
//!
//! Nutrients are a fixed set of six named amounts. Whatever shape the
//! stored meal data has, it is reduced to [`Nutrients`] once, when the
//! record is deserialized; from there on every field is a plain `f64`
//! that defaults to zero.

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::LoggedRecord;

/// Tracked nutrients, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nutrient {
    Calories,
    Protein,
    Carbohydrates,
    Fats,
    Fiber,
    Sugar,
}

impl Nutrient {
    /// Canonical ordering; also the tie-break order for [`most_deficient`].
    pub const ALL: [Nutrient; 6] = [
        Nutrient::Calories,
        Nutrient::Protein,
        Nutrient::Carbohydrates,
        Nutrient::Fats,
        Nutrient::Fiber,
        Nutrient::Sugar,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Nutrient::Calories => "calories",
            Nutrient::Protein => "protein",
            Nutrient::Carbohydrates => "carbohydrates",
            Nutrient::Fats => "fats",
            Nutrient::Fiber => "fiber",
            Nutrient::Sugar => "sugar",
        }
    }
}

/// One amount per tracked nutrient.
///
/// Used for per-meal values, logged totals, goals and deficits alike.
/// Missing, non-numeric, negative or non-finite inputs deserialize as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrients {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub calories: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub protein: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub carbohydrates: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub fats: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub fiber: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub sugar: f64,
}

impl Nutrients {
    pub fn get(&self, nutrient: Nutrient) -> f64 {
        match nutrient {
            Nutrient::Calories => self.calories,
            Nutrient::Protein => self.protein,
            Nutrient::Carbohydrates => self.carbohydrates,
            Nutrient::Fats => self.fats,
            Nutrient::Fiber => self.fiber,
            Nutrient::Sugar => self.sugar,
        }
    }

    fn get_mut(&mut self, nutrient: Nutrient) -> &mut f64 {
        match nutrient {
            Nutrient::Calories => &mut self.calories,
            Nutrient::Protein => &mut self.protein,
            Nutrient::Carbohydrates => &mut self.carbohydrates,
            Nutrient::Fats => &mut self.fats,
            Nutrient::Fiber => &mut self.fiber,
            Nutrient::Sugar => &mut self.sugar,
        }
    }

    pub fn with(mut self, nutrient: Nutrient, amount: f64) -> Self {
        *self.get_mut(nutrient) = amount;
        self
    }
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_f64())
        .filter(|amount| amount.is_finite() && *amount >= 0.0)
        .unwrap_or(0.0))
}

/// Remaining allowance per nutrient plus the one furthest from its goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientDeficit {
    pub remaining: Nutrients,
    pub most_deficient: Nutrient,
}

/// Sums every nutrient across `records`. A record without nutrient data
/// still counts, contributing zero.
pub fn logged_totals<'a, I>(records: I) -> Nutrients
where
    I: IntoIterator<Item = &'a LoggedRecord>,
{
    let mut totals = Nutrients::default();
    for record in records {
        for nutrient in Nutrient::ALL {
            *totals.get_mut(nutrient) += record.nutrients.get(nutrient);
        }
    }
    totals
}

/// `goal - logged` for each nutrient. A goal left unset is zero, so the
/// deficit goes negative as soon as anything is logged.
pub fn compute_deficit<'a, I>(records: I, goals: &Nutrients) -> NutrientDeficit
where
    I: IntoIterator<Item = &'a LoggedRecord>,
{
    let logged = logged_totals(records);
    let mut remaining = Nutrients::default();
    for nutrient in Nutrient::ALL {
        *remaining.get_mut(nutrient) = goals.get(nutrient) - logged.get(nutrient);
    }

    let most_deficient = most_deficient(&remaining);
    tracing::debug!(
        "nutrient deficit computed, most deficient: {}",
        most_deficient.as_str()
    );

    NutrientDeficit {
        remaining,
        most_deficient,
    }
}

/// Nutrient with the largest remaining amount. Ties go to the earliest
/// nutrient in [`Nutrient::ALL`].
pub fn most_deficient(remaining: &Nutrients) -> Nutrient {
    let mut best = Nutrient::ALL[0];
    for nutrient in Nutrient::ALL.into_iter().skip(1) {
        if remaining.get(nutrient) > remaining.get(best) {
            best = nutrient;
        }
    }
    best
}
