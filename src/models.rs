use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::nutrients::Nutrients;

/// A logged activity or meal.
///
/// Stored one per line in the record logs. Field names follow the web
/// client (`activity`/`duration` for activities, `mealType`/`calories`
/// for meals); all of them land on the same generic fields. Bad values
/// become `None` instead of failing the whole record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawRecord")]
pub struct LoggedRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    pub category: Option<String>,

    /// Minutes for activities, calories for meals.
    pub quantity: Option<f64>,

    pub occurred_at_epoch_millis: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<f64>,

    pub nutrients: Nutrients,
}

/// Every key a stored record may carry, before precedence is applied.
///
/// Client documents can hold several keys for the same field (an activity
/// has both `duration` and `calories`), so nothing here is an alias.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRecord {
    id: Option<serde_json::Value>,
    category: Option<serde_json::Value>,
    activity: Option<serde_json::Value>,
    meal_type: Option<serde_json::Value>,
    quantity: Option<serde_json::Value>,
    duration: Option<serde_json::Value>,
    calories: Option<serde_json::Value>,
    occurred_at_epoch_millis: Option<serde_json::Value>,
    timestamp_num: Option<serde_json::Value>,
    label: Option<serde_json::Value>,
    food_name: Option<serde_json::Value>,
    calories_burned: Option<serde_json::Value>,
    nutrients: Option<serde_json::Value>,
}

impl From<RawRecord> for LoggedRecord {
    fn from(raw: RawRecord) -> Self {
        let explicit = as_quantity(raw.quantity.as_ref());
        let duration = as_quantity(raw.duration.as_ref());
        let calories = as_quantity(raw.calories.as_ref());

        // On an activity document `calories` is the burn estimate, not the amount.
        let quantity = explicit.or(duration).or(calories);
        let calories_burned = as_quantity(raw.calories_burned.as_ref()).or(
            if explicit.is_none() && duration.is_some() {
                calories
            } else {
                None
            },
        );

        LoggedRecord {
            id: raw
                .id
                .as_ref()
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok()),
            category: as_text(raw.category.as_ref())
                .or_else(|| as_text(raw.activity.as_ref()))
                .or_else(|| as_text(raw.meal_type.as_ref())),
            quantity,
            occurred_at_epoch_millis: as_millis(raw.occurred_at_epoch_millis.as_ref())
                .or_else(|| as_millis(raw.timestamp_num.as_ref())),
            label: as_text(raw.label.as_ref()).or_else(|| as_text(raw.food_name.as_ref())),
            calories_burned,
            nutrients: match raw.nutrients {
                Some(v @ serde_json::Value::Object(_)) => {
                    serde_json::from_value(v).unwrap_or_default()
                }
                _ => Nutrients::default(),
            },
        }
    }
}

fn as_text(value: Option<&serde_json::Value>) -> Option<String> {
    value.and_then(|v| v.as_str()).map(str::to_string)
}

fn as_quantity(value: Option<&serde_json::Value>) -> Option<f64> {
    value
        .and_then(|v| v.as_f64())
        .filter(|q| q.is_finite() && *q >= 0.0)
}

fn as_millis(value: Option<&serde_json::Value>) -> Option<i64> {
    match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        _ => None,
    }
}

/// Which log a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Activity,
    Meal,
}

impl RecordKind {
    pub fn log_file(self) -> &'static str {
        match self {
            RecordKind::Activity => "activities.log",
            RecordKind::Meal => "meals.log",
        }
    }
}

/// Activity form input
#[derive(Debug, Deserialize)]
pub struct ActivityInput {
    pub activity: String,
    pub duration: f64,
}

impl ActivityInput {
    pub fn into_record(self, occurred_at_epoch_millis: i64) -> LoggedRecord {
        let calories_burned = estimate_calories(&self.activity, self.duration);
        LoggedRecord {
            id: Some(Uuid::new_v4()),
            category: Some(self.activity),
            quantity: Some(self.duration),
            occurred_at_epoch_millis: Some(occurred_at_epoch_millis),
            calories_burned: Some(calories_burned),
            ..LoggedRecord::default()
        }
    }
}

/// Meal form input
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealInput {
    pub food_name: String,
    pub calories: f64,
    pub meal_type: String,
    #[serde(default)]
    pub nutrients: Option<Nutrients>,
}

impl MealInput {
    pub fn into_record(self, occurred_at_epoch_millis: i64) -> LoggedRecord {
        // Calories typed into the form count toward the calorie total when
        // no nutrient breakdown came with the meal.
        let nutrients = self.nutrients.unwrap_or(Nutrients {
            calories: self.calories,
            ..Nutrients::default()
        });
        LoggedRecord {
            id: Some(Uuid::new_v4()),
            category: Some(self.meal_type),
            quantity: Some(self.calories),
            occurred_at_epoch_millis: Some(occurred_at_epoch_millis),
            label: Some(self.food_name),
            nutrients,
            ..LoggedRecord::default()
        }
    }
}

/// Calories per minute for the known activities; 5 for anything else.
pub fn estimate_calories(activity: &str, duration_minutes: f64) -> f64 {
    let per_minute = match activity {
        "running" => 10.0,
        "yoga" => 4.0,
        "weightlifting" => 6.0,
        _ => 5.0,
    };
    per_minute * duration_minutes
}

/// API Response
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Query result
#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub result_type: String,
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_fields_map_to_record() {
        let record: LoggedRecord = serde_json::from_str(
            r#"{"activity":"running","duration":30,"occurredAtEpochMillis":1715783400000}"#,
        )
        .unwrap();

        assert_eq!(record.category.as_deref(), Some("running"));
        assert_eq!(record.quantity, Some(30.0));
        assert_eq!(record.occurred_at_epoch_millis, Some(1_715_783_400_000));
        assert_eq!(record.nutrients, Nutrients::default());
    }

    #[test]
    fn test_meal_fields_map_to_record() {
        let record: LoggedRecord = serde_json::from_str(
            r#"{"foodName":"oatmeal","calories":150.5,"mealType":"breakfast",
                "timestamp":"2024-05-15T07:00:00.000Z","timestampNum":1715756400000,
                "nutrients":{"calories":150.5,"fiber":4}}"#,
        )
        .unwrap();

        assert_eq!(record.category.as_deref(), Some("breakfast"));
        assert_eq!(record.quantity, Some(150.5));
        assert_eq!(record.label.as_deref(), Some("oatmeal"));
        assert_eq!(record.occurred_at_epoch_millis, Some(1_715_756_400_000));
        assert_eq!(record.nutrients.fiber, 4.0);
    }

    #[test]
    fn test_client_activity_document_with_competing_keys() {
        let record: LoggedRecord = serde_json::from_str(
            r#"{"activity":"running","duration":30,"calories":300,
                "timestamp":{"seconds":1715783400},"timestampNum":1715783400000}"#,
        )
        .unwrap();

        assert_eq!(record.category.as_deref(), Some("running"));
        assert_eq!(record.quantity, Some(30.0));
        assert_eq!(record.calories_burned, Some(300.0));
        assert_eq!(record.occurred_at_epoch_millis, Some(1_715_783_400_000));
    }

    #[test]
    fn test_key_precedence_when_both_present() {
        let record: LoggedRecord = serde_json::from_str(
            r#"{"category":"yoga","activity":"running","quantity":12,"duration":30,
                "occurredAtEpochMillis":5,"timestampNum":9,"label":"a","foodName":"b"}"#,
        )
        .unwrap();

        assert_eq!(record.category.as_deref(), Some("yoga"));
        assert_eq!(record.quantity, Some(12.0));
        assert_eq!(record.calories_burned, None);
        assert_eq!(record.occurred_at_epoch_millis, Some(5));
        assert_eq!(record.label.as_deref(), Some("a"));

        // A malformed preferred key falls through to the next one.
        let record: LoggedRecord =
            serde_json::from_str(r#"{"occurredAtEpochMillis":"soon","timestampNum":9,"id":"x"}"#)
                .unwrap();
        assert_eq!(record.occurred_at_epoch_millis, Some(9));
        assert_eq!(record.id, None);
    }

    #[test]
    fn test_malformed_values_become_none() {
        let record: LoggedRecord = serde_json::from_str(
            r#"{"category":"yoga","quantity":"twenty","occurredAtEpochMillis":"yesterday","nutrients":[1,2]}"#,
        )
        .unwrap();

        assert_eq!(record.category.as_deref(), Some("yoga"));
        assert_eq!(record.quantity, None);
        assert_eq!(record.occurred_at_epoch_millis, None);
        assert_eq!(record.nutrients, Nutrients::default());

        let negative: LoggedRecord =
            serde_json::from_str(r#"{"category":"yoga","quantity":-5}"#).unwrap();
        assert_eq!(negative.quantity, None);
    }

    #[test]
    fn test_record_round_trips_through_log_format() {
        let record = ActivityInput {
            activity: "yoga".to_string(),
            duration: 20.0,
        }
        .into_record(1_000);

        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("\"occurredAtEpochMillis\":1000"));
        let back: LoggedRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_calorie_estimates() {
        assert_eq!(estimate_calories("running", 30.0), 300.0);
        assert_eq!(estimate_calories("yoga", 20.0), 80.0);
        assert_eq!(estimate_calories("weightlifting", 10.0), 60.0);
        assert_eq!(estimate_calories("swimming", 10.0), 50.0);
    }

    #[test]
    fn test_meal_without_breakdown_counts_calories() {
        let record = MealInput {
            food_name: "apple".to_string(),
            calories: 95.0,
            meal_type: "snack".to_string(),
            nutrients: None,
        }
        .into_record(42);

        assert_eq!(record.nutrients.calories, 95.0);
        assert_eq!(record.quantity, Some(95.0));
        assert_eq!(record.label.as_deref(), Some("apple"));
    }
}
