use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;
use crate::nutrients::{Nutrient, Nutrients};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_ACTIVITY_CATEGORIES: &str = "running,yoga,weightlifting";
const DEFAULT_MEAL_CATEGORIES: &str = "breakfast,lunch,dinner,snack";

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
    pub activity_categories: Vec<String>,
    pub meal_categories: Vec<String>,
    pub goals: Nutrients,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Reads settings through `get` so tests never touch the process
    /// environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, AppError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let addr = parse(
            "FITTRACK_ADDR",
            get("FITTRACK_ADDR").unwrap_or_else(|| DEFAULT_ADDR.into()),
        )?;
        let data_dir = PathBuf::from(
            get("FITTRACK_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into()),
        );
        let activity_categories = split_list(
            &get("FITTRACK_ACTIVITY_CATEGORIES")
                .unwrap_or_else(|| DEFAULT_ACTIVITY_CATEGORIES.into()),
        );
        let meal_categories = split_list(
            &get("FITTRACK_MEAL_CATEGORIES").unwrap_or_else(|| DEFAULT_MEAL_CATEGORIES.into()),
        );

        let mut goals = default_goals();
        for nutrient in Nutrient::ALL {
            let key = format!("FITTRACK_GOAL_{}", nutrient.as_str().to_uppercase());
            if let Some(raw) = get(&key) {
                let amount: f64 = parse(&key, raw)?;
                if !amount.is_finite() {
                    return Err(AppError::Config(format!("{key} must be a finite number")));
                }
                goals = goals.with(nutrient, amount);
            }
        }

        Ok(Self {
            addr,
            data_dir,
            activity_categories,
            meal_categories,
            goals,
        })
    }
}

/// Reference daily values.
pub fn default_goals() -> Nutrients {
    Nutrients {
        calories: 2000.0,
        protein: 50.0,
        carbohydrates: 275.0,
        fats: 78.0,
        fiber: 28.0,
        sugar: 50.0,
    }
}

fn parse<T>(key: &str, raw: String) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid {key} value {raw:?}: {e}")))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_defaults() {
        let cfg = Config::from_env_with(|_| None).expect("cfg");
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.activity_categories, vec!["running", "yoga", "weightlifting"]);
        assert_eq!(cfg.meal_categories, vec!["breakfast", "lunch", "dinner", "snack"]);
        assert_eq!(cfg.goals, default_goals());
    }

    #[test]
    fn from_env_reads_values() {
        let get = |k: &str| match k {
            "FITTRACK_ADDR" => Some("0.0.0.0:9000".into()),
            "FITTRACK_DATA_DIR" => Some("/var/lib/fittrack".into()),
            "FITTRACK_ACTIVITY_CATEGORIES" => Some("swimming, cycling,,".into()),
            "FITTRACK_GOAL_PROTEIN" => Some("120".into()),
            _ => None,
        };
        let cfg = Config::from_env_with(get).expect("cfg");
        assert_eq!(cfg.addr.port(), 9000);
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/fittrack"));
        assert_eq!(cfg.activity_categories, vec!["swimming", "cycling"]);
        assert_eq!(cfg.goals.protein, 120.0);
        assert_eq!(cfg.goals.calories, 2000.0);
    }

    #[test]
    fn from_env_rejects_bad_goal() {
        let get = |k: &str| match k {
            "FITTRACK_GOAL_FIBER" => Some("plenty".into()),
            _ => None,
        };
        assert!(matches!(Config::from_env_with(get), Err(AppError::Config(_))));
    }

    #[test]
    fn from_env_rejects_non_finite_goal() {
        for raw in ["NaN", "inf", "-infinity"] {
            let get = |k: &str| match k {
                "FITTRACK_GOAL_SUGAR" => Some(raw.to_string()),
                _ => None,
            };
            assert!(
                matches!(Config::from_env_with(get), Err(AppError::Config(_))),
                "accepted {raw}"
            );
        }
    }

    #[test]
    fn from_env_rejects_bad_addr() {
        let get = |k: &str| match k {
            "FITTRACK_ADDR" => Some("localhost".into()),
            _ => None,
        };
        assert!(Config::from_env_with(get).is_err());
    }
}
