use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub duration_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub duration_minutes: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceQuery {
    /// Case-insensitive substring of title or description.
    pub q: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    #[serde(default = "default_active_filter")]
    pub active: Option<bool>,
}

fn default_active_filter() -> Option<bool> {
    Some(true)
}

impl Default for ServiceQuery {
    fn default() -> Self {
        Self {
            q: None,
            price_min: None,
            price_max: None,
            active: default_active_filter(),
        }
    }
}
