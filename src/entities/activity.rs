use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of bookable inventory. Plans are typed the same way, and a plan only
/// accepts activities of its own type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ActivityType {
    #[sea_orm(string_value = "Flight")]
    Flight,
    #[sea_orm(string_value = "Accommodation")]
    Accommodation,
    #[sea_orm(string_value = "Vehicle")]
    Vehicle,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Flight => "Flight",
            ActivityType::Accommodation => "Accommodation",
            ActivityType::Vehicle => "Vehicle",
        }
    }

    /// Label used in reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            ActivityType::Vehicle => "Vehicle Rental",
            other => other.as_str(),
        }
    }

    /// Case-insensitive parse. "Vehicle Rental" is accepted as an alias.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "flight" => Some(ActivityType::Flight),
            "accommodation" => Some(ActivityType::Accommodation),
            "vehicle" | "vehicle rental" => Some(ActivityType::Vehicle),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog item with finite capacity (a flight, a hotel room, a rental car).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub activity_type: ActivityType,
    pub item: String,
    pub capacity: i32,
    pub price: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub start_location: String,
    pub end_location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ordered_quantity::Entity")]
    OrderedQuantities,
}

impl Related<super::ordered_quantity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderedQuantities.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
