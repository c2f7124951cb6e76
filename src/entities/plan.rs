use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::activity::ActivityType;

/// Plan lifecycle: `Unfulfilled -> Pending -> Fulfilled -> Processed`.
///
/// The first three states are derived from the plan's line items (none, some,
/// enough to cover the package quota). `Processed` is set explicitly and is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum PlanStatus {
    #[sea_orm(string_value = "Unfulfilled")]
    Unfulfilled,
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Fulfilled")]
    Fulfilled,
    #[sea_orm(string_value = "Processed")]
    Processed,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Unfulfilled => "Unfulfilled",
            PlanStatus::Pending => "Pending",
            PlanStatus::Fulfilled => "Fulfilled",
            PlanStatus::Processed => "Processed",
        }
    }

    /// Parses a status name. Older records spell `Unfulfilled` as "Unfinished".
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unfulfilled" | "unfinished" => Some(PlanStatus::Unfulfilled),
            "pending" => Some(PlanStatus::Pending),
            "fulfilled" => Some(PlanStatus::Fulfilled),
            "processed" => Some(PlanStatus::Processed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Processed)
    }

    /// Status implied by the plan's line items. `ordered_units` is the sum of
    /// ordered quotas, `package_quota` the number of travellers to cover.
    pub fn derive(line_items: u64, ordered_units: i64, package_quota: i32) -> Self {
        if line_items == 0 {
            PlanStatus::Unfulfilled
        } else if ordered_units >= i64::from(package_quota) {
            PlanStatus::Fulfilled
        } else {
            PlanStatus::Pending
        }
    }

    /// Statuses whose line items count towards revenue.
    ///
    /// Revenue is booked from `Fulfilled` onwards, not on `Fulfilled` alone.
    /// Processing only locks a fulfilled plan, so a processed plan keeps the
    /// revenue it had; counting `Fulfilled` only would make a month's
    /// revenue fall as its plans get processed.
    pub const REVENUE: [PlanStatus; 2] = [PlanStatus::Fulfilled, PlanStatus::Processed];

    pub fn counts_as_revenue(&self) -> bool {
        Self::REVENUE.contains(self)
    }
}

/// One leg of a package, restricted to a single activity type.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub package_id: Uuid,
    pub activity_type: ActivityType,
    pub price: i64,
    pub status: PlanStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub start_location: String,
    pub end_location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tour_package::Entity",
        from = "Column::PackageId",
        to = "super::tour_package::Column::Id"
    )]
    TourPackage,
    #[sea_orm(has_many = "super::ordered_quantity::Entity")]
    OrderedQuantities,
}

impl Related<super::tour_package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TourPackage.def()
    }
}

impl Related<super::ordered_quantity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderedQuantities.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
