use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::activity;

/// Line item reserving `ordered_quota` units of one activity for one plan.
///
/// The `quota`, `price`, `activity_name`, `activity_item`, `start_date` and
/// `end_date` columns are a snapshot of the activity taken when the line item
/// was created; later catalog edits do not touch them.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ordered_quantities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub plan_id: Uuid,
    pub activity_id: Uuid,
    pub ordered_quota: i32,
    pub quota: i32,
    pub price: i64,
    pub activity_name: String,
    pub activity_item: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// `price * ordered_quota`, or `None` when it does not fit in an `i64`.
    pub fn total_price(&self) -> Option<i64> {
        self.price.checked_mul(i64::from(self.ordered_quota))
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        ActivitySnapshot {
            quota: self.quota,
            price: self.price,
            name: self.activity_name.clone(),
            item: self.activity_item.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

/// Activity fields frozen onto a line item at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub quota: i32,
    pub price: i64,
    pub name: String,
    pub item: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl From<&activity::Model> for ActivitySnapshot {
    fn from(activity: &activity::Model) -> Self {
        Self {
            quota: activity.capacity,
            price: activity.price,
            name: activity.name.clone(),
            item: activity.item.clone(),
            start_date: activity.start_date,
            end_date: activity.end_date,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::plan::Entity",
        from = "Column::PlanId",
        to = "super::plan::Column::Id"
    )]
    Plan,
    #[sea_orm(
        belongs_to = "super::activity::Entity",
        from = "Column::ActivityId",
        to = "super::activity::Column::Id"
    )]
    Activity,
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
