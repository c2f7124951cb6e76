use crate::{
    entities::{activity, ordered_quantity, Activity, ActivityModel, ActivityType, OrderedQuantity},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Catalog fields supplied on create and update.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ActivityInput {
    #[validate(custom = "validate_not_blank")]
    pub name: String,
    pub activity_type: ActivityType,
    #[validate(custom = "validate_not_blank")]
    pub item: String,
    #[validate(range(min = 1, message = "capacity must be greater than 0"))]
    pub capacity: i32,
    #[validate(range(min = 0, message = "price must not be negative"))]
    pub price: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub start_location: String,
    pub end_location: String,
}

impl ActivityInput {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.end_date <= self.start_date {
            return Err(ServiceError::InvalidInput(format!(
                "Activity '{}' must end after it starts",
                self.name
            )));
        }
        Ok(())
    }
}

/// Inventory of bookable flights, accommodations and vehicles.
#[derive(Clone)]
pub struct ActivityService {
    db: Arc<DatabaseConnection>,
}

impl ActivityService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: ActivityInput) -> Result<ActivityModel, ServiceError> {
        input.check()?;

        let now = Utc::now();
        let activity = activity::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            activity_type: Set(input.activity_type),
            item: Set(input.item),
            capacity: Set(input.capacity),
            price: Set(input.price),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            start_location: Set(input.start_location),
            end_location: Set(input.end_location),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(activity_id = %activity.id, "Activity created");
        Ok(activity)
    }

    /// Overwrites the mutable catalog fields. Existing line items keep their
    /// snapshot of the old values.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: ActivityInput) -> Result<ActivityModel, ServiceError> {
        input.check()?;

        let existing = self.get_by_id(id).await?;
        let mut activity: activity::ActiveModel = existing.into();
        activity.name = Set(input.name);
        activity.activity_type = Set(input.activity_type);
        activity.item = Set(input.item);
        activity.capacity = Set(input.capacity);
        activity.price = Set(input.price);
        activity.start_date = Set(input.start_date);
        activity.end_date = Set(input.end_date);
        activity.start_location = Set(input.start_location);
        activity.end_location = Set(input.end_location);
        activity.updated_at = Set(Utc::now());

        let activity = activity.update(&*self.db).await?;
        info!(activity_id = %id, "Activity updated");
        Ok(activity)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        Activity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Activity {} not found", id)))?;

        let references = OrderedQuantity::find()
            .filter(ordered_quantity::Column::ActivityId.eq(id))
            .count(&txn)
            .await?;
        if references > 0 {
            warn!(activity_id = %id, references, "Refusing to delete referenced activity");
            return Err(ServiceError::Conflict(format!(
                "Activity {} is referenced by {} ordered quantities",
                id, references
            )));
        }

        Activity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(activity_id = %id, "Activity deleted");
        Ok(())
    }

    /// Removes `amount` units from the activity's capacity in its own
    /// transaction.
    #[instrument(skip(self))]
    pub async fn decrement_capacity(&self, id: Uuid, amount: i32) -> Result<ActivityModel, ServiceError> {
        let txn = self.db.begin().await?;
        let activity = decrement_capacity_in(&txn, id, i64::from(amount)).await?;
        txn.commit().await?;
        Ok(activity)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<ActivityModel, ServiceError> {
        Activity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Activity {} not found", id)))
    }

    pub async fn list_all(&self) -> Result<Vec<ActivityModel>, ServiceError> {
        Ok(Activity::find()
            .order_by_asc(activity::Column::StartDate)
            .all(&*self.db)
            .await?)
    }

    pub async fn list_by_type(&self, activity_type: ActivityType) -> Result<Vec<ActivityModel>, ServiceError> {
        Ok(Activity::find()
            .filter(activity::Column::ActivityType.eq(activity_type))
            .order_by_asc(activity::Column::StartDate)
            .all(&*self.db)
            .await?)
    }

    /// Case-insensitive substring match on the activity name.
    pub async fn search_by_name(&self, fragment: &str) -> Result<Vec<ActivityModel>, ServiceError> {
        let pattern = format!("%{}%", escape_like(&fragment.trim().to_lowercase()));
        Ok(Activity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col((Activity, activity::Column::Name))))
                    .like(LikeExpr::new(pattern).escape('\\')),
            )
            .order_by_asc(activity::Column::StartDate)
            .all(&*self.db)
            .await?)
    }

    pub async fn exists_by_name(&self, name: &str) -> Result<bool, ServiceError> {
        let count = Activity::find()
            .filter(activity::Column::Name.eq(name))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }
}

/// Escapes `LIKE` wildcards so user input only matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Locks the activity row and lowers its capacity by `amount`, failing with
/// `Conflict` if that would go below zero. Runs on the caller's connection so
/// package processing can batch several decrements into one transaction.
pub(crate) async fn decrement_capacity_in<C>(
    conn: &C,
    id: Uuid,
    amount: i64,
) -> Result<ActivityModel, ServiceError>
where
    C: ConnectionTrait,
{
    if amount <= 0 {
        return Err(ServiceError::InvalidInput(format!(
            "Capacity decrement for activity {} must be positive, got {}",
            id, amount
        )));
    }

    let activity = Activity::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Activity {} not found", id)))?;

    let remaining = match i32::try_from(i64::from(activity.capacity) - amount) {
        Ok(remaining) if remaining >= 0 => remaining,
        _ => {
            warn!(activity_id = %id, capacity = activity.capacity, amount, "Insufficient capacity");
            return Err(ServiceError::Conflict(format!(
                "Activity {} has capacity {} but {} units were requested",
                id, activity.capacity, amount
            )));
        }
    };

    let mut model: activity::ActiveModel = activity.into();
    model.capacity = Set(remaining);
    model.updated_at = Set(Utc::now());
    let updated = model.update(conn).await?;

    info!(activity_id = %id, amount, remaining, "Activity capacity decremented");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn input() -> ActivityInput {
        let start = Utc::now();
        ActivityInput {
            name: "GA-404 Jakarta to Denpasar".into(),
            activity_type: ActivityType::Flight,
            item: "Economy".into(),
            capacity: 150,
            price: 1_200_000,
            start_date: start,
            end_date: start + Duration::hours(2),
            start_location: "Jakarta".into(),
            end_location: "Denpasar".into(),
        }
    }

    #[test]
    fn valid_input_passes() {
        assert!(input().check().is_ok());
    }

    #[test]
    fn zero_capacity_and_negative_price_are_rejected() {
        let mut bad = input();
        bad.capacity = 0;
        assert!(matches!(bad.check(), Err(ServiceError::ValidationError(_))));

        let mut bad = input();
        bad.price = -1;
        assert!(matches!(bad.check(), Err(ServiceError::ValidationError(_))));
    }

    #[test]
    fn free_and_very_expensive_activities_are_valid() {
        let mut free = input();
        free.price = 0;
        assert!(free.check().is_ok());

        let mut charter = input();
        charter.price = i64::MAX;
        assert!(charter.check().is_ok());
    }

    #[test]
    fn end_must_follow_start() {
        let mut bad = input();
        bad.end_date = bad.start_date;
        assert!(matches!(bad.check(), Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("bali"), "bali");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut bad = input();
        bad.name = "   ".into();
        assert!(matches!(bad.check(), Err(ServiceError::ValidationError(_))));
    }
}
