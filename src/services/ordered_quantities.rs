use crate::{
    auth::Caller,
    entities::{
        ordered_quantity, Activity, ActivitySnapshot, OrderedQuantity, OrderedQuantityModel,
    },
    errors::ServiceError,
    services::plans::{lock_plan_for_edit, refresh_status_in},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Line items reserving activity units for a plan.
///
/// Every mutation locks the parent plan, checks the caller against the
/// package owner, and re-derives the plan status before committing.
#[derive(Clone)]
pub struct OrderedQuantityService {
    db: Arc<DatabaseConnection>,
}

impl OrderedQuantityService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        caller: &Caller,
        plan_id: Uuid,
        activity_id: Uuid,
        ordered_quota: i32,
    ) -> Result<OrderedQuantityModel, ServiceError> {
        let txn = self.db.begin().await?;

        let (plan, package) = lock_plan_for_edit(&txn, caller, plan_id).await?;

        let activity = Activity::find_by_id(activity_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Activity {} not found", activity_id)))?;

        if activity.activity_type != plan.activity_type {
            return Err(ServiceError::InvalidInput(format!(
                "Activity {} is a {} but plan {} only accepts {}",
                activity_id, activity.activity_type, plan_id, plan.activity_type
            )));
        }

        let duplicate = OrderedQuantity::find()
            .filter(ordered_quantity::Column::PlanId.eq(plan_id))
            .filter(ordered_quantity::Column::ActivityId.eq(activity_id))
            .one(&txn)
            .await?;
        if let Some(existing) = duplicate {
            return Err(ServiceError::Conflict(format!(
                "Plan {} already orders activity {} (line item {})",
                plan_id, activity_id, existing.id
            )));
        }

        check_quota(ordered_quota, activity.capacity, activity_id)?;
        check_line_total(activity.price, ordered_quota, activity_id)?;

        let snapshot = ActivitySnapshot::from(&activity);
        let now = Utc::now();
        let line_item = ordered_quantity::ActiveModel {
            id: Set(Uuid::new_v4()),
            plan_id: Set(plan_id),
            activity_id: Set(activity_id),
            ordered_quota: Set(ordered_quota),
            quota: Set(snapshot.quota),
            price: Set(snapshot.price),
            activity_name: Set(snapshot.name),
            activity_item: Set(snapshot.item),
            start_date: Set(snapshot.start_date),
            end_date: Set(snapshot.end_date),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let plan = refresh_status_in(&txn, plan, package.quota).await?;
        txn.commit().await?;

        info!(
            ordered_quantity_id = %line_item.id,
            plan_id = %plan_id,
            activity_id = %activity_id,
            ordered_quota,
            plan_status = plan.status.as_str(),
            "Ordered quantity created"
        );
        Ok(line_item)
    }

    /// Changes the ordered quota. The bound is the capacity captured when the
    /// line item was created, not the activity's live capacity.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        ordered_quota: i32,
    ) -> Result<OrderedQuantityModel, ServiceError> {
        let txn = self.db.begin().await?;

        let line_item = find_line_item(&txn, id).await?;
        let (plan, package) = lock_plan_for_edit(&txn, caller, line_item.plan_id).await?;

        check_quota(ordered_quota, line_item.snapshot().quota, line_item.activity_id)?;
        check_line_total(line_item.price, ordered_quota, line_item.activity_id)?;

        let mut model: ordered_quantity::ActiveModel = line_item.into();
        model.ordered_quota = Set(ordered_quota);
        model.updated_at = Set(Utc::now());
        let line_item = model.update(&txn).await?;

        let plan = refresh_status_in(&txn, plan, package.quota).await?;
        txn.commit().await?;

        info!(
            ordered_quantity_id = %id,
            ordered_quota,
            plan_status = plan.status.as_str(),
            "Ordered quantity updated"
        );
        Ok(line_item)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let line_item = find_line_item(&txn, id).await?;
        let (plan, package) = lock_plan_for_edit(&txn, caller, line_item.plan_id).await?;

        OrderedQuantity::delete_by_id(id).exec(&txn).await?;

        let plan = refresh_status_in(&txn, plan, package.quota).await?;
        txn.commit().await?;

        info!(
            ordered_quantity_id = %id,
            plan_id = %plan.id,
            plan_status = plan.status.as_str(),
            "Ordered quantity deleted"
        );
        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<OrderedQuantityModel, ServiceError> {
        find_line_item(&*self.db, id).await
    }

    pub async fn list_by_plan(&self, plan_id: Uuid) -> Result<Vec<OrderedQuantityModel>, ServiceError> {
        Ok(OrderedQuantity::find()
            .filter(ordered_quantity::Column::PlanId.eq(plan_id))
            .order_by_asc(ordered_quantity::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn list_all(&self) -> Result<Vec<OrderedQuantityModel>, ServiceError> {
        Ok(OrderedQuantity::find()
            .order_by_asc(ordered_quantity::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Total units ordered across the plan; 0 when it has no line items.
    pub async fn sum_quota_by_plan(&self, plan_id: Uuid) -> Result<i64, ServiceError> {
        let (_, units, _) = plan_totals_in(&*self.db, plan_id).await?;
        Ok(units)
    }

    /// Sum of `price * ordered_quota` across the plan; 0 when it has no line
    /// items.
    pub async fn total_price_for_plan(&self, plan_id: Uuid) -> Result<i64, ServiceError> {
        let (_, _, total) = plan_totals_in(&*self.db, plan_id).await?;
        Ok(total)
    }
}

fn check_quota(ordered_quota: i32, bound: i32, activity_id: Uuid) -> Result<(), ServiceError> {
    if ordered_quota <= 0 {
        return Err(ServiceError::InvalidInput(format!(
            "Ordered quota must be greater than 0, got {}",
            ordered_quota
        )));
    }
    if ordered_quota > bound {
        warn!(activity_id = %activity_id, ordered_quota, bound, "Ordered quota exceeds capacity");
        return Err(ServiceError::InvalidInput(format!(
            "Ordered quota {} exceeds capacity {} of activity {}",
            ordered_quota, bound, activity_id
        )));
    }
    Ok(())
}

fn check_line_total(price: i64, ordered_quota: i32, activity_id: Uuid) -> Result<(), ServiceError> {
    if price.checked_mul(i64::from(ordered_quota)).is_none() {
        return Err(ServiceError::InvalidInput(format!(
            "Ordering {} units of activity {} at price {} overflows the line total",
            ordered_quota, activity_id, price
        )));
    }
    Ok(())
}

/// Sum of the line totals, failing with `InvalidInput` instead of wrapping.
pub(crate) fn sum_line_totals(line_items: &[OrderedQuantityModel]) -> Result<i64, ServiceError> {
    line_items.iter().try_fold(0i64, |total, item| {
        item.total_price()
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "Total price of plan {} overflows at line item {}",
                    item.plan_id, item.id
                ))
            })
    })
}

async fn find_line_item<C>(conn: &C, id: Uuid) -> Result<OrderedQuantityModel, ServiceError>
where
    C: ConnectionTrait,
{
    OrderedQuantity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Ordered quantity {} not found", id)))
}

/// `(line items, ordered units, total price)` for one plan.
pub(crate) async fn plan_totals_in<C>(conn: &C, plan_id: Uuid) -> Result<(u64, i64, i64), ServiceError>
where
    C: ConnectionTrait,
{
    let line_items = OrderedQuantity::find()
        .filter(ordered_quantity::Column::PlanId.eq(plan_id))
        .all(conn)
        .await?;

    let units = line_items.iter().map(|oq| i64::from(oq.ordered_quota)).sum();
    let total = sum_line_totals(&line_items)?;
    Ok((line_items.len() as u64, units, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn quota_must_be_positive_and_within_bound() {
        let activity = Uuid::new_v4();
        assert!(check_quota(1, 1, activity).is_ok());
        assert!(check_quota(150, 150, activity).is_ok());
        assert_matches!(check_quota(0, 10, activity), Err(ServiceError::InvalidInput(_)));
        assert_matches!(check_quota(-3, 10, activity), Err(ServiceError::InvalidInput(_)));
        assert_matches!(check_quota(11, 10, activity), Err(ServiceError::InvalidInput(_)));
    }

    fn line(price: i64, ordered_quota: i32) -> OrderedQuantityModel {
        let now = Utc::now();
        OrderedQuantityModel {
            id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            activity_id: Uuid::new_v4(),
            ordered_quota,
            quota: ordered_quota,
            price,
            activity_name: "Hotel Santika".into(),
            activity_item: "Deluxe".into(),
            start_date: now,
            end_date: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn line_total_rejects_overflow() {
        let activity = Uuid::new_v4();
        assert!(check_line_total(i64::MAX / 3, 3, activity).is_ok());
        assert_matches!(
            check_line_total(i64::MAX / 2, 3, activity),
            Err(ServiceError::InvalidInput(_))
        );
    }

    #[test]
    fn summing_line_totals_never_wraps() {
        assert_eq!(sum_line_totals(&[]).unwrap(), 0);
        assert_eq!(sum_line_totals(&[line(250, 2), line(100, 3)]).unwrap(), 800);
        assert_matches!(
            sum_line_totals(&[line(i64::MAX / 2, 3)]),
            Err(ServiceError::InvalidInput(_))
        );
        assert_matches!(
            sum_line_totals(&[line(i64::MAX / 2, 1), line(i64::MAX / 2, 1), line(2, 1)]),
            Err(ServiceError::InvalidInput(_))
        );
    }
}
