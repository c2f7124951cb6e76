use crate::{
    auth::{authorize_package_access, Caller},
    entities::{
        ordered_quantity, plan, ActivityType, OrderedQuantity, OrderedQuantityModel, Plan,
        PlanModel, PlanStatus, TourPackage, TourPackageModel,
    },
    errors::ServiceError,
    services::activities::validate_not_blank,
    services::ordered_quantities::{plan_totals_in, sum_line_totals},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Mutable fields of a plan.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlanInput {
    pub activity_type: ActivityType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[validate(custom = "validate_not_blank")]
    pub start_location: String,
    #[validate(custom = "validate_not_blank")]
    pub end_location: String,
}

impl PlanInput {
    fn check_against(&self, package: &TourPackageModel) -> Result<(), ServiceError> {
        self.validate()?;
        if self.end_date < self.start_date {
            return Err(ServiceError::InvalidInput(
                "Plan end date must not precede its start date".to_string(),
            ));
        }
        if !package.contains_window(self.start_date, self.end_date) {
            return Err(ServiceError::InvalidInput(format!(
                "Plan dates {} - {} fall outside package {} window {} - {}",
                self.start_date, self.end_date, package.id, package.start_date, package.end_date
            )));
        }
        Ok(())
    }
}

/// A plan together with its line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanWithOrderedQuantities {
    pub plan: PlanModel,
    pub ordered_quantities: Vec<OrderedQuantityModel>,
    pub total_price: i64,
}

impl PlanWithOrderedQuantities {
    pub(crate) fn new(
        plan: PlanModel,
        ordered_quantities: Vec<OrderedQuantityModel>,
    ) -> Result<Self, ServiceError> {
        let total_price = sum_line_totals(&ordered_quantities)?;
        Ok(Self {
            plan,
            ordered_quantities,
            total_price,
        })
    }
}

/// Plan state machine: `Unfulfilled -> Pending -> Fulfilled -> Processed`.
#[derive(Clone)]
pub struct PlanService {
    db: Arc<DatabaseConnection>,
}

impl PlanService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        caller: &Caller,
        package_id: Uuid,
        input: PlanInput,
    ) -> Result<PlanModel, ServiceError> {
        let txn = self.db.begin().await?;

        let package = TourPackage::find_by_id(package_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {} not found", package_id)))?;
        authorize_package_access(caller, &package)?;

        if package.is_processed() {
            return Err(ServiceError::Conflict(format!(
                "Package {} is processed and no longer accepts plans",
                package_id
            )));
        }
        input.check_against(&package)?;

        let now = Utc::now();
        let plan = plan::ActiveModel {
            id: Set(Uuid::new_v4()),
            package_id: Set(package_id),
            activity_type: Set(input.activity_type),
            price: Set(0),
            status: Set(PlanStatus::Unfulfilled),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            start_location: Set(input.start_location),
            end_location: Set(input.end_location),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(plan_id = %plan.id, package_id = %package_id, activity_type = %plan.activity_type, "Plan created");
        Ok(plan)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        input: PlanInput,
    ) -> Result<PlanModel, ServiceError> {
        let txn = self.db.begin().await?;

        let (plan, package) = lock_plan_for_edit(&txn, caller, id).await?;
        input.check_against(&package)?;

        if input.activity_type != plan.activity_type {
            let (line_items, _, _) = plan_totals_in(&txn, id).await?;
            if line_items > 0 {
                return Err(ServiceError::Conflict(format!(
                    "Plan {} holds {} {} line items; remove them before changing its type",
                    id, line_items, plan.activity_type
                )));
            }
        }

        let mut model: plan::ActiveModel = plan.into();
        model.activity_type = Set(input.activity_type);
        model.start_date = Set(input.start_date);
        model.end_date = Set(input.end_date);
        model.start_location = Set(input.start_location);
        model.end_location = Set(input.end_location);
        model.updated_at = Set(Utc::now());
        let plan = model.update(&txn).await?;

        txn.commit().await?;

        info!(plan_id = %id, "Plan updated");
        Ok(plan)
    }

    /// Deletes the plan and its line items.
    #[instrument(skip(self))]
    pub async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        lock_plan_for_edit(&txn, caller, id).await?;

        let removed = OrderedQuantity::delete_many()
            .filter(ordered_quantity::Column::PlanId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;
        Plan::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        info!(plan_id = %id, ordered_quantities_removed = removed, "Plan deleted");
        Ok(())
    }

    /// Locks the plan's price to the sum of its line totals and marks it
    /// `Processed`.
    #[instrument(skip(self))]
    pub async fn process(&self, caller: &Caller, id: Uuid) -> Result<PlanModel, ServiceError> {
        let txn = self.db.begin().await?;

        let (plan, package) = lock_plan(&txn, id).await?;
        authorize_package_access(caller, &package)?;

        if plan.status.is_terminal() {
            return Err(ServiceError::Conflict(format!("Plan {} is already processed", id)));
        }

        let (line_items, _, total_price) = plan_totals_in(&txn, id).await?;
        if line_items == 0 {
            warn!(plan_id = %id, "Plan has no line items to process");
            return Err(ServiceError::Conflict(format!(
                "Cannot process plan {} without ordered quantities",
                id
            )));
        }

        let mut model: plan::ActiveModel = plan.into();
        model.price = Set(total_price);
        model.status = Set(PlanStatus::Processed);
        model.updated_at = Set(Utc::now());
        let plan = model.update(&txn).await?;

        txn.commit().await?;

        info!(plan_id = %id, price = total_price, "Plan processed");
        Ok(plan)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<PlanModel, ServiceError> {
        Plan::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Plan {} not found", id)))
    }

    pub async fn get_with_ordered_quantities(
        &self,
        id: Uuid,
    ) -> Result<PlanWithOrderedQuantities, ServiceError> {
        let plan = self.get_by_id(id).await?;
        let ordered_quantities = OrderedQuantity::find()
            .filter(ordered_quantity::Column::PlanId.eq(id))
            .order_by_asc(ordered_quantity::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        PlanWithOrderedQuantities::new(plan, ordered_quantities)
    }

    pub async fn list_by_package(&self, package_id: Uuid) -> Result<Vec<PlanModel>, ServiceError> {
        Ok(Plan::find()
            .filter(plan::Column::PackageId.eq(package_id))
            .order_by_asc(plan::Column::StartDate)
            .all(&*self.db)
            .await?)
    }
}

/// Loads a plan and its package, locking the plan row.
pub(crate) async fn lock_plan<C>(
    conn: &C,
    plan_id: Uuid,
) -> Result<(PlanModel, TourPackageModel), ServiceError>
where
    C: ConnectionTrait,
{
    let plan = Plan::find_by_id(plan_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Plan {} not found", plan_id)))?;

    let package = TourPackage::find_by_id(plan.package_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Package {} of plan {} not found",
                plan.package_id, plan_id
            ))
        })?;

    Ok((plan, package))
}

/// Like [`lock_plan`], then rejects callers who may not touch the package and
/// plans that are frozen because they or their package are processed.
pub(crate) async fn lock_plan_for_edit<C>(
    conn: &C,
    caller: &Caller,
    plan_id: Uuid,
) -> Result<(PlanModel, TourPackageModel), ServiceError>
where
    C: ConnectionTrait,
{
    let (plan, package) = lock_plan(conn, plan_id).await?;
    authorize_package_access(caller, &package)?;

    if package.is_processed() {
        return Err(ServiceError::Conflict(format!(
            "Package {} is processed; plan {} can no longer change",
            package.id, plan_id
        )));
    }
    if plan.status.is_terminal() {
        return Err(ServiceError::Conflict(format!(
            "Plan {} is processed and can no longer change",
            plan_id
        )));
    }

    Ok((plan, package))
}

/// Recomputes the status implied by the plan's line items and persists it
/// when it moved. Processed plans are left alone.
pub(crate) async fn refresh_status_in<C>(
    conn: &C,
    plan: PlanModel,
    package_quota: i32,
) -> Result<PlanModel, ServiceError>
where
    C: ConnectionTrait,
{
    if plan.status.is_terminal() {
        return Ok(plan);
    }

    let (line_items, ordered_units, _) = plan_totals_in(conn, plan.id).await?;
    let derived = PlanStatus::derive(line_items, ordered_units, package_quota);
    if derived == plan.status {
        return Ok(plan);
    }

    debug!(plan_id = %plan.id, from = plan.status.as_str(), to = derived.as_str(), "Plan status changed");
    let mut model: plan::ActiveModel = plan.into();
    model.status = Set(derived);
    model.updated_at = Set(Utc::now());
    Ok(model.update(conn).await?)
}
