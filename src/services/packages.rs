use crate::{
    entities::{
        ordered_quantity, plan, tour_package, OrderedQuantity, OrderedQuantityModel, PackageStatus,
        Plan, PlanModel, TourPackage, TourPackageModel,
    },
    errors::ServiceError,
    services::activities::{decrement_capacity_in, validate_not_blank},
    services::plans::{refresh_status_in, PlanWithOrderedQuantities},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Fields supplied when creating or updating a package. Status is never taken
/// from input.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PackageInput {
    #[validate(custom = "validate_not_blank")]
    pub user_id: String,
    #[validate(custom = "validate_not_blank")]
    pub name: String,
    #[validate(range(min = 1, message = "quota must be greater than 0"))]
    pub quota: i32,
    #[validate(range(min = 0, message = "price must not be negative"))]
    pub price: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl PackageInput {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.end_date <= self.start_date {
            return Err(ServiceError::InvalidInput(format!(
                "Package '{}' must end after it starts",
                self.name
            )));
        }
        Ok(())
    }
}

/// A package with every plan and line item beneath it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageWithPlans {
    pub package: TourPackageModel,
    pub plans: Vec<PlanWithOrderedQuantities>,
}

/// Package state machine: `Pending -> Processed`.
#[derive(Clone)]
pub struct PackageService {
    db: Arc<DatabaseConnection>,
}

impl PackageService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create(&self, input: PackageInput) -> Result<TourPackageModel, ServiceError> {
        input.check()?;

        let now = Utc::now();
        let package = tour_package::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(input.user_id),
            name: Set(input.name),
            quota: Set(input.quota),
            price: Set(input.price),
            status: Set(PackageStatus::Pending),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(package_id = %package.id, "Package created");
        Ok(package)
    }

    /// Overwrites the mutable fields. Existing plans must still fit inside the
    /// new window, and their statuses are re-derived against the new quota.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: PackageInput) -> Result<TourPackageModel, ServiceError> {
        input.check()?;

        let txn = self.db.begin().await?;

        let package = TourPackage::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {} not found", id)))?;
        if package.is_processed() {
            return Err(ServiceError::Conflict(format!(
                "Package {} is processed and can no longer change",
                id
            )));
        }

        let plans = plans_of(&txn, id).await?;
        if let Some(outside) = plans
            .iter()
            .find(|p| p.start_date < input.start_date || p.end_date > input.end_date)
        {
            return Err(ServiceError::InvalidInput(format!(
                "Plan {} would fall outside the new window of package {}",
                outside.id, id
            )));
        }

        let mut model: tour_package::ActiveModel = package.into();
        model.user_id = Set(input.user_id);
        model.name = Set(input.name);
        model.quota = Set(input.quota);
        model.price = Set(input.price);
        model.start_date = Set(input.start_date);
        model.end_date = Set(input.end_date);
        model.updated_at = Set(Utc::now());
        let package = model.update(&txn).await?;

        for plan in plans {
            refresh_status_in(&txn, plan, package.quota).await?;
        }

        txn.commit().await?;

        info!(package_id = %id, "Package updated");
        Ok(package)
    }

    /// Deletes the package, its plans and their line items.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let package = TourPackage::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {} not found", id)))?;
        if package.is_processed() {
            return Err(ServiceError::Conflict(format!(
                "Package {} is processed and cannot be deleted",
                id
            )));
        }

        let plan_ids: Vec<Uuid> = plans_of(&txn, id).await?.into_iter().map(|p| p.id).collect();
        if !plan_ids.is_empty() {
            OrderedQuantity::delete_many()
                .filter(ordered_quantity::Column::PlanId.is_in(plan_ids.clone()))
                .exec(&txn)
                .await?;
            Plan::delete_many()
                .filter(plan::Column::PackageId.eq(id))
                .exec(&txn)
                .await?;
        }
        TourPackage::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        info!(package_id = %id, plans_removed = plan_ids.len(), "Package deleted");
        Ok(())
    }

    /// Finalises a package whose plans are all processed: reserves activity
    /// capacity for every line item, rolls plan prices up into the package
    /// price and marks it `Processed`.
    #[instrument(skip(self))]
    pub async fn process(&self, id: Uuid) -> Result<TourPackageModel, ServiceError> {
        let txn = self.db.begin().await?;

        let package = TourPackage::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {} not found", id)))?;
        if package.is_processed() {
            return Err(ServiceError::Conflict(format!("Package {} is already processed", id)));
        }

        let plans = plans_of(&txn, id).await?;
        if plans.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "Cannot process package {} without plans",
                id
            )));
        }
        if let Some(blocking) = plans.iter().find(|p| !p.status.is_terminal()) {
            warn!(package_id = %id, plan_id = %blocking.id, status = blocking.status.as_str(), "Package has unprocessed plan");
            return Err(ServiceError::Conflict(format!(
                "Cannot process package {}: plan {} is {}, not Processed",
                id,
                blocking.id,
                blocking.status.as_str()
            )));
        }

        let plan_ids: Vec<Uuid> = plans.iter().map(|p| p.id).collect();
        let line_items = OrderedQuantity::find()
            .filter(ordered_quantity::Column::PlanId.is_in(plan_ids))
            .all(&txn)
            .await?;

        // Ordered by activity id so concurrent packages lock rows in the same order
        let demand = capacity_demand(&line_items)?;
        for (activity_id, units) in demand {
            decrement_capacity_in(&txn, activity_id, units).await?;
        }

        let price = plans
            .iter()
            .try_fold(0i64, |total, p| total.checked_add(p.price))
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!("Total price of package {} overflows", id))
            })?;

        let mut model: tour_package::ActiveModel = package.into();
        model.price = Set(price);
        model.status = Set(PackageStatus::Processed);
        model.updated_at = Set(Utc::now());
        let package = model.update(&txn).await?;

        txn.commit().await?;

        info!(package_id = %id, price, plans = plans.len(), "Package processed");
        Ok(package)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<TourPackageModel, ServiceError> {
        TourPackage::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {} not found", id)))
    }

    pub async fn list_all(&self) -> Result<Vec<TourPackageModel>, ServiceError> {
        Ok(TourPackage::find()
            .order_by_asc(tour_package::Column::StartDate)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_by_user(&self, user_id: &str) -> Result<Vec<TourPackageModel>, ServiceError> {
        Ok(TourPackage::find()
            .filter(tour_package::Column::UserId.eq(user_id))
            .order_by_asc(tour_package::Column::StartDate)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_by_status(&self, status: PackageStatus) -> Result<Vec<TourPackageModel>, ServiceError> {
        Ok(TourPackage::find()
            .filter(tour_package::Column::Status.eq(status))
            .order_by_asc(tour_package::Column::StartDate)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_with_plans(&self, id: Uuid) -> Result<PackageWithPlans, ServiceError> {
        let package = self.get_by_id(id).await?;
        let mut assembled = self.assemble(vec![package]).await?;
        assembled
            .pop()
            .ok_or_else(|| ServiceError::InternalError(format!("Package {} vanished while loading", id)))
    }

    pub async fn list_all_with_plans(&self) -> Result<Vec<PackageWithPlans>, ServiceError> {
        let packages = self.list_all().await?;
        self.assemble(packages).await
    }

    async fn assemble(&self, packages: Vec<TourPackageModel>) -> Result<Vec<PackageWithPlans>, ServiceError> {
        if packages.is_empty() {
            return Ok(Vec::new());
        }

        let package_ids: Vec<Uuid> = packages.iter().map(|p| p.id).collect();
        let plans = Plan::find()
            .filter(plan::Column::PackageId.is_in(package_ids))
            .order_by_asc(plan::Column::StartDate)
            .all(&*self.db)
            .await?;

        let mut line_items_by_plan: HashMap<Uuid, Vec<_>> = HashMap::new();
        if !plans.is_empty() {
            let plan_ids: Vec<Uuid> = plans.iter().map(|p| p.id).collect();
            let line_items = OrderedQuantity::find()
                .filter(ordered_quantity::Column::PlanId.is_in(plan_ids))
                .order_by_asc(ordered_quantity::Column::CreatedAt)
                .all(&*self.db)
                .await?;
            for item in line_items {
                line_items_by_plan.entry(item.plan_id).or_default().push(item);
            }
        }

        let mut plans_by_package: HashMap<Uuid, Vec<PlanWithOrderedQuantities>> = HashMap::new();
        for plan in plans {
            let items = line_items_by_plan.remove(&plan.id).unwrap_or_default();
            plans_by_package
                .entry(plan.package_id)
                .or_default()
                .push(PlanWithOrderedQuantities::new(plan, items)?);
        }

        Ok(packages
            .into_iter()
            .map(|package| {
                let plans = plans_by_package.remove(&package.id).unwrap_or_default();
                PackageWithPlans { package, plans }
            })
            .collect())
    }
}

/// Units ordered per activity across every line item, keyed by activity id
/// so capacity rows are locked in a stable order.
fn capacity_demand(line_items: &[OrderedQuantityModel]) -> Result<BTreeMap<Uuid, i64>, ServiceError> {
    let mut demand: BTreeMap<Uuid, i64> = BTreeMap::new();
    for item in line_items {
        let units = demand.entry(item.activity_id).or_insert(0);
        *units = units
            .checked_add(i64::from(item.ordered_quota))
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "Ordered units for activity {} overflow",
                    item.activity_id
                ))
            })?;
    }
    Ok(demand)
}

async fn plans_of<C>(conn: &C, package_id: Uuid) -> Result<Vec<PlanModel>, ServiceError>
where
    C: sea_orm::ConnectionTrait,
{
    Ok(Plan::find()
        .filter(plan::Column::PackageId.eq(package_id))
        .order_by_asc(plan::Column::CreatedAt)
        .all(conn)
        .await?)
}
