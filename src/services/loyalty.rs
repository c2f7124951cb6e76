use crate::{
    auth::verify_api_key,
    config::AppConfig,
    entities::{
        coupon, loyalty_points, purchased_coupon, Coupon, CouponModel, LoyaltyPoints,
        LoyaltyPointsModel, PurchasedCoupon, PurchasedCouponModel,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const CODE_PREFIX_LEN: usize = 6;
const DEFAULT_CODE_PREFIX: &str = "LOYAL";

/// A purchased coupon joined with the catalog entry it was bought from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchasedCouponView {
    pub id: Uuid,
    pub code: String,
    pub coupon_id: Uuid,
    pub coupon_name: String,
    pub points: i64,
    pub percent_off: i32,
    pub purchased_date: DateTime<Utc>,
    pub used_date: Option<DateTime<Utc>>,
}

impl PurchasedCouponView {
    fn new(purchase: PurchasedCouponModel, coupon: &CouponModel) -> Self {
        Self {
            id: purchase.id,
            code: purchase.code,
            coupon_id: purchase.coupon_id,
            coupon_name: coupon.name.clone(),
            points: coupon.points,
            percent_off: coupon.percent_off,
            purchased_date: purchase.purchased_date,
            used_date: purchase.used_date,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used_date.is_some()
    }
}

/// Outcome of redeeming a coupon code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub code: String,
    pub customer_id: Uuid,
    pub coupon_id: Uuid,
    pub percent_off: i32,
    pub valid: bool,
}

/// Everything a customer sees on their loyalty page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyDashboard {
    pub customer_id: Uuid,
    pub points: i64,
    pub purchased_coupons: Vec<PurchasedCouponView>,
    pub available_coupons: Vec<CouponModel>,
    pub total_purchased: usize,
    pub active_coupons: usize,
    pub redeemed_coupons: usize,
    pub available_coupon_count: usize,
}

/// Point balances, coupon purchases and redemptions.
#[derive(Clone)]
pub struct LoyaltyService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
}

impl LoyaltyService {
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// Gate for calls coming from external systems rather than the customer.
    pub fn authorize_external(&self, presented: Option<&str>) -> Result<(), ServiceError> {
        verify_api_key(&self.config.loyalty_api_key, presented)
    }

    #[instrument(skip(self))]
    pub async fn add_points(&self, customer_id: Uuid, amount: i64) -> Result<LoyaltyPointsModel, ServiceError> {
        if amount <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "Points to add must be greater than 0, got {}",
                amount
            )));
        }

        let current = self.get_balance(customer_id).await?;
        if current.checked_add(amount).is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "Adding {} points would overflow the balance of customer {}",
                amount, customer_id
            )));
        }

        // One statement, so concurrent first grants for a customer cannot
        // race each other into a duplicate key
        LoyaltyPoints::insert(loyalty_points::ActiveModel {
            customer_id: Set(customer_id),
            points: Set(amount),
        })
        .on_conflict(
            OnConflict::column(loyalty_points::Column::CustomerId)
                .value(
                    loyalty_points::Column::Points,
                    Expr::col((LoyaltyPoints, loyalty_points::Column::Points)).add(amount),
                )
                .to_owned(),
        )
        .exec_without_returning(&*self.db)
        .await?;

        let balance = LoyaltyPoints::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("Loyalty balance of customer {} vanished", customer_id))
            })?;

        info!(customer_id = %customer_id, amount, balance = balance.points, "Loyalty points added");
        Ok(balance)
    }

    /// Current balance; customers without a ledger row have 0 points.
    pub async fn get_balance(&self, customer_id: Uuid) -> Result<i64, ServiceError> {
        Ok(LoyaltyPoints::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .map(|row| row.points)
            .unwrap_or(0))
    }

    /// Spends the coupon's cost from the customer's balance and issues a
    /// fresh code. A purchase that loses a race for its code is retried.
    #[instrument(skip(self))]
    pub async fn purchase_coupon(
        &self,
        customer_id: Uuid,
        coupon_id: Uuid,
    ) -> Result<PurchasedCouponModel, ServiceError> {
        let max_attempts = self.config.coupon_code_max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.try_purchase(customer_id, coupon_id).await {
                Err(err) if err.is_unique_violation() && attempt < max_attempts => {
                    warn!(customer_id = %customer_id, coupon_id = %coupon_id, attempt, "Coupon code collided, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_purchase(
        &self,
        customer_id: Uuid,
        coupon_id: Uuid,
    ) -> Result<PurchasedCouponModel, ServiceError> {
        let txn = self.db.begin().await?;

        let coupon = Coupon::find_by_id(coupon_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", coupon_id)))?;

        let balance = debit_in(&txn, customer_id, coupon.points).await?;

        let previous = PurchasedCoupon::find()
            .filter(purchased_coupon::Column::CustomerId.eq(customer_id))
            .filter(purchased_coupon::Column::CouponId.eq(coupon_id))
            .count(&txn)
            .await?;

        let mut sequence = previous + 1;
        let code = loop {
            let candidate = coupon_code(&coupon.name, customer_id, sequence);
            let taken = PurchasedCoupon::find()
                .filter(purchased_coupon::Column::Code.eq(candidate.as_str()))
                .count(&txn)
                .await?;
            if taken == 0 {
                break candidate;
            }
            debug!(code = %candidate, "Coupon code already issued");
            sequence += 1;
        };

        // id and purchased_date are filled in by the entity's before_save hook
        let purchase = purchased_coupon::ActiveModel {
            code: Set(code),
            customer_id: Set(customer_id),
            coupon_id: Set(coupon_id),
            used_date: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(
            customer_id = %customer_id,
            coupon_id = %coupon_id,
            code = %purchase.code,
            points_spent = coupon.points,
            balance,
            "Coupon purchased"
        );
        Ok(purchase)
    }

    /// Marks a purchased code as used. A code can be redeemed once, and only
    /// by the customer who bought it.
    #[instrument(skip(self))]
    pub async fn redeem_coupon(&self, code: &str, customer_id: Uuid) -> Result<Redemption, ServiceError> {
        let txn = self.db.begin().await?;

        let purchase = PurchasedCoupon::find()
            .filter(purchased_coupon::Column::Code.eq(code))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon code {} not found", code)))?;

        if purchase.customer_id != customer_id {
            warn!(code = %code, customer_id = %customer_id, "Coupon code presented by another customer");
            return Err(ServiceError::InvalidInput(format!(
                "Coupon code {} does not belong to customer {}",
                code, customer_id
            )));
        }
        if purchase.is_used() {
            return Err(ServiceError::Conflict(format!("Coupon code {} is already used", code)));
        }

        let coupon = Coupon::find_by_id(purchase.coupon_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", purchase.coupon_id)))?;

        let mut model: purchased_coupon::ActiveModel = purchase.into();
        model.used_date = Set(Some(Utc::now()));
        let purchase = model.update(&txn).await?;

        txn.commit().await?;

        info!(code = %code, customer_id = %customer_id, percent_off = coupon.percent_off, "Coupon redeemed");
        Ok(Redemption {
            code: purchase.code,
            customer_id,
            coupon_id: coupon.id,
            percent_off: coupon.percent_off,
            valid: true,
        })
    }

    /// Purchases of `customer_id`, newest first.
    pub async fn get_purchased_coupons(&self, customer_id: Uuid) -> Result<Vec<PurchasedCouponView>, ServiceError> {
        let rows = PurchasedCoupon::find()
            .filter(purchased_coupon::Column::CustomerId.eq(customer_id))
            .find_also_related(Coupon)
            .order_by_desc(purchased_coupon::Column::PurchasedDate)
            .all(&*self.db)
            .await?;

        rows.into_iter()
            .map(|(purchase, coupon)| -> Result<PurchasedCouponView, ServiceError> {
                let coupon = coupon.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Purchased coupon {} references missing coupon {}",
                        purchase.id, purchase.coupon_id
                    ))
                })?;
                Ok(PurchasedCouponView::new(purchase, &coupon))
            })
            .collect()
    }

    pub async fn dashboard(&self, customer_id: Uuid) -> Result<LoyaltyDashboard, ServiceError> {
        let points = self.get_balance(customer_id).await?;
        let purchased_coupons = self.get_purchased_coupons(customer_id).await?;
        let available_coupons = Coupon::find()
            .order_by_desc(coupon::Column::CreatedDate)
            .all(&*self.db)
            .await?;

        let redeemed_coupons = purchased_coupons.iter().filter(|c| c.is_used()).count();
        Ok(LoyaltyDashboard {
            customer_id,
            points,
            total_purchased: purchased_coupons.len(),
            active_coupons: purchased_coupons.len() - redeemed_coupons,
            redeemed_coupons,
            available_coupon_count: available_coupons.len(),
            purchased_coupons,
            available_coupons,
        })
    }
}

/// Removes `amount` points from the customer's balance, returning what is
/// left. Fails with `Conflict` when the balance does not cover it.
pub(crate) async fn debit_in<C>(conn: &C, customer_id: Uuid, amount: i64) -> Result<i64, ServiceError>
where
    C: ConnectionTrait,
{
    let row = LoyaltyPoints::find_by_id(customer_id)
        .lock_exclusive()
        .one(conn)
        .await?;
    let balance = row.as_ref().map(|r| r.points).unwrap_or(0);

    if balance < amount {
        warn!(customer_id = %customer_id, balance, amount, "Insufficient loyalty points");
        return Err(ServiceError::Conflict(format!(
            "Customer {} has insufficient points: balance {}, required {}",
            customer_id, balance, amount
        )));
    }

    // A missing row means a zero balance, which only covers a zero debit
    let Some(row) = row else {
        return Ok(0);
    };
    let remaining = balance - amount;
    let mut model: loyalty_points::ActiveModel = row.into();
    model.points = Set(remaining);
    model.update(conn).await?;
    Ok(remaining)
}

/// Alphanumeric part of the coupon name, uppercased and cut to six
/// characters. Falls back to "LOYAL" when nothing is left.
pub fn sanitize_code_prefix(name: &str) -> String {
    let prefix: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(CODE_PREFIX_LEN)
        .collect::<String>()
        .to_ascii_uppercase();
    if prefix.is_empty() {
        DEFAULT_CODE_PREFIX.to_string()
    } else {
        prefix
    }
}

/// `PREFIX-CUSTOMER-SEQ`, e.g. `SUMMER-3F2A9C-2`.
pub fn coupon_code(coupon_name: &str, customer_id: Uuid, sequence: u64) -> String {
    let customer: String = customer_id
        .simple()
        .to_string()
        .chars()
        .take(CODE_PREFIX_LEN)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("{}-{}-{}", sanitize_code_prefix(coupon_name), customer, sequence)
}
