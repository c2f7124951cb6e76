use crate::{
    entities::{coupon, Coupon, CouponModel},
    errors::ServiceError,
    services::activities::validate_not_blank,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CouponInput {
    #[validate(custom = "validate_not_blank")]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "points must be greater than 0"))]
    pub points: i64,
    #[validate(range(min = 1, max = 100, message = "percent_off must be between 1 and 100"))]
    pub percent_off: i32,
}

/// Catalog of coupons purchasable with loyalty points.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Newest coupons first.
    pub async fn list(&self) -> Result<Vec<CouponModel>, ServiceError> {
        Ok(Coupon::find()
            .order_by_desc(coupon::Column::CreatedDate)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<CouponModel, ServiceError> {
        Coupon::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", id)))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CouponInput) -> Result<CouponModel, ServiceError> {
        input.validate()?;

        // id and timestamps are filled in by the entity's before_save hook
        let coupon = coupon::ActiveModel {
            name: Set(input.name),
            description: Set(input.description),
            points: Set(input.points),
            percent_off: Set(input.percent_off),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(coupon_id = %coupon.id, points = coupon.points, "Coupon created");
        Ok(coupon)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: CouponInput) -> Result<CouponModel, ServiceError> {
        input.validate()?;

        let existing = self.get_by_id(id).await?;
        let mut model: coupon::ActiveModel = existing.into();
        model.name = Set(input.name);
        model.description = Set(input.description);
        model.points = Set(input.points);
        model.percent_off = Set(input.percent_off);
        let coupon = model.update(&*self.db).await?;

        info!(coupon_id = %id, "Coupon updated");
        Ok(coupon)
    }
}
