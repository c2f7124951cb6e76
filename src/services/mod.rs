// Booking lifecycle
pub mod activities;
pub mod ordered_quantities;
pub mod packages;
pub mod plans;

// Loyalty rewards
pub mod coupons;
pub mod loyalty;

// Reporting
pub mod statistics;

use std::sync::Arc;

use crate::{config::AppConfig, db::DbPool};

use self::{
    activities::ActivityService, coupons::CouponService, loyalty::LoyaltyService,
    ordered_quantities::OrderedQuantityService, packages::PackageService, plans::PlanService,
    statistics::StatisticsService,
};

/// Service container holding every service over one shared pool.
#[derive(Clone)]
pub struct TourServices {
    pub activities: Arc<ActivityService>,
    pub packages: Arc<PackageService>,
    pub plans: Arc<PlanService>,
    pub ordered_quantities: Arc<OrderedQuantityService>,
    pub loyalty: Arc<LoyaltyService>,
    pub coupons: Arc<CouponService>,
    pub statistics: Arc<StatisticsService>,
}

impl TourServices {
    pub fn new(db: Arc<DbPool>, config: Arc<AppConfig>) -> Self {
        Self {
            activities: Arc::new(ActivityService::new(db.clone())),
            packages: Arc::new(PackageService::new(db.clone())),
            plans: Arc::new(PlanService::new(db.clone())),
            ordered_quantities: Arc::new(OrderedQuantityService::new(db.clone())),
            loyalty: Arc::new(LoyaltyService::new(db.clone(), config)),
            coupons: Arc::new(CouponService::new(db.clone())),
            statistics: Arc::new(StatisticsService::new(db)),
        }
    }
}
