#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;
use tour_package_api::{
    auth::Caller,
    config::AppConfig,
    db::{self, DbPool},
    entities::{ActivityModel, ActivityType, CouponModel, PlanModel, TourPackageModel},
    services::{
        activities::ActivityInput, coupons::CouponInput, packages::PackageInput,
        plans::PlanInput, TourServices,
    },
};

pub const OWNER: &str = "customer-alice";
pub const TEST_API_KEY: &str = "test-loyalty-api-key-0001";

/// Services over a fresh in-memory SQLite database with the schema applied.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub services: TourServices,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_database_url("sqlite::memory:").await
    }

    /// Services over a SQLite file inside `dir`, so the pool really holds
    /// several connections that contend for locks.
    pub async fn file_backed(dir: &TempDir) -> Self {
        let path = dir.path().join("tour.db");
        Self::with_database_url(&format!("sqlite://{}?mode=rwc", path.display())).await
    }

    async fn with_database_url(url: &str) -> Self {
        let cfg = AppConfig::new(url.to_string(), "test".to_string(), TEST_API_KEY.to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to open test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db = Arc::new(pool);
        let config = Arc::new(cfg);
        let services = TourServices::new(db.clone(), config.clone());

        Self {
            db,
            config,
            services,
        }
    }

    pub fn owner(&self) -> Caller {
        Caller::customer(OWNER)
    }

    pub async fn seed_package(&self, quota: i32) -> TourPackageModel {
        self.seed_package_starting(quota, day(2024, 7, 10)).await
    }

    pub async fn seed_package_starting(&self, quota: i32, start: DateTime<Utc>) -> TourPackageModel {
        self.services
            .packages
            .create(PackageInput {
                user_id: OWNER.to_string(),
                name: "Bali getaway".to_string(),
                quota,
                price: 0,
                start_date: start,
                end_date: start + Duration::days(5),
            })
            .await
            .expect("failed to seed package")
    }

    pub async fn seed_plan(&self, package: &TourPackageModel, activity_type: ActivityType) -> PlanModel {
        self.services
            .plans
            .create(&self.owner(), package.id, plan_input(package, activity_type))
            .await
            .expect("failed to seed plan")
    }

    pub async fn seed_activity(
        &self,
        activity_type: ActivityType,
        capacity: i32,
        price: i64,
    ) -> ActivityModel {
        self.services
            .activities
            .create(activity_input(activity_type, capacity, price))
            .await
            .expect("failed to seed activity")
    }

    pub async fn seed_coupon(&self, name: &str, points: i64, percent_off: i32) -> CouponModel {
        self.services
            .coupons
            .create(CouponInput {
                name: name.to_string(),
                description: Some(format!("{} discount", name)),
                points,
                percent_off,
            })
            .await
            .expect("failed to seed coupon")
    }
}

pub fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).unwrap()
}

/// A plan spanning the first day of `package`.
pub fn plan_input(package: &TourPackageModel, activity_type: ActivityType) -> PlanInput {
    PlanInput {
        activity_type,
        start_date: package.start_date,
        end_date: package.start_date + Duration::days(1),
        start_location: "Jakarta".to_string(),
        end_location: "Denpasar".to_string(),
    }
}

pub fn activity_input(activity_type: ActivityType, capacity: i32, price: i64) -> ActivityInput {
    let start = day(2024, 7, 10);
    ActivityInput {
        name: format!("{} to Denpasar", activity_type.display_name()),
        activity_type,
        item: "Standard".to_string(),
        capacity,
        price,
        start_date: start,
        end_date: start + Duration::hours(3),
        start_location: "Jakarta".to_string(),
        end_location: "Denpasar".to_string(),
    }
}
