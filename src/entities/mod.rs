//! sea-orm entities, one module per table.

pub mod activity;
pub mod coupon;
pub mod loyalty_points;
pub mod ordered_quantity;
pub mod plan;
pub mod purchased_coupon;
pub mod tour_package;

pub use activity::{ActivityType, Entity as Activity, Model as ActivityModel};
pub use coupon::{Entity as Coupon, Model as CouponModel};
pub use loyalty_points::{Entity as LoyaltyPoints, Model as LoyaltyPointsModel};
pub use ordered_quantity::{
    ActivitySnapshot, Entity as OrderedQuantity, Model as OrderedQuantityModel,
};
pub use plan::{Entity as Plan, Model as PlanModel, PlanStatus};
pub use purchased_coupon::{Entity as PurchasedCoupon, Model as PurchasedCouponModel};
pub use tour_package::{Entity as TourPackage, Model as TourPackageModel, PackageStatus};
