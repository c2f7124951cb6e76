/*!
 * # Access control contract
 *
 * Identity is issued elsewhere. Callers arrive here already authenticated as a
 * user id plus a role, and this module decides whether that caller may touch
 * a given package. External systems that grant points or redeem coupons
 * present a shared API key instead.
 */

use crate::entities::TourPackageModel;
use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Customer,
    TourPackageVendor,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "Customer",
            Role::TourPackageVendor => "TourPackageVendor",
            Role::Superadmin => "Superadmin",
        }
    }

    /// Vendors and superadmins may act on any customer's packages.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::TourPackageVendor | Role::Superadmin)
    }
}

/// The authenticated principal behind a mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn customer(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn superadmin(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Superadmin)
    }

    pub fn owns(&self, package: &TourPackageModel) -> bool {
        self.user_id == package.user_id
    }
}

/// Rejects the call unless `caller` owns `package` or holds an elevated role.
pub fn authorize_package_access(
    caller: &Caller,
    package: &TourPackageModel,
) -> Result<(), ServiceError> {
    if caller.role.is_elevated() || caller.owns(package) {
        return Ok(());
    }

    warn!(
        user_id = %caller.user_id,
        role = caller.role.as_str(),
        package_id = %package.id,
        "Caller denied access to package"
    );
    Err(ServiceError::Forbidden(format!(
        "User {} may not modify package {}",
        caller.user_id, package.id
    )))
}

/// Checks the key an external system presented against the configured one.
pub fn verify_api_key(expected: &str, presented: Option<&str>) -> Result<(), ServiceError> {
    match presented {
        Some(key) if !key.is_empty() && constant_time_eq(expected, key) => Ok(()),
        Some(_) => {
            warn!("Rejected loyalty request with mismatched API key");
            Err(ServiceError::Unauthorized("Invalid API key".to_string()))
        }
        None => Err(ServiceError::Unauthorized("Missing API key".to_string())),
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
