use crate::{
    entities::{
        ordered_quantity, plan, tour_package, ActivityType, OrderedQuantity, Plan, PlanStatus,
        TourPackage,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

const REPORTED_TYPES: [ActivityType; 3] = [
    ActivityType::Flight,
    ActivityType::Accommodation,
    ActivityType::Vehicle,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTypeRevenue {
    pub activity_type: String,
    pub revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub month: u32,
    pub revenue: i64,
}

/// One booked line: the package start, the plan type and the line total.
struct RevenueLine {
    package_start: DateTime<Utc>,
    activity_type: ActivityType,
    amount: i64,
}

/// Read-only revenue rollups over fulfilled bookings.
#[derive(Clone)]
pub struct StatisticsService {
    db: Arc<DatabaseConnection>,
}

impl StatisticsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Revenue per activity type for packages starting in `year` (and
    /// `month`, when given). Every type is present, zero when unbooked.
    #[instrument(skip(self))]
    pub async fn revenue_by_activity_type(
        &self,
        year: i32,
        month: Option<u32>,
    ) -> Result<Vec<ActivityTypeRevenue>, ServiceError> {
        let (from, until) = period(year, month)?;
        let lines = self.revenue_lines(from, until).await?;

        let mut totals: HashMap<ActivityType, i64> = HashMap::new();
        for line in lines {
            let total = totals.entry(line.activity_type).or_insert(0);
            *total = total.checked_add(line.amount).ok_or_else(revenue_overflow)?;
        }

        Ok(REPORTED_TYPES
            .iter()
            .map(|t| ActivityTypeRevenue {
                activity_type: t.display_name().to_string(),
                revenue: totals.get(t).copied().unwrap_or(0),
            })
            .collect())
    }

    /// Revenue per month of `year`, always twelve entries.
    #[instrument(skip(self))]
    pub async fn yearly_revenue(&self, year: i32) -> Result<Vec<MonthlyRevenue>, ServiceError> {
        let (from, until) = period(year, None)?;
        let lines = self.revenue_lines(from, until).await?;

        let mut months = [0i64; 12];
        for line in lines {
            let total = &mut months[line.package_start.month0() as usize];
            *total = total.checked_add(line.amount).ok_or_else(revenue_overflow)?;
        }

        Ok(months
            .iter()
            .enumerate()
            .map(|(i, revenue)| MonthlyRevenue {
                month: i as u32 + 1,
                revenue: *revenue,
            })
            .collect())
    }

    async fn revenue_lines(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RevenueLine>, ServiceError> {
        let packages = TourPackage::find()
            .filter(tour_package::Column::StartDate.gte(from))
            .filter(tour_package::Column::StartDate.lt(until))
            .all(&*self.db)
            .await?;
        if packages.is_empty() {
            return Ok(Vec::new());
        }
        let package_start: HashMap<Uuid, DateTime<Utc>> =
            packages.iter().map(|p| (p.id, p.start_date)).collect();

        let plans = Plan::find()
            .filter(plan::Column::PackageId.is_in(package_start.keys().copied().collect::<Vec<_>>()))
            .filter(plan::Column::Status.is_in(PlanStatus::REVENUE))
            .all(&*self.db)
            .await?;
        if plans.is_empty() {
            return Ok(Vec::new());
        }
        let plan_index: HashMap<Uuid, (ActivityType, DateTime<Utc>)> = plans
            .iter()
            .filter_map(|p| {
                package_start
                    .get(&p.package_id)
                    .map(|start| (p.id, (p.activity_type, *start)))
            })
            .collect();

        let line_items = OrderedQuantity::find()
            .filter(ordered_quantity::Column::PlanId.is_in(plan_index.keys().copied().collect::<Vec<_>>()))
            .all(&*self.db)
            .await?;

        line_items
            .iter()
            .filter_map(|item| {
                plan_index.get(&item.plan_id).map(|(activity_type, start)| -> Result<RevenueLine, ServiceError> {
                    let amount = item.total_price().ok_or_else(revenue_overflow)?;
                    Ok(RevenueLine {
                        package_start: *start,
                        activity_type: *activity_type,
                        amount,
                    })
                })
            })
            .collect()
    }
}

fn revenue_overflow() -> ServiceError {
    ServiceError::InvalidInput("Revenue total overflows".to_string())
}

/// Half-open `[from, until)` range covering the year, or one month of it.
fn period(year: i32, month: Option<u32>) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
    let ((y0, m0), (y1, m1)) = match month {
        Some(m) if !(1..=12).contains(&m) => {
            return Err(ServiceError::InvalidInput(format!(
                "Month must be between 1 and 12, got {}",
                m
            )))
        }
        Some(12) => ((year, 12), (year.saturating_add(1), 1)),
        Some(m) => ((year, m), (year, m + 1)),
        None => ((year, 1), (year.saturating_add(1), 1)),
    };

    let first_of = |y: i32, m: u32| Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0).single();
    match (first_of(y0, m0), first_of(y1, m1)) {
        (Some(from), Some(until)) => Ok((from, until)),
        _ => Err(ServiceError::InvalidInput(format!("Year {} is out of range", year))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn year_period_spans_twelve_months() {
        let (from, until) = period(2024, None).unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(until, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn december_rolls_into_next_year() {
        let (from, until) = period(2024, Some(12)).unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(until, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert_matches!(period(2024, Some(0)), Err(ServiceError::InvalidInput(_)));
        assert_matches!(period(2024, Some(13)), Err(ServiceError::InvalidInput(_)));
    }
}
