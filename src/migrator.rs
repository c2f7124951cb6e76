use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_activities_table::Migration),
            Box::new(m20240301_000002_create_tour_packages_table::Migration),
            Box::new(m20240301_000003_create_plans_table::Migration),
            Box::new(m20240301_000004_create_ordered_quantities_table::Migration),
            Box::new(m20240315_000005_create_loyalty_tables::Migration),
        ]
    }
}

// Migration implementations. Parent/child links are plain indexed columns:
// cascades are carried out by the services inside their own transactions.

mod m20240301_000001_create_activities_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_activities_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Activities::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Activities::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Activities::Name).string().not_null())
                        .col(ColumnDef::new(Activities::ActivityType).string_len(32).not_null())
                        .col(ColumnDef::new(Activities::Item).string().not_null())
                        .col(ColumnDef::new(Activities::Capacity).integer().not_null())
                        .col(ColumnDef::new(Activities::Price).big_integer().not_null())
                        .col(
                            ColumnDef::new(Activities::StartDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Activities::EndDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Activities::StartLocation).string().not_null())
                        .col(ColumnDef::new(Activities::EndLocation).string().not_null())
                        .col(
                            ColumnDef::new(Activities::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Activities::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_activities_activity_type")
                        .table(Activities::Table)
                        .col(Activities::ActivityType)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Activities::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Activities {
        Table,
        Id,
        Name,
        ActivityType,
        Item,
        Capacity,
        Price,
        StartDate,
        EndDate,
        StartLocation,
        EndLocation,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_tour_packages_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_tour_packages_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(TourPackages::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(TourPackages::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(TourPackages::UserId).string().not_null())
                        .col(ColumnDef::new(TourPackages::Name).string().not_null())
                        .col(ColumnDef::new(TourPackages::Quota).integer().not_null())
                        .col(
                            ColumnDef::new(TourPackages::Price)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(TourPackages::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(TourPackages::StartDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TourPackages::EndDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TourPackages::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TourPackages::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_tour_packages_user_id")
                        .table(TourPackages::Table)
                        .col(TourPackages::UserId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TourPackages::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum TourPackages {
        Table,
        Id,
        UserId,
        Name,
        Quota,
        Price,
        Status,
        StartDate,
        EndDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_plans_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_plans_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Plans::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Plans::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Plans::PackageId).uuid().not_null())
                        .col(ColumnDef::new(Plans::ActivityType).string_len(32).not_null())
                        .col(ColumnDef::new(Plans::Price).big_integer().not_null().default(0))
                        .col(ColumnDef::new(Plans::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Plans::StartDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Plans::EndDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Plans::StartLocation).string().not_null())
                        .col(ColumnDef::new(Plans::EndLocation).string().not_null())
                        .col(
                            ColumnDef::new(Plans::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Plans::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_plans_package_id")
                        .table(Plans::Table)
                        .col(Plans::PackageId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Plans::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Plans {
        Table,
        Id,
        PackageId,
        ActivityType,
        Price,
        Status,
        StartDate,
        EndDate,
        StartLocation,
        EndLocation,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_ordered_quantities_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_ordered_quantities_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderedQuantities::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderedQuantities::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderedQuantities::PlanId).uuid().not_null())
                        .col(ColumnDef::new(OrderedQuantities::ActivityId).uuid().not_null())
                        .col(
                            ColumnDef::new(OrderedQuantities::OrderedQuota)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderedQuantities::Quota).integer().not_null())
                        .col(ColumnDef::new(OrderedQuantities::Price).big_integer().not_null())
                        .col(ColumnDef::new(OrderedQuantities::ActivityName).string().not_null())
                        .col(ColumnDef::new(OrderedQuantities::ActivityItem).string().not_null())
                        .col(
                            ColumnDef::new(OrderedQuantities::StartDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderedQuantities::EndDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderedQuantities::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderedQuantities::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One line item per activity per plan
            manager
                .create_index(
                    Index::create()
                        .name("idx_ordered_quantities_plan_activity")
                        .table(OrderedQuantities::Table)
                        .col(OrderedQuantities::PlanId)
                        .col(OrderedQuantities::ActivityId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_ordered_quantities_activity_id")
                        .table(OrderedQuantities::Table)
                        .col(OrderedQuantities::ActivityId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderedQuantities::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OrderedQuantities {
        Table,
        Id,
        PlanId,
        ActivityId,
        OrderedQuota,
        Quota,
        Price,
        ActivityName,
        ActivityItem,
        StartDate,
        EndDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240315_000005_create_loyalty_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240315_000005_create_loyalty_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LoyaltyPoints::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LoyaltyPoints::CustomerId)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LoyaltyPoints::Points)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(LoyaltyCoupons::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(LoyaltyCoupons::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(LoyaltyCoupons::Name).string().not_null())
                        .col(ColumnDef::new(LoyaltyCoupons::Description).text().null())
                        .col(ColumnDef::new(LoyaltyCoupons::Points).big_integer().not_null())
                        .col(ColumnDef::new(LoyaltyCoupons::PercentOff).integer().not_null())
                        .col(
                            ColumnDef::new(LoyaltyCoupons::CreatedDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LoyaltyCoupons::UpdatedDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchasedCoupons::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchasedCoupons::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchasedCoupons::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PurchasedCoupons::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(PurchasedCoupons::CouponId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchasedCoupons::PurchasedDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchasedCoupons::UsedDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_purchased_coupons_customer_id")
                        .table(PurchasedCoupons::Table)
                        .col(PurchasedCoupons::CustomerId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchasedCoupons::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(LoyaltyCoupons::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(LoyaltyPoints::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum LoyaltyPoints {
        Table,
        CustomerId,
        Points,
    }

    #[derive(DeriveIden)]
    enum LoyaltyCoupons {
        Table,
        Id,
        Name,
        Description,
        Points,
        PercentOff,
        CreatedDate,
        UpdatedDate,
    }

    #[derive(DeriveIden)]
    enum PurchasedCoupons {
        Table,
        Id,
        Code,
        CustomerId,
        CouponId,
        PurchasedDate,
        UsedDate,
    }
}
