use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_customers_table::Migration),
            Box::new(m20250301_000002_create_bookings_table::Migration),
            Box::new(m20250301_000003_create_payments_table::Migration),
            Box::new(m20250301_000004_create_rate_limits_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250301_000001_create_customers_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_customers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Customers::Email)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Customers::Name).string().not_null())
                        .col(ColumnDef::new(Customers::Phone).string().null())
                        .col(ColumnDef::new(Customers::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Customers::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Customers {
        Table,
        Email,
        Name,
        Phone,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000002_create_bookings_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_bookings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Bookings::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Bookings::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Bookings::PackageId).string().not_null())
                        .col(ColumnDef::new(Bookings::CustomerName).string().not_null())
                        .col(ColumnDef::new(Bookings::CustomerEmail).string().not_null())
                        .col(ColumnDef::new(Bookings::CustomerPhone).string().null())
                        .col(ColumnDef::new(Bookings::BookingDate).date().not_null())
                        .col(ColumnDef::new(Bookings::BookingTime).string().not_null())
                        .col(ColumnDef::new(Bookings::Status).string().not_null())
                        .col(
                            ColumnDef::new(Bookings::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Bookings::PeopleCount).integer().null())
                        .col(ColumnDef::new(Bookings::Notes).string().null())
                        .col(
                            ColumnDef::new(Bookings::Locale)
                                .string()
                                .not_null()
                                .default("en"),
                        )
                        .col(
                            ColumnDef::new(Bookings::AbandonedEmailSent)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Bookings::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Bookings::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            // Recovery sweep filters on status + flag + age
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_status_created_at")
                        .table(Bookings::Table)
                        .col(Bookings::Status)
                        .col(Bookings::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_customer_email")
                        .table(Bookings::Table)
                        .col(Bookings::CustomerEmail)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Bookings::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Bookings {
        Table,
        Id,
        PackageId,
        CustomerName,
        CustomerEmail,
        CustomerPhone,
        BookingDate,
        BookingTime,
        Status,
        TotalAmount,
        PeopleCount,
        Notes,
        Locale,
        AbandonedEmailSent,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000003_create_payments_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::BookingId).uuid().not_null())
                        .col(
                            ColumnDef::new(Payments::ProviderPaymentId)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::ConversationId).string().null())
                        .col(ColumnDef::new(Payments::Status).string().not_null())
                        .col(ColumnDef::new(Payments::Amount).decimal().not_null())
                        .col(ColumnDef::new(Payments::Currency).string().not_null())
                        .col(ColumnDef::new(Payments::Provider).string().not_null())
                        .col(ColumnDef::new(Payments::RawResponse).json().null())
                        .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_booking_id")
                        .table(Payments::Table)
                        .col(Payments::BookingId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Payments {
        Table,
        Id,
        BookingId,
        ProviderPaymentId,
        ConversationId,
        Status,
        Amount,
        Currency,
        Provider,
        RawResponse,
        CreatedAt,
    }
}

mod m20250301_000004_create_rate_limits_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000004_create_rate_limits_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RateLimits::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RateLimits::Identifier)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RateLimits::Count)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RateLimits::WindowStart)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RateLimits::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum RateLimits {
        Table,
        Identifier,
        Count,
        WindowStart,
    }
}
