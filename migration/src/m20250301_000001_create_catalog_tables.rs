use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Users are owned by the auth subsystem; only the columns referenced here
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_uuid(Users::Id))
                    .col(string_null(Users::Email).unique_key())
                    .col(string_null(Users::FullName))
                    .col(
                        timestamp_with_time_zone(Users::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Courses::Table)
                    .if_not_exists()
                    .col(pk_uuid(Courses::Id))
                    .col(string(Courses::Title).not_null())
                    .col(big_integer_null(Courses::Price))
                    .col(boolean(Courses::IsPublished).default(false).not_null())
                    .col(
                        timestamp_with_time_zone(Courses::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(Courses::UpdatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_courses_is_published")
                    .table(Courses::Table)
                    .col(Courses::IsPublished)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Coupons::Table)
                    .if_not_exists()
                    .col(pk_uuid(Coupons::Id))
                    .col(string_len(Coupons::Code, 64).not_null().unique_key())
                    .col(integer(Coupons::DiscountPercent).not_null())
                    .col(timestamp_with_time_zone_null(Coupons::ExpiresAt))
                    .col(integer_null(Coupons::MaxUses))
                    .col(integer(Coupons::UsedCount).default(0).not_null())
                    .col(
                        timestamp_with_time_zone(Coupons::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .check(
                        Expr::col(Coupons::DiscountPercent)
                            .gte(0)
                            .and(Expr::col(Coupons::DiscountPercent).lte(100)),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Coupons::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Courses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Email,
    FullName,
    CreatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Courses {
    Table,
    Id,
    Title,
    Price,
    IsPublished,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Coupons {
    Table,
    Id,
    Code,
    DiscountPercent,
    ExpiresAt,
    MaxUses,
    UsedCount,
    CreatedAt,
}
