use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250301_000001_create_catalog_tables::{Courses, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Statuses are plain strings so the schema stays portable across backends;
        // the entity crate maps them to closed enums.
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(pk_uuid(Payments::Id))
                    .col(uuid(Payments::UserId).not_null())
                    .col(uuid(Payments::CourseId).not_null())
                    .col(big_integer(Payments::Amount).not_null())
                    .col(big_integer(Payments::OriginalAmount).not_null())
                    .col(string_len_null(Payments::CouponCode, 64))
                    .col(string_len(Payments::Provider, 16).not_null())
                    .col(
                        string_len(Payments::Status, 16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        timestamp_with_time_zone(Payments::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(timestamp_with_time_zone_null(Payments::PaidAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_user_id")
                            .from(Payments::Table, Payments::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_course_id")
                            .from(Payments::Table, Payments::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_user_course")
                    .table(Payments::Table)
                    .col(Payments::UserId)
                    .col(Payments::CourseId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payments_status")
                    .table(Payments::Table)
                    .col(Payments::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Purchases::Table)
                    .if_not_exists()
                    .col(pk_uuid(Purchases::Id))
                    .col(uuid(Purchases::UserId).not_null())
                    .col(uuid(Purchases::CourseId).not_null())
                    .col(uuid(Purchases::PaymentId).not_null())
                    .col(
                        timestamp_with_time_zone(Purchases::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchases_user_id")
                            .from(Purchases::Table, Purchases::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchases_course_id")
                            .from(Purchases::Table, Purchases::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchases_payment_id")
                            .from(Purchases::Table, Purchases::PaymentId)
                            .to(Payments::Table, Payments::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // One purchase per (user, course): the storage-level guard against double entitlement
        manager
            .create_index(
                Index::create()
                    .name("idx_purchases_user_course")
                    .table(Purchases::Table)
                    .col(Purchases::UserId)
                    .col(Purchases::CourseId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // A payment settles into at most one purchase
        manager
            .create_index(
                Index::create()
                    .name("idx_purchases_payment_id")
                    .table(Purchases::Table)
                    .col(Purchases::PaymentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Enrollments::Table)
                    .if_not_exists()
                    .col(pk_uuid(Enrollments::Id))
                    .col(uuid(Enrollments::UserId).not_null())
                    .col(uuid(Enrollments::CourseId).not_null())
                    .col(
                        string_len(Enrollments::Status, 16)
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        timestamp_with_time_zone(Enrollments::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollments_user_id")
                            .from(Enrollments::Table, Enrollments::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollments_course_id")
                            .from(Enrollments::Table, Enrollments::CourseId)
                            .to(Courses::Table, Courses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_enrollments_user_course")
                    .table(Enrollments::Table)
                    .col(Enrollments::UserId)
                    .col(Enrollments::CourseId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Enrollments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Purchases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    UserId,
    CourseId,
    Amount,
    OriginalAmount,
    CouponCode,
    Provider,
    Status,
    CreatedAt,
    PaidAt,
}

#[derive(DeriveIden)]
enum Purchases {
    Table,
    Id,
    UserId,
    CourseId,
    PaymentId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Enrollments {
    Table,
    Id,
    UserId,
    CourseId,
    Status,
    CreatedAt,
}
