//! `SeaORM` entities for the course commerce schema

pub mod prelude;

pub mod coupons;
pub mod courses;
pub mod enrollments;
pub mod payments;
pub mod purchases;
pub mod sea_orm_active_enums;
pub mod users;
