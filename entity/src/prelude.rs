pub use super::coupons::Entity as Coupons;
pub use super::courses::Entity as Courses;
pub use super::enrollments::Entity as Enrollments;
pub use super::payments::Entity as Payments;
pub use super::purchases::Entity as Purchases;
pub use super::users::Entity as Users;
