pub mod health;
pub mod loan;
pub mod notification;
pub mod user;
