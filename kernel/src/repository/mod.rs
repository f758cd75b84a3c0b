pub mod book;
pub mod health;
pub mod loan;
pub mod notification;
pub mod push_token;
pub mod user;
