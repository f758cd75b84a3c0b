pub mod book;
pub mod loan;
pub mod notification;
pub mod push_token;
pub mod user;
