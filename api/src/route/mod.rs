use axum::Router;
use registry::AppRegistry;

pub mod health;
pub mod loan;
pub mod notification;
pub mod user;

pub fn routes() -> Router<AppRegistry> {
    Router::new()
        .merge(health::build_health_check_routers())
        .merge(loan::build_loan_routers())
        .merge(notification::build_notification_routers())
        .merge(user::build_user_routers())
}

#[cfg(test)]
mod tests;
