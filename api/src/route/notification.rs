use axum::{
    routing::{get, post},
    Router,
};
use registry::AppRegistry;

use crate::handler::notification::{
    acknowledge_notification, archive_notification, list_pending_notifications,
};

pub fn build_notification_routers() -> Router<AppRegistry> {
    let routers = Router::new()
        .route("/:id", get(list_pending_notifications))
        .route("/:id/acknowledge", post(acknowledge_notification))
        .route("/:id/archive", post(archive_notification));

    Router::new().nest("/notifications", routers)
}
