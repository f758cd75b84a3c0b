use axum::{routing::put, Router};
use registry::AppRegistry;

use crate::handler::user::register_push_token;

pub fn build_user_routers() -> Router<AppRegistry> {
    let routers = Router::new().route("/me/push-token", put(register_push_token));

    Router::new().nest("/users", routers)
}
