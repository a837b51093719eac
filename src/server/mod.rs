pub mod response;
mod router;
mod scenarios;
mod trackers;
mod user;

pub use router::{AppState, cors_layer, create_router};
pub use scenarios::scenario_router;
pub use trackers::tracker_router;
pub use user::user_router;
