pub mod attendance;
pub mod location;
pub mod role;
pub mod user;
