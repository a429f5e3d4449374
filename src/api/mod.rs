pub mod attendance;
pub mod faculty;
pub mod location;
