pub mod contests;
pub mod remind;
pub mod server;
