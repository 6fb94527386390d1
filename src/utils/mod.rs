pub mod logger;
pub mod throttle;
pub mod value;
