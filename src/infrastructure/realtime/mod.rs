pub mod hub;
pub mod rate_limiter;
pub mod room_state;

pub use hub::Hub;
pub use rate_limiter::RateLimiterRegistry;
