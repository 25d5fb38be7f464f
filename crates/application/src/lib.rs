//! Application services and ports.

#![forbid(unsafe_code)]

mod throttle_service;

pub use throttle_service::{
    Clock, DEFAULT_ATTEMPT_LIMIT, DEFAULT_SUSPENSION_MINUTES, ThrottleGuard, ThrottlePolicy,
    ThrottleRepository, ThrottleService,
};
