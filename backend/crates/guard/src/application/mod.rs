//! Application Layer - Use Cases

pub mod config;
pub mod guard;
pub mod issue_captcha;
pub mod rate_limit;
pub mod registration;
pub mod sweeper;
pub mod verify_captcha;

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
