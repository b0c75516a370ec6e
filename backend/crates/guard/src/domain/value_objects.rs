//! Domain Value Objects

use std::fmt;

use serde::Serialize;

/// The independent rate limiters, one per endpoint family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimiterName {
    Global,
    Login,
    Register,
    Chat,
}

impl LimiterName {
    pub const ALL: [LimiterName; 4] = [
        LimiterName::Global,
        LimiterName::Login,
        LimiterName::Register,
        LimiterName::Chat,
    ];

    pub const fn code(&self) -> &'static str {
        match self {
            LimiterName::Global => "global",
            LimiterName::Login => "login",
            LimiterName::Register => "register",
            LimiterName::Chat => "chat",
        }
    }

    /// Counter key for a client under this limiter. Prefixing keeps the
    /// limiters from sharing windows even when they share a store.
    pub fn key_for(&self, client_key: &str) -> String {
        format!("{}_{}", self.code(), client_key)
    }
}

impl fmt::Display for LimiterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOperator {
    Add,
    Sub,
    Mul,
}

impl MathOperator {
    pub const ALL: [MathOperator; 3] = [MathOperator::Add, MathOperator::Sub, MathOperator::Mul];

    pub const fn symbol(&self) -> char {
        match self {
            MathOperator::Add => '+',
            MathOperator::Sub => '-',
            MathOperator::Mul => '×',
        }
    }

    pub const fn apply(&self, lhs: i32, rhs: i32) -> i32 {
        match self {
            MathOperator::Add => lhs + rhs,
            MathOperator::Sub => lhs - rhs,
            MathOperator::Mul => lhs * rhs,
        }
    }
}

/// Who is trying to register: network address plus optional device
/// fingerprint. A blank fingerprint counts as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSubject {
    ip: String,
    device_id: Option<String>,
}

impl RegistrationSubject {
    pub fn new(ip: impl Into<String>, device_id: Option<impl Into<String>>) -> Self {
        let device_id = device_id
            .map(Into::into)
            .filter(|device: &String| !device.trim().is_empty());
        Self {
            ip: ip.into(),
            device_id,
        }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }
}

/// Which registration ceiling was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationLimit {
    Ip,
    Device,
}

impl RegistrationLimit {
    pub const fn code(&self) -> &'static str {
        match self {
            RegistrationLimit::Ip => "ip",
            RegistrationLimit::Device => "device",
        }
    }

    pub const fn message(&self) -> &'static str {
        match self {
            RegistrationLimit::Ip => "Too many registrations from this network, try again later",
            RegistrationLimit::Device => {
                "Too many registrations from this device, try again later"
            }
        }
    }
}

impl fmt::Display for RegistrationLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// What happens to a challenge after a wrong answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptchaPolicy {
    /// Invalidate the challenge on the first wrong answer
    pub burn_on_mismatch: bool,
    /// Wrong answers tolerated before the challenge is invalidated
    pub max_attempts: u32,
}

impl Default for CaptchaPolicy {
    fn default() -> Self {
        Self {
            burn_on_mismatch: false,
            max_attempts: 5,
        }
    }
}
