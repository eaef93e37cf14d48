//! Canonical default limits and thresholds shared across the engine.

/// Maximum single donation amount (in rupees) the engine will process.
pub const MAX_DONATION_AMOUNT: f64 = 50_000.0;

/// Donations at or above this amount always require confirmation.
pub const ALWAYS_CONFIRM_ABOVE: f64 = 1_000.0;

/// Maximum number of beneficiaries one donation can be split across.
pub const MAX_ALLOCATION_COUNT: usize = 10;

/// Urgency score at or above which a medical case counts as an emergency.
pub const EMERGENCY_URGENCY_THRESHOLD: f64 = 0.7;

/// Education donation: max beneficiaries shown in an allocation plan.
pub const EDUCATION_MAX_RESULTS: usize = 5;

/// Orphanage supply: max orphanages shown per request.
pub const SUPPLY_MAX_ORPHANAGES: usize = 3;

/// Child sponsorship: minimum monthly amount in rupees.
pub const SPONSORSHIP_MIN_AMOUNT: f64 = 500.0;

/// Seconds before a pending proposal expires.
pub const SESSION_TTL_SECS: u64 = 3600;

/// Seconds to wait for a platform backend response.
pub const BACKEND_TIMEOUT_SECS: u64 = 10;

/// Default platform backend base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000/api";
