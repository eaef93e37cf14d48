//! Engine configuration, read once at startup from `HOPELINK_*` variables.
//!
//! Every limit has a safe default from `hopelink_protocol::defaults`, so an
//! empty environment yields a working (keyword-only, localhost-backend)
//! configuration. `validate()` reports what would break before anything runs.

use std::time::Duration;

use hopelink_protocol::defaults;

const DEFAULT_BACKEND_SECRET: &str = "dev-secret-change-in-production";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-20241022";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Which classifier implementation the operator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierProvider {
    Anthropic,
    OpenAi,
    /// Keyword matching only; no API key required.
    Keyword,
}

impl ClassifierProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierProvider::Anthropic => "anthropic",
            ClassifierProvider::OpenAi => "openai",
            ClassifierProvider::Keyword => "keyword",
        }
    }
}

/// Hard limits that protect against accidental large donations.
#[derive(Debug, Clone)]
pub struct SafetyLimits {
    /// Maximum single donation amount in rupees.
    pub max_donation_amount: f64,
    /// Amounts at or above this always require confirmation.
    pub always_confirm_above: f64,
    /// Maximum recipients a single donation can be split across.
    pub max_allocation_count: usize,
}

/// Platform backend connection settings.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    /// Shared secret sent as `x-ai-secret`; the backend rejects requests
    /// without it.
    pub secret: String,
    pub timeout: Duration,
}

/// Classifier selection and LLM settings.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub provider: ClassifierProvider,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub max_tokens: u32,
}

/// Per-workflow tuning knobs.
#[derive(Debug, Clone)]
pub struct WorkflowTuning {
    /// Education: max beneficiaries in one allocation plan.
    pub education_max_results: usize,
    /// Medical: urgency score at or above which a case is an emergency.
    pub emergency_urgency_threshold: f64,
    /// Supply: max orphanages shown per request.
    pub supply_max_orphanages: usize,
    /// Sponsorship: minimum monthly amount in rupees.
    pub sponsorship_min_amount: f64,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub safety: SafetyLimits,
    pub backend: BackendConfig,
    pub classifier: ClassifierConfig,
    pub workflows: WorkflowTuning,
    pub session_ttl: Duration,
}

/// Startup validation report, printed by `hopelink config`.
#[derive(Debug, Clone)]
pub struct ConfigReport {
    /// Critical problems that will break requests.
    pub issues: Vec<String>,
    /// Non-critical but worth knowing.
    pub warnings: Vec<String>,
}

impl ConfigReport {
    pub fn ready(&self) -> bool {
        self.issues.is_empty()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            safety: SafetyLimits {
                max_donation_amount: defaults::MAX_DONATION_AMOUNT,
                always_confirm_above: defaults::ALWAYS_CONFIRM_ABOVE,
                max_allocation_count: defaults::MAX_ALLOCATION_COUNT,
            },
            backend: BackendConfig {
                base_url: defaults::DEFAULT_BACKEND_URL.to_string(),
                secret: DEFAULT_BACKEND_SECRET.to_string(),
                timeout: Duration::from_secs(defaults::BACKEND_TIMEOUT_SECS),
            },
            classifier: ClassifierConfig {
                provider: ClassifierProvider::Keyword,
                anthropic_api_key: String::new(),
                anthropic_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
                openai_api_key: String::new(),
                openai_model: DEFAULT_OPENAI_MODEL.to_string(),
                max_tokens: 500,
            },
            workflows: WorkflowTuning {
                education_max_results: defaults::EDUCATION_MAX_RESULTS,
                emergency_urgency_threshold: defaults::EMERGENCY_URGENCY_THRESHOLD,
                supply_max_orphanages: defaults::SUPPLY_MAX_ORPHANAGES,
                sponsorship_min_amount: defaults::SPONSORSHIP_MIN_AMOUNT,
            },
            session_ttl: Duration::from_secs(defaults::SESSION_TTL_SECS),
        }
    }
}

impl EngineConfig {
    /// Read configuration from the environment, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_f64("HOPELINK_MAX_DONATION_AMOUNT") {
            config.safety.max_donation_amount = v;
        }
        if let Some(v) = env_f64("HOPELINK_ALWAYS_CONFIRM_ABOVE") {
            config.safety.always_confirm_above = v;
        }
        if let Some(v) = env_usize("HOPELINK_MAX_ALLOCATION_COUNT") {
            config.safety.max_allocation_count = v;
        }

        if let Ok(v) = std::env::var("HOPELINK_BACKEND_URL") {
            config.backend.base_url = v;
        }
        if let Ok(v) = std::env::var("HOPELINK_BACKEND_SECRET") {
            config.backend.secret = v;
        }
        if let Some(v) = env_u64("HOPELINK_BACKEND_TIMEOUT_SECS") {
            config.backend.timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("HOPELINK_SESSION_TTL_SECS") {
            config.session_ttl = Duration::from_secs(v);
        }

        if let Ok(v) = std::env::var("ANTHROPIC_API_KEY") {
            config.classifier.anthropic_api_key = v;
        }
        if let Ok(v) = std::env::var("OPENAI_API_KEY") {
            config.classifier.openai_api_key = v;
        }
        if let Ok(v) = std::env::var("HOPELINK_ANTHROPIC_MODEL") {
            config.classifier.anthropic_model = v;
        }
        if let Ok(v) = std::env::var("HOPELINK_OPENAI_MODEL") {
            config.classifier.openai_model = v;
        }
        if let Some(v) = env_u64("HOPELINK_LLM_MAX_TOKENS") {
            config.classifier.max_tokens = v as u32;
        }
        config.classifier.provider = match std::env::var("HOPELINK_LLM_PROVIDER").as_deref() {
            Ok("anthropic") => ClassifierProvider::Anthropic,
            Ok("openai") => ClassifierProvider::OpenAi,
            Ok("keyword") => ClassifierProvider::Keyword,
            // Unset: pick based on whichever key is present.
            _ if !config.classifier.anthropic_api_key.is_empty() => ClassifierProvider::Anthropic,
            _ if !config.classifier.openai_api_key.is_empty() => ClassifierProvider::OpenAi,
            _ => ClassifierProvider::Keyword,
        };

        if let Some(v) = env_usize("HOPELINK_EDUCATION_MAX_RESULTS") {
            config.workflows.education_max_results = v;
        }
        if let Some(v) = env_f64("HOPELINK_EMERGENCY_URGENCY_THRESHOLD") {
            config.workflows.emergency_urgency_threshold = v;
        }
        if let Some(v) = env_usize("HOPELINK_SUPPLY_MAX_ORPHANAGES") {
            config.workflows.supply_max_orphanages = v;
        }
        if let Some(v) = env_f64("HOPELINK_SPONSORSHIP_MIN_AMOUNT") {
            config.workflows.sponsorship_min_amount = v;
        }

        config
    }

    /// The model name the active provider would use.
    pub fn active_model(&self) -> &str {
        match self.classifier.provider {
            ClassifierProvider::Anthropic => &self.classifier.anthropic_model,
            ClassifierProvider::OpenAi => &self.classifier.openai_model,
            ClassifierProvider::Keyword => "keyword-fallback",
        }
    }

    /// Check the configuration and report problems without running anything.
    pub fn validate(&self) -> ConfigReport {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        match self.classifier.provider {
            ClassifierProvider::Anthropic if self.classifier.anthropic_api_key.is_empty() => {
                issues.push(
                    "classifier provider is 'anthropic' but ANTHROPIC_API_KEY is missing".into(),
                );
            }
            ClassifierProvider::OpenAi if self.classifier.openai_api_key.is_empty() => {
                issues.push("classifier provider is 'openai' but OPENAI_API_KEY is missing".into());
            }
            ClassifierProvider::Keyword => {
                warnings.push("using keyword classifier only; no LLM configured".into());
            }
            _ => {}
        }

        if self.backend.secret == DEFAULT_BACKEND_SECRET {
            warnings.push("using default backend secret; change before production".into());
        }
        if self.safety.max_donation_amount > 100_000.0 {
            warnings.push(format!(
                "max donation amount is ₹{:.0}; verify this is intentional",
                self.safety.max_donation_amount
            ));
        }
        if self.safety.always_confirm_above > self.safety.max_donation_amount {
            issues.push(
                "always-confirm threshold exceeds the max donation amount; \
                 no donation would ever require confirmation"
                    .into(),
            );
        }
        if self.safety.max_allocation_count == 0 {
            issues.push("max allocation count is 0; the donation gate would refuse every plan".into());
        }
        if !(0.0..=1.0).contains(&self.workflows.emergency_urgency_threshold) {
            issues.push(format!(
                "emergency urgency threshold {} is outside [0, 1]",
                self.workflows.emergency_urgency_threshold
            ));
        }

        ConfigReport { issues, warnings }
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok()?.parse().ok()
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_ready() {
        let report = EngineConfig::default().validate();
        assert!(report.ready(), "issues: {:?}", report.issues);
        // Keyword-only classifier and dev secret are expected warnings.
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_anthropic_without_key_is_an_issue() {
        let mut config = EngineConfig::default();
        config.classifier.provider = ClassifierProvider::Anthropic;
        let report = config.validate();
        assert!(!report.ready());
    }

    #[test]
    fn test_inverted_thresholds_are_an_issue() {
        let mut config = EngineConfig::default();
        config.safety.always_confirm_above = config.safety.max_donation_amount + 1.0;
        assert!(!config.validate().ready());
    }

    #[test]
    fn test_threshold_out_of_range_is_an_issue() {
        let mut config = EngineConfig::default();
        config.workflows.emergency_urgency_threshold = 1.5;
        assert!(!config.validate().ready());
    }
}
