use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroizing;

/// Application-level constants
pub const APP_NAME: &str = "MedReport";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medreport=info,medreport_lib=info,tower_http=info"
}

/// Get the application data directory
/// (platform data dir, e.g. ~/.local/share/MedReport on Linux)
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// A credential read from the environment. Zeroed on drop, redacted in `Debug`.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: String) -> Self {
        Self(Zeroizing::new(value))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(****)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Which LLM backend produces the analysis text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub gemini_api_key: Option<Secret>,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub ollama_send_image: bool,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub fallback_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<Secret>,
}

impl SmtpConfig {
    /// SMTP delivery needs both credentials; otherwise mail is only logged.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Runtime configuration, sourced from the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub public_url: String,
    pub llm: LlmConfig,
    pub smtp: SmtpConfig,
    pub require_email_verification: bool,
    pub session_idle: Duration,
    pub max_upload_bytes: usize,
    pub pdf_qr_code: bool,
    /// Extra TrueType font tried first for PDF text Helvetica cannot encode.
    pub pdf_font_path: Option<PathBuf>,
    pub password_hash_rounds: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match get("LLM_PROVIDER").as_deref().map(str::to_ascii_lowercase) {
            None => ProviderKind::Gemini,
            Some(v) if v == "gemini" => ProviderKind::Gemini,
            Some(v) if v == "ollama" => ProviderKind::Ollama,
            Some(v) => {
                return Err(ConfigError::Invalid {
                    key: "LLM_PROVIDER",
                    value: v,
                })
            }
        };

        let llm = LlmConfig {
            provider,
            gemini_api_key: get("GEMINI_API_KEY").map(Secret::new),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".into()),
            gemini_endpoint: get("GEMINI_ENDPOINT")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into()),
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| "http://localhost:11434".into()),
            ollama_model: get("OLLAMA_MODEL").unwrap_or_else(|| "llava".into()),
            ollama_send_image: parse_bool(get("OLLAMA_SEND_IMAGE"), "OLLAMA_SEND_IMAGE", true)?,
            timeout_secs: parse_num(get("LLM_TIMEOUT_SECS"), "LLM_TIMEOUT_SECS", 120)?,
            max_attempts: parse_num(get("LLM_MAX_ATTEMPTS"), "LLM_MAX_ATTEMPTS", 3u32)?.max(1),
            retry_base_delay: Duration::from_millis(parse_num(
                get("LLM_RETRY_BASE_MS"),
                "LLM_RETRY_BASE_MS",
                1000,
            )?),
            fallback_enabled: parse_bool(get("LLM_FALLBACK"), "LLM_FALLBACK", true)?,
        };

        let smtp = SmtpConfig {
            server: get("SMTP_SERVER").unwrap_or_else(|| "smtp.gmail.com".into()),
            port: parse_num(get("SMTP_PORT"), "SMTP_PORT", 587)?,
            username: get("EMAIL_USER"),
            password: get("EMAIL_PASSWORD").map(Secret::new),
        };

        let bind_raw = get("MEDREPORT_BIND").unwrap_or_else(|| "127.0.0.1:8000".into());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "MEDREPORT_BIND",
            value: bind_raw.clone(),
        })?;

        Ok(Self {
            bind_addr,
            data_dir: get("MEDREPORT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(app_data_dir),
            public_url: get("MEDREPORT_PUBLIC_URL")
                .unwrap_or_else(|| "http://localhost:8000".into())
                .trim_end_matches('/')
                .to_string(),
            llm,
            smtp,
            require_email_verification: parse_bool(
                get("REQUIRE_EMAIL_VERIFICATION"),
                "REQUIRE_EMAIL_VERIFICATION",
                true,
            )?,
            session_idle: Duration::from_secs(parse_num(
                get("SESSION_IDLE_SECS"),
                "SESSION_IDLE_SECS",
                1800,
            )?),
            max_upload_bytes: parse_num(get("MAX_UPLOAD_BYTES"), "MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            pdf_qr_code: parse_bool(get("PDF_QR_CODE"), "PDF_QR_CODE", true)?,
            pdf_font_path: get("PDF_FONT_PATH").map(PathBuf::from),
            password_hash_rounds: parse_num(
                get("PASSWORD_HASH_ROUNDS"),
                "PASSWORD_HASH_ROUNDS",
                crate::crypto::DEFAULT_PBKDF2_ROUNDS,
            )?,
        })
    }

    /// SQLite database file inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("medreport.db")
    }
}

fn parse_num<T: std::str::FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

fn parse_bool(raw: Option<String>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::Invalid { key, value: v }),
    }
}

/// Mask a secret for logging: first and last four characters only.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".into();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("MedReport"));
    }

    #[test]
    fn defaults_when_environment_empty() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:8000");
        assert_eq!(cfg.llm.provider, ProviderKind::Gemini);
        assert_eq!(cfg.llm.gemini_model, "gemini-1.5-flash");
        assert_eq!(cfg.llm.max_attempts, 3);
        assert_eq!(cfg.llm.retry_base_delay, Duration::from_secs(1));
        assert!(cfg.llm.fallback_enabled);
        assert!(cfg.llm.gemini_api_key.is_none());
        assert_eq!(cfg.smtp.port, 587);
        assert!(!cfg.smtp.has_credentials());
        assert!(cfg.require_email_verification);
        assert_eq!(cfg.max_upload_bytes, 20 * 1024 * 1024);
        assert!(cfg.pdf_font_path.is_none());
    }

    #[test]
    fn ollama_provider_selected() {
        let cfg = config_from(&[("LLM_PROVIDER", "Ollama"), ("OLLAMA_MODEL", "medllama2")]).unwrap();
        assert_eq!(cfg.llm.provider, ProviderKind::Ollama);
        assert_eq!(cfg.llm.ollama_model, "medllama2");
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = config_from(&[("LLM_PROVIDER", "openai")]).unwrap_err();
        assert!(err.to_string().contains("LLM_PROVIDER"));
    }

    #[test]
    fn invalid_number_rejected() {
        assert!(config_from(&[("SMTP_PORT", "smtp")]).is_err());
        assert!(config_from(&[("REQUIRE_EMAIL_VERIFICATION", "maybe")]).is_err());
    }

    #[test]
    fn max_attempts_never_zero() {
        let cfg = config_from(&[("LLM_MAX_ATTEMPTS", "0")]).unwrap();
        assert_eq!(cfg.llm.max_attempts, 1);
    }

    #[test]
    fn public_url_trailing_slash_trimmed() {
        let cfg = config_from(&[("MEDREPORT_PUBLIC_URL", "https://reports.example.org/")]).unwrap();
        assert_eq!(cfg.public_url, "https://reports.example.org");
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config_from(&[("GEMINI_API_KEY", "  "), ("SMTP_SERVER", "")]).unwrap();
        assert!(cfg.llm.gemini_api_key.is_none());
        assert_eq!(cfg.smtp.server, "smtp.gmail.com");
    }

    #[test]
    fn secrets_redacted_in_debug_output() {
        let cfg = config_from(&[("GEMINI_API_KEY", "AIzaSyExampleKey1234"), ("EMAIL_PASSWORD", "hunter22")]).unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("AIzaSyExampleKey1234"));
        assert!(!debug.contains("hunter22"));
        assert_eq!(cfg.llm.gemini_api_key.as_ref().unwrap().expose(), "AIzaSyExampleKey1234");
    }

    #[test]
    fn mask_secret_hides_middle() {
        assert_eq!(mask_secret("AIzaSyExampleKey1234"), "AIza…1234");
        assert_eq!(mask_secret("short"), "****");
    }

    #[test]
    fn database_path_inside_data_dir() {
        let cfg = config_from(&[("MEDREPORT_DATA_DIR", "/tmp/medreport-test")]).unwrap();
        assert_eq!(cfg.database_path(), PathBuf::from("/tmp/medreport-test/medreport.db"));
    }
}
