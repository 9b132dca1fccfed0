use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> usize {
    30 * 1024 * 1024
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".into()]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            organization: None,
            timeout_secs: default_model_timeout(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_model_timeout() -> u64 {
    90
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Upper bound on inference rounds for one QnA request.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_agent_temperature")]
    pub temperature: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            temperature: default_agent_temperature(),
        }
    }
}

fn default_max_rounds() -> usize {
    8
}

fn default_agent_temperature() -> f32 {
    0.2
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupConfig {
    /// data.go.kr service key shared by every provider.
    #[serde(default)]
    pub service_key: Option<String>,
    #[serde(default = "default_lookup_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_drug_info_url")]
    pub drug_info_url: String,
    #[serde(default = "default_drug_info_rows")]
    pub drug_info_rows: usize,
    #[serde(default = "default_dur_url")]
    pub dur_url: String,
    #[serde(default = "default_dur_rows")]
    pub dur_rows: usize,
    #[serde(default = "default_dur_max_records")]
    pub dur_max_records: usize,
    #[serde(default = "default_ingredient_url")]
    pub ingredient_url: String,
    #[serde(default = "default_ingredient_rows")]
    pub ingredient_rows: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            service_key: None,
            timeout_secs: default_lookup_timeout(),
            drug_info_url: default_drug_info_url(),
            drug_info_rows: default_drug_info_rows(),
            dur_url: default_dur_url(),
            dur_rows: default_dur_rows(),
            dur_max_records: default_dur_max_records(),
            ingredient_url: default_ingredient_url(),
            ingredient_rows: default_ingredient_rows(),
        }
    }
}

fn default_lookup_timeout() -> u64 {
    10
}

fn default_drug_info_url() -> String {
    "http://apis.data.go.kr/1471000/DrbEasyDrugInfoService/getDrbEasyDrugList".into()
}

fn default_drug_info_rows() -> usize {
    3
}

fn default_dur_url() -> String {
    "http://apis.data.go.kr/1471000/DURIrdntInfoService03/getUsjntTabooInfoList02".into()
}

fn default_dur_rows() -> usize {
    50
}

fn default_dur_max_records() -> usize {
    30
}

fn default_ingredient_url() -> String {
    "http://apis.data.go.kr/B551182/msupCmpnMeftInfoService/getMajorCmpnNmCdList".into()
}

fn default_ingredient_rows() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionConfig {
    #[serde(default = "default_extractor_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_extractor_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_extractor_endpoint(),
            timeout_secs: default_extractor_timeout(),
        }
    }
}

fn default_extractor_endpoint() -> String {
    "http://127.0.0.1:8090/extract".into()
}

fn default_extractor_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaqConfig {
    #[serde(default)]
    pub corpus_path: Option<String>,
    #[serde(default = "default_faq_top_k")]
    pub top_k: usize,
    #[serde(default = "default_faq_temperature")]
    pub temperature: f32,
}

impl Default for FaqConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            top_k: default_faq_top_k(),
            temperature: default_faq_temperature(),
        }
    }
}

fn default_faq_top_k() -> usize {
    3
}

fn default_faq_temperature() -> f32 {
    0.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuardrailConfig {
    /// Site-specific risk keywords scanned on top of the built-in list.
    #[serde(default)]
    pub extra_risk_keywords: Vec<String>,
    #[serde(default = "default_reformat")]
    pub reformat: bool,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            extra_risk_keywords: Vec::new(),
            reformat: default_reformat(),
        }
    }
}

fn default_reformat() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub faq: FaqConfig,
    #[serde(default)]
    pub guardrails: GuardrailConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&raw)
            .map_err(|err| GatewayError::Config(format!("Failed to parse configuration: {err}")))?;
        Ok(cfg)
    }

    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// Defaults plus environment overrides, for deployments without a file.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    fn apply_env(&mut self) {
        if let Ok(host) = env::var("YEAHYAK_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("YEAHYAK_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                self.server.port = parsed;
            }
        }
        if let Ok(limit) = env::var("YEAHYAK_MAX_UPLOAD_BYTES") {
            if let Ok(parsed) = limit.parse::<usize>() {
                self.server.max_upload_bytes = parsed;
            }
        }
        if let Ok(origins) = env::var("YEAHYAK_ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Ok(key) = env::var("YEAHYAK_OPENAI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Ok(endpoint) = env::var("YEAHYAK_OPENAI_ENDPOINT") {
            self.model.base_url = Some(endpoint);
        }
        if let Ok(org) = env::var("YEAHYAK_OPENAI_ORG") {
            self.model.organization = Some(org);
        }
        if let Ok(model) = env::var("YEAHYAK_MODEL") {
            self.model.model = model;
        }
        if let Ok(rounds) = env::var("YEAHYAK_MAX_ROUNDS") {
            if let Ok(parsed) = rounds.parse::<usize>() {
                self.agent.max_rounds = parsed.max(1);
            }
        }
        if let Ok(key) = env::var("DRUG_API_KEY") {
            self.lookup.service_key = Some(key);
        }
        if let Ok(endpoint) = env::var("YEAHYAK_EXTRACTOR_ENDPOINT") {
            self.extraction.endpoint = endpoint;
        }
        if let Ok(path) = env::var("YEAHYAK_FAQ_CORPUS") {
            self.faq.corpus_path = Some(path);
        }
        if let Ok(keywords) = env::var("YEAHYAK_EXTRA_RISK_KEYWORDS") {
            self.guardrails.extra_risk_keywords = keywords
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_and_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nhost='127.0.0.1'\nport=9000\n[model]\nmodel='gpt-4o-mini'\n[agent]\nmax_rounds=4"
        )
        .unwrap();

        env::set_var("YEAHYAK_PORT", "9100");
        let cfg = AppConfig::from_env_or_file(file.path()).unwrap();
        env::remove_var("YEAHYAK_PORT");

        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.model.model, "gpt-4o-mini");
        assert_eq!(cfg.agent.max_rounds, 4);
        assert_eq!(cfg.lookup.dur_rows, 50);
        assert_eq!(cfg.server.max_upload_bytes, 30 * 1024 * 1024);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let file = NamedTempFile::new().unwrap();
        let cfg = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.agent.max_rounds, 8);
    }

    #[test]
    fn guardrail_section_is_optional() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[guardrails]\nextra_risk_keywords=['이소트레티노인', 'Clozapine']\nreformat=false"
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(
            cfg.guardrails.extra_risk_keywords,
            vec!["이소트레티노인".to_string(), "Clozapine".to_string()]
        );
        assert!(!cfg.guardrails.reformat);
        assert!(GuardrailConfig::default().reformat);
    }

    #[test]
    fn rejects_malformed_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport=").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(GatewayError::Config(_))
        ));
    }
}
