//! Drug-information lookup tools.
//!
//! The catalogue is closed and registered once at startup:
//! - `get_drug_general_info`: MFDS e약은요 product leaflet (JSON)
//! - `get_ingredient_contraindication_info`: MFDS DUR co-administration bans (JSON)
//! - `get_ingredient_general_info`: HIRA ingredient master data (XML)
//!
//! Every tool answers with text. Provider failures are reported to the model
//! as diagnostic text instead of failing the request.

pub mod drug_info;
pub mod dur;
pub mod ingredient;
pub mod normalize;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::config::LookupConfig;
use crate::error::{GatewayError, Result};
use crate::tool::ToolRegistry;

pub use drug_info::DrugGeneralInfoTool;
pub use dur::ContraindicationTool;
pub use ingredient::IngredientInfoTool;

/// Identifiers of the registered lookup tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupTool {
    DrugGeneralInfo,
    IngredientContraindication,
    IngredientGeneralInfo,
}

impl LookupTool {
    pub const ALL: [LookupTool; 3] = [
        LookupTool::DrugGeneralInfo,
        LookupTool::IngredientContraindication,
        LookupTool::IngredientGeneralInfo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LookupTool::DrugGeneralInfo => "get_drug_general_info",
            LookupTool::IngredientContraindication => "get_ingredient_contraindication_info",
            LookupTool::IngredientGeneralInfo => "get_ingredient_general_info",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared provider client
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP handle shared by all lookup tools. Carries the data.go.kr service key.
#[derive(Clone)]
pub struct LookupClient {
    http: reqwest::Client,
    service_key: Option<String>,
}

impl LookupClient {
    pub fn new(http: reqwest::Client, service_key: Option<String>) -> Self {
        Self { http, service_key }
    }

    pub fn from_config(cfg: &LookupConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build lookup client: {e}")))?;
        Ok(Self::new(http, cfg.service_key.clone()))
    }

    fn url(&self, base: &str, params: &[(&str, String)]) -> String {
        let mut query: Vec<String> = Vec::with_capacity(params.len() + 1);
        if let Some(key) = &self.service_key {
            query.push(format!("serviceKey={}", urlencoding::encode(key)));
        }
        query.extend(
            params
                .iter()
                .map(|(k, v)| format!("{k}={}", urlencoding::encode(v))),
        );
        let sep = if base.contains('?') { '&' } else { '?' };
        format!("{base}{sep}{}", query.join("&"))
    }

    /// GET and return the body, failing on transport errors and non-2xx.
    pub async fn get_text(
        &self,
        base: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<String, String> {
        let url = self.url(base, params);
        debug!(endpoint = base, "lookup request");
        let resp = self
            .http
            .get(&url)
            .header("User-Agent", concat!("yeahyak-gateway/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }
        resp.text().await.map_err(|e| e.to_string())
    }

    pub async fn get_json(
        &self,
        base: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<Value, String> {
        let body = self.get_text(base, params).await?;
        serde_json::from_str(&body).map_err(|e| format!("invalid JSON response: {e}"))
    }
}

/// `body.items` of a data.go.kr JSON envelope. Providers return either a list
/// or `{"item": ...}` holding one object or a list.
pub(crate) fn body_items(payload: &Value) -> Vec<Value> {
    let items = &payload["body"]["items"];
    let inner = match items.get("item") {
        Some(item) => item,
        None => items,
    };
    match inner {
        Value::Array(list) => list.clone(),
        Value::Object(_) => vec![inner.clone()],
        _ => Vec::new(),
    }
}

/// `body.totalCount`, which providers send as a number or a string.
pub(crate) fn total_count(payload: &Value) -> Option<u64> {
    match &payload["body"]["totalCount"] {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn markup() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^<>]*>").unwrap())
}

/// Collapse whitespace and drop the `<p>`-style markup some leaflets carry.
pub(crate) fn clean_field(raw: &str) -> String {
    markup()
        .replace_all(raw, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Toolkit
// ─────────────────────────────────────────────────────────────────────────────

/// Register the three lookup tools against one shared client.
pub fn register_lookup_tools(
    registry: &mut ToolRegistry,
    client: Arc<LookupClient>,
    cfg: &LookupConfig,
) -> Result<()> {
    registry.register(DrugGeneralInfoTool::new(
        client.clone(),
        cfg.drug_info_url.clone(),
        cfg.drug_info_rows,
    ))?;
    registry.register(ContraindicationTool::new(
        client.clone(),
        cfg.dur_url.clone(),
        cfg.dur_rows,
        cfg.dur_max_records,
    ))?;
    registry.register(IngredientInfoTool::new(
        client,
        cfg.ingredient_url.clone(),
        cfg.ingredient_rows,
    ))?;
    Ok(())
}

/// Registry holding the lookup catalogue, built from configuration.
pub fn lookup_toolkit(cfg: &LookupConfig) -> Result<ToolRegistry> {
    let client = Arc::new(LookupClient::from_config(cfg)?);
    let mut registry = ToolRegistry::new();
    register_lookup_tools(&mut registry, client, cfg)?;
    Ok(registry)
}
