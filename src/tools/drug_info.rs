//! Product leaflet lookup against the MFDS e약은요 service.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::normalize::product_name_candidates;
use super::{body_items, clean_field, LookupClient, LookupTool};
use crate::error::Result;
use crate::tool::{parse_arguments, Tool};

#[derive(Debug, Deserialize)]
struct DrugInfoArgs {
    item_name: String,
}

/// One leaflet record. Fields are optional because the provider omits blanks.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DrugLeaflet {
    item_name: Option<String>,
    entp_name: Option<String>,
    efcy_qesitm: Option<String>,
    use_method_qesitm: Option<String>,
    atpn_warn_qesitm: Option<String>,
    atpn_qesitm: Option<String>,
    intrc_qesitm: Option<String>,
    se_qesitm: Option<String>,
    deposit_method_qesitm: Option<String>,
}

impl DrugLeaflet {
    fn render(&self) -> String {
        let sections = [
            ("제품명", &self.item_name),
            ("업체명", &self.entp_name),
            ("효능·효과", &self.efcy_qesitm),
            ("용법·용량", &self.use_method_qesitm),
            ("사용상 주의사항(경고)", &self.atpn_warn_qesitm),
            ("사용상 주의사항", &self.atpn_qesitm),
            ("상호작용", &self.intrc_qesitm),
            ("부작용", &self.se_qesitm),
            ("보관법", &self.deposit_method_qesitm),
        ];
        sections
            .iter()
            .filter_map(|(label, value)| {
                let value = clean_field(value.as_deref()?);
                (!value.is_empty()).then(|| format!("[{label}] {value}"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Efficacy, usage, warnings and storage for a product name.
pub struct DrugGeneralInfoTool {
    client: Arc<LookupClient>,
    endpoint: String,
    rows: usize,
}

impl DrugGeneralInfoTool {
    pub fn new(client: Arc<LookupClient>, endpoint: String, rows: usize) -> Self {
        Self {
            client,
            endpoint,
            rows: rows.max(1),
        }
    }

    async fn fetch(&self, item_name: &str) -> std::result::Result<Vec<DrugLeaflet>, String> {
        let params = [
            ("itemName", item_name.to_string()),
            ("type", "json".to_string()),
            ("numOfRows", self.rows.to_string()),
        ];
        let payload = self.client.get_json(&self.endpoint, &params).await?;
        Ok(body_items(&payload)
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .take(self.rows)
            .collect())
    }
}

#[async_trait]
impl Tool for DrugGeneralInfoTool {
    fn name(&self) -> &str {
        LookupTool::DrugGeneralInfo.name()
    }

    fn description(&self) -> &str {
        "의약품의 제품명으로 효능·효과, 용법·용량, 주의사항, 상호작용, 부작용, 보관법 등 전반적인 정보를 얻고 싶을 때 사용합니다."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "item_name": {
                    "type": "string",
                    "description": "의약품 제품명 (예: 타이레놀정500밀리그람)"
                }
            },
            "required": ["item_name"]
        }))
    }

    async fn call(&self, input: Value) -> Result<String> {
        let args: DrugInfoArgs = parse_arguments(self.name(), input)?;
        let query = args.item_name.trim();
        info!(tool = self.name(), query, "drug info lookup");

        for candidate in product_name_candidates(query) {
            match self.fetch(&candidate).await {
                Ok(leaflets) if !leaflets.is_empty() => {
                    return Ok(leaflets
                        .iter()
                        .map(DrugLeaflet::render)
                        .collect::<Vec<_>>()
                        .join("\n\n"));
                }
                Ok(_) => continue,
                Err(err) => return Ok(format!("'{query}' 정보 검색 중 오류 발생: {err}")),
            }
        }
        Ok(format!("'{query}'에 대한 의약품 정보를 찾을 수 없습니다."))
    }
}
