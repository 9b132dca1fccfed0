//! Ingredient master data from the HIRA major-ingredient service (XML).

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::normalize::{english_alias, ingredient_candidates, looks_like_class_name, push_unique};
use super::{LookupClient, LookupTool};
use crate::error::Result;
use crate::tool::{parse_arguments, Tool};

fn ingredient_code() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9]{6,12}$").unwrap())
}

#[derive(Debug, Deserialize)]
struct IngredientArgs {
    ingredient_name: String,
}

#[derive(Debug, Deserialize)]
struct HiraResponse {
    header: HiraHeader,
    #[serde(default)]
    body: Option<HiraBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HiraHeader {
    #[serde(default)]
    result_code: String,
    #[serde(default)]
    result_msg: String,
}

#[derive(Debug, Deserialize)]
struct HiraBody {
    #[serde(default)]
    items: Option<HiraItems>,
}

#[derive(Debug, Default, Deserialize)]
struct HiraItems {
    #[serde(default)]
    item: Vec<HiraItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HiraItem {
    #[serde(default)]
    gnl_nm: String,
    #[serde(default)]
    gnl_nm_cd: String,
    #[serde(default)]
    div_nm: String,
    #[serde(default)]
    meft_div_no: String,
    #[serde(default)]
    fomn_tp_nm: String,
    #[serde(default)]
    injc_pth_nm: String,
    #[serde(default)]
    iqty_txt: String,
    #[serde(default)]
    unit: String,
}

impl HiraItem {
    fn render(&self) -> Option<String> {
        let mut bits = Vec::new();
        let fields = [
            ("일반명", &self.gnl_nm),
            ("일반명코드", &self.gnl_nm_cd),
            ("분류명", &self.div_nm),
            ("약효분류번호", &self.meft_div_no),
            ("제형", &self.fomn_tp_nm),
            ("투여경로", &self.injc_pth_nm),
        ];
        for (label, value) in fields {
            let value = value.trim();
            if !value.is_empty() {
                bits.push(format!("{label}: {value}"));
            }
        }
        let amount = format!("{} {}", self.iqty_txt.trim(), self.unit.trim());
        let amount = amount.trim();
        if !amount.is_empty() {
            bits.push(format!("함량: {amount}"));
        }
        (!bits.is_empty()).then(|| bits.join(" | "))
    }
}

/// Decode a HIRA XML payload; `resultCode` other than `00` is an API error.
fn parse_items(xml: &str) -> std::result::Result<Vec<HiraItem>, String> {
    let response: HiraResponse =
        quick_xml::de::from_str(xml).map_err(|e| format!("invalid XML response: {e}"))?;
    let code = response.header.result_code.trim();
    if code != "00" {
        let msg = match response.header.result_msg.trim() {
            "" => "UNKNOWN",
            msg => msg,
        };
        return Err(format!("API 오류: {msg} (코드 {code})"));
    }
    Ok(response
        .body
        .and_then(|body| body.items)
        .map(|items| items.item)
        .unwrap_or_default())
}

/// Which request parameter a lookup attempt uses.
#[derive(Debug, Clone, Copy)]
enum QueryField {
    Code,
    Name,
    Class,
}

impl QueryField {
    fn param(self) -> &'static str {
        match self {
            QueryField::Code => "gnlNmCd",
            QueryField::Name => "gnlNm",
            QueryField::Class => "divNm",
        }
    }
}

/// Therapeutic class, dosage form, route and strength for an ingredient.
pub struct IngredientInfoTool {
    client: Arc<LookupClient>,
    endpoint: String,
    rows: usize,
}

impl IngredientInfoTool {
    pub fn new(client: Arc<LookupClient>, endpoint: String, rows: usize) -> Self {
        Self {
            client,
            endpoint,
            rows: rows.max(1),
        }
    }

    /// Ordered lookup plan: code, literal name, aliases, salt variants, class.
    fn plan(query: &str) -> Vec<(QueryField, String)> {
        let mut plan = Vec::new();
        if ingredient_code().is_match(query) {
            plan.push((QueryField::Code, query.to_string()));
        }
        let mut names = ingredient_candidates(query);
        if let Some(en) = english_alias(query) {
            let insert_at = names.len().min(1);
            if !names.iter().any(|n| n == en) {
                names.insert(insert_at, en.to_string());
            }
        }
        let mut deduped = Vec::new();
        for name in names {
            push_unique(&mut deduped, name);
        }
        plan.extend(deduped.into_iter().map(|n| (QueryField::Name, n)));
        if looks_like_class_name(query) {
            plan.push((QueryField::Class, query.to_string()));
        }
        plan
    }

    async fn fetch(&self, field: QueryField, value: &str) -> std::result::Result<String, String> {
        debug!(field = field.param(), value, "ingredient lookup attempt");
        let params = [
            ("pageNo", "1".to_string()),
            ("numOfRows", self.rows.to_string()),
            (field.param(), value.to_string()),
        ];
        let body = self.client.get_text(&self.endpoint, &params).await?;
        let lines: Vec<String> = parse_items(&body)?
            .iter()
            .filter_map(HiraItem::render)
            .collect();
        Ok(lines.join("\n"))
    }
}

#[async_trait]
impl Tool for IngredientInfoTool {
    fn name(&self) -> &str {
        LookupTool::IngredientGeneralInfo.name()
    }

    fn description(&self) -> &str {
        "특정 성분명(또는 일반명코드, 약효 분류명)의 약효 분류, 제형, 투여경로, 함량 등 상세 정보를 조회합니다."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "ingredient_name": {
                    "type": "string",
                    "description": "성분명, 일반명코드 또는 분류명 (예: 아세트아미노펜, Docetaxel, 항혈전제)"
                }
            },
            "required": ["ingredient_name"]
        }))
    }

    async fn call(&self, input: Value) -> Result<String> {
        let args: IngredientArgs = parse_arguments(self.name(), input)?;
        let query = args.ingredient_name.trim();
        info!(tool = self.name(), query, "ingredient info lookup");

        for (field, value) in Self::plan(query) {
            match self.fetch(field, &value).await {
                Ok(text) if !text.is_empty() => return Ok(text),
                Ok(_) => continue,
                Err(err) => return Ok(format!("'{query}' 성분 상세 정보 검색 중 오류 발생: {err}")),
            }
        }
        Ok(format!(
            "'{query}'에 대한 결과가 없습니다. (성분/코드/분류명 표기를 확인해 주세요)"
        ))
    }
}
