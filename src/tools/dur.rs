//! Co-administration contraindications from the MFDS DUR ingredient service.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::normalize::ingredient_candidates;
use super::{body_items, clean_field, total_count, LookupClient, LookupTool};
use crate::error::Result;
use crate::tool::{parse_arguments, Tool};

#[derive(Debug, Deserialize)]
struct ContraindicationArgs {
    ingredient_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct TabooRecord {
    ingr_kor_name: Option<String>,
    ingr_eng_name: Option<String>,
    mixture_ingr_kor_name: Option<String>,
    mixture_ingr_eng_name: Option<String>,
    prohbt_content: Option<String>,
}

impl TabooRecord {
    fn render(&self) -> String {
        let pick = |ko: &Option<String>, en: &Option<String>| {
            ko.as_deref()
                .or(en.as_deref())
                .map(clean_field)
                .unwrap_or_else(|| "-".to_string())
        };
        let base = pick(&self.ingr_kor_name, &self.ingr_eng_name);
        let mixture = pick(&self.mixture_ingr_kor_name, &self.mixture_ingr_eng_name);
        match self.prohbt_content.as_deref().map(clean_field) {
            Some(reason) if !reason.is_empty() => format!("- {base} + {mixture}: {reason}"),
            _ => format!("- {base} + {mixture}"),
        }
    }
}

enum Lookup {
    Found(Vec<TabooRecord>),
    Empty,
}

/// Ingredients that must not be combined with the given ingredient.
pub struct ContraindicationTool {
    client: Arc<LookupClient>,
    endpoint: String,
    rows: usize,
    max_records: usize,
}

impl ContraindicationTool {
    pub fn new(
        client: Arc<LookupClient>,
        endpoint: String,
        rows: usize,
        max_records: usize,
    ) -> Self {
        Self {
            client,
            endpoint,
            rows: rows.max(1),
            max_records: max_records.max(1),
        }
    }

    async fn fetch(&self, ingredient: &str) -> std::result::Result<Lookup, String> {
        let params = [
            ("ingrKorName", ingredient.to_string()),
            ("type", "json".to_string()),
            ("numOfRows", self.rows.to_string()),
        ];
        let payload = self.client.get_json(&self.endpoint, &params).await?;
        let items = body_items(&payload);
        if items.is_empty() || total_count(&payload) == Some(0) {
            return Ok(Lookup::Empty);
        }
        Ok(Lookup::Found(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ))
    }

    fn render(&self, query: &str, records: &[TabooRecord]) -> String {
        let shown = records.len().min(self.max_records);
        let mut lines = vec![format!("'{query}' 병용금기 정보 ({}건)", records.len())];
        lines.extend(records.iter().take(shown).map(TabooRecord::render));
        if records.len() > shown {
            lines.push(format!("… 외 {}건 생략", records.len() - shown));
        }
        lines.join("\n")
    }
}

#[async_trait]
impl Tool for ContraindicationTool {
    fn name(&self) -> &str {
        LookupTool::IngredientContraindication.name()
    }

    fn description(&self) -> &str {
        "특정 성분과 함께 복용하면 안 되는(병용금기) 성분 목록과 금기 사유를 찾을 때 사용합니다. 국문 성분명을 권장합니다."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "ingredient_name": {
                    "type": "string",
                    "description": "성분명 (예: 와파린, Clarithromycin)"
                }
            },
            "required": ["ingredient_name"]
        }))
    }

    async fn call(&self, input: Value) -> Result<String> {
        let args: ContraindicationArgs = parse_arguments(self.name(), input)?;
        let query = args.ingredient_name.trim();
        info!(tool = self.name(), query, "contraindication lookup");

        for candidate in ingredient_candidates(query) {
            match self.fetch(&candidate).await {
                Ok(Lookup::Found(records)) if !records.is_empty() => {
                    return Ok(self.render(query, &records));
                }
                Ok(_) => continue,
                Err(err) => return Ok(format!("'{query}' 병용금기 검색 중 오류 발생: {err}")),
            }
        }
        Ok(format!("'{query}' 성분에 대한 병용금기 정보가 없습니다."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(mixture: &str) -> TabooRecord {
        TabooRecord {
            ingr_kor_name: Some("클래리트로마이신".into()),
            mixture_ingr_kor_name: Some(mixture.into()),
            prohbt_content: Some("QT 연장".into()),
            ..Default::default()
        }
    }

    #[test]
    fn renders_pairs_with_reason() {
        assert_eq!(
            record("피모지드").render(),
            "- 클래리트로마이신 + 피모지드: QT 연장"
        );
        let bare = TabooRecord {
            ingr_eng_name: Some("warfarin".into()),
            ..Default::default()
        };
        assert_eq!(bare.render(), "- warfarin + -");
    }

    #[test]
    fn caps_rendered_records() {
        let tool = ContraindicationTool::new(
            Arc::new(LookupClient::new(reqwest::Client::new(), None)),
            "http://127.0.0.1:9/unused".into(),
            50,
            2,
        );
        let records = vec![record("가"), record("나"), record("다")];
        let text = tool.render("클래리트로마이신", &records);

        assert!(text.starts_with("'클래리트로마이신' 병용금기 정보 (3건)"));
        assert_eq!(text.lines().filter(|l| l.starts_with("- ")).count(), 2);
        assert!(text.ends_with("… 외 1건 생략"));
    }
}
