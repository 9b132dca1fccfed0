//! Output guardrails applied to every QnA answer.
//!
//! - Risk-keyword detection over the question and the answer
//! - A clinical safety disclaimer appended exactly once on a match
//! - Readability reformatting (see [`crate::formatting`])

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GuardrailConfig;
use crate::formatting::reformat;

/// Disclaimer appended when a high-risk context is detected.
pub const SAFETY_DISCLAIMER: &str = "⚠️ 임신·수유, 소아·고령, 신/간기능 저하, 치료역이 좁은 약물, 항암·면역억제 치료와 같은 고위험 상황에서는 환자별 검사 수치와 최신 가이드라인을 반드시 확인하신 후 투약을 결정해 주세요.";

/// Result of scanning text for risk keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScan {
    pub triggered: bool,
    pub detected_items: Vec<String>,
}

/// Keyword scanner for high-risk clinical contexts.
///
/// Hangul keywords match as plain substrings. ASCII keywords (`ast`, `inr`,
/// `egfr`, ...) only match as whole words so `fast` or `alternative` do not
/// trigger.
#[derive(Debug, Clone)]
pub struct RiskKeywordScanner {
    patterns: Vec<String>,
}

impl Default for RiskKeywordScanner {
    fn default() -> Self {
        Self::new(
            [
                // pregnancy and lactation
                "임신", "임부", "수유",
                // age groups
                "소아", "영아", "신생아", "고령", "노인",
                // organ function
                "신기능", "신장애", "간기능", "간장애", "egfr", "크레아티닌",
                // narrow therapeutic index
                "와파린", "warfarin", "디곡신", "digoxin", "리튬", "lithium", "페니토인",
                "phenytoin", "테오필린", "카르바마제핀", "발프로산",
                // oncology and immunosuppression
                "항암", "화학요법", "면역억제", "타크로리무스", "사이클로스포린",
                "메토트렉세이트",
                // monitoring
                "inr", "혈중농도", "tdm", "ast", "alt",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }
}

impl RiskKeywordScanner {
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: patterns.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    pub fn with_patterns(mut self, additional: Vec<String>) -> Self {
        self.patterns
            .extend(additional.into_iter().map(|p| p.to_lowercase()));
        self
    }

    pub fn scan(&self, content: &str) -> RiskScan {
        let lower = content.to_lowercase();
        let detected_items: Vec<String> = self
            .patterns
            .iter()
            .filter(|p| contains_keyword(&lower, p))
            .cloned()
            .collect();
        RiskScan {
            triggered: !detected_items.is_empty(),
            detected_items,
        }
    }
}

fn contains_keyword(haystack: &str, keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return haystack.contains(keyword);
    }
    haystack.match_indices(keyword).any(|(start, _)| {
        let end = start + keyword.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

/// Appends [`SAFETY_DISCLAIMER`] when the exchange touches a risk context.
#[derive(Debug, Clone, Default)]
pub struct SafetyFooter {
    scanner: RiskKeywordScanner,
}

impl SafetyFooter {
    pub fn new(scanner: RiskKeywordScanner) -> Self {
        Self { scanner }
    }

    pub fn apply(&self, query: &str, answer: &str) -> String {
        let scan = self.scanner.scan(&format!("{query}\n{answer}"));
        if !scan.triggered {
            return answer.to_string();
        }
        debug!(keywords = ?scan.detected_items, "risk keywords detected");

        let answer = dedupe_disclaimer(answer);
        if answer.contains(SAFETY_DISCLAIMER) {
            return answer;
        }
        let body = answer.trim_end();
        if body.is_empty() {
            SAFETY_DISCLAIMER.to_string()
        } else {
            format!("{body}\n\n{SAFETY_DISCLAIMER}")
        }
    }
}

/// Keep the first copy of the disclaimer if the model echoed it repeatedly.
fn dedupe_disclaimer(answer: &str) -> String {
    match answer.find(SAFETY_DISCLAIMER) {
        Some(first) => {
            let split = first + SAFETY_DISCLAIMER.len();
            let (head, tail) = answer.split_at(split);
            format!("{head}{}", tail.replace(SAFETY_DISCLAIMER, ""))
        }
        None => answer.to_string(),
    }
}

/// Footer then reformatting, in that order.
#[derive(Debug, Clone)]
pub struct AnswerPostProcessor {
    footer: SafetyFooter,
    reformat: bool,
}

impl Default for AnswerPostProcessor {
    fn default() -> Self {
        Self {
            footer: SafetyFooter::default(),
            reformat: true,
        }
    }
}

impl AnswerPostProcessor {
    pub fn new(footer: SafetyFooter) -> Self {
        Self {
            footer,
            reformat: true,
        }
    }

    /// Built-in keywords plus the configured extras; reformatting can be
    /// switched off for clients that render their own layout.
    pub fn from_config(config: &GuardrailConfig) -> Self {
        let scanner =
            RiskKeywordScanner::default().with_patterns(config.extra_risk_keywords.clone());
        let post = Self::new(SafetyFooter::new(scanner));
        if config.reformat {
            post
        } else {
            post.without_reformatting()
        }
    }

    pub fn without_reformatting(mut self) -> Self {
        self.reformat = false;
        self
    }

    pub fn apply(&self, query: &str, answer: &str) -> String {
        let with_footer = self.footer.apply(query, answer);
        if self.reformat {
            reformat(&with_footer)
        } else {
            with_footer
        }
    }
}
