//! Name normalization shared by the lookup tools.
//!
//! Providers index drugs by exact Korean names, while pharmacists type
//! product names with strengths, English ingredient names or salt forms. Each
//! tool walks an ordered candidate list and stops at the first hit.

use std::sync::OnceLock;

use regex::Regex;

/// Korean ↔ English ingredient aliases.
const ALIASES: &[(&str, &str)] = &[
    ("도세탁셀", "Docetaxel"),
    ("이리노테칸", "Irinotecan"),
    ("아세트아미노펜", "Acetaminophen"),
    ("콜린알포세레이트", "Choline alfoscerate"),
    ("아시클로버", "Acyclovir"),
    ("발라시클로버", "Valacyclovir"),
    ("와파린", "Warfarin"),
    ("메트포르민", "Metformin"),
    ("암로디핀", "Amlodipine"),
    ("아토르바스타틴", "Atorvastatin"),
    ("이부프로펜", "Ibuprofen"),
    ("클래리트로마이신", "Clarithromycin"),
];

fn salt_words() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(hydrochloride|hydrochlorid|phosphate|sulfate|mesylate|nitrate|sodium|potassium|calcium|magnesium|tartrate|maleate|fumarate|succinate|bitartrate|tosylate|acetate|hydrobromide|trihydrate|monohydrate|dihydrate|hydrate|anhydrous)\b",
        )
        .unwrap()
    })
}

fn parenthetical() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(.*?\)|\[.*?\]").unwrap())
}

fn strength() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\d+(\.\d+)?\s*(mg|mcg|μg|ml|g|iu|%|밀리그램|밀리그람|마이크로그램|밀리리터|그램|단위)",
        )
        .unwrap()
    })
}

fn dosage_form() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(필름코팅정|연질캡슐|서방정|장용정|구강붕해정|정|캡슐|시럽|현탁액|주사액|주사|과립|크림|연고|겔|패치|점안액)$",
        )
        .unwrap()
    })
}

fn squash_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Push `candidate` unless it is blank or already present (case-insensitive).
pub fn push_unique(list: &mut Vec<String>, candidate: impl Into<String>) {
    let candidate = candidate.into();
    let candidate = candidate.trim();
    if candidate.is_empty() || list.iter().any(|c| c.eq_ignore_ascii_case(candidate)) {
        return;
    }
    list.push(candidate.to_string());
}

/// Korean name for an English alias, case-insensitive.
pub fn korean_alias(name: &str) -> Option<&'static str> {
    let name = name.trim();
    ALIASES
        .iter()
        .find(|(_, en)| en.eq_ignore_ascii_case(name))
        .map(|(ko, _)| *ko)
}

/// English name for a Korean alias.
pub fn english_alias(name: &str) -> Option<&'static str> {
    let name = name.trim();
    ALIASES.iter().find(|(ko, _)| *ko == name).map(|(_, en)| *en)
}

/// Parentheticals removed, then salt and hydrate words removed, then trailing
/// separators removed. The literal input is not included.
pub fn salt_variants(name: &str) -> Vec<String> {
    let mut variants = Vec::new();
    let base = squash_spaces(&parenthetical().replace_all(name, " "));
    push_unique(&mut variants, base.clone());

    let stripped = squash_spaces(&salt_words().replace_all(&base, " "));
    push_unique(&mut variants, stripped.clone());

    let trimmed = stripped.trim_end_matches(['-', ',']).trim();
    push_unique(&mut variants, trimmed);

    variants.retain(|v| !v.eq_ignore_ascii_case(name.trim()));
    variants
}

/// Candidates for a product-name lookup: literal, then without strength and
/// parentheticals, then without the dosage-form suffix.
pub fn product_name_candidates(name: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    push_unique(&mut candidates, name);

    let without_strength = squash_spaces(
        &strength().replace_all(&parenthetical().replace_all(name, " "), " "),
    );
    push_unique(&mut candidates, without_strength.clone());

    let without_form = dosage_form().replace(&without_strength, "");
    push_unique(&mut candidates, without_form.trim());
    candidates
}

/// Candidates for an ingredient lookup: literal, English→Korean alias, then
/// salt-stripped variants and their aliases.
pub fn ingredient_candidates(name: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    push_unique(&mut candidates, name);
    if let Some(ko) = korean_alias(name) {
        push_unique(&mut candidates, ko);
    }
    for variant in salt_variants(name) {
        if let Some(ko) = korean_alias(&variant) {
            push_unique(&mut candidates, ko);
        }
        push_unique(&mut candidates, variant);
    }
    candidates
}

/// Names that look like a therapeutic class (`항혈전제`, `소화제`).
pub fn looks_like_class_name(name: &str) -> bool {
    let name = name.trim();
    name.chars().count() > 1 && name.ends_with('제')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_work_both_ways() {
        assert_eq!(korean_alias("warfarin"), Some("와파린"));
        assert_eq!(korean_alias(" Choline Alfoscerate "), Some("콜린알포세레이트"));
        assert_eq!(english_alias("도세탁셀"), Some("Docetaxel"));
        assert_eq!(korean_alias("Unknownium"), None);
    }

    #[test]
    fn strips_salts_and_parentheticals() {
        assert_eq!(
            salt_variants("Valacyclovir Hydrochloride (as monohydrate)"),
            vec!["Valacyclovir Hydrochloride".to_string(), "Valacyclovir".to_string()]
        );
        assert!(salt_variants("Warfarin").is_empty());
    }

    #[test]
    fn product_candidates_drop_strength_then_form() {
        assert_eq!(
            product_name_candidates("타이레놀정500밀리그람(아세트아미노펜)"),
            vec![
                "타이레놀정500밀리그람(아세트아미노펜)".to_string(),
                "타이레놀정".to_string(),
                "타이레놀".to_string(),
            ]
        );
        assert_eq!(product_name_candidates("게보린"), vec!["게보린".to_string()]);
    }

    #[test]
    fn ingredient_candidates_prefer_korean_aliases() {
        assert_eq!(
            ingredient_candidates("Metformin Hydrochloride"),
            vec![
                "Metformin Hydrochloride".to_string(),
                "메트포르민".to_string(),
                "Metformin".to_string(),
            ]
        );
    }

    #[test]
    fn class_names_end_with_je() {
        assert!(looks_like_class_name("항혈전제"));
        assert!(!looks_like_class_name("제"));
        assert!(!looks_like_class_name("와파린"));
    }
}
