/// Returns the trimmed value, or `None` when it is absent or whitespace only.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// スキルトークンの正規化（小文字化 + trim、空トークンは捨てる）
pub fn normalize_skill_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes a skill list in order. Repeated tokens are kept so that they
/// count towards term frequency.
pub fn normalize_skill_tokens(skills: &[String]) -> Vec<String> {
    skills
        .iter()
        .filter_map(|skill| normalize_skill_token(skill))
        .collect()
}
