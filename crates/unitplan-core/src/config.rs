//! Run configuration.
//!
//! Built once at start-up and passed by reference; nothing here is mutated
//! during a run.

use std::time::Duration;

/// Substring → subject label, used when the model reports no subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyword {
    pub keyword: String,
    pub label: String,
}

impl SubjectKeyword {
    pub fn new(keyword: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            label: label.into(),
        }
    }

    /// Parse `keyword=label`, or a bare `label` that is its own keyword.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let (keyword, label) = match spec.split_once('=') {
            Some((k, l)) => (k.trim(), l.trim()),
            None => (spec, spec),
        };
        if keyword.is_empty() || label.is_empty() {
            return None;
        }
        Some(Self::new(keyword, label))
    }
}

#[derive(Debug, Clone)]
pub struct PlanConfig {
    /// Generation model identifier, e.g. `gemini-flash-latest`.
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    /// What the documents are, as stated in the extraction prompt.
    pub domain: String,
    pub subjects: Vec<SubjectKeyword>,
    pub unknown_subject: String,
    pub main_table_name: String,
    pub raw_table_name: String,
    pub cache_name: String,
    pub subject_table_prefix: String,
    /// Tesseract language code passed to the OCR engine.
    pub ocr_language: String,
    /// Characters of OCR text submitted in a text-mode request.
    pub ocr_text_limit: usize,
    /// Pause after each fresh extraction.
    pub request_delay: Duration,
}

/// Longest table name the renderer will produce.
pub const MAX_TABLE_NAME_CHARS: usize = 95;

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            model: "gemini-flash-latest".into(),
            api_base: "https://generativelanguage.googleapis.com".into(),
            temperature: 0.1,
            domain: "小学校の年間指導計画".into(),
            subjects: vec![
                SubjectKeyword::new("算数", "算数"),
                SubjectKeyword::new("社会", "社会"),
            ],
            unknown_subject: "不明".into(),
            main_table_name: "単元計画一覧".into(),
            raw_table_name: "抽出データ".into(),
            cache_name: "処理キャッシュ".into(),
            subject_table_prefix: "計画_".into(),
            ocr_language: "jpn".into(),
            ocr_text_limit: 150_000,
            request_delay: Duration::from_millis(600),
        }
    }
}

impl PlanConfig {
    /// Add a subject keyword unless one with the same keyword exists.
    pub fn with_subject(mut self, subject: SubjectKeyword) -> Self {
        if !self.subjects.iter().any(|s| s.keyword == subject.keyword) {
            self.subjects.push(subject);
        }
        self
    }

    /// Distinct subject labels, in configuration order.
    pub fn subject_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for s in &self.subjects {
            if !labels.contains(&s.label.as_str()) {
                labels.push(&s.label);
            }
        }
        labels
    }

    /// Table name for one subject, truncated to [`MAX_TABLE_NAME_CHARS`].
    pub fn subject_table_name(&self, subject: &str) -> String {
        format!("{}{}", self.subject_table_prefix, subject)
            .chars()
            .take(MAX_TABLE_NAME_CHARS)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_school_year_setup() {
        let config = PlanConfig::default();
        assert_eq!(config.model, "gemini-flash-latest");
        assert_eq!(config.subject_labels(), vec!["算数", "社会"]);
        assert_eq!(config.ocr_text_limit, 150_000);
        assert_eq!(config.request_delay, Duration::from_millis(600));
    }

    #[test]
    fn subject_keyword_parse() {
        assert_eq!(
            SubjectKeyword::parse("science=理科"),
            Some(SubjectKeyword::new("science", "理科"))
        );
        assert_eq!(
            SubjectKeyword::parse(" 国語 "),
            Some(SubjectKeyword::new("国語", "国語"))
        );
        assert_eq!(SubjectKeyword::parse("=理科"), None);
        assert_eq!(SubjectKeyword::parse(""), None);
    }

    #[test]
    fn with_subject_skips_duplicate_keyword() {
        let config = PlanConfig::default()
            .with_subject(SubjectKeyword::new("理科", "理科"))
            .with_subject(SubjectKeyword::new("算数", "さんすう"));
        assert_eq!(config.subject_labels(), vec!["算数", "社会", "理科"]);
    }

    #[test]
    fn subject_table_name_is_truncated() {
        let config = PlanConfig::default();
        assert_eq!(config.subject_table_name("算数"), "計画_算数");
        let long = "あ".repeat(200);
        assert_eq!(config.subject_table_name(&long).chars().count(), 95);
    }
}
