//! The instructional prompt sent with every extraction request.

use unitplan_core::PlanConfig;

const TEXT_BEGIN: &str = "--- PDF本文ここから ---";
const TEXT_END: &str = "--- PDF本文ここまで ---";

/// Prompt builder for one configured document domain.
#[derive(Debug, Clone)]
pub struct ExtractionPrompt {
    domain: String,
    subject_hint: String,
    text_limit: usize,
}

impl ExtractionPrompt {
    pub fn new(config: &PlanConfig) -> Self {
        Self {
            domain: config.domain.clone(),
            subject_hint: format!("{} など", config.subject_labels().join(" または ")),
            text_limit: config.ocr_text_limit,
        }
    }

    /// Prompt for a request that carries the PDF itself.
    pub fn direct(&self, file_name: &str) -> String {
        [
            format!("あなたは{}データを構造化するアシスタントです。", self.domain),
            "添付資料から「活動時期」「単元名」「配当時数」を抽出してください。".into(),
            "厳密にJSONのみを返してください。コードブロック記法は禁止です。".into(),
            "hoursは必ず数値（整数または小数）にしてください。".into(),
            "monthsは4月〜3月の配列で返し、推定が必要ならperiodに根拠文字列を残してください。"
                .into(),
            String::new(),
            "返却JSONスキーマ:".into(),
            "{".into(),
            format!("  \"subject\": \"{}\",", self.subject_hint),
            "  \"items\": [".into(),
            "    {".into(),
            "      \"period\": \"原文の活動時期（例: 4月, 4〜5月, 通年）\",".into(),
            "      \"months\": [\"4月\",\"5月\"],".into(),
            "      \"unit\": \"単元名\",".into(),
            "      \"hours\": 3".into(),
            "    }".into(),
            "  ]".into(),
            "}".into(),
            String::new(),
            format!("ファイル名: {file_name}"),
        ]
        .join("\n")
    }

    /// Prompt for a text-only request, with OCR output appended.
    ///
    /// The text is cut to the configured character limit.
    pub fn with_text(&self, file_name: &str, text: &str) -> String {
        [
            self.direct(file_name).as_str(),
            TEXT_BEGIN,
            truncate_chars(text, self.text_limit),
            TEXT_END,
        ]
        .join("\n")
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitplan_core::SubjectKeyword;

    #[test]
    fn direct_prompt_names_domain_subjects_and_file() {
        let prompt = ExtractionPrompt::new(&PlanConfig::default()).direct("算数_4年.pdf");
        assert!(prompt.starts_with("あなたは小学校の年間指導計画データを構造化するアシスタントです。\n"));
        assert!(prompt.contains("コードブロック記法は禁止です"));
        assert!(prompt.contains("\"subject\": \"算数 または 社会 など\","));
        assert!(prompt.ends_with("\nファイル名: 算数_4年.pdf"));
    }

    #[test]
    fn subject_hint_follows_configuration() {
        let config = PlanConfig::default().with_subject(SubjectKeyword::new("science", "理科"));
        let prompt = ExtractionPrompt::new(&config).direct("x.pdf");
        assert!(prompt.contains("算数 または 社会 または 理科 など"));
    }

    #[test]
    fn text_prompt_wraps_ocr_text() {
        let prompt = ExtractionPrompt::new(&PlanConfig::default()).with_text("a.pdf", "本文");
        assert!(prompt.contains("ファイル名: a.pdf\n--- PDF本文ここから ---\n本文\n--- PDF本文ここまで ---"));
    }

    #[test]
    fn text_is_truncated_by_characters() {
        let config = PlanConfig {
            ocr_text_limit: 3,
            ..PlanConfig::default()
        };
        let prompt = ExtractionPrompt::new(&config).with_text("a.pdf", "四月五月六月");
        assert!(prompt.contains("\n四月五\n"));
        assert!(!prompt.contains("四月五月"));

        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
