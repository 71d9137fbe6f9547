//! Fold extraction payloads into per-file month rows.

use std::collections::HashSet;

use tracing::debug;

use crate::config::PlanConfig;
use crate::months::{Month, normalize_months};
use crate::plan::{ExtractionPayload, UnitItem, format_hours};

/// Display labels per canonical month, in school-year order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthBuckets([Vec<String>; 12]);

impl MonthBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, month: Month, label: String) {
        self.0[month.school_index()].push(label);
    }

    pub fn get(&self, month: Month) -> &[String] {
        &self.0[month.school_index()]
    }

    /// Buckets paired with their month, April first.
    pub fn iter(&self) -> impl Iterator<Item = (Month, &[String])> {
        Month::school_year().map(|m| (m, self.get(m)))
    }

    /// One table cell: the month's labels, one per line.
    pub fn cell(&self, month: Month) -> String {
        self.get(month).join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Vec::is_empty)
    }
}

/// One rendered row per source file.
#[derive(Debug, Clone)]
pub struct Row {
    pub file_id: String,
    pub file_name: String,
    pub subject: String,
    pub months: MonthBuckets,
    /// The payload the row was built from, kept for the raw export.
    pub raw: ExtractionPayload,
}

/// Build rows in payload order.
pub fn build_rows(payloads: &[ExtractionPayload], config: &PlanConfig) -> Vec<Row> {
    payloads.iter().map(|p| build_row(p, config)).collect()
}

pub fn build_row(payload: &ExtractionPayload, config: &PlanConfig) -> Row {
    let mut months = MonthBuckets::new();
    for item in &payload.items {
        let Some(label) = unit_label(item) else {
            continue;
        };
        let resolved = normalize_months(&item.months, &item.period);
        if resolved.is_empty() {
            debug!(unit = %item.unit, period = %item.period, "no month placement for unit");
        }
        for month in resolved {
            months.push(month, label.clone());
        }
    }

    Row {
        file_id: payload.file_id.clone().unwrap_or_default(),
        file_name: payload.source_file_name().to_string(),
        subject: resolve_subject(payload, config),
        months,
        raw: payload.clone(),
    }
}

/// `"<unit>（<hours>）"`, or just the unit when hours are absent.
///
/// `None` for a blank unit.
pub fn unit_label(item: &UnitItem) -> Option<String> {
    let unit = item.unit.trim();
    if unit.is_empty() {
        return None;
    }
    Some(match item.hours {
        Some(h) if h.is_finite() => format!("{unit}（{}）", format_hours(h)),
        _ => unit.to_string(),
    })
}

/// The model's subject if it gave one, else a guess from the file name.
pub fn resolve_subject(payload: &ExtractionPayload, config: &PlanConfig) -> String {
    let reported = payload.subject.trim();
    if !reported.is_empty() {
        return reported.to_string();
    }
    infer_subject(payload.source_file_name(), config)
}

/// First configured keyword found in the file name, case-insensitively.
pub fn infer_subject(file_name: &str, config: &PlanConfig) -> String {
    let lower = file_name.to_lowercase();
    config
        .subjects
        .iter()
        .find(|s| lower.contains(&s.keyword.to_lowercase()))
        .map(|s| s.label.clone())
        .unwrap_or_else(|| config.unknown_subject.clone())
}

/// Distinct non-empty subjects in first-seen order.
pub fn subject_groups(rows: &[Row]) -> Vec<&str> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|r| r.subject.as_str())
        .filter(|s| !s.is_empty() && seen.insert(*s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> ExtractionPayload {
        ExtractionPayload::from_value(&value).unwrap()
    }

    fn month(n: u32) -> Month {
        Month::new(n).unwrap()
    }

    #[test]
    fn labels_land_in_every_resolved_month() {
        let config = PlanConfig::default();
        let p = payload(json!({
            "subject": "算数",
            "sourceFile": "math.pdf",
            "fileId": "f1",
            "items": [
                {"period": "4〜5月", "months": [], "unit": "大きな数", "hours": 8},
                {"period": "5月", "months": ["5月"], "unit": "折れ線グラフ", "hours": 6},
                {"period": "随時", "months": [], "unit": "そろばん"}
            ]
        }));
        let row = build_row(&p, &config);

        assert_eq!(row.file_id, "f1");
        assert_eq!(row.file_name, "math.pdf");
        assert_eq!(row.subject, "算数");
        assert_eq!(row.months.get(month(4)), ["大きな数（8）"]);
        assert_eq!(row.months.get(month(5)), ["大きな数（8）", "折れ線グラフ（6）"]);
        assert!(row.months.get(month(6)).is_empty());
        assert_eq!(row.months.cell(month(5)), "大きな数（8）\n折れ線グラフ（6）");
        // Unplaced items stay in the raw payload.
        assert_eq!(row.raw.items.len(), 3);
    }

    #[test]
    fn label_without_hours_has_no_suffix() {
        let item = UnitItem {
            period: String::new(),
            months: vec![],
            unit: "地図記号".into(),
            hours: None,
        };
        assert_eq!(unit_label(&item).as_deref(), Some("地図記号"));

        let nan = UnitItem {
            hours: Some(f64::NAN),
            ..item.clone()
        };
        assert_eq!(unit_label(&nan).as_deref(), Some("地図記号"));

        let blank = UnitItem {
            unit: "  ".into(),
            ..item
        };
        assert_eq!(unit_label(&blank), None);
    }

    #[test]
    fn subject_falls_back_to_file_name() {
        let config = PlanConfig::default();
        let p = payload(json!({"subject": "  ", "sourceFile": "R6_社会_年間計画.pdf", "items": []}));
        assert_eq!(resolve_subject(&p, &config), "社会");

        let p = payload(json!({"sourceFile": "plan.pdf", "items": []}));
        assert_eq!(resolve_subject(&p, &config), "不明");
    }

    #[test]
    fn inference_is_case_insensitive() {
        let config = PlanConfig::default()
            .with_subject(crate::config::SubjectKeyword::new("Science", "理科"));
        assert_eq!(infer_subject("GRADE4_SCIENCE.pdf", &config), "理科");
    }

    #[test]
    fn rows_keep_payload_order_and_groups_dedupe() {
        let config = PlanConfig::default();
        let payloads = vec![
            payload(json!({"subject": "社会", "sourceFile": "a.pdf", "items": []})),
            payload(json!({"subject": "算数", "sourceFile": "b.pdf", "items": []})),
            payload(json!({"subject": "社会", "sourceFile": "c.pdf", "items": []})),
        ];
        let rows = build_rows(&payloads, &config);
        let names: Vec<&str> = rows.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf"]);
        assert_eq!(subject_groups(&rows), vec!["社会", "算数"]);
    }

    #[test]
    fn buckets_iterate_in_school_year_order() {
        let mut buckets = MonthBuckets::new();
        assert!(buckets.is_empty());
        buckets.push(month(1), "x".into());
        let order: Vec<u8> = buckets.iter().map(|(m, _)| m.number()).collect();
        assert_eq!(order, vec![4, 5, 6, 7, 8, 9, 10, 11, 12, 1, 2, 3]);
        assert!(!buckets.is_empty());
    }
}
