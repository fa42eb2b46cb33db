use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// One raw CSV row as exported upstream, before numeric coercion.
///
/// Header names match the extract verbatim; every field is optional text
/// because the export leaves blanks and occasionally puts garbage into
/// numeric columns. The target/coverage columns are absent from older
/// extracts, so they additionally default to `None` when the column is
/// missing entirely.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "线索3级来源")]
    pub source: Option<String>,
    #[serde(rename = "cdbid")]
    pub account_id: Option<String>,
    #[serde(rename = "leadsid 的计数")]
    pub leads_count: Option<String>,
    #[serde(rename = "IQL#")]
    pub iql: Option<String>,
    #[serde(rename = "MQL#")]
    pub mql: Option<String>,
    #[serde(rename = "MQLPro#")]
    pub mql_pro: Option<String>,
    #[serde(rename = "SQL#")]
    pub sql_count: Option<String>,
    #[serde(rename = "SQL $M")]
    pub sql_value: Option<String>,
    #[serde(rename = "商机 $M")]
    pub pipeline_value: Option<String>,
    #[serde(rename = "订单 $M")]
    pub order_value: Option<String>,
    #[serde(rename = "高价值客户覆盖数", default)]
    pub coverage_count: Option<String>,
    #[serde(rename = "SQL目标", default)]
    pub sql_target: Option<String>,
    #[serde(rename = "订单目标", default)]
    pub order_target: Option<String>,
    #[serde(rename = "高价值客户覆盖目标", default)]
    pub coverage_target: Option<String>,
}

/// The composite natural key: source description, account id and the
/// funnel-stage counters. Fields are compared as the exact cell text;
/// the key is unique within one snapshot (validated during the diff).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub source: String,
    pub account_id: String,
    pub leads_count: String,
    pub iql: String,
    pub mql: String,
    pub mql_pro: String,
    pub sql_count: String,
}

/// One cleaned snapshot row: the natural key plus coerced metric fields.
#[derive(Debug, Clone)]
pub struct Record {
    pub key: RecordKey,
    pub sql_value: Option<f64>,
    pub pipeline_value: Option<f64>,
    pub order_value: Option<f64>,
    pub coverage_count: Option<f64>,
    pub sql_target: Option<f64>,
    pub order_target: Option<f64>,
    pub coverage_target: Option<f64>,
}

/// The complete record set for one category and one reporting period.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub category: String,
    pub period: NaiveDate,
    pub records: Vec<Record>,
}

/// A current-period record joined against the previous period: current
/// metrics, null-propagating deltas, the new-row flag, the extracted
/// area phrase and its resolved region, and the per-record rates.
#[derive(Debug, Clone)]
pub struct MergedRecord {
    pub key: RecordKey,
    /// Trailing segment of the source text after the last delimiter.
    pub area: String,
    /// One of the configured region names, or `""` when unresolved.
    pub region: String,
    pub sql_value: Option<f64>,
    pub pipeline_value: Option<f64>,
    pub order_value: Option<f64>,
    pub coverage_count: Option<f64>,
    pub sql_target: Option<f64>,
    pub order_target: Option<f64>,
    pub coverage_target: Option<f64>,
    /// Deltas carry the rounding policy: two decimals, near-zero → null.
    pub sql_delta: Option<f64>,
    pub pipeline_delta: Option<f64>,
    pub order_delta: Option<f64>,
    pub is_new: bool,
    pub sql_achievement: Option<f64>,
    pub order_conversion: Option<f64>,
    pub order_achievement: Option<f64>,
}

/// Per-region aggregation of a merged record set.
///
/// Sums are plain numbers (an empty group sums to 0); delta sums and the
/// rate means stay optional. Rates are fractions here, rendered as
/// percentages only at the output boundary.
#[derive(Debug, Clone)]
pub struct RegionRollup {
    pub region: String,
    pub sql_sum: f64,
    pub pipeline_sum: f64,
    pub order_sum: f64,
    pub coverage_sum: f64,
    pub sql_delta_sum: Option<f64>,
    pub pipeline_delta_sum: Option<f64>,
    pub order_delta_sum: Option<f64>,
    pub site_count: usize,
    pub sql_achievement_mean: Option<f64>,
    pub order_conversion_mean: Option<f64>,
    pub order_achievement_mean: Option<f64>,
    pub yield_per_site: Option<f64>,
    pub yield_per_site_delta: Option<f64>,
}

/// Rendered comparison row, ready for CSV export and console preview.
/// All cells are preformatted strings; nulls render as empty cells.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ComparisonRow {
    #[serde(rename = "线索3级来源")]
    #[tabled(rename = "线索3级来源")]
    pub source: String,
    #[serde(rename = "地区")]
    #[tabled(rename = "地区")]
    pub area: String,
    #[serde(rename = "大区")]
    #[tabled(rename = "大区")]
    pub region: String,
    #[serde(rename = "cdbid")]
    #[tabled(rename = "cdbid")]
    pub account_id: String,
    #[serde(rename = "SQL#")]
    #[tabled(rename = "SQL#")]
    pub sql_count: String,
    #[serde(rename = "SQL $M")]
    #[tabled(rename = "SQL $M")]
    pub sql_value: String,
    #[serde(rename = "商机 $M")]
    #[tabled(rename = "商机 $M")]
    pub pipeline_value: String,
    #[serde(rename = "订单 $M")]
    #[tabled(rename = "订单 $M")]
    pub order_value: String,
    #[serde(rename = "SQL达成率")]
    #[tabled(rename = "SQL达成率")]
    pub sql_achievement: String,
    #[serde(rename = "订单转化率")]
    #[tabled(rename = "订单转化率")]
    pub order_conversion: String,
    #[serde(rename = "订单达成率")]
    #[tabled(rename = "订单达成率")]
    pub order_achievement: String,
    #[serde(rename = "SQL $M 差额")]
    #[tabled(rename = "SQL $M 差额")]
    pub sql_delta: String,
    #[serde(rename = "商机 $M 差额")]
    #[tabled(rename = "商机 $M 差额")]
    pub pipeline_delta: String,
    #[serde(rename = "订单 $M 差额")]
    #[tabled(rename = "订单 $M 差额")]
    pub order_delta: String,
    #[serde(rename = "高价值客户覆盖数")]
    #[tabled(rename = "高价值客户覆盖数")]
    pub coverage_count: String,
    #[serde(rename = "SQL目标")]
    #[tabled(rename = "SQL目标")]
    pub sql_target: String,
    #[serde(rename = "订单目标")]
    #[tabled(rename = "订单目标")]
    pub order_target: String,
    #[serde(rename = "高价值客户覆盖目标")]
    #[tabled(rename = "高价值客户覆盖目标")]
    pub coverage_target: String,
    #[serde(rename = "新增")]
    #[tabled(rename = "新增")]
    pub is_new: String,
}

/// Rendered per-region rollup row.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RegionRollupRow {
    #[serde(rename = "大区")]
    #[tabled(rename = "大区")]
    pub region: String,
    #[serde(rename = "SQL $M")]
    #[tabled(rename = "SQL $M")]
    pub sql_sum: String,
    #[serde(rename = "商机 $M")]
    #[tabled(rename = "商机 $M")]
    pub pipeline_sum: String,
    #[serde(rename = "订单 $M")]
    #[tabled(rename = "订单 $M")]
    pub order_sum: String,
    #[serde(rename = "高价值客户覆盖数")]
    #[tabled(rename = "高价值客户覆盖数")]
    pub coverage_sum: String,
    #[serde(rename = "SQL达成率")]
    #[tabled(rename = "SQL达成率")]
    pub sql_achievement_mean: String,
    #[serde(rename = "订单转化率")]
    #[tabled(rename = "订单转化率")]
    pub order_conversion_mean: String,
    #[serde(rename = "订单达成率")]
    #[tabled(rename = "订单达成率")]
    pub order_achievement_mean: String,
    #[serde(rename = "SQL $M 差额")]
    #[tabled(rename = "SQL $M 差额")]
    pub sql_delta_sum: String,
    #[serde(rename = "商机 $M 差额")]
    #[tabled(rename = "商机 $M 差额")]
    pub pipeline_delta_sum: String,
    #[serde(rename = "订单 $M 差额")]
    #[tabled(rename = "订单 $M 差额")]
    pub order_delta_sum: String,
    #[serde(rename = "站点数量")]
    #[tabled(rename = "站点数量")]
    pub site_count: usize,
    #[serde(rename = "单站产出")]
    #[tabled(rename = "单站产出")]
    pub yield_per_site: String,
    #[serde(rename = "较上周单站产出")]
    #[tabled(rename = "较上周单站产出")]
    pub yield_per_site_delta: String,
}

/// Per-category outcome for the run summary JSON.
#[derive(Debug, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub previous_period: NaiveDate,
    pub current_period: NaiveDate,
    pub rows: usize,
    pub new_rows: usize,
    pub unresolved_regions: usize,
    pub coercion_warnings: usize,
}

/// Whole-run summary: what succeeded, what was skipped and why.
#[derive(Debug, Serialize, Default)]
pub struct RunSummary {
    pub categories: Vec<CategoryStats>,
    pub skipped: Vec<SkippedCategory>,
}

#[derive(Debug, Serialize)]
pub struct SkippedCategory {
    pub category: String,
    pub reason: String,
}
