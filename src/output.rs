// Report rendering: CSV export, run-summary JSON and console previews.
//
// Everything here is presentation. Numeric values and region labels pass
// through unchanged; the only transformations are string formatting
// (two-decimal money, percentage rates, empty cells for nulls).
use std::path::Path;

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::error::Result;
use crate::types::{ComparisonRow, MergedRecord, RegionRollup, RegionRollupRow};
use crate::util::{format_money, format_pct};

pub fn comparison_rows(merged: &[MergedRecord]) -> Vec<ComparisonRow> {
    merged
        .iter()
        .map(|m| ComparisonRow {
            source: m.key.source.clone(),
            area: m.area.clone(),
            region: m.region.clone(),
            account_id: m.key.account_id.clone(),
            sql_count: m.key.sql_count.clone(),
            sql_value: format_money(m.sql_value),
            pipeline_value: format_money(m.pipeline_value),
            order_value: format_money(m.order_value),
            sql_achievement: format_pct(m.sql_achievement),
            order_conversion: format_pct(m.order_conversion),
            order_achievement: format_pct(m.order_achievement),
            sql_delta: format_money(m.sql_delta),
            pipeline_delta: format_money(m.pipeline_delta),
            order_delta: format_money(m.order_delta),
            coverage_count: format_money(m.coverage_count),
            sql_target: format_money(m.sql_target),
            order_target: format_money(m.order_target),
            coverage_target: format_money(m.coverage_target),
            is_new: if m.is_new { "是".to_string() } else { String::new() },
        })
        .collect()
}

pub fn rollup_rows(rollups: &[RegionRollup]) -> Vec<RegionRollupRow> {
    rollups
        .iter()
        .map(|r| RegionRollupRow {
            region: if r.region.is_empty() {
                "未识别".to_string()
            } else {
                r.region.clone()
            },
            sql_sum: format_money(Some(r.sql_sum)),
            pipeline_sum: format_money(Some(r.pipeline_sum)),
            order_sum: format_money(Some(r.order_sum)),
            coverage_sum: format_money(Some(r.coverage_sum)),
            sql_achievement_mean: format_pct(r.sql_achievement_mean),
            order_conversion_mean: format_pct(r.order_conversion_mean),
            order_achievement_mean: format_pct(r.order_achievement_mean),
            sql_delta_sum: format_money(r.sql_delta_sum),
            pipeline_delta_sum: format_money(r.pipeline_delta_sum),
            order_delta_sum: format_money(r.order_delta_sum),
            site_count: r.site_count,
            yield_per_site: format_money(r.yield_per_site),
            yield_per_site_delta: format_money(r.yield_per_site_delta),
        })
        .collect()
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Print the first `max_rows` rows of a table as markdown.
pub fn preview_table<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordKey, RegionRollup};

    fn rollup(region: &str) -> RegionRollup {
        RegionRollup {
            region: region.to_string(),
            sql_sum: 2.4,
            pipeline_sum: 0.0,
            order_sum: 5.0,
            coverage_sum: 0.0,
            sql_delta_sum: None,
            pipeline_delta_sum: None,
            order_delta_sum: Some(0.5),
            site_count: 2,
            sql_achievement_mean: Some(0.825),
            order_conversion_mean: None,
            order_achievement_mean: None,
            yield_per_site: Some(2.5),
            yield_per_site_delta: Some(0.25),
        }
    }

    #[test]
    fn rollup_rows_render_nulls_as_empty_cells() {
        let rows = rollup_rows(&[rollup("东南大区")]);
        assert_eq!(rows[0].sql_sum, "2.40");
        assert_eq!(rows[0].sql_delta_sum, "");
        assert_eq!(rows[0].order_delta_sum, "0.50");
        assert_eq!(rows[0].sql_achievement_mean, "82.50%");
        assert_eq!(rows[0].order_conversion_mean, "");
    }

    #[test]
    fn unresolved_region_gets_a_visible_label() {
        let rows = rollup_rows(&[rollup("")]);
        assert_eq!(rows[0].region, "未识别");
    }

    #[test]
    fn comparison_rows_keep_core_values_verbatim() {
        let merged = crate::types::MergedRecord {
            key: RecordKey {
                source: "渠道丨浙江杭州".to_string(),
                account_id: "c1".to_string(),
                leads_count: "10".to_string(),
                iql: "5".to_string(),
                mql: "4".to_string(),
                mql_pro: "3".to_string(),
                sql_count: "2".to_string(),
            },
            area: "浙江杭州".to_string(),
            region: "东南大区".to_string(),
            sql_value: Some(1.5),
            pipeline_value: None,
            order_value: Some(0.9),
            coverage_count: None,
            sql_target: Some(2.0),
            order_target: None,
            coverage_target: None,
            sql_delta: Some(0.5),
            pipeline_delta: None,
            order_delta: None,
            is_new: true,
            sql_achievement: Some(0.75),
            order_conversion: Some(0.6),
            order_achievement: None,
        };
        let rows = comparison_rows(&[merged]);
        assert_eq!(rows[0].region, "东南大区");
        assert_eq!(rows[0].area, "浙江杭州");
        assert_eq!(rows[0].sql_value, "1.50");
        assert_eq!(rows[0].pipeline_value, "");
        assert_eq!(rows[0].sql_delta, "0.50");
        assert_eq!(rows[0].sql_achievement, "75.00%");
        assert_eq!(rows[0].is_new, "是");
    }
}
