// Snapshot ingestion.
//
// Extracts arrive as one CSV per category per period, named
// `<category>_<YYYYMMDD>.csv`. Within a category the two most recent
// periods become (previous, current). Header validation happens before
// any row is deserialized so a missing column is reported by name
// instead of surfacing as a row-level serde failure.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{ReportError, Result};
use crate::types::{RawRow, Record, RecordKey, Snapshot};
use crate::util::{is_coercion_miss, parse_numeric_or_null};

/// Columns that must exist in every snapshot: the natural key plus the
/// three compared metrics. Target/coverage columns are optional.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "线索3级来源",
    "cdbid",
    "leadsid 的计数",
    "IQL#",
    "MQL#",
    "MQLPro#",
    "SQL#",
    "SQL $M",
    "商机 $M",
    "订单 $M",
];

static PERIOD_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{8}").expect("valid regex"));

/// A previous/current pair of snapshot files for one category.
#[derive(Debug, Clone)]
pub struct CategoryPair {
    pub category: String,
    pub previous: SnapshotFile,
    pub current: SnapshotFile,
}

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    pub path: PathBuf,
    pub period: NaiveDate,
}

/// What happened while reading one snapshot, for the run summary.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub coercion_warnings: usize,
}

/// Scan a directory for snapshot CSVs and pair up the two most recent
/// periods of each category. Files without a valid 8-digit date token
/// are skipped with a warning; categories with a single snapshot are
/// reported so the caller can surface them, and categories are returned
/// in name order for stable output.
pub fn discover(dir: &Path) -> Result<(Vec<CategoryPair>, Vec<String>)> {
    let mut by_category: BTreeMap<String, Vec<SnapshotFile>> = BTreeMap::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(s) => s,
            None => continue,
        };
        match split_stem(stem) {
            Some((category, period)) => {
                by_category
                    .entry(category)
                    .or_default()
                    .push(SnapshotFile { path: path.clone(), period });
            }
            None => {
                warn!(file = %path.display(), "no valid YYYYMMDD token in filename; skipping");
            }
        }
    }

    let mut pairs = Vec::new();
    let mut unpaired = Vec::new();
    for (category, mut files) in by_category {
        if files.len() < 2 {
            warn!(category = %category, "only one snapshot on disk; nothing to compare");
            unpaired.push(category);
            continue;
        }
        files.sort_by_key(|f| f.period);
        let (Some(current), Some(previous)) = (files.pop(), files.pop()) else {
            continue;
        };
        debug!(
            category = %category,
            previous = %previous.period,
            current = %current.period,
            "paired snapshots"
        );
        pairs.push(CategoryPair { category, previous, current });
    }
    Ok((pairs, unpaired))
}

/// `"客户研讨会_20250207"` → (`"客户研讨会"`, 2025-02-07). The period is the
/// first 8-digit run in the stem and must be a real calendar date; the
/// category is the stem with the token and its joining separators
/// removed.
fn split_stem(stem: &str) -> Option<(String, NaiveDate)> {
    let token = PERIOD_TOKEN.find(stem)?;
    let period = NaiveDate::parse_from_str(token.as_str(), "%Y%m%d").ok()?;
    let mut category = String::new();
    category.push_str(&stem[..token.start()]);
    category.push_str(&stem[token.end()..]);
    let category = category.trim_matches(['_', '-', ' ']).to_string();
    if category.is_empty() {
        return None;
    }
    Some((category, period))
}

/// Read one snapshot file into typed records.
///
/// The header row is checked against [`REQUIRED_COLUMNS`] first; any
/// missing column fails the whole category with a schema error naming
/// every absent field. Metric cells that fail numeric coercion become
/// null and are counted, never dropped rows.
pub fn read_snapshot(
    file: &SnapshotFile,
    category: &str,
) -> Result<(Snapshot, LoadReport)> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(&file.path)?;

    let headers = reader.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ReportError::Schema {
            category: category.to_string(),
            fields: missing,
        });
    }

    let mut report = LoadReport::default();
    let mut records = Vec::new();
    for row in reader.deserialize::<RawRow>() {
        let row = row?;
        report.total_rows += 1;
        for cell in [
            row.sql_value.as_deref(),
            row.pipeline_value.as_deref(),
            row.order_value.as_deref(),
            row.coverage_count.as_deref(),
            row.sql_target.as_deref(),
            row.order_target.as_deref(),
            row.coverage_target.as_deref(),
        ] {
            if is_coercion_miss(cell) {
                report.coercion_warnings += 1;
            }
        }
        records.push(clean_row(row));
    }
    if report.coercion_warnings > 0 {
        warn!(
            category = %category,
            period = %file.period,
            misses = report.coercion_warnings,
            "non-numeric metric cells coerced to null"
        );
    }

    let snapshot = Snapshot {
        category: category.to_string(),
        period: file.period,
        records,
    };
    Ok((snapshot, report))
}

fn clean_row(row: RawRow) -> Record {
    let text = |v: Option<String>| v.unwrap_or_default().trim().to_string();
    Record {
        sql_value: parse_numeric_or_null(row.sql_value.as_deref()),
        pipeline_value: parse_numeric_or_null(row.pipeline_value.as_deref()),
        order_value: parse_numeric_or_null(row.order_value.as_deref()),
        coverage_count: parse_numeric_or_null(row.coverage_count.as_deref()),
        sql_target: parse_numeric_or_null(row.sql_target.as_deref()),
        order_target: parse_numeric_or_null(row.order_target.as_deref()),
        coverage_target: parse_numeric_or_null(row.coverage_target.as_deref()),
        key: RecordKey {
            source: text(row.source),
            account_id: text(row.account_id),
            leads_count: text(row.leads_count),
            iql: text(row.iql),
            mql: text(row.mql),
            mql_pro: text(row.mql_pro),
            sql_count: text(row.sql_count),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str =
        "线索3级来源,cdbid,leadsid 的计数,IQL#,MQL#,MQLPro#,SQL#,SQL $M,商机 $M,订单 $M";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn stem_splitting_requires_a_real_date() {
        let (category, period) = split_stem("客户研讨会_20250207").unwrap();
        assert_eq!(category, "客户研讨会");
        assert_eq!(period, NaiveDate::from_ymd_opt(2025, 2, 7).unwrap());
        assert!(split_stem("客户研讨会_20259999").is_none());
        assert!(split_stem("客户研讨会").is_none());
        assert!(split_stem("20250207").is_none());
    }

    #[test]
    fn discover_pairs_the_two_most_recent_periods() {
        let dir = TempDir::new().unwrap();
        for name in [
            "研讨会_20250131.csv",
            "研讨会_20250207.csv",
            "研讨会_20250124.csv",
            "创新之旅_20250207.csv",
            "notes.txt",
        ] {
            write(&dir, name, HEADER);
        }
        let (pairs, unpaired) = discover(dir.path()).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].category, "研讨会");
        assert_eq!(
            pairs[0].previous.period,
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
        assert_eq!(
            pairs[0].current.period,
            NaiveDate::from_ymd_opt(2025, 2, 7).unwrap()
        );
        assert_eq!(unpaired, vec!["创新之旅".to_string()]);
    }

    #[test]
    fn missing_columns_fail_with_every_offender_named() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "研讨会_20250207.csv",
            "线索3级来源,cdbid,leadsid 的计数,IQL#,MQL#,MQLPro#,SQL#,SQL $M\nx,1,2,3,4,5,6,7\n",
        );
        let file = SnapshotFile {
            path,
            period: NaiveDate::from_ymd_opt(2025, 2, 7).unwrap(),
        };
        let err = read_snapshot(&file, "研讨会").unwrap_err();
        match err {
            ReportError::Schema { category, fields } => {
                assert_eq!(category, "研讨会");
                assert_eq!(fields, vec!["商机 $M".to_string(), "订单 $M".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn garbage_metric_cells_become_null_not_dropped_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "研讨会_20250207.csv",
            &format!("{HEADER}\n渠道丨浙江杭州,c1,10,5,4,3,2,\"1,234.5\",n/a,0.9\n"),
        );
        let file = SnapshotFile {
            path,
            period: NaiveDate::from_ymd_opt(2025, 2, 7).unwrap(),
        };
        let (snapshot, report) = read_snapshot(&file, "研讨会").unwrap();
        assert_eq!(report.total_rows, 1);
        assert_eq!(report.coercion_warnings, 1);
        let record = &snapshot.records[0];
        assert_eq!(record.sql_value, Some(1234.5));
        assert_eq!(record.pipeline_value, None);
        assert_eq!(record.order_value, Some(0.9));
        assert_eq!(record.key.source, "渠道丨浙江杭州");
    }

    #[test]
    fn optional_target_columns_default_to_null() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "研讨会_20250207.csv",
            &format!("{HEADER}\n渠道丨浙江杭州,c1,10,5,4,3,2,1.5,2.0,0.9\n"),
        );
        let file = SnapshotFile {
            path,
            period: NaiveDate::from_ymd_opt(2025, 2, 7).unwrap(),
        };
        let (snapshot, _) = read_snapshot(&file, "研讨会").unwrap();
        assert_eq!(snapshot.records[0].sql_target, None);
        assert_eq!(snapshot.records[0].coverage_count, None);
    }
}
