// Week-over-week snapshot reconciliation.
//
// The current snapshot is left-outer joined onto the previous one on the
// composite natural key. The output keeps the current row order, carries
// one delta per compared metric and a new-row flag, and drops the
// previous-side values once the deltas are computed.
use std::collections::HashMap;

use crate::error::ReportError;
use crate::regions::RegionTables;
use crate::types::{MergedRecord, Record, RecordKey, Snapshot};
use crate::util::{round2_or_null, safe_div, sub_opt};

/// Join `current` against `previous` and annotate each row.
///
/// - Deltas are `current - previous`, null when either side is null,
///   never zero-by-default. The monetary rounding policy applies (two
///   decimals, near-zero to null).
/// - `is_new` is key-set membership only: a row whose key is absent from
///   the previous snapshot is new, even if all its metrics are null.
/// - The area phrase and region come from the classifier; an unresolved
///   region is `""`, silently.
/// - Derived rates are safe divisions over the current-side values.
///
/// A duplicate natural key in either snapshot is a validation error:
/// join behavior under duplicates would be arbitrary, so the category
/// is rejected instead of silently picking a match.
pub fn diff(
    previous: &Snapshot,
    current: &Snapshot,
    tables: &RegionTables,
) -> Result<Vec<MergedRecord>, ReportError> {
    let previous_by_key = index_by_key(previous)?;
    validate_unique(current)?;

    let merged = current
        .records
        .iter()
        .map(|record| {
            let prior = previous_by_key.get(&record.key).copied();
            merge_one(record, prior, tables)
        })
        .collect();
    Ok(merged)
}

fn merge_one(record: &Record, prior: Option<&Record>, tables: &RegionTables) -> MergedRecord {
    let sql_delta = round2_or_null(sub_opt(record.sql_value, prior.and_then(|p| p.sql_value)));
    let pipeline_delta = round2_or_null(sub_opt(
        record.pipeline_value,
        prior.and_then(|p| p.pipeline_value),
    ));
    let order_delta =
        round2_or_null(sub_opt(record.order_value, prior.and_then(|p| p.order_value)));

    MergedRecord {
        key: record.key.clone(),
        area: tables.area_phrase(&record.key.source),
        region: tables.classify(&record.key.source),
        sql_value: record.sql_value,
        pipeline_value: record.pipeline_value,
        order_value: record.order_value,
        coverage_count: record.coverage_count,
        sql_target: record.sql_target,
        order_target: record.order_target,
        coverage_target: record.coverage_target,
        sql_delta,
        pipeline_delta,
        order_delta,
        is_new: prior.is_none(),
        sql_achievement: safe_div(record.sql_value, record.sql_target),
        order_conversion: safe_div(record.order_value, record.sql_value),
        order_achievement: safe_div(record.order_value, record.order_target),
    }
}

fn index_by_key(snapshot: &Snapshot) -> Result<HashMap<&RecordKey, &Record>, ReportError> {
    let mut index = HashMap::with_capacity(snapshot.records.len());
    for record in &snapshot.records {
        if index.insert(&record.key, record).is_some() {
            return Err(duplicate(snapshot, &record.key));
        }
    }
    Ok(index)
}

fn validate_unique(snapshot: &Snapshot) -> Result<(), ReportError> {
    index_by_key(snapshot).map(|_| ())
}

fn duplicate(snapshot: &Snapshot, key: &RecordKey) -> ReportError {
    ReportError::DuplicateKey {
        category: snapshot.category.clone(),
        period: snapshot.period.format("%Y%m%d").to_string(),
        record_source: key.source.clone(),
    }
}
