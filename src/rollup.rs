// Per-region aggregation of a merged record set.
//
// Every configured region gets a rollup, in table order, even when no
// record resolved to it; records with an unresolved region collect into
// a trailing unnamed group only when any exist. The whole module is a
// pure transform of its inputs.
use std::collections::{HashMap, HashSet};

use crate::regions::RegionTables;
use crate::types::{MergedRecord, RecordKey, RegionRollup};
use crate::util::{mean_opt, round2, round2_or_null, safe_div, sum_opt};

/// Group the merged records by region and compute the rollups.
///
/// - Value and coverage sums skip nulls and sum to 0 for an empty group.
/// - Delta sums carry the monetary rounding policy (near-zero → null).
/// - Rate columns are means of the non-null per-record fractions, null
///   when the group has none.
/// - `site_count` counts distinct natural keys, and the per-site yields
///   are safe divisions by it.
pub fn aggregate(records: &[MergedRecord], tables: &RegionTables) -> Vec<RegionRollup> {
    let mut groups: HashMap<&str, Vec<&MergedRecord>> = HashMap::new();
    for record in records {
        groups.entry(record.region.as_str()).or_default().push(record);
    }

    let mut rollups: Vec<RegionRollup> = tables
        .region_names()
        .map(|region| rollup_group(region, groups.get(region).map_or(&[][..], Vec::as_slice)))
        .collect();

    if let Some(unresolved) = groups.get("") {
        rollups.push(rollup_group("", unresolved));
    }
    rollups
}

fn rollup_group(region: &str, members: &[&MergedRecord]) -> RegionRollup {
    let sql: Vec<Option<f64>> = members.iter().map(|m| m.sql_value).collect();
    let pipeline: Vec<Option<f64>> = members.iter().map(|m| m.pipeline_value).collect();
    let order: Vec<Option<f64>> = members.iter().map(|m| m.order_value).collect();
    let coverage: Vec<Option<f64>> = members.iter().map(|m| m.coverage_count).collect();
    let sql_deltas: Vec<Option<f64>> = members.iter().map(|m| m.sql_delta).collect();
    let pipeline_deltas: Vec<Option<f64>> = members.iter().map(|m| m.pipeline_delta).collect();
    let order_deltas: Vec<Option<f64>> = members.iter().map(|m| m.order_delta).collect();

    let sites: HashSet<&RecordKey> = members.iter().map(|m| &m.key).collect();
    let site_count = sites.len();

    let order_sum = sum_opt(&order);
    let order_delta_raw = sum_opt(&order_deltas);

    RegionRollup {
        region: region.to_string(),
        sql_sum: round2(sum_opt(&sql)),
        pipeline_sum: round2(sum_opt(&pipeline)),
        order_sum: round2(order_sum),
        coverage_sum: round2(sum_opt(&coverage)),
        sql_delta_sum: round2_or_null(Some(sum_opt(&sql_deltas))),
        pipeline_delta_sum: round2_or_null(Some(sum_opt(&pipeline_deltas))),
        order_delta_sum: round2_or_null(Some(order_delta_raw)),
        site_count,
        sql_achievement_mean: mean_opt(
            &members.iter().map(|m| m.sql_achievement).collect::<Vec<_>>(),
        ),
        order_conversion_mean: mean_opt(
            &members.iter().map(|m| m.order_conversion).collect::<Vec<_>>(),
        ),
        order_achievement_mean: mean_opt(
            &members.iter().map(|m| m.order_achievement).collect::<Vec<_>>(),
        ),
        yield_per_site: per_site(order_sum, site_count),
        yield_per_site_delta: per_site(order_delta_raw, site_count),
    }
}

/// Per-site quotient: safe division by the site count, rounded to two
/// decimals but never null-replaced (a genuinely zero yield stays 0.00).
fn per_site(total: f64, site_count: usize) -> Option<f64> {
    safe_div(Some(total), Some(site_count as f64)).map(round2)
}
