// Entry point and run orchestration.
//
// One run: discover snapshot pairs in the input directory, then per
// category load both periods, diff, aggregate and render. A failure in
// one category is recorded and the remaining categories still run; the
// collected failures are reported at the end, after summary.json is
// written.
mod diff;
mod error;
mod loader;
mod output;
mod regions;
mod rollup;
mod types;
mod util;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::ReportError;
use crate::loader::CategoryPair;
use crate::regions::RegionTables;
use crate::types::{CategoryStats, RunSummary, SkippedCategory};
use crate::util::format_int;

#[derive(Parser)]
#[command(name = "funnel_report")]
#[command(about = "Week-over-week comparison of regional funnel snapshots", long_about = None)]
struct Cli {
    /// Directory containing snapshot CSVs named <category>_<YYYYMMDD>.csv
    #[arg(short, long)]
    input: PathBuf,

    /// Directory the comparison/rollup CSVs and summary.json are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Optional JSON file with a replacement city/region hierarchy
    #[arg(long)]
    regions: Option<PathBuf>,

    /// Rows to preview per table on the console
    #[arg(long, default_value_t = 5)]
    preview: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let tables = match &cli.regions {
        Some(path) => RegionTables::from_file(path)
            .with_context(|| format!("loading region tables from {}", path.display()))?,
        None => RegionTables::builtin().clone(),
    };

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("creating output directory {}", cli.output.display()))?;

    let (pairs, unpaired) = loader::discover(&cli.input)
        .with_context(|| format!("scanning {}", cli.input.display()))?;
    if pairs.is_empty() && unpaired.is_empty() {
        anyhow::bail!("no snapshot CSVs found in {}", cli.input.display());
    }

    let mut summary = RunSummary::default();
    for category in unpaired {
        summary.skipped.push(SkippedCategory {
            reason: ReportError::TooFewSnapshots { category: category.clone() }.to_string(),
            category,
        });
    }

    for pair in &pairs {
        match run_category(pair, &tables, &cli.output, cli.preview) {
            Ok(stats) => summary.categories.push(stats),
            Err(err) => summary.skipped.push(SkippedCategory {
                category: pair.category.clone(),
                reason: err.to_string(),
            }),
        }
    }

    let summary_path = cli.output.join("summary.json");
    output::write_json(&summary_path, &summary)
        .with_context(|| format!("writing {}", summary_path.display()))?;
    info!(path = %summary_path.display(), "run summary written");

    for skipped in &summary.skipped {
        error!(category = %skipped.category, "skipped: {}", skipped.reason);
    }
    if !summary.skipped.is_empty() {
        println!(
            "{} of {} categories skipped; see summary.json",
            summary.skipped.len(),
            summary.skipped.len() + summary.categories.len()
        );
    }
    Ok(())
}

/// Run the full pipeline for one category and write its two tables.
fn run_category(
    pair: &CategoryPair,
    tables: &RegionTables,
    out_dir: &Path,
    preview: usize,
) -> Result<CategoryStats, ReportError> {
    let (previous, prev_report) = loader::read_snapshot(&pair.previous, &pair.category)?;
    let (current, cur_report) = loader::read_snapshot(&pair.current, &pair.category)?;
    info!(
        category = %pair.category,
        previous = %previous.period,
        current = %current.period,
        rows = %format_int(cur_report.total_rows),
        "comparing snapshots"
    );

    let merged = diff::diff(&previous, &current, tables)?;
    let rollups = rollup::aggregate(&merged, tables);

    let comparison = output::comparison_rows(&merged);
    let comparison_path = out_dir.join(format!("{}_comparison.csv", pair.category));
    output::write_csv(&comparison_path, &comparison)?;

    let region_rows = output::rollup_rows(&rollups);
    let regions_path = out_dir.join(format!("{}_regions.csv", pair.category));
    output::write_csv(&regions_path, &region_rows)?;

    println!(
        "{}: {} vs {}",
        pair.category,
        previous.period.format("%Y-%m-%d"),
        current.period.format("%Y-%m-%d")
    );
    output::preview_table(&comparison, preview);
    output::preview_table(&region_rows, preview);
    println!(
        "(full tables exported to {} and {})\n",
        comparison_path.display(),
        regions_path.display()
    );

    Ok(CategoryStats {
        category: pair.category.clone(),
        previous_period: previous.period,
        current_period: current.period,
        rows: merged.len(),
        new_rows: merged.iter().filter(|m| m.is_new).count(),
        unresolved_regions: merged.iter().filter(|m| m.region.is_empty()).count(),
        coercion_warnings: prev_report.coercion_warnings + cur_report.coercion_warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str =
        "线索3级来源,cdbid,leadsid 的计数,IQL#,MQL#,MQLPro#,SQL#,SQL $M,商机 $M,订单 $M,SQL目标";

    #[test]
    fn end_to_end_two_period_comparison() {
        // Previous week: one row for 杭州. Current week: 杭州 grew by 0.5
        // and 福州 is brand new; both resolve to 东南大区.
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("研讨会_20250131.csv"),
            format!("{HEADER}\n渠道丨浙江杭州,c1,10,5,4,3,2,1.0,,,\n"),
        )
        .unwrap();
        fs::write(
            dir.path().join("研讨会_20250207.csv"),
            format!(
                "{HEADER}\n渠道丨浙江杭州,c1,10,5,4,3,2,1.5,,,2.0\n渠道丨福建福州,c2,8,4,3,2,1,0.9,,,1.0\n"
            ),
        )
        .unwrap();

        let (pairs, unpaired) = loader::discover(dir.path()).unwrap();
        assert!(unpaired.is_empty());
        let pair = &pairs[0];

        let (previous, _) = loader::read_snapshot(&pair.previous, &pair.category).unwrap();
        let (current, _) = loader::read_snapshot(&pair.current, &pair.category).unwrap();
        let tables = RegionTables::builtin();
        let merged = diff::diff(&previous, &current, tables).unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].region, "东南大区");
        assert_eq!(merged[0].sql_delta, Some(0.5));
        assert!(!merged[0].is_new);
        assert_eq!(merged[0].sql_achievement, Some(0.75));

        assert_eq!(merged[1].region, "东南大区");
        assert_eq!(merged[1].sql_delta, None);
        assert!(merged[1].is_new);
        assert_eq!(merged[1].sql_achievement, Some(0.9));

        let rollups = rollup::aggregate(&merged, tables);
        let southeast = &rollups[0];
        assert_eq!(southeast.region, "东南大区");
        assert_eq!(southeast.sql_sum, 2.4);
        assert_eq!(southeast.site_count, 2);
        assert_eq!(southeast.sql_delta_sum, Some(0.5));
    }

    #[test]
    fn run_category_writes_both_tables_and_counts_new_rows() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(
            dir.path().join("研讨会_20250131.csv"),
            format!("{HEADER}\n渠道丨浙江杭州,c1,10,5,4,3,2,1.0,,,\n"),
        )
        .unwrap();
        fs::write(
            dir.path().join("研讨会_20250207.csv"),
            format!("{HEADER}\n渠道丨浙江杭州,c1,10,5,4,3,2,1.5,,,\n渠道丨福建福州,c2,8,4,3,2,1,0.9,,,\n"),
        )
        .unwrap();

        let (pairs, _) = loader::discover(dir.path()).unwrap();
        let stats =
            run_category(&pairs[0], RegionTables::builtin(), out.path(), 2).unwrap();

        assert_eq!(stats.rows, 2);
        assert_eq!(stats.new_rows, 1);
        assert_eq!(stats.unresolved_regions, 0);
        assert!(out.path().join("研讨会_comparison.csv").exists());
        assert!(out.path().join("研讨会_regions.csv").exists());
    }

    #[test]
    fn schema_failure_in_one_category_is_isolated() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        // 研讨会 is fine; 创新之旅 is missing the 订单 $M column.
        fs::write(
            dir.path().join("研讨会_20250131.csv"),
            format!("{HEADER}\n渠道丨浙江杭州,c1,10,5,4,3,2,1.0,,,\n"),
        )
        .unwrap();
        fs::write(
            dir.path().join("研讨会_20250207.csv"),
            format!("{HEADER}\n渠道丨浙江杭州,c1,10,5,4,3,2,1.5,,,\n"),
        )
        .unwrap();
        let bad = "线索3级来源,cdbid,leadsid 的计数,IQL#,MQL#,MQLPro#,SQL#,SQL $M,商机 $M";
        fs::write(
            dir.path().join("创新之旅_20250131.csv"),
            format!("{bad}\nx,c1,1,1,1,1,1,1.0,\n"),
        )
        .unwrap();
        fs::write(
            dir.path().join("创新之旅_20250207.csv"),
            format!("{bad}\nx,c1,1,1,1,1,1,1.0,\n"),
        )
        .unwrap();

        let (pairs, _) = loader::discover(dir.path()).unwrap();
        let mut ok = 0;
        let mut failed = 0;
        for pair in &pairs {
            match run_category(pair, RegionTables::builtin(), out.path(), 0) {
                Ok(_) => ok += 1,
                Err(ReportError::Schema { fields, .. }) => {
                    assert_eq!(fields, vec!["订单 $M".to_string()]);
                    failed += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(failed, 1);
    }
}
