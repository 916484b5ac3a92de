use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::dataset::{normalize_region, Dataset};
use crate::error::{FiscoError, Result};

// ---------------------------------------------------------------------------
// Requests and periods
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Annual,
    Monthly,
}

/// Time bucket of a series point. Ordering is chronological within a
/// granularity; a series never mixes the two variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Period {
    Year(i32),
    Month(i32, u32),
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Year(y) => write!(f, "{y}"),
            Period::Month(y, m) => write!(f, "{y}-{m:02}"),
        }
    }
}

/// Filters and selection for one aggregation call. `region: None` means all
/// regions; `months: None` means all months.
#[derive(Debug, Clone)]
pub struct Request {
    pub region: Option<String>,
    pub years: (i32, i32),
    pub months: Option<Vec<u32>>,
    pub category: String,
    pub granularity: Granularity,
}

impl Request {
    fn validate(&self) -> Result<()> {
        let (from, to) = self.years;
        if from > to {
            return Err(FiscoError::InvalidYearRange(from, to));
        }
        Ok(())
    }

    fn matches(&self, year: i32, month: u32, region: &str) -> bool {
        if !(self.years.0..=self.years.1).contains(&year) {
            return false;
        }
        if let Some(wanted) = self.region.as_deref() {
            if !region.trim().eq_ignore_ascii_case(wanted.trim()) {
                return false;
            }
        }
        if let Some(months) = &self.months {
            if !months.contains(&month) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub period: Period,
    pub region: String,
    pub value: f64,
}

// ---------------------------------------------------------------------------
// Bucketing
// ---------------------------------------------------------------------------

/// Time-bucket the dataset under the request's filters. Annual granularity
/// sums per (year, region); monthly passes each row through untouched with
/// the category value projected out. Output is sorted period-ascending,
/// ties by region ascending. No matching rows is an empty series, not an
/// error.
pub fn bucket(ds: &Dataset, req: &Request) -> Result<Vec<SeriesPoint>> {
    req.validate()?;
    let sel = ds.catalog().resolve(&req.category)?;

    let rows = ds
        .rows()
        .iter()
        .filter(|r| req.matches(r.year, r.month, &r.region));

    match req.granularity {
        Granularity::Annual => {
            let mut sums: BTreeMap<(i32, String), f64> = BTreeMap::new();
            for r in rows {
                *sums.entry((r.year, r.region.clone())).or_default() += ds.value(r, sel);
            }
            Ok(sums
                .into_iter()
                .map(|((year, region), value)| SeriesPoint {
                    period: Period::Year(year),
                    region,
                    value,
                })
                .collect())
        }
        Granularity::Monthly => {
            let mut points: Vec<SeriesPoint> = rows
                .map(|r| SeriesPoint {
                    period: Period::Month(r.year, r.month),
                    region: r.region.clone(),
                    value: ds.value(r, sel),
                })
                .collect();
            points.sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.region.cmp(&b.region)));
            Ok(points)
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking and top-K
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RankedSeries {
    /// The input series restricted to the retained regions, original order
    /// preserved.
    pub points: Vec<SeriesPoint>,
    /// Retained regions, largest per-region sum first.
    pub regions: Vec<String>,
}

fn sums_by_region(series: &[SeriesPoint]) -> BTreeMap<&str, f64> {
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for p in series {
        *sums.entry(p.region.as_str()).or_default() += p.value;
    }
    sums
}

/// Keep only the k regions with the largest summed value across the whole
/// series. Ties resolve by ascending region code; fewer than k distinct
/// regions means all are kept. The input series itself is not consumed, so
/// callers can still use the unrestricted data.
pub fn top_k(series: &[SeriesPoint], k: usize) -> RankedSeries {
    let mut ranked: Vec<(&str, f64)> = sums_by_region(series).into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let regions: Vec<String> = ranked.iter().take(k).map(|(r, _)| r.to_string()).collect();
    let keep: BTreeSet<&str> = regions.iter().map(|s| s.as_str()).collect();
    let points = series
        .iter()
        .filter(|p| keep.contains(p.region.as_str()))
        .cloned()
        .collect();

    RankedSeries { points, regions }
}

/// Full ranking of regions (or entities) by summed value, smallest first,
/// ties by region ascending. Backs the horizontal-bar entity report.
pub fn ranking(series: &[SeriesPoint]) -> Vec<(String, f64)> {
    let mut rows: Vec<(String, f64)> = sums_by_region(series)
        .into_iter()
        .map(|(r, v)| (r.to_string(), v))
        .collect();
    rows.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

// ---------------------------------------------------------------------------
// Per-region means
// ---------------------------------------------------------------------------

/// Arithmetic mean of the category value per region over all rows matching
/// the request's filters, time granularity ignored. Region codes are
/// normalized before grouping; regions with no matching rows are absent.
pub fn mean_by_region(ds: &Dataset, req: &Request) -> Result<BTreeMap<String, f64>> {
    req.validate()?;
    let sel = ds.catalog().resolve(&req.category)?;

    let mut acc: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for r in ds.rows() {
        if !req.matches(r.year, r.month, &r.region) {
            continue;
        }
        let entry = acc.entry(normalize_region(&r.region)).or_insert((0.0, 0));
        entry.0 += ds.value(r, sel);
        entry.1 += 1;
    }

    Ok(acc
        .into_iter()
        .map(|(region, (sum, n))| (region, sum / n as f64))
        .collect())
}

// ---------------------------------------------------------------------------
// Percentage change between boundary years
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RegionChange {
    pub region: String,
    pub percent: f64,
}

/// Per-region percentage change between two boundary years, sorted
/// ascending by percent. Regions absent from either boundary, or with a
/// zero start value, are excluded rather than reported as infinite.
#[derive(Debug, Clone)]
pub struct GrowthReport {
    pub start_year: i32,
    pub end_year: i32,
    pub changes: Vec<RegionChange>,
}

impl GrowthReport {
    /// Up to three largest declines, most negative first.
    pub fn top_decliners(&self) -> Vec<&RegionChange> {
        self.changes
            .iter()
            .filter(|c| c.percent < 0.0)
            .take(3)
            .collect()
    }

    /// Up to three largest gains, ascending (largest last).
    pub fn top_gainers(&self) -> Vec<&RegionChange> {
        let gains: Vec<&RegionChange> =
            self.changes.iter().filter(|c| c.percent > 0.0).collect();
        let skip = gains.len() - gains.len().min(3);
        gains.into_iter().skip(skip).collect()
    }
}

pub fn percent_change(
    ds: &Dataset,
    req: &Request,
    start_year: i32,
    end_year: i32,
) -> Result<GrowthReport> {
    req.validate()?;
    for year in [start_year, end_year] {
        if !(req.years.0..=req.years.1).contains(&year) {
            return Err(FiscoError::NoDataForBoundaryYear {
                year,
                from: req.years.0,
                to: req.years.1,
            });
        }
    }

    let annual = bucket(
        ds,
        &Request {
            granularity: Granularity::Annual,
            ..req.clone()
        },
    )?;

    let at_year = |year: i32| -> BTreeMap<&str, f64> {
        annual
            .iter()
            .filter(|p| p.period == Period::Year(year))
            .map(|p| (p.region.as_str(), p.value))
            .collect()
    };
    let start = at_year(start_year);
    let end = at_year(end_year);

    let mut changes: Vec<RegionChange> = start
        .iter()
        .filter_map(|(region, s)| {
            let e = end.get(region)?;
            if *s == 0.0 {
                return None;
            }
            Some(RegionChange {
                region: region.to_string(),
                percent: (e - s) / s * 100.0,
            })
        })
        .collect();
    changes.sort_by(|a, b| a.percent.total_cmp(&b.percent).then_with(|| a.region.cmp(&b.region)));

    Ok(GrowthReport {
        start_year,
        end_year,
        changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawValue, SourceKind, SourceRow, SourceTable};

    fn table(kind: SourceKind, columns: &[&str], rows: Vec<SourceRow>) -> Dataset {
        Dataset::from_table(SourceTable {
            kind,
            category_columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
        .unwrap()
    }

    fn row(year: i32, month: u32, region: &str, values: &[f64]) -> SourceRow {
        SourceRow {
            year,
            month,
            region: region.to_string(),
            values: values.iter().map(|&v| RawValue::Num(v)).collect(),
        }
    }

    fn ds(rows: &[(i32, u32, &str, f64)]) -> Dataset {
        table(
            SourceKind::Federal,
            &["irpf"],
            rows.iter()
                .map(|&(y, m, uf, v)| row(y, m, uf, &[v]))
                .collect(),
        )
    }

    fn req(category: &str, years: (i32, i32)) -> Request {
        Request {
            region: None,
            years,
            months: None,
            category: category.to_string(),
            granularity: Granularity::Annual,
        }
    }

    // -- bucket --------------------------------------------------------------

    #[test]
    fn test_bucket_annual_sums_per_year_and_region() {
        let ds = ds(&[
            (2020, 1, "SP", 10.0),
            (2020, 2, "SP", 20.0),
            (2020, 1, "RJ", 5.0),
            (2021, 1, "SP", 7.0),
        ]);
        let points = bucket(&ds, &req("irpf", (2020, 2021))).unwrap();
        assert_eq!(
            points,
            vec![
                SeriesPoint { period: Period::Year(2020), region: "RJ".into(), value: 5.0 },
                SeriesPoint { period: Period::Year(2020), region: "SP".into(), value: 30.0 },
                SeriesPoint { period: Period::Year(2021), region: "SP".into(), value: 7.0 },
            ]
        );
    }

    #[test]
    fn test_bucket_monthly_is_passthrough() {
        let ds = ds(&[
            (2020, 2, "SP", 20.0),
            (2020, 1, "SP", 10.0),
            (2020, 1, "RJ", 5.0),
        ]);
        let points = bucket(
            &ds,
            &Request {
                granularity: Granularity::Monthly,
                ..req("irpf", (2020, 2020))
            },
        )
        .unwrap();
        // No aggregation: one point per source row, sorted by period then region.
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].period, Period::Month(2020, 1));
        assert_eq!(points[0].region, "RJ");
        assert_eq!(points[1].region, "SP");
        assert_eq!(points[2].period, Period::Month(2020, 2));
        assert_eq!(points[2].value, 20.0);
    }

    #[test]
    fn test_bucket_region_filter_is_case_and_space_insensitive() {
        let ds = ds(&[(2020, 1, "SP", 10.0), (2020, 1, "RJ", 5.0)]);
        let points = bucket(
            &ds,
            &Request {
                region: Some(" sp ".to_string()),
                ..req("irpf", (2020, 2020))
            },
        )
        .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].region, "SP");
    }

    #[test]
    fn test_bucket_year_range_is_inclusive() {
        let ds = ds(&[
            (2019, 1, "SP", 1.0),
            (2020, 1, "SP", 2.0),
            (2021, 1, "SP", 3.0),
            (2022, 1, "SP", 4.0),
        ]);
        let points = bucket(&ds, &req("irpf", (2020, 2021))).unwrap();
        let years: Vec<Period> = points.iter().map(|p| p.period).collect();
        assert_eq!(years, vec![Period::Year(2020), Period::Year(2021)]);
    }

    #[test]
    fn test_bucket_month_filter() {
        let ds = ds(&[
            (2020, 1, "SP", 10.0),
            (2020, 2, "SP", 20.0),
            (2020, 3, "SP", 30.0),
        ]);
        let points = bucket(
            &ds,
            &Request {
                months: Some(vec![1, 3]),
                ..req("irpf", (2020, 2020))
            },
        )
        .unwrap();
        assert_eq!(points[0].value, 40.0);
    }

    #[test]
    fn test_bucket_empty_result_is_not_an_error() {
        let ds = ds(&[(2020, 1, "SP", 10.0)]);
        let points = bucket(&ds, &req("irpf", (1990, 1999))).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_bucket_unknown_category() {
        let ds = ds(&[(2020, 1, "SP", 10.0)]);
        let err = bucket(&ds, &req("icms", (2020, 2020))).unwrap_err();
        assert!(matches!(err, FiscoError::UnknownCategory(_)), "got: {err}");
    }

    #[test]
    fn test_bucket_rejects_inverted_year_range() {
        let ds = ds(&[(2020, 1, "SP", 10.0)]);
        let err = bucket(&ds, &req("irpf", (2021, 2020))).unwrap_err();
        assert!(matches!(err, FiscoError::InvalidYearRange(2021, 2020)));
    }

    #[test]
    fn test_annual_totals_are_conserved() {
        // Sum over returned rows for a year equals the sum over source rows.
        let ds = table(
            SourceKind::Federal,
            &["irpf", "cofins"],
            vec![
                row(2020, 1, "SP", &[10.0, 1.0]),
                row(2020, 7, "SP", &[20.0, 2.0]),
                row(2020, 3, "RJ", &[5.0, 0.5]),
            ],
        );
        let points = bucket(&ds, &req("receita_total", (2020, 2020))).unwrap();
        let total: f64 = points.iter().map(|p| p.value).sum();
        assert!((total - 38.5).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_is_deterministic() {
        let ds = ds(&[
            (2020, 1, "SP", 10.0),
            (2020, 1, "RJ", 5.0),
            (2021, 2, "MG", 8.0),
        ]);
        let a = bucket(&ds, &req("irpf", (2020, 2021))).unwrap();
        let b = bucket(&ds, &req("irpf", (2020, 2021))).unwrap();
        assert_eq!(a, b);
    }

    // -- top_k ---------------------------------------------------------------

    #[test]
    fn test_top_k_keeps_largest_regions() {
        let ds = ds(&[
            (2020, 1, "SP", 100.0),
            (2020, 1, "RJ", 50.0),
            (2020, 1, "MG", 75.0),
            (2021, 1, "SP", 100.0),
        ]);
        let series = bucket(&ds, &req("irpf", (2020, 2021))).unwrap();
        let ranked = top_k(&series, 2);
        assert_eq!(ranked.regions, vec!["SP", "MG"]);
        assert!(ranked.points.iter().all(|p| p.region != "RJ"));
        // Input order preserved for the retained rows.
        assert_eq!(ranked.points.len(), 3);
        assert_eq!(series.len(), 4);
    }

    #[test]
    fn test_top_k_with_fewer_regions_returns_all() {
        let ds = ds(&[
            (2020, 1, "SP", 1.0),
            (2020, 1, "RJ", 2.0),
            (2020, 1, "MG", 3.0),
        ]);
        let series = bucket(&ds, &req("irpf", (2020, 2020))).unwrap();
        let ranked = top_k(&series, 5);
        assert_eq!(ranked.regions, vec!["MG", "RJ", "SP"]);
        assert_eq!(ranked.points.len(), 3);
    }

    #[test]
    fn test_top_k_ties_resolve_by_region_code() {
        let ds = ds(&[
            (2020, 1, "RJ", 10.0),
            (2020, 1, "SP", 10.0),
            (2020, 1, "MG", 10.0),
        ]);
        let series = bucket(&ds, &req("irpf", (2020, 2020))).unwrap();
        let ranked = top_k(&series, 2);
        assert_eq!(ranked.regions, vec!["MG", "RJ"]);
    }

    // -- ranking -------------------------------------------------------------

    #[test]
    fn test_ranking_is_ascending_with_deterministic_ties() {
        let ds = ds(&[
            (2020, 1, "SP", 100.0),
            (2020, 1, "RJ", 50.0),
            (2020, 1, "MG", 50.0),
        ]);
        let series = bucket(&ds, &req("irpf", (2020, 2020))).unwrap();
        let rows = ranking(&series);
        assert_eq!(
            rows,
            vec![
                ("MG".to_string(), 50.0),
                ("RJ".to_string(), 50.0),
                ("SP".to_string(), 100.0),
            ]
        );
    }

    // -- mean_by_region ------------------------------------------------------

    #[test]
    fn test_mean_by_region() {
        let ds = ds(&[
            (2020, 1, "SP", 10.0),
            (2020, 2, "SP", 20.0),
            (2020, 1, "RJ", 6.0),
        ]);
        let means = mean_by_region(&ds, &req("irpf", (2020, 2020))).unwrap();
        assert_eq!(means.get("SP"), Some(&15.0));
        assert_eq!(means.get("RJ"), Some(&6.0));
    }

    #[test]
    fn test_mean_by_region_merges_unnormalized_codes() {
        // Entity-kind rows skip load-time normalization, so the grouping
        // itself must merge " sp " and "SP".
        let ds = table(
            SourceKind::Entities,
            &["irpf"],
            vec![row(2020, 1, " sp ", &[10.0]), row(2020, 2, "SP", &[20.0])],
        );
        let means = mean_by_region(&ds, &req("irpf", (2020, 2020))).unwrap();
        assert_eq!(means.len(), 1);
        assert_eq!(means.get("SP"), Some(&15.0));
    }

    #[test]
    fn test_mean_by_region_absent_region_is_absent() {
        let ds = ds(&[(2020, 1, "SP", 10.0), (1999, 1, "RJ", 5.0)]);
        let means = mean_by_region(&ds, &req("irpf", (2020, 2020))).unwrap();
        assert!(!means.contains_key("RJ"));
        assert_eq!(means.len(), 1);
    }

    // -- percent_change ------------------------------------------------------

    #[test]
    fn test_percent_change_scenario() {
        let ds = ds(&[
            (2000, 1, "SP", 100.0),
            (2000, 1, "RJ", 50.0),
            (2024, 1, "SP", 300.0),
            (2024, 1, "RJ", 40.0),
        ]);
        let report = percent_change(&ds, &req("irpf", (2000, 2024)), 2000, 2024).unwrap();
        assert_eq!(report.changes.len(), 2);
        assert_eq!(report.changes[0].region, "RJ");
        assert!((report.changes[0].percent - -20.0).abs() < 1e-9);
        assert_eq!(report.changes[1].region, "SP");
        assert!((report.changes[1].percent - 200.0).abs() < 1e-9);

        let decliners = report.top_decliners();
        assert_eq!(decliners.len(), 1);
        assert_eq!(decliners[0].region, "RJ");
        let gainers = report.top_gainers();
        assert_eq!(gainers.len(), 1);
        assert_eq!(gainers[0].region, "SP");
    }

    #[test]
    fn test_percent_change_excludes_zero_start() {
        let ds = ds(&[
            (2000, 1, "SP", 0.0),
            (2024, 1, "SP", 300.0),
            (2000, 1, "RJ", 10.0),
            (2024, 1, "RJ", 20.0),
        ]);
        let report = percent_change(&ds, &req("irpf", (2000, 2024)), 2000, 2024).unwrap();
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].region, "RJ");
    }

    #[test]
    fn test_percent_change_excludes_regions_missing_a_boundary() {
        let ds = ds(&[
            (2000, 1, "SP", 100.0),
            (2024, 1, "SP", 150.0),
            (2024, 1, "TO", 80.0),
        ]);
        let report = percent_change(&ds, &req("irpf", (2000, 2024)), 2000, 2024).unwrap();
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].region, "SP");
    }

    #[test]
    fn test_percent_change_boundary_outside_range_is_an_error() {
        let ds = ds(&[(2010, 1, "SP", 10.0)]);
        let err = percent_change(&ds, &req("irpf", (2010, 2020)), 2000, 2020).unwrap_err();
        assert!(
            matches!(err, FiscoError::NoDataForBoundaryYear { year: 2000, .. }),
            "got: {err}"
        );
    }

    #[test]
    fn test_percent_change_boundary_in_range_without_rows_is_empty() {
        // 2000 is inside the requested range but no rows match it: that is a
        // sparse result, not an error.
        let ds = ds(&[(2010, 1, "SP", 10.0), (2020, 1, "SP", 15.0)]);
        let report = percent_change(&ds, &req("irpf", (2000, 2020)), 2000, 2020).unwrap();
        assert!(report.changes.is_empty());
    }

    #[test]
    fn test_percent_change_respects_region_filter() {
        let ds = ds(&[
            (2000, 1, "SP", 100.0),
            (2024, 1, "SP", 200.0),
            (2000, 1, "RJ", 100.0),
            (2024, 1, "RJ", 400.0),
        ]);
        let report = percent_change(
            &ds,
            &Request {
                region: Some("SP".to_string()),
                ..req("irpf", (2000, 2024))
            },
            2000,
            2024,
        )
        .unwrap();
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].region, "SP");
    }

    #[test]
    fn test_top_movers_cap_at_three_without_padding() {
        let rows: Vec<(i32, u32, &str, f64)> = vec![
            ("AC", 10.0),
            ("BA", 20.0),
            ("CE", 30.0),
            ("DF", 40.0),
            ("ES", 50.0),
        ]
        .into_iter()
        .flat_map(|(uf, end)| vec![(2000, 1, uf, 100.0), (2024, 1, uf, end)])
        .collect();
        let ds = ds(&rows);
        let report = percent_change(&ds, &req("irpf", (2000, 2024)), 2000, 2024).unwrap();
        // All five declined; decliners cap at 3, gainers are empty.
        assert_eq!(report.top_decliners().len(), 3);
        assert_eq!(report.top_decliners()[0].region, "AC");
        assert!(report.top_gainers().is_empty());
    }
}
