use chrono::NaiveDate;
use migration_lens::models::{Column, ColumnType, Dataset, Value};
use migration_lens::services::aggregator::{count_by, time_series, Granularity, SeriesRequest};
use migration_lens::services::filter::{filter, CategoryFilter, DateRange, FilterSet};
use migration_lens::services::profiler::{duplicate_report, profile};
use migration_lens::services::view::QualitySort;

fn column(name: &str, data_type: ColumnType) -> Column {
    Column { name: name.to_string(), data_type }
}

fn day(y: i32, m: u32, d: u32) -> Value {
    Value::Timestamp(NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(12, 30, 0).unwrap())
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// A deterministic export with gaps spread over every column.
fn sample_export(rows: usize) -> Dataset {
    let statuses = ["Novo", "Análise", "Liquidação", "Encerrado", "Cancelado"];
    let data = (0..rows)
        .map(|i| {
            vec![
                text(&format!("P-{}", i % 37)),
                if i % 11 == 0 { Value::Null } else { text(statuses[i % statuses.len()]) },
                if i % 13 == 0 { Value::Null } else { day(2024, (i % 12) as u32 + 1, (i % 28) as u32 + 1) },
                if i % 3 == 0 { Value::Null } else { Value::Number(i as f64 * 1.5) },
                Value::Null,
            ]
        })
        .collect();

    Dataset::new(
        vec![
            column("Operação", ColumnType::String),
            column("Status", ColumnType::String),
            column("Data", ColumnType::Datetime),
            column("Valor", ColumnType::Float),
            column("Observação", ColumnType::Empty),
        ],
        data,
    )
}

#[test]
fn missing_counts_match_cell_nulls() {
    let ds = sample_export(250);
    let report = profile(&ds, None, QualitySort::MissingDesc);
    let expected = ds.rows().iter().flatten().filter(|v| v.is_null()).count();
    assert_eq!(report.columns.iter().map(|c| c.missing_count).sum::<usize>(), expected);
    assert_eq!(report.table.missing_cells, expected);
}

#[test]
fn percentages_are_bounded_and_zero_only_without_gaps() {
    let ds = sample_export(250);
    let report = profile(&ds, None, QualitySort::Name);
    for c in &report.columns {
        assert!((0.0..=100.0).contains(&c.missing_pct), "{} out of range", c.name);
        assert_eq!(c.missing_pct == 0.0, c.missing_count == 0, "{}", c.name);
        assert!(c.distinct_count <= c.filled_count);
    }
    assert_eq!(report.table.empty_columns, 1);
}

#[test]
fn categorical_counts_cover_every_row() {
    let ds = sample_export(250);
    for c in ds.columns() {
        let counts = count_by(&ds, c).unwrap();
        assert_eq!(counts.entries.iter().map(|e| e.count).sum::<usize>(), 250);
        let sorted = counts.entries.windows(2).all(|w| w[0].count >= w[1].count);
        assert!(sorted, "{} not sorted by count", c.name);
    }
}

#[test]
fn filtering_twice_equals_filtering_once() {
    let ds = sample_export(250);
    let filters = FilterSet {
        categories: vec![CategoryFilter {
            column: "Status".into(),
            values: vec!["Novo".into(), "Encerrado".into()],
            include_missing: true,
        }],
        date_range: Some(DateRange {
            column: "Data".into(),
            start: NaiveDate::from_ymd_opt(2024, 3, 1),
            end: NaiveDate::from_ymd_opt(2024, 9, 30),
        }),
        search: Some("p-1".into()),
    };
    let once = filter(&ds, &filters).unwrap();
    let twice = filter(&once, &filters).unwrap();
    assert_eq!(once, twice);
    assert!(once.row_count() < ds.row_count());
    assert_eq!(ds.row_count(), 250);
}

#[test]
fn duplicate_ids_count_repeat_occurrences() {
    let ds = Dataset::new(
        vec![column("id", ColumnType::String)],
        ["A", "A", "B", "A", "C"].iter().map(|s| vec![text(s)]).collect(),
    );
    assert_eq!(duplicate_report(&ds, &ds.columns()[0]).unwrap().duplicate_count, 2);
}

#[test]
fn empty_dataset_reports_zeroes() {
    let ds = sample_export(0);
    let report = profile(&ds, ds.columns().first(), QualitySort::MissingDesc);
    assert_eq!(report.table.global_missing_pct, 0.0);
    assert!(report.columns.iter().all(|c| c.missing_pct == 0.0 && c.distinct_count == 0));
    assert_eq!(report.duplicates.unwrap().duplicate_count, 0);
    assert!(count_by(&ds, &ds.columns()[1]).unwrap().entries.is_empty());
}

#[test]
fn monthly_buckets_in_ascending_order() {
    let ds = Dataset::new(
        vec![column("when", ColumnType::Datetime)],
        vec![vec![day(2024, 1, 5)], vec![day(2024, 1, 20)], vec![day(2024, 2, 1)]],
    );
    let series = time_series(&ds, &ds.columns()[0], Granularity::Month, SeriesRequest::default()).unwrap();
    let buckets: Vec<(&str, usize)> = series.points.iter().map(|p| (p.label.as_str(), p.count)).collect();
    assert_eq!(buckets, vec![("2024-01", 2), ("2024-02", 1)]);
}

#[test]
fn top_n_restriction_does_not_change_counts_elsewhere() {
    let ds = sample_export(250);
    let status = ds.columns()[1].clone();
    let before = count_by(&ds, &status).unwrap();
    let series = time_series(
        &ds,
        &ds.columns()[2],
        Granularity::Month,
        SeriesRequest { category: Some(&status), top_n: Some(2) },
    )
    .unwrap();
    assert!(series.excluded > 0);
    assert_eq!(series.bucketed_total() + series.excluded + series.unbucketed, 250);
    assert_eq!(count_by(&ds, &status).unwrap(), before);
}
