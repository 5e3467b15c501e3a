// Filter-and-aggregate pipeline behind the five category tables.
//
// Pure function of (dataset, selection, options): the dataset is only
// borrowed, every table is keyed through a `BTreeMap` so output order is
// fixed by the key, never by input order.
use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;
use tracing::{info, warn};

use crate::buckets::{
    parse_transaction_date, weekday_label, weekday_number, year_month, AgeGroup, HourBandMapping,
};
use crate::error::DataQualityWarning;
use crate::selection::Selection;
use crate::types::{
    AgeRow, Dataset, Diagnostics, GenderRow, HourRow, MonthlyRow, SummaryStats, Transaction,
    WeekdayRow,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub hour_mapping: HourBandMapping,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateReport {
    pub monthly: Vec<MonthlyRow>,
    pub gender: Vec<GenderRow>,
    /// `None` when the dataset has no age column.
    pub age: Option<Vec<AgeRow>>,
    pub weekday: Vec<WeekdayRow>,
    pub hour: Vec<HourRow>,
    pub diagnostics: Diagnostics,
}

impl AggregateReport {
    pub fn warnings(&self) -> Vec<DataQualityWarning> {
        let d = &self.diagnostics;
        let mut out = Vec::new();
        if d.age_skipped {
            out.push(DataQualityWarning::AgeColumnMissing);
        }
        let counted = [
            (d.unparseable_dates, DataQualityWarning::UnparseableDates(d.unparseable_dates)),
            (d.unmapped_hours, DataQualityWarning::UnmappedHours(d.unmapped_hours)),
            (d.invalid_ages, DataQualityWarning::InvalidAges(d.invalid_ages)),
            (d.missing_ages, DataQualityWarning::MissingAges(d.missing_ages)),
            (d.unknown_sex, DataQualityWarning::UnknownSexCodes(d.unknown_sex)),
        ];
        out.extend(counted.into_iter().filter(|(n, _)| *n > 0).map(|(_, w)| w));
        out
    }

    pub fn summary(&self, selection: &Selection, filtered_amount: f64) -> SummaryStats {
        SummaryStats {
            category_major: selection.major.clone(),
            categories_minor: selection.minors.clone(),
            filtered_rows: self.diagnostics.filtered_rows,
            total_amount: filtered_amount,
            dated_amount: self.monthly.iter().map(|r| r.total_amount).sum(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// Rows under the chosen major category whose minor category is selected.
pub fn filter_records<'a>(data: &'a Dataset, selection: &Selection) -> Vec<&'a Transaction> {
    data.records
        .iter()
        .filter(|r| r.category_major == selection.major && selection.contains_minor(&r.category_minor))
        .collect()
}

// M, then F, then anything else alphabetically.
fn sex_rank(sex: &str) -> u8 {
    match sex {
        "M" => 0,
        "F" => 1,
        _ => 2,
    }
}

pub fn aggregate(data: &Dataset, selection: &Selection, options: &PipelineOptions) -> AggregateReport {
    let rows = filter_records(data, selection);
    let mut diag = Diagnostics {
        filtered_rows: rows.len(),
        age_skipped: !data.has_age,
        ..Diagnostics::default()
    };

    let mut monthly: BTreeMap<(String, &str), f64> = BTreeMap::new();
    let mut gender: BTreeMap<(u8, &str, &str), f64> = BTreeMap::new();
    let mut age: BTreeMap<(AgeGroup, &str), f64> = BTreeMap::new();
    let mut weekday: BTreeMap<(u32, &'static str, &str), f64> = BTreeMap::new();
    let mut hour: BTreeMap<(u8, &'static str, &str), f64> = BTreeMap::new();

    for r in &rows {
        let minor = r.category_minor.as_str();

        *gender.entry((sex_rank(&r.sex), r.sex.as_str(), minor)).or_default() += r.amount;
        if sex_rank(&r.sex) == 2 {
            diag.unknown_sex += 1;
        }

        if data.has_age {
            match r.age.map(AgeGroup::from_age) {
                Some(Some(group)) => *age.entry((group, minor)).or_default() += r.amount,
                Some(None) => diag.invalid_ages += 1,
                None => diag.missing_ages += 1,
            }
        }

        let Some(parsed) = parse_transaction_date(&r.transaction_date) else {
            diag.unparseable_dates += 1;
            continue;
        };
        *monthly.entry((year_month(parsed.date), minor)).or_default() += r.amount;

        let day = weekday_label(parsed.date.weekday());
        *weekday.entry((weekday_number(parsed.date), day, minor)).or_default() += r.amount;

        match options.hour_mapping.band_for(r.time_band.as_deref(), Some(&parsed)) {
            Some(band) => *hour.entry((band.id(), band.label(), minor)).or_default() += r.amount,
            None => diag.unmapped_hours += 1,
        }
    }

    let report = AggregateReport {
        monthly: monthly
            .into_iter()
            .map(|((ym, minor), total)| MonthlyRow {
                year_month: ym,
                category_minor: minor.to_string(),
                total_amount: total,
            })
            .collect(),
        gender: gender
            .into_iter()
            .map(|((_, sex, minor), total)| GenderRow {
                sex: sex.to_string(),
                category_minor: minor.to_string(),
                total_amount: total,
            })
            .collect(),
        age: data.has_age.then(|| {
            age.into_iter()
                .map(|((group, minor), total)| AgeRow {
                    age_group: group.label().to_string(),
                    category_minor: minor.to_string(),
                    total_amount: total,
                })
                .collect()
        }),
        // Keyed Mon=1..Sun=7, so rows come out in calendar order.
        weekday: weekday
            .into_iter()
            .map(|((number, day, minor), total)| WeekdayRow {
                weekday: day.to_string(),
                weekday_number: number,
                category_minor: minor.to_string(),
                total_amount: total,
            })
            .collect(),
        hour: hour
            .into_iter()
            .map(|((id, label, minor), total)| HourRow {
                band_id: id,
                time_band: label.to_string(),
                category_minor: minor.to_string(),
                total_amount: total,
            })
            .collect(),
        diagnostics: diag,
    };

    for w in report.warnings() {
        warn!("{w}");
    }
    info!(
        major = %selection.major,
        minors = selection.minors.len(),
        rows = report.diagnostics.filtered_rows,
        "aggregated selection"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tx(minor: &str, date: &str, amount: f64, sex: &str, age: Option<i64>) -> Transaction {
        Transaction {
            category_major: "Food".to_string(),
            category_minor: minor.to_string(),
            transaction_date: date.to_string(),
            amount,
            sex: sex.to_string(),
            age,
            time_band: None,
        }
    }

    fn with_major(mut t: Transaction, major: &str) -> Transaction {
        t.category_major = major.to_string();
        t
    }

    fn run(records: Vec<Transaction>, has_age: bool, minors: &[&str]) -> AggregateReport {
        let data = Dataset::new(records, has_age, false);
        aggregate(&data, &Selection::new("Food", minors.iter().copied()), &PipelineOptions::default())
    }

    #[test]
    fn two_row_example() {
        let report = run(
            vec![
                tx("A", "20230115", 100.0, "M", Some(30)),
                tx("A", "20230120", 50.0, "F", Some(41)),
            ],
            true,
            &["A"],
        );
        assert_eq!(
            report.monthly,
            vec![MonthlyRow {
                year_month: "2023-01".into(),
                category_minor: "A".into(),
                total_amount: 150.0
            }]
        );
        assert_eq!(
            report.gender,
            vec![
                GenderRow { sex: "M".into(), category_minor: "A".into(), total_amount: 100.0 },
                GenderRow { sex: "F".into(), category_minor: "A".into(), total_amount: 50.0 },
            ]
        );
        assert_eq!(report.warnings(), vec![DataQualityWarning::UnmappedHours(2)]);
    }

    #[test]
    fn filter_keeps_only_selected_categories() {
        let data = Dataset::new(
            vec![
                tx("A", "20230115", 1.0, "M", None),
                tx("B", "20230115", 2.0, "M", None),
                with_major(tx("A", "20230115", 4.0, "M", None), "Retail"),
                tx("C", "20230115", 8.0, "F", None),
            ],
            false,
            false,
        );
        let sel = Selection::new("Food", ["A", "C"]);
        let rows = filter_records(&data, &sel);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.category_major == "Food" && sel.contains_minor(&r.category_minor)));
        // The source is untouched.
        assert_eq!(data.records.len(), 4);
    }

    #[test]
    fn monthly_total_matches_dated_rows() {
        let report = run(
            vec![
                tx("A", "20230115", 10.0, "M", None),
                tx("B", "20230302", 20.0, "F", None),
                tx("A", "20230211", 30.0, "M", None),
                tx("A", "not-a-date", 1000.0, "M", None),
                tx("B", "20230131", 40.0, "F", None),
            ],
            false,
            &["A", "B"],
        );
        let total: f64 = report.monthly.iter().map(|r| r.total_amount).sum();
        assert_eq!(total, 100.0);
        let keys: Vec<(&str, &str)> = report
            .monthly
            .iter()
            .map(|r| (r.year_month.as_str(), r.category_minor.as_str()))
            .collect();
        assert_eq!(keys, vec![("2023-01", "A"), ("2023-01", "B"), ("2023-02", "A"), ("2023-03", "B")]);

        // Undated row still counts toward gender.
        let gender_total: f64 = report.gender.iter().map(|r| r.total_amount).sum();
        assert_eq!(gender_total, 1100.0);
        assert_eq!(report.diagnostics.unparseable_dates, 1);
        assert!(report.warnings().contains(&DataQualityWarning::UnparseableDates(1)));
    }

    #[test]
    fn weekday_is_calendar_ordered() {
        // 2023-01-16 is a Monday; insert Sunday .. Monday in reverse.
        let records: Vec<Transaction> = (16..=22)
            .rev()
            .map(|d| tx("A", &format!("202301{d}"), f64::from(d), "M", None))
            .collect();
        let report = run(records, false, &["A"]);
        let days: Vec<&str> = report.weekday.iter().map(|r| r.weekday.as_str()).collect();
        assert_eq!(days, vec!["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]);
        let numbers: Vec<u32> = report.weekday.iter().map(|r| r.weekday_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(report.weekday[0].total_amount, 16.0);
    }

    #[test]
    fn age_groups_and_exclusions() {
        let report = run(
            vec![
                tx("A", "20230115", 1.0, "M", Some(19)),
                tx("A", "20230115", 2.0, "M", Some(20)),
                tx("A", "20230115", 4.0, "M", Some(59)),
                tx("A", "20230115", 8.0, "M", Some(60)),
                tx("A", "20230115", 16.0, "M", Some(-4)),
                tx("A", "20230115", 32.0, "M", None),
            ],
            true,
            &["A"],
        );
        let age = report.age.expect("age table");
        let groups: Vec<(&str, f64)> = age.iter().map(|r| (r.age_group.as_str(), r.total_amount)).collect();
        assert_eq!(groups, vec![("<20", 1.0), ("20s", 2.0), ("50s", 4.0), ("60+", 8.0)]);
        assert_eq!(report.diagnostics.invalid_ages, 1);
        assert_eq!(report.diagnostics.missing_ages, 1);
    }

    #[test]
    fn missing_age_column_skips_only_age() {
        let report = run(vec![tx("A", "2023011509", 5.0, "M", None)], false, &["A"]);
        assert!(report.age.is_none());
        assert!(report.diagnostics.age_skipped);
        assert_eq!(report.warnings(), vec![DataQualityWarning::AgeColumnMissing]);
        assert_eq!(report.monthly.len(), 1);
        assert_eq!(report.gender.len(), 1);
        assert_eq!(report.weekday.len(), 1);
        assert_eq!(report.hour.len(), 1);
        assert_eq!(report.hour[0].time_band, "09:00–10:59");
    }

    #[test]
    fn empty_selection_yields_empty_tables() {
        let report = run(vec![tx("A", "20230115", 5.0, "M", Some(33))], true, &[]);
        assert!(report.monthly.is_empty());
        assert!(report.gender.is_empty());
        assert_eq!(report.age, Some(Vec::new()));
        assert!(report.weekday.is_empty());
        assert!(report.hour.is_empty());
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn unknown_sex_codes_pass_through() {
        let report = run(
            vec![
                tx("A", "20230115", 1.0, "F", None),
                tx("A", "20230115", 2.0, "X", None),
                tx("A", "20230115", 4.0, "M", None),
                tx("A", "20230115", 8.0, "Unknown", None),
            ],
            false,
            &["A"],
        );
        let sexes: Vec<&str> = report.gender.iter().map(|r| r.sex.as_str()).collect();
        assert_eq!(sexes, vec!["M", "F", "Unknown", "X"]);
        assert_eq!(report.diagnostics.unknown_sex, 2);
    }

    #[test]
    fn hour_mapping_policies() {
        let mut records = vec![
            tx("A", "2023011500", 1.0, "M", None),
            tx("A", "2023011510", 2.0, "M", None),
            tx("A", "2023011523", 4.0, "M", None),
            tx("A", "20230115", 8.0, "M", None),
        ];
        let mut banded = tx("A", "20230115", 16.0, "M", None);
        banded.time_band = Some("02".to_string());
        records.push(banded);
        let data = Dataset::new(records, false, true);
        let sel = Selection::new("Food", ["A"]);

        let calendar = aggregate(&data, &sel, &PipelineOptions { hour_mapping: HourBandMapping::Calendar });
        let bands: Vec<(u8, f64)> = calendar.hour.iter().map(|r| (r.band_id, r.total_amount)).collect();
        assert_eq!(bands, vec![(1, 1.0), (2, 16.0), (3, 2.0), (10, 4.0)]);
        assert_eq!(calendar.diagnostics.unmapped_hours, 1);

        let legacy = aggregate(&data, &sel, &PipelineOptions { hour_mapping: HourBandMapping::Legacy });
        let bands: Vec<(u8, f64)> = legacy.hour.iter().map(|r| (r.band_id, r.total_amount)).collect();
        assert_eq!(bands, vec![(10, 2.0)]);
        assert_eq!(legacy.diagnostics.unmapped_hours, 4);
    }

    #[test]
    fn legacy_mapping_drops_source_hour_column() {
        let csv = "\
card_tpbuz_nm_1,card_tpbuz_nm_2,ta_ymd,amt,sex,age,hour
Food,A,20230116,100,M,34,03
Food,A,20230117,50,F,41,05
";
        let (data, _) = crate::loader::read_dataset(csv.as_bytes()).unwrap();
        let sel = Selection::new("Food", ["A"]);

        let legacy = aggregate(&data, &sel, &PipelineOptions { hour_mapping: HourBandMapping::Legacy });
        assert!(legacy.hour.is_empty());
        assert_eq!(legacy.diagnostics.unmapped_hours, 2);

        let calendar = aggregate(&data, &sel, &PipelineOptions { hour_mapping: HourBandMapping::Calendar });
        let bands: Vec<(u8, f64)> = calendar.hour.iter().map(|r| (r.band_id, r.total_amount)).collect();
        assert_eq!(bands, vec![(3, 100.0), (5, 50.0)]);
    }

    #[test]
    fn output_is_independent_of_row_order() {
        let records = vec![
            tx("B", "20230210", 3.0, "F", Some(25)),
            tx("A", "20230115", 1.0, "M", Some(45)),
            tx("A", "20230117", 2.0, "F", Some(25)),
        ];
        let mut reversed = records.clone();
        reversed.reverse();
        let a = run(records, true, &["A", "B"]);
        let b = run(reversed, true, &["A", "B"]);
        assert_eq!(a.monthly, b.monthly);
        assert_eq!(a.gender, b.gender);
        assert_eq!(a.age, b.age);
        assert_eq!(a.weekday, b.weekday);
    }

    #[test]
    fn summary_reports_totals() {
        let records = vec![
            tx("A", "20230115", 10.0, "M", None),
            tx("A", "bad", 5.0, "M", None),
        ];
        let data = Dataset::new(records, false, false);
        let sel = Selection::new("Food", ["A"]);
        let report = aggregate(&data, &sel, &PipelineOptions::default());
        let total: f64 = filter_records(&data, &sel).iter().map(|r| r.amount).sum();
        let summary = report.summary(&sel, total);
        assert_eq!(summary.filtered_rows, 2);
        assert_eq!(summary.total_amount, 15.0);
        assert_eq!(summary.dated_amount, 10.0);
    }
}
