//! Deterministic fixture data.

use chrono::{Datelike, NaiveDate};

use tasso_core::{DayRecord, EARLIEST_AVAILABLE_DATE};

/// States present in every synthetic day.
pub const STATES: &[&str] = &["Alabama", "Alaska", "New York", "Ohio", "Texas"];

/// Header of a US daily report as published.
pub const HEADER: &str = "Province_State,Country_Region,Last_Update,Lat,Long_,Confirmed,Deaths,Recovered,Active,FIPS,Incident_Rate,People_Tested,People_Hospitalized,Mortality_Rate,UID,ISO3,Testing_Rate,Hospitalization_Rate";

/// A small daily report with the quirks seen in real files: a state with cases
/// but no test count, a row without a state, and a truncated row.
pub const SAMPLE_CSV: &str = "\
Province_State,Country_Region,Last_Update,Lat,Long_,Confirmed,Deaths,Recovered,Active,FIPS,Incident_Rate,People_Tested,People_Hospitalized,Mortality_Rate,UID,ISO3,Testing_Rate,Hospitalization_Rate
Alabama,US,2020-04-12 23:18:15,32.3182,-86.9023,3563,93,,3470,1,75.98,21711,437,2.61,84000001,USA,460.30,12.26
Alaska,US,2020-04-12 23:18:15,61.3707,-152.4044,272,8,66,264,2,45.50,8038,31,2.94,84000002,USA,1344.71,11.39
New York,US,2020-04-12 23:18:15,42.1657,-74.9481,189033,9385,23887,155761,36,9656.10,461601,36789,4.96,84000036,USA,2371.35,19.46
Diamond Princess,US,2020-04-12 23:18:15,,,49,0,,49,88888,,,,0,84088888,USA,,
,US,2020-04-12 23:18:15,0,0,1,0,,1,99,0,10,0,0,0,USA,0,0
Truncated,US,2020-04-12
";

fn day_index(date: NaiveDate) -> i64 {
    (date - EARLIEST_AVAILABLE_DATE).num_days().max(0)
}

/// Synthetic cases for `state_idx` on `date`; grows by one per state per day.
#[must_use]
pub fn synthetic_cases(state_idx: usize, date: NaiveDate) -> i64 {
    let s = i64::try_from(state_idx).unwrap_or(0) + 1;
    s * 100 + day_index(date) * s
}

/// Synthetic test count for `state_idx` on `date`; never zero.
#[must_use]
pub fn synthetic_tests(state_idx: usize, date: NaiveDate) -> i64 {
    let s = i64::try_from(state_idx).unwrap_or(0) + 1;
    s * 1_000 + day_index(date) * 10 + i64::from(date.day())
}

/// One day of records for every state in `STATES`.
#[must_use]
pub fn synthetic_day(date: NaiveDate) -> Vec<DayRecord> {
    STATES
        .iter()
        .enumerate()
        .map(|(i, state)| {
            #[allow(clippy::cast_precision_loss)]
            let tests = synthetic_tests(i, date) as f64;
            DayRecord::new(date, *state, Some(synthetic_cases(i, date)), Some(tests))
        })
        .collect()
}

/// Ratio the synthetic data yields for `state_idx` on `date`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn synthetic_ratio(state_idx: usize, date: NaiveDate) -> f64 {
    synthetic_cases(state_idx, date) as f64 / synthetic_tests(state_idx, date) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_day_matches_helpers() {
        let date = NaiveDate::from_ymd_opt(2020, 5, 1).unwrap();
        let day = synthetic_day(date);
        assert_eq!(day.len(), STATES.len());
        for (i, r) in day.iter().enumerate() {
            assert_eq!(r.state, STATES[i]);
            assert_eq!(r.cases, Some(synthetic_cases(i, date)));
            assert_eq!(r.tests, Some(synthetic_tests(i, date)));
            assert_eq!(r.cases_per_test, Some(synthetic_ratio(i, date)));
        }
    }

    #[test]
    fn sample_csv_keeps_only_complete_state_rows() {
        let date = NaiveDate::from_ymd_opt(2020, 4, 12).unwrap();
        let parsed = tasso_core::parse_daily_csv(date, SAMPLE_CSV.as_bytes());
        let states: Vec<&str> = parsed.records.iter().map(|r| r.state.as_str()).collect();
        assert_eq!(
            states,
            vec!["Alabama", "Alaska", "New York", "Diamond Princess"]
        );
        assert!(SAMPLE_CSV.starts_with(HEADER));
    }
}
