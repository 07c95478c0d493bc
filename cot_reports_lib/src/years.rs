//! Year range resolution for a report family.

use chrono::{Datelike, Local, NaiveDate};

use crate::catalog::ReportFamily;

/// Every year with a yearly archive for `family`, ascending from its first
/// publication year through `today`'s year inclusive.
///
/// Empty when the family's first year lies after `today`.
pub fn years_for(family: &ReportFamily, today: NaiveDate) -> Vec<i32> {
    (family.first_year()..=today.year()).collect()
}

/// [`years_for`] evaluated against the local calendar date.
pub fn current_years_for(family: &ReportFamily) -> Vec<i32> {
    years_for(family, today())
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}
