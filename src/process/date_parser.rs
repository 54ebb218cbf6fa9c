use chrono::NaiveDate;

/// Accepted `Date` column formats, in priority order.
///
/// US month-first beats European day-first whenever both parse.
pub const DATE_FORMATS: [&str; 3] = ["%b %d, %Y", "%m/%d/%Y", "%d/%m/%Y"];

/// Pick the first format in [`DATE_FORMATS`] that parses every cell.
///
/// `None` cells are skipped. An all-`None` column picks the first format.
pub fn detect_date_format<'a>(cells: &[Option<&'a str>]) -> Option<&'static str> {
    DATE_FORMATS.iter().copied().find(|fmt| {
        cells
            .iter()
            .flatten()
            .all(|cell| NaiveDate::parse_from_str(cell.trim(), fmt).is_ok())
    })
}

/// Parse a whole date column under the first matching format.
///
/// Returns the chosen format and one entry per cell (`None` for empty cells).
pub fn parse_date_column(cells: &[Option<&str>]) -> Option<(&'static str, Vec<Option<NaiveDate>>)> {
    let fmt = detect_date_format(cells)?;
    let dates = cells
        .iter()
        .map(|cell| cell.and_then(|c| NaiveDate::parse_from_str(c.trim(), fmt).ok()))
        .collect();
    Some((fmt, dates))
}

/// Parse a range bound: `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
///
/// Partial bounds resolve to the first day of the period.
pub fn parse_partial_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let parts: Vec<&str> = s.split('-').collect();
    match parts.as_slice() {
        [y] if y.len() == 4 => NaiveDate::from_ymd_opt(y.parse().ok()?, 1, 1),
        [y, m] if y.len() == 4 && m.len() <= 2 => {
            NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, 1)
        }
        [_, _, _] => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
        _ => None,
    }
}
