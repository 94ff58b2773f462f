//! Small helpers shared by the Diesel repositories.

/// Convert a `COUNT(*)` result into a page total.
pub fn count_to_total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

/// Convert an affected-row count into the port's `u64` counters.
pub fn affected(rows: usize) -> u64 {
    u64::try_from(rows).unwrap_or(u64::MAX)
}

/// Convert every row, stopping at the first row that fails to decode.
pub fn collect_rows<R, T, E, F>(rows: Vec<R>, map_err: F) -> Result<Vec<T>, E>
where
    T: TryFrom<R, Error = String>,
    F: Fn(String) -> E,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(&map_err))
        .collect()
}

/// `ILIKE` pattern matching `term` anywhere, with wildcards in the term
/// escaped.
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
