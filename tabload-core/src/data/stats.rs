//! Column statistics used for imputation.

use crate::data::table::Value;

/// Median of `values`; the mean of the two middle values for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Most frequent non-null value.
///
/// Ties go to the smallest value under [`Value::total_cmp`], so the result
/// does not depend on row order.
pub fn mode<'a, I>(values: I) -> Option<Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut present: Vec<&Value> = values.into_iter().filter(|v| !v.is_null()).collect();
    present.sort_by(|a, b| a.total_cmp(b));

    let mut best: Option<(&Value, usize)> = None;
    let mut i = 0;
    while i < present.len() {
        let start = present[i];
        let mut run = 1;
        while i + run < present.len() && present[i + run].total_cmp(start).is_eq() {
            run += 1;
        }
        if best.is_none_or(|(_, count)| run > count) {
            best = Some((start, run));
        }
        i += run;
    }
    best.map(|(value, _)| value.clone())
}
