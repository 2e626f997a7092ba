/// Grouping helpers shared by the QAQC filter and the aggregators.
///
/// Groups are keyed by any `Ord` key and iterate in key order. Row indices
/// inside a group keep their input order, which the tie-break rules rely on.
/// Reductions skip missing values the way the survey analysis always has:
/// a sum of nothing is zero, a mean of nothing is missing.

use std::collections::BTreeMap;

/// Indices of `rows` grouped by `key`, groups in key order.
pub fn group_indices<T, K, F>(rows: &[T], key: F) -> BTreeMap<K, Vec<usize>>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        groups.entry(key(row)).or_default().push(i);
    }
    groups
}

/// Sum of the present values; zero when none are present.
pub fn sum_present<I>(values: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    values.into_iter().flatten().sum()
}

/// Mean of the present values; `None` when none are present.
pub fn mean_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, n) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { None } else { Some(sum / n as f64) }
}

/// Descending rank of each value (1 = largest). Equal values are ranked in
/// input order. Missing values get no rank.
pub fn rank_descending_first(values: &[Option<f64>]) -> Vec<Option<usize>> {
    let mut order: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    // sort_by is stable, so ties stay in input order
    order.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut ranks = vec![None; values.len()];
    for (rank, (i, _)) in order.into_iter().enumerate() {
        ranks[i] = Some(rank + 1);
    }
    ranks
}
