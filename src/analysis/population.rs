//! Breeding and roosting/rafting/hauled-out population estimates.
//!
//! Three rules run over clean survey-observation rows:
//!
//! - peak count: individuals on the best pre-cutoff day of the season
//! - nest count: third-highest weekly mean nest count, doubled
//! - rrh: mean of weekly mean counts, rounded up
//!
//! The breeding table is the nest-count rows, then the peak-count rows,
//! then the historical snapshot. The rrh table is the rrh rows, then the
//! historical snapshot.

use crate::analysis::groupings::{
    group_indices, mean_present, rank_descending_first, sum_present,
};
use crate::model::{BreedingResult, HistoricalRecord, ObservationRow, RrhResult};
use crate::species::{
    BIRDS_PER_NEST, BreedingMethod, NEST_COUNT_RANK, PEAK_COUNT_CUTOFF_M_D, Species,
    breeding_method, find_species, species_with_method,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// (group_name, survey_area, count_block, year, species)
type BlockYearKey = (String, String, i32, i32, String);

/// (group_name, survey_area, count_block, year, week, species)
type BlockWeekKey = (String, String, i32, i32, String, String);

fn block_week_key(row: &ObservationRow, species: &str) -> BlockWeekKey {
    (
        row.survey.group_name.clone(),
        row.survey.survey_area.clone(),
        row.survey.count_block,
        row.calendar.year,
        row.calendar.week.clone(),
        species.to_string(),
    )
}

fn breeding_row(key: BlockYearKey, population: Option<f64>) -> BreedingResult {
    let (group_name, survey_area, count_block, year, species) = key;
    BreedingResult {
        group_name,
        survey_area,
        count_block,
        year,
        species,
        population,
    }
}

/// Weekly means of `value` per (block, year, week, species), in key order.
/// Rows without a species are skipped.
fn weekly_means<'a, I, F>(rows: I, value: F) -> BTreeMap<BlockWeekKey, Option<f64>>
where
    I: IntoIterator<Item = &'a ObservationRow>,
    F: Fn(&ObservationRow) -> Option<f64>,
{
    let mut weeks: BTreeMap<BlockWeekKey, Vec<Option<f64>>> = BTreeMap::new();
    for row in rows {
        if let Some(species) = row.species() {
            weeks
                .entry(block_week_key(row, species))
                .or_default()
                .push(value(row));
        }
    }
    weeks
        .into_iter()
        .map(|(key, values)| (key, mean_present(values)))
        .collect()
}

// ---------------------------------------------------------------------------
// Peak count
// ---------------------------------------------------------------------------

/// Peak single-day count for peak-count species.
///
/// Keeps rows dated before the cutoff, sums counts per survey day over all
/// blocks, and returns every row of the season's highest-summing day(s)
/// with its own count as the population. Rows keep their input order.
pub fn peak_count_population(rows: &[ObservationRow]) -> Vec<BreedingResult> {
    let candidates: Vec<&ObservationRow> = rows
        .iter()
        .filter(|r| {
            r.species().and_then(breeding_method) == Some(BreedingMethod::PeakCount)
                && r.calendar.date_m_d.as_str() < PEAK_COUNT_CUTOFF_M_D
        })
        .collect();

    let mut day_sums: HashMap<(i32, &str, &str, NaiveDate), f64> = HashMap::new();
    for (key, indices) in group_indices(&candidates, |r| day_key(r)) {
        day_sums.insert(key, sum_present(indices.iter().map(|&i| candidates[i].sp_count())));
    }

    let mut season_max: HashMap<(i32, &str, &str), f64> = HashMap::new();
    for (&(year, group, area, _), &sum) in &day_sums {
        let best = season_max.entry((year, group, area)).or_insert(sum);
        if sum > *best {
            *best = sum;
        }
    }

    candidates
        .iter()
        .filter(|r| {
            let key = day_key(*r);
            let area_sum = day_sums.get(&key);
            let max = season_max.get(&(key.0, key.1, key.2));
            matches!((area_sum, max), (Some(sum), Some(max)) if sum == max)
        })
        .filter_map(|r| {
            let species = r.species()?;
            Some(breeding_row(
                (
                    r.survey.group_name.clone(),
                    r.survey.survey_area.clone(),
                    r.survey.count_block,
                    r.calendar.year,
                    species.to_string(),
                ),
                r.sp_count(),
            ))
        })
        .collect()
}

fn day_key<'a>(row: &&'a ObservationRow) -> (i32, &'a str, &'a str, NaiveDate) {
    (
        row.calendar.year,
        row.survey.group_name.as_str(),
        row.survey.survey_area.as_str(),
        row.calendar.date,
    )
}

// ---------------------------------------------------------------------------
// Nest count
// ---------------------------------------------------------------------------

/// Ranked weekly nest count for nest-count species.
///
/// Same-week surveys are averaged per block; the weekly means of each
/// block, year and species are ranked highest first (ties to the earlier
/// week) and the third-ranked week, doubled, is the population. Blocks with
/// fewer than three weeks of nest counts produce nothing.
pub fn nest_count_population(rows: &[ObservationRow]) -> Vec<BreedingResult> {
    let nesting = rows.iter().filter(|r| {
        r.species().and_then(breeding_method) == Some(BreedingMethod::NestCount)
    });
    let weekly = weekly_means(nesting, ObservationRow::nest_count);

    // Weekly entries arrive in week order within each block-year-species.
    let mut seasons: BTreeMap<BlockYearKey, Vec<Option<f64>>> = BTreeMap::new();
    for ((group, area, block, year, _week, species), mean) in weekly {
        seasons
            .entry((group, area, block, year, species))
            .or_default()
            .push(mean);
    }

    let mut results = Vec::new();
    for (key, means) in seasons {
        let ranks = rank_descending_first(&means);
        let third = ranks
            .iter()
            .position(|r| *r == Some(NEST_COUNT_RANK))
            .and_then(|i| means[i]);
        if let Some(mean) = third {
            results.push(breeding_row(key, Some(mean * BIRDS_PER_NEST)));
        }
    }
    results
}

// ---------------------------------------------------------------------------
// Roosting / rafting / hauled out
// ---------------------------------------------------------------------------

/// Annual mean of weekly mean counts per block and species, rounded up.
/// Covers every species, registered or not.
pub fn rrh_population(rows: &[ObservationRow]) -> Vec<RrhResult> {
    let weekly = weekly_means(rows, ObservationRow::sp_count);

    let mut annual: BTreeMap<BlockYearKey, Vec<Option<f64>>> = BTreeMap::new();
    for ((group, area, block, year, _week, species), mean) in weekly {
        annual
            .entry((group, area, block, year, species))
            .or_default()
            .push(mean);
    }

    annual
        .into_iter()
        .map(|((group_name, survey_area, count_block, year, species), means)| RrhResult {
            group_name,
            survey_area,
            count_block,
            year,
            species,
            rrh: mean_present(means).map(f64::ceil),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Result tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PopulationResults {
    pub breeding: Vec<BreedingResult>,
    pub rrh: Vec<RrhResult>,
}

/// All population estimates for clean rows, unioned with the historical
/// snapshot projected onto each table's schema.
pub fn population_results(
    rows: &[ObservationRow],
    historical: &[HistoricalRecord],
) -> PopulationResults {
    let mut breeding = nest_count_population(rows);
    breeding.extend(peak_count_population(rows));
    breeding.extend(historical.iter().map(BreedingResult::from));

    let mut rrh = rrh_population(rows);
    rrh.extend(historical.iter().map(RrhResult::from));

    PopulationResults { breeding, rrh }
}

/// Breeding rows per registered species, peak-count species first, then
/// nest-count species, each in registry order.
pub fn breeding_rows_by_species(
    breeding: &[BreedingResult],
) -> Vec<(&'static Species, usize)> {
    [BreedingMethod::PeakCount, BreedingMethod::NestCount]
        .into_iter()
        .flat_map(species_with_method)
        .filter_map(find_species)
        .map(|species| {
            let rows = breeding.iter().filter(|r| r.species == species.code).count();
            (species, rows)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObservationRecord, SurveyRecord};
    use crate::qaqc::derive_calendar;
    use chrono::NaiveDateTime;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn row(
        block: i32,
        start: NaiveDateTime,
        species: &str,
        sp: Option<f64>,
        nests: Option<f64>,
    ) -> ObservationRow {
        ObservationRow {
            survey: SurveyRecord {
                globalid: format!("{}-{}", block, start),
                group_name: "mcas".to_string(),
                survey_area: "shell_beach".to_string(),
                count_block: block,
                start_date: start,
                end_date: None,
                approved: Some("a".to_string()),
                visibility: Some(2),
                beaufort: Some(2),
                assessable: Some("y".to_string()),
                disturbance_obs: Some("no".to_string()),
            },
            calendar: derive_calendar(start),
            observation: Some(ObservationRecord {
                parentglobalid: None,
                species: Some(species.to_string()),
                sp_count: sp,
                nest_count: nests,
            }),
            qaqc: None,
        }
    }

    // --- Peak count ----------------------------------------------------------

    #[test]
    fn test_peak_day_rows_become_population() {
        let rows = vec![
            row(1, at(2021, 5, 1), "pigu", Some(4.0), None),
            row(2, at(2021, 5, 1), "pigu", Some(3.0), None),
            row(1, at(2021, 5, 20), "pigu", Some(10.0), None),
            row(2, at(2021, 5, 20), "pigu", Some(2.0), None),
        ];
        let results = peak_count_population(&rows);
        let shape: Vec<_> = results
            .iter()
            .map(|r| (r.count_block, r.population))
            .collect();
        assert_eq!(shape, vec![(1, Some(10.0)), (2, Some(2.0))]);
        assert!(results.iter().all(|r| r.year == 2021 && r.species == "pigu"));
    }

    #[test]
    fn test_peak_ties_keep_every_tied_day() {
        let rows = vec![
            row(1, at(2021, 5, 1), "pigu", Some(5.0), None),
            row(1, at(2021, 5, 8), "pigu", Some(5.0), None),
        ];
        assert_eq!(peak_count_population(&rows).len(), 2);
    }

    #[test]
    fn test_peak_cutoff_compares_month_day_text() {
        // "06-1" and "06-14" sort before "06-15"; "06-2" and "06-15" do not.
        let rows = vec![
            row(1, at(2021, 6, 1), "pigu", Some(1.0), None),
            row(2, at(2021, 6, 14), "pigu", Some(1.0), None),
            row(3, at(2021, 6, 2), "pigu", Some(50.0), None),
            row(4, at(2021, 6, 15), "pigu", Some(50.0), None),
        ];
        let results = peak_count_population(&rows);
        let blocks: Vec<_> = results.iter().map(|r| r.count_block).collect();
        assert_eq!(blocks, vec![1, 2]);
    }

    #[test]
    fn test_peak_count_ignores_other_species() {
        let rows = vec![row(1, at(2021, 5, 1), "wegu", Some(40.0), None)];
        assert!(peak_count_population(&rows).is_empty());
    }

    #[test]
    fn test_peak_seasons_are_per_area_and_year() {
        let mut other_area = row(1, at(2021, 5, 2), "pigu", Some(1.0), None);
        other_area.survey.survey_area = "bodega_head".to_string();
        let rows = vec![
            row(1, at(2021, 5, 1), "pigu", Some(9.0), None),
            other_area,
            row(1, at(2022, 5, 1), "pigu", Some(2.0), None),
        ];
        assert_eq!(peak_count_population(&rows).len(), 3);
    }

    // --- Nest count ----------------------------------------------------------

    #[test]
    fn test_third_highest_week_doubled() {
        let rows = vec![
            row(3, at(2019, 5, 5), "wegu", None, Some(4.0)),
            row(3, at(2019, 5, 12), "wegu", None, Some(9.0)),
            row(3, at(2019, 5, 19), "wegu", None, Some(6.0)),
            row(3, at(2019, 5, 26), "wegu", None, Some(1.0)),
        ];
        let results = nest_count_population(&rows);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].population, Some(8.0));
        assert_eq!(results[0].count_block, 3);
    }

    #[test]
    fn test_same_week_surveys_are_averaged_first() {
        // 2019-05-05 (Sun) and 2019-05-07 (Tue) share week 18: mean 5.
        let rows = vec![
            row(1, at(2019, 5, 5), "brac", None, Some(2.0)),
            row(1, at(2019, 5, 7), "brac", None, Some(8.0)),
            row(1, at(2019, 5, 12), "brac", None, Some(7.0)),
            row(1, at(2019, 5, 19), "brac", None, Some(6.0)),
        ];
        let results = nest_count_population(&rows);
        assert_eq!(results[0].population, Some(10.0));
    }

    #[test]
    fn test_fewer_than_three_weeks_gives_no_estimate() {
        let rows = vec![
            row(1, at(2019, 5, 5), "peco", None, Some(2.0)),
            row(1, at(2019, 5, 12), "peco", None, Some(3.0)),
            row(1, at(2019, 5, 19), "peco", None, None),
        ];
        assert!(nest_count_population(&rows).is_empty());
    }

    #[test]
    fn test_nest_results_are_ordered_by_key() {
        let mut rows = Vec::new();
        for species in ["wegu", "brac"] {
            for block in [2, 1] {
                for day in [5, 12, 19] {
                    rows.push(row(block, at(2019, 5, day), species, None, Some(1.0)));
                }
            }
        }
        let keys: Vec<_> = nest_count_population(&rows)
            .into_iter()
            .map(|r| (r.count_block, r.species))
            .collect();
        assert_eq!(
            keys,
            vec![
                (1, "brac".to_string()),
                (1, "wegu".to_string()),
                (2, "brac".to_string()),
                (2, "wegu".to_string()),
            ]
        );
    }

    // --- RRH -------------------------------------------------------------------

    #[test]
    fn test_rrh_rounds_mean_of_weekly_means_up() {
        // Week 18: (2 + 4) / 2 = 3. Week 19: 3.4. Mean 3.2 -> 4.
        let rows = vec![
            row(1, at(2019, 5, 5), "harb", Some(2.0), None),
            row(1, at(2019, 5, 6), "harb", Some(4.0), None),
            row(1, at(2019, 5, 12), "harb", Some(3.4), None),
        ];
        let results = rrh_population(&rows);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rrh, Some(4.0));
    }

    #[test]
    fn test_rrh_whole_mean_is_unchanged() {
        let rows = vec![
            row(1, at(2019, 5, 5), "pigu", Some(4.0), None),
            row(1, at(2019, 5, 12), "pigu", Some(4.0), None),
        ];
        assert_eq!(rrh_population(&rows)[0].rrh, Some(4.0));
    }

    #[test]
    fn test_rrh_skips_rows_without_species() {
        let mut empty = row(1, at(2019, 5, 5), "pigu", Some(4.0), None);
        empty.observation = None;
        assert!(rrh_population(&[empty]).is_empty());
    }

    #[test]
    fn test_rrh_all_missing_counts_is_null() {
        let rows = vec![row(1, at(2019, 5, 5), "pigu", None, None)];
        assert_eq!(rrh_population(&rows)[0].rrh, None);
    }

    // --- Union -----------------------------------------------------------------

    #[test]
    fn test_union_order_and_historical_projection() {
        let mut rows = vec![row(1, at(2021, 5, 1), "pigu", Some(6.0), None)];
        for day in [2, 9, 16] {
            rows.push(row(2, at(2021, 5, day), "dcco", None, Some(3.0)));
        }
        let historical = vec![HistoricalRecord {
            group_name: "trinidad".to_string(),
            survey_area: "trinidad_head".to_string(),
            count_block: 1,
            year: 2016,
            species: "pigu".to_string(),
            population: Some(40.0),
            rrh: Some(12.0),
        }];

        let results = population_results(&rows, &historical);
        let breeding: Vec<_> = results
            .breeding
            .iter()
            .map(|r| (r.species.as_str(), r.population))
            .collect();
        assert_eq!(
            breeding,
            vec![("dcco", Some(6.0)), ("pigu", Some(6.0)), ("pigu", Some(40.0))]
        );

        let last = results.rrh.last().expect("historical rrh row");
        assert_eq!(last.group_name, "trinidad");
        assert_eq!(last.rrh, Some(12.0));
        assert_eq!(results.rrh.len(), 3);
    }

    #[test]
    fn test_breeding_rows_counted_per_registered_species() {
        let mut rows = vec![row(1, at(2021, 5, 1), "pigu", Some(6.0), None)];
        for day in [2, 9, 16] {
            rows.push(row(2, at(2021, 5, day), "dcco", None, Some(3.0)));
        }
        let results = population_results(&rows, &[]);

        let counts: Vec<_> = breeding_rows_by_species(&results.breeding)
            .into_iter()
            .map(|(species, rows)| (species.common_name, rows))
            .collect();
        assert_eq!(counts[0], ("Pigeon Guillemot", 1));
        assert!(counts.contains(&("Double-crested Cormorant", 1)));
        assert!(counts.contains(&("Western Gull", 0)));
        assert_eq!(counts.len(), 6);
    }
}
