//! Difficulty allocation: splits each question type's count across Easy/Medium/Hard
//! in proportion to the requested difficulty mix (largest-remainder apportionment),
//! then assembles the per-request quota table.

use std::collections::BTreeMap;

use tracing::{debug, instrument, warn};

use crate::domain::{DifficultyCounts, DifficultyLevel, QuestionType, QuestionTypeCounts, QuotaCellOut};
use crate::error::{Result, ServiceError};

/// Types with at least this many questions get every difficulty represented.
const MIN_FILL_THRESHOLD: u32 = 3;

/// Apportion `total_type_questions` across difficulties following `global`.
///
/// Shares are `global[d] * total_type_questions / global.total()`. Each share is
/// split once into its floor and an integer remainder (numerator modulo the global
/// total), so ties between fractional parts compare exactly. Leftover units go to
/// the largest remainders, first in Easy→Medium→Hard order on ties. When the type
/// has three or more questions, no difficulty is left empty.
pub fn allocate(total_type_questions: u32, global: &DifficultyCounts) -> Result<DifficultyCounts> {
  if total_type_questions == 0 {
    return Ok(DifficultyCounts::default());
  }

  let global_total = u64::from(global.total());
  if global_total == 0 {
    return Err(ServiceError::AllocationInvariant { requested: total_type_questions, allocated: 0 });
  }

  let mut alloc = [0u32; 3];
  let mut remainders = [0u64; 3];
  for (i, count) in global.to_array().into_iter().enumerate() {
    let numerator = u64::from(count) * u64::from(total_type_questions);
    alloc[i] = (numerator / global_total) as u32;
    remainders[i] = numerator % global_total;
  }

  let floors: u32 = alloc.iter().sum();
  let mut used = [false; 3];
  for _ in 0..total_type_questions.saturating_sub(floors) {
    let mut best: Option<usize> = None;
    for i in 0..3 {
      if used[i] {
        continue;
      }
      if best.map_or(true, |b| remainders[i] > remainders[b]) {
        best = Some(i);
      }
    }
    let Some(i) = best else { break };
    alloc[i] += 1;
    used[i] = true;
  }

  if total_type_questions >= MIN_FILL_THRESHOLD {
    while let Some(zero) = alloc.iter().position(|&n| n == 0) {
      let largest = index_of_largest(&alloc);
      if alloc[largest] < 2 {
        break;
      }
      alloc[largest] -= 1;
      alloc[zero] += 1;
    }
  }

  let allocated: u32 = alloc.iter().sum();
  if allocated != total_type_questions {
    return Err(ServiceError::AllocationInvariant { requested: total_type_questions, allocated });
  }
  Ok(DifficultyCounts::from_array(alloc))
}

// First index wins on ties.
fn index_of_largest(values: &[u32; 3]) -> usize {
  let mut best = 0;
  for i in 1..values.len() {
    if values[i] > values[best] {
      best = i;
    }
  }
  best
}

/// Target count per (question type, difficulty) cell for one request.
///
/// Iteration follows declaration order: type outer, difficulty inner.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuotaTable {
  cells: BTreeMap<(QuestionType, DifficultyLevel), u32>,
}

impl QuotaTable {
  /// Allocate every type, then reconcile difficulty columns toward `difficulties`
  /// without changing any type's total or breaking its minimum fill.
  #[instrument(level = "debug", target = "generation", skip_all, fields(total = types.total()))]
  pub fn build(types: &QuestionTypeCounts, difficulties: &DifficultyCounts) -> Result<Self> {
    let mut table = QuotaTable::default();
    for qt in QuestionType::ALL {
      let split = allocate(types.get(qt), difficulties)?;
      for level in DifficultyLevel::ALL {
        table.cells.insert((qt, level), split.get(level));
      }
    }

    while let Some((qt, from, to)) = table.next_transfer(difficulties) {
      *table.cell_mut(qt, from) -= 1;
      *table.cell_mut(qt, to) += 1;
      debug!(target: "generation", question_type = %qt, %from, %to, "Moved one question between difficulties");
    }

    let realized = table.column_totals();
    if realized != *difficulties {
      warn!(
        target: "generation",
        requested = ?difficulties,
        realized = ?realized,
        "Difficulty mix cannot be matched without emptying a difficulty for some type"
      );
    }
    Ok(table)
  }

  pub fn get(&self, qt: QuestionType, level: DifficultyLevel) -> u32 {
    self.cells.get(&(qt, level)).copied().unwrap_or(0)
  }

  fn cell_mut(&mut self, qt: QuestionType, level: DifficultyLevel) -> &mut u32 {
    self.cells.entry((qt, level)).or_insert(0)
  }

  pub fn row_total(&self, qt: QuestionType) -> u32 {
    DifficultyLevel::ALL.into_iter().map(|d| self.get(qt, d)).sum()
  }

  pub fn column_total(&self, level: DifficultyLevel) -> u32 {
    QuestionType::ALL.into_iter().map(|t| self.get(t, level)).sum()
  }

  pub fn column_totals(&self) -> DifficultyCounts {
    let mut out = DifficultyCounts::default();
    for level in DifficultyLevel::ALL {
      out.add(level, self.column_total(level));
    }
    out
  }

  pub fn total(&self) -> u32 {
    self.cells.values().sum()
  }

  /// Non-zero cells in generation order.
  pub fn cells(&self) -> impl Iterator<Item = (QuestionType, DifficultyLevel, u32)> + '_ {
    self.cells.iter().filter(|(_, n)| **n > 0).map(|(&(t, d), &n)| (t, d, n))
  }

  pub fn to_out(&self) -> Vec<QuotaCellOut> {
    self
      .cells()
      .map(|(question_type, difficulty, count)| QuotaCellOut { question_type, difficulty, count })
      .collect()
  }

  fn row_floor(&self, qt: QuestionType) -> u32 {
    if self.row_total(qt) >= MIN_FILL_THRESHOLD { 1 } else { 0 }
  }

  fn next_transfer(&self, target: &DifficultyCounts) -> Option<(QuestionType, DifficultyLevel, DifficultyLevel)> {
    for from in DifficultyLevel::ALL {
      if self.column_total(from) <= target.get(from) {
        continue;
      }
      for to in DifficultyLevel::ALL {
        if self.column_total(to) >= target.get(to) {
          continue;
        }
        let mut donor: Option<QuestionType> = None;
        for qt in QuestionType::ALL {
          let n = self.get(qt, from);
          if n <= self.row_floor(qt) {
            continue;
          }
          if donor.map_or(true, |d| n > self.get(d, from)) {
            donor = Some(qt);
          }
        }
        if let Some(qt) = donor {
          return Some((qt, from, to));
        }
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn diffs(easy: u32, medium: u32, hard: u32) -> DifficultyCounts {
    DifficultyCounts { easy, medium, hard }
  }

  fn types(mc: u32, ms: u32, sd: u32, ld: u32) -> QuestionTypeCounts {
    QuestionTypeCounts { multiple_choice: mc, multiple_select: ms, short_descriptive: sd, long_descriptive: ld }
  }

  #[test]
  fn tie_goes_to_easy_then_minimum_fill_spreads() {
    // shares 1.125 / 1.125 / 0.75 -> {2,1,0} -> fill hard from easy
    let out = allocate(3, &diffs(3, 3, 2)).unwrap();
    assert_eq!(out, diffs(1, 1, 1));
  }

  #[test]
  fn zero_questions_allocate_nothing() {
    assert_eq!(allocate(0, &diffs(3, 3, 2)).unwrap(), diffs(0, 0, 0));
    assert_eq!(allocate(0, &diffs(0, 0, 0)).unwrap(), diffs(0, 0, 0));
  }

  #[test]
  fn small_types_skip_minimum_fill() {
    // 2 of 8: shares 0.75 / 0.75 / 0.5
    assert_eq!(allocate(2, &diffs(3, 3, 2)).unwrap(), diffs(1, 1, 0));
    // 1 of 8: shares 0.375 / 0.375 / 0.25
    assert_eq!(allocate(1, &diffs(3, 3, 2)).unwrap(), diffs(1, 0, 0));
  }

  #[test]
  fn largest_remainder_wins_over_order() {
    // 5 of 10 with {1,2,7}: shares 0.5 / 1.0 / 3.5 -> floors {0,1,3}, easy and hard tie at .5
    assert_eq!(allocate(5, &diffs(1, 2, 7)).unwrap(), diffs(1, 1, 3));
    // 4 of 10 with {1,2,7}: shares 0.4 / 0.8 / 2.8 -> {0,1,3}, then easy is filled from hard
    assert_eq!(allocate(4, &diffs(1, 2, 7)).unwrap(), diffs(1, 1, 2));
  }

  #[test]
  fn minimum_fill_takes_from_the_largest_bucket() {
    assert_eq!(allocate(6, &diffs(10, 0, 0)).unwrap(), diffs(4, 1, 1));
  }

  #[test]
  fn empty_global_mix_is_an_invariant_error() {
    let err = allocate(2, &diffs(0, 0, 0)).unwrap_err();
    assert!(matches!(err, ServiceError::AllocationInvariant { requested: 2, allocated: 0 }));
  }

  #[test]
  fn quota_table_matches_rows_and_columns_for_sample_request() {
    let t = types(3, 2, 2, 1);
    let d = diffs(3, 3, 2);
    let table = QuotaTable::build(&t, &d).unwrap();
    for qt in QuestionType::ALL {
      assert_eq!(table.row_total(qt), t.get(qt), "{qt}");
    }
    assert_eq!(table.column_totals(), d);
    assert_eq!(table.get(QuestionType::MultipleChoice, DifficultyLevel::Easy), 1);
    assert_eq!(table.get(QuestionType::MultipleChoice, DifficultyLevel::Hard), 1);
    assert_eq!(table.total(), 8);
  }

  #[test]
  fn quota_cells_iterate_type_outer_difficulty_inner() {
    let table = QuotaTable::build(&types(3, 0, 0, 3), &diffs(2, 2, 2)).unwrap();
    let order: Vec<_> = table.cells().map(|(t, d, _)| (t, d)).collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
    assert_eq!(order.first(), Some(&(QuestionType::MultipleChoice, DifficultyLevel::Easy)));
    assert_eq!(order.last(), Some(&(QuestionType::LongDescriptive, DifficultyLevel::Hard)));
  }

  #[test]
  fn infeasible_column_mix_keeps_minimum_fill() {
    // One type with 3 questions must cover hard even though hard was not requested.
    let table = QuotaTable::build(&types(3, 0, 0, 0), &diffs(2, 1, 0)).unwrap();
    assert_eq!(table.row_total(QuestionType::MultipleChoice), 3);
    for level in DifficultyLevel::ALL {
      assert_eq!(table.get(QuestionType::MultipleChoice, level), 1);
    }
  }

  fn arb_request() -> impl Strategy<Value = (QuestionTypeCounts, DifficultyCounts)> {
    (0u32..12, 0u32..12, 0u32..12, 0u32..11)
      .prop_filter("at least one question", |(a, b, c, d)| a + b + c + d > 0)
      .prop_flat_map(|(a, b, c, d)| {
        let total = a + b + c + d;
        (Just(types(a, b, c, d)), 0..=total).prop_flat_map(move |(t, easy)| {
          (Just(t), Just(easy), 0..=(total - easy))
            .prop_map(move |(t, easy, medium)| (t, diffs(easy, medium, total - easy - medium)))
        })
      })
  }

  proptest! {
    #[test]
    fn allocation_sums_to_the_type_count(n in 0u32..200, e in 0u32..50, m in 0u32..50, h in 0u32..50) {
      prop_assume!(e + m + h > 0);
      let out = allocate(n, &diffs(e, m, h)).unwrap();
      prop_assert_eq!(out.total(), n);
    }

    #[test]
    fn allocation_fills_every_difficulty_from_three(n in 3u32..200, e in 0u32..50, m in 0u32..50, h in 0u32..50) {
      prop_assume!(e + m + h > 0);
      let out = allocate(n, &diffs(e, m, h)).unwrap();
      prop_assert!(out.easy > 0 && out.medium > 0 && out.hard > 0, "{:?}", out);
    }

    #[test]
    fn allocation_is_deterministic(n in 0u32..200, e in 0u32..50, m in 0u32..50, h in 0u32..50) {
      prop_assume!(e + m + h > 0);
      prop_assert_eq!(allocate(n, &diffs(e, m, h)).unwrap(), allocate(n, &diffs(e, m, h)).unwrap());
    }

    #[test]
    fn quota_rows_always_match_and_columns_match_when_feasible((t, d) in arb_request()) {
      let table = QuotaTable::build(&t, &d).unwrap();
      for qt in QuestionType::ALL {
        prop_assert_eq!(table.row_total(qt), t.get(qt));
        if t.get(qt) >= 3 {
          for level in DifficultyLevel::ALL {
            prop_assert!(table.get(qt, level) > 0);
          }
        }
      }
      let filled_rows = QuestionType::ALL.into_iter().filter(|&qt| t.get(qt) >= 3).count() as u32;
      if d.easy >= filled_rows && d.medium >= filled_rows && d.hard >= filled_rows {
        prop_assert_eq!(table.column_totals(), d);
      }
    }
  }
}
