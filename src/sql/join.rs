// Nested-loop join over any number of scans
use super::ast::{Parameters, Predicate};
use crate::error::{Error, Result};
use crate::scan::{RowId, Scan, ScanState};

/// Mixed-radix counter over candidate positions.
///
/// Digit 0 turns slowest and the last digit fastest, so combinations come
/// out in lexicographic order. Any zero radix, or no radices at all, means
/// there is nothing to count.
#[derive(Debug, Clone)]
pub struct Odometer {
    radices: Vec<usize>,
    digits: Vec<usize>,
    started: bool,
    exhausted: bool,
}

impl Odometer {
    pub fn new(radices: Vec<usize>) -> Self {
        let exhausted = radices.is_empty() || radices.contains(&0);
        let digits = vec![0; radices.len()];
        Odometer {
            radices,
            digits,
            started: false,
            exhausted,
        }
    }

    /// Number of combinations the counter will produce.
    pub fn combinations(&self) -> u64 {
        if self.radices.is_empty() {
            return 0;
        }
        self.radices
            .iter()
            .fold(1u64, |acc, &r| acc.saturating_mul(r as u64))
    }

    pub fn digits(&self) -> &[usize] {
        &self.digits
    }

    /// Move to the next combination.
    ///
    /// Returns the index of the slowest digit that changed; every digit from
    /// there on may hold a new value. The first call returns `Some(0)`.
    pub fn advance(&mut self) -> Option<usize> {
        if self.exhausted {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(0);
        }

        let mut i = self.digits.len() - 1;
        loop {
            self.digits[i] += 1;
            if self.digits[i] < self.radices[i] {
                return Some(i);
            }
            self.digits[i] = 0;
            if i == 0 {
                self.exhausted = true;
                return None;
            }
            i -= 1;
        }
    }
}

impl Iterator for Odometer {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        self.advance().map(|_| self.digits.clone())
    }
}

/// Row-id tuples of the accepted combinations, one id per scan in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinIndex {
    width: usize,
    rows: Vec<Vec<RowId>>,
}

impl JoinIndex {
    pub fn new(width: usize) -> Self {
        JoinIndex {
            width,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<RowId>) {
        debug_assert_eq!(row.len(), self.width);
        self.rows.push(row);
    }

    /// Number of scans each entry covers
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[RowId]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[RowId]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Combinations the predicate was tested on
    pub combinations: u64,
    pub matches: u64,
    /// Combinations dropped because the predicate failed on them
    pub evaluation_errors: u64,
}

/// Brute-force join: tests the predicate on every combination of the scans'
/// matching rows.
///
/// Work is the product of the candidate counts, so this only suits small
/// relations or relations already narrowed by their own filters. Set
/// `with_max_combinations` to refuse joins that would run away.
pub struct NestedLoopJoin<'p> {
    predicate: &'p dyn Predicate,
    max_combinations: Option<u64>,
    stats: JoinStats,
}

impl<'p> NestedLoopJoin<'p> {
    pub fn new(predicate: &'p dyn Predicate) -> Self {
        NestedLoopJoin {
            predicate,
            max_combinations: None,
            stats: JoinStats::default(),
        }
    }

    pub fn with_max_combinations(mut self, limit: Option<u64>) -> Self {
        self.max_combinations = limit;
        self
    }

    /// Counters of the last `execute`
    pub fn stats(&self) -> JoinStats {
        self.stats
    }

    /// Enumerate every combination of the scans' matching rows and keep the
    /// ones the predicate accepts.
    ///
    /// Scans must be selected. Row reads and predicate validation abort the
    /// join; a predicate error on one combination only drops that combination.
    pub fn execute(&mut self, scans: &mut [Box<dyn Scan>]) -> Result<JoinIndex> {
        self.stats = JoinStats::default();

        for scan in scans.iter() {
            if !matches!(scan.state(), ScanState::Selected | ScanState::Reading) {
                return Err(Error::InvalidScanState {
                    relation: scan.relation_alias().to_string(),
                    operation: "join",
                    state: scan.state().to_string(),
                });
            }
        }

        self.predicate.validate()?;

        let candidates: Vec<Vec<RowId>> = scans
            .iter()
            .map(|s| s.matching_row_ids().to_vec())
            .collect();
        let mut odometer = Odometer::new(candidates.iter().map(Vec::len).collect());

        let total = odometer.combinations();
        if let Some(limit) = self.max_combinations {
            if total > limit {
                return Err(Error::JoinTooLarge {
                    combinations: total,
                    limit,
                });
            }
        }

        let mut index = JoinIndex::new(scans.len());
        let mut params = Parameters::new();

        while let Some(changed) = odometer.advance() {
            let digits = odometer.digits();
            // scans left of `changed` still hold their parameters
            for s in changed..scans.len() {
                let record = scans[s].read_row(candidates[s][digits[s]])?;
                scans[s].core().bind_parameters(&record, &mut params);
            }

            self.stats.combinations += 1;
            match self.predicate.evaluate(&params) {
                Ok(true) => {
                    self.stats.matches += 1;
                    index.push(digits.iter().zip(&candidates).map(|(&d, c)| c[d]).collect());
                }
                Ok(false) => {}
                Err(e) => {
                    self.stats.evaluation_errors += 1;
                    tracing::trace!(error = %e, "combination dropped");
                }
            }
        }

        tracing::debug!(
            scans = scans.len(),
            combinations = self.stats.combinations,
            matches = self.stats.matches,
            evaluation_errors = self.stats.evaluation_errors,
            "nested loop join finished"
        );

        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{MemoryScan, MemoryTable};
    use crate::sql::ast::{AlwaysTrue, Comparator, Condition, ConditionChain, LogicOp};
    use std::cell::Cell;
    use std::sync::Arc;

    fn scan(name: &str, alias: &str, columns: &[&str], rows: &[&[&str]]) -> Box<dyn Scan> {
        let table = MemoryTable::from_strs(columns, rows).unwrap();
        let mut scan = MemoryScan::new(name, alias, Arc::new(table));
        scan.select(None).unwrap();
        Box::new(scan)
    }

    fn orders_and_customers() -> Vec<Box<dyn Scan>> {
        vec![
            scan("orders", "o", &["id", "cust"], &[&["1", "A"], &["2", "B"]]),
            scan("customers", "c", &["id", "name"], &[&["A", "Alice"], &["B", "Bob"]]),
        ]
    }

    #[test]
    fn test_odometer_order() {
        let seen: Vec<_> = Odometer::new(vec![2, 3]).collect();
        assert_eq!(
            seen,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2],
            ]
        );
    }

    #[test]
    fn test_odometer_reports_changed_digit() {
        let mut odometer = Odometer::new(vec![2, 2]);
        assert_eq!(odometer.advance(), Some(0));
        assert_eq!(odometer.advance(), Some(1));
        assert_eq!(odometer.advance(), Some(0));
        assert_eq!(odometer.digits(), [1, 0]);
        assert_eq!(odometer.advance(), Some(1));
        assert_eq!(odometer.advance(), None);
        assert_eq!(odometer.advance(), None);
    }

    #[test]
    fn test_odometer_empty() {
        assert_eq!(Odometer::new(vec![]).count(), 0);
        assert_eq!(Odometer::new(vec![3, 0, 2]).count(), 0);
        assert_eq!(Odometer::new(vec![]).combinations(), 0);
        assert_eq!(Odometer::new(vec![usize::MAX, usize::MAX]).combinations(), u64::MAX);
    }

    #[test]
    fn test_equi_join() {
        let mut scans = orders_and_customers();
        let chain = ConditionChain::from_conditions(vec![Condition::columns(
            LogicOp::And,
            ("o", "cust"),
            Comparator::Eq,
            ("c", "id"),
        )]);
        let mut join = NestedLoopJoin::new(&chain);
        let index = join.execute(&mut scans).unwrap();

        let rows: Vec<_> = index.iter().map(<[RowId]>::to_vec).collect();
        assert_eq!(rows, vec![vec![0, 0], vec![1, 1]]);
        assert_eq!(
            join.stats(),
            JoinStats {
                combinations: 4,
                matches: 2,
                evaluation_errors: 0
            }
        );
    }

    #[test]
    fn test_single_scan_is_selection() {
        let mut scans = vec![scan("t", "t", &["a"], &[&["x"], &["y"], &["z"]])];
        let index = NestedLoopJoin::new(&AlwaysTrue).execute(&mut scans).unwrap();
        let ids: Vec<_> = index.iter().map(|r| r[0]).collect();
        assert_eq!(ids, scans[0].matching_row_ids());
    }

    #[test]
    fn test_empty_scan_yields_nothing() {
        let mut scans = vec![
            scan("t", "t", &["a"], &[&["x"]]),
            scan("u", "u", &["b"], &[]),
        ];
        let index = NestedLoopJoin::new(&AlwaysTrue).execute(&mut scans).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.width(), 2);

        let index = NestedLoopJoin::new(&AlwaysTrue).execute(&mut []).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_missing_column_excludes_combination() {
        let mut scans = orders_and_customers();
        let chain = ConditionChain::from_conditions(vec![Condition::text(
            LogicOp::And,
            ("x", "nope"),
            Comparator::Eq,
            "A",
        )]);
        let index = NestedLoopJoin::new(&chain).execute(&mut scans).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_predicate_errors_are_counted() {
        let mut scans = orders_and_customers();
        let predicate = |params: &Parameters| -> Result<bool> {
            match params.get("c.id").map(String::as_str) {
                Some("A") => Err(Error::PredicateEvaluation("boom".into())),
                _ => Ok(true),
            }
        };
        let mut join = NestedLoopJoin::new(&predicate);
        let index = join.execute(&mut scans).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(join.stats().evaluation_errors, 2);
    }

    #[test]
    fn test_invalid_predicate_is_fatal() {
        struct Broken;
        impl Predicate for Broken {
            fn validate(&self) -> Result<()> {
                Err(Error::InvalidPredicate("broken".into()))
            }
            fn evaluate(&self, _: &Parameters) -> Result<bool> {
                Ok(true)
            }
        }
        let mut scans = orders_and_customers();
        let err = NestedLoopJoin::new(&Broken).execute(&mut scans).unwrap_err();
        assert!(matches!(err, Error::InvalidPredicate(_)));
    }

    #[test]
    fn test_combination_limit() {
        let mut scans = orders_and_customers();
        let err = NestedLoopJoin::new(&AlwaysTrue)
            .with_max_combinations(Some(3))
            .execute(&mut scans)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::JoinTooLarge {
                combinations: 4,
                limit: 3
            }
        ));
    }

    #[test]
    fn test_unselected_scan_rejected() {
        let table = MemoryTable::from_strs(&["a"], &[&["x"]]).unwrap();
        let mut scans: Vec<Box<dyn Scan>> = vec![Box::new(MemoryScan::new("t", "t", Arc::new(table)))];
        let err = NestedLoopJoin::new(&AlwaysTrue).execute(&mut scans).unwrap_err();
        assert!(matches!(err, Error::InvalidScanState { .. }));
    }

    #[test]
    fn test_parameters_hold_current_combination() {
        // caching must never leak a stale value into a combination
        let mut scans = orders_and_customers();
        let seen = Cell::new(0);
        let predicate = |params: &Parameters| -> Result<bool> {
            let o = params.get("o.id").cloned().unwrap_or_default();
            let c = params.get("c.name").cloned().unwrap_or_default();
            let expected = match seen.get() {
                0 => ("1", "Alice"),
                1 => ("1", "Bob"),
                2 => ("2", "Alice"),
                _ => ("2", "Bob"),
            };
            seen.set(seen.get() + 1);
            Ok(o == expected.0 && c == expected.1)
        };
        let index = NestedLoopJoin::new(&predicate).execute(&mut scans).unwrap();
        assert_eq!(index.len(), 4);
    }
}
