//! Flat `(N, B, F)` slices of haystack records for spreadsheet work.

use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::record::Dataset;

/// One row of a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetRow {
    #[serde(rename = "N")]
    pub n: u64,
    #[serde(rename = "B")]
    pub budget: u64,
    #[serde(rename = "F")]
    pub visited: u64,
}

/// Every trial requesting exactly `k` results, with its build's pool size.
pub fn budget_slice(dataset: &Dataset, k: u64) -> Vec<BudgetRow> {
    dataset
        .builds
        .iter()
        .flat_map(|build| {
            build
                .trials
                .iter()
                .filter(move |trial| trial.k == k)
                .map(move |trial| BudgetRow {
                    n: build.n,
                    budget: trial.budget,
                    visited: trial.visited,
                })
        })
        .collect()
}

/// Write rows as CSV with an `N,B,F` header.
pub fn write_csv<W: Write>(rows: &[BudgetRow], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row)?;
    }
    if rows.is_empty() {
        csv.write_record(["N", "B", "F"])?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Build, Trial};

    fn dataset() -> Dataset {
        let mut small = Build::new(2048);
        small.trials = vec![
            Trial { k: 1, budget: 20, visited: 807 },
            Trial { k: 5, budget: 20, visited: 900 },
            Trial { k: 1, budget: 2048, visited: 1500 },
        ];
        let mut large = Build::new(4096);
        large.trials = vec![Trial { k: 1, budget: 40, visited: 1000 }];
        Dataset::from(vec![small, large])
    }

    #[test]
    fn test_budget_slice() {
        let rows = budget_slice(&dataset(), 1);
        assert_eq!(
            rows,
            vec![
                BudgetRow { n: 2048, budget: 20, visited: 807 },
                BudgetRow { n: 2048, budget: 2048, visited: 1500 },
                BudgetRow { n: 4096, budget: 40, visited: 1000 },
            ]
        );
        assert!(budget_slice(&dataset(), 7).is_empty());
    }

    #[test]
    fn test_write_csv() {
        let mut out = Vec::new();
        write_csv(&budget_slice(&dataset(), 5), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "N,B,F\n2048,20,900\n");

        let mut out = Vec::new();
        write_csv(&[], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "N,B,F\n");
    }
}
