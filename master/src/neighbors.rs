use std::collections::{HashMap, HashSet};

use comms::{DataPoint, PointId, report::Candidates};
use knn::KnnError;
use log::{debug, warn};

use crate::{MasterErr, Result};

/// The candidate neighbors gathered for every query across all workers.
#[derive(Debug)]
pub struct NeighborSets {
    order: Vec<PointId>,
    sets: HashMap<PointId, Vec<DataPoint>>,
}

impl NeighborSets {
    /// Creates an empty set for every query.
    pub fn new(queries: &[DataPoint]) -> Self {
        let order: Vec<_> = queries.iter().map(|query| query.id().clone()).collect();
        let sets = order.iter().map(|id| (id.clone(), Vec::new())).collect();

        Self { order, sets }
    }

    /// Adds a worker's report to the sets.
    ///
    /// The report must hold exactly one entry per query, nothing is merged otherwise.
    ///
    /// # Arguments
    /// * `worker_id` - The worker the report came from.
    /// * `report` - Its candidates, one entry per query.
    ///
    /// # Errors
    /// `MasterErr::UnknownQuery` if the report names a query that was never sent,
    /// `MasterErr::DuplicateQuery` if it names one twice and `MasterErr::MissingQuery`
    /// if it leaves one out.
    pub fn merge(&mut self, worker_id: usize, report: Vec<Candidates>) -> Result<()> {
        self.check_report(worker_id, &report)?;

        for Candidates { query, neighbors } in report {
            if let Some(set) = self.sets.get_mut(&query) {
                set.extend(neighbors);
            }
        }

        Ok(())
    }

    fn check_report(&self, worker_id: usize, report: &[Candidates]) -> Result<()> {
        let mut seen = HashSet::with_capacity(report.len());

        for Candidates { query, .. } in report {
            if !self.sets.contains_key(query) {
                return Err(MasterErr::UnknownQuery {
                    worker_id,
                    query: query.clone(),
                });
            }

            if !seen.insert(query) {
                return Err(MasterErr::DuplicateQuery {
                    worker_id,
                    query: query.clone(),
                });
            }
        }

        match self.order.iter().find(|id| !seen.contains(id)) {
            Some(query) => Err(MasterErr::MissingQuery {
                worker_id,
                query: query.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Consumes the sets and labels every query.
    ///
    /// Each set is ranked against its query, only the `k` closest candidates vote.
    /// A query with no labeled candidate is returned as is.
    ///
    /// # Returns
    /// The classified queries, in the order of `queries`.
    pub fn finalize(mut self, queries: &[DataPoint], k: usize) -> Result<Vec<DataPoint>> {
        let mut classified = Vec::with_capacity(queries.len());

        for query in queries {
            let set = self.sets.remove(query.id()).unwrap_or_default();
            let ranked = knn::nearest(&set, query, k)?;

            match knn::majority_vote(ranked) {
                Ok(label) => {
                    debug!(query = query.id().as_str(), candidates = set.len(); "classified as {label}");
                    classified.push(query.classified(label));
                }
                Err(KnnError::EmptyVote) => {
                    warn!(query = query.id().as_str(); "no labeled neighbors, leaving unclassified");
                    classified.push(query.clone());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(classified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, features: &[f64], label: Option<&str>) -> DataPoint {
        DataPoint::with_id(
            PointId::new(id).unwrap(),
            features.to_vec(),
            label.map(str::to_string),
        )
    }

    fn report(query: &DataPoint, neighbors: &[&DataPoint]) -> Vec<Candidates> {
        vec![Candidates {
            query: query.id().clone(),
            neighbors: neighbors.iter().map(|&p| p.clone()).collect(),
        }]
    }

    #[test]
    fn reranks_merged_candidates_before_voting() {
        let query = point("q", &[20.0, 50.0], None);
        let t1 = point("t1", &[10.0, 100.0], Some("1"));
        let t2 = point("t2", &[60.0, 50.0], Some("0"));
        let t3 = point("t3", &[90.0, 20.0], Some("0"));

        let queries = [query.clone()];
        let mut sets = NeighborSets::new(&queries);
        sets.merge(0, report(&query, &[&t1, &t3, &t2])).unwrap();

        // In arrival order the first two would be a "1"/"0" tie won by "1".
        let labels = sets.finalize(&queries, 2).unwrap();
        assert_eq!(labels[0].label(), Some("0"));
        assert_eq!(labels[0].id(), query.id());
    }

    #[test]
    fn closer_candidates_from_later_workers_win() {
        let query = point("q", &[0.0], None);
        let far = [
            point("a1", &[10.0], Some("a")),
            point("a2", &[11.0], Some("a")),
        ];
        let near = [
            point("b1", &[1.0], Some("b")),
            point("b2", &[2.0], Some("b")),
        ];

        let queries = [query.clone()];
        let mut sets = NeighborSets::new(&queries);
        sets.merge(0, report(&query, &[&far[0], &far[1]])).unwrap();
        sets.merge(1, report(&query, &[&near[0], &near[1]])).unwrap();

        let labels = sets.finalize(&queries, 2).unwrap();
        assert_eq!(labels[0].label(), Some("b"));
    }

    #[test]
    fn ties_go_to_the_lower_worker() {
        let query = point("q", &[0.0], None);
        let left = point("l", &[-1.0], Some("left"));
        let right = point("r", &[1.0], Some("right"));

        let queries = [query.clone()];
        let mut sets = NeighborSets::new(&queries);
        sets.merge(0, report(&query, &[&left])).unwrap();
        sets.merge(1, report(&query, &[&right])).unwrap();

        let labels = sets.finalize(&queries, 2).unwrap();
        assert_eq!(labels[0].label(), Some("left"));
    }

    #[test]
    fn query_without_candidates_stays_unlabeled() {
        let q1 = point("q1", &[0.0], None);
        let q2 = point("q2", &[5.0], None);
        let t = point("t", &[4.0], Some("x"));

        let queries = [q1.clone(), q2.clone()];
        let mut sets = NeighborSets::new(&queries);
        let mut both = report(&q1, &[]);
        both.extend(report(&q2, &[&t]));
        sets.merge(0, both).unwrap();

        let labels = sets.finalize(&queries, 3).unwrap();
        assert_eq!(labels[0], q1);
        assert_eq!(labels[1].label(), Some("x"));
    }

    #[test]
    fn merge_rejects_unknown_query() {
        let query = point("q", &[0.0], None);
        let stranger = point("s", &[0.0], None);

        let mut sets = NeighborSets::new(&[query]);
        let err = sets.merge(3, report(&stranger, &[])).unwrap_err();

        assert!(matches!(err, MasterErr::UnknownQuery { worker_id: 3, .. }));
    }

    #[test]
    fn merge_rejects_duplicated_query() {
        let query = point("q", &[0.0], None);
        let a = point("a", &[1.0], Some("a"));
        let b1 = point("b1", &[1.5], Some("b"));
        let b2 = point("b2", &[1.6], Some("b"));

        let queries = [query.clone()];
        let mut sets = NeighborSets::new(&queries);
        let mut twice = report(&query, &[&a, &b1]);
        twice.extend(report(&query, &[&a, &b2]));

        let err = sets.merge(0, twice).unwrap_err();
        assert!(matches!(err, MasterErr::DuplicateQuery { worker_id: 0, ref query } if query.as_str() == "q"));

        // The rejected report left nothing behind, a, b1, b2 vote "b".
        sets.merge(1, report(&query, &[&a, &b1, &b2])).unwrap();
        let labels = sets.finalize(&queries, 3).unwrap();
        assert_eq!(labels[0].label(), Some("b"));
    }

    #[test]
    fn merge_rejects_missing_query() {
        let q1 = point("q1", &[0.0], None);
        let q2 = point("q2", &[5.0], None);
        let t = point("t", &[4.0], Some("x"));

        let queries = [q1.clone(), q2.clone()];
        let mut sets = NeighborSets::new(&queries);
        let err = sets.merge(2, report(&q2, &[&t])).unwrap_err();

        assert!(matches!(err, MasterErr::MissingQuery { worker_id: 2, ref query } if query.as_str() == "q1"));
    }

    #[test]
    fn neighbor_of_other_dimension_fails_finalize() {
        let query = point("q", &[0.0, 0.0], None);
        let flat = point("t", &[1.0], Some("x"));

        let queries = [query.clone()];
        let mut sets = NeighborSets::new(&queries);
        sets.merge(0, report(&query, &[&flat])).unwrap();

        let err = sets.finalize(&queries, 1).unwrap_err();
        assert!(matches!(
            err,
            MasterErr::Knn(KnnError::DimensionMismatch { left: 1, right: 2 })
        ));
    }
}
