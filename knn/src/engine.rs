use std::num::NonZeroUsize;

use comms::DataPoint;

use crate::{KnnError, Result};

/// Euclidean distance between two feature vectors.
///
/// # Errors
/// `KnnError::DimensionMismatch` if the vectors differ in length.
pub fn distance(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(KnnError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let sum: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    Ok(sum.sqrt())
}

/// Finds the `k` points of `training` closest to `query`.
///
/// # Arguments
/// * `training` - The candidate points.
/// * `query` - The point to rank against.
/// * `k` - How many points to keep.
///
/// # Returns
/// At most `k` points, ascending by distance. Equal distances keep the order
/// they have in `training`, and the whole set is returned when `k` exceeds it.
pub fn nearest<'a>(
    training: &'a [DataPoint],
    query: &DataPoint,
    k: usize,
) -> Result<Vec<&'a DataPoint>> {
    let mut ranked = training
        .iter()
        .map(|point| Ok((distance(point.features(), query.features())?, point)))
        .collect::<Result<Vec<_>>>()?;

    ranked.sort_by(|(a, _), (b, _)| a.total_cmp(b));
    ranked.truncate(k);

    Ok(ranked.into_iter().map(|(_, point)| point).collect())
}

/// The most frequent label among `points`.
///
/// Ties go to the label encountered first. Unlabeled points don't vote.
///
/// # Errors
/// `KnnError::EmptyVote` if no point carries a label.
pub fn majority_vote<'a, I>(points: I) -> Result<&'a str>
where
    I: IntoIterator<Item = &'a DataPoint>,
{
    let mut tally: Vec<(&str, usize)> = Vec::new();

    for label in points.into_iter().filter_map(DataPoint::label) {
        match tally.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, votes)) => *votes += 1,
            None => tally.push((label, 1)),
        }
    }

    let mut winner: Option<(&str, usize)> = None;
    for (label, votes) in tally {
        if winner.is_none_or(|(_, best)| votes > best) {
            winner = Some((label, votes));
        }
    }

    winner.map(|(label, _)| label).ok_or(KnnError::EmptyVote)
}

/// How many neighbors each of `workers` returns per query so the merged set can rank `k`.
pub fn local_fetch(k: usize, workers: NonZeroUsize) -> usize {
    (k / workers.get()).saturating_add(1)
}

/// Single machine classification: votes among the `k` nearest points of `training`.
pub fn classify<'a>(training: &'a [DataPoint], query: &DataPoint, k: usize) -> Result<&'a str> {
    majority_vote(nearest(training, query, k)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(features: &[f64], label: Option<&str>) -> DataPoint {
        DataPoint::new(features.to_vec(), label.map(str::to_string))
    }

    #[test]
    fn distance_is_euclidean() {
        let d = distance(&[1.0, 1.0], &[0.0, 0.0]).unwrap();
        assert_eq!(d, 2f64.sqrt());

        assert_eq!(distance(&[3.0, 4.0], &[0.0, 0.0]).unwrap(), 5.0);
        assert_eq!(distance(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = [1.5, -2.0, 7.25];
        let b = [0.0, 3.0, -1.0];

        assert_eq!(distance(&a, &b).unwrap(), distance(&b, &a).unwrap());
        assert_eq!(distance(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn distance_rejects_mismatched_dimensions() {
        assert_eq!(
            distance(&[1.0], &[1.0, 2.0]),
            Err(KnnError::DimensionMismatch { left: 1, right: 2 })
        );
    }

    #[test]
    fn nearest_returns_closest_in_order() {
        let p1 = point(&[1.0, 1.0], Some("a"));
        let p2 = point(&[0.0, 0.0], Some("b"));
        let p3 = point(&[1.0, 0.0], Some("a"));
        let training = [p3, p1.clone(), p2.clone()];
        let query = point(&[0.0, 1.0], None);

        let got = nearest(&training, &query, 2).unwrap();
        assert_eq!(got, vec![&p1, &p2]);
    }

    #[test]
    fn nearest_returns_everything_when_k_is_large() {
        let training = [point(&[5.0], Some("x")), point(&[1.0], Some("y"))];
        let query = point(&[0.0], None);

        let got = nearest(&training, &query, 10).unwrap();
        assert_eq!(got, vec![&training[1], &training[0]]);
        assert!(nearest(&[], &query, 3).unwrap().is_empty());
    }

    #[test]
    fn nearest_never_skips_a_closer_point() {
        let training: Vec<_> = (0..40)
            .map(|i| point(&[((i * 17) % 40) as f64, 0.0], Some("l")))
            .collect();
        let query = point(&[13.3, 0.0], None);
        let k = 7;

        let got = nearest(&training, &query, k).unwrap();
        assert_eq!(got.len(), k);

        let d = |p: &DataPoint| distance(p.features(), query.features()).unwrap();
        let worst_inside = got.iter().map(|&p| d(p)).fold(f64::MIN, f64::max);
        for p in &training {
            if !got.iter().any(|g| g.id() == p.id()) {
                assert!(d(p) >= worst_inside);
            }
        }
    }

    #[test]
    fn nearest_propagates_dimension_mismatch() {
        let training = [point(&[1.0, 2.0], Some("a"))];
        let query = point(&[1.0], None);

        assert!(matches!(
            nearest(&training, &query, 1),
            Err(KnnError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn majority_vote_picks_most_frequent() {
        let points = [
            point(&[1.0, 1.0], Some("a")),
            point(&[0.0, 0.0], Some("b")),
            point(&[1.0, 0.0], Some("a")),
        ];

        assert_eq!(majority_vote(&points).unwrap(), "a");
    }

    #[test]
    fn majority_vote_breaks_ties_by_first_seen() {
        let points = [
            point(&[0.0], Some("y")),
            point(&[0.0], Some("x")),
            point(&[0.0], Some("x")),
            point(&[0.0], Some("y")),
        ];

        assert_eq!(majority_vote(&points).unwrap(), "y");
    }

    #[test]
    fn majority_vote_skips_unlabeled_points() {
        let points = [
            point(&[0.0], None),
            point(&[0.0], None),
            point(&[0.0], Some("z")),
        ];

        assert_eq!(majority_vote(&points).unwrap(), "z");
        assert_eq!(majority_vote(&points[..2]), Err(KnnError::EmptyVote));
        assert_eq!(majority_vote(Vec::new()), Err(KnnError::EmptyVote));
    }

    #[test]
    fn local_fetch_over_workers() {
        let w = |n| NonZeroUsize::new(n).unwrap();

        assert_eq!(local_fetch(2, w(1)), 3);
        assert_eq!(local_fetch(3, w(2)), 2);
        assert_eq!(local_fetch(1, w(4)), 1);
        assert_eq!(local_fetch(10, w(5)), 3);
    }

    #[test]
    fn local_fetch_saturates_on_huge_k() {
        let w = |n| NonZeroUsize::new(n).unwrap();

        assert_eq!(local_fetch(usize::MAX, w(1)), usize::MAX);
        assert_eq!(local_fetch(usize::MAX, w(2)), usize::MAX / 2 + 1);
    }

    #[test]
    fn classify_depends_on_k() {
        let p1 = point(&[1.0, 1.0], Some("a"));
        let p2 = point(&[0.0, 0.0], Some("b"));
        let p3 = point(&[1.0, 0.0], Some("a"));
        let p4 = point(&[-1.0, 1.0], Some("b"));
        let p5 = point(&[-1.0, 0.0], Some("a"));
        let training = [p3, p1, p2, p5, p4];
        let query = point(&[0.0, 1.0], None);

        assert_eq!(classify(&training, &query, 3).unwrap(), "b");
        assert_eq!(classify(&training, &query, 5).unwrap(), "a");
    }
}
