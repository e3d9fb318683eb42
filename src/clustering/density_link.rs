use std::collections::HashSet;

use nalgebra::DMatrix;
use rayon::prelude::*;
use thiserror::Error;

use super::{ClusteringResult, ClusteringRoutine};
use crate::config::{ClusterParams, Setting};
use crate::error::RoutineError;

/// Smallest neighbour distance used in the density estimate, so duplicate
/// points do not produce an infinite density.
const MIN_RADIUS: f64 = 1e-300;

#[derive(Debug, Error)]
pub enum DensityLinkError {
    #[error("dataset is empty")]
    EmptyDataset,
    #[error("feature matrix has no columns")]
    NoFeatures,
    #[error("row {0} contains a non-finite value")]
    NonFiniteCoordinate(usize),
    #[error("k_den must be at least 1")]
    InvalidKDen,
    #[error("could not start the neighbour search pool: {0}")]
    ThreadPool(String),
}

// ---------------------------------------------------------------------------
// DensityLink – built-in hierarchical density clustering
// ---------------------------------------------------------------------------

/// Built-in clustering routine.
///
/// Density comes from the distance to the `k_den`-th neighbour. Points are
/// then aggregated in decreasing density over the `k_link` neighbour graph;
/// groups keep their members in order and an absorbed group is appended after
/// its absorber, so every group that ever existed is a contiguous range of the
/// final ordering. Merges whose absorbed side is large and prominent enough
/// become clusters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DensityLink;

impl ClusteringRoutine for DensityLink {
    fn cluster(
        &self,
        data: &DMatrix<f64>,
        params: &ClusterParams,
    ) -> Result<ClusteringResult, RoutineError> {
        Ok(self.run(data, params)?)
    }
}

/// A cluster candidate, relative to the member list of the group holding it.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    start: usize,
    end: usize,
    prominence: f64,
}

#[derive(Debug)]
struct Group {
    members: Vec<usize>,
    peak: f64,
    candidates: Vec<Candidate>,
}

impl DensityLink {
    pub fn run(
        &self,
        data: &DMatrix<f64>,
        params: &ClusterParams,
    ) -> Result<ClusteringResult, DensityLinkError> {
        let level = if params.verbose > 0 { log::Level::Info } else { log::Level::Debug };
        let (n, d) = data.shape();
        if n == 0 {
            return Err(DensityLinkError::EmptyDataset);
        }
        if d == 0 {
            return Err(DensityLinkError::NoFeatures);
        }
        if params.k_den == 0 {
            return Err(DensityLinkError::InvalidKDen);
        }
        if let Some(row) = (0..n).find(|&r| data.row(r).iter().any(|v| !v.is_finite())) {
            return Err(DensityLinkError::NonFiniteCoordinate(row));
        }

        if n == 1 {
            return Ok(ClusteringResult {
                n_samples: 1,
                log_rho: vec![0.0],
                ordering: vec![0],
                clusters: vec![(0, 1)],
                ids: vec!["1".to_string()],
            });
        }

        let points = feature_rows(data, params.adaptive == 1);
        let k_den = params.k_den.min(n - 1);
        let k_link = match params.k_link {
            Setting::Auto => k_den,
            Setting::Value(k) => k,
        }
        .clamp(1, n - 1);
        let workers = worker_count(params.workers, n);
        log::log!(level, "DensityLink: {n} samples, {d} features, k_den={k_den}, k_link={k_link}, {workers} worker(s)");

        let neighbours = knn(&points, k_den.max(k_link), workers)?;
        let log_rho = log_density(&neighbours, k_den, d);

        let (ordering, candidates) = aggregate(&log_rho, &neighbours, k_link, params.h_style == 1);
        let threshold = match params.s {
            Setting::Value(s) => s,
            Setting::Auto => auto_threshold(&candidates),
        };
        log::log!(level, "DensityLink: {} candidate(s), prominence threshold {threshold:.4}", candidates.len());

        let clusters = select_clusters(candidates, n, k_link, threshold);
        let ids = hierarchical_ids(&clusters);
        log::log!(level, "DensityLink: {} cluster(s) including the root", clusters.len());

        Ok(ClusteringResult {
            n_samples: n,
            log_rho,
            ordering,
            clusters,
            ids,
        })
    }
}

// -- Preparation --

/// Row-major copy of the data, optionally standardised per feature.
fn feature_rows(data: &DMatrix<f64>, standardise: bool) -> Vec<Vec<f64>> {
    let (n, d) = data.shape();
    let mut scale = vec![(0.0, 1.0); d];
    if standardise {
        for (c, s) in scale.iter_mut().enumerate() {
            let col = data.column(c);
            let mean = col.mean();
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            let std = var.sqrt();
            *s = (mean, if std > 0.0 { std } else { 1.0 });
        }
    }
    (0..n)
        .map(|r| {
            (0..d)
                .map(|c| (data[(r, c)] - scale[c].0) / scale[c].1)
                .collect()
        })
        .collect()
}

/// Pool size for the neighbour search; a non-positive hint means every core.
fn worker_count(hint: i32, n: usize) -> usize {
    let wanted = if hint <= 0 { rayon::current_num_threads() } else { hint as usize };
    wanted.clamp(1, n)
}

// -- Neighbours and density --

/// `k` nearest neighbours of every point as `(distance, index)`, closest first.
fn knn(
    points: &[Vec<f64>],
    k: usize,
    workers: usize,
) -> Result<Vec<Vec<(f64, usize)>>, DensityLinkError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| DensityLinkError::ThreadPool(e.to_string()))?;
    Ok(pool.install(|| {
        (0..points.len())
            .into_par_iter()
            .map(|i| nearest(points, i, k))
            .collect()
    }))
}

fn nearest(points: &[Vec<f64>], i: usize, k: usize) -> Vec<(f64, usize)> {
    let p = &points[i];
    let mut dists: Vec<(f64, usize)> = points
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(j, q)| {
            let d2: f64 = p.iter().zip(q).map(|(a, b)| (a - b) * (a - b)).sum();
            (d2, j)
        })
        .collect();
    let by_dist = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
    if k < dists.len() {
        dists.select_nth_unstable_by(k - 1, by_dist);
        dists.truncate(k);
    }
    dists.sort_by(by_dist);
    dists.into_iter().map(|(d2, j)| (d2.sqrt(), j)).collect()
}

/// kNN density in log space, rescaled to `[0, 1]`.
fn log_density(neighbours: &[Vec<(f64, usize)>], k_den: usize, d: usize) -> Vec<f64> {
    let n = neighbours.len() as f64;
    let raw: Vec<f64> = neighbours
        .iter()
        .map(|neigh| {
            let r = neigh[k_den - 1].0.max(MIN_RADIUS);
            (k_den as f64).ln() - n.ln() - d as f64 * r.ln()
        })
        .collect();
    let lo = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    if range > 0.0 {
        raw.iter().map(|v| (v - lo) / range).collect()
    } else {
        vec![0.0; raw.len()]
    }
}

// -- Aggregation --

/// Build the ordering and collect cluster candidates in ordering coordinates.
fn aggregate(
    log_rho: &[f64],
    neighbours: &[Vec<(f64, usize)>],
    k_link: usize,
    keep_absorber: bool,
) -> (Vec<usize>, Vec<Candidate>) {
    let n = log_rho.len();
    let mut by_density: Vec<usize> = (0..n).collect();
    by_density.sort_by(|&a, &b| log_rho[b].total_cmp(&log_rho[a]).then(a.cmp(&b)));
    let mut rank = vec![0; n];
    for (pos, &p) in by_density.iter().enumerate() {
        rank[p] = pos;
    }

    let mut groups: Vec<Group> = Vec::new();
    let mut parent: Vec<usize> = Vec::new();
    let mut group_of = vec![usize::MAX; n];

    for &i in &by_density {
        let mut linked: Vec<usize> = neighbours[i][..k_link]
            .iter()
            .map(|&(_, j)| j)
            .filter(|&j| rank[j] < rank[i])
            .collect();
        linked.sort_by_key(|&j| rank[j]);

        let mut touching: Vec<usize> = Vec::new();
        for j in linked {
            let g = find(&mut parent, group_of[j]);
            if !touching.contains(&g) {
                touching.push(g);
            }
        }

        let Some((&first, rest)) = touching.split_first() else {
            group_of[i] = groups.len();
            parent.push(groups.len());
            groups.push(Group {
                members: vec![i],
                peak: log_rho[i],
                candidates: Vec::new(),
            });
            continue;
        };

        let saddle = log_rho[i];
        let mut main = first;
        for &other in rest {
            main = merge(&mut groups, &mut parent, main, other, saddle, keep_absorber);
        }
        groups[main].members.push(i);
        group_of[i] = main;
    }

    // Disconnected components, densest peak first.
    let mut roots: Vec<usize> = (0..groups.len()).filter(|&g| parent[g] == g).collect();
    roots.sort_by(|&a, &b| groups[b].peak.total_cmp(&groups[a].peak));
    let split = roots.len() > 1;

    let mut ordering = Vec::with_capacity(n);
    let mut candidates = Vec::new();
    for g in roots {
        let group = std::mem::replace(
            &mut groups[g],
            Group { members: Vec::new(), peak: 0.0, candidates: Vec::new() },
        );
        let offset = ordering.len();
        candidates.extend(group.candidates.into_iter().map(|c| Candidate {
            start: c.start + offset,
            end: c.end + offset,
            prominence: c.prominence,
        }));
        if split {
            candidates.push(Candidate {
                start: offset,
                end: offset + group.members.len(),
                prominence: f64::INFINITY,
            });
        }
        ordering.extend(group.members);
    }
    (ordering, candidates)
}

fn find(parent: &mut [usize], mut g: usize) -> usize {
    while parent[g] != g {
        parent[g] = parent[parent[g]];
        g = parent[g];
    }
    g
}

/// Merge two groups at density `saddle`; returns the surviving group.
fn merge(
    groups: &mut [Group],
    parent: &mut [usize],
    a: usize,
    b: usize,
    saddle: f64,
    keep_absorber: bool,
) -> usize {
    let a_wins = groups[a].peak > groups[b].peak
        || (groups[a].peak == groups[b].peak && groups[a].members.len() >= groups[b].members.len());
    let (keep, absorbed) = if a_wins { (a, b) } else { (b, a) };

    let taken = std::mem::replace(
        &mut groups[absorbed],
        Group { members: Vec::new(), peak: 0.0, candidates: Vec::new() },
    );
    let target = &mut groups[keep];
    let offset = target.members.len();

    if keep_absorber {
        target.candidates.push(Candidate {
            start: 0,
            end: offset,
            prominence: target.peak - saddle,
        });
    }
    target.candidates.push(Candidate {
        start: offset,
        end: offset + taken.members.len(),
        prominence: taken.peak - saddle,
    });
    target.candidates.extend(taken.candidates.into_iter().map(|c| Candidate {
        start: c.start + offset,
        end: c.end + offset,
        prominence: c.prominence,
    }));
    target.members.extend(taken.members);
    parent[absorbed] = keep;
    keep
}

// -- Cluster selection --

/// Mean plus one standard deviation of the finite candidate prominences.
fn auto_threshold(candidates: &[Candidate]) -> f64 {
    let finite: Vec<f64> = candidates
        .iter()
        .map(|c| c.prominence)
        .filter(|p| p.is_finite())
        .collect();
    if finite.is_empty() {
        return 0.0;
    }
    let m = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / m;
    let var = finite.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / m;
    mean + var.sqrt()
}

/// Root first, then kept candidates ordered so parents precede children.
fn select_clusters(
    candidates: Vec<Candidate>,
    n: usize,
    min_size: usize,
    threshold: f64,
) -> Vec<(usize, usize)> {
    let mut seen = HashSet::new();
    let mut kept: Vec<(usize, usize)> = candidates
        .into_iter()
        .filter(|c| {
            let size = c.end - c.start;
            size >= min_size && size < n && c.prominence >= threshold
        })
        .map(|c| (c.start, c.end))
        .filter(|range| seen.insert(*range))
        .collect();
    kept.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut clusters = Vec::with_capacity(kept.len() + 1);
    clusters.push((0, n));
    clusters.extend(kept);
    clusters
}

/// Ids of the form `1`, `1-1`, `1-2`, `1-1-1`, … following range nesting.
fn hierarchical_ids(clusters: &[(usize, usize)]) -> Vec<String> {
    // (end, id, number of children so far)
    let mut stack: Vec<(usize, String, usize)> = Vec::new();
    let mut ids = Vec::with_capacity(clusters.len());
    for &(_, end) in clusters {
        while stack.len() > 1 && stack.last().is_some_and(|top| end > top.0) {
            stack.pop();
        }
        let id = match stack.last_mut() {
            Some(top) => {
                top.2 += 1;
                format!("{}-{}", top.1, top.2)
            }
            None => "1".to_string(),
        };
        ids.push(id.clone());
        stack.push((end, id, 0));
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::inverse_permutation;

    fn two_blobs() -> DMatrix<f64> {
        let offsets = [
            (0.0, 0.0), (0.3, 0.1), (-0.2, 0.4), (0.1, -0.3), (-0.4, -0.1),
            (0.5, 0.5), (-0.5, 0.2), (0.2, 0.3), (-0.1, -0.5), (0.4, -0.2),
        ];
        let mut rows = Vec::new();
        for (i, &(dx, dy)) in offsets.iter().enumerate() {
            // interleave the blobs so the ordering has to regroup them
            rows.push([dx, dy]);
            rows.push([100.0 + offsets[(i + 3) % 10].0, 100.0 + offsets[(i + 3) % 10].1]);
        }
        DMatrix::from_fn(rows.len(), 2, |r, c| rows[r][c])
    }

    fn params(k_den: usize, k_link: usize) -> ClusterParams {
        ClusterParams {
            k_den,
            k_link: Setting::Value(k_link),
            ..ClusterParams::default()
        }
    }

    #[test]
    fn separates_two_blobs() {
        let data = two_blobs();
        let res = DensityLink.run(&data, &params(5, 9)).unwrap();

        assert_eq!(res.n_samples, 20);
        assert!(inverse_permutation(&res.ordering, 20).is_ok());
        assert_eq!(res.clusters, vec![(0, 20), (0, 10), (10, 20)]);
        assert_eq!(res.ids, vec!["1", "1-1", "1-2"]);

        for &(start, end) in &res.clusters[1..] {
            let blob: HashSet<bool> = res.ordering[start..end]
                .iter()
                .map(|&row| data[(row, 0)] > 50.0)
                .collect();
            assert_eq!(blob.len(), 1, "cluster [{start}, {end}) mixes blobs");
        }
    }

    #[test]
    fn density_is_rescaled() {
        let res = DensityLink.run(&two_blobs(), &params(3, 3)).unwrap();
        let lo = res.log_rho.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = res.log_rho.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        approx::assert_relative_eq!(lo, 0.0);
        approx::assert_relative_eq!(hi, 1.0);
    }

    #[test]
    fn ordering_starts_at_densest_point() {
        let res = DensityLink.run(&two_blobs(), &params(4, 4)).unwrap();
        let densest = res.log_rho.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(res.log_rho[res.ordering[0]], densest);
    }

    #[test]
    fn single_sample_is_root_only() {
        let data = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let res = DensityLink.run(&data, &ClusterParams::default()).unwrap();
        assert_eq!(res.ordering, vec![0]);
        assert_eq!(res.clusters, vec![(0, 1)]);
    }

    #[test]
    fn rejects_empty_and_non_finite() {
        let empty = DMatrix::<f64>::zeros(0, 3);
        assert!(matches!(
            DensityLink.run(&empty, &ClusterParams::default()),
            Err(DensityLinkError::EmptyDataset)
        ));

        let data = DMatrix::from_row_slice(2, 1, &[1.0, f64::NAN]);
        assert!(matches!(
            DensityLink.run(&data, &ClusterParams::default()),
            Err(DensityLinkError::NonFiniteCoordinate(1))
        ));
    }

    #[test]
    fn neighbours_match_across_pool_sizes() {
        let data = two_blobs();
        let points = feature_rows(&data, false);
        let single = knn(&points, 4, 1).unwrap();
        let many = knn(&points, 4, 3).unwrap();
        assert_eq!(single, many);
        assert_eq!(single.len(), 20);
        assert!(single.iter().all(|neigh| neigh.len() == 4));
        assert!(single.iter().enumerate().all(|(i, neigh)| neigh.iter().all(|&(_, j)| j != i)));
    }

    #[test]
    fn worker_hint_is_bounded_by_samples() {
        assert_eq!(worker_count(8, 3), 3);
        assert_eq!(worker_count(2, 100), 2);
        assert!(worker_count(-1, 100) >= 1);
    }

    #[test]
    fn ids_follow_nesting() {
        let ids = hierarchical_ids(&[(0, 10), (0, 6), (0, 3), (3, 6), (6, 10)]);
        assert_eq!(ids, vec!["1", "1-1", "1-1-1", "1-1-2", "1-2"]);
    }

    #[test]
    fn auto_threshold_ignores_infinite_prominence() {
        let c = |p| Candidate { start: 0, end: 1, prominence: p };
        let t = auto_threshold(&[c(1.0), c(3.0), c(f64::INFINITY)]);
        approx::assert_relative_eq!(t, 3.0);
    }
}
