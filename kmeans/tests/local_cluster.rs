//! End-to-end runs on the in-process substrate.

use std::collections::BTreeMap;

use bsp_kmeans::{Config, KMeansError, LocalCluster, LocalRun, Vector};

fn records(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

/// Groups output rows by owning worker, each group's points sorted by text.
fn groups(run: &LocalRun) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (identity, point) in &run.output {
        out.entry(identity.clone()).or_default().push(point.to_string());
    }
    for pts in out.values_mut() {
        pts.sort();
    }
    out
}

/// Deterministic scatter of `n` points around `center`.
fn blob(center: (f64, f64), n: usize, seed: u64) -> Vec<String> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let dx = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let dy = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            format!("{} {}", center.0 + dx, center.1 + dy)
        })
        .collect()
}

#[test]
fn two_groups_converge_from_any_partition() {
    let input = records(&["0 0", "0 1", "10 10", "10 11"]);
    for seed in 0..16 {
        let run = LocalCluster::new(Config::new(2, 10).with_seed(seed))
            .records(input.clone())
            .run()
            .unwrap();

        let summary = &run.summaries[0];
        assert!(summary.converged, "seed {seed} did not converge");
        assert!(summary.rounds <= 10);

        let mut found: Vec<Vec<String>> = groups(&run).into_values().collect();
        found.sort();
        assert_eq!(
            found,
            vec![
                vec!["0 0".to_string(), "0 1".to_string()],
                vec!["10 10".to_string(), "10 11".to_string()],
            ],
            "seed {seed}"
        );

        let mut centroids: Vec<Vector> = summary
            .clusters
            .iter()
            .map(|c| c.centroid.clone().unwrap())
            .collect();
        centroids.sort_by(|a, b| a.coords()[0].total_cmp(&b.coords()[0]));
        assert!(centroids[0].approx_eq(&Vector::new(vec![0.0, 0.5]), 1e-9).unwrap());
        assert!(centroids[1].approx_eq(&Vector::new(vec![10.0, 10.5]), 1e-9).unwrap());
    }
}

#[test]
fn every_point_is_written_exactly_once() {
    let mut input = blob((0.0, 0.0), 40, 1);
    input.extend(blob((50.0, 0.0), 40, 2));
    input.extend(blob((0.0, 50.0), 40, 3));
    input.extend(blob((50.0, 50.0), 40, 4));

    let run = LocalCluster::new(Config::new(4, 20).with_seed(9))
        .records(input.clone())
        .run()
        .unwrap();

    assert_eq!(run.output.len(), input.len());
    let mut written: Vec<Vector> = run.output.iter().map(|(_, p)| p.clone()).collect();
    let mut expected: Vec<Vector> = input.iter().map(|r| r.parse().unwrap()).collect();
    let key = |a: &Vector, b: &Vector| {
        a.coords()[0]
            .total_cmp(&b.coords()[0])
            .then(a.coords()[1].total_cmp(&b.coords()[1]))
    };
    written.sort_by(key);
    expected.sort_by(key);
    assert_eq!(written, expected);
}

#[test]
fn workers_agree_on_the_outcome() {
    let mut input = blob((0.0, 0.0), 30, 5);
    input.extend(blob((20.0, 20.0), 30, 6));
    input.extend(blob((-20.0, 20.0), 30, 7));

    let run = LocalCluster::new(Config::new(3, 100).with_seed(11))
        .records(input)
        .run()
        .unwrap();

    assert_eq!(run.summaries.len(), 3);
    let first = &run.summaries[0];
    for s in &run.summaries[1..] {
        assert_eq!(s.rounds, first.rounds);
        assert_eq!(s.converged, first.converged);
        assert_eq!(s.clusters, first.clusters);
    }

    // A converged table describes exactly the points each worker wrote.
    assert!(first.converged);
    let written = groups(&run);
    for cluster in &first.clusters {
        let n = written.get(&cluster.identity).map_or(0, Vec::len);
        assert_eq!(n, cluster.population, "{}", cluster.identity);
    }
}

#[test]
fn malformed_records_are_skipped() {
    let input = records(&["0 0", "not a point", "", "0 1", "1,x", "10 10", "10 11"]);
    let run = LocalCluster::new(Config::new(2, 10).with_seed(3))
        .records(input)
        .run()
        .unwrap();
    assert_eq!(run.output.len(), 4);
}

#[test]
fn dimension_mismatch_aborts_the_run() {
    let input = records(&["0 0", "0 1", "5 5 5", "10 10"]);
    let err = LocalCluster::new(Config::new(2, 10).with_seed(4))
        .records(input)
        .run()
        .unwrap_err();
    assert!(
        matches!(err, KMeansError::DimensionMismatch { .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn invalid_configuration_fails_before_any_round() {
    let err = LocalCluster::new(Config::new(0, 10)).run().unwrap_err();
    assert!(matches!(err, KMeansError::Config(_)));

    let err = LocalCluster::new(Config::new(2, 0))
        .records(records(&["1 1"]))
        .run()
        .unwrap_err();
    assert!(matches!(err, KMeansError::Config(_)));
}

#[test]
fn single_round_cap_stops_unconverged() {
    let input = records(&["0 0", "0 1", "10 10", "10 11"]);
    let run = LocalCluster::new(Config::new(2, 1).with_seed(0))
        .records(input)
        .run()
        .unwrap();
    for s in &run.summaries {
        assert_eq!(s.rounds, 1);
        assert!(!s.converged);
    }
    assert_eq!(run.output.len(), 4);
}
