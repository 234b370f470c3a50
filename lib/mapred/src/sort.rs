use crate::config::ValueOrder;
use crate::store::{KeyCluster, KvPair, Partition};
use rayon::prelude::*;
use std::time::Instant;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupOutcome {
    pub pairs: u64,
    pub groups: u64,
    pub sort_ms: u64,
}

/// Drains `partition`'s pending pairs and installs them back as ascending key-clusters.
///
/// The caller holds the partition lock for the whole call and for as long as the
/// clusters are read afterwards.
pub fn group_partition(partition: &mut Partition, order: ValueOrder, parallel_threshold: usize) -> GroupOutcome {
    let mut pairs = partition.take_pending();
    if pairs.is_empty() {
        partition.install_clusters(Vec::new());
        return GroupOutcome::default();
    }
    let n = pairs.len() as u64;
    if order == ValueOrder::ReverseEmission {
        pairs.reverse();
    }

    let sort_start = Instant::now();
    sort_pairs(&mut pairs, parallel_threshold);
    let sort_ms = sort_start.elapsed().as_millis() as u64;

    let clusters = group_sorted(pairs);
    let groups = clusters.len() as u64;
    partition.install_clusters(clusters);
    GroupOutcome { pairs: n, groups, sort_ms }
}

/// Stable sort by key bytes; pairs with equal keys keep their relative order.
pub fn sort_pairs(pairs: &mut [KvPair], parallel_threshold: usize) {
    if pairs.len() >= parallel_threshold {
        pairs.par_sort_by(|a, b| a.key.as_bytes().cmp(b.key.as_bytes()));
    } else {
        pairs.sort_by(|a, b| a.key.as_bytes().cmp(b.key.as_bytes()));
    }
}

/// Folds key-sorted pairs into clusters, one per run of equal keys.
pub fn group_sorted(pairs: Vec<KvPair>) -> Vec<KeyCluster> {
    let mut clusters: Vec<KeyCluster> = Vec::new();
    for KvPair { key, value } in pairs {
        match clusters.last_mut() {
            Some(current) if current.key == key => current.values.push(value),
            _ => clusters.push(KeyCluster { key, values: vec![value] }),
        }
    }
    clusters
}
