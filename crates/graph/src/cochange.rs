use petgraph::unionfind::UnionFind;
use std::collections::{BTreeMap, HashMap};

/// Group `files` into clusters joined by strong co-change edges.
///
/// Only pairs with both ends in `files` and `count >= min_count` connect
/// files. Singletons are dropped; clusters and their members come back sorted.
pub fn cochange_clusters(
    files: &[String],
    pairs: &[(String, String, u32)],
    min_count: u32,
) -> Vec<Vec<String>> {
    let position: HashMap<&str, usize> = files
        .iter()
        .enumerate()
        .map(|(i, f)| (f.as_str(), i))
        .collect();

    let mut sets = UnionFind::<usize>::new(files.len());
    for (a, b, count) in pairs {
        if *count < min_count {
            continue;
        }
        if let (Some(&i), Some(&j)) = (position.get(a.as_str()), position.get(b.as_str())) {
            sets.union(i, j);
        }
    }

    let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (i, file) in files.iter().enumerate() {
        groups.entry(sets.find(i)).or_default().push(file.clone());
    }

    let mut clusters: Vec<Vec<String>> = groups
        .into_values()
        .filter(|members| members.len() > 1)
        .map(|mut members| {
            members.sort();
            members.dedup();
            members
        })
        .collect();
    clusters.sort();
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn strong_pairs_form_transitive_clusters() {
        let files = vec![s("a"), s("b"), s("c"), s("d"), s("e")];
        let pairs = vec![
            (s("a"), s("b"), 5),
            (s("b"), s("c"), 7),
            (s("d"), s("e"), 4),
            (s("a"), s("zzz"), 9),
        ];
        assert_eq!(
            cochange_clusters(&files, &pairs, 5),
            vec![vec![s("a"), s("b"), s("c")]]
        );
        assert_eq!(
            cochange_clusters(&files, &pairs, 4),
            vec![vec![s("a"), s("b"), s("c")], vec![s("d"), s("e")]]
        );
    }

    #[test]
    fn no_pairs_no_clusters() {
        assert!(cochange_clusters(&[s("a")], &[], 5).is_empty());
    }
}
