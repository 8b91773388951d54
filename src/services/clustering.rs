use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{IntentType, OpportunityCluster, Query},
};

/// Words that carry no topic on their own
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "be", "by", "can", "do", "does", "for", "from", "how", "i",
    "in", "is", "it", "me", "my", "of", "on", "or", "the", "to", "what", "when", "where",
    "which", "who", "why", "will", "with", "you", "your",
];

/// Share of a previous cluster's members that must carry over for it to keep its id
pub const IDENTITY_OVERLAP: f64 = 0.5;

/// Name used when no member query has a score
pub const PLACEHOLDER_NAME: &str = "Untitled opportunity";

/// Per-query signals the clustering engine aggregates
#[derive(Debug, Clone, Default)]
pub struct ClusterSignals {
    /// Latest composite score in the reference window
    pub scores: HashMap<Uuid, f64>,
    /// Intent labels assigned by the classification collaborator
    pub intents: HashMap<Uuid, IntentType>,
}

/// Lowercases, strips punctuation and drops stopwords
pub fn tokenize(text: &str) -> HashSet<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Jaccard index of two token sets, 0 when either is empty
pub fn jaccard_similarity(left: &HashSet<String>, right: &HashSet<String>) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(right).count();
    let union = left.union(right).count();
    intersection as f64 / union as f64
}

/// Disjoint-set forest over query indexes
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = node;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a == root_b {
            return;
        }
        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
    }
}

/// Groups queries into opportunity clusters by text similarity
///
/// Clusters are the connected components of the graph linking every pair of
/// queries whose similarity reaches the threshold. Queries are processed in id
/// order and components are keyed by their smallest member id, so the same
/// query set and threshold always yield the same membership regardless of
/// input order.
pub struct Clusterer<'a> {
    queries: &'a [Query],
    signals: &'a ClusterSignals,
    name_max_chars: usize,
}

impl<'a> Clusterer<'a> {
    pub fn new(queries: &'a [Query], signals: &'a ClusterSignals, name_max_chars: usize) -> Self {
        Self {
            queries,
            signals,
            name_max_chars,
        }
    }

    /// Builds clusters from scratch, each with a fresh identifier
    pub fn cluster(&self, threshold: f64) -> AppResult<Vec<OpportunityCluster>> {
        self.cluster_with_prior(threshold, None)
    }

    /// Builds clusters, reusing identifiers from `prior` where membership mostly carries over
    pub fn recluster(
        &self,
        threshold: f64,
        prior: &[OpportunityCluster],
    ) -> AppResult<Vec<OpportunityCluster>> {
        self.cluster_with_prior(threshold, Some(prior))
    }

    pub fn cluster_with_prior(
        &self,
        threshold: f64,
        prior: Option<&[OpportunityCluster]>,
    ) -> AppResult<Vec<OpportunityCluster>> {
        validate_threshold(threshold)?;

        let components = self.components(threshold);
        let now = Utc::now();

        let mut clusters: Vec<OpportunityCluster> = components
            .iter()
            .map(|members| OpportunityCluster {
                id: Uuid::new_v4(),
                name: self.cluster_name(members),
                intent_type: self.dominant_intent(members),
                average_score: self.average_score(members),
                queries: members.iter().map(|q| q.id).collect(),
                created_at: now,
            })
            .collect();

        if let Some(prior) = prior {
            let preserved = preserve_identities(&mut clusters, prior);
            tracing::debug!(
                preserved,
                fresh = clusters.len() - preserved,
                "Matched clusters against previous run"
            );
        }

        Ok(clusters)
    }

    /// Connected components of the link graph, members sorted by id
    fn components(&self, threshold: f64) -> Vec<Vec<&'a Query>> {
        let mut sorted: Vec<&'a Query> = self.queries.iter().collect();
        sorted.sort_by_key(|q| q.id);
        sorted.dedup_by_key(|q| q.id);

        let tokens: Vec<HashSet<String>> = sorted.iter().map(|q| tokenize(&q.text)).collect();
        let mut forest = UnionFind::new(sorted.len());

        for i in 0..sorted.len() {
            for j in (i + 1)..sorted.len() {
                if jaccard_similarity(&tokens[i], &tokens[j]) >= threshold {
                    forest.union(i, j);
                }
            }
        }

        // Keyed by smallest member index, which is also the smallest id
        let mut groups: BTreeMap<usize, Vec<&'a Query>> = BTreeMap::new();
        let mut first_index: HashMap<usize, usize> = HashMap::new();
        for (index, query) in sorted.iter().enumerate() {
            let root = forest.find(index);
            let key = *first_index.entry(root).or_insert(index);
            groups.entry(key).or_default().push(*query);
        }

        groups.into_values().collect()
    }

    /// Mean of member scores; unscored members count as 0
    fn average_score(&self, members: &[&Query]) -> f64 {
        if members.is_empty() {
            return 0.0;
        }
        let total: f64 = members
            .iter()
            .map(|q| self.signals.scores.get(&q.id).copied().unwrap_or(0.0))
            .sum();
        total / members.len() as f64
    }

    /// Most frequent intent, ties going to whichever intent appeared first
    fn dominant_intent(&self, members: &[&Query]) -> Option<IntentType> {
        let mut counts: Vec<(IntentType, usize)> = Vec::new();
        for query in members {
            let Some(intent) = self.signals.intents.get(&query.id) else {
                continue;
            };
            match counts.iter_mut().find(|(seen, _)| seen == intent) {
                Some((_, count)) => *count += 1,
                None => counts.push((*intent, 1)),
            }
        }

        let mut best: Option<(IntentType, usize)> = None;
        for (intent, count) in counts {
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((intent, count));
            }
        }
        best.map(|(intent, _)| intent)
    }

    /// Cleaned text of the highest-scoring member
    fn cluster_name(&self, members: &[&Query]) -> String {
        let mut top: Option<(&Query, f64)> = None;
        for &query in members {
            let Some(score) = self.signals.scores.get(&query.id).copied() else {
                continue;
            };
            if top.map_or(true, |(_, best)| score > best) {
                top = Some((query, score));
            }
        }

        match top {
            Some((query, _)) => {
                let name = clean_name(&query.text, self.name_max_chars);
                if name.is_empty() {
                    PLACEHOLDER_NAME.to_string()
                } else {
                    name
                }
            }
            None => PLACEHOLDER_NAME.to_string(),
        }
    }
}

pub fn validate_threshold(threshold: f64) -> AppResult<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AppError::InvalidArgument(format!(
            "cluster threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    Ok(())
}

/// Collapses whitespace and cuts the text to `max_chars` characters
fn clean_name(text: &str, max_chars: usize) -> String {
    let collapsed = text
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ");

    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(max_chars).collect();
    truncated.trim_end().to_string()
}

/// Share of the previous cluster's members still present in the current one
fn overlap(current: &[Uuid], previous: &[Uuid]) -> f64 {
    if previous.is_empty() {
        return 0.0;
    }
    shared_members(current, previous) as f64 / previous.len() as f64
}

fn shared_members(current: &[Uuid], previous: &[Uuid]) -> usize {
    let previous: HashSet<&Uuid> = previous.iter().collect();
    current.iter().filter(|id| previous.contains(id)).count()
}

/// Carries prior identifiers over to matching clusters, returning how many matched
///
/// Pairs are matched greedily from highest overlap down, larger shared membership
/// first on ties; each prior cluster is claimed at most once.
fn preserve_identities(clusters: &mut [OpportunityCluster], prior: &[OpportunityCluster]) -> usize {
    // (overlap, shared members, current index, prior index)
    let mut candidates: Vec<(f64, usize, usize, usize)> = Vec::new();
    for (current_index, cluster) in clusters.iter().enumerate() {
        for (prior_index, previous) in prior.iter().enumerate() {
            let score = overlap(&cluster.queries, &previous.queries);
            if score > IDENTITY_OVERLAP {
                let shared = shared_members(&cluster.queries, &previous.queries);
                candidates.push((score, shared, current_index, prior_index));
            }
        }
    }

    candidates.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.1.cmp(&a.1))
            .then(a.2.cmp(&b.2))
            .then(prior[a.3].id.cmp(&prior[b.3].id))
    });

    let mut claimed_current = HashSet::new();
    let mut claimed_prior = HashSet::new();
    for (_, _, current_index, prior_index) in candidates {
        if claimed_current.contains(&current_index) || claimed_prior.contains(&prior_index) {
            continue;
        }
        claimed_current.insert(current_index);
        claimed_prior.insert(prior_index);

        let previous = &prior[prior_index];
        clusters[current_index].id = previous.id;
        clusters[current_index].created_at = previous.created_at;
    }

    claimed_current.len()
}
