use std::collections::HashMap;

use dxrag_core::ScoredPassage;

struct ProtocolGroup {
    best: f64,
    total: f64,
    members: Vec<ScoredPassage>,
}

/// Groups passages by protocol and keeps the `top_protocols` strongest.
///
/// Protocols are ordered by their best passage, then by summed relevance,
/// then by first appearance. Each kept passage is stamped with its
/// protocol's best score and the groups are flattened in protocol order.
pub fn aggregate_by_protocol(passages: &[ScoredPassage], top_protocols: usize) -> Vec<ScoredPassage> {
    let mut group_of: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<ProtocolGroup> = Vec::new();

    for p in passages {
        let score = p.relevance();
        let idx = *group_of.entry(p.passage.protocol_id.as_str()).or_insert_with(|| {
            groups.push(ProtocolGroup { best: f64::NEG_INFINITY, total: 0.0, members: Vec::new() });
            groups.len() - 1
        });
        let group = &mut groups[idx];
        group.best = group.best.max(score);
        group.total += score;
        group.members.push(p.clone());
    }

    groups.sort_by(|a, b| b.best.total_cmp(&a.best).then(b.total.total_cmp(&a.total)));
    groups.truncate(top_protocols);

    groups
        .into_iter()
        .flat_map(|mut g| {
            g.members.sort_by(|a, b| b.relevance().total_cmp(&a.relevance()));
            let best = g.best;
            g.members.into_iter().map(move |m| m.with_protocol_rank(best))
        })
        .collect()
}
