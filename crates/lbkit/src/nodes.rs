//! Node set differ.
//!
//! Pools have no per-node endpoint: every change submits the complete node
//! list. These functions compute that list from the pool's current nodes and
//! a batch of requested additions or removals.
//!
//! Membership is full-record equality (address, port and status). Requested
//! nodes are materialized first, so a node given without a status equals the
//! same node given as `enabled`.

use crate::types::{Node, NodeSpec};

/// Append every requested node that is not already in the pool.
///
/// Returns whether the list changed and the full resulting list. Existing
/// order is kept and additions go at the end.
///
/// ```
/// use lbkit::nodes::add_nodes;
/// use lbkit::{Node, NodeSpec};
///
/// let current = vec![Node::new("10.0.0.1", 80)];
/// let (changed, nodes) = add_nodes(&current, &[NodeSpec::new("10.0.0.2", 80)]);
/// assert!(changed);
/// assert_eq!(nodes.len(), 2);
/// ```
#[must_use]
pub fn add_nodes(current: &[Node], to_add: &[NodeSpec]) -> (bool, Vec<Node>) {
    let mut nodes = current.to_vec();
    let mut changed = false;

    for spec in to_add {
        let node = spec.materialize();
        if !nodes.contains(&node) {
            nodes.push(node);
            changed = true;
        }
    }

    (changed, nodes)
}

/// Drop every requested node that is in the pool.
///
/// Returns whether the list changed and the full resulting list. Only the
/// first equal entry is removed per requested node; the remaining entries keep
/// their relative order.
#[must_use]
pub fn remove_nodes(current: &[Node], to_remove: &[NodeSpec]) -> (bool, Vec<Node>) {
    let mut nodes = current.to_vec();
    let mut changed = false;

    for spec in to_remove {
        let node = spec.materialize();
        if let Some(pos) = nodes.iter().position(|n| *n == node) {
            nodes.remove(pos);
            changed = true;
        }
    }

    (changed, nodes)
}

/// Whether two node lists hold the same nodes, ignoring order.
#[must_use]
pub fn same_set(a: &[Node], b: &[Node]) -> bool {
    a.iter().all(|n| b.contains(n)) && b.iter().all(|n| a.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Status;
    use proptest::prelude::*;

    fn pool_nodes() -> Vec<Node> {
        vec![
            Node::new("10.0.0.1", 80),
            Node::new("10.0.0.2", 80),
            Node::new("10.0.0.3", 8080).with_status(Status::Disabled),
        ]
    }

    fn spec(ip: &str, port: u16, status: Option<Status>) -> NodeSpec {
        NodeSpec {
            ip_address: ip.to_string(),
            private_port: port,
            status,
        }
    }

    #[test]
    fn test_add_nothing_is_unchanged() {
        assert_eq!(add_nodes(&pool_nodes(), &[]), (false, pool_nodes()));
        assert_eq!(add_nodes(&[], &[]), (false, vec![]));
    }

    #[test]
    fn test_remove_nothing_is_unchanged() {
        assert_eq!(remove_nodes(&pool_nodes(), &[]), (false, pool_nodes()));
        assert_eq!(remove_nodes(&[], &[]), (false, vec![]));
    }

    #[test]
    fn test_add_to_empty_pool_defaults_status() {
        let (changed, nodes) = add_nodes(&[], &[spec("10.11.22.234", 80, None)]);
        assert!(changed);
        assert_eq!(nodes, vec![Node::new("10.11.22.234", 80)]);
        assert_eq!(nodes[0].status, Status::Enabled);
    }

    #[test]
    fn test_add_existing_node_without_status_is_unchanged() {
        let (changed, nodes) = add_nodes(&pool_nodes(), &[spec("10.0.0.1", 80, None)]);
        assert!(!changed);
        assert_eq!(nodes, pool_nodes());
    }

    #[test]
    fn test_add_appends_after_existing() {
        let (changed, nodes) = add_nodes(
            &pool_nodes(),
            &[spec("10.0.0.9", 80, None), spec("10.0.0.1", 80, None)],
        );
        assert!(changed);
        assert_eq!(nodes.len(), 4);
        assert_eq!(&nodes[..3], pool_nodes().as_slice());
        assert_eq!(nodes[3], Node::new("10.0.0.9", 80));
    }

    #[test]
    fn test_add_status_variant_is_a_distinct_node() {
        let (changed, nodes) = add_nodes(
            &pool_nodes(),
            &[spec("10.0.0.1", 80, Some(Status::Disabled))],
        );
        assert!(changed);
        assert!(nodes.contains(&Node::new("10.0.0.1", 80)));
        assert!(nodes.contains(&Node::new("10.0.0.1", 80).with_status(Status::Disabled)));
    }

    #[test]
    fn test_add_duplicate_in_batch_added_once() {
        let (changed, nodes) = add_nodes(
            &[],
            &[spec("10.0.0.9", 80, None), spec("10.0.0.9", 80, Some(Status::Enabled))],
        );
        assert!(changed);
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_remove_missing_node_is_unchanged() {
        let (changed, nodes) = remove_nodes(&pool_nodes(), &[spec("10.9.9.9", 80, None)]);
        assert!(!changed);
        assert_eq!(nodes, pool_nodes());
    }

    #[test]
    fn test_remove_requires_matching_status() {
        let (changed, _) = remove_nodes(&pool_nodes(), &[spec("10.0.0.3", 8080, None)]);
        assert!(!changed);

        let (changed, nodes) =
            remove_nodes(&pool_nodes(), &[spec("10.0.0.3", 8080, Some(Status::Disabled))]);
        assert!(changed);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_remove_preserves_order() {
        let (changed, nodes) = remove_nodes(&pool_nodes(), &[spec("10.0.0.2", 80, None)]);
        assert!(changed);
        assert_eq!(
            nodes,
            vec![
                Node::new("10.0.0.1", 80),
                Node::new("10.0.0.3", 8080).with_status(Status::Disabled),
            ]
        );
    }

    #[test]
    fn test_partial_batch_still_changes() {
        let (changed, nodes) = remove_nodes(
            &pool_nodes(),
            &[spec("10.9.9.9", 80, None), spec("10.0.0.1", 80, None)],
        );
        assert!(changed);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_add_then_remove_restores_set() {
        let fresh = [
            spec("10.0.0.7", 443, None),
            spec("10.0.0.1", 80, Some(Status::Disabled)),
            spec("10.0.0.3", 8080, None),
        ];
        for n in &fresh {
            let original = pool_nodes();
            let (_, added) = add_nodes(&original, std::slice::from_ref(n));
            let (_, restored) = remove_nodes(&added, std::slice::from_ref(n));
            assert!(same_set(&restored, &original), "round trip of {n:?}");
        }
    }

    #[test]
    fn test_same_set_ignores_order() {
        let mut reversed = pool_nodes();
        reversed.reverse();
        assert!(same_set(&pool_nodes(), &reversed));
        assert!(!same_set(&pool_nodes(), &reversed[..2]));
    }

    // Small address and port ranges so generated lists collide often.
    fn status_strategy() -> impl Strategy<Value = Status> {
        prop_oneof![Just(Status::Enabled), Just(Status::Disabled)]
    }

    fn spec_strategy() -> impl Strategy<Value = NodeSpec> {
        (
            (1u8..5).prop_map(|i| format!("10.0.0.{i}")),
            prop::sample::select(vec![80u16, 443, 8080]),
            prop::option::of(status_strategy()),
        )
            .prop_map(|(ip, port, status)| spec(&ip, port, status))
    }

    fn node_strategy() -> impl Strategy<Value = Node> {
        spec_strategy().prop_map(|s| s.materialize())
    }

    fn nodes_strategy() -> impl Strategy<Value = Vec<Node>> {
        prop::collection::vec(node_strategy(), 0..6)
    }

    fn specs_strategy() -> impl Strategy<Value = Vec<NodeSpec>> {
        prop::collection::vec(spec_strategy(), 0..6)
    }

    proptest! {
        #[test]
        fn prop_add_nothing_is_identity(current in nodes_strategy()) {
            prop_assert_eq!(add_nodes(&current, &[]), (false, current.clone()));
        }

        #[test]
        fn prop_remove_nothing_is_identity(current in nodes_strategy()) {
            prop_assert_eq!(remove_nodes(&current, &[]), (false, current.clone()));
        }

        #[test]
        fn prop_add_then_remove_restores_set(current in nodes_strategy(), n in spec_strategy()) {
            prop_assume!(!current.contains(&n.materialize()));

            let (added_changed, added) = add_nodes(&current, std::slice::from_ref(&n));
            let (removed_changed, restored) = remove_nodes(&added, std::slice::from_ref(&n));

            prop_assert!(added_changed);
            prop_assert!(removed_changed);
            prop_assert!(same_set(&restored, &current));
        }

        #[test]
        fn prop_additions_appended_after_current(current in nodes_strategy(), to_add in specs_strategy()) {
            let (changed, nodes) = add_nodes(&current, &to_add);

            prop_assert_eq!(&nodes[..current.len()], current.as_slice());

            let appended = &nodes[current.len()..];
            prop_assert_eq!(changed, !appended.is_empty());
            for (i, node) in appended.iter().enumerate() {
                prop_assert!(!current.contains(node));
                prop_assert!(!appended[..i].contains(node));
                prop_assert!(to_add.iter().any(|s| s.materialize() == *node));
            }

            // Every requested node ends up in the pool.
            for s in &to_add {
                prop_assert!(nodes.contains(&s.materialize()));
            }
        }

        #[test]
        fn prop_remove_only_drops_requested(current in nodes_strategy(), to_remove in specs_strategy()) {
            let (changed, nodes) = remove_nodes(&current, &to_remove);

            prop_assert_eq!(changed, nodes.len() < current.len());
            for node in &nodes {
                prop_assert!(current.contains(node));
            }
            for node in &current {
                if !nodes.contains(node) {
                    prop_assert!(to_remove.iter().any(|s| s.materialize() == *node));
                }
            }
        }
    }
}
