//! Relevance pruner: cut a link tree down to a bounded, proportionally
//! representative summary.
//!
//! Pruning works on a fresh copy; the input tree is never modified.

use ahash::AHashSet;

use crate::tree::{Children, CountAttrs, Link, LinkTree};

/// Copy `tree`, keeping only links accepted by `accept`, and annotate every
/// kept node with the number of links beneath it.
///
/// Branches without accepted links are dropped. The root is always returned,
/// with a zero count when nothing matched. Existing annotations on the input
/// are ignored, so already-pruned output can be counted again.
pub fn count_matches(tree: &LinkTree, accept: &dyn Fn(&Link) -> bool) -> LinkTree {
    match tree {
        LinkTree::Counted(_, inner) => count_matches(inner, accept),
        LinkTree::Leaf(links) => {
            let kept: Vec<Link> = links.iter().filter(|l| accept(l)).cloned().collect();
            let count = kept.len();
            counted(count, LinkTree::Leaf(kept))
        }
        LinkTree::Children(node) => {
            let mut copy = Children::new(node.tag.clone());
            let mut count = 0;
            for child in &node.children {
                let child = count_matches(child, accept);
                let child_count = child.count_attrs().map_or(0, |a| a.count);
                if child_count > 0 {
                    count += child_count;
                    copy.push(child);
                }
            }
            counted(count, LinkTree::Children(copy))
        }
    }
}

fn counted(count: usize, node: LinkTree) -> LinkTree {
    LinkTree::Counted(
        CountAttrs {
            count,
            target_count: 0,
        },
        Box::new(node),
    )
}

/// Spread a budget of `target` links over a tree produced by
/// [`count_matches`], dropping whatever does not fit.
///
/// On return every annotation's `target_count` holds the number of links
/// actually kept beneath it. Returns that number for the root.
pub fn distribute(tree: &mut LinkTree, target: usize) -> usize {
    let LinkTree::Counted(attrs, inner) = tree else {
        return 0;
    };
    let realized = match &mut **inner {
        LinkTree::Leaf(links) => {
            truncate_unique(links, target);
            links.len()
        }
        LinkTree::Children(node) => {
            let shares = allocate(&node.children, target);
            let children = std::mem::take(&mut node.children);
            let mut realized = 0;
            for (mut child, share) in children.into_iter().zip(shares) {
                if let Some(share) = share {
                    realized += distribute(&mut child, share);
                    node.children.push(child);
                }
            }
            realized
        }
        nested @ LinkTree::Counted(..) => distribute(nested, target),
    };
    attrs.target_count = realized;
    realized
}

/// Count-filter `tree` and prune the copy to at most `target` links.
pub fn prune(tree: &LinkTree, accept: &dyn Fn(&Link) -> bool, target: usize) -> LinkTree {
    let mut pruned = count_matches(tree, accept);
    distribute(&mut pruned, target);
    pruned
}

/// Budget share of each child, `None` for children that are dropped.
///
/// Children are ranked by descending count (ties keep document order), at
/// most `target` of them with a positive count are selected, and the budget
/// is split proportionally walking from the smallest selected child up, each
/// getting at least one link. The largest child receives whatever remains.
fn allocate(children: &[LinkTree], target: usize) -> Vec<Option<usize>> {
    let mut ranked: Vec<(usize, usize)> = children
        .iter()
        .map(|child| child.count_attrs().map_or(0, |a| a.count))
        .enumerate()
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(target);
    let selected = ranked.iter().take_while(|(_, count)| *count > 0).count();
    ranked.truncate(selected);

    let mut shares = vec![None; children.len()];
    let mut remaining_sum: usize = ranked.iter().map(|(_, count)| count).sum();
    // A budget above the total changes nothing and would overflow the
    // products below.
    let mut remaining_target = target.min(remaining_sum);
    for &(index, count) in ranked.iter().rev() {
        let share = (count * remaining_target / remaining_sum).max(1);
        // At most `remaining_target` children are left and the smallest
        // goes first, so the budget never runs out early.
        debug_assert!(share <= remaining_target);
        remaining_sum -= count;
        remaining_target = remaining_target.saturating_sub(share);
        shares[index] = Some(share);
    }
    shares
}

/// Keep the first `target` distinct URLs, in order.
fn truncate_unique(links: &mut Vec<Link>, target: usize) {
    let mut seen = AHashSet::new();
    let mut kept = Vec::with_capacity(target.min(links.len()));
    for link in links.drain(..) {
        if kept.len() >= target {
            break;
        }
        if seen.insert(link.url.clone()) {
            kept.push(link);
        }
    }
    *links = kept;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Heading, NodeTag};

    fn section(name: &str, count: usize) -> LinkTree {
        let mut node = Children::new(Some(NodeTag::Heading(Heading {
            line_no: 1,
            raw_text: name.to_string(),
        })));
        for i in 0..count {
            node.add_link(Link::new(format!("https://{name}.example/{i}"), i + 2));
        }
        LinkTree::Children(node)
    }

    fn root(counts: &[usize]) -> LinkTree {
        let mut node = Children::new(None);
        for (i, count) in counts.iter().enumerate() {
            node.push(section(&format!("s{i}"), *count));
        }
        LinkTree::Children(node)
    }

    fn accept_all(_: &Link) -> bool {
        true
    }

    /// `(section name, filtered)` for each kept child of the root.
    fn shares(tree: &LinkTree) -> Vec<(String, usize)> {
        tree.children()
            .iter()
            .map(|child| {
                let name = match child.tag() {
                    Some(NodeTag::Heading(h)) => h.raw_text.clone(),
                    other => panic!("unexpected tag {other:?}"),
                };
                (name, child.count_attrs().unwrap().target_count)
            })
            .collect()
    }

    fn expect(pairs: &[(&str, usize)]) -> Vec<(String, usize)> {
        pairs.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    #[test]
    fn test_count_pass() {
        let tree = root(&[3, 0, 2]);
        let counted = count_matches(&tree, &|l: &Link| !l.url.ends_with("/0"));
        let attrs = counted.count_attrs().unwrap();
        assert_eq!(attrs.count, 3);
        assert_eq!(counted.children().len(), 2);
        assert_eq!(counted.children()[0].count_attrs().unwrap().count, 2);
        assert_eq!(counted.children()[1].count_attrs().unwrap().count, 1);
    }

    #[test]
    fn test_nothing_matches_keeps_root() {
        let pruned = prune(&root(&[2, 2]), &|_: &Link| false, 8);
        assert_eq!(
            pruned.count_attrs(),
            Some(CountAttrs {
                count: 0,
                target_count: 0
            })
        );
        assert!(pruned.children().is_empty());
    }

    #[test]
    fn test_proportional_shares() {
        let pruned = prune(&root(&[10, 5]), &accept_all, 8);
        assert_eq!(shares(&pruned), expect(&[("s0", 6), ("s1", 2)]));
        assert_eq!(pruned.count_attrs().unwrap().target_count, 8);
        assert_eq!(pruned.count_attrs().unwrap().count, 15);

        let pruned = prune(&root(&[5, 3, 2, 0, 4]), &accept_all, 8);
        assert_eq!(
            shares(&pruned),
            expect(&[("s0", 4), ("s1", 1), ("s2", 1), ("s4", 2)])
        );

        let pruned = prune(&root(&[100, 1, 1]), &accept_all, 3);
        assert_eq!(shares(&pruned), expect(&[("s0", 1), ("s1", 1), ("s2", 1)]));
    }

    #[test]
    fn test_budget_smaller_than_children() {
        let pruned = prune(&root(&[1, 1, 1, 1]), &accept_all, 2);
        assert_eq!(shares(&pruned), expect(&[("s0", 1), ("s1", 1)]));

        let pruned = prune(&root(&[3, 1]), &accept_all, 0);
        assert!(pruned.children().is_empty());
        assert_eq!(pruned.count_attrs().unwrap().target_count, 0);
    }

    #[test]
    fn test_realized_count_when_budget_exceeds_links() {
        let pruned = prune(&root(&[2, 2, 2]), &accept_all, 8);
        assert_eq!(shares(&pruned), expect(&[("s0", 2), ("s1", 2), ("s2", 2)]));
        assert_eq!(pruned.count_attrs().unwrap().target_count, 6);
    }

    #[test]
    fn test_huge_budget_keeps_everything() {
        let tree = root(&[7, 3, 5]);
        let pruned = prune(&tree, &accept_all, usize::MAX);
        assert_eq!(shares(&pruned), expect(&[("s0", 7), ("s1", 3), ("s2", 5)]));
        assert_eq!(pruned.count_attrs().unwrap().target_count, 15);
        assert!(pruned.links().eq(tree.links()));
    }

    #[test]
    fn test_budget_bound_and_zero_counts() {
        let tree = root(&[7, 0, 3, 12, 1, 1, 5, 0, 2]);
        for target in 0..30 {
            let pruned = prune(&tree, &accept_all, target);
            let total: usize = pruned
                .children()
                .iter()
                .map(|c| c.count_attrs().unwrap().target_count)
                .sum();
            assert!(total <= target, "target {target}: kept {total}");
            assert_eq!(pruned.link_count(), total);
            for child in pruned.children() {
                assert!(child.count_attrs().unwrap().count > 0);
            }
        }
    }

    #[test]
    fn test_prune_is_idempotent() {
        let tree = root(&[9, 4, 4, 1, 6]);
        for target in [1, 3, 8, 20] {
            let once = prune(&tree, &accept_all, target);
            let twice = prune(&once, &accept_all, target);
            assert_eq!(shares(&once), shares(&twice), "target {target}");
            assert!(once.links().eq(twice.links()), "target {target}");
        }
    }

    #[test]
    fn test_leaf_dedups_urls() {
        let mut node = Children::new(None);
        for (i, url) in ["a", "a", "b", "a", "c"].iter().enumerate() {
            node.add_link(Link::new(*url, i + 1));
        }
        let pruned = prune(&LinkTree::Children(node), &accept_all, 2);
        let kept: Vec<(&str, usize)> = pruned.links().map(|l| (l.url.as_str(), l.line_no)).collect();
        assert_eq!(kept, vec![("a", 1), ("b", 3)]);
    }

    #[test]
    fn test_source_tree_untouched() {
        let tree = root(&[4, 4]);
        let before = tree.clone();
        let _ = prune(&tree, &accept_all, 2);
        assert_eq!(tree, before);
    }
}
