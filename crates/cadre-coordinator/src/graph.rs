//! Dependency cycle detection over a task graph.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use cadre_core::TaskId;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Find a dependency cycle, returning the ids along it in dependency order.
///
/// Edges point from a task to each of its dependencies. Dependencies on ids
/// that are not in the graph are leaves.
pub fn find_cycle(graph: &BTreeMap<TaskId, BTreeSet<TaskId>>) -> Option<Vec<TaskId>> {
    let mut marks: HashMap<&TaskId, Mark> = HashMap::with_capacity(graph.len());

    for root in graph.keys() {
        if marks.contains_key(root) {
            continue;
        }
        // Iterative DFS; each frame is a node and the iterator over its edges.
        let mut path: Vec<&TaskId> = vec![root];
        let mut stack = vec![graph[root].iter()];
        let _ = marks.insert(root, Mark::Visiting);

        while let Some(edges) = stack.last_mut() {
            match edges.next() {
                Some(dep) => match marks.get(dep) {
                    Some(Mark::Visiting) => {
                        let start = path.iter().position(|id| *id == dep).unwrap_or(0);
                        let mut cycle: Vec<TaskId> =
                            path[start..].iter().map(|id| (*id).clone()).collect();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    Some(Mark::Done) => {}
                    None => {
                        if let Some((key, next)) = graph.get_key_value(dep) {
                            let _ = marks.insert(key, Mark::Visiting);
                            path.push(key);
                            stack.push(next.iter());
                        }
                    }
                },
                None => {
                    if let Some(done) = path.pop() {
                        let _ = marks.insert(done, Mark::Done);
                    }
                    let _ = stack.pop();
                }
            }
        }
    }
    None
}
