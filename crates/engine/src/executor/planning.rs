//! Child ordering and dependency planning for jobs.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use crate::{error::DispatchError, exertion::Pipe};

/// Dependency graph of a job's children, indexed by declaration position.
struct PipeGraph {
    in_degrees: Vec<usize>,
    adjacency: HashMap<usize, Vec<usize>>,
}

fn build_graph(names: &[&str], pipes: &[Pipe]) -> Result<PipeGraph, DispatchError> {
    let mut lookup: IndexMap<&str, usize> = IndexMap::new();
    for (index, name) in names.iter().enumerate() {
        if lookup.insert(*name, index).is_some() {
            return Err(DispatchError::DuplicateChild(name.to_string()));
        }
    }

    let mut in_degrees = vec![0usize; names.len()];
    let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut seen_edges = HashSet::new();

    for pipe in pipes {
        let source = *lookup
            .get(pipe.source_unit.as_str())
            .ok_or_else(|| DispatchError::UnknownChild(pipe.source_unit.clone()))?;
        let dest = *lookup
            .get(pipe.dest_unit.as_str())
            .ok_or_else(|| DispatchError::UnknownChild(pipe.dest_unit.clone()))?;
        if source == dest {
            return Err(DispatchError::SelfPipe(pipe.source_unit.clone()));
        }
        if !seen_edges.insert((source, dest)) {
            continue;
        }
        in_degrees[dest] += 1;
        adjacency.entry(source).or_default().push(dest);
    }

    Ok(PipeGraph { in_degrees, adjacency })
}

fn cycle_error(names: &[&str], in_degrees: &[usize]) -> DispatchError {
    let mut remaining: Vec<String> = in_degrees
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree > 0)
        .map(|(index, _)| names[index].to_string())
        .collect();
    remaining.sort();
    DispatchError::PipeCycle(remaining)
}

/// Topological order of children, keeping declaration order among independent ones.
///
/// Returns an error for duplicate child names, pipes naming unknown children,
/// self-pipes, or cycles.
pub fn order_children(names: &[&str], pipes: &[Pipe]) -> Result<Vec<usize>, DispatchError> {
    let PipeGraph {
        mut in_degrees,
        adjacency,
    } = build_graph(names, pipes)?;

    let mut queue: VecDeque<usize> = (0..names.len()).filter(|index| in_degrees[*index] == 0).collect();
    let mut ordered = Vec::with_capacity(names.len());
    while let Some(index) = queue.pop_front() {
        ordered.push(index);
        if let Some(children) = adjacency.get(&index) {
            for child in children {
                in_degrees[*child] -= 1;
                if in_degrees[*child] == 0 {
                    queue.push_back(*child);
                }
            }
        }
    }

    if ordered.len() != names.len() {
        return Err(cycle_error(names, &in_degrees));
    }
    Ok(ordered)
}

/// Groups children into waves: every child's pipe sources sit in earlier waves.
pub fn parallel_waves(names: &[&str], pipes: &[Pipe]) -> Result<Vec<Vec<usize>>, DispatchError> {
    let PipeGraph {
        mut in_degrees,
        adjacency,
    } = build_graph(names, pipes)?;

    let mut current: Vec<usize> = (0..names.len()).filter(|index| in_degrees[*index] == 0).collect();
    let mut waves = Vec::new();
    let mut placed = 0usize;
    while !current.is_empty() {
        placed += current.len();
        let mut next = Vec::new();
        for index in &current {
            if let Some(children) = adjacency.get(index) {
                for child in children {
                    in_degrees[*child] -= 1;
                    if in_degrees[*child] == 0 {
                        next.push(*child);
                    }
                }
            }
        }
        next.sort_unstable();
        waves.push(std::mem::replace(&mut current, next));
    }

    if placed != names.len() {
        return Err(cycle_error(names, &in_degrees));
    }
    Ok(waves)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe(source: &str, dest: &str) -> Pipe {
        Pipe::new(source, "out", dest, "in")
    }

    #[test]
    fn pipes_override_declaration_order() {
        let order = order_children(&["c", "a", "b"], &[pipe("a", "c"), pipe("b", "c")]).unwrap();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn independent_children_share_a_wave() {
        let waves = parallel_waves(&["a", "b", "c", "d"], &[pipe("a", "c"), pipe("c", "d")]).unwrap();
        assert_eq!(waves, vec![vec![0, 1], vec![2], vec![3]]);
    }

    #[test]
    fn unknown_child_is_rejected() {
        let error = order_children(&["a"], &[pipe("a", "ghost")]).unwrap_err();
        assert!(matches!(error, DispatchError::UnknownChild(ref name) if name == "ghost"));
    }

    #[test]
    fn cycles_are_reported() {
        let error = parallel_waves(&["a", "b"], &[pipe("a", "b"), pipe("b", "a")]).unwrap_err();
        assert!(error.to_string().contains("cycle detected"), "unexpected error: {error}");
    }

    #[test]
    fn duplicate_names_and_self_pipes_fail() {
        assert!(matches!(order_children(&["a", "a"], &[]), Err(DispatchError::DuplicateChild(_))));
        assert!(matches!(order_children(&["a"], &[pipe("a", "a")]), Err(DispatchError::SelfPipe(_))));
    }
}
