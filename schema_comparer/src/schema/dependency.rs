//! Foreign-key dependency ordering
//!
//! An object depends on every other object of the same set that one of its
//! foreign keys references. Creation order puts dependencies first; drop
//! order is the exact reverse.
//!
//! Cycles (mutual foreign keys, longer rings) are broken by ignoring the edge
//! that would close the cycle during the depth-first walk. The result is a
//! valid order for the remaining edges but not necessarily the one with the
//! fewest ignored edges. Self references never count as edges.

use std::collections::HashMap;

use crate::schema::types::DatabaseObject;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Dependency edges between the objects of one set
pub struct DependencyGraph<'a> {
    names: Vec<&'a str>,
    /// `edges[i]` lists the objects `i` references, in constraint order
    edges: Vec<Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
    /// Derive edges from the foreign keys of `objects`.
    ///
    /// References to objects outside the set are ignored.
    pub fn build(objects: &'a [DatabaseObject]) -> Self {
        let names: Vec<&str> = objects.iter().map(DatabaseObject::name).collect();
        let positions: HashMap<&str, usize> =
            names.iter().enumerate().map(|(i, name)| (*name, i)).collect();

        let edges = objects
            .iter()
            .enumerate()
            .map(|(i, object)| {
                let mut targets = Vec::new();
                for target in object.foreign_key_targets() {
                    if let Some(&j) = positions.get(target) {
                        if j != i && !targets.contains(&j) {
                            targets.push(j);
                        }
                    }
                }
                targets
            })
            .collect();

        Self { names, edges }
    }

    /// Whether `from` references `to` directly
    pub fn depends_on(&self, from: &str, to: &str) -> bool {
        let position = |name: &str| self.names.iter().position(|n| *n == name);
        match (position(from), position(to)) {
            (Some(i), Some(j)) => self.edges[i].contains(&j),
            _ => false,
        }
    }

    /// Indexes in creation order, plus the `(from, to)` edges ignored to break cycles
    pub fn creation_order(&self) -> (Vec<usize>, Vec<(usize, usize)>) {
        let mut marks = vec![Mark::Unvisited; self.names.len()];
        let mut order = Vec::with_capacity(self.names.len());
        let mut ignored = Vec::new();

        for start in 0..self.names.len() {
            if marks[start] == Mark::Unvisited {
                self.visit(start, &mut marks, &mut order, &mut ignored);
            }
        }

        (order, ignored)
    }

    fn visit(
        &self,
        node: usize,
        marks: &mut [Mark],
        order: &mut Vec<usize>,
        ignored: &mut Vec<(usize, usize)>,
    ) {
        marks[node] = Mark::Visiting;

        for &target in &self.edges[node] {
            match marks[target] {
                Mark::Unvisited => self.visit(target, marks, order, ignored),
                Mark::Visiting => ignored.push((node, target)),
                Mark::Done => {}
            }
        }

        marks[node] = Mark::Done;
        order.push(node);
    }
}

/// Order objects so that each one follows every object it references
pub fn sort_for_create(objects: Vec<DatabaseObject>) -> Vec<DatabaseObject> {
    let order = {
        let graph = DependencyGraph::build(&objects);
        let (order, ignored) = graph.creation_order();
        for (from, to) in ignored {
            tracing::warn!(
                from = graph.names[from],
                to = graph.names[to],
                "Cyclic foreign key dependency, ignoring edge for ordering"
            );
        }
        order
    };

    let mut slots: Vec<Option<DatabaseObject>> = objects.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

/// Order objects so that each one precedes every object it references
pub fn sort_for_drop(objects: Vec<DatabaseObject>) -> Vec<DatabaseObject> {
    let mut ordered = sort_for_create(objects);
    ordered.reverse();
    ordered
}
