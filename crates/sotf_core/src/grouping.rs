use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::structure::{Position, position_of};

pub const DEFAULT_GROUP_THRESHOLD: f64 = 5.0;

/// Connected components of the "closer than threshold" graph, as a side
/// table over the flat structure indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    group_ids: Vec<usize>,
    group_count: usize,
}

impl Grouping {
    pub fn group_of(&self, index: usize) -> Option<usize> {
        self.group_ids.get(index).copied()
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn len(&self) -> usize {
        self.group_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group_ids.is_empty()
    }

    pub fn label(&self, group: usize) -> String {
        group_label(group)
    }

    pub fn members(&self, group: usize) -> Vec<usize> {
        self.group_ids
            .iter()
            .enumerate()
            .filter(|(_, id)| **id == group)
            .map(|(index, _)| index)
            .collect()
    }

    /// Members of every group, indexed by group id.
    pub fn groups(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.group_count];
        for (index, &id) in self.group_ids.iter().enumerate() {
            groups[id].push(index);
        }
        groups
    }
}

pub fn group_label(group: usize) -> String {
    format!("Structure Group {}", group + 1)
}

pub fn group<T: Borrow<Value>>(structures: &[T], threshold: f64) -> Grouping {
    let positions = positions(structures);
    let adjacency = adjacency(&positions, threshold);

    let mut group_ids = vec![usize::MAX; positions.len()];
    let mut group_count = 0;
    for start in 0..positions.len() {
        if group_ids[start] != usize::MAX {
            continue;
        }
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if group_ids[current] != usize::MAX {
                continue;
            }
            group_ids[current] = group_count;
            stack.extend(
                adjacency[current]
                    .iter()
                    .copied()
                    .filter(|&next| group_ids[next] == usize::MAX),
            );
        }
        group_count += 1;
    }

    Grouping {
        group_ids,
        group_count,
    }
}

/// Indices of every other structure closer than `threshold`, per structure.
pub fn nearby<T: Borrow<Value>>(structures: &[T], threshold: f64) -> Vec<Vec<usize>> {
    adjacency(&positions(structures), threshold)
}

fn positions<T: Borrow<Value>>(structures: &[T]) -> Vec<Option<Position>> {
    structures
        .iter()
        .map(|record| position_of(record.borrow()).valid())
        .collect()
}

// Structures without a usable position are never adjacent to anything.
fn adjacency(positions: &[Option<Position>], threshold: f64) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); positions.len()];
    for i in 0..positions.len() {
        let Some(a) = positions[i] else { continue };
        for j in (i + 1)..positions.len() {
            let Some(b) = positions[j] else { continue };
            if a.distance(&b) < threshold {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }
    adjacency
}
