use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One schema migration: a reversible change identified by an integer ID
/// inside the migration graph of a single schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub up_query: String,
    #[serde(default)]
    pub down_query: String,
    /// Requires superuser access to apply.
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub non_idempotent: bool,
    #[serde(default)]
    pub parents: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("duplicate migration id: {0}")]
    DuplicateId(i32),
    #[error("migration {id} references unknown parent {parent}")]
    UnknownParent { id: i32, parent: i32 },
    #[error("cycle detected among migrations: {0:?}")]
    Cycle(Vec<i32>),
    #[error("unknown migration: {0}")]
    UnknownMigration(i32),
}

/// The migration graph of one schema, kept in a deterministic topological
/// order (parents before children, ties broken by ascending ID).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Definition>", into = "Vec<Definition>")]
pub struct Definitions {
    ordered: Vec<Definition>,
    positions: BTreeMap<i32, usize>,
}

impl Definitions {
    pub fn new(definitions: Vec<Definition>) -> Result<Self, DefinitionError> {
        let mut by_id: BTreeMap<i32, Definition> = BTreeMap::new();
        for definition in definitions {
            let id = definition.id;
            if by_id.insert(id, definition).is_some() {
                return Err(DefinitionError::DuplicateId(id));
            }
        }

        // Kahn's algorithm; children[p] lists migrations that name p as a parent.
        let mut in_degree: BTreeMap<i32, usize> = BTreeMap::new();
        let mut children: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
        for (id, definition) in &by_id {
            let parents: BTreeSet<i32> = definition.parents.iter().copied().collect();
            for parent in &parents {
                if !by_id.contains_key(parent) {
                    return Err(DefinitionError::UnknownParent {
                        id: *id,
                        parent: *parent,
                    });
                }
                children.entry(*parent).or_default().push(*id);
            }
            in_degree.insert(*id, parents.len());
        }

        let mut queue: VecDeque<i32> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order: Vec<i32> = Vec::with_capacity(by_id.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);

            let mut ready: BTreeSet<i32> = BTreeSet::new();
            for child in children.get(&id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*child);
                    }
                }
            }
            queue.extend(ready);
        }

        if order.len() != by_id.len() {
            let placed: BTreeSet<i32> = order.iter().copied().collect();
            let remaining = by_id
                .keys()
                .filter(|id| !placed.contains(id))
                .copied()
                .collect();
            return Err(DefinitionError::Cycle(remaining));
        }

        let mut ordered = Vec::with_capacity(order.len());
        let mut positions = BTreeMap::new();
        for id in order {
            if let Some(definition) = by_id.remove(&id) {
                positions.insert(id, ordered.len());
                ordered.push(definition);
            }
        }

        Ok(Self { ordered, positions })
    }

    /// All definitions in topological order.
    pub fn all(&self) -> &[Definition] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn get(&self, id: i32) -> Option<&Definition> {
        self.positions.get(&id).map(|&idx| &self.ordered[idx])
    }

    /// Definitions that are no other definition's parent.
    pub fn leaves(&self) -> Vec<&Definition> {
        let parents: BTreeSet<i32> = self
            .ordered
            .iter()
            .flat_map(|d| d.parents.iter().copied())
            .collect();
        self.ordered
            .iter()
            .filter(|d| !parents.contains(&d.id))
            .collect()
    }

    /// The targets plus everything they transitively depend on.
    pub fn ancestors(&self, targets: &[i32]) -> Result<BTreeSet<i32>, DefinitionError> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<i32> = Vec::with_capacity(targets.len());
        for &target in targets {
            if !self.positions.contains_key(&target) {
                return Err(DefinitionError::UnknownMigration(target));
            }
            stack.push(target);
        }

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(definition) = self.get(id) {
                stack.extend(definition.parents.iter().copied());
            }
        }

        Ok(seen)
    }

    /// Migrations to apply, in order, to move from `applied` up to `targets`.
    pub fn up(&self, applied: &[i32], targets: &[i32]) -> Result<Vec<&Definition>, DefinitionError> {
        let wanted = self.ancestors(targets)?;
        let applied: BTreeSet<i32> = applied.iter().copied().collect();

        Ok(self
            .ordered
            .iter()
            .filter(|d| wanted.contains(&d.id) && !applied.contains(&d.id))
            .collect())
    }

    /// Migrations to undo, in order, to move from `applied` down to `targets`.
    /// Applied IDs outside this graph are ignored.
    pub fn down(
        &self,
        applied: &[i32],
        targets: &[i32],
    ) -> Result<Vec<&Definition>, DefinitionError> {
        let keep = self.ancestors(targets)?;
        let applied: BTreeSet<i32> = applied.iter().copied().collect();

        Ok(self
            .ordered
            .iter()
            .rev()
            .filter(|d| applied.contains(&d.id) && !keep.contains(&d.id))
            .collect())
    }
}

impl TryFrom<Vec<Definition>> for Definitions {
    type Error = DefinitionError;

    fn try_from(value: Vec<Definition>) -> Result<Self, Self::Error> {
        Definitions::new(value)
    }
}

impl From<Definitions> for Vec<Definition> {
    fn from(value: Definitions) -> Self {
        value.ordered
    }
}

/// Content hash of the privileged migrations in `definitions`, or `None` when
/// none of them is privileged. Operators pass this hash back to authorize a
/// run once they have applied the privileged statements by hand.
pub fn privileged_hash<'a>(definitions: impl IntoIterator<Item = &'a Definition>) -> Option<String> {
    let mut hasher = blake3::Hasher::new();
    let mut any = false;
    for definition in definitions.into_iter().filter(|d| d.privileged) {
        any = true;
        hasher.update(&definition.id.to_le_bytes());
        hasher.update(definition.up_query.as_bytes());
        hasher.update(&[0]);
        hasher.update(definition.down_query.as_bytes());
        hasher.update(&[0]);
    }
    any.then(|| hex::encode(hasher.finalize().as_bytes()))
}
