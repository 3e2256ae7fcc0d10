//! In-memory spaces with an exact-match secondary index.
//!
//! A space holds fixed-arity records keyed by an opaque byte key. Every
//! attribute position is an independently searchable dimension, indexed as a
//! posting list per `(dimension, value)` pair.
//!
//! Writes are accepted immediately but only become searchable once the
//! configured propagation delay has elapsed. Pending writes are promoted
//! lazily, whenever a reader touches the space, which gives clients the same
//! write-then-search lag they would see against a replicated store.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use thiserror::Error;

/// Errors returned by space operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SpaceError {
    #[error("space {0:?} does not exist")]
    UnknownSpace(String),
    #[error("space {0:?} already exists")]
    DuplicateSpace(String),
    #[error("space {0:?} must declare at least one dimension")]
    NoDimensions(String),
    #[error("space {space:?} expects {expected} attributes, got {actual}")]
    Arity {
        space: String,
        expected: usize,
        actual: usize,
    },
    #[error("space {space:?} has {dimensions} dimensions, no dimension {dimension}")]
    Dimension {
        space: String,
        dimensions: usize,
        dimension: usize,
    },
}

/// Declaration of a space: `name:dimensions`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpaceSpec {
    pub name: String,
    pub dimensions: usize,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid space {0:?} (expected name:dimensions)")]
pub struct SpaceSpecError(String);

impl FromStr for SpaceSpec {
    type Err = SpaceSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, dims) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| SpaceSpecError(s.to_string()))?;
        let dimensions = dims
            .parse::<usize>()
            .map_err(|_| SpaceSpecError(s.to_string()))?;
        if name.is_empty() || dimensions == 0 {
            return Err(SpaceSpecError(s.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            dimensions,
        })
    }
}

struct PendingWrite {
    visible_at: Instant,
    key: Bytes,
    attributes: Vec<Bytes>,
}

struct Space {
    dimensions: usize,
    records: HashMap<Bytes, Vec<Bytes>>,
    /// One map per dimension: value -> keys holding that value.
    postings: Vec<HashMap<Bytes, BTreeSet<Bytes>>>,
    /// Accepted writes ordered by `visible_at`.
    pending: VecDeque<PendingWrite>,
}

impl Space {
    fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            records: HashMap::new(),
            postings: (0..dimensions).map(|_| HashMap::new()).collect(),
            pending: VecDeque::new(),
        }
    }

    fn promote(&mut self, now: Instant) {
        while self
            .pending
            .front()
            .is_some_and(|write| write.visible_at <= now)
        {
            if let Some(write) = self.pending.pop_front() {
                self.apply(write.key, write.attributes);
            }
        }
    }

    fn apply(&mut self, key: Bytes, attributes: Vec<Bytes>) {
        if let Some(previous) = self.records.remove(&key) {
            for (postings, value) in self.postings.iter_mut().zip(previous.iter()) {
                if let Some(keys) = postings.get_mut(value) {
                    keys.remove(&key);
                    if keys.is_empty() {
                        postings.remove(value);
                    }
                }
            }
        }
        for (postings, value) in self.postings.iter_mut().zip(attributes.iter()) {
            postings
                .entry(value.clone())
                .or_default()
                .insert(key.clone());
        }
        self.records.insert(key, attributes);
    }

    fn search(&self, terms: &[(usize, Bytes)]) -> Vec<Bytes> {
        if terms.is_empty() {
            let mut keys = self.records.keys().cloned().collect::<Vec<_>>();
            keys.sort();
            return keys;
        }

        let mut lists = Vec::with_capacity(terms.len());
        for (dimension, value) in terms {
            match self
                .postings
                .get(*dimension)
                .and_then(|postings| postings.get(value))
            {
                Some(keys) => lists.push(keys),
                None => return Vec::new(),
            }
        }
        // Walk the shortest posting list and probe the others.
        lists.sort_by_key(|keys| keys.len());
        let Some((shortest, rest)) = lists.split_first() else {
            return Vec::new();
        };
        shortest
            .iter()
            .filter(|key| rest.iter().all(|keys| keys.contains(*key)))
            .cloned()
            .collect()
    }
}

/// Thread-safe collection of named spaces.
pub struct SpaceStore {
    spaces: Mutex<HashMap<String, Space>>,
    propagation_delay: Duration,
}

impl SpaceStore {
    pub fn new(propagation_delay: Duration) -> Self {
        Self {
            spaces: Mutex::new(HashMap::new()),
            propagation_delay,
        }
    }

    /// Build a store with every space in `specs` already declared.
    pub fn with_spaces(specs: &[SpaceSpec], propagation_delay: Duration) -> Result<Self, SpaceError> {
        let store = Self::new(propagation_delay);
        for spec in specs {
            store.create_space(&spec.name, spec.dimensions)?;
        }
        Ok(store)
    }

    pub fn create_space(&self, name: &str, dimensions: usize) -> Result<(), SpaceError> {
        if dimensions == 0 {
            return Err(SpaceError::NoDimensions(name.to_string()));
        }
        let mut spaces = self.lock();
        if spaces.contains_key(name) {
            return Err(SpaceError::DuplicateSpace(name.to_string()));
        }
        spaces.insert(name.to_string(), Space::new(dimensions));
        Ok(())
    }

    /// Accept a write. The record becomes searchable after the propagation delay.
    pub fn put(&self, space: &str, key: Bytes, attributes: Vec<Bytes>) -> Result<(), SpaceError> {
        let mut spaces = self.lock();
        let target = spaces
            .get_mut(space)
            .ok_or_else(|| SpaceError::UnknownSpace(space.to_string()))?;
        if attributes.len() != target.dimensions {
            return Err(SpaceError::Arity {
                space: space.to_string(),
                expected: target.dimensions,
                actual: attributes.len(),
            });
        }

        if self.propagation_delay.is_zero() {
            target.apply(key, attributes);
        } else {
            target.pending.push_back(PendingWrite {
                visible_at: Instant::now() + self.propagation_delay,
                key,
                attributes,
            });
        }
        Ok(())
    }

    /// Return the keys of all visible records whose attributes equal every term.
    ///
    /// Keys are returned in ascending byte order. An empty term list matches
    /// every visible record.
    pub fn search(&self, space: &str, terms: &[(usize, Bytes)]) -> Result<Vec<Bytes>, SpaceError> {
        let mut spaces = self.lock();
        let target = spaces
            .get_mut(space)
            .ok_or_else(|| SpaceError::UnknownSpace(space.to_string()))?;
        if let Some((dimension, _)) = terms.iter().find(|(d, _)| *d >= target.dimensions) {
            return Err(SpaceError::Dimension {
                space: space.to_string(),
                dimensions: target.dimensions,
                dimension: *dimension,
            });
        }
        target.promote(Instant::now());
        Ok(target.search(terms))
    }

    /// Instant at which every write accepted so far becomes visible, or `None`
    /// when nothing is pending.
    pub fn settle_deadline(&self, space: &str) -> Result<Option<Instant>, SpaceError> {
        let spaces = self.lock();
        let target = spaces
            .get(space)
            .ok_or_else(|| SpaceError::UnknownSpace(space.to_string()))?;
        Ok(target.pending.back().map(|write| write.visible_at))
    }

    /// Promote every pending write whose propagation delay has elapsed.
    pub fn promote(&self, space: &str) -> Result<(), SpaceError> {
        let mut spaces = self.lock();
        let target = spaces
            .get_mut(space)
            .ok_or_else(|| SpaceError::UnknownSpace(space.to_string()))?;
        target.promote(Instant::now());
        Ok(())
    }

    /// Number of searchable records in `space`.
    pub fn visible_len(&self, space: &str) -> Result<usize, SpaceError> {
        let mut spaces = self.lock();
        let target = spaces
            .get_mut(space)
            .ok_or_else(|| SpaceError::UnknownSpace(space.to_string()))?;
        target.promote(Instant::now());
        Ok(target.records.len())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Space>> {
        self.spaces.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
