//! Append-only arena graph
//!
//! Nodes live in insertion order and are indexed by a stable key. Edges are
//! `(from, to, seq)` triples in an append-only sequence. There is no removal.

use puppeteer_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge<K> {
    pub from: K,
    pub to: K,
    pub seq: u64,
}

#[derive(Clone, Debug)]
pub struct Graph<K, N> {
    nodes: Vec<N>,
    index: HashMap<K, usize>,
    edges: Vec<Edge<K>>,
}

impl<K, N> Default for Graph<K, N> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
        }
    }
}

impl<K: Eq + Hash, N: PartialEq> PartialEq for Graph<K, N> {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.index == other.index && self.edges == other.edges
    }
}

impl<K, N> Graph<K, N>
where
    K: Clone + Eq + Hash + Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node under `key`. Fails if the key is already present.
    pub fn add_node(&mut self, key: K, node: N) -> Result<usize> {
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateNode(key.to_string()));
        }
        let position = self.nodes.len();
        self.nodes.push(node);
        self.index.insert(key, position);
        Ok(position)
    }

    /// Append an edge and return its sequence number. Both endpoints must exist.
    pub fn add_edge(&mut self, from: K, to: K) -> Result<u64> {
        for key in [&from, &to] {
            if !self.index.contains_key(key) {
                return Err(Error::UnknownNode(key.to_string()));
            }
        }
        let seq = self.edges.len() as u64;
        self.edges.push(Edge { from, to, seq });
        Ok(seq)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn node(&self, key: &K) -> Option<&N> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    /// Insertion position of a node.
    pub fn position(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Direct successors of `key`, in edge sequence order.
    pub fn successors(&self, key: &K) -> Vec<K> {
        self.edges
            .iter()
            .filter(|e| &e.from == key)
            .map(|e| e.to.clone())
            .collect()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    /// Edges in sequence order.
    pub fn edges(&self) -> &[Edge<K>] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
