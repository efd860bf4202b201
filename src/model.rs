//! Instance, item, bin and pattern types shared by every other module.
//!
//! Items and bins are immutable once an [`Instance`] is built; patterns are immutable once
//! constructed and are interned by content within a [`PatternPool`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{BpError, BpResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: usize,
    pub weight: u64,
    pub profit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bin {
    pub id: usize,
    pub capacity: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub items: Vec<Item>,
    pub bins: Vec<Bin>,
    total_capacity: u64,
    total_weight: u64,
    total_profit: u64,
}

impl Instance {
    pub fn new(name: impl Into<String>, items: Vec<Item>, bins: Vec<Bin>) -> BpResult<Self> {
        if items.is_empty() {
            return Err(BpError::InvalidInstance("instance has no items".into()));
        }
        if bins.is_empty() {
            return Err(BpError::InvalidInstance("instance has no bins".into()));
        }
        for (i, item) in items.iter().enumerate() {
            if item.id != i {
                return Err(BpError::InvalidInstance(format!(
                    "item id {} does not match position {}",
                    item.id, i
                )));
            }
            if item.weight == 0 || item.profit == 0 {
                return Err(BpError::InvalidInstance(format!(
                    "item {i} must have positive weight and profit"
                )));
            }
        }
        for (i, bin) in bins.iter().enumerate() {
            if bin.id != i {
                return Err(BpError::InvalidInstance(format!(
                    "bin id {} does not match position {}",
                    bin.id, i
                )));
            }
            if bin.capacity == 0 {
                return Err(BpError::InvalidInstance(format!(
                    "bin {i} must have positive capacity"
                )));
            }
        }

        let max_capacity = bins.iter().map(|b| b.capacity).max().unwrap_or(0);
        if !items.iter().any(|it| it.weight <= max_capacity) {
            return Err(BpError::InvalidInstance(
                "no item fits in any bin".to_string(),
            ));
        }

        let total_capacity = bins.iter().map(|b| b.capacity).sum();
        let total_weight = items.iter().map(|it| it.weight).sum();
        let total_profit = items.iter().map(|it| it.profit).sum();

        Ok(Instance {
            name: name.into(),
            items,
            bins,
            total_capacity,
            total_weight,
            total_profit,
        })
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    pub fn n_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn total_capacity(&self) -> u64 {
        self.total_capacity
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn total_profit(&self) -> u64 {
        self.total_profit
    }

    pub fn capacity(&self, bin_id: usize) -> u64 {
        self.bins[bin_id].capacity
    }
}

/// A monotone, instance-scoped counter used only to tag patterns for human-readable LP variable
/// names. Never participates in equality or hashing.
#[derive(Debug, Default)]
pub struct GenIdCounter(AtomicU64);

impl GenIdCounter {
    pub fn new() -> Self {
        GenIdCounter(AtomicU64::new(0))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// A feasible subset of items, cached with its aggregate weight and profit.
///
/// Equality and hashing are by `bits` only: `gen_id` is a display tag, not semantic content.
#[derive(Debug, Clone)]
pub struct Pattern {
    bits: BitVec,
    pub weight: u64,
    pub profit: u64,
    pub gen_id: u64,
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}
impl Eq for Pattern {}

impl std::hash::Hash for Pattern {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
    }
}

impl Pattern {
    pub fn empty(n_items: usize, gen_id: u64) -> Self {
        Pattern {
            bits: bitvec![0; n_items],
            weight: 0,
            profit: 0,
            gen_id,
        }
    }

    pub fn from_items(instance: &Instance, selected: &[usize], gen_id: u64) -> Self {
        let mut bits = bitvec![0; instance.n_items()];
        let mut weight = 0u64;
        let mut profit = 0u64;
        for &j in selected {
            if !bits[j] {
                bits.set(j, true);
                weight += instance.items[j].weight;
                profit += instance.items[j].profit;
            }
        }
        Pattern {
            bits,
            weight,
            profit,
            gen_id,
        }
    }

    pub fn from_bits(instance: &Instance, bits: BitVec, gen_id: u64) -> Self {
        let mut weight = 0u64;
        let mut profit = 0u64;
        for j in bits.iter_ones() {
            weight += instance.items[j].weight;
            profit += instance.items[j].profit;
        }
        Pattern {
            bits,
            weight,
            profit,
            gen_id,
        }
    }

    pub fn contains(&self, item: usize) -> bool {
        self.bits[item]
    }

    pub fn iter_items(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    pub fn bits(&self) -> &BitSlice {
        &self.bits
    }
}

/// Which pool a [`Pattern`] lives in: the aggregated pool `P0`, or a per-bin pool `Pi(bin_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolId {
    P0,
    Pi(usize),
}

impl PoolId {
    pub fn capacity(self, instance: &Instance) -> u64 {
        match self {
            PoolId::P0 => instance.total_capacity(),
            PoolId::Pi(i) => instance.capacity(i),
        }
    }
}

/// The collection of patterns known to the master, indexed by pool, content-unique within a pool.
#[derive(Debug, Default)]
pub struct PatternPool {
    p0: Vec<Pattern>,
    pi: Vec<Vec<Pattern>>,
    p0_index: HashSet<u64>,
    pi_index: Vec<HashSet<u64>>,
}

fn bits_hash(bits: &BitSlice) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    bits.hash(&mut hasher);
    hasher.finish()
}

impl PatternPool {
    pub fn new(n_bins: usize) -> Self {
        PatternPool {
            p0: Vec::new(),
            pi: vec![Vec::new(); n_bins],
            p0_index: HashSet::new(),
            pi_index: vec![HashSet::new(); n_bins],
        }
    }

    pub fn add_p0(&mut self, instance: &Instance, p: Pattern) -> BpResult<bool> {
        if p.weight > instance.total_capacity() {
            return Err(BpError::InfeasiblePattern {
                weight: p.weight,
                capacity: instance.total_capacity(),
            });
        }
        let h = bits_hash(p.bits());
        if self.p0_index.contains(&h) {
            return Ok(false);
        }
        self.p0_index.insert(h);
        self.p0.push(p);
        Ok(true)
    }

    pub fn add_pi(&mut self, instance: &Instance, bin_id: usize, p: Pattern) -> BpResult<bool> {
        let cap = instance.capacity(bin_id);
        if p.weight > cap {
            return Err(BpError::InfeasiblePattern {
                weight: p.weight,
                capacity: cap,
            });
        }
        let h = bits_hash(p.bits());
        if self.pi_index[bin_id].contains(&h) {
            return Ok(false);
        }
        self.pi_index[bin_id].insert(h);
        self.pi[bin_id].push(p);
        Ok(true)
    }

    pub fn contains_p0(&self, p: &Pattern) -> bool {
        self.p0_index.contains(&bits_hash(p.bits()))
    }

    pub fn contains_pi(&self, bin_id: usize, p: &Pattern) -> bool {
        self.pi_index[bin_id].contains(&bits_hash(p.bits()))
    }

    /// Removes the pattern with the given `bits` from P0, if present. Returns whether anything
    /// was removed. Not used by column generation (pools only grow during a run) but part of the
    /// pool's contract alongside `add`/`clear`/`contains`.
    pub fn remove_p0(&mut self, bits: &BitSlice) -> bool {
        let h = bits_hash(bits);
        if !self.p0_index.remove(&h) {
            return false;
        }
        self.p0.retain(|p| p.bits() != bits);
        true
    }

    /// Removes the pattern with the given `bits` from `Pi(bin_id)`, if present.
    pub fn remove_pi(&mut self, bin_id: usize, bits: &BitSlice) -> bool {
        let h = bits_hash(bits);
        if !self.pi_index[bin_id].remove(&h) {
            return false;
        }
        self.pi[bin_id].retain(|p| p.bits() != bits);
        true
    }

    pub fn iter_p0(&self) -> impl Iterator<Item = &Pattern> {
        self.p0.iter()
    }

    pub fn iter_pi(&self, bin_id: usize) -> impl Iterator<Item = &Pattern> {
        self.pi[bin_id].iter()
    }

    pub fn n_bins(&self) -> usize {
        self.pi.len()
    }

    pub fn len_p0(&self) -> usize {
        self.p0.len()
    }

    pub fn len_pi(&self, bin_id: usize) -> usize {
        self.pi[bin_id].len()
    }

    pub fn clear(&mut self) {
        self.p0.clear();
        self.p0_index.clear();
        for (v, idx) in self.pi.iter_mut().zip(self.pi_index.iter_mut()) {
            v.clear();
            idx.clear();
        }
    }

    /// Builds a node-scoped pool by filtering `self` against branching fixings (§4.7): P0 keeps
    /// only patterns containing every required item and no forbidden item, Pi(i) keeps only
    /// patterns containing no forbidden item.
    pub fn filter_for_fixings(&self, fixings: &std::collections::HashMap<usize, bool>) -> PatternPool {
        let required: Vec<usize> = fixings
            .iter()
            .filter(|(_, &v)| v)
            .map(|(&j, _)| j)
            .collect();
        let forbidden: Vec<usize> = fixings
            .iter()
            .filter(|(_, &v)| !v)
            .map(|(&j, _)| j)
            .collect();

        let mut out = PatternPool::new(self.n_bins());
        for p in &self.p0 {
            let ok_forbidden = forbidden.iter().all(|&j| !p.contains(j));
            let ok_required = required.iter().all(|&j| p.contains(j));
            if ok_forbidden && ok_required {
                let h = bits_hash(p.bits());
                out.p0_index.insert(h);
                out.p0.push(p.clone());
            }
        }
        for (i, pool) in self.pi.iter().enumerate() {
            for p in pool {
                if forbidden.iter().all(|&j| !p.contains(j)) {
                    let h = bits_hash(p.bits());
                    out.pi_index[i].insert(h);
                    out.pi[i].push(p.clone());
                }
            }
        }
        out
    }
}

/// A pattern tagged with the pool it belongs to. Equality is by `(bits, pool)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternVariable {
    pub pattern: Pattern,
    pub pool: PoolId,
}
