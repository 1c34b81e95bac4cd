//! Diff engine
//!
//! Computes the minimal plan turning a gateway upstream's membership into the
//! discovery-side membership of the same service:
//!
//! 1. Members matching on `(ip, port, weight)` are dropped on both sides.
//! 2. If nothing remains, the plan is empty.
//! 3. A gateway leftover whose `(ip, port)` is still in discovery is a weight
//!    update (`enabled && changed`), discovery weight wins.
//! 4. A gateway leftover with no discovery counterpart is a removal
//!    (`!enabled`).
//! 5. Discovery leftovers not consumed by step 3 are additions
//!    (`enabled && !changed`).
//!
//! Plan order: discovery-side entries in discovery order, then removals in
//! gateway order.

use std::collections::{HashMap, HashSet};

use syncer_common::model::{AddressKey, IdentityKey};
use syncer_common::{DiffPlan, Instance};

pub fn diff_instances(discovery: &[Instance], gateway: &[Instance]) -> DiffPlan {
    // discovery members not yet matched, deduplicated on identity
    let mut pending: Vec<Option<&Instance>> = Vec::with_capacity(discovery.len());
    let mut by_identity: HashMap<IdentityKey, usize> = HashMap::with_capacity(discovery.len());
    for instance in discovery {
        by_identity.entry(instance.identity_key()).or_insert_with(|| {
            pending.push(Some(instance));
            pending.len() - 1
        });
    }

    let mut gateway_only: Vec<&Instance> = Vec::new();
    let mut seen: HashSet<IdentityKey> = HashSet::new();
    for instance in gateway {
        let key = instance.identity_key();
        match by_identity.get(&key) {
            Some(&slot) => pending[slot] = None,
            None => {
                if seen.insert(key) {
                    gateway_only.push(instance);
                }
            }
        }
    }

    if gateway_only.is_empty() && pending.iter().all(Option::is_none) {
        return DiffPlan::default();
    }

    // first discovery member per address wins
    let mut by_address: HashMap<AddressKey, &Instance> = HashMap::new();
    let mut address_order: Vec<AddressKey> = Vec::new();
    for instance in pending.into_iter().flatten() {
        let key = instance.address_key();
        if !by_address.contains_key(&key) {
            address_order.push(key.clone());
            by_address.insert(key, instance);
        }
    }

    let mut updated: HashMap<AddressKey, &Instance> = HashMap::new();
    let mut removals: Vec<Instance> = Vec::new();
    for instance in gateway_only {
        let key = instance.address_key();
        match by_address.remove(&key) {
            Some(current) => {
                updated.insert(key, current);
            }
            None => removals.push(instance.reset()),
        }
    }

    let mut changes: Vec<Instance> = Vec::with_capacity(address_order.len() + removals.len());
    for key in &address_order {
        let (instance, changed) = match (updated.get(key), by_address.get(key)) {
            (Some(instance), _) => (*instance, true),
            (None, Some(instance)) => (*instance, false),
            (None, None) => continue,
        };
        let mut entry = instance.reset();
        entry.enabled = true;
        entry.changed = changed;
        changes.push(entry);
    }
    changes.extend(removals);

    DiffPlan {
        changes,
        canonical: discovery.iter().map(Instance::reset).collect(),
    }
}
