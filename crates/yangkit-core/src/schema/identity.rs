//! Identity derivation graph.
//!
//! Identities form a DAG via their `base` statements. After compilation the
//! reverse (`derived`) edges are materialized so derivation queries walk only
//! the relevant subgraph.

use super::ids::{IdentityId, ModuleId, StrId};

/// A compiled identity.
#[derive(Clone, Debug)]
pub struct Identity {
    /// Identity identifier.
    pub id: IdentityId,
    /// Identity name.
    pub name: StrId,
    /// Declaring module.
    pub module: ModuleId,
    /// Direct bases.
    pub bases: Vec<IdentityId>,
    /// Direct derivations, materialized after compilation.
    pub derived: Vec<IdentityId>,
}

/// Whether `id` is `base` or transitively derived from it.
///
/// Walks the materialized `derived` edges from `base`, so the cost is
/// proportional to the derivation subgraph, not the whole identity set.
#[must_use]
pub fn is_derived_from_or_self(
    identities: &[Identity],
    id: IdentityId,
    base: IdentityId,
) -> bool {
    if id == base {
        return true;
    }
    let mut stack = vec![base];
    let mut seen = vec![false; identities.len()];
    while let Some(current) = stack.pop() {
        let idx = current.to_index();
        if seen[idx] {
            continue;
        }
        seen[idx] = true;
        for &derived in &identities[idx].derived {
            if derived == id {
                return true;
            }
            stack.push(derived);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(idx: usize, bases: Vec<IdentityId>) -> Identity {
        Identity {
            id: IdentityId::from_index(idx).unwrap(),
            name: StrId::from_index(idx).unwrap(),
            module: ModuleId::from_index(0).unwrap(),
            bases,
            derived: Vec::new(),
        }
    }

    fn materialize(identities: &mut [Identity]) {
        let edges: Vec<(IdentityId, IdentityId)> = identities
            .iter()
            .flat_map(|ident| ident.bases.iter().map(move |&b| (b, ident.id)))
            .collect();
        for (base, derived) in edges {
            identities[base.to_index()].derived.push(derived);
        }
    }

    #[test]
    fn test_derivation_chain() {
        // animal <- mammal <- dog; plant standalone
        let animal = IdentityId::from_index(0).unwrap();
        let mammal = IdentityId::from_index(1).unwrap();
        let dog = IdentityId::from_index(2).unwrap();
        let plant = IdentityId::from_index(3).unwrap();

        let mut identities = vec![
            identity(0, vec![]),
            identity(1, vec![animal]),
            identity(2, vec![mammal]),
            identity(3, vec![]),
        ];
        materialize(&mut identities);

        assert!(is_derived_from_or_self(&identities, dog, animal));
        assert!(is_derived_from_or_self(&identities, mammal, animal));
        assert!(is_derived_from_or_self(&identities, animal, animal));
        assert!(!is_derived_from_or_self(&identities, plant, animal));
        assert!(!is_derived_from_or_self(&identities, animal, dog));
    }

    #[test]
    fn test_multiple_bases() {
        // a, b; c based on both
        let a = IdentityId::from_index(0).unwrap();
        let b = IdentityId::from_index(1).unwrap();
        let c = IdentityId::from_index(2).unwrap();

        let mut identities = vec![
            identity(0, vec![]),
            identity(1, vec![]),
            identity(2, vec![a, b]),
        ];
        materialize(&mut identities);

        assert!(is_derived_from_or_self(&identities, c, a));
        assert!(is_derived_from_or_self(&identities, c, b));
    }
}
