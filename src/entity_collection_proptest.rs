#![cfg(test)]

// Property tests for EntityCollection kept inside the crate so they can
// call the structural invariant checker.

use crate::entity_collection::{EntityCollection, MatchMode};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

// Pool-indexed operations: indices shrink to earlier keys and op lists
// shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Add(usize),
    Remove(usize),
    Take(usize),
    Contains(usize),
    Clear,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, usize, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => idx.clone().prop_map(Op::Add),
            2 => idx.clone().prop_map(Op::Remove),
            1 => idx.clone().prop_map(Op::Take),
            2 => idx.clone().prop_map(Op::Contains),
            1 => Just(Op::Clear),
            1 => Just(Op::Iterate),
        ];
        (
            Just(pool),
            0usize..8,
            proptest::collection::vec(op, 1..120),
        )
    })
}

// Property: state-machine equivalence against a Vec kept in insertion order.
// Invariants exercised across random operation sequences:
// - add returns false exactly when the model already holds the key.
// - remove/take succeed exactly when present and splice the model in place.
// - enumeration order equals the model after every step (re-add goes to tail).
// - len equals model length; clear empties both.
// - observers see one added/removed per successful mutation, one state
//   change per mutating call.
// - bucket chains, free list and order links stay consistent throughout.
proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, capacity, ops) in arb_scenario()) {
        let mut sut: EntityCollection<String> =
            EntityCollection::with_capacity(capacity).with_match_mode(MatchMode::FullEquality);
        let mut model: Vec<String> = Vec::new();

        let added = Rc::new(RefCell::new(0usize));
        let removed = Rc::new(RefCell::new(0usize));
        let changed = Rc::new(RefCell::new(0usize));
        {
            let a = added.clone();
            sut.on_added().subscribe(move |_| *a.borrow_mut() += 1);
            let r = removed.clone();
            sut.on_removed().subscribe(move |_| *r.borrow_mut() += 1);
            let c = changed.clone();
            sut.on_state_changed().subscribe(move |_| *c.borrow_mut() += 1);
        }
        let (mut exp_added, mut exp_removed, mut exp_changed) = (0usize, 0usize, 0usize);

        for op in ops {
            match op {
                Op::Add(i) => {
                    let k = pool[i].clone();
                    let present = model.contains(&k);
                    prop_assert_eq!(sut.add(k.clone()), !present);
                    if !present {
                        model.push(k);
                        exp_added += 1;
                        exp_changed += 1;
                    }
                }
                Op::Remove(i) => {
                    let k = &pool[i];
                    let pos = model.iter().position(|m| m == k);
                    prop_assert_eq!(sut.remove(k.as_str()), pos.is_some());
                    if let Some(p) = pos {
                        model.remove(p);
                        exp_removed += 1;
                        exp_changed += 1;
                    }
                }
                Op::Take(i) => {
                    let k = &pool[i];
                    let pos = model.iter().position(|m| m == k);
                    let got = sut.take(k.as_str());
                    prop_assert_eq!(got.as_ref(), pos.map(|p| &model[p]));
                    if let Some(p) = pos {
                        model.remove(p);
                        exp_removed += 1;
                        exp_changed += 1;
                    }
                }
                Op::Contains(i) => {
                    let k = &pool[i];
                    prop_assert_eq!(sut.contains(k.as_str()), model.contains(k));
                }
                Op::Clear => {
                    if !model.is_empty() {
                        exp_removed += model.len();
                        exp_changed += 1;
                    }
                    model.clear();
                    sut.clear();
                }
                Op::Iterate => {
                    let back: Vec<&String> = sut.iter().rev().collect();
                    let want: Vec<&String> = model.iter().rev().collect();
                    prop_assert_eq!(back, want);
                }
            }

            sut.assert_invariants();
            prop_assert_eq!(sut.len(), model.len());
            let seen: Vec<&String> = sut.iter().collect();
            let want: Vec<&String> = model.iter().collect();
            prop_assert_eq!(seen, want);
            prop_assert_eq!(sut.first(), model.first());
            prop_assert_eq!(sut.last(), model.last());
        }

        prop_assert_eq!(*added.borrow(), exp_added);
        prop_assert_eq!(*removed.borrow(), exp_removed);
        prop_assert_eq!(*changed.borrow(), exp_changed);
    }
}

// Property: count equals successful adds minus successful removes, and
// growth never loses an item, whatever the starting capacity.
proptest! {
    #[test]
    fn prop_growth_keeps_every_item(capacity in 0usize..16, n in 0usize..600) {
        let mut c: EntityCollection<usize> = EntityCollection::with_capacity(capacity);
        for i in 0..n {
            prop_assert!(c.add(i));
        }
        prop_assert_eq!(c.len(), n);
        for i in 0..n {
            prop_assert!(c.contains(&i));
        }
        prop_assert!(c.iter().copied().eq(0..n));
        c.assert_invariants();

        let mut removed = 0;
        for i in (0..n).step_by(3) {
            prop_assert!(c.remove(&i));
            removed += 1;
        }
        prop_assert_eq!(c.len(), n - removed);
        prop_assert!(c.iter().copied().eq((0..n).filter(|i| i % 3 != 0)));
        c.assert_invariants();
    }
}
