use atomic_entities::{Behaviour, Entity, EntityPool, EntityState, EntityWorld};
use std::cell::RefCell;
use std::rc::Rc;

const AMMO: i32 = 0;

struct Reload;

impl Behaviour for Reload {
    fn enable(&mut self, e: &Entity) {
        e.set_value(AMMO, 6_u8);
    }
}

fn pool() -> EntityPool {
    EntityPool::new(|| {
        let e = Entity::new("gun");
        e.add_behaviour(Reload);
        e
    })
}

#[test]
fn released_entities_are_reset_by_their_behaviours() {
    let mut p = pool();
    let g = p.rent();
    assert_eq!(g.value::<u8>(AMMO), Some(6));
    g.set_value(AMMO, 1_u8);
    assert!(p.release(&g));
    assert_eq!(g.state(), EntityState::Initialized);

    let again = p.rent();
    assert!(again.ptr_eq(&g));
    assert_eq!(again.value::<u8>(AMMO), Some(6));
}

#[test]
fn pooled_entities_can_join_a_world() {
    let mut p = pool();
    p.prewarm(4);
    let mut world = EntityWorld::new("w");
    world.enable();
    let rented: Vec<Entity> = (0..3).map(|_| p.rent()).collect();
    for e in &rented {
        world.add(e.clone());
    }
    assert_eq!(world.len(), 3);
    assert_eq!((p.idle_count(), p.rented_count()), (1, 3));

    world.remove(&rented[0]);
    assert_eq!(rented[0].state(), EntityState::Created);
    assert!(p.release(&rented[0]));
    assert_eq!(p.idle_count(), 2);
}

#[test]
fn factory_only_runs_on_empty_idle_list() {
    let calls = Rc::new(RefCell::new(0));
    let c = calls.clone();
    let mut p = EntityPool::new(move || {
        *c.borrow_mut() += 1;
        Entity::new("x")
    });
    let a = p.rent();
    p.release(&a);
    let _b = p.rent();
    let _c = p.rent();
    assert_eq!(*calls.borrow(), 2);
    assert_eq!(p.created_count(), 2);
}
