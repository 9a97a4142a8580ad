use predux::{compose, Context, Store, StoreOptions, ImmediateScheduler};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn until_waits_for_a_loaded_flag() {
    let ctx = Context::new();
    let mut status = ctx.create_slice(false);
    let loaded = status.create_action(|_: &Rc<bool>, _: &()| Rc::new(true));
    let is_loaded = status.create_selector(|flag: &bool| *flag);
    let store = Store::builder(&ctx).slice(&status.build()).build().unwrap();

    let events = Rc::new(RefCell::new(Vec::new()));
    let waiting = store.until(is_loaded, {
        let events = events.clone();
        move || events.borrow_mut().push("ready")
    });
    assert!(waiting.is_some());

    store.dispatch(loaded.create(())).unwrap();
    assert!(events.borrow().is_empty(), "nothing before the frame");

    ctx.tick();
    assert_eq!(*events.borrow(), vec!["ready"]);
}

#[test]
fn until_can_be_cancelled() {
    let ctx = Context::new();
    let mut count = ctx.create_slice(0u32);
    let bump = count.create_action(|n: &Rc<u32>, _: &()| Rc::new(**n + 1));
    let value = count.create_selector(|n: &u32| *n);
    let store = Store::builder(&ctx)
        .slice(&count.build())
        .options(StoreOptions {
            scheduler: Some(Rc::new(ImmediateScheduler::new())),
            ..StoreOptions::default()
        })
        .build()
        .unwrap();

    let fired = Rc::new(Cell::new(false));
    let id = store
        .until(compose((value,), |n: u32| n > 1), {
            let fired = fired.clone();
            move || fired.set(true)
        })
        .unwrap();

    assert!(store.state_changed().unsubscribe(id));
    store.dispatch(bump.create(())).unwrap();
    store.dispatch(bump.create(())).unwrap();
    assert!(!fired.get());
}

#[test]
fn bound_actions_share_the_store() {
    let ctx = Context::new();
    let mut text = ctx.create_slice(String::new());
    let append = text.create_action(|s: &Rc<String>, tail: &String| Rc::new(format!("{s}{tail}")));
    let value = text.create_selector(|s: &String| s.clone());
    let store = Store::builder(&ctx).slice(&text.build()).build().unwrap();

    let append = store.bind(&append);
    let append_again = append.clone();

    append.dispatch("ab".into()).unwrap();
    append_again.dispatch("cd".into()).unwrap();

    assert_eq!(store.select(&value), "abcd");
    assert_eq!(append.creator().display_name(), append.creator().action_id().as_str());
}
