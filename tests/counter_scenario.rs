use predux::{Action, Context, Error, Store};
use std::cell::Cell;
use std::rc::Rc;

fn counter(ctx: &Rc<Context>) -> (Store, predux::ActionCreator<i32, i32>, predux::Selector<i32>) {
    let mut counter = ctx.create_slice(0i32);
    let increment = counter.create_named_action("increment", |n: &Rc<i32>, step: &i32| {
        Rc::new(**n + step)
    });
    let value = counter.create_selector(|n: &i32| *n);
    let store = Store::builder(ctx).slice(&counter.build()).build().unwrap();
    (store, increment, value)
}

#[test]
fn increment_twice_then_force_immediate() {
    let ctx = Context::new();
    let (store, increment, value) = counter(&ctx);
    let notified = Rc::new(Cell::new(0));
    store.state_changed().subscribe({
        let notified = notified.clone();
        move |_| notified.set(notified.get() + 1)
    });

    store.dispatch(increment.create(1)).unwrap();
    store.dispatch(increment.create(1)).unwrap();
    assert_eq!(store.select(&value), 2);
    assert_eq!(notified.get(), 0, "regular dispatches wait for the next frame");

    store.dispatch_immediate(increment.create(5)).unwrap();
    assert_eq!(notified.get(), 1, "forced dispatch notifies before returning");
    assert_eq!(store.select(&value), 7);

    ctx.tick();
    assert_eq!(notified.get(), 1, "the scheduled frame was cancelled");
}

#[test]
fn unknown_action_is_a_silent_noop() {
    let ctx = Context::new();
    let (store, _, value) = counter(&ctx);
    let notified = Rc::new(Cell::new(0));
    store.state_changed().subscribe({
        let notified = notified.clone();
        move |_| notified.set(notified.get() + 1)
    });
    let before = store.get_state();

    assert!(store.dispatch(Action::new("nobody/knows", 42)).is_ok());
    ctx.tick();

    assert!(store.get_state().ptr_eq(&before));
    assert_eq!(notified.get(), 0);
    assert_eq!(store.select(&value), 0);
}

#[test]
fn payload_of_the_wrong_type_is_reported() {
    let ctx = Context::new();
    let (store, increment, value) = counter(&ctx);

    let err = store
        .dispatch(Action::new(increment.action_id().clone(), "five"))
        .unwrap_err();

    assert!(matches!(err, Error::PayloadMismatch { .. }));
    assert_eq!(store.select(&value), 0);
}

#[test]
fn thunk_orchestrates_several_dispatches() {
    let ctx = Context::new();
    let (store, increment, value) = counter(&ctx);
    let notified = Rc::new(Cell::new(0));
    store.state_changed().subscribe({
        let notified = notified.clone();
        move |_| notified.set(notified.get() + 1)
    });

    let doubled = store
        .dispatch_thunk(|store| -> predux::Result<i32> {
            for step in 1..=3 {
                store.dispatch(increment.create(step))?;
            }
            Ok(store.select(&value) * 2)
        })
        .unwrap()
        .unwrap();

    assert_eq!(doubled, 12);

    // still one notification for the frame
    ctx.tick();
    assert_eq!(notified.get(), 1);
}

#[test]
fn dropping_the_store_cancels_its_frame_and_registry_entry() {
    let ctx = Context::new();
    let guid;
    {
        let (store, increment, _) = counter(&ctx);
        guid = store.guid().to_owned();
        store.dispatch(increment.create(1)).unwrap();
        assert_eq!(ctx.frames().pending(), 1);
    }

    assert_eq!(ctx.frames().pending(), 0);
    assert!(ctx.store(&guid).is_none());
    assert_eq!(ctx.tick(), 0);
}
