// ============================================================================
// predux - Slices
// A unit of state plus the actions, reducers and selectors operating on it
// ============================================================================
//
// A slice is assembled with a SliceBuilder and frozen by `build`:
//
//   let mut todos = ctx.create_slice(Vec::<String>::new());
//   let add = todos.create_action(|list, item: &String| ...);
//   let count = todos.create_selector(|list| list.len());
//   let todos = todos.build();
//
// Every action creator gets an id scoped under the slice id, so the same
// store can host many slices without collisions. Selectors close over the
// slice id only, which keeps them valid for any store holding the slice.
// ============================================================================

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::core::constants::{ACTION_ID_SEPARATOR, SLICE_GUID_PREFIX};
use crate::core::context::Context;
use crate::core::error::{BoxError, Error, Result};
use crate::core::types::{ActionId, SliceId, StateTree, SubState};
use crate::primitives::selector::Selector;

// =============================================================================
// ACTION
// =============================================================================

/// A dispatchable action: the id of its reducer plus the arguments for it.
#[derive(Clone)]
pub struct Action {
    id: ActionId,
    payload: Rc<dyn Any>,
}

impl Action {
    /// Build an action by hand. Usually produced by
    /// [`ActionCreator::create`].
    pub fn new<A: 'static>(id: impl Into<ActionId>, payload: A) -> Self {
        Self {
            id: id.into(),
            payload: Rc::new(payload),
        }
    }

    pub fn id(&self) -> &ActionId {
        &self.id
    }

    /// The payload, if it is of type `A`.
    pub fn payload<A: 'static>(&self) -> Option<&A> {
        self.payload.downcast_ref::<A>()
    }

    pub(crate) fn raw_payload(&self) -> &dyn Any {
        self.payload.as_ref()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("id", &self.id).finish_non_exhaustive()
    }
}

// =============================================================================
// REDUCER ENTRY
// =============================================================================

type ApplyFn = Rc<dyn Fn(&SubState, &dyn Any) -> Result<SubState>>;

/// A type-erased reducer as registered by a slice.
#[derive(Clone)]
pub struct ReducerEntry {
    action_id: ActionId,
    display_name: Rc<str>,
    slice_id: SliceId,
    apply: ApplyFn,
}

impl ReducerEntry {
    pub fn action_id(&self) -> &ActionId {
        &self.action_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn slice_id(&self) -> &SliceId {
        &self.slice_id
    }

    /// Run the reducer. Returns the very same `Rc` when the state is unchanged.
    pub(crate) fn apply(&self, state: &SubState, payload: &dyn Any) -> Result<SubState> {
        (self.apply)(state, payload)
    }
}

impl fmt::Debug for ReducerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerEntry")
            .field("action_id", &self.action_id)
            .field("display_name", &self.display_name)
            .finish()
    }
}

// =============================================================================
// ACTION CREATOR
// =============================================================================

/// Produces actions for one reducer of a slice of state `S`, taking
/// arguments of type `A`.
pub struct ActionCreator<S, A> {
    action_id: ActionId,
    display_name: Rc<str>,
    slice_id: SliceId,
    _marker: PhantomData<fn(&S, A)>,
}

impl<S, A: 'static> ActionCreator<S, A> {
    /// Create the action carrying `args`.
    pub fn create(&self, args: A) -> Action {
        Action {
            id: self.action_id.clone(),
            payload: Rc::new(args),
        }
    }

    pub fn action_id(&self) -> &ActionId {
        &self.action_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn slice_id(&self) -> &SliceId {
        &self.slice_id
    }
}

impl<S, A> Clone for ActionCreator<S, A> {
    fn clone(&self) -> Self {
        Self {
            action_id: self.action_id.clone(),
            display_name: self.display_name.clone(),
            slice_id: self.slice_id.clone(),
            _marker: PhantomData,
        }
    }
}

impl<S, A> fmt::Debug for ActionCreator<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCreator")
            .field("action_id", &self.action_id)
            .field("display_name", &self.display_name)
            .finish()
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Options for creating a slice.
#[derive(Clone, Debug, Default)]
pub struct SliceOptions {
    /// Human readable name used in logs. Defaults to the slice id.
    pub display_name: Option<String>,

    /// Fixed slice id instead of a generated `slice.N`. Useful when state
    /// must line up across program runs.
    pub static_id: Option<String>,
}

// =============================================================================
// SLICE BUILDER
// =============================================================================

/// Collects the reducers of a slice until it is built.
pub struct SliceBuilder<S> {
    slice_id: SliceId,
    display_name: Rc<str>,
    initial: Rc<S>,
    reducers: Vec<ReducerEntry>,
    action_index: u32,
}

impl Context {
    /// Start a slice with `initial` as its state.
    pub fn create_slice<S: 'static>(&self, initial: S) -> SliceBuilder<S> {
        self.create_slice_with(initial, SliceOptions::default())
    }

    pub fn create_slice_with<S: 'static>(&self, initial: S, options: SliceOptions) -> SliceBuilder<S> {
        let slice_id = match options.static_id {
            Some(id) => SliceId::from(id),
            None => SliceId::from(self.next_guid(SLICE_GUID_PREFIX)),
        };
        let display_name: Rc<str> = match options.display_name {
            Some(name) => name.into(),
            None => slice_id.as_str().into(),
        };

        SliceBuilder {
            slice_id,
            display_name,
            initial: Rc::new(initial),
            reducers: Vec::new(),
            action_index: 0,
        }
    }
}

impl<S: 'static> SliceBuilder<S> {
    pub fn slice_id(&self) -> &SliceId {
        &self.slice_id
    }

    /// Register a reducer and get the creator of its actions.
    ///
    /// The reducer receives the current state and the action arguments and
    /// returns the next state. Returning the incoming `Rc` means "unchanged":
    /// the store keeps its state and notifies nobody.
    pub fn create_action<A: 'static>(
        &mut self,
        reducer: impl Fn(&Rc<S>, &A) -> Rc<S> + 'static,
    ) -> ActionCreator<S, A> {
        let action_id = self.next_action_id();
        let display_name: Rc<str> = action_id.as_str().into();
        self.register(action_id, display_name, move |state, args| Ok(reducer(state, args)))
    }

    /// Like [`create_action`](Self::create_action) with a display name for logs.
    pub fn create_named_action<A: 'static>(
        &mut self,
        display_name: &str,
        reducer: impl Fn(&Rc<S>, &A) -> Rc<S> + 'static,
    ) -> ActionCreator<S, A> {
        let action_id = self.next_action_id();
        self.register(action_id, display_name.into(), move |state, args| {
            Ok(reducer(state, args))
        })
    }

    /// Register a reducer under an explicit action id.
    ///
    /// Explicit ids are not scoped to the slice; a clash with any other
    /// reducer of the same store is reported when the store is built.
    pub fn create_action_with_id<A: 'static>(
        &mut self,
        action_id: impl Into<ActionId>,
        reducer: impl Fn(&Rc<S>, &A) -> Rc<S> + 'static,
    ) -> ActionCreator<S, A> {
        let action_id = action_id.into();
        let display_name: Rc<str> = action_id.as_str().into();
        self.register(action_id, display_name, move |state, args| Ok(reducer(state, args)))
    }

    /// Register a reducer that may fail.
    ///
    /// A failing reducer leaves the state untouched and its error is
    /// returned from `dispatch` as [`Error::Reducer`].
    pub fn create_fallible_action<A, E>(
        &mut self,
        display_name: &str,
        reducer: impl Fn(&Rc<S>, &A) -> std::result::Result<Rc<S>, E> + 'static,
    ) -> ActionCreator<S, A>
    where
        A: 'static,
        E: Into<BoxError>,
    {
        let action_id = self.next_action_id();
        let failed_id = action_id.clone();
        self.register(action_id, display_name.into(), move |state, args| {
            reducer(state, args).map_err(|source| Error::Reducer {
                action_id: failed_id.to_string(),
                source: source.into(),
            })
        })
    }

    /// A selector over this slice's state.
    ///
    /// When the slice is missing from the store it is evaluated against the
    /// initial state.
    pub fn create_selector<R: 'static>(&self, f: impl Fn(&S) -> R + 'static) -> Selector<R> {
        slice_selector(&self.slice_id, &self.initial, f)
    }

    /// A selector handing out the slice state itself. The `Rc` keeps its
    /// identity until a reducer replaces it, which is what
    /// [`compose_memo`](crate::compose_memo) compares.
    pub fn state_selector(&self) -> Selector<Rc<S>> {
        slice_state_selector(&self.slice_id, &self.initial)
    }

    /// Freeze the slice.
    pub fn build(self) -> Slice<S> {
        log::debug!(
            "built slice '{}' with {} action(s)",
            self.display_name,
            self.reducers.len()
        );

        Slice {
            inner: Rc::new(SliceInner {
                slice_id: self.slice_id,
                display_name: self.display_name,
                initial: self.initial,
                reducers: self.reducers,
            }),
        }
    }

    fn next_action_id(&mut self) -> ActionId {
        self.action_index += 1;
        ActionId::from(format!(
            "{}{}{}",
            self.slice_id, ACTION_ID_SEPARATOR, self.action_index
        ))
    }

    fn register<A: 'static>(
        &mut self,
        action_id: ActionId,
        display_name: Rc<str>,
        reducer: impl Fn(&Rc<S>, &A) -> Result<Rc<S>> + 'static,
    ) -> ActionCreator<S, A> {
        let slice_id = self.slice_id.clone();
        let mismatch_id = action_id.clone();

        let apply = move |state: &SubState, payload: &dyn Any| -> Result<SubState> {
            let state = state
                .clone()
                .downcast::<S>()
                .map_err(|_| Error::StateMismatch {
                    slice_id: slice_id.to_string(),
                })?;
            let args = payload
                .downcast_ref::<A>()
                .ok_or_else(|| Error::PayloadMismatch {
                    action_id: mismatch_id.to_string(),
                })?;

            let next: SubState = reducer(&state, args)?;
            Ok(next)
        };

        self.reducers.push(ReducerEntry {
            action_id: action_id.clone(),
            display_name: display_name.clone(),
            slice_id: self.slice_id.clone(),
            apply: Rc::new(apply),
        });

        ActionCreator {
            action_id,
            display_name,
            slice_id: self.slice_id.clone(),
            _marker: PhantomData,
        }
    }
}

fn slice_selector<S: 'static, R: 'static>(
    slice_id: &SliceId,
    initial: &Rc<S>,
    f: impl Fn(&S) -> R + 'static,
) -> Selector<R> {
    let slice_id = slice_id.clone();
    let initial = initial.clone();

    Selector::from_state(move |state: &StateTree| match state.get::<S>(&slice_id) {
        Some(sub_state) => f(&sub_state),
        None => {
            log::warn!("slice '{slice_id}' is not part of the store, reading its initial state");
            f(&initial)
        }
    })
}

fn slice_state_selector<S: 'static>(slice_id: &SliceId, initial: &Rc<S>) -> Selector<Rc<S>> {
    let slice_id = slice_id.clone();
    let initial = initial.clone();

    Selector::from_state(move |state: &StateTree| {
        state.get::<S>(&slice_id).unwrap_or_else(|| {
            log::warn!("slice '{slice_id}' is not part of the store, reading its initial state");
            initial.clone()
        })
    })
}

// =============================================================================
// SLICE
// =============================================================================

struct SliceInner<S> {
    slice_id: SliceId,
    display_name: Rc<str>,
    initial: Rc<S>,
    reducers: Vec<ReducerEntry>,
}

/// A built, immutable slice. Cheap to clone.
pub struct Slice<S> {
    inner: Rc<SliceInner<S>>,
}

impl<S: 'static> Slice<S> {
    pub fn slice_id(&self) -> &SliceId {
        &self.inner.slice_id
    }

    pub fn display_name(&self) -> &str {
        &self.inner.display_name
    }

    pub fn initial_state(&self) -> Rc<S> {
        self.inner.initial.clone()
    }

    pub fn reducers(&self) -> &[ReducerEntry] {
        &self.inner.reducers
    }

    /// A selector over this slice's state. Selectors created after a store
    /// was built work the same as earlier ones.
    pub fn create_selector<R: 'static>(&self, f: impl Fn(&S) -> R + 'static) -> Selector<R> {
        slice_selector(&self.inner.slice_id, &self.inner.initial, f)
    }

    /// A selector handing out the slice state itself.
    pub fn state_selector(&self) -> Selector<Rc<S>> {
        slice_state_selector(&self.inner.slice_id, &self.inner.initial)
    }

    /// Erase the state type, for [`create_store`](crate::create_store).
    pub fn as_any_slice(&self) -> Rc<dyn AnySlice> {
        self.inner.clone()
    }
}

impl<S> Clone for Slice<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> fmt::Debug for Slice<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slice")
            .field("slice_id", &self.inner.slice_id)
            .field("display_name", &self.inner.display_name)
            .field("reducers", &self.inner.reducers.len())
            .finish()
    }
}

/// What a store needs from a slice, independent of its state type.
pub trait AnySlice {
    fn slice_id(&self) -> &SliceId;

    fn display_name(&self) -> &str;

    fn initial_sub_state(&self) -> SubState;

    fn reducers(&self) -> &[ReducerEntry];
}

impl<S: 'static> AnySlice for SliceInner<S> {
    fn slice_id(&self) -> &SliceId {
        &self.slice_id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn initial_sub_state(&self) -> SubState {
        self.initial.clone()
    }

    fn reducers(&self) -> &[ReducerEntry] {
        &self.reducers
    }
}

// =============================================================================
// TESTS
// =============================================================================
