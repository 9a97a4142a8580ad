// ============================================================================
// predux - Selectors
// Derivations over the state tree and component props, with memoization
// ============================================================================
//
// A selector is one of four kinds:
//
//   State      reads the state tree (what slices hand out)
//   Props      reads only the props passed at selection time
//   Composite  combines input selectors through a combiner function
//   Factory    produces a fresh Composite per instantiation, so that each
//              mounting site gets its own memoization cache
//
// Composites come in two flavours. `compose` recomputes on every call.
// `compose_memo` caches the last input values and result and only calls the
// combiner when an input differs by identity: an `Rc` is the same only as
// itself, plain values compare by value.
//
// Factory-ness propagates: a composite with any factory input becomes a
// factory itself, and a memoized composite reading props does too.
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::types::StateTree;

type StateFn<R> = Rc<dyn Fn(&StateTree) -> R>;
type PropsFn<R, P> = Rc<dyn Fn(&P) -> R>;
type EvalFn<R, P> = Rc<dyn Fn(&StateTree, &P) -> R>;

// =============================================================================
// SELECTOR
// =============================================================================

/// A pure read over the state tree and optional props of type `P`.
pub enum Selector<R, P = ()> {
    State(StateFn<R>),
    Props(PropsFn<R, P>),
    Composite(Composite<R, P>),
    Factory(SelectorFactory<R, P>),
}

/// The kind of a [`Selector`], for introspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectorKind {
    State,
    Props,
    Composite,
    Factory,
}

/// A ready-to-evaluate combination of input selectors.
pub struct Composite<R, P = ()> {
    eval: EvalFn<R, P>,
    needs_props: bool,
}

/// Builds independent [`Composite`] instances.
pub struct SelectorFactory<R, P = ()> {
    make: Rc<dyn Fn() -> Composite<R, P>>,
    needs_props: bool,
}

impl<R, P> Composite<R, P> {
    fn new(needs_props: bool, eval: impl Fn(&StateTree, &P) -> R + 'static) -> Self {
        Self {
            eval: Rc::new(eval),
            needs_props,
        }
    }
}

impl<R: 'static, P: 'static> Selector<R, P> {
    /// A selector reading the whole state tree.
    pub fn from_state(f: impl Fn(&StateTree) -> R + 'static) -> Self {
        Selector::State(Rc::new(f))
    }

    /// Evaluate against `state` and `props`.
    ///
    /// A factory evaluated directly is instantiated for this call only, so
    /// its cache never survives. Call [`instantiate`](Self::instantiate)
    /// once and keep the result to memoize across calls.
    pub fn select(&self, state: &StateTree, props: &P) -> R {
        match self {
            Selector::State(f) => f(state),
            Selector::Props(f) => f(props),
            Selector::Composite(composite) => (composite.eval)(state, props),
            Selector::Factory(factory) => ((factory.make)().eval)(state, props),
        }
    }

    /// Resolve a factory into a fresh instance with its own cache. Every
    /// other kind is returned as a shared clone.
    pub fn instantiate(&self) -> Selector<R, P> {
        match self {
            Selector::Factory(factory) => Selector::Composite((factory.make)()),
            other => other.clone(),
        }
    }

    /// True if the result depends on props.
    pub fn needs_props(&self) -> bool {
        match self {
            Selector::State(_) => false,
            Selector::Props(_) => true,
            Selector::Composite(composite) => composite.needs_props,
            Selector::Factory(factory) => factory.needs_props,
        }
    }

    pub fn is_factory(&self) -> bool {
        matches!(self, Selector::Factory(_))
    }

    pub fn kind(&self) -> SelectorKind {
        match self {
            Selector::State(_) => SelectorKind::State,
            Selector::Props(_) => SelectorKind::Props,
            Selector::Composite(_) => SelectorKind::Composite,
            Selector::Factory(_) => SelectorKind::Factory,
        }
    }
}

impl<R: 'static> Selector<R, ()> {
    /// Lift a props-free selector into one accepting (and ignoring) props of
    /// type `Q`, so it can be an input next to props selectors.
    pub fn with_props<Q: 'static>(&self) -> Selector<R, Q> {
        match self {
            Selector::State(f) => Selector::State(f.clone()),
            Selector::Factory(factory) => {
                let make = factory.make.clone();
                Selector::Factory(SelectorFactory {
                    make: Rc::new(move || {
                        let eval = make().eval;
                        Composite::new(false, move |state, _: &Q| eval(state, &()))
                    }),
                    needs_props: false,
                })
            }
            other => {
                let inner = other.clone();
                Selector::Composite(Composite::new(false, move |state, _: &Q| {
                    inner.select(state, &())
                }))
            }
        }
    }
}

impl<R, P> Clone for Selector<R, P> {
    fn clone(&self) -> Self {
        match self {
            Selector::State(f) => Selector::State(f.clone()),
            Selector::Props(f) => Selector::Props(f.clone()),
            Selector::Composite(composite) => Selector::Composite(composite.clone()),
            Selector::Factory(factory) => Selector::Factory(factory.clone()),
        }
    }
}

impl<R, P> Clone for Composite<R, P> {
    fn clone(&self) -> Self {
        Self {
            eval: self.eval.clone(),
            needs_props: self.needs_props,
        }
    }
}

impl<R, P> Clone for SelectorFactory<R, P> {
    fn clone(&self) -> Self {
        Self {
            make: self.make.clone(),
            needs_props: self.needs_props,
        }
    }
}

impl<R, P> std::fmt::Debug for Selector<R, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Selector::State(_) => "State",
            Selector::Props(_) => "Props",
            Selector::Composite(_) => "Composite",
            Selector::Factory(_) => "Factory",
        };
        f.debug_tuple("Selector").field(&kind).finish()
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Identity comparison used by [`compose_memo`] to decide whether an input
/// changed.
///
/// Shared values compare by allocation: two `Rc`s with equal contents are
/// still different inputs. Plain values (numbers, `bool`, `char`, strings)
/// compare by value. Options, vectors and tuples compare element-wise.
pub trait Identity {
    fn same(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Identity for Rc<T> {
    fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

macro_rules! identity_by_value {
    ($($ty:ty),+) => {
        $(
            impl Identity for $ty {
                fn same(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )+
    };
}

identity_by_value!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, &str
);

impl<T: Identity> Identity for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: Identity> Identity for Vec<T> {
    fn same(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same(b))
    }
}

// =============================================================================
// INPUTS AND COMBINERS
// =============================================================================

/// A fixed set of input selectors sharing one props type.
///
/// Implemented for tuples of 1 to 8 selectors and for
/// `Vec<Selector<T, P>>`. Inputs are always evaluated left to right, every
/// one of them, on every call.
pub trait SelectorInputs<P>: 'static {
    /// What evaluating all inputs produces.
    type Values;

    fn evaluate(&self, state: &StateTree, props: &P) -> Self::Values;

    fn needs_props(&self) -> bool;

    fn has_factory(&self) -> bool;

    /// The same inputs with every factory resolved to a fresh instance.
    fn instantiate(&self) -> Self;
}

/// Turns the values of a [`SelectorInputs`] into a result.
///
/// For tuple inputs this is any `Fn(R1, .., Rn) -> R`; for vector inputs any
/// `Fn(Vec<T>) -> R`.
pub trait Combiner<V, R> {
    fn combine(&self, values: V) -> R;
}

impl<T: 'static, P: 'static> SelectorInputs<P> for Vec<Selector<T, P>> {
    type Values = Vec<T>;

    fn evaluate(&self, state: &StateTree, props: &P) -> Vec<T> {
        self.iter().map(|input| input.select(state, props)).collect()
    }

    fn needs_props(&self) -> bool {
        self.iter().any(Selector::needs_props)
    }

    fn has_factory(&self) -> bool {
        self.iter().any(Selector::is_factory)
    }

    fn instantiate(&self) -> Self {
        self.iter().map(Selector::instantiate).collect()
    }
}

impl<F, T, R> Combiner<Vec<T>, R> for F
where
    F: Fn(Vec<T>) -> R,
{
    fn combine(&self, values: Vec<T>) -> R {
        self(values)
    }
}

macro_rules! tuple_inputs {
    ($($input:ident $index:tt),+) => {
        impl<P: 'static, $($input: 'static),+> SelectorInputs<P> for ($(Selector<$input, P>,)+) {
            type Values = ($($input,)+);

            fn evaluate(&self, state: &StateTree, props: &P) -> Self::Values {
                ($(self.$index.select(state, props),)+)
            }

            fn needs_props(&self) -> bool {
                false $(|| self.$index.needs_props())+
            }

            fn has_factory(&self) -> bool {
                false $(|| self.$index.is_factory())+
            }

            fn instantiate(&self) -> Self {
                ($(self.$index.instantiate(),)+)
            }
        }

        impl<$($input: Identity),+> Identity for ($($input,)+) {
            fn same(&self, other: &Self) -> bool {
                true $(&& self.$index.same(&other.$index))+
            }
        }

        impl<F, R, $($input),+> Combiner<($($input,)+), R> for F
        where
            F: Fn($($input),+) -> R,
        {
            fn combine(&self, values: ($($input,)+)) -> R {
                self($(values.$index),+)
            }
        }
    };
}

tuple_inputs!(A 0);
tuple_inputs!(A 0, B 1);
tuple_inputs!(A 0, B 1, C 2);
tuple_inputs!(A 0, B 1, C 2, D 3);
tuple_inputs!(A 0, B 1, C 2, D 3, E 4);
tuple_inputs!(A 0, B 1, C 2, D 3, E 4, G 5);
tuple_inputs!(A 0, B 1, C 2, D 3, E 4, G 5, H 6);
tuple_inputs!(A 0, B 1, C 2, D 3, E 4, G 5, H 6, I 7);

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// A selector reading only props.
pub fn select_props<R, P>(f: impl Fn(&P) -> R + 'static) -> Selector<R, P> {
    Selector::Props(Rc::new(f))
}

/// Combine `inputs` through `combiner`, recomputing on every call.
///
/// # Example
///
/// ```
/// use predux::{compose, Context, Store};
/// use std::rc::Rc;
///
/// let ctx = Context::new();
/// let mut prices = ctx.create_slice(vec![3u32, 4]);
/// let total = prices.create_selector(|p: &Vec<u32>| p.iter().sum::<u32>());
/// let count = prices.create_selector(|p: &Vec<u32>| p.len() as u32);
/// let store = Store::builder(&ctx).slice(&prices.build()).build().unwrap();
///
/// let average = compose((total, count), |total: u32, count: u32| total / count);
/// assert_eq!(store.select(&average), 3);
/// ```
pub fn compose<I, R, P, F>(inputs: I, combiner: F) -> Selector<R, P>
where
    I: SelectorInputs<P>,
    R: 'static,
    P: 'static,
    F: Combiner<I::Values, R> + 'static,
{
    fn build<I, R, P, F>(inputs: I, combiner: Rc<F>) -> Composite<R, P>
    where
        I: SelectorInputs<P>,
        R: 'static,
        P: 'static,
        F: Combiner<I::Values, R> + 'static,
    {
        Composite::new(inputs.needs_props(), move |state, props| {
            combiner.combine(inputs.evaluate(state, props))
        })
    }

    let combiner = Rc::new(combiner);

    if inputs.has_factory() {
        let needs_props = inputs.needs_props();
        return Selector::Factory(SelectorFactory {
            make: Rc::new(move || build(inputs.instantiate(), combiner.clone())),
            needs_props,
        });
    }

    Selector::Composite(build(inputs, combiner))
}

/// Combine `inputs` through `combiner`, calling it only when an input
/// differs by identity from the previous call.
///
/// Inputs are compared with [`Identity`]: an `Rc` input counts as changed
/// whenever it points at a new allocation, even with equal contents. On a
/// cache hit the previous result is cloned, so hand out `Rc`s for expensive
/// results.
///
/// Returns a factory when any input is a factory or reads props; otherwise
/// the composite, and its cache, is shared by everyone holding it.
pub fn compose_memo<I, R, P, F>(inputs: I, combiner: F) -> Selector<R, P>
where
    I: SelectorInputs<P>,
    I::Values: Clone + Identity + 'static,
    R: Clone + 'static,
    P: 'static,
    F: Combiner<I::Values, R> + 'static,
{
    fn build<I, R, P, F>(inputs: I, combiner: Rc<F>) -> Composite<R, P>
    where
        I: SelectorInputs<P>,
        I::Values: Clone + Identity + 'static,
        R: Clone + 'static,
        P: 'static,
        F: Combiner<I::Values, R> + 'static,
    {
        let cache: RefCell<Option<(I::Values, R)>> = RefCell::new(None);

        Composite::new(inputs.needs_props(), move |state, props| {
            let values = inputs.evaluate(state, props);

            if let Some((last_values, last_result)) = &*cache.borrow() {
                if last_values.same(&values) {
                    return last_result.clone();
                }
            }

            // the combiner runs with the cache unborrowed
            let result = combiner.combine(values.clone());
            *cache.borrow_mut() = Some((values, result.clone()));
            result
        })
    }

    let combiner = Rc::new(combiner);
    let needs_props = inputs.needs_props();

    if needs_props || inputs.has_factory() {
        return Selector::Factory(SelectorFactory {
            make: Rc::new(move || build(inputs.instantiate(), combiner.clone())),
            needs_props,
        });
    }

    Selector::Composite(build(inputs, combiner))
}

// =============================================================================
// TESTS
// =============================================================================
