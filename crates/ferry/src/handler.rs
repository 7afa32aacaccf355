//! Handlers and the ordered resolution algorithm.
//!
//! A [`Handler`] is plain data: the diagnostic types it needs, optional value
//! predicates on those types, and an action. Resolution walks the handler list
//! in order and picks the first one whose every requirement is present for the
//! failure and satisfies every predicate. Nothing is reordered, so the same
//! objects and the same list always pick the same handler.
use std::any::{Any, TypeId, type_name};
use std::fmt;

use crate::FailureId;
use crate::channel::{Boxed, Diagnostic};

type Predicate<'a> = Box<dyn Fn(&dyn Any) -> bool + 'a>;
type Action<'a, R> = Box<dyn FnOnce(&Fetched, FailureId) -> Option<R> + 'a>;

pub(crate) struct Requirement<'a> {
    ty: TypeId,
    type_name: &'static str,
    predicates: Vec<Predicate<'a>>,
}

impl Requirement<'_> {
    fn of<E: Diagnostic>() -> Self {
        Requirement {
            ty: TypeId::of::<E>(),
            type_name: type_name::<E>(),
            predicates: Vec::new(),
        }
    }

    fn is_met_by(&self, fetched: &Fetched) -> bool {
        fetched
            .get_raw(self.ty)
            .is_some_and(|object| self.predicates.iter().all(|predicate| predicate(object)))
    }
}

/// One candidate response to a failure.
///
/// ```rust
/// use ferry::Handler;
///
/// #[derive(Debug, PartialEq)]
/// enum Code { NotFound, Denied }
///
/// let specific = Handler::new(|_: &Code| "missing").matching([Code::NotFound]);
/// let general = Handler::new(|c: &Code| if *c == Code::Denied { "denied" } else { "other" });
/// assert_eq!(specific.required_type_names().count(), 1);
/// # let _ = general;
/// ```
pub struct Handler<'a, R> {
    requirements: Vec<Requirement<'a>>,
    action: Action<'a, R>,
}

impl<'a, R: 'a> Handler<'a, R> {
    /// Build a handler from a closure taking references to its required
    /// diagnostic types, e.g. `|p: &ParseError, l: &Line| ...`. A closure with
    /// no parameters matches any failure.
    pub fn new<Args, H>(action: H) -> Self
    where
        H: IntoHandler<'a, Args, R>,
    {
        action.into_handler()
    }

    /// Unconditional fallback that receives the failure id.
    pub fn any(action: impl FnOnce(FailureId) -> R + 'a) -> Self {
        Handler {
            requirements: Vec::new(),
            action: Box::new(move |_, id| Some(action(id))),
        }
    }

    /// Only fire when the fetched `E` equals one of `values`. `E` becomes a
    /// requirement if the action does not already take it.
    pub fn matching<E, I>(self, values: I) -> Self
    where
        E: Diagnostic + PartialEq,
        I: IntoIterator<Item = E>,
    {
        let values: Vec<E> = values.into_iter().collect();
        self.constrain::<E>(Box::new(move |object: &dyn Any| {
            object
                .downcast_ref::<E>()
                .is_some_and(|value| values.contains(value))
        }))
    }

    /// Only fire when `predicate` holds for the fetched `E`.
    pub fn when<E: Diagnostic>(self, predicate: impl Fn(&E) -> bool + 'a) -> Self {
        self.constrain::<E>(Box::new(move |object: &dyn Any| {
            object.downcast_ref::<E>().is_some_and(&predicate)
        }))
    }

    fn constrain<E: Diagnostic>(mut self, predicate: Predicate<'a>) -> Self {
        let ty = TypeId::of::<E>();
        match self.requirements.iter_mut().find(|req| req.ty == ty) {
            Some(req) => req.predicates.push(predicate),
            None => {
                let mut req = Requirement::of::<E>();
                req.predicates.push(predicate);
                self.requirements.push(req);
            }
        }
        self
    }
}

impl<R> Handler<'_, R> {
    pub fn required_type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.requirements.iter().map(|req| req.type_name)
    }

    pub(crate) fn required_types(&self) -> impl Iterator<Item = (TypeId, &'static str)> + '_ {
        self.requirements.iter().map(|req| (req.ty, req.type_name))
    }

    pub(crate) fn is_satisfied_by(&self, fetched: &Fetched) -> bool {
        self.requirements.iter().all(|req| req.is_met_by(fetched))
    }

    pub(crate) fn invoke(self, fetched: &Fetched) -> Option<R> {
        (self.action)(fetched, fetched.id())
    }
}

impl<R> fmt::Debug for Handler<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requires: Vec<_> = self
            .requirements
            .iter()
            .map(|req| (req.type_name, req.predicates.len()))
            .collect();
        f.debug_struct("Handler").field("requires", &requires).finish_non_exhaustive()
    }
}

/// Conversion from a closure over `&E1, ..., &En` into a [`Handler`].
///
/// `Args` is the tuple of parameter types; it only exists to keep the
/// implementations for different arities apart.
pub trait IntoHandler<'a, Args, R> {
    fn into_handler(self) -> Handler<'a, R>;
}

macro_rules! impl_into_handler {
    ($($ty:ident $var:ident),*) => {
        impl<'a, F, R, $($ty),*> IntoHandler<'a, ($($ty,)*), R> for F
        where
            F: FnOnce($(&$ty),*) -> R + 'a,
            R: 'a,
            $($ty: Diagnostic,)*
        {
            #[allow(unused_variables)]
            fn into_handler(self) -> Handler<'a, R> {
                let requirements = vec![$(Requirement::of::<$ty>()),*];
                Handler {
                    requirements,
                    action: Box::new(move |fetched: &Fetched, _id: FailureId| {
                        $(let $var = fetched.get::<$ty>()?;)*
                        Some(self($($var),*))
                    }),
                }
            }
        }
    };
}

impl_into_handler!();
impl_into_handler!(A a);
impl_into_handler!(A a, B b);
impl_into_handler!(A a, B b, C c);
impl_into_handler!(A a, B b, C c, D d);
impl_into_handler!(A a, B b, C c, D d, E e);
impl_into_handler!(A a, B b, C c, D d, E e, G g);

/// Diagnostic objects taken from a scope's slots for one failure.
pub(crate) struct Fetched {
    id: FailureId,
    entries: Vec<(TypeId, Boxed)>,
}

impl Fetched {
    pub(crate) fn new(id: FailureId, entries: Vec<(TypeId, Boxed)>) -> Self {
        Fetched { id, entries }
    }

    pub(crate) fn id(&self) -> FailureId {
        self.id
    }

    pub(crate) fn get<E: Diagnostic>(&self) -> Option<&E> {
        self.get_raw(TypeId::of::<E>())?.downcast_ref::<E>()
    }

    pub(crate) fn get_raw(&self, ty: TypeId) -> Option<&dyn Any> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == ty)
            .map(|(_, object)| &**object as &dyn Any)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(TypeId, Boxed)> {
        self.entries
    }
}

/// Index of the first handler satisfiable by `fetched`.
pub(crate) fn resolve<R>(handlers: &[Handler<'_, R>], fetched: &Fetched) -> Option<usize> {
    handlers.iter().position(|handler| handler.is_satisfied_by(fetched))
}

/// Resolve and run the chosen handler.
pub(crate) fn dispatch<R>(handlers: Vec<Handler<'_, R>>, fetched: &Fetched) -> Option<R> {
    let index = resolve(&handlers, fetched)?;
    let handler = handlers.into_iter().nth(index)?;
    tracing::debug!(
        failure = %fetched.id(),
        handler = index,
        requires = ?handler.required_type_names().collect::<Vec<_>>(),
        "handler selected"
    );
    handler.invoke(fetched)
}
