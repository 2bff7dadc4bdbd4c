//! Ambient routing criteria for the current logical operation.
//!
//! The host enters a [`ContextScope`] at the start of an operation; policies
//! never read the ambient state themselves but receive an explicit
//! [`RoutingCriteria`] snapshot taken from it. Dropping the scope restores
//! whatever was active before, on every exit path.

use std::cell::RefCell;
use std::marker::PhantomData;

use contour_types::RoutingCriteria;

thread_local! {
    static CURRENT: RefCell<Option<RoutingCriteria>> = const { RefCell::new(None) };
}

/// Access to the thread's ambient routing criteria.
pub struct RoutingContext;

impl RoutingContext {
    /// Snapshot of the active criteria, or empty criteria outside a scope.
    pub fn current() -> RoutingCriteria {
        CURRENT.with(|current| current.borrow().clone().unwrap_or_default())
    }

    pub fn is_active() -> bool {
        CURRENT.with(|current| current.borrow().is_some())
    }

    /// Make `criteria` the ambient criteria until the returned scope drops.
    #[must_use = "the context is cleared as soon as the scope is dropped"]
    pub fn enter(criteria: RoutingCriteria) -> ContextScope {
        let previous = CURRENT.with(|current| current.replace(Some(criteria)));
        ContextScope {
            previous,
            _thread_bound: PhantomData,
        }
    }

    /// Run `f` with `criteria` as the ambient criteria.
    pub fn scoped<R>(criteria: RoutingCriteria, f: impl FnOnce() -> R) -> R {
        let _scope = Self::enter(criteria);
        f()
    }
}

/// Guard restoring the previous ambient criteria on drop.
pub struct ContextScope {
    previous: Option<RoutingCriteria>,
    // scopes must be dropped on the thread that entered them
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}
