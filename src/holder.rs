//! Ambient, per-execution access to the current [`SecurityContext`].
//!
//! The holder binds a context to the current thread. Every binding made
//! through [`SecurityContextHolder::scope`] is released by a guard, so a
//! pooled worker never carries one request's identity into the next.
//!
//! Work that continues on another worker must carry its context explicitly:
//! capture a [`ContextSnapshot`] on the original worker and `run` the
//! continuation under it.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::SecurityContext;
use crate::principal::Principal;

thread_local! {
    static CURRENT: RefCell<Option<SecurityContext>> = const { RefCell::new(None) };
}

/// Namespace for the thread-bound security context.
///
/// # Examples
///
/// ```
/// use request_authz::{Principal, SecurityContext, SecurityContextHolder};
///
/// {
///     let _guard = SecurityContextHolder::scope(SecurityContext::with_principal(
///         Principal::new("user"),
///     ));
///     let ctx = SecurityContextHolder::get_context();
///     assert_eq!(ctx.principal().unwrap().name(), "user");
/// }
///
/// // Guard dropped: nothing leaks.
/// assert!(!SecurityContextHolder::is_attached());
/// ```
#[derive(Debug)]
pub struct SecurityContextHolder;

impl SecurityContextHolder {
    /// Returns the current context, attaching an empty one if none exists.
    pub fn get_context() -> SecurityContext {
        CURRENT.with(|slot| {
            slot.borrow_mut()
                .get_or_insert_with(SecurityContext::empty)
                .clone()
        })
    }

    /// Replaces the current context.
    ///
    /// Prefer [`scope`](Self::scope), which clears the context for you.
    pub fn set_context(context: SecurityContext) {
        CURRENT.with(|slot| *slot.borrow_mut() = Some(context));
    }

    /// Detaches the context from the current thread.
    pub fn clear_context() {
        CURRENT.with(|slot| *slot.borrow_mut() = None);
    }

    /// The principal of the attached context. Unlike
    /// [`get_context`](Self::get_context), never attaches anything.
    pub fn current_principal() -> Option<Arc<Principal>> {
        CURRENT.with(|slot| slot.borrow().as_ref().and_then(SecurityContext::shared_principal))
    }

    /// True if a context (possibly empty) is attached to this thread.
    pub fn is_attached() -> bool {
        CURRENT.with(|slot| slot.borrow().is_some())
    }

    /// Attaches `context` until the returned guard is dropped.
    ///
    /// When the guard drops, the previously attached context is restored,
    /// or the slot is cleared if there was none.
    #[must_use = "the context is detached as soon as the guard is dropped"]
    pub fn scope(context: SecurityContext) -> ContextGuard {
        let previous = CURRENT.with(|slot| slot.borrow_mut().replace(context));
        ContextGuard {
            previous,
            _not_send: PhantomData,
        }
    }

    /// Runs `f` with the current context, attaching an empty one if none
    /// exists. `f` may use the holder itself.
    pub fn with_context<R>(f: impl FnOnce(&SecurityContext) -> R) -> R {
        let ctx = Self::get_context();
        f(&ctx)
    }

    /// Wraps `f` so that it runs under the context current *now*,
    /// wherever it is eventually executed.
    pub fn wrap<F, R>(f: F) -> impl FnOnce() -> R + Send
    where
        F: FnOnce() -> R + Send,
    {
        let snapshot = ContextSnapshot::capture();
        move || snapshot.run(f)
    }
}

/// Releases a binding made by [`SecurityContextHolder::scope`].
///
/// The guard is `!Send`: it must be dropped on the thread it was made on.
#[derive(Debug)]
pub struct ContextGuard {
    previous: Option<SecurityContext>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        // try_with: the thread-local may already be gone during thread teardown.
        let _ = CURRENT.try_with(|slot| *slot.borrow_mut() = previous);
    }
}

/// A captured context that can be re-attached on another worker.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    context: Option<SecurityContext>,
}

impl ContextSnapshot {
    /// Captures the context attached to the current thread, if any.
    pub fn capture() -> Self {
        Self {
            context: CURRENT.with(|slot| slot.borrow().clone()),
        }
    }

    /// Snapshot of an explicit context.
    pub fn of(context: SecurityContext) -> Self {
        Self {
            context: Some(context),
        }
    }

    /// Returns the captured context.
    pub fn context(&self) -> Option<&SecurityContext> {
        self.context.as_ref()
    }

    /// Runs `f` with the captured context attached, then detaches it.
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        match self.context {
            Some(ctx) => {
                let _guard = SecurityContextHolder::scope(ctx);
                f()
            }
            None => {
                let previous = CURRENT.with(|slot| slot.borrow_mut().take());
                let _guard = ContextGuard {
                    previous,
                    _not_send: PhantomData,
                };
                f()
            }
        }
    }
}
