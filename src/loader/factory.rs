// SPDX-License-Identifier: MPL-2.0
//! Module factories and their identity.
//!
//! A factory is the only thing the loader knows about a module: a shared,
//! zero-argument async operation. Identity decides cache sharing and is never
//! derived from what the closure does.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use crate::error::ModuleError;

type FactoryFn<M> = dyn Fn() -> BoxFuture<'static, Result<M, ModuleError>> + Send + Sync;

/// Identity of a module factory, used as the loader cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FactoryId {
    /// Caller-provided stable key, shared across call sites.
    Key(Cow<'static, str>),
    /// Address of the shared closure allocation. Only clones of the same
    /// [`ModuleFactory`] carry the same instance id.
    Instance(usize),
}

impl fmt::Display for FactoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactoryId::Key(key) => write!(f, "{key}"),
            FactoryId::Instance(addr) => write!(f, "factory@{addr:#x}"),
        }
    }
}

/// Shared, cloneable async constructor of a module `M`.
///
/// ```
/// use lazy_mount::loader::ModuleFactory;
/// use lazy_mount::error::ModuleError;
///
/// let charts = ModuleFactory::keyed("charts", || async { Ok::<_, ModuleError>("chart view") });
/// let same = charts.clone();
/// assert_eq!(charts.id(), same.id());
///
/// let a = ModuleFactory::new(|| async { Ok::<_, ModuleError>(1) });
/// let b = ModuleFactory::new(|| async { Ok::<_, ModuleError>(1) });
/// assert_ne!(a.id(), b.id());
/// ```
pub struct ModuleFactory<M> {
    id: FactoryId,
    make: Arc<FactoryFn<M>>,
}

impl<M: Send + 'static> ModuleFactory<M> {
    /// Wraps a closure whose identity is this allocation.
    ///
    /// Two factories built from identical closures are distinct; share one
    /// factory value (or use [`ModuleFactory::keyed`]) to deduplicate loads
    /// across call sites.
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<M, ModuleError>> + Send + 'static,
    {
        let make: Arc<FactoryFn<M>> = Arc::new(move || factory().boxed());
        let id = FactoryId::Instance(Arc::as_ptr(&make).cast::<()>() as usize);
        Self { id, make }
    }

    /// Wraps a closure under an explicit stable key.
    pub fn keyed<F, Fut>(key: impl Into<Cow<'static, str>>, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<M, ModuleError>> + Send + 'static,
    {
        let make: Arc<FactoryFn<M>> = Arc::new(move || factory().boxed());
        Self {
            id: FactoryId::Key(key.into()),
            make,
        }
    }
}

impl<M> ModuleFactory<M> {
    #[must_use]
    pub fn id(&self) -> &FactoryId {
        &self.id
    }

    /// Starts one invocation of the factory.
    pub fn invoke(&self) -> BoxFuture<'static, Result<M, ModuleError>> {
        (self.make)()
    }
}

impl<M> Clone for ModuleFactory<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            make: Arc::clone(&self.make),
        }
    }
}

impl<M> fmt::Debug for ModuleFactory<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleFactory").field("id", &self.id).finish()
    }
}
