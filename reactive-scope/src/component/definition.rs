//! The component contract and identity-compared component keys.

use super::CreationToken;
use crate::errors::BoxError;
use std::any::Any;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A type-erased component instance cached in a store.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A component definition: knows how to create and destroy its instances.
///
/// Implemented by whatever registers components with the scope; the scope
/// only calls `create` at most once and `destroy` at most once per
/// activation.
pub trait Component: Send + Sync + 'static {
    /// Returns the component's name, used in errors and logs.
    fn name(&self) -> &str;

    /// Materializes one instance.
    ///
    /// A failure leaves nothing cached; a later lookup retries.
    fn create(&self, token: &CreationToken) -> Result<Instance, BoxError>;

    /// Releases one instance.
    ///
    /// The default drops the instance and releases the token's dependents.
    fn destroy(&self, instance: Instance, token: &CreationToken) -> Result<(), BoxError> {
        drop(instance);
        token.release();
        Ok(())
    }
}

/// Identity handle for a registered component.
///
/// Two keys are equal only if they share the same component allocation;
/// the component's contents are never compared.
#[derive(Clone)]
pub struct ComponentKey {
    component: Arc<dyn Component>,
}

impl ComponentKey {
    /// Creates a key owning a new component definition.
    pub fn new(component: impl Component) -> Self {
        Self {
            component: Arc::new(component),
        }
    }

    /// Creates a key from a shared component definition.
    #[must_use]
    pub fn from_arc(component: Arc<dyn Component>) -> Self {
        Self { component }
    }

    /// Returns the component's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.component.name()
    }

    /// Returns the component definition.
    #[must_use]
    pub fn component(&self) -> &Arc<dyn Component> {
        &self.component
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.component).cast::<()>()
    }

    pub(crate) fn create(&self, token: &CreationToken) -> Result<Instance, BoxError> {
        self.component.create(token)
    }

    pub(crate) fn destroy(&self, instance: Instance, token: &CreationToken) -> Result<(), BoxError> {
        self.component.destroy(instance, token)
    }
}

impl PartialEq for ComponentKey {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for ComponentKey {}

impl Hash for ComponentKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl std::fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentKey")
            .field("name", &self.name())
            .field("addr", &self.addr())
            .finish()
    }
}

type CreateFn = dyn Fn(&CreationToken) -> Result<Instance, BoxError> + Send + Sync;
type DestroyFn = dyn Fn(Instance, &CreationToken) -> Result<(), BoxError> + Send + Sync;

/// A component built from closures.
///
/// ```rust,ignore
/// let key = FnComponent::new("counter", |_token| Ok(AtomicUsize::new(0)))
///     .on_destroy(|counter: Arc<AtomicUsize>, _token| {
///         tracing::info!(final = counter.load(Ordering::SeqCst), "counter released");
///         Ok(())
///     })
///     .into_key();
/// ```
pub struct FnComponent {
    name: String,
    create: Box<CreateFn>,
    destroy: Option<Box<DestroyFn>>,
}

impl FnComponent {
    /// Creates a component whose instances come from `factory`.
    pub fn new<T, F>(name: impl Into<String>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&CreationToken) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            create: Box::new(move |token| Ok(Arc::new(factory(token)?) as Instance)),
            destroy: None,
        }
    }

    /// Sets the destroy callback. The token's dependents are released after it
    /// succeeds.
    #[must_use]
    pub fn on_destroy<T, F>(mut self, destroy: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>, &CreationToken) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name = self.name.clone();
        self.destroy = Some(Box::new(move |instance, token| {
            let typed = instance.downcast::<T>().map_err(|_| {
                format!(
                    "instance of '{name}' is not a {}",
                    std::any::type_name::<T>()
                )
            })?;
            destroy(typed, token)?;
            token.release();
            Ok(())
        }));
        self
    }

    /// Converts into a component key.
    #[must_use]
    pub fn into_key(self) -> ComponentKey {
        ComponentKey::new(self)
    }
}

impl Component for FnComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, token: &CreationToken) -> Result<Instance, BoxError> {
        (self.create)(token)
    }

    fn destroy(&self, instance: Instance, token: &CreationToken) -> Result<(), BoxError> {
        match &self.destroy {
            Some(destroy) => destroy(instance, token),
            None => {
                drop(instance);
                token.release();
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for FnComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnComponent")
            .field("name", &self.name)
            .field("has_destroy", &self.destroy.is_some())
            .finish()
    }
}
