//! Typed request extensions.
//!
//! Values placed here by the transport layer or by filters feed parameters
//! declared with [`ParamSource::Injected`](crate::binder::ParamSource::Injected).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type-keyed storage, one value per type.
#[derive(Clone, Default)]
pub struct Extensions {
    map: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a typed value, replacing any previous value of the same type.
    #[inline]
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.map.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Insert an Arc-wrapped value directly.
    #[inline]
    pub fn insert_arc<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.map.insert(TypeId::of::<T>(), value);
    }

    #[inline]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Get the Arc holding a typed value.
    #[inline]
    pub fn get_arc<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.map
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    #[inline]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tenant(String);

    #[test]
    fn test_insert_and_get() {
        let mut ext = Extensions::new();
        ext.insert(Tenant("acme".to_string()));
        ext.insert(42u32);

        assert_eq!(ext.get::<Tenant>(), Some(&Tenant("acme".to_string())));
        assert_eq!(ext.get::<u32>(), Some(&42));
        assert_eq!(ext.get::<String>(), None);
        assert_eq!(ext.len(), 2);
    }

    #[test]
    fn test_replace_same_type() {
        let mut ext = Extensions::new();
        ext.insert(1u8);
        ext.insert(2u8);
        assert_eq!(ext.get::<u8>(), Some(&2));
        assert_eq!(ext.len(), 1);
    }

    #[test]
    fn test_get_arc() {
        let mut ext = Extensions::new();
        ext.insert_arc(Arc::new(Tenant("t".to_string())));
        let arc = ext.get_arc::<Tenant>().unwrap();
        assert_eq!(arc.0, "t");
        assert!(ext.contains::<Tenant>());
    }
}
