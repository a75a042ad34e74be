// Registry of bean type descriptors, filled once at startup

use super::descriptor::{BeanType, ListShape, Property, ScopeLink, SlotKind};
use super::{Readable, Value};
use crate::error::ConstructionError;
use parking_lot::RwLock;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// One place a member name is looked up, reached from the root through `via`.
struct LookupScope {
    type_id: TypeId,
    via: Vec<Arc<dyn Readable>>,
}

struct Registered {
    name: &'static str,
    factory: Option<fn() -> Value>,
    properties: Vec<Property>,
    /// Own scope first, then parents in declaration order, depth first.
    lookup: Vec<LookupScope>,
}

impl Registered {
    fn own(&self, member: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == member)
    }
}

/// Bean descriptors keyed by type.
///
/// Registration happens during startup; lookups afterwards only take the
/// read lock.
#[derive(Default)]
pub struct BeanRegistry {
    beans: RwLock<HashMap<TypeId, Arc<Registered>>>,
    lists: RwLock<HashMap<TypeId, ListShape>>,
}

impl BeanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bean type.
    ///
    /// Parent scopes declared with [`BeanType::extends`] must already be
    /// registered. List shapes of `list`/`bean_list` members are registered
    /// along with the type.
    pub fn register<B: Send + 'static>(&self, bean: BeanType<B>) -> Result<(), ConstructionError> {
        let BeanType {
            name,
            factory,
            properties,
            scopes,
            ..
        } = bean;

        let lookup = self.flatten(TypeId::of::<B>(), name, &scopes)?;

        {
            let mut lists = self.lists.write();
            for property in &properties {
                if let SlotKind::List(shape) = property.kind {
                    lists.entry(shape.list_type).or_insert(shape);
                }
            }
        }

        debug!(
            bean = name,
            properties = properties.len(),
            scopes = lookup.len(),
            "Registered bean type"
        );

        self.beans.write().insert(
            TypeId::of::<B>(),
            Arc::new(Registered {
                name,
                factory,
                properties,
                lookup,
            }),
        );
        Ok(())
    }

    fn flatten(
        &self,
        own: TypeId,
        name: &'static str,
        scopes: &[ScopeLink],
    ) -> Result<Vec<LookupScope>, ConstructionError> {
        let beans = self.beans.read();
        let mut lookup = vec![LookupScope {
            type_id: own,
            via: Vec::new(),
        }];

        for scope in scopes {
            let parent = beans
                .get(&scope.type_id)
                .ok_or_else(|| ConstructionError::UnknownScope {
                    type_name: name.to_string(),
                    scope: scope.type_name.to_string(),
                })?;

            for inherited in &parent.lookup {
                let mut via = Vec::with_capacity(inherited.via.len() + 1);
                via.push(scope.projection.clone());
                via.extend(inherited.via.iter().cloned());
                lookup.push(LookupScope {
                    type_id: inherited.type_id,
                    via,
                });
            }
        }
        Ok(lookup)
    }

    /// Register `Vec<E>` of beans so it can be a path root.
    pub fn register_list<E: Default + Send + 'static>(&self) {
        let shape = ListShape::of_beans::<E>();
        self.lists.write().insert(shape.list_type, shape);
    }

    /// Register `Vec<E>` of scalars so it can be a path root.
    pub fn register_scalar_list<E>(&self)
    where
        E: FromStr + Default + Send + 'static,
        E::Err: Display,
    {
        let shape = ListShape::of_scalars::<E>();
        self.lists.write().insert(shape.list_type, shape);
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.beans.read().contains_key(&type_id)
    }

    pub fn is_list(&self, type_id: TypeId) -> bool {
        self.lists.read().contains_key(&type_id)
    }

    /// Registered name of a bean type.
    pub fn name_of(&self, type_id: TypeId) -> Option<&'static str> {
        self.beans.read().get(&type_id).map(|bean| bean.name)
    }

    pub(crate) fn describe(&self, type_id: TypeId) -> String {
        if let Some(name) = self.name_of(type_id) {
            return name.to_string();
        }
        self.lists
            .read()
            .get(&type_id)
            .map(|shape| shape.list_type_name.to_string())
            .unwrap_or_else(|| format!("{:?}", type_id))
    }

    pub fn list_shape(&self, type_id: TypeId) -> Option<ListShape> {
        self.lists.read().get(&type_id).copied()
    }

    /// Default-construction capability of a registered bean.
    pub fn factory(&self, type_id: TypeId) -> Option<fn() -> Value> {
        self.beans.read().get(&type_id).and_then(|bean| bean.factory)
    }

    /// Resolve a member: own scope first, then parents.
    pub fn resolve(&self, type_id: TypeId, member: &str) -> Option<Property> {
        let beans = self.beans.read();
        let bean = beans.get(&type_id)?;
        bean.lookup.iter().find_map(|scope| {
            let declaring = if scope.type_id == type_id {
                bean
            } else {
                beans.get(&scope.type_id)?
            };
            declaring
                .own(member)
                .map(|property| property.projected(&scope.via))
        })
    }

    pub fn has_member(&self, type_id: TypeId, member: &str) -> bool {
        self.resolve(type_id, member).is_some()
    }

    /// Names of every member reachable on a type, own members first.
    pub fn members(&self, type_id: TypeId) -> Vec<&'static str> {
        let beans = self.beans.read();
        let Some(bean) = beans.get(&type_id) else {
            return Vec::new();
        };
        let mut names: Vec<&'static str> = Vec::new();
        for scope in &bean.lookup {
            if let Some(declaring) = beans.get(&scope.type_id) {
                for property in &declaring.properties {
                    if !names.contains(&property.name) {
                        names.push(property.name);
                    }
                }
            }
        }
        names
    }

    /// Check that `T` can serve as a binding root.
    pub fn require_constructible<T: 'static>(&self) -> Result<(), ConstructionError> {
        self.require_constructible_id(TypeId::of::<T>(), type_name::<T>())
    }

    pub(crate) fn require_constructible_id(
        &self,
        type_id: TypeId,
        type_name: &str,
    ) -> Result<(), ConstructionError> {
        if self.is_list(type_id) {
            return Ok(());
        }
        match self.beans.read().get(&type_id) {
            None => Err(ConstructionError::Unregistered(type_name.to_string())),
            Some(bean) if bean.factory.is_none() => {
                Err(ConstructionError::NoDefault(bean.name.to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    /// Create a default instance of a registered bean or list type.
    pub fn instantiate(
        &self,
        type_id: TypeId,
        type_name: &str,
    ) -> Result<Value, ConstructionError> {
        if let Some(shape) = self.list_shape(type_id) {
            return Ok((shape.new_list)());
        }
        self.require_constructible_id(type_id, type_name)?;
        self.factory(type_id)
            .map(|factory| factory())
            .ok_or_else(|| ConstructionError::NoDefault(type_name.to_string()))
    }

    /// Number of registered bean types.
    pub fn len(&self) -> usize {
        self.beans.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.beans.read().is_empty()
    }
}

impl std::fmt::Debug for BeanRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&'static str> = self.beans.read().values().map(|b| b.name).collect();
        names.sort_unstable();
        f.debug_struct("BeanRegistry")
            .field("beans", &names)
            .field("lists", &self.lists.read().len())
            .finish()
    }
}
