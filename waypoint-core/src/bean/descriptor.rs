// Bean type descriptors: typed accessors behind the Readable/Writable capabilities

use super::{Converter, Mismatch, Readable, Value, Writable};
use std::any::{type_name, Any, TypeId};
use std::fmt::{self, Display};
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

/// How a property is reached on its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStyle {
    /// A struct field.
    Field,
    /// A getter/setter pair.
    Method,
}

/// What lives in a property slot.
#[derive(Debug, Clone, Copy)]
pub enum SlotKind {
    /// A single value converted from request strings.
    Scalar(Converter),
    /// A nested bean that paths may traverse into.
    Bean,
    /// A `Vec` that paths may index.
    List(ListShape),
}

/// The element kind of a list slot.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ElementKind {
    Scalar {
        element: Converter,
        whole: Converter,
    },
    Bean,
}

/// Type-erased operations on a `Vec<E>`.
#[derive(Clone, Copy)]
pub struct ListShape {
    pub(crate) list_type: TypeId,
    pub(crate) list_type_name: &'static str,
    pub(crate) element_type: TypeId,
    pub(crate) element_type_name: &'static str,
    pub(crate) element: ElementKind,
    pub(crate) new_list: fn() -> Value,
    pub(crate) len: fn(&dyn Any) -> Option<usize>,
    pub(crate) get: for<'a> fn(&'a dyn Any, usize) -> Option<&'a dyn Any>,
    pub(crate) get_mut: for<'a> fn(&'a mut dyn Any, usize) -> Option<&'a mut dyn Any>,
    pub(crate) set: fn(&mut dyn Any, usize, Value) -> Result<(), Mismatch>,
}

impl ListShape {
    /// `Vec<E>` of scalars.
    pub fn of_scalars<E>() -> Self
    where
        E: FromStr + Default + Send + 'static,
        E::Err: Display,
    {
        Self::build::<E>(ElementKind::Scalar {
            element: Converter::scalar::<E>(),
            whole: Converter::list::<E>(),
        })
    }

    /// `Vec<E>` of beans.
    pub fn of_beans<E: Default + Send + 'static>() -> Self {
        Self::build::<E>(ElementKind::Bean)
    }

    fn build<E: Default + Send + 'static>(element: ElementKind) -> Self {
        Self {
            list_type: TypeId::of::<Vec<E>>(),
            list_type_name: type_name::<Vec<E>>(),
            element_type: TypeId::of::<E>(),
            element_type_name: type_name::<E>(),
            element,
            new_list: new_list::<E>,
            len: list_len::<E>,
            get: list_get::<E>,
            get_mut: list_get_mut::<E>,
            set: list_set::<E>,
        }
    }

    pub fn list_type(&self) -> TypeId {
        self.list_type
    }

    pub fn element_type(&self) -> TypeId {
        self.element_type
    }

    pub fn element_is_bean(&self) -> bool {
        matches!(self.element, ElementKind::Bean)
    }

    /// Number of elements, `None` when `list` is not a `Vec` of this shape.
    pub fn len_of(&self, list: &dyn Any) -> Option<usize> {
        (self.len)(list)
    }
}

impl fmt::Debug for ListShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ListShape")
            .field(&self.list_type_name)
            .finish()
    }
}

fn new_list<E: Send + 'static>() -> Value {
    Box::new(Vec::<E>::new())
}

fn list_len<E: 'static>(list: &dyn Any) -> Option<usize> {
    list.downcast_ref::<Vec<E>>().map(Vec::len)
}

fn list_get<'a, E: 'static>(list: &'a dyn Any, index: usize) -> Option<&'a dyn Any> {
    list.downcast_ref::<Vec<E>>()?
        .get(index)
        .map(|element| element as &dyn Any)
}

/// Extend `list` with defaults so `index` is in bounds. `false` when the
/// required length is not representable.
fn grow<E: Default>(list: &mut Vec<E>, index: usize) -> bool {
    if list.len() > index {
        return true;
    }
    match index.checked_add(1) {
        Some(len) => {
            list.resize_with(len, E::default);
            true
        }
        None => false,
    }
}

fn list_get_mut<'a, E: Default + 'static>(
    list: &'a mut dyn Any,
    index: usize,
) -> Option<&'a mut dyn Any> {
    let list = list.downcast_mut::<Vec<E>>()?;
    if !grow(list, index) {
        return None;
    }
    list.get_mut(index).map(|element| element as &mut dyn Any)
}

fn list_set<E: Default + 'static>(
    list: &mut dyn Any,
    index: usize,
    value: Value,
) -> Result<(), Mismatch> {
    let list = list
        .downcast_mut::<Vec<E>>()
        .ok_or_else(Mismatch::of::<Vec<E>>)?;
    let value = value.downcast::<E>().map_err(|_| Mismatch::of::<E>())?;
    if !grow(list, index) {
        return Err(Mismatch::of::<Vec<E>>());
    }
    list[index] = *value;
    Ok(())
}

/// One named member of a bean type.
#[derive(Clone)]
pub struct Property {
    pub(crate) name: &'static str,
    pub(crate) owner: &'static str,
    pub(crate) style: AccessStyle,
    pub(crate) slot_type: TypeId,
    pub(crate) slot_type_name: &'static str,
    pub(crate) kind: SlotKind,
    /// The slot can be empty (`Option`) and is created on write.
    pub(crate) optional: bool,
    pub(crate) reader: Arc<dyn Readable>,
    pub(crate) writer: Option<Arc<dyn Writable>>,
}

impl Property {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name of the type that declares this member.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn style(&self) -> AccessStyle {
        self.style
    }

    pub fn slot_type(&self) -> TypeId {
        self.slot_type
    }

    pub fn slot_type_name(&self) -> &'static str {
        self.slot_type_name
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    pub fn is_traversable(&self) -> bool {
        matches!(self.kind, SlotKind::Bean | SlotKind::List(_)) && self.reader.is_traversable()
    }

    /// The same member seen through a parent scope projection.
    pub(crate) fn projected(&self, via: &[Arc<dyn Readable>]) -> Property {
        if via.is_empty() {
            return self.clone();
        }
        Property {
            reader: Arc::new(Projected {
                via: via.to_vec(),
                inner: self.reader.clone(),
            }),
            writer: self.writer.clone().map(|inner| {
                Arc::new(ProjectedWriter {
                    via: via.to_vec(),
                    inner,
                }) as Arc<dyn Writable>
            }),
            ..self.clone()
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("style", &self.style)
            .field("slot_type", &self.slot_type_name)
            .field("kind", &self.kind)
            .field("optional", &self.optional)
            .field("writable", &self.writer.is_some())
            .finish()
    }
}

struct FieldAccess<B, V> {
    get: fn(&B) -> &V,
    get_mut: fn(&mut B) -> &mut V,
}

impl<B: 'static, V: 'static> Readable for FieldAccess<B, V> {
    fn read<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        owner
            .downcast_ref::<B>()
            .map(|bean| (self.get)(bean) as &dyn Any)
    }

    fn read_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        owner
            .downcast_mut::<B>()
            .map(|bean| (self.get_mut)(bean) as &mut dyn Any)
    }
}

impl<B: 'static, V: 'static> Writable for FieldAccess<B, V> {
    fn write(&self, owner: &mut dyn Any, value: Value) -> Result<(), Mismatch> {
        let bean = owner.downcast_mut::<B>().ok_or_else(Mismatch::of::<B>)?;
        let value = value.downcast::<V>().map_err(|_| Mismatch::of::<V>())?;
        *(self.get_mut)(bean) = *value;
        Ok(())
    }
}

struct OptionAccess<B, V> {
    get: fn(&B) -> &Option<V>,
    get_mut: fn(&mut B) -> &mut Option<V>,
}

impl<B: 'static, V: 'static> Readable for OptionAccess<B, V> {
    fn read<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        let bean = owner.downcast_ref::<B>()?;
        (self.get)(bean).as_ref().map(|value| value as &dyn Any)
    }

    fn read_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let bean = owner.downcast_mut::<B>()?;
        (self.get_mut)(bean)
            .as_mut()
            .map(|value| value as &mut dyn Any)
    }
}

impl<B: 'static, V: 'static> Writable for OptionAccess<B, V> {
    fn write(&self, owner: &mut dyn Any, value: Value) -> Result<(), Mismatch> {
        let bean = owner.downcast_mut::<B>().ok_or_else(Mismatch::of::<B>)?;
        let value = value.downcast::<V>().map_err(|_| Mismatch::of::<V>())?;
        *(self.get_mut)(bean) = Some(*value);
        Ok(())
    }
}

struct MethodAccess<B, V> {
    getter: fn(&B) -> Option<&V>,
    setter: fn(&mut B, V),
}

impl<B: 'static, V: 'static> Readable for MethodAccess<B, V> {
    fn read<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        let bean = owner.downcast_ref::<B>()?;
        (self.getter)(bean).map(|value| value as &dyn Any)
    }

    fn read_mut<'a>(&self, _owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        None
    }

    fn is_traversable(&self) -> bool {
        false
    }
}

impl<B: 'static, V: 'static> Writable for MethodAccess<B, V> {
    fn write(&self, owner: &mut dyn Any, value: Value) -> Result<(), Mismatch> {
        let bean = owner.downcast_mut::<B>().ok_or_else(Mismatch::of::<B>)?;
        let value = value.downcast::<V>().map_err(|_| Mismatch::of::<V>())?;
        (self.setter)(bean, *value);
        Ok(())
    }
}

struct Getter<B, V> {
    getter: fn(&B) -> &V,
}

impl<B: 'static, V: 'static> Readable for Getter<B, V> {
    fn read<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        let bean = owner.downcast_ref::<B>()?;
        Some((self.getter)(bean) as &dyn Any)
    }

    fn read_mut<'a>(&self, _owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        None
    }

    fn is_traversable(&self) -> bool {
        false
    }
}

struct Projected {
    via: Vec<Arc<dyn Readable>>,
    inner: Arc<dyn Readable>,
}

impl Readable for Projected {
    fn read<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        let mut current = owner;
        for step in &self.via {
            current = step.read(current)?;
        }
        self.inner.read(current)
    }

    fn read_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let mut current = owner;
        for step in &self.via {
            current = step.read_mut(current)?;
        }
        self.inner.read_mut(current)
    }

    fn is_traversable(&self) -> bool {
        self.inner.is_traversable()
    }
}

struct ProjectedWriter {
    via: Vec<Arc<dyn Readable>>,
    inner: Arc<dyn Writable>,
}

impl Writable for ProjectedWriter {
    fn write(&self, owner: &mut dyn Any, value: Value) -> Result<(), Mismatch> {
        let mut current = owner;
        for step in &self.via {
            current = step
                .read_mut(current)
                .ok_or(Mismatch { expected: "parent scope" })?;
        }
        self.inner.write(current, value)
    }
}

/// A declared parent scope of a bean type.
#[derive(Clone)]
pub(crate) struct ScopeLink {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) projection: Arc<dyn Readable>,
}

/// Declares the bindable shape of `B`.
///
/// ```
/// use waypoint_core::bean::BeanType;
///
/// #[derive(Default)]
/// struct Order { id: u64, tags: Vec<String>, note: Option<String> }
///
/// let order = BeanType::<Order>::new()
///     .field("id", |o| &o.id, |o| &mut o.id)
///     .list("tags", |o| &o.tags, |o| &mut o.tags)
///     .optional_field("note", |o| &o.note, |o| &mut o.note);
/// assert_eq!(order.name(), "Order");
/// ```
pub struct BeanType<B> {
    pub(crate) name: &'static str,
    pub(crate) factory: Option<fn() -> Value>,
    pub(crate) properties: Vec<Property>,
    pub(crate) scopes: Vec<ScopeLink>,
    _marker: PhantomData<fn() -> B>,
}

fn construct<B: Default + Send + 'static>() -> Value {
    Box::new(B::default())
}

fn short_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    let start = base.rfind("::").map(|i| i + 2).unwrap_or(0);
    &full[start..]
}

impl<B: Default + Send + 'static> BeanType<B> {
    /// A bean type that can be default-constructed.
    pub fn new() -> Self {
        Self::with_factory(Some(construct::<B>))
    }
}

impl<B: Default + Send + 'static> Default for BeanType<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Send + 'static> BeanType<B> {
    /// A bean type without a default constructor. It may be traversed when
    /// present but is never created on demand.
    pub fn no_default() -> Self {
        Self::with_factory(None)
    }

    fn with_factory(factory: Option<fn() -> Value>) -> Self {
        Self {
            name: short_name(type_name::<B>()),
            factory,
            properties: Vec::new(),
            scopes: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Override the name used in error messages.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        for property in &mut self.properties {
            property.owner = name;
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn push<V: 'static>(
        mut self,
        name: &'static str,
        style: AccessStyle,
        kind: SlotKind,
        optional: bool,
        reader: Arc<dyn Readable>,
        writer: Option<Arc<dyn Writable>>,
    ) -> Self {
        self.properties.retain(|p| p.name != name);
        self.properties.push(Property {
            name,
            owner: self.name,
            style,
            slot_type: TypeId::of::<V>(),
            slot_type_name: type_name::<V>(),
            kind,
            optional,
            reader,
            writer,
        });
        self
    }

    fn field_access<V: 'static>(
        get: fn(&B) -> &V,
        get_mut: fn(&mut B) -> &mut V,
    ) -> Arc<FieldAccess<B, V>> {
        Arc::new(FieldAccess { get, get_mut })
    }

    fn option_access<V: 'static>(
        get: fn(&B) -> &Option<V>,
        get_mut: fn(&mut B) -> &mut Option<V>,
    ) -> Arc<OptionAccess<B, V>> {
        Arc::new(OptionAccess { get, get_mut })
    }

    /// A scalar field.
    pub fn field<V>(
        self,
        name: &'static str,
        get: fn(&B) -> &V,
        get_mut: fn(&mut B) -> &mut V,
    ) -> Self
    where
        V: FromStr + Send + 'static,
        V::Err: Display,
    {
        let access = Self::field_access(get, get_mut);
        self.push::<V>(
            name,
            AccessStyle::Field,
            SlotKind::Scalar(Converter::scalar::<V>()),
            false,
            access.clone(),
            Some(access),
        )
    }

    /// An `Option<scalar>` field. Reads see the inner value.
    pub fn optional_field<V>(
        self,
        name: &'static str,
        get: fn(&B) -> &Option<V>,
        get_mut: fn(&mut B) -> &mut Option<V>,
    ) -> Self
    where
        V: FromStr + Send + 'static,
        V::Err: Display,
    {
        let access = Self::option_access(get, get_mut);
        self.push::<V>(
            name,
            AccessStyle::Field,
            SlotKind::Scalar(Converter::scalar::<V>()),
            true,
            access.clone(),
            Some(access),
        )
    }

    /// An always-present nested bean.
    pub fn nested<V: Send + 'static>(
        self,
        name: &'static str,
        get: fn(&B) -> &V,
        get_mut: fn(&mut B) -> &mut V,
    ) -> Self {
        let access = Self::field_access(get, get_mut);
        self.push::<V>(
            name,
            AccessStyle::Field,
            SlotKind::Bean,
            false,
            access.clone(),
            Some(access),
        )
    }

    /// An `Option<bean>` created on first write.
    pub fn optional<V: Send + 'static>(
        self,
        name: &'static str,
        get: fn(&B) -> &Option<V>,
        get_mut: fn(&mut B) -> &mut Option<V>,
    ) -> Self {
        let access = Self::option_access(get, get_mut);
        self.push::<V>(
            name,
            AccessStyle::Field,
            SlotKind::Bean,
            true,
            access.clone(),
            Some(access),
        )
    }

    /// A `Vec<scalar>` field.
    pub fn list<E>(
        self,
        name: &'static str,
        get: fn(&B) -> &Vec<E>,
        get_mut: fn(&mut B) -> &mut Vec<E>,
    ) -> Self
    where
        E: FromStr + Default + Send + 'static,
        E::Err: Display,
    {
        let access = Self::field_access(get, get_mut);
        self.push::<Vec<E>>(
            name,
            AccessStyle::Field,
            SlotKind::List(ListShape::of_scalars::<E>()),
            false,
            access.clone(),
            Some(access),
        )
    }

    /// A `Vec<bean>` field.
    pub fn bean_list<E: Default + Send + 'static>(
        self,
        name: &'static str,
        get: fn(&B) -> &Vec<E>,
        get_mut: fn(&mut B) -> &mut Vec<E>,
    ) -> Self {
        let access = Self::field_access(get, get_mut);
        self.push::<Vec<E>>(
            name,
            AccessStyle::Field,
            SlotKind::List(ListShape::of_beans::<E>()),
            false,
            access.clone(),
            Some(access),
        )
    }

    /// A scalar reached through a getter/setter pair.
    pub fn accessor<V>(
        self,
        name: &'static str,
        getter: fn(&B) -> Option<&V>,
        setter: fn(&mut B, V),
    ) -> Self
    where
        V: FromStr + Send + 'static,
        V::Err: Display,
    {
        let access = Arc::new(MethodAccess { getter, setter });
        self.push::<V>(
            name,
            AccessStyle::Method,
            SlotKind::Scalar(Converter::scalar::<V>()),
            false,
            access.clone(),
            Some(access),
        )
    }

    /// A scalar with a getter only. Paths to it compile to `ReadOnly`.
    pub fn read_only<V>(self, name: &'static str, getter: fn(&B) -> &V) -> Self
    where
        V: FromStr + Send + 'static,
        V::Err: Display,
    {
        self.push::<V>(
            name,
            AccessStyle::Method,
            SlotKind::Scalar(Converter::scalar::<V>()),
            false,
            Arc::new(Getter { getter }),
            None,
        )
    }

    /// Embed a parent scope: members of `P` become members of `B`, searched
    /// after `B`'s own, reached through the projection.
    pub fn extends<P: Send + 'static>(
        mut self,
        get: fn(&B) -> &P,
        get_mut: fn(&mut B) -> &mut P,
    ) -> Self {
        self.scopes.push(ScopeLink {
            type_id: TypeId::of::<P>(),
            type_name: short_name(type_name::<P>()),
            projection: Self::field_access(get, get_mut),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_set_grows_with_defaults() {
        let shape = ListShape::of_scalars::<u32>();
        let mut list: Vec<u32> = Vec::new();
        (shape.set)(&mut list, 2, Box::new(7u32)).unwrap();
        assert_eq!(list, vec![0, 0, 7]);
        assert_eq!(shape.len_of(&list), Some(3));
    }

    #[test]
    fn test_unrepresentable_index_is_rejected() {
        let shape = ListShape::of_scalars::<u32>();
        let mut list: Vec<u32> = vec![1];

        assert!((shape.set)(&mut list, usize::MAX, Box::new(7u32)).is_err());
        assert!((shape.get_mut)(&mut list, usize::MAX).is_none());
        assert_eq!(list, vec![1]);
    }
}
