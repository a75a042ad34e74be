// Compiled property paths over registered bean types

use super::descriptor::{AccessStyle, ElementKind, ListShape, Property, SlotKind};
use super::registry::BeanRegistry;
use super::{Converter, Mismatch, Value};
use crate::error::{BindingError, ConstructionError, Error};
use std::any::{Any, TypeId};
use std::fmt;

/// One member access on the way to a slot.
#[derive(Clone)]
pub struct SlotStep {
    property: Property,
    /// Creates the slot value when it is absent.
    create: Option<fn() -> Value>,
}

impl SlotStep {
    fn type_name(&self) -> String {
        self.property.owner.to_string()
    }

    fn write(&self, owner: &mut dyn Any, value: Value, path: &str) -> Result<(), BindingError> {
        let writer = self
            .property
            .writer
            .as_ref()
            .ok_or_else(|| BindingError::ReadOnly {
                type_name: self.type_name(),
                property: self.property.name.to_string(),
            })?;
        writer
            .write(owner, value)
            .map_err(|mismatch| type_mismatch(path, mismatch))
    }

    fn get_or_create<'a>(
        &self,
        owner: &'a mut dyn Any,
        path: &str,
    ) -> Result<&'a mut dyn Any, BindingError> {
        if self.property.reader.read(&*owner).is_none() {
            let create = self
                .create
                .ok_or_else(|| BindingError::Absent(path.to_string()))?;
            self.write(owner, create(), path)?;
        }
        self.property
            .reader
            .read_mut(owner)
            .ok_or_else(|| BindingError::Absent(path.to_string()))
    }
}

fn type_mismatch(path: &str, mismatch: Mismatch) -> BindingError {
    BindingError::TypeMismatch {
        path: path.to_string(),
        expected: mismatch.expected.to_string(),
    }
}

/// A compiled route from a root type to one slot.
///
/// Reads and writes address the same slot. Writes create missing
/// intermediate objects and grow lists; reads never mutate.
#[derive(Clone)]
pub enum BeanPath {
    /// A struct field of the current type.
    Field { path: String, slot: SlotStep },
    /// A getter/setter pair of the current type.
    Method { path: String, slot: SlotStep },
    /// An element of a list, either the root itself (`owner` is `None`) or a
    /// list member of the current type.
    Indexed {
        path: String,
        owner: Option<SlotStep>,
        list: ListShape,
        index: usize,
    },
    /// Intermediate steps followed by the terminal path.
    Composite {
        path: String,
        steps: Vec<BeanPath>,
        leaf: Box<BeanPath>,
    },
}

impl BeanPath {
    /// The path string this was compiled from.
    pub fn path(&self) -> &str {
        match self {
            BeanPath::Field { path, .. }
            | BeanPath::Method { path, .. }
            | BeanPath::Indexed { path, .. }
            | BeanPath::Composite { path, .. } => path,
        }
    }

    /// Type of the addressed slot.
    pub fn value_type(&self) -> TypeId {
        match self {
            BeanPath::Field { slot, .. } | BeanPath::Method { slot, .. } => slot.property.slot_type,
            BeanPath::Indexed { list, .. } => list.element_type,
            BeanPath::Composite { leaf, .. } => leaf.value_type(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            BeanPath::Field { slot, .. } | BeanPath::Method { slot, .. } => {
                slot.property.slot_type_name
            }
            BeanPath::Indexed { list, .. } => list.element_type_name,
            BeanPath::Composite { leaf, .. } => leaf.type_name(),
        }
    }

    /// Number of member or index accesses.
    pub fn depth(&self) -> usize {
        match self {
            BeanPath::Composite { steps, .. } => steps.len() + 1,
            _ => 1,
        }
    }

    /// Converter for request strings, when the slot holds a scalar or a
    /// list of scalars.
    pub fn converter(&self) -> Option<Converter> {
        match self {
            BeanPath::Field { slot, .. } | BeanPath::Method { slot, .. } => {
                match slot.property.kind {
                    SlotKind::Scalar(converter) => Some(converter),
                    SlotKind::List(ListShape {
                        element: ElementKind::Scalar { whole, .. },
                        ..
                    }) => Some(whole),
                    _ => None,
                }
            }
            BeanPath::Indexed { list, .. } => match list.element {
                ElementKind::Scalar { element, .. } => Some(element),
                ElementKind::Bean => None,
            },
            BeanPath::Composite { leaf, .. } => leaf.converter(),
        }
    }

    /// Read the slot. `None` when any step on the way is absent.
    pub fn get<'a>(&self, root: &'a dyn Any) -> Option<&'a dyn Any> {
        match self {
            BeanPath::Field { slot, .. } | BeanPath::Method { slot, .. } => {
                slot.property.reader.read(root)
            }
            BeanPath::Indexed {
                owner, list, index, ..
            } => {
                let values = match owner {
                    Some(step) => step.property.reader.read(root)?,
                    None => root,
                };
                (list.get)(values, *index)
            }
            BeanPath::Composite { steps, leaf, .. } => {
                let mut current = root;
                for step in steps {
                    current = step.get(current)?;
                }
                leaf.get(current)
            }
        }
    }

    /// Typed convenience over [`get`](Self::get).
    pub fn get_as<'a, T: 'static>(&self, root: &'a dyn Any) -> Option<&'a T> {
        self.get(root)?.downcast_ref::<T>()
    }

    /// Mutable access to the slot, creating absent steps and growing lists.
    pub fn get_or_create<'a>(
        &self,
        root: &'a mut dyn Any,
    ) -> Result<&'a mut dyn Any, BindingError> {
        match self {
            BeanPath::Field { path, slot } | BeanPath::Method { path, slot } => {
                slot.get_or_create(root, path)
            }
            BeanPath::Indexed {
                path,
                owner,
                list,
                index,
            } => {
                let values = match owner {
                    Some(step) => step.get_or_create(root, path)?,
                    None => root,
                };
                (list.get_mut)(values, *index).ok_or_else(|| BindingError::TypeMismatch {
                    path: path.clone(),
                    expected: list.list_type_name.to_string(),
                })
            }
            BeanPath::Composite { steps, leaf, .. } => {
                let mut current = root;
                for step in steps {
                    current = step.get_or_create(current)?;
                }
                leaf.get_or_create(current)
            }
        }
    }

    /// Write a typed value into the slot.
    pub fn set(&self, root: &mut dyn Any, value: Value) -> Result<(), BindingError> {
        match self {
            BeanPath::Field { path, slot } | BeanPath::Method { path, slot } => {
                slot.write(root, value, path)
            }
            BeanPath::Indexed {
                path,
                owner,
                list,
                index,
            } => {
                let values = match owner {
                    Some(step) => step.get_or_create(root, path)?,
                    None => root,
                };
                (list.set)(values, *index, value).map_err(|mismatch| type_mismatch(path, mismatch))
            }
            BeanPath::Composite { steps, leaf, .. } => {
                let mut current = root;
                for step in steps {
                    current = step.get_or_create(current)?;
                }
                leaf.set(current, value)
            }
        }
    }

    /// Convert request strings to the slot type and write them.
    pub fn set_raw(&self, root: &mut dyn Any, raw: &[String]) -> Result<(), BindingError> {
        let converter = self
            .converter()
            .ok_or_else(|| BindingError::TypeMismatch {
                path: self.path().to_string(),
                expected: format!("a scalar value, found {}", self.type_name()),
            })?;
        let value = converter.convert(self.path(), raw)?;
        self.set(root, value)
    }
}

impl fmt::Debug for BeanPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanPath::Field { path, .. } => f.debug_tuple("Field").field(path).finish(),
            BeanPath::Method { path, .. } => f.debug_tuple("Method").field(path).finish(),
            BeanPath::Indexed { path, index, .. } => f
                .debug_struct("Indexed")
                .field("path", path)
                .field("index", index)
                .finish(),
            BeanPath::Composite { path, steps, leaf } => f
                .debug_struct("Composite")
                .field("path", path)
                .field("steps", steps)
                .field("leaf", leaf)
                .finish(),
        }
    }
}

/// One token of a property path: `name`, `name[3]`, or a bare root `[3]`.
#[derive(Debug, PartialEq)]
struct Token {
    name: Option<String>,
    index: Option<usize>,
}

fn invalid(path: &str, reason: impl Into<String>) -> BindingError {
    BindingError::InvalidPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn tokenize(path: &str) -> Result<Vec<Token>, BindingError> {
    if path.is_empty() {
        return Err(invalid(path, "empty path"));
    }

    let mut tokens: Vec<Token> = Vec::new();
    let mut name = String::new();
    let mut index: Option<usize> = None;
    let mut chars = path.chars();

    fn flush(
        path: &str,
        tokens: &mut Vec<Token>,
        name: &mut String,
        index: &mut Option<usize>,
    ) -> Result<(), BindingError> {
        if name.is_empty() && (index.is_none() || !tokens.is_empty()) {
            return Err(invalid(path, "empty member name"));
        }
        let name = std::mem::take(name);
        tokens.push(Token {
            name: (!name.is_empty()).then_some(name),
            index: index.take(),
        });
        Ok(())
    }

    while let Some(c) = chars.next() {
        match c {
            '.' => flush(path, &mut tokens, &mut name, &mut index)?,
            '[' => {
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed {
                    return Err(invalid(path, "unterminated '['"));
                }
                let inner = inner.trim();
                if inner.is_empty() {
                    return Err(invalid(path, "empty brackets"));
                }
                if let Ok(n) = inner.parse::<usize>() {
                    if n == usize::MAX {
                        return Err(invalid(path, "index out of range"));
                    }
                    if index.is_some() {
                        return Err(invalid(path, "nested indexes are not supported"));
                    }
                    index = Some(n);
                } else {
                    // `a[b]` is member access
                    if !name.is_empty() || index.is_some() {
                        flush(path, &mut tokens, &mut name, &mut index)?;
                    }
                    name = inner.to_string();
                }
            }
            ']' => return Err(invalid(path, "unexpected ']'")),
            _ => {
                if index.is_some() {
                    return Err(invalid(path, "expected '.' or '[' after index"));
                }
                name.push(c);
            }
        }
    }
    flush(path, &mut tokens, &mut name, &mut index)?;
    Ok(tokens)
}

/// Reject `path` when one of its list indexes is above `limit`.
pub(crate) fn check_index_limit(path: &str, limit: usize) -> Result<(), BindingError> {
    match tokenize(path)?.iter().filter_map(|token| token.index).max() {
        Some(index) if index > limit => Err(invalid(
            path,
            format!("index {} exceeds the limit of {}", index, limit),
        )),
        _ => Ok(()),
    }
}

/// First member name of a path, used to decide whether a request name is
/// meant for a bean at all.
pub(crate) fn first_member(path: &str) -> Option<&str> {
    let end = path.find(['.', '[']).unwrap_or(path.len());
    let head = &path[..end];
    if !head.is_empty() {
        return Some(head);
    }
    // `[name]...`
    let rest = path.strip_prefix('[')?;
    let close = rest.find(']')?;
    let inner = rest[..close].trim();
    (!inner.is_empty() && inner.parse::<usize>().is_err()).then_some(inner)
}

/// Compile `path` against `root`.
pub fn compile(registry: &BeanRegistry, root: TypeId, path: &str) -> Result<BeanPath, Error> {
    let tokens = tokenize(path)?;
    let mut current = root;
    let mut consumed = String::new();
    let mut compiled: Vec<BeanPath> = Vec::with_capacity(tokens.len());

    for (position, token) in tokens.iter().enumerate() {
        let last = position + 1 == tokens.len();

        if let Some(name) = &token.name {
            if !consumed.is_empty() {
                consumed.push('.');
            }
            consumed.push_str(name);
        }
        if let Some(index) = token.index {
            consumed.push_str(&format!("[{}]", index));
        }

        let (segment, next) = match (&token.name, token.index) {
            (None, Some(index)) => {
                let list = registry
                    .list_shape(current)
                    .ok_or_else(|| BindingError::NotIndexable {
                        type_name: registry.describe(current),
                        property: consumed.clone(),
                    })?;
                let segment = BeanPath::Indexed {
                    path: consumed.clone(),
                    owner: None,
                    list,
                    index,
                };
                (segment, list.element_type)
            }
            (Some(name), index) => {
                let property = registry.resolve(current, name).ok_or_else(|| {
                    BindingError::UnknownProperty {
                        type_name: registry.describe(current),
                        property: name.clone(),
                    }
                })?;
                if property.writer.is_none() {
                    return Err(BindingError::ReadOnly {
                        type_name: property.owner.to_string(),
                        property: name.clone(),
                    }
                    .into());
                }
                compile_member(registry, property, index, &consumed, last)?
            }
            (None, None) => return Err(invalid(path, "empty member name").into()),
        };

        if !last {
            if let BeanPath::Indexed { list, .. } = &segment {
                if !list.element_is_bean() {
                    return Err(BindingError::NotTraversable {
                        type_name: list.element_type_name.to_string(),
                        property: consumed.clone(),
                    }
                    .into());
                }
            }
            if !registry.contains(next) {
                return Err(ConstructionError::Unregistered(segment.type_name().to_string()).into());
            }
        }

        compiled.push(segment);
        current = next;
    }

    let leaf = compiled
        .pop()
        .ok_or_else(|| invalid(path, "empty path"))?;
    if compiled.is_empty() {
        return Ok(leaf);
    }
    Ok(BeanPath::Composite {
        path: path.to_string(),
        steps: compiled,
        leaf: Box::new(leaf),
    })
}

fn compile_member(
    registry: &BeanRegistry,
    property: Property,
    index: Option<usize>,
    consumed: &str,
    last: bool,
) -> Result<(BeanPath, TypeId), Error> {
    match index {
        Some(index) => {
            let SlotKind::List(list) = property.kind else {
                return Err(BindingError::NotIndexable {
                    type_name: property.owner.to_string(),
                    property: property.name.to_string(),
                }
                .into());
            };
            let step = SlotStep {
                create: Some(list.new_list),
                property,
            };
            let segment = BeanPath::Indexed {
                path: consumed.to_string(),
                owner: Some(step),
                list,
                index,
            };
            Ok((segment, list.element_type))
        }
        None => {
            let next = property.slot_type;
            let mut create = None;
            if !last {
                if !matches!(property.kind, SlotKind::Bean) || !property.reader.is_traversable() {
                    return Err(BindingError::NotTraversable {
                        type_name: property.slot_type_name.to_string(),
                        property: property.name.to_string(),
                    }
                    .into());
                }
                if property.optional {
                    create = Some(registry.factory(next).ok_or_else(|| {
                        if registry.contains(next) {
                            ConstructionError::NoDefault(registry.describe(next))
                        } else {
                            ConstructionError::Unregistered(property.slot_type_name.to_string())
                        }
                    })?);
                }
            }
            let style = property.style;
            let slot = SlotStep { property, create };
            let path = consumed.to_string();
            let segment = match style {
                AccessStyle::Field => BeanPath::Field { path, slot },
                AccessStyle::Method => BeanPath::Method { path, slot },
            };
            Ok((segment, next))
        }
    }
}
