//! Structured parameter binding ("bean paths").
//!
//! Rust has no runtime reflection, so the shape of every bindable type is
//! declared once at startup with a [`BeanType`] and stored in a
//! [`BeanRegistry`]. A property path such as `address.lines[2].city` is then
//! compiled against that registry into a [`BeanPath`]: a chain of typed
//! accessors that can read or write one slot of a value, creating missing
//! intermediate objects and growing lists on the way.
//!
//! # Example
//!
//! ```
//! use waypoint_core::bean::{compile, BeanRegistry, BeanType};
//! use std::any::TypeId;
//!
//! #[derive(Default)]
//! struct Address { city: String }
//!
//! #[derive(Default)]
//! struct Person { name: String, address: Option<Address> }
//!
//! let registry = BeanRegistry::new();
//! registry
//!     .register(BeanType::<Address>::new().field("city", |a| &a.city, |a| &mut a.city))
//!     .unwrap();
//! registry
//!     .register(
//!         BeanType::<Person>::new()
//!             .field("name", |p| &p.name, |p| &mut p.name)
//!             .optional("address", |p| &p.address, |p| &mut p.address),
//!     )
//!     .unwrap();
//!
//! let path = compile(&registry, TypeId::of::<Person>(), "address.city").unwrap();
//! let mut person = Person::default();
//! path.set_raw(&mut person, &["Lisbon".to_string()]).unwrap();
//! assert_eq!(person.address.unwrap().city, "Lisbon");
//! ```

mod cache;
mod descriptor;
mod path;
mod registry;

pub use cache::BeanPathCache;
pub use descriptor::{AccessStyle, BeanType, ListShape, Property, SlotKind};
pub(crate) use path::{check_index_limit, first_member};
pub use path::{compile, BeanPath, SlotStep};
pub use registry::BeanRegistry;

use crate::error::BindingError;
use std::any::{type_name, Any};
use std::fmt::Display;
use std::str::FromStr;

/// A type-erased value moving into or out of a slot.
pub type Value = Box<dyn Any + Send>;

/// A write hit a value of the wrong type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: &'static str,
}

impl Mismatch {
    pub fn of<T: ?Sized>() -> Self {
        Self {
            expected: type_name::<T>(),
        }
    }
}

/// Read access to one slot of an owner value.
pub trait Readable: Send + Sync {
    /// The slot's value, or `None` when it is absent (or `owner` has the wrong type).
    fn read<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any>;

    /// Mutable access to the slot's value.
    fn read_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any>;

    /// Whether paths may continue through this slot.
    fn is_traversable(&self) -> bool {
        true
    }
}

/// Write access to one slot of an owner value.
pub trait Writable: Send + Sync {
    fn write(&self, owner: &mut dyn Any, value: Value) -> Result<(), Mismatch>;
}

/// Turns request strings into a typed [`Value`].
#[derive(Clone, Copy)]
pub struct Converter {
    type_name: &'static str,
    convert: fn(&[String]) -> Result<Value, String>,
}

impl Converter {
    /// First value parsed with `FromStr`.
    pub fn scalar<V>() -> Self
    where
        V: FromStr + Send + 'static,
        V::Err: Display,
    {
        Self {
            type_name: type_name::<V>(),
            convert: convert_first::<V>,
        }
    }

    /// `Option<V>`: `None` when no value was supplied.
    pub fn optional<V>() -> Self
    where
        V: FromStr + Send + 'static,
        V::Err: Display,
    {
        Self {
            type_name: type_name::<Option<V>>(),
            convert: convert_optional::<V>,
        }
    }

    /// `Vec<V>` from every supplied value.
    pub fn list<V>() -> Self
    where
        V: FromStr + Send + 'static,
        V::Err: Display,
    {
        Self {
            type_name: type_name::<Vec<V>>(),
            convert: convert_all::<V>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Convert the values supplied for `name`.
    pub fn convert(&self, name: &str, raw: &[String]) -> Result<Value, BindingError> {
        (self.convert)(raw).map_err(|reason| BindingError::Conversion {
            name: name.to_string(),
            value: raw.join(","),
            type_name: self.type_name.to_string(),
            reason,
        })
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Converter").field(&self.type_name).finish()
    }
}

fn parse_one<V>(raw: &str) -> Result<V, String>
where
    V: FromStr,
    V::Err: Display,
{
    raw.parse::<V>().map_err(|e| e.to_string())
}

fn convert_first<V>(raw: &[String]) -> Result<Value, String>
where
    V: FromStr + Send + 'static,
    V::Err: Display,
{
    let first = raw.first().ok_or_else(|| "no value supplied".to_string())?;
    Ok(Box::new(parse_one::<V>(first)?))
}

fn convert_optional<V>(raw: &[String]) -> Result<Value, String>
where
    V: FromStr + Send + 'static,
    V::Err: Display,
{
    let value: Option<V> = match raw.first() {
        Some(first) => Some(parse_one::<V>(first)?),
        None => None,
    };
    Ok(Box::new(value))
}

fn convert_all<V>(raw: &[String]) -> Result<Value, String>
where
    V: FromStr + Send + 'static,
    V::Err: Display,
{
    let values = raw
        .iter()
        .map(|value| parse_one::<V>(value))
        .collect::<Result<Vec<V>, String>>()?;
    Ok(Box::new(values))
}
