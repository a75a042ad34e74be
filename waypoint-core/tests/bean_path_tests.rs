//! Bean path compilation, traversal and caching

use std::any::TypeId;
use std::sync::Arc;
use waypoint_core::bean::{compile, AccessStyle, BeanPath, BeanPathCache, BeanRegistry, BeanType};
use waypoint_core::{BindingError, ConstructionError, Error};

#[derive(Default, Debug, PartialEq)]
struct Entity {
    id: u64,
}

#[derive(Default, Debug, PartialEq)]
struct Line {
    sku: String,
    quantity: u32,
}

#[derive(Debug, PartialEq)]
struct Warehouse {
    code: String,
}

#[derive(Default, Debug, PartialEq)]
struct Order {
    entity: Entity,
    lines: Vec<Line>,
    notes: Vec<String>,
    status: Option<String>,
    warehouse: Option<Warehouse>,
    secret: String,
}

impl Order {
    fn status(&self) -> Option<&String> {
        self.status.as_ref()
    }

    fn set_status(&mut self, status: String) {
        self.status = Some(status.to_uppercase());
    }
}

fn registry() -> BeanRegistry {
    let registry = BeanRegistry::new();
    registry
        .register(BeanType::<Entity>::new().field("id", |e| &e.id, |e| &mut e.id))
        .unwrap();
    registry
        .register(
            BeanType::<Line>::new()
                .field("sku", |l| &l.sku, |l| &mut l.sku)
                .field("quantity", |l| &l.quantity, |l| &mut l.quantity),
        )
        .unwrap();
    registry
        .register(
            BeanType::<Warehouse>::no_default().field("code", |w| &w.code, |w| &mut w.code),
        )
        .unwrap();
    registry
        .register(
            BeanType::<Order>::new()
                .extends(|o| &o.entity, |o| &mut o.entity)
                .bean_list("lines", |o| &o.lines, |o| &mut o.lines)
                .list("notes", |o| &o.notes, |o| &mut o.notes)
                .accessor("status", Order::status, Order::set_status)
                .optional("warehouse", |o| &o.warehouse, |o| &mut o.warehouse)
                .read_only("secret", |o| &o.secret),
        )
        .unwrap();
    registry
}

fn raw(value: &str) -> Vec<String> {
    vec![value.to_string()]
}

#[test]
fn test_nested_list_round_trip() {
    let registry = registry();
    let path = compile(&registry, TypeId::of::<Order>(), "lines[1].quantity").unwrap();
    assert_eq!(path.path(), "lines[1].quantity");
    assert_eq!(path.value_type(), TypeId::of::<u32>());

    let mut order = Order::default();
    path.set_raw(&mut order, &raw("3")).unwrap();

    assert_eq!(order.lines.len(), 2);
    assert_eq!(order.lines[0], Line::default());
    assert_eq!(order.lines[1].quantity, 3);
    assert_eq!(path.get_as::<u32>(&order), Some(&3));
}

#[test]
fn test_index_past_end_grows_with_defaults() {
    let registry = registry();
    let path = compile(&registry, TypeId::of::<Order>(), "notes[2]").unwrap();

    let mut order = Order::default();
    path.set_raw(&mut order, &raw("third")).unwrap();
    assert_eq!(order.notes, vec!["", "", "third"]);

    path.set_raw(&mut order, &raw("replaced")).unwrap();
    assert_eq!(order.notes.len(), 3);
    assert_eq!(order.notes[2], "replaced");
}

#[test]
fn test_inherited_member_through_scope() {
    let registry = registry();
    let path = compile(&registry, TypeId::of::<Order>(), "id").unwrap();

    let mut order = Order::default();
    path.set_raw(&mut order, &raw("77")).unwrap();
    assert_eq!(order.entity.id, 77);
    assert_eq!(path.get_as::<u64>(&order), Some(&77));
}

#[test]
fn test_accessor_goes_through_setter() {
    let registry = registry();
    let path = compile(&registry, TypeId::of::<Order>(), "status").unwrap();
    assert!(matches!(path, BeanPath::Method { .. }));

    let mut order = Order::default();
    assert!(path.get(&order).is_none());
    path.set_raw(&mut order, &raw("shipped")).unwrap();
    assert_eq!(order.status.as_deref(), Some("SHIPPED"));

    let property = registry.resolve(TypeId::of::<Order>(), "status").unwrap();
    assert_eq!(property.style(), AccessStyle::Method);
}

#[test]
fn test_read_only_member_is_rejected() {
    let registry = registry();
    let err = compile(&registry, TypeId::of::<Order>(), "secret").unwrap_err();
    assert!(matches!(
        err,
        Error::Binding(BindingError::ReadOnly { ref property, .. }) if property == "secret"
    ));
}

#[test]
fn test_optional_without_default_cannot_be_created() {
    let registry = registry();
    let err = compile(&registry, TypeId::of::<Order>(), "warehouse.code").unwrap_err();
    assert!(matches!(
        err,
        Error::Construction(ConstructionError::NoDefault(ref name)) if name == "Warehouse"
    ));
}

#[test]
fn test_scalar_is_not_traversable() {
    let registry = registry();
    let err = compile(&registry, TypeId::of::<Order>(), "notes[0].length").unwrap_err();
    assert!(matches!(err, Error::Binding(BindingError::NotTraversable { .. })));

    let err = compile(&registry, TypeId::of::<Order>(), "id.value").unwrap_err();
    assert!(matches!(err, Error::Binding(BindingError::NotTraversable { .. })));
}

#[test]
fn test_unknown_member_names_the_type() {
    let registry = registry();
    let err = compile(&registry, TypeId::of::<Order>(), "lines[0].price").unwrap_err();
    match err {
        Error::Binding(BindingError::UnknownProperty {
            type_name,
            property,
        }) => {
            assert_eq!(type_name, "Line");
            assert_eq!(property, "price");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_conversion_failure() {
    let registry = registry();
    let path = compile(&registry, TypeId::of::<Order>(), "lines[0].quantity").unwrap();
    let mut order = Order::default();
    let err = path.set_raw(&mut order, &raw("many")).unwrap_err();
    assert!(matches!(err, BindingError::Conversion { ref value, .. } if value == "many"));
}

#[test]
fn test_write_of_wrong_type_is_a_mismatch() {
    let registry = registry();
    let path = compile(&registry, TypeId::of::<Order>(), "lines[0].quantity").unwrap();
    let mut order = Order::default();
    let err = path.set(&mut order, Box::new("3".to_string())).unwrap_err();
    assert!(matches!(err, BindingError::TypeMismatch { .. }));
}

#[test]
fn test_get_or_create_materializes_the_slot() {
    let registry = registry();
    let path = compile(&registry, TypeId::of::<Order>(), "lines[0]").unwrap();
    let mut order = Order::default();

    let slot = path.get_or_create(&mut order).unwrap();
    let line = slot.downcast_mut::<Line>().unwrap();
    line.sku = "A-1".to_string();

    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].sku, "A-1");
}

#[test]
fn test_cache_returns_the_same_compiled_path() {
    let registry = registry();
    let cache = BeanPathCache::new();
    let root = TypeId::of::<Order>();

    let a = cache.get_or_compile(&registry, root, "lines[0].sku").unwrap();
    let b = cache.get_or_compile(&registry, root, "lines[0].sku").unwrap();
    let c = cache.get_or_compile(&registry, root, "lines[1].sku").unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.compilations(), 2);
}

#[test]
fn test_cache_compiles_once_under_contention() {
    let registry = Arc::new(registry());
    let cache = Arc::new(BeanPathCache::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let cache = cache.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    cache
                        .get_or_compile(&registry, TypeId::of::<Order>(), "lines[3].quantity")
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.compilations(), 1);
}
