use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::any::TypeId;
use std::hint::black_box;
use waypoint::bean::{compile, BeanRegistry, BeanType};
use waypoint::prelude::*;

async fn ok(_req: HttpRequest) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::ok())
}

fn bench_pattern_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_compile");

    group.bench_function("static", |b| {
        b.iter(|| waypoint::RoutePattern::compile("GET", black_box("/api/v1/users")))
    });
    group.bench_function("constrained", |b| {
        b.iter(|| {
            waypoint::RoutePattern::compile("GET", black_box("/api/users/:id{[0-9]+}/posts/:post"))
        })
    });

    group.finish();
}

fn router_with(routes: usize) -> Router {
    let mut router = Router::new();
    for i in 0..routes {
        router
            .get(&format!("/api/resource{}/:id{{[0-9]+}}", i), ok)
            .unwrap();
    }
    router
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for routes in [10usize, 100, 500] {
        let router = router_with(routes);
        let last = format!("/api/resource{}/42", routes - 1);
        group.bench_with_input(BenchmarkId::new("last_route", routes), &last, |b, path| {
            b.iter(|| router.dispatch("GET", black_box(path), None, &[]))
        });
        group.bench_with_input(BenchmarkId::new("miss", routes), &routes, |b, _| {
            b.iter(|| router.dispatch("GET", black_box("/nowhere"), None, &[]))
        });
    }

    group.finish();
}

#[derive(Default)]
struct Address {
    city: String,
}

#[derive(Default)]
struct Person {
    name: String,
    addresses: Vec<Address>,
}

fn registry() -> BeanRegistry {
    let registry = BeanRegistry::new();
    registry
        .register(BeanType::<Address>::new().field("city", |a| &a.city, |a| &mut a.city))
        .unwrap();
    registry
        .register(
            BeanType::<Person>::new()
                .field("name", |p| &p.name, |p| &mut p.name)
                .bean_list("addresses", |p| &p.addresses, |p| &mut p.addresses),
        )
        .unwrap();
    registry
}

fn bench_bean_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("bean_path");
    let registry = registry();
    let root = TypeId::of::<Person>();

    group.bench_function("compile", |b| {
        b.iter(|| compile(&registry, root, black_box("addresses[3].city")))
    });

    let cache = waypoint::BeanPathCache::new();
    group.bench_function("cached", |b| {
        b.iter(|| cache.get_or_compile(&registry, root, black_box("addresses[3].city")))
    });

    let path = compile(&registry, root, "addresses[3].city").unwrap();
    let raw = vec!["Lisbon".to_string()];
    group.bench_function("set_raw", |b| {
        b.iter(|| {
            let mut person = Person::default();
            path.set_raw(&mut person, black_box(&raw)).unwrap();
            person
        })
    });

    group.finish();
}

fn bench_route_with_binding(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut router = Router::new();
    router
        .register(
            RouteDefinition::get("/users/:id{[0-9]+}")
                .unwrap()
                .param(ParamDefinition::new::<u64>("id", ParamSource::Path))
                .param(ParamDefinition::optional::<u32>("page", ParamSource::Query))
                .handler(ok),
        )
        .unwrap();

    c.bench_function("route_with_binding", |b| {
        b.to_async(&rt).iter(|| async {
            let request = HttpRequest::new("GET".to_string(), "/users/42?page=2".to_string());
            router.route(black_box(request)).await
        })
    });
}

criterion_group!(
    benches,
    bench_pattern_compile,
    bench_dispatch,
    bench_bean_paths,
    bench_route_with_binding
);
criterion_main!(benches);
