//! Criterion benchmarks for full verification runs.
//!
//! Run with: cargo bench -p eqv-core

use criterion::{criterion_group, criterion_main, Criterion};
use eqv_core::{verify, Configuration, Structural, TypeDef, TypeExpr, TypeRegistry};

fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .with(
            TypeDef::record("Point")
                .field("x", TypeExpr::int())
                .field("y", TypeExpr::int())
                .equality(Structural::exact())
                .build(),
        )
        .and_then(|r| {
            r.with(
                TypeDef::record("Order")
                    .field("id", TypeExpr::int())
                    .field("origin", TypeExpr::named("Point"))
                    .field("stops", TypeExpr::seq(TypeExpr::named("Point")))
                    .field("tags", TypeExpr::map(TypeExpr::string(), TypeExpr::bool()))
                    .field("note", TypeExpr::option(TypeExpr::string()))
                    .equality(Structural::exact())
                    .build(),
            )
        })
        .and_then(|r| {
            r.with(
                TypeDef::record("Node")
                    .field("value", TypeExpr::int())
                    .field("next", TypeExpr::option(TypeExpr::named("Node")))
                    .equality(Structural::exact())
                    .build(),
            )
        })
        .unwrap()
}

fn benchmarks(c: &mut Criterion) {
    let registry = registry();
    let config = Configuration::new();
    for name in ["Point", "Order", "Node"] {
        let target = TypeExpr::named(name);
        c.bench_function(&format!("verify_{}", name.to_lowercase()), |b| {
            b.iter(|| {
                let result = verify(&registry, &target, &config).unwrap();
                assert!(result.is_success());
            })
        });
    }
}

criterion_group!(benches, benchmarks);
criterion_main!(benches);
