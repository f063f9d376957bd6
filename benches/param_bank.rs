use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

use petrun::{InputFormat, JsonParamGetter, KindSet, ParamResolver};

/// Run 1 with `scins` scintillators, two PMs each and four channels per PM.
fn database(scins: i32) -> Value {
    let pms: Vec<Value> = (0..scins * 2)
        .map(|id| json!({"id": id, "side": if id % 2 == 0 { "left" } else { "right" }, "scin_id": id / 2}))
        .collect();
    json!({
        "1": {
            "setup": [{"id": 1, "description": "bench"}],
            "layer": [{"id": 1, "name": "inner", "radius": 42.5, "setup_id": 1}],
            "slot": (0..scins).map(|id| json!({"id": id, "theta": id as f64 * 7.5, "layer_id": 1})).collect::<Vec<_>>(),
            "scin": (0..scins).map(|id| json!({"id": id, "length": 50.0, "height": 1.9, "width": 0.7, "slot_id": id})).collect::<Vec<_>>(),
            "pm": pms,
            "channel": (0..scins * 8).map(|id| json!({"id": id, "threshold_number": id % 4 + 1, "threshold_value": 80.0, "pm_id": id / 4})).collect::<Vec<_>>(),
        }
    })
}

fn bench_bank_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("params/bank");
    for scins in [48, 192] {
        let getter = Arc::new(JsonParamGetter::from_value(database(scins)).unwrap());

        group.bench_with_input(BenchmarkId::new("cold", scins), &scins, |b, _| {
            b.iter(|| {
                let resolver = ParamResolver::new(getter.clone());
                black_box(resolver.bank(1, KindSet::EMPTY).unwrap());
            });
        });

        let resolver = ParamResolver::new(getter.clone());
        resolver.bank(1, KindSet::EMPTY).unwrap();
        group.bench_with_input(BenchmarkId::new("cached", scins), &scins, |b, _| {
            b.iter(|| black_box(resolver.bank(1, KindSet::EMPTY).unwrap()));
        });

        let missing = InputFormat::Scope.expected_missing();
        group.bench_with_input(BenchmarkId::new("scope_missing", scins), &scins, |b, _| {
            b.iter(|| {
                let resolver = ParamResolver::new(getter.clone());
                black_box(resolver.bank(1, missing).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_bank_resolution);
criterion_main!(benches);
