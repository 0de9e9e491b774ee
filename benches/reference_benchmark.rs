use criterion::{black_box, criterion_group, criterion_main, Criterion};
use powerplay_api::db::{Document, Filter, Update};
use powerplay_api::models::{Exercise, ExerciseDraft};
use powerplay_api::services::exercises::group_for_explore;
use serde_json::json;

/// Patients with `routines` assigned routine stubs each.
fn patients(count: usize, routines: usize) -> Vec<Document> {
    (0..count)
        .map(|p| {
            let assigned: Vec<_> = (0..routines)
                .map(|r| json!({"_id": format!("r{}", (p + r) % (routines * 4))}))
                .collect();
            json!({"_id": format!("p{}", p), "assigned_routines": assigned})
                .as_object()
                .cloned()
                .expect("object literal")
        })
        .collect()
}

fn benchmark_reference_scan(c: &mut Criterion) {
    let docs = patients(5_000, 20);
    let filter = Filter::array_has_ref("assigned_routines", "r7");

    let mut group = c.benchmark_group("reference_scan");

    group.bench_function("array_has_ref_5000_patients", |b| {
        b.iter(|| {
            docs.iter()
                .filter(|d| black_box(&filter).matches(d))
                .count()
        })
    });

    group.bench_function("pull_stub_from_20_refs", |b| {
        let update = Update::new().pull("assigned_routines", json!({"_id": "r7"}));
        b.iter_batched(
            || docs[7].clone(),
            |mut doc| update.apply(black_box(&mut doc)),
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn benchmark_explore_grouping(c: &mut Criterion) {
    let exercises: Vec<Exercise> = (0..2_000)
        .map(|i| {
            Exercise::from_draft(
                format!("e{}", i),
                ExerciseDraft {
                    title: format!("Exercise {}", i),
                    category: format!("Category {}", i % 12),
                    subcategory: format!("Sub {}", i % 7),
                    ..Default::default()
                },
            )
        })
        .collect();

    c.bench_function("group_for_explore_2000", |b| {
        b.iter_batched(
            || exercises.clone(),
            |list| group_for_explore(black_box(list)),
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, benchmark_reference_scan, benchmark_explore_grouping);
criterion_main!(benches);
