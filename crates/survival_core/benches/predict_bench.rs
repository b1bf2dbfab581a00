use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use survival_core::{
    ArtifactBundle, ColumnKind, ColumnSpec, ColumnTransformer, Model, Node, PatientRecord,
    Predictor, Tree,
};

const TREE_COUNT: usize = 100;

fn training_rows() -> Vec<Vec<Option<String>>> {
    (0..200)
        .map(|i| {
            vec![
                Some(format!("{}", 40 + i % 50)),
                Some(format!("{}", 15 + i % 60)),
                Some(format!("{:.2}", 0.5 + (i % 30) as f64 / 10.0)),
                Some(if i % 3 == 0 { "M" } else { "F" }.to_string()),
            ]
        })
        .collect()
}

fn bench_predictor() -> Predictor {
    let columns = vec![
        ColumnSpec::new("age", ColumnKind::Numeric),
        ColumnSpec::new("ejection_fraction", ColumnKind::Numeric),
        ColumnSpec::new("serum_creatinine", ColumnKind::Numeric),
        ColumnSpec::new("sex", ColumnKind::Categorical),
    ];
    let transformer = ColumnTransformer::fit(columns, &training_rows()).expect("fit transformer");

    let trees = (0..TREE_COUNT)
        .map(|t| {
            let feature = (t % 3) as i32;
            Tree::new(vec![
                Node::internal(0, feature, 0.0, 1, 2),
                Node::internal(1, 3, 0.5, 3, 4),
                Node::leaf(2, -0.05),
                Node::leaf(3, 0.02),
                Node::leaf(4, 0.08),
            ])
        })
        .collect();
    let model = Model::new(trees, -0.7, transformer.output_feature_names());

    Predictor::new(ArtifactBundle::new(transformer, model).expect("bundle"))
}

fn bench_single_patient(c: &mut Criterion) {
    let predictor = bench_predictor();
    let record = PatientRecord::from_pairs([
        "age=72",
        "ejection_fraction=25",
        "serum_creatinine=1.8",
        "sex=M",
    ])
    .expect("record");

    let mut group = c.benchmark_group("predict");
    group.throughput(Throughput::Elements(1));
    group.bench_function("single_patient", |b| {
        b.iter(|| predictor.predict(black_box(&record)).expect("prediction"))
    });
    group.finish();
}

criterion_group!(benches, bench_single_patient);
criterion_main!(benches);
