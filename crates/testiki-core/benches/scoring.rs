use criterion::{black_box, criterion_group, criterion_main, Criterion};

use testiki_core::model::{Question, ScoreRange, ScoringMethod, ScoringRules, Test};
use testiki_core::scoring::{percentage, score};
use testiki_core::Attempt;

fn make_test(questions: usize, options: usize, method: ScoringMethod) -> Test {
    Test {
        id: "bench".into(),
        title: "Bench".into(),
        description: String::new(),
        category: None,
        questions: (0..questions)
            .map(|i| Question {
                id: i.to_string(),
                text: format!("Question {i}"),
                options: (0..options).map(|o| o.to_string()).collect(),
                correct: Some(i % options),
                weights: None,
            })
            .collect(),
        scoring_rules: ScoringRules {
            ranges: (0..10)
                .map(|i| ScoreRange {
                    min: i * 10,
                    max: i * 10 + 9,
                    text: Some(format!("band {i}")),
                    description: None,
                })
                .collect(),
        },
        scoring_method: method,
        time_limit_secs: None,
    }
}

fn answered(test: &Test) -> Attempt {
    let mut attempt = Attempt::new();
    for (i, q) in test.questions.iter().enumerate() {
        attempt
            .record_answer(test, &q.id, i % q.options.len())
            .unwrap();
    }
    attempt
}

fn bench_percentage(c: &mut Criterion) {
    c.bench_function("percentage", |b| {
        b.iter(|| percentage(black_box(5), black_box(8)))
    });
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("score");

    let methods = [
        ("linear_sum", ScoringMethod::default()),
        ("correct_answer", ScoringMethod::CorrectAnswer),
        (
            "keyed_polarity",
            ScoringMethod::KeyedPolarity {
                keyed_option: 1,
                reverse_scored: (0..40).step_by(3).map(|i: usize| i.to_string()).collect(),
            },
        ),
    ];

    for (name, method) in methods {
        let test = make_test(40, 4, method);
        let attempt = answered(&test);
        group.bench_function(name, |b| {
            b.iter(|| score(black_box(&test), black_box(&attempt)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_percentage, bench_strategies);
criterion_main!(benches);
