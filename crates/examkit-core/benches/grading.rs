use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examkit_core::allocator::allocate;
use examkit_core::grading::{aggregate, grade, ManualGrade};
use examkit_core::model::{AnswerRecord, Question, QuestionKind};
use examkit_core::normalize::normalize;

fn multiple_choice(id: u64, options: usize, key: &str) -> Question {
    Question {
        id,
        text: format!("Question {id}"),
        kind: QuestionKind::MultipleChoice,
        points: 1.0,
        options: (0..options).map(|i| format!("Option number {i}")).collect(),
        correct_answer: Some(key.into()),
        order_index: id as u32,
    }
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    group.bench_function("plain", |b| b.iter(|| normalize(black_box("B"))));
    group.bench_function("json_artifacts", |b| {
        b.iter(|| normalize(black_box("[\"Option number 3\"]")))
    });

    group.finish();
}

fn bench_grade(c: &mut Criterion) {
    let mut group = c.benchmark_group("grade");

    let four = multiple_choice(1, 4, "C");
    group.bench_function("mc_4_options_letter_vs_text", |b| {
        b.iter(|| grade(black_box(&four), black_box("Option number 2"), None))
    });

    let twenty_six = multiple_choice(2, 26, "Z");
    group.bench_function("mc_26_options_miss", |b| {
        b.iter(|| grade(black_box(&twenty_six), black_box("['nowhere']"), None))
    });

    let essay = Question {
        kind: QuestionKind::FreeText,
        options: vec![],
        correct_answer: None,
        ..multiple_choice(3, 0, "")
    };
    let manual = ManualGrade::new(7.5);
    group.bench_function("free_text_clamped", |b| {
        b.iter(|| grade(black_box(&essay), black_box("essay"), Some(&manual)))
    });

    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let questions: Vec<Question> = (0..200).map(|i| multiple_choice(i, 4, "A")).collect();
    let answers: Vec<AnswerRecord> = questions
        .iter()
        .map(|q| AnswerRecord {
            question_id: q.id,
            raw_answer: "A".into(),
            points_earned: 1.0,
            feedback: None,
            is_graded: true,
        })
        .collect();

    c.bench_function("aggregate_200_questions", |b| {
        b.iter(|| aggregate(black_box(&questions), black_box(&answers)))
    });
    c.bench_function("allocate_3600s_200_questions", |b| {
        b.iter(|| allocate(black_box(3600), black_box(200)))
    });
}

criterion_group!(benches, bench_normalize, bench_grade, bench_aggregate);
criterion_main!(benches);
