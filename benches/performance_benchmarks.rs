use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal::Decimal;
use vitalrs::baseline::BaselineEngine;
use vitalrs::models::{DailySample, HeartRateSample, Metric, WorkoutKind, WorkoutRecord};
use vitalrs::strain::{NonExercise, StrainScorer};
use vitalrs::{AthleteTimeline, CorrelationAnalyzer, ScoreCache, ScoringPipeline};

/// Performance benchmarks for the scoring core
///
/// Dataset sizes are chosen to cover a month, a season and several years of
/// daily data.

fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap() + Days::new(offset)
}

fn create_samples(days: u64) -> Vec<DailySample> {
    (0..days)
        .map(|i| DailySample {
            hrv_ms: Some(55.0 + (i % 9) as f64),
            rhr_bpm: Some(50.0 + (i % 4) as f64),
            respiratory_rate: Some(14.0 + (i % 3) as f64 * 0.3),
            sleep_duration_sec: Some(7 * 3600 + (i % 5) as u32 * 600),
            time_in_bed_sec: Some(8 * 3600),
            sleep_disturbances: Some((i % 6) as u16),
            steps: Some(6000 + (i % 7) as u32 * 800),
            ..DailySample::new(day(i))
        })
        .collect()
}

fn create_workout(i: u64) -> WorkoutRecord {
    WorkoutRecord {
        id: format!("w{}", i),
        date: day(i),
        start: None,
        duration_sec: 3600,
        kind: WorkoutKind::Cardio,
        avg_hr: Some(135.0 + (i % 5) as f64 * 6.0),
        max_hr: Some(178.0),
        hr_samples: Some(
            (0..12)
                .map(|s| HeartRateSample {
                    duration_sec: 300,
                    bpm: 120.0 + s as f64 * 4.0,
                })
                .collect(),
        ),
        has_power: false,
        rpe: None,
        training_stress_score: Decimal::from(40 + (i % 4) * 15),
    }
}

fn create_timeline(days: u64) -> AthleteTimeline {
    let mut timeline = AthleteTimeline::new("bench");
    for sample in create_samples(days) {
        timeline.upsert_sample(sample);
    }
    for i in (0..days).filter(|i| i % 7 != 6) {
        timeline.add_workout(create_workout(i));
    }
    timeline
}

fn bench_pipeline_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pipeline Run");
    let pipeline = ScoringPipeline::new();

    for &days in &[30u64, 90, 365] {
        let timeline = create_timeline(days);

        group.throughput(Throughput::Elements(days));
        group.bench_with_input(BenchmarkId::new("run", days), &timeline, |b, timeline| {
            b.iter(|| {
                pipeline
                    .run(black_box(timeline), day(0), day(days - 1), None)
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_cached_rerun(c: &mut Criterion) {
    let pipeline = ScoringPipeline::new();
    let timeline = create_timeline(365);
    let cache = ScoreCache::default();
    pipeline
        .run_cached(&timeline, day(0), day(364), None, &cache)
        .unwrap();

    c.bench_function("cached rerun 365 days", |b| {
        b.iter(|| {
            pipeline
                .run_cached(black_box(&timeline), day(0), day(364), None, &cache)
                .unwrap()
        });
    });
}

fn bench_parallel_users(c: &mut Criterion) {
    let pipeline = ScoringPipeline::new();
    let timelines: Vec<AthleteTimeline> = (0..16).map(|_| create_timeline(180)).collect();

    c.bench_function("run_many 16 users x 180 days", |b| {
        b.iter(|| pipeline.run_many(black_box(&timelines)));
    });
}

fn bench_baseline(c: &mut Criterion) {
    let engine = BaselineEngine::new();
    let samples = create_samples(400);

    c.bench_function("hrv baseline", |b| {
        b.iter(|| engine.compute_baseline(Metric::Hrv, black_box(&samples), day(365)));
    });
}

fn bench_strain(c: &mut Criterion) {
    let scorer = StrainScorer::new();
    let mut group = c.benchmark_group("Strain");

    for &count in &[1u64, 3, 10] {
        let workouts: Vec<WorkoutRecord> = (0..count).map(create_workout).collect();
        let non_exercise = NonExercise {
            steps: Some(9000),
            active_energy_kcal: Some(450.0),
        };

        group.bench_with_input(BenchmarkId::new("day", count), &workouts, |b, workouts| {
            b.iter(|| scorer.score(black_box(workouts), non_exercise, Some(60)));
        });
    }

    group.finish();
}

fn bench_correlation(c: &mut Criterion) {
    let analyzer = CorrelationAnalyzer::new();
    let mut group = c.benchmark_group("Correlation");

    for &n in &[30usize, 365, 3650] {
        let xs: Vec<f64> = (0..n).map(|i| (i % 17) as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + (x * 0.7).sin()).collect();

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("analyze", n), &(xs, ys), |b, (xs, ys)| {
            b.iter(|| analyzer.analyze(black_box(xs), black_box(ys)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_pipeline_run,
    bench_cached_rerun,
    bench_parallel_users,
    bench_baseline,
    bench_strain,
    bench_correlation
);
criterion_main!(benches);
