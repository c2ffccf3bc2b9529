use chrono::{Days, NaiveDate};
use rust_decimal_macros::dec;
use std::fmt::Write as _;
use std::fs;
use tempfile::TempDir;
use vitalrs::correlation::ScoreSeries;
use vitalrs::export::{DateRange, ExportFormat, ExportManager};
use vitalrs::import::ImportManager;
use vitalrs::models::{DailySample, DailyScore, SleepStagePercentages, WorkoutKind, WorkoutRecord};
use vitalrs::{
    AppConfig, AthleteTimeline, CorrelationAnalyzer, OvertrainingRiskAssessor, ScoreCache,
    ScoringPipeline, TrainingPhaseDetector,
};

/// End-to-end tests: files in, validated, scored, analysed and exported

const DAYS: u64 = 42;

fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 1).unwrap() + Days::new(offset)
}

/// Six weeks of daily samples with a mild weekly rhythm
fn samples_csv() -> String {
    let mut csv = String::from(
        "date,hrv_ms,rhr_bpm,respiratory_rate,sleep_hours,time_in_bed_sec,deep,rem,core,awake,disturbances,bedtime,steps,active_energy_kcal\n",
    );
    for i in 0..DAYS {
        writeln!(
            csv,
            "{},{},{},{},{},{},18,22,55,5,{},22:{:02},{},{}",
            day(i),
            60.0 - (i % 7) as f64,
            50.0 + (i % 4) as f64,
            14.0 + (i % 3) as f64 * 0.2,
            7.0 + (i % 3) as f64 * 0.5,
            (8 * 3600) + 1200,
            i % 4,
            30 + (i % 5) * 5,
            7000 + (i % 6) * 1000,
            350 + (i % 5) * 40,
        )
        .unwrap();
    }
    csv
}

/// Workouts on four days a week, with one hard interval day
fn workouts_csv() -> String {
    let mut csv = String::from("date,id,duration_sec,kind,avg_hr,max_hr,rpe,tss\n");
    for i in 0..DAYS {
        match i % 7 {
            0 | 2 | 4 => writeln!(csv, "{},ride-{},3600,cardio,132,150,4,55", day(i), i).unwrap(),
            5 => writeln!(csv, "{},intervals-{},2700,cardio,168,185,8,80", day(i), i).unwrap(),
            _ => {}
        }
    }
    csv
}

fn write_inputs(dir: &TempDir) {
    fs::write(dir.path().join("daily.csv"), samples_csv()).unwrap();
    fs::write(dir.path().join("workouts.csv"), workouts_csv()).unwrap();
}

fn load_timeline(dir: &TempDir, user: &str) -> AthleteTimeline {
    let manager = ImportManager::new();
    let mut data = manager.import_directory(dir.path()).unwrap();
    let report = manager.validate(&mut data);
    assert_eq!(report.rejected_workouts, 0);
    AthleteTimeline::from_imported(user, data)
}

fn score_all(timeline: &AthleteTimeline) -> Vec<DailyScore> {
    let (start, end) = timeline.span().unwrap();
    ScoringPipeline::new().run(timeline, start, end, None).unwrap()
}

#[test]
fn test_import_score_and_analyse() {
    let dir = TempDir::new().unwrap();
    write_inputs(&dir);

    let timeline = load_timeline(&dir, "ana");
    assert_eq!(timeline.span(), Some((day(0), day(DAYS - 1))));

    let scores = score_all(&timeline);
    assert_eq!(scores.len(), DAYS as usize);

    // recovery waits for a baseline; sleep and strain do not
    assert!(scores.iter().all(|s| s.sleep.is_some()));
    assert!(scores.iter().all(|s| s.strain.is_some()));
    assert!(scores[0].hrv_deviation_pct.is_none());
    assert!(scores.last().unwrap().hrv_deviation_pct.is_some());
    for score in &scores {
        assert!(score.recovery.map_or(true, |r| r <= 100));
        assert!((score.tsb() - (score.ctl() - score.atl())).abs() < 1e-9);
    }

    let interval_day = &scores[5];
    let rest_day = &scores[6];
    assert!(interval_day.strain.unwrap() > rest_day.strain.unwrap());
    assert_eq!(interval_day.daily_tss, 80.0);

    let risk = OvertrainingRiskAssessor::new().assess(&scores, 7).unwrap();
    assert!((0.0..=100.0).contains(&risk.risk_score));
    assert!(risk.factors.len() <= 3);

    let workouts = timeline.workouts_between(day(0), day(DAYS - 1));
    assert_eq!(workouts.len(), 24);
    let phase = TrainingPhaseDetector::new().detect(&workouts, &scores).unwrap();
    assert!((0.0..=1.0).contains(&phase.confidence));
    assert!(phase.weekly_tss > 0.0);

    let correlation = CorrelationAnalyzer::new()
        .correlate_scores(&scores, ScoreSeries::DailyTss, ScoreSeries::Recovery, 1)
        .unwrap();
    assert!((-1.0..=1.0).contains(&correlation.coefficient));
    assert!(correlation.sample_size > 2);
}

#[test]
fn test_short_history_is_unavailable() {
    let mut timeline = AthleteTimeline::new("ben");
    for i in 0..4 {
        timeline.upsert_sample(DailySample {
            hrv_ms: Some(50.0),
            ..DailySample::new(day(i))
        });
    }
    let scores = score_all(&timeline);

    let risk = OvertrainingRiskAssessor::new().assess(&scores, 7);
    assert!(risk.unwrap_err().is_unavailable());

    let phase = TrainingPhaseDetector::new().detect(&[], &scores);
    assert!(phase.unwrap_err().is_unavailable());
}

#[test]
fn test_backfill_matches_full_recompute() {
    let dir = TempDir::new().unwrap();
    write_inputs(&dir);
    let mut timeline = load_timeline(&dir, "ana");
    let pipeline = ScoringPipeline::new();
    let end = day(DAYS - 1);
    let before = pipeline.run(&timeline, day(0), end, None).unwrap();

    // a late re-sync corrects one night and adds a forgotten session
    let mut corrected = timeline.sample(day(20)).cloned().unwrap();
    corrected.hrv_ms = Some(38.0);
    let from_sample = timeline.upsert_sample(corrected).unwrap();
    let from_workout = timeline.add_workout(WorkoutRecord {
        id: "late-run".to_string(),
        date: day(18),
        start: None,
        duration_sec: 2400,
        kind: WorkoutKind::Cardio,
        avg_hr: Some(145.0),
        max_hr: None,
        hr_samples: None,
        has_power: false,
        rpe: None,
        training_stress_score: dec!(40),
    });
    let from = from_sample.min(from_workout);
    assert_eq!(from, day(18));

    let replayed = pipeline.replay_from(&before, from, &timeline, end).unwrap();
    let full = pipeline.run(&timeline, day(0), end, None).unwrap();

    assert_eq!(replayed, full);
    assert_eq!(replayed[..18], before[..18]);
    assert_ne!(replayed[18], before[18]);
    assert!(replayed[20].hrv_deviation_pct > before[20].hrv_deviation_pct);
}

#[test]
fn test_cached_rerun_only_recomputes_changed_days() {
    let dir = TempDir::new().unwrap();
    write_inputs(&dir);
    let mut timeline = load_timeline(&dir, "ana");
    let pipeline = ScoringPipeline::new();
    let cache = ScoreCache::default();
    let end = day(DAYS - 1);

    let first = pipeline.run_cached(&timeline, day(0), end, None, &cache).unwrap();
    assert_eq!(cache.metrics().cache_hits, 0);
    assert_eq!(cache.len(), DAYS as usize);

    let again = pipeline.run_cached(&timeline, day(0), end, None, &cache).unwrap();
    assert_eq!(first, again);
    assert_eq!(cache.metrics().cache_hits, DAYS);

    // changing the last day's sample leaves every earlier day cached
    let mut last = timeline.sample(end).cloned().unwrap();
    last.rhr_bpm = Some(64.0);
    timeline.upsert_sample(last);
    let updated = pipeline.run_cached(&timeline, day(0), end, None, &cache).unwrap();

    assert_eq!(cache.metrics().cache_hits, DAYS + DAYS - 1);
    assert_eq!(updated[..DAYS as usize - 1], first[..DAYS as usize - 1]);
    assert_eq!(updated, pipeline.run(&timeline, day(0), end, None).unwrap());
}

#[test]
fn test_parallel_users_match_sequential_runs() {
    let dir = TempDir::new().unwrap();
    write_inputs(&dir);

    let mut timelines = Vec::new();
    for (n, user) in ["ana", "ben", "cho", "dev"].iter().enumerate() {
        let mut timeline = load_timeline(&dir, user);
        // give each user different data from day 10 on
        for i in 10..DAYS {
            let mut sample = timeline.sample(day(i)).cloned().unwrap();
            sample.hrv_ms = sample.hrv_ms.map(|h| h + n as f64 * 3.0);
            timeline.upsert_sample(sample);
        }
        timelines.push(timeline);
    }
    timelines.push(AthleteTimeline::new("empty"));

    let pipeline = ScoringPipeline::from_config(&AppConfig::default());
    let results = pipeline.run_many(&timelines);

    assert_eq!(results.len(), timelines.len());
    for (result, timeline) in results.iter().zip(&timelines) {
        assert_eq!(result.user_id, timeline.user_id());
        let scores = result.result.as_ref().unwrap();
        match timeline.span() {
            Some(_) => assert_eq!(scores, &score_all(timeline)),
            None => assert!(scores.is_empty()),
        }
    }
    assert_ne!(
        results[0].result.as_ref().unwrap(),
        results[3].result.as_ref().unwrap()
    );
}

#[test]
fn test_validation_drops_implausible_values() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("daily.csv"),
        "date,hrv_ms,rhr_bpm,sleep_hours\n2024-04-01,0,51,7.5\n2024-04-02,62,400,7.0\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("workouts.csv"),
        "date,id,duration_sec,avg_hr,rpe,tss\n2024-04-01,ok,3600,140,12,50\n2024-04-02,bad,0,140,5,50\n",
    )
    .unwrap();

    let manager = ImportManager::new();
    let mut data = manager.import_directory(dir.path()).unwrap();
    let report = manager.validate(&mut data);

    assert_eq!(report.rejected_workouts, 1);
    assert_eq!(data.workouts.len(), 1);
    assert_eq!(data.workouts[0].rpe, Some(10.0));
    assert_eq!(data.samples[0].hrv_ms, None);
    assert_eq!(data.samples[1].rhr_bpm, None);
    assert!(report.issues.len() >= 3);
}

#[test]
fn test_export_scored_range() {
    let dir = TempDir::new().unwrap();
    write_inputs(&dir);
    let scores = score_all(&load_timeline(&dir, "ana"));
    let manager = ExportManager::new();
    let range = DateRange::new(Some(day(35)), None);

    let csv_path = dir.path().join("out").join("scores.csv");
    fs::create_dir_all(csv_path.parent().unwrap()).unwrap();
    manager
        .export_scores(&scores, ExportFormat::Csv, &range, &csv_path)
        .unwrap();
    let csv = fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 1 + 7);

    let json_path = dir.path().join("out").join("scores.json");
    manager
        .export_scores(&scores, ExportFormat::Json, &range, &json_path)
        .unwrap();
    let back: Vec<DailyScore> =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(back.len(), 7);
    for (read, original) in back.iter().zip(&scores[35..]) {
        assert_eq!(read.date, original.date);
        assert_eq!(read.recovery, original.recovery);
        assert_eq!(read.sleep, original.sleep);
        assert!((read.ctl() - original.ctl()).abs() < 1e-9);
    }

    let risk = OvertrainingRiskAssessor::new().assess(&scores, 7).ok();
    let report = manager.generate_report(&scores, &range, risk, None);
    let text_path = dir.path().join("out").join("report.txt");
    manager
        .export_report(&report, ExportFormat::Text, &text_path)
        .unwrap();
    let text = fs::read_to_string(&text_path).unwrap();
    assert!(text.contains("Days scored: 7"));
    assert!(text.contains("OVERTRAINING RISK"));
}

#[test]
fn test_sleep_stages_survive_import() {
    let dir = TempDir::new().unwrap();
    write_inputs(&dir);
    let timeline = load_timeline(&dir, "ana");

    let night = timeline.sample(day(3)).unwrap();
    assert_eq!(
        night.sleep_stages,
        Some(SleepStagePercentages {
            deep: 18.0,
            rem: 22.0,
            core: 55.0,
            awake: 5.0,
        })
    );
    assert_eq!(night.sleep_duration_sec, Some(7 * 3600));
    assert_eq!(night.sleep_disturbances, Some(3));
}

#[test]
fn test_workouts_without_ids_from_separate_files_are_kept() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("morning.csv"),
        "date,duration_sec,tss\n2024-04-01,3600,50\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("evening.csv"),
        "date,duration_sec,tss\n2024-04-01,1800,30\n",
    )
    .unwrap();

    let timeline = load_timeline(&dir, "ana");

    assert_eq!(timeline.workouts_on(day(0)).len(), 2);
    assert_eq!(timeline.daily_tss(day(0)), 80.0);
    let scores = score_all(&timeline);
    assert_eq!(scores[0].daily_tss, 80.0);
    assert_eq!(scores[0].ctl(), 80.0);

    // importing the same files again re-syncs instead of duplicating
    let manager = ImportManager::new();
    let again = manager.import_directory(dir.path()).unwrap();
    let mut resynced = timeline.clone();
    for workout in again.workouts {
        resynced.add_workout(workout);
    }
    assert_eq!(resynced.daily_tss(day(0)), 80.0);
}
