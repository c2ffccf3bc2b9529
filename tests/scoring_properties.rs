use chrono::{Days, NaiveDate, NaiveTime};
use proptest::prelude::*;
use rust_decimal::Decimal;
use vitalrs::baseline::BaselineEngine;
use vitalrs::models::{DailySample, SleepStagePercentages, TrainingLoad, WorkoutKind, WorkoutRecord};
use vitalrs::recovery::RecoveryScorer;
use vitalrs::sleep::SleepScorer;
use vitalrs::strain::{NonExercise, StrainScorer};
use vitalrs::zones::IntensityZones;
use vitalrs::TrainingLoadTracker;

/// Properties every score must hold regardless of input

fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(offset)
}

fn history(days: u64) -> Vec<DailySample> {
    (0..days)
        .map(|i| DailySample {
            hrv_ms: Some(55.0 + (i % 5) as f64),
            rhr_bpm: Some(52.0 + (i % 3) as f64),
            respiratory_rate: Some(14.5),
            ..DailySample::new(day(i))
        })
        .collect()
}

fn workout(id: usize, duration_sec: u32, avg_hr: Option<f64>, rpe: Option<f64>, tss: u32) -> WorkoutRecord {
    WorkoutRecord {
        id: format!("w{}", id),
        date: day(30),
        start: None,
        duration_sec,
        kind: WorkoutKind::Cardio,
        avg_hr,
        max_hr: None,
        hr_samples: None,
        has_power: false,
        rpe,
        training_stress_score: Decimal::from(tss),
    }
}

proptest! {
    #[test]
    fn recovery_composite_stays_in_range(
        hrv in proptest::option::of(0.1f64..2_000.0),
        rhr in proptest::option::of(1.0f64..400.0),
        resp in proptest::option::of(0.5f64..200.0),
        sleep in proptest::option::of(-50.0f64..250.0),
        ctl in 0.0f64..400.0,
        atl in 0.0f64..600.0,
        with_history in any::<bool>(),
    ) {
        let samples = if with_history { history(30) } else { Vec::new() };
        let baselines = BaselineEngine::new().compute_recovery_baselines(&samples, day(30));

        let today = DailySample {
            hrv_ms: hrv,
            rhr_bpm: rhr,
            respiratory_rate: resp,
            ..DailySample::new(day(30))
        };
        let load = Some(TrainingLoad::new(ctl, atl));

        let assessment = RecoveryScorer::new().assess(&today, &baselines, sleep, load);
        let composite = &assessment.composite;

        // the form component is always present, so the composite is never neutral
        let raw = composite.raw.unwrap();
        prop_assert!((0.0..=100.0).contains(&raw), "raw {}", raw);
        prop_assert!(composite.used.iter().all(|c| (0.0..=100.0).contains(&c.score)));
        let weight_sum: f64 = composite.used.iter().map(|c| c.effective_weight).sum();
        prop_assert!((weight_sum - 1.0).abs() < 1e-9);
        prop_assert_eq!(assessment.score, raw.round() as u8);
    }

    #[test]
    fn sleep_score_stays_in_range(
        asleep_min in proptest::option::of(0u32..1200),
        extra_bed_min in 0u32..240,
        deep in 0.0f64..40.0,
        rem in 0.0f64..40.0,
        disturbances in proptest::option::of(0u16..40),
        onset_minute in 0u32..1440,
    ) {
        let night = DailySample {
            sleep_duration_sec: asleep_min.map(|m| m * 60),
            time_in_bed_sec: asleep_min.map(|m| (m + extra_bed_min) * 60),
            sleep_stages: Some(SleepStagePercentages {
                deep,
                rem,
                core: 100.0 - deep - rem,
                awake: 0.0,
            }),
            sleep_disturbances: disturbances,
            sleep_onset: NaiveTime::from_num_seconds_from_midnight_opt(onset_minute * 60, 0),
            ..DailySample::new(day(0))
        };

        let score = SleepScorer::new().score(&night, None);
        prop_assert!(score <= 100);
    }

    #[test]
    fn strain_stays_in_range(
        durations in proptest::collection::vec(60u32..14_400, 0..5),
        hr in 40.0f64..220.0,
        rpe in 1.0f64..10.0,
        tss in 0u32..500,
        steps in proptest::option::of(0u32..60_000),
        recovery in proptest::option::of(0u8..=100),
    ) {
        let workouts: Vec<WorkoutRecord> = durations
            .iter()
            .enumerate()
            .map(|(i, d)| match i % 3 {
                0 => workout(i, *d, Some(hr), None, tss),
                1 => workout(i, *d, None, Some(rpe), tss),
                _ => workout(i, *d, None, None, tss),
            })
            .collect();
        let non_exercise = NonExercise { steps, active_energy_kcal: None };

        let strain = StrainScorer::new().score(&workouts, non_exercise, recovery);
        prop_assert!((0.0..=21.0).contains(&strain));
    }

    #[test]
    fn load_chain_keeps_tsb_consistent(tss in proptest::collection::vec(0.0f64..400.0, 1..120)) {
        let mut load = None;
        let peak = tss.iter().cloned().fold(0.0, f64::max);

        for value in &tss {
            let next = TrainingLoadTracker::update(*value, load);
            prop_assert!((next.tsb() - (next.ctl() - next.atl())).abs() < 1e-12);
            prop_assert!(next.ctl() >= 0.0 && next.ctl() <= peak + 1e-9);
            prop_assert!(next.atl() >= 0.0 && next.atl() <= peak + 1e-9);
            load = Some(next);
        }
    }

    #[test]
    fn zones_are_monotonic_in_heart_rate(a in 30.0f64..230.0, b in 30.0f64..230.0) {
        let zones = IntensityZones::default().for_athlete(55.0, 190.0).unwrap();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };

        prop_assert!(zones.zone_for_hr(low) <= zones.zone_for_hr(high));
        prop_assert!((1..=5).contains(&zones.zone_for_hr(low)));
    }
}

#[test]
fn recovery_without_inputs_is_neutral() {
    let baselines = BaselineEngine::new().compute_recovery_baselines(&[], day(30));
    let assessment = RecoveryScorer::new().assess(&DailySample::new(day(30)), &baselines, None, None);

    assert!(assessment.composite.raw.is_none());
    assert_eq!(assessment.score, 50);
}

#[test]
fn rest_days_decay_fitness_and_fatigue() {
    let mut load = TrainingLoadTracker::update(100.0, None);
    for _ in 0..14 {
        let next = TrainingLoadTracker::update(0.0, Some(load));
        assert!(next.ctl() < load.ctl());
        assert!(next.atl() < load.atl());
        load = next;
    }
    // fatigue clears faster than fitness
    assert!(load.tsb() > 0.0);
}
