//! End-to-end generation runs against the in-memory repository.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use pretty_assertions::assert_eq;

use therapy_timetable::config::{OccupancyPolicy, SchedulingConfig};
use therapy_timetable::generator::{GenerationRequest, GenerationStage, TimetableGenerator};
use therapy_timetable::models::{
    Assignment, AvailabilityWindow, Child, DayOfWeek, DepartmentNeed, Session, Therapist,
    TimeWindow, WeekStart,
};
use therapy_timetable::repository::{
    CachedRepository, DataRepository, InMemoryCache, InMemoryRepository,
};

const SPEECH: u32 = 10;
const PHYSIO: u32 = 20;

fn hm(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn week() -> WeekStart {
    WeekStart::new(monday()).unwrap()
}

fn window(day: DayOfWeek, start: u32, end: u32) -> AvailabilityWindow {
    AvailabilityWindow::new(day, hm(start), hm(end))
}

/// Defaults, but accepting three-hour availability windows.
fn long_window_config() -> SchedulingConfig {
    let mut config = SchedulingConfig::default();
    config.hours.max_window_minutes = 180;
    config
}

fn scenario_one_repo() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    repo.add_child(
        Child::new(1, "Ada")
            .with_need(DepartmentNeed::new(SPEECH, "Speech", 2))
            .with_availability(window(DayOfWeek::Monday, 9, 12))
            .with_availability(window(DayOfWeek::Wednesday, 9, 12)),
    );
    repo.add_therapist(
        Therapist::new(1, "Dr. Lee", SPEECH, "Speech")
            .with_availability(window(DayOfWeek::Monday, 9, 12)),
    );
    repo.add_therapist(
        Therapist::new(2, "Dr. Kim", SPEECH, "Speech")
            .with_availability(window(DayOfWeek::Wednesday, 9, 12)),
    );
    repo
}

/// Four children over two departments, four therapists.
fn clinic_repo() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    let children = [
        (1, "Ada", 3, 2),
        (2, "Ben", 2, 1),
        (3, "Cleo", 4, 0),
        (4, "Dev", 1, 3),
    ];
    for (id, name, speech, physio) in children {
        repo.add_child(
            Child::new(id, name)
                .with_need(DepartmentNeed::new(SPEECH, "Speech", speech))
                .with_need(DepartmentNeed::new(PHYSIO, "Physio", physio))
                .with_availability(window(DayOfWeek::Monday, 8, 10))
                .with_availability(window(DayOfWeek::Monday, 10, 12))
                .with_availability(window(DayOfWeek::Tuesday, 13, 15))
                .with_availability(window(DayOfWeek::Thursday, 9, 11)),
        );
    }
    repo.add_therapist(
        Therapist::new(11, "Dr. Lee", SPEECH, "Speech")
            .with_availability(window(DayOfWeek::Monday, 8, 10))
            .with_availability(window(DayOfWeek::Tuesday, 13, 15)),
    );
    repo.add_therapist(
        Therapist::new(12, "Dr. Kim", SPEECH, "Speech")
            .with_availability(window(DayOfWeek::Monday, 10, 12))
            .with_availability(window(DayOfWeek::Thursday, 9, 11)),
    );
    repo.add_therapist(
        Therapist::new(21, "Dr. Osei", PHYSIO, "Physio")
            .with_availability(window(DayOfWeek::Monday, 9, 11))
            .with_availability(window(DayOfWeek::Thursday, 9, 11)),
    );
    repo.add_therapist(
        Therapist::new(22, "Dr. Park", PHYSIO, "Physio")
            .with_availability(window(DayOfWeek::Tuesday, 13, 15)),
    );
    repo
}

fn clinic_request() -> GenerationRequest {
    GenerationRequest::new(monday(), vec![1, 2, 3, 4], vec![11, 12, 21, 22])
}

fn stored(repo: &InMemoryRepository) -> Vec<Session> {
    repo.sessions_for_week(week()).unwrap()
}

#[test]
fn test_two_sessions_spread_over_two_therapists() {
    let repo = scenario_one_repo();
    let generator = TimetableGenerator::new(repo.clone(), long_window_config(), 42);

    let outcome = generator.generate(&GenerationRequest::new(monday(), vec![1], vec![1, 2]));

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.sessions_created, 2);
    assert!(outcome.warnings.is_empty(), "warnings: {:?}", outcome.warnings);
    assert_eq!(outcome.stage, GenerationStage::Done);

    let sessions = stored(&repo);
    assert_eq!(sessions.len(), 2);
    let mut placed: Vec<(u32, NaiveDate)> = sessions.iter().map(|s| (s.therapist_id, s.date)).collect();
    placed.sort();
    assert_eq!(
        placed,
        vec![(1, monday()), (2, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap())]
    );

    let overview = outcome.timetable_data.unwrap();
    assert_eq!(overview.total_sessions, 2);
    assert_eq!(overview.days.len(), 2);
}

#[test]
fn test_three_hour_windows_rejected_by_default() {
    let repo = scenario_one_repo();
    let generator = TimetableGenerator::new(repo.clone(), SchedulingConfig::default(), 42);

    let outcome = generator.generate(&GenerationRequest::new(monday(), vec![1], vec![1, 2]));

    assert!(!outcome.success);
    assert!(outcome
        .errors
        .contains(&"Ada: Invalid time range 09:00-12:00".to_string()));
    assert_eq!(repo.session_count(), 0);
}

#[test]
fn test_tuesday_week_start_is_rejected() {
    let repo = scenario_one_repo();
    let generator = TimetableGenerator::new(repo.clone(), long_window_config(), 42);
    let tuesday = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

    let outcome = generator.generate(&GenerationRequest::new(tuesday, vec![1], vec![1, 2]));

    assert!(!outcome.success);
    assert_eq!(outcome.sessions_created, 0);
    assert_eq!(outcome.errors, vec!["Week must start on Monday".to_string()]);
    assert_eq!(repo.session_count(), 0);
}

#[test]
fn test_second_run_for_same_week_is_refused() {
    let repo = scenario_one_repo();
    let generator = TimetableGenerator::new(repo.clone(), long_window_config(), 42);
    let request = GenerationRequest::new(monday(), vec![1], vec![1, 2]);

    assert!(generator.generate(&request).success);
    let before = repo.session_count();

    let again = generator.generate(&request);
    assert!(!again.success);
    assert_eq!(again.sessions_created, 0);
    assert!(again.errors[0]
        .to_lowercase()
        .contains("sessions already exist for this week"));
    assert_eq!(again.failed_at, Some(GenerationStage::Received));
    assert_eq!(repo.session_count(), before);
}

#[test]
fn test_regenerate_replaces_week() {
    let repo = scenario_one_repo();
    let generator = TimetableGenerator::new(repo.clone(), long_window_config(), 42);
    let request = GenerationRequest::new(monday(), vec![1], vec![1, 2]);

    assert!(generator.generate(&request).success);
    let outcome = generator.generate(&request.regenerate());

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.sessions_created, 2);
    assert_eq!(outcome.warnings, vec!["Cleared 2 existing sessions".to_string()]);
    assert_eq!(repo.session_count(), 2);
}

#[test]
fn test_switched_off_therapist_leaves_demand_unplaced() {
    let repo = InMemoryRepository::new();
    repo.add_child(
        Child::new(1, "Ada")
            .with_need(DepartmentNeed::new(SPEECH, "Speech", 3))
            .with_availability(window(DayOfWeek::Monday, 9, 11))
            .with_availability(window(DayOfWeek::Tuesday, 9, 11)),
    );
    repo.add_therapist(
        Therapist::new(1, "Dr. Lee", SPEECH, "Speech")
            .with_availability(window(DayOfWeek::Monday, 9, 11))
            .with_availability(window(DayOfWeek::Tuesday, 9, 11)),
    );
    repo.set_window_available(1, 0, false).unwrap();
    repo.set_window_available(1, 1, false).unwrap();

    let generator = TimetableGenerator::new(repo.clone(), SchedulingConfig::default(), 42);
    let outcome = generator.generate(&GenerationRequest::new(monday(), vec![1], vec![1]));

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.sessions_created, 0);
    assert_eq!(
        outcome
            .warnings
            .iter()
            .filter(|w| w.as_str() == "Could not allocate session for Ada in Speech")
            .count(),
        3
    );
    assert!(outcome
        .warnings
        .contains(&"Department Speech: 3 sessions needed, 0 available".to_string()));
    assert_eq!(repo.session_count(), 0);
}

#[test]
fn test_lower_previous_load_is_preferred() {
    let repo = InMemoryRepository::new();
    repo.add_child(
        Child::new(1, "Ada")
            .with_need(DepartmentNeed::new(SPEECH, "Speech", 1))
            .with_availability(window(DayOfWeek::Monday, 9, 11)),
    );
    for id in [1, 2] {
        repo.add_therapist(
            Therapist::new(id, format!("T{id}"), SPEECH, "Speech")
                .with_availability(window(DayOfWeek::Monday, 9, 11)),
        );
    }
    let last_week = week().previous();
    for i in 0..10 {
        repo.insert_session(Assignment {
            child_id: 99,
            therapist_id: 1,
            department_id: SPEECH,
            date: last_week.date_for(DayOfWeek::ALL[i % 6]),
            start_time: hm(8 + (i as u32 / 6)),
            end_time: hm(9 + (i as u32 / 6)),
            week_starting: last_week,
            priority_score: 0,
        });
    }
    assert_eq!(repo.previous_week_loads(week()).unwrap().get(&1), Some(&10));

    let generator = TimetableGenerator::new(repo.clone(), SchedulingConfig::default(), 42);
    let outcome = generator.generate(&GenerationRequest::new(monday(), vec![1], vec![1, 2]));

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    let sessions = stored(&repo);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].therapist_id, 2);
}

#[test]
fn test_same_seed_same_timetable() {
    let run = |seed: u64| {
        let repo = clinic_repo();
        let generator = TimetableGenerator::new(repo.clone(), SchedulingConfig::default(), seed);
        let outcome = generator.generate(&clinic_request());
        assert!(outcome.success, "errors: {:?}", outcome.errors);
        (stored(&repo), outcome.warnings)
    };

    assert_eq!(run(7), run(7));
    assert_eq!(run(1234), run(1234));
}

#[test]
fn test_invariants_hold_on_busy_week() {
    let repo = clinic_repo();
    let children = repo.fetch_active_children_with_needs(&[1, 2, 3, 4]).unwrap();
    let therapists = repo
        .fetch_available_therapists_with_schedule(&[11, 12, 21, 22])
        .unwrap();

    for seed in [1, 2, 3, 42, 99] {
        repo.clear_week(week()).unwrap();
        let generator = TimetableGenerator::new(repo.clone(), SchedulingConfig::default(), seed);
        let outcome = generator.generate(&clinic_request());
        assert!(outcome.success, "errors: {:?}", outcome.errors);

        let sessions = stored(&repo);
        assert_eq!(sessions.len(), outcome.sessions_created);

        let mut child_day: HashMap<(u32, NaiveDate), usize> = HashMap::new();
        let mut therapist_day: HashMap<(u32, NaiveDate), usize> = HashMap::new();

        for (i, s) in sessions.iter().enumerate() {
            *child_day.entry((s.child_id, s.date)).or_default() += 1;
            *therapist_day.entry((s.therapist_id, s.date)).or_default() += 1;

            // no overlap for the same therapist or the same child
            for other in &sessions[i + 1..] {
                if s.date == other.date
                    && (s.therapist_id == other.therapist_id || s.child_id == other.child_id)
                {
                    assert!(!s.window().overlaps(&other.window()), "{s:?} vs {other:?}");
                }
            }

            // inside both parties' availability on that day
            let day = DayOfWeek::ALL
                .into_iter()
                .find(|d| week().date_for(*d) == s.date)
                .unwrap();
            let within = |windows: &[AvailabilityWindow]| {
                windows
                    .iter()
                    .filter(|w| w.day() == Some(day))
                    .any(|w| w.window().covers(&TimeWindow::new(s.start_time, s.end_time)))
            };
            let child = children.iter().find(|c| c.id == s.child_id).unwrap();
            let therapist = therapists.iter().find(|t| t.id == s.therapist_id).unwrap();
            assert!(within(child.availability.as_slice()));
            assert!(within(therapist.availability.as_slice()));
            assert_eq!(Some(s.department_id), therapist.department_id);
        }

        assert!(child_day.values().all(|&n| n <= 5));
        assert!(therapist_day.values().all(|&n| n <= 8));
    }
}

#[test]
fn test_verifier_only_double_booking_fails_batch() {
    let repo = InMemoryRepository::new();
    for id in [1, 2] {
        repo.add_child(
            Child::new(id, format!("C{id}"))
                .with_need(DepartmentNeed::new(SPEECH, "Speech", 1))
                .with_availability(window(DayOfWeek::Monday, 9, 10)),
        );
    }
    repo.add_therapist(
        Therapist::new(5, "Dr. Lee", SPEECH, "Speech")
            .with_availability(window(DayOfWeek::Monday, 9, 10)),
    );

    let mut config = SchedulingConfig::default();
    config.allocation.occupancy = OccupancyPolicy::VerifierOnly;
    let generator = TimetableGenerator::new(repo.clone(), config, 42);
    let outcome = generator.generate(&GenerationRequest::new(monday(), vec![1, 2], vec![5]));

    assert!(!outcome.success);
    assert_eq!(outcome.sessions_created, 0);
    assert_eq!(outcome.failed_at, Some(GenerationStage::Allocating));
    assert_eq!(
        outcome.errors,
        vec![
            "Therapist 5 has overlapping sessions on 2024-01-01: 09:00-10:00 and 09:00-10:00"
                .to_string()
        ]
    );
    assert_eq!(repo.session_count(), 0);
}

#[test]
fn test_rejected_write_creates_nothing() {
    let repo = scenario_one_repo();
    repo.fail_next_write("connection reset");
    let generator = TimetableGenerator::new(repo.clone(), long_window_config(), 42);

    let outcome = generator.generate(&GenerationRequest::new(monday(), vec![1], vec![1, 2]));

    assert!(!outcome.success);
    assert_eq!(outcome.sessions_created, 0);
    assert_eq!(
        outcome.errors,
        vec!["Database error during bulk creation: connection reset".to_string()]
    );
    assert_eq!(outcome.failed_at, Some(GenerationStage::Verified));
    assert_eq!(repo.session_count(), 0);
}

#[test]
fn test_incomplete_records_reported_together() {
    let repo = scenario_one_repo();
    repo.add_child(Child::new(2, "Ben"));
    repo.add_therapist(Therapist::unassigned(3, ""));
    let generator = TimetableGenerator::new(repo.clone(), long_window_config(), 42);

    let outcome =
        generator.generate(&GenerationRequest::new(monday(), vec![1, 2], vec![1, 2, 3]));

    assert!(!outcome.success);
    assert_eq!(outcome.failed_at, Some(GenerationStage::Validated));
    assert!(outcome.errors.contains(&"Ben: No departments assigned".to_string()));
    assert!(outcome
        .errors
        .contains(&"Ben: No availability schedule set".to_string()));
    assert!(outcome
        .errors
        .contains(&"Therapist ID 3: No department assigned".to_string()));
    assert_eq!(repo.session_count(), 0);
}

#[test]
fn test_generation_through_cache() {
    let repo = scenario_one_repo();
    let cached = CachedRepository::new(repo.clone(), InMemoryCache::new());
    // warm the timetable entry before generating
    assert_eq!(cached.week_overview(week()).unwrap().total_sessions, 0);

    let generator = TimetableGenerator::new(cached, long_window_config(), 42);
    let outcome = generator.generate(&GenerationRequest::new(monday(), vec![1], vec![1, 2]));

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.timetable_data.unwrap().total_sessions, 2);
    assert_eq!(
        generator.repository().week_overview(week()).unwrap().total_sessions,
        2
    );
}

#[test]
fn test_switched_off_window_not_booked_from_cached_list() {
    let repo = InMemoryRepository::new();
    repo.add_child(
        Child::new(1, "Ada")
            .with_need(DepartmentNeed::new(SPEECH, "Speech", 1))
            .with_availability(window(DayOfWeek::Monday, 9, 11)),
    );
    repo.add_therapist(
        Therapist::new(5, "Dr. Lee", SPEECH, "Speech")
            .with_availability(window(DayOfWeek::Monday, 9, 10)),
    );
    let cached = CachedRepository::new(repo.clone(), InMemoryCache::new());
    assert_eq!(cached.active_therapists(&[5]).unwrap()[0].availability.len(), 1);

    // changed behind the decorator, so the cached list is now stale
    repo.set_window_available(5, 0, false).unwrap();

    let generator = TimetableGenerator::new(cached, SchedulingConfig::default(), 42);
    let outcome = generator.generate(&GenerationRequest::new(monday(), vec![1], vec![5]));

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.sessions_created, 0);
    assert!(outcome
        .warnings
        .contains(&"Could not allocate session for Ada in Speech".to_string()));
    assert_eq!(repo.session_count(), 0);
}
