use chrono::{DateTime, TimeZone, Utc};
use floorwatch::model::event::{Event, EventType, NewEvent};
use floorwatch::reconstruct::{Durations, reconstruct, sort_timeline};
use uuid::Uuid;

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, hour, minute, 0).unwrap()
}

fn event(event_type: EventType, hour: u32, minute: u32) -> Event {
    NewEvent::new(at(hour, minute), "W1", "S1", event_type).into_event(Uuid::new_v4(), Utc::now())
}

fn counter(count: i64, hour: u32, minute: u32) -> Event {
    NewEvent::new(at(hour, minute), "W1", "S1", EventType::ProductCount)
        .count(count)
        .into_event(Uuid::new_v4(), Utc::now())
}

fn shift() -> Vec<Event> {
    vec![
        event(EventType::Working, 8, 0),
        counter(4, 8, 30),
        event(EventType::Idle, 9, 30),
        event(EventType::Working, 9, 45),
        counter(6, 10, 15),
        event(EventType::Absent, 11, 45),
        event(EventType::Working, 12, 15),
        event(EventType::Idle, 13, 0),
    ]
}

#[test]
fn scenario_working_idle_working() {
    let events = vec![
        event(EventType::Working, 8, 0),
        event(EventType::Idle, 9, 30),
        event(EventType::Working, 9, 45),
        event(EventType::Absent, 11, 45),
    ];

    let d = reconstruct(&events);
    assert_eq!(d.working_seconds, 12_600.0);
    assert_eq!(d.idle_seconds, 900.0);
    assert_eq!(d.absent_seconds, 0.0);
    assert_eq!(d.total_units, 0);
}

#[test]
fn lone_counter_yields_units_and_no_time() {
    let events = vec![counter(5, 10, 0)];

    let d = reconstruct(&events);
    assert_eq!(
        d,
        Durations {
            total_units: 5,
            ..Durations::default()
        }
    );
}

#[test]
fn result_does_not_depend_on_input_order() {
    let events = shift();
    let expected = reconstruct(&events);

    let mut reversed = events.clone();
    reversed.reverse();
    assert_eq!(reconstruct(&reversed), expected);

    for k in 1..events.len() {
        let mut rotated = events.clone();
        rotated.rotate_left(k);
        assert_eq!(reconstruct(&rotated), expected, "rotation by {k}");
    }

    let mut interleaved: Vec<Event> = events.iter().step_by(2).cloned().collect();
    interleaved.extend(events.iter().skip(1).step_by(2).cloned());
    assert_eq!(reconstruct(&interleaved), expected);
}

#[test]
fn counters_add_units_and_their_gaps_go_uncredited() {
    let d = reconstruct(&shift());
    assert_eq!(d.total_units, 10);
    // Working 08:00-08:30, 09:45-10:15, 12:15-13:00. The time after each
    // counter belongs to no state.
    assert_eq!(d.working_seconds, (30.0 + 30.0 + 45.0) * 60.0);
    assert_eq!(d.idle_seconds, 15.0 * 60.0);
    assert_eq!(d.absent_seconds, 30.0 * 60.0);
}

#[test]
fn durations_are_never_negative() {
    let d = reconstruct(&shift());
    assert!(d.working_seconds >= 0.0);
    assert!(d.idle_seconds >= 0.0);
    assert!(d.absent_seconds >= 0.0);
    assert!(d.total_units >= 0);
}

#[test]
fn last_state_contributes_no_time() {
    let mut events = shift();
    let base = reconstruct(&events);

    // Whatever the final event says, nothing follows it.
    events.push(event(EventType::Working, 17, 0));
    let extended = reconstruct(&events);
    assert_eq!(extended.idle_seconds, base.idle_seconds + 4.0 * 3600.0);
    assert_eq!(extended.working_seconds, base.working_seconds);
}

#[test]
fn state_time_never_exceeds_span() {
    let events = shift();
    let d = reconstruct(&events);
    let timeline = sort_timeline(&events);
    let span = (timeline[timeline.len() - 1].timestamp - timeline[0].timestamp).num_seconds() as f64;
    assert!(d.working_seconds + d.idle_seconds + d.absent_seconds <= span);

    let states: Vec<Event> = events
        .into_iter()
        .filter(|e| e.event_type != EventType::ProductCount)
        .collect();
    let d = reconstruct(&states);
    assert_eq!(d.working_seconds + d.idle_seconds + d.absent_seconds, span);
}

#[test]
fn simultaneous_events_sort_deterministically() {
    let a = event(EventType::Idle, 9, 0);
    let b = event(EventType::Working, 9, 0);

    let forward = sort_timeline([&a, &b]);
    let backward = sort_timeline([&b, &a]);
    let forward: Vec<Uuid> = forward.iter().map(|e| e.id).collect();
    let backward: Vec<Uuid> = backward.iter().map(|e| e.id).collect();
    assert_eq!(forward, backward);
}

#[test]
fn huge_counter_totals_saturate() {
    let events = vec![counter(i64::MAX, 9, 0), counter(1, 10, 0)];
    let d = reconstruct(&events);
    assert_eq!(d.total_units, i64::MAX);
    assert_eq!(d.working_seconds, 0.0);
}
