use super::*;
use std::time::Duration;

fn hand_config() -> ControllerConfigBuilder {
    ControllerConfig::builder("hand").confidence_threshold(0.9)
}

fn obs(label: &str, confidence: f64, at: Instant) -> Observation {
    Observation::new(label, confidence, at)
}

/// Deterministic pseudo-random stream so property checks are reproducible
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn random_run(controller: &mut TriggerController, seed: u64, start: Instant) -> Vec<TransitionEvent> {
    let mut rng = Lcg(seed);
    let mut now = start;
    let mut events = Vec::new();

    for _ in 0..2000 {
        now += Duration::from_millis(10 + (rng.next_f64() * 120.0) as u64);
        let roll = rng.next_f64();
        let event = if roll < 0.15 {
            controller.tick(now)
        } else {
            let label = if rng.next_f64() < 0.6 { "hand" } else { "not_hand" };
            controller.observe(obs(label, 0.5 + rng.next_f64() * 0.5, now))
        };
        events.extend(event);
    }

    events
}

#[test]
fn test_single_detection_triggers() {
    let t0 = Instant::now();
    let config = hand_config()
        .debounce_frames(1)
        .cooldown(Duration::from_millis(1500))
        .build()
        .unwrap();
    let mut controller = TriggerController::starting_at(config, t0);

    let event = controller.observe(obs("hand", 0.95, t0)).unwrap();
    assert_eq!(event.from, OperatingState::Idle);
    assert_eq!(event.to, OperatingState::Triggered);
    assert_eq!(event.at, t0);
    assert!(matches!(event.cause, TransitionCause::Observation(_)));
}

#[test]
fn test_repeat_detection_within_cooldown_is_ignored() {
    let t0 = Instant::now();
    let config = hand_config()
        .debounce_frames(1)
        .cooldown(Duration::from_millis(1500))
        .build()
        .unwrap();
    let mut controller = TriggerController::starting_at(config, t0);

    assert!(controller.observe(obs("hand", 0.95, t0)).is_some());
    assert!(controller
        .observe(obs("hand", 0.95, t0 + Duration::from_millis(200)))
        .is_none());
    assert_eq!(controller.current_state(), OperatingState::Triggered);
}

#[test]
fn test_streak_broken_before_window() {
    let t0 = Instant::now();
    let config = hand_config().debounce_frames(3).build().unwrap();
    let mut controller = TriggerController::starting_at(config, t0);

    assert!(controller.observe(obs("hand", 0.95, t0)).is_none());
    assert!(controller
        .observe(obs("hand", 0.95, t0 + Duration::from_millis(30)))
        .is_none());
    assert!(controller
        .observe(obs("not_hand", 0.1, t0 + Duration::from_millis(60)))
        .is_none());
    assert_eq!(controller.current_state(), OperatingState::Idle);
}

#[test]
fn test_auto_release_on_tick_without_observations() {
    let t0 = Instant::now();
    let config = hand_config()
        .release_on_condition(false)
        .auto_release(Duration::from_secs(2))
        .build()
        .unwrap();
    let mut controller = TriggerController::starting_at(config, t0);

    controller.observe(obs("hand", 0.95, t0)).unwrap();
    assert!(controller.tick(t0 + Duration::from_millis(1900)).is_none());

    let event = controller.tick(t0 + Duration::from_millis(2100)).unwrap();
    assert_eq!(event.from, OperatingState::Triggered);
    assert_eq!(event.to, OperatingState::Idle);
    assert_eq!(event.cause, TransitionCause::Timer);
}

#[test]
fn test_debounce_requires_full_streak() {
    for n in 1..=6u32 {
        let t0 = Instant::now();
        let config = hand_config().debounce_frames(n).build().unwrap();
        let mut controller = TriggerController::starting_at(config, t0);

        let mut at = t0;
        for _ in 0..n - 1 {
            at += Duration::from_millis(33);
            assert!(controller.observe(obs("hand", 0.97, at)).is_none());
        }
        at += Duration::from_millis(33);
        assert!(controller.observe(obs("hand", 0.2, at)).is_none());
        assert_eq!(controller.current_state(), OperatingState::Idle);

        for i in 0..n {
            at += Duration::from_millis(33);
            let event = controller.observe(obs("hand", 0.97, at));
            assert_eq!(event.is_some(), i == n - 1, "window {} frame {}", n, i);
        }
    }
}

#[test]
fn test_streak_resets_after_transition() {
    let t0 = Instant::now();
    let config = hand_config().debounce_frames(2).build().unwrap();
    let mut controller = TriggerController::starting_at(config, t0);

    controller.observe(obs("hand", 0.95, t0));
    controller
        .observe(obs("hand", 0.95, t0 + Duration::from_millis(10)))
        .unwrap();

    // A continued hand after the trigger is not release evidence
    assert!(controller
        .observe(obs("hand", 0.95, t0 + Duration::from_millis(20)))
        .is_none());
    assert_eq!(controller.current_state(), OperatingState::Triggered);

    let release = controller
        .observe(obs("not_hand", 0.9, t0 + Duration::from_millis(30)))
        .unwrap();
    assert_eq!(release.to, OperatingState::Idle);

    // Evidence from before the release does not carry over
    assert!(controller
        .observe(obs("hand", 0.95, t0 + Duration::from_millis(40)))
        .is_none());
    assert!(controller
        .observe(obs("hand", 0.95, t0 + Duration::from_millis(50)))
        .is_some());
}

#[test]
fn test_min_dwell_expiry_fires_on_tick() {
    let t0 = Instant::now();
    let config = hand_config()
        .min_dwell(Duration::from_secs(1))
        .build()
        .unwrap();
    let mut controller = TriggerController::starting_at(config, t0);

    controller.observe(obs("hand", 0.95, t0)).unwrap();
    assert!(controller
        .observe(obs("not_hand", 0.8, t0 + Duration::from_millis(300)))
        .is_none());
    assert!(controller.tick(t0 + Duration::from_millis(900)).is_none());

    let event = controller.tick(t0 + Duration::from_millis(1000)).unwrap();
    assert_eq!(event.to, OperatingState::Idle);
}

#[test]
fn test_transitions_alternate_and_respect_cooldown() {
    let cooldown = Duration::from_millis(700);
    for seed in [1u64, 7, 42, 1337, 9001] {
        let t0 = Instant::now();
        let config = hand_config()
            .debounce_frames(2)
            .cooldown(cooldown)
            .min_dwell(Duration::from_millis(300))
            .auto_release(Duration::from_secs(2))
            .build()
            .unwrap();
        let mut controller = TriggerController::starting_at(config, t0);
        let events = random_run(&mut controller, seed, t0);

        assert!(!events.is_empty(), "seed {} produced no transitions", seed);
        assert_eq!(events[0].from, OperatingState::Idle);
        for event in &events {
            assert_ne!(event.from, event.to);
        }
        for pair in events.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
            assert_ne!(pair[0].to, pair[1].to);
            assert!(pair[1].at.duration_since(pair[0].at) >= cooldown);
        }
    }
}

#[test]
fn test_observation_stamped_before_tick_release_keeps_order() {
    let t0 = Instant::now();
    let config = hand_config()
        .cooldown(Duration::ZERO)
        .release_on_condition(false)
        .auto_release(Duration::from_secs(2))
        .build()
        .unwrap();
    let mut controller = TriggerController::starting_at(config, t0);

    controller.observe(obs("hand", 0.95, t0)).unwrap();
    let release = controller.tick(t0 + Duration::from_secs(2)).unwrap();
    assert_eq!(release.to, OperatingState::Idle);

    // Queued before the tick ran, dequeued after it
    let entry = controller
        .observe(obs("hand", 0.95, t0 + Duration::from_millis(1990)))
        .unwrap();
    assert_eq!(entry.to, OperatingState::Triggered);
    assert!(entry.at >= release.at);
    assert_eq!(controller.snapshot().entered_at, release.at);
}

#[test]
fn test_cooldown_holds_when_observations_lag_ticks() {
    let cooldown = Duration::from_millis(400);
    for seed in [3u64, 11, 99] {
        let t0 = Instant::now();
        let config = hand_config()
            .cooldown(cooldown)
            .release_on_condition(false)
            .auto_release(Duration::from_millis(500))
            .build()
            .unwrap();
        let mut controller = TriggerController::starting_at(config, t0);
        let mut rng = Lcg(seed);
        let mut clock = t0;
        let mut events = Vec::new();

        for _ in 0..1000 {
            clock += Duration::from_millis(10 + (rng.next_f64() * 60.0) as u64);
            events.extend(controller.tick(clock));
            // Observations carry a receive time up to 200ms older than the tick
            let lag = Duration::from_millis((rng.next_f64() * 200.0) as u64);
            let stamped = clock.checked_sub(lag).unwrap_or(t0).max(t0);
            events.extend(controller.observe(obs("hand", 0.99, stamped)));
        }

        assert!(events.len() > 2, "seed {} produced too few transitions", seed);
        for pair in events.windows(2) {
            assert!(pair[1].at >= pair[0].at);
            assert!(pair[1].at.duration_since(pair[0].at) >= cooldown);
        }
    }
}

#[test]
fn test_condition_release_needs_a_negative_report() {
    let t0 = Instant::now();
    let config = hand_config()
        .cooldown(Duration::ZERO)
        .release_on_condition(true)
        .build()
        .unwrap();
    let mut controller = TriggerController::starting_at(config, t0);

    controller.observe(obs("hand", 0.95, t0)).unwrap();

    // Positive reports and silence keep the triggered state
    for ms in [100u64, 200, 300] {
        let at = t0 + Duration::from_millis(ms);
        assert!(controller.observe(obs("hand", 0.97, at)).is_none());
    }
    assert!(controller.tick(t0 + Duration::from_secs(60)).is_none());
    assert_eq!(controller.current_state(), OperatingState::Triggered);

    let release = controller
        .observe(obs("none", 0.0, t0 + Duration::from_secs(61)))
        .unwrap();
    assert_eq!(release.to, OperatingState::Idle);
}

#[test]
fn test_auto_release_fires_within_one_tick() {
    let tick = Duration::from_millis(50);
    let auto_release = Duration::from_millis(2000);
    let t0 = Instant::now();
    let config = hand_config()
        .release_on_condition(false)
        .auto_release(auto_release)
        .tick_interval(tick)
        .build()
        .unwrap();
    let mut controller = TriggerController::starting_at(config, t0);

    let entered = t0 + Duration::from_millis(17);
    controller.observe(obs("hand", 0.99, entered)).unwrap();

    let mut now = t0;
    let released_at = loop {
        now += tick;
        if let Some(event) = controller.tick(now) {
            break event.at;
        }
    };

    let elapsed = released_at.duration_since(entered);
    assert!(elapsed >= auto_release);
    assert!(elapsed < auto_release + tick);
}

#[test]
fn test_snapshot_tracks_transitions() {
    let t0 = Instant::now();
    let config = hand_config().build().unwrap();
    let mut controller = TriggerController::starting_at(config, t0);
    let handle = controller.status_handle();

    let initial = handle.snapshot();
    assert_eq!(initial.current_state, OperatingState::Idle);
    assert!(initial.last_transition.is_none());

    let at = t0 + Duration::from_millis(250);
    controller.observe(obs("hand", 0.95, at)).unwrap();

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.current_state, OperatingState::Triggered);
    assert_eq!(snapshot.time_in_state(at + Duration::from_secs(1)), Duration::from_secs(1));
    let last = snapshot.last_transition.unwrap();
    assert_eq!(last.from, OperatingState::Idle);
    assert_eq!(last.at, at);
    assert_eq!(controller.snapshot().current_state, OperatingState::Triggered);
}

#[test]
fn test_status_report_serializes() {
    let t0 = Instant::now();
    let mut controller = TriggerController::starting_at(hand_config().build().unwrap(), t0);
    controller.observe(obs("hand", 0.95, t0)).unwrap();

    let report = controller.snapshot().report(t0 + Duration::from_millis(500));
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["current_state"], "triggered");
    assert_eq!(json["time_in_state_secs"], 0.5);
    assert_eq!(json["last_transition"]["from"], "idle");
}
