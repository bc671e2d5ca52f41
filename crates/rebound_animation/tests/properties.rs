//! End-to-end behaviour of values, controllers and the frame loop

use futures::FutureExt;
use rebound_animation::{
    Animatable, AnimatedValue, AnimationConfig, AnimationController, ControllerProps, Decay,
    Easing, FrameAnimation, FrameLoop, StartOptions,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const FRAME_MS: f64 = 16.0;

fn number(value: &AnimatedValue) -> f64 {
    value.get().as_number().unwrap()
}

#[test]
fn test_start_at_goal_is_noop_without_registration() {
    let frame_loop = FrameLoop::new();
    let wakes = Rc::new(Cell::new(0));
    {
        let wakes = wakes.clone();
        frame_loop.set_wake_callback(move || wakes.set(wakes.get() + 1));
    }

    for config in [
        AnimationConfig::default(),
        AnimationConfig::timed(300.0, Easing::EaseInOut),
        AnimationConfig::molasses().with_clamp(true),
    ] {
        let value = AnimatedValue::new(&frame_loop.handle(), 42.0, config);
        let done = value.start(StartOptions::to(42.0)).unwrap();
        let result = pollster::block_on(done).unwrap();

        assert!(result.finished);
        assert!(result.noop);
        assert!(frame_loop.is_idle());
    }
    assert_eq!(wakes.get(), 0);
}

#[test]
fn test_zero_tension_completes_in_one_tick() {
    for dt in [0.5, 16.0, 1000.0] {
        let frame_loop = FrameLoop::new();
        let value = AnimatedValue::new(
            &frame_loop.handle(),
            0.0,
            AnimationConfig::default().with_tension(0.0),
        );
        let mut done = value.start(StartOptions::to(100.0)).unwrap();

        assert!(!frame_loop.advance(dt));
        assert!(!value.is_animating());
        assert!((&mut done).now_or_never().unwrap().unwrap().finished);
    }
}

#[test]
fn test_spring_settles_with_bounded_overshoot() {
    let frame_loop = FrameLoop::new();
    let value = AnimatedValue::new(
        &frame_loop.handle(),
        0.0,
        AnimationConfig::new(170.0, 26.0, 1.0),
    );
    let done = value.start(StartOptions::to(100.0)).unwrap();

    let mut ticks = 0;
    let mut peak: f64 = 0.0;
    while frame_loop.advance(FRAME_MS) {
        peak = peak.max(number(&value));
        ticks += 1;
        assert!(ticks < 200, "spring did not settle");
    }

    // Damping ratio ~1, so any overshoot is tiny
    assert!(peak < 101.0, "overshoot too large: {peak}");
    assert!(!value.is_animating());
    assert_eq!(number(&value), 100.0);

    let result = done.now_or_never().unwrap().unwrap();
    assert!(result.finished && !result.cancelled && !result.noop);
}

#[test]
fn test_spring_approaches_goal() {
    let frame_loop = FrameLoop::new();
    let value = AnimatedValue::new(&frame_loop.handle(), 0.0, AnimationConfig::default());
    let _done = value.start(StartOptions::to(100.0)).unwrap();

    let mut distance = 100.0;
    for _ in 0..20 {
        frame_loop.advance(FRAME_MS);
        let next = (100.0 - number(&value)).abs();
        assert!(next < distance);
        distance = next;
    }
}

#[test]
fn test_duration_linear_halves() {
    let frame_loop = FrameLoop::new();
    let value = AnimatedValue::new(
        &frame_loop.handle(),
        20.0,
        AnimationConfig::timed(1000.0, Easing::Linear),
    );
    let mut done = value.start(StartOptions::to(120.0)).unwrap();

    assert!(frame_loop.advance(500.0));
    assert!((number(&value) - 70.0).abs() < 1e-9);
    assert!((&mut done).now_or_never().is_none());

    assert!(!frame_loop.advance(500.0));
    assert_eq!(number(&value), 120.0);
    assert!(done.now_or_never().unwrap().unwrap().finished);
}

#[test]
fn test_decay_velocity_falls_until_done() {
    let frame_loop = FrameLoop::new();
    let value = AnimatedValue::new(
        &frame_loop.handle(),
        0.0,
        AnimationConfig::default()
            .with_decay(Decay::Rate(0.998))
            .with_velocity(0.5),
    );
    // Decay ignores the goal, so starting "to" the current value still moves
    let done = value.start(StartOptions::default()).unwrap();

    let mut speed = f64::INFINITY;
    let mut ticks = 0;
    while frame_loop.advance(FRAME_MS) {
        let next = value.velocity().as_number().unwrap().abs();
        assert!(next < speed);
        speed = next;
        ticks += 1;
        assert!(ticks < 1000, "decay did not settle");
    }

    assert!(number(&value) > 200.0);
    assert!(done.now_or_never().unwrap().unwrap().finished);
}

#[test]
fn test_pause_freezes_and_resume_continues() {
    let frame_loop = FrameLoop::new();
    let value = AnimatedValue::new(
        &frame_loop.handle(),
        0.0,
        AnimationConfig::timed(100.0, Easing::Linear),
    );
    let _done = value.start(StartOptions::to(10.0)).unwrap();

    frame_loop.advance(30.0);
    value.pause();
    let frozen = number(&value);
    for _ in 0..5 {
        frame_loop.advance(FRAME_MS);
        assert_eq!(number(&value), frozen);
    }
    assert!(value.is_paused());
    assert!(value.is_animating());

    value.resume();
    frame_loop.advance(20.0);
    assert!((number(&value) - 5.0).abs() < 1e-9);
}

#[test]
fn test_controller_waits_for_every_key() {
    let frame_loop = FrameLoop::new();
    let controller = AnimationController::builder(&frame_loop.handle())
        .track("a", 0.0)
        .track("b", 0.0)
        .config(AnimationConfig::default())
        .build()
        .unwrap();

    let mut done = controller
        .start(ControllerProps::new().to("a", 10.0).to("b", 20.0))
        .unwrap();
    frame_loop.advance(FRAME_MS);
    assert!((&mut done).now_or_never().is_none());

    controller.stop_keys(["a"], true);
    assert!((&mut done).now_or_never().is_none());
    assert!(controller.is_animating());

    while frame_loop.advance(FRAME_MS) {}
    let result = done.now_or_never().unwrap().unwrap();
    assert!(result.cancelled);
    assert!(!result.finished);
    assert_eq!(result.value["b"], Animatable::Number(20.0));
}

#[test]
fn test_controller_finishes_together() {
    let frame_loop = FrameLoop::new();
    let controller = AnimationController::builder(&frame_loop.handle())
        .track("opacity", 0.0)
        .track("offset", [0.0, 0.0])
        .build()
        .unwrap();

    let done = controller
        .start(
            ControllerProps::new()
                .to("opacity", 1.0)
                .to("offset", [0.0, -12.0])
                .config(AnimationConfig::stiff()),
        )
        .unwrap();
    controller.finish();

    let result = pollster::block_on(done).unwrap();
    assert!(result.finished && !result.cancelled);
    assert_eq!(result.value["opacity"], Animatable::Number(1.0));
    assert_eq!(result.value["offset"], Animatable::from([0.0, -12.0]));
    assert!(!controller.is_animating());
}

#[test]
fn test_set_then_get_round_trips() {
    let frame_loop = FrameLoop::new();
    let value = AnimatedValue::new(
        &frame_loop.handle(),
        Animatable::record([("x", 0.0), ("y", 0.0)]),
        AnimationConfig::default(),
    );
    let _done = value
        .start(StartOptions::to(Animatable::record([("x", 5.0), ("y", 5.0)])))
        .unwrap();
    frame_loop.advance(FRAME_MS);

    let target = Animatable::record([("x", 0.1), ("y", -3.25)]);
    value.set(target.clone()).unwrap();
    assert_eq!(value.get(), target);
    assert!(!value.is_animating());
}

/// Records its priority each time it advances
struct Recorder {
    priority: i32,
    ran: Cell<bool>,
    order: Rc<RefCell<Vec<i32>>>,
}

impl FrameAnimation for Recorder {
    fn is_idle(&self) -> bool {
        self.ran.get()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn advance(&self, _dt: f64) {
        self.order.borrow_mut().push(self.priority);
        self.ran.set(true);
    }
}

#[test]
fn test_frame_loop_runs_by_priority() {
    let frame_loop = FrameLoop::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    for priority in [2, 0, 1] {
        frame_loop.start(Rc::new(Recorder {
            priority,
            ran: Cell::new(false),
            order: order.clone(),
        }));
    }

    frame_loop.advance(FRAME_MS);
    assert_eq!(*order.borrow(), vec![0, 1, 2]);
}

#[test]
fn test_value_priority_orders_observers() {
    let frame_loop = FrameLoop::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    let config = AnimationConfig::timed(100.0, Easing::Linear);

    let late = AnimatedValue::new(&frame_loop.handle(), 0.0, config.clone());
    let early = AnimatedValue::new(&frame_loop.handle(), 0.0, config);
    let _late_sub = {
        let order = order.clone();
        late.on_change(move |_| order.borrow_mut().push("late"))
    };
    let _early_sub = {
        let order = order.clone();
        early.on_change(move |_| order.borrow_mut().push("early"))
    };

    let _a = late.start(StartOptions::to(1.0)).unwrap();
    let _b = early.start(StartOptions::to(1.0)).unwrap();
    late.set_priority(1);

    frame_loop.advance(FRAME_MS);
    assert_eq!(*order.borrow(), vec!["early", "late"]);
}

#[test]
fn test_observer_can_restart_value() {
    let frame_loop = FrameLoop::new();
    let value = AnimatedValue::new(
        &frame_loop.handle(),
        0.0,
        AnimationConfig::timed(32.0, Easing::Linear),
    );
    let restarted = Rc::new(Cell::new(false));
    let _sub = {
        let value = value.clone();
        let restarted = restarted.clone();
        value.clone().on_change(move |v| {
            if v.as_number() == Some(10.0) && !restarted.get() {
                restarted.set(true);
                let _ = value.start(StartOptions::to(0.0)).unwrap();
            }
        })
    };

    let _done = value.start(StartOptions::to(10.0)).unwrap();
    while frame_loop.advance(FRAME_MS) {}

    assert!(restarted.get());
    assert_eq!(number(&value), 0.0);
}

#[test]
fn test_retarget_to_current_value_holds_position() {
    let frame_loop = FrameLoop::new();
    let value = AnimatedValue::new(
        &frame_loop.handle(),
        0.0,
        AnimationConfig::timed(1000.0, Easing::Linear),
    );
    let first = value.start(StartOptions::to(100.0)).unwrap();
    frame_loop.advance(500.0);
    assert!((number(&value) - 50.0).abs() < 1e-9);

    let mut second = value.start(StartOptions::to(50.0)).unwrap();
    assert!((&mut second).now_or_never().is_none());
    assert!(value.is_animating());
    assert_eq!(value.from(), Animatable::Number(50.0));

    frame_loop.advance(100.0);
    assert!((number(&value) - 50.0).abs() < 1e-9);

    while frame_loop.advance(FRAME_MS) {}
    for done in [first, second] {
        let result = done.now_or_never().unwrap().unwrap();
        assert!(result.finished && !result.noop);
        assert_eq!(result.value, Animatable::Number(50.0));
    }
}

#[test]
fn test_retarget_keeps_spring_velocity() {
    let frame_loop = FrameLoop::new();
    let value = AnimatedValue::new(&frame_loop.handle(), 0.0, AnimationConfig::default());
    let _first = value.start(StartOptions::to(100.0)).unwrap();
    for _ in 0..5 {
        frame_loop.advance(FRAME_MS);
    }

    let before = value.velocity().as_number().unwrap();
    assert!(before > 0.0);

    let _second = value.start(StartOptions::to(200.0)).unwrap();
    assert_eq!(value.velocity().as_number(), Some(before));

    let position = number(&value);
    frame_loop.advance(FRAME_MS);
    assert!(number(&value) > position);
    assert!(value.velocity().as_number().unwrap() > 0.0);
}

#[test]
fn test_resting_start_uses_configured_velocity() {
    let frame_loop = FrameLoop::new();
    let value = AnimatedValue::new(
        &frame_loop.handle(),
        0.0,
        AnimationConfig::default().with_velocity(0.5),
    );
    let _done = value.start(StartOptions::to(100.0)).unwrap();
    assert_eq!(value.velocity().as_number(), Some(0.5));
}

#[test]
fn test_controller_snapshot_taken_when_last_key_settles() {
    let frame_loop = FrameLoop::new();
    let controller = AnimationController::builder(&frame_loop.handle())
        .track("a", 0.0)
        .config(AnimationConfig::timed(100.0, Easing::Linear))
        .build()
        .unwrap();

    let first = controller.start(ControllerProps::new().to("a", 10.0)).unwrap();
    while frame_loop.advance(FRAME_MS) {}

    let _second = controller.start(ControllerProps::new().to("a", 20.0)).unwrap();
    frame_loop.advance(50.0);
    assert_eq!(controller.get("a").unwrap(), Animatable::Number(15.0));

    let result = pollster::block_on(first).unwrap();
    assert!(result.finished);
    assert_eq!(result.value["a"], Animatable::Number(10.0));
}

#[test]
fn test_bounce_settles_on_goal() {
    let frame_loop = FrameLoop::new();
    let value = AnimatedValue::new(
        &frame_loop.handle(),
        0.0,
        AnimationConfig::stiff().with_bounce(0.5),
    );
    let done = value.start(StartOptions::to(100.0)).unwrap();

    let mut previous = 0.0;
    let mut fell_back = false;
    let mut ticks = 0;
    while frame_loop.advance(FRAME_MS) {
        let current = number(&value);
        // Reflected at the goal, allowing one sub-step of travel past it
        assert!(current < 101.0, "passed the goal: {current}");
        fell_back |= current < previous;
        previous = current;
        ticks += 1;
        assert!(ticks < 500, "bounce did not settle");
    }

    assert!(fell_back);
    assert_eq!(number(&value), 100.0);
    assert!(done.now_or_never().unwrap().unwrap().finished);
}
