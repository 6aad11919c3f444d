// Trigrs Trigger Detection Tests
//
// Click types, parallel and sequence triggers, and how overlapping
// triggers resolve, driven through the engine on a manual clock.

mod common;

use common::*;
use trigrs_core::{
    Action, ClickType, InputEventAction, Key, KeyEvent, KeyMap, Settings, Trigger, TriggerKey,
};

fn short(key: Key) -> TriggerKey {
    TriggerKey::key(key, ClickType::ShortPress)
}

fn long(key: Key) -> TriggerKey {
    TriggerKey::key(key, ClickType::LongPress)
}

fn double(key: Key) -> TriggerKey {
    TriggerKey::key(key, ClickType::DoublePress)
}

fn key_map(uid: &str, trigger: Trigger, action: Key) -> KeyMap {
    KeyMap::new(uid, trigger, vec![Action::key(action)])
}

// =========================================================================
// Click types
// =========================================================================

#[test]
fn test_short_press_fires_on_key_down() {
    let mut engine = engine(&[key_map("a", Trigger::single(short(Key::A)), Key::B)]);

    assert!(down(&mut engine, Key::A));
    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::B, InputEventAction::DownUp)]
    );

    assert!(up(&mut engine, Key::A));
    assert_eq!(engine.host().performed.len(), 1);
    assert!(engine.host().resynthesized.is_empty());
}

#[test]
fn test_unmapped_keys_pass_through() {
    let mut engine = engine(&[key_map("a", Trigger::single(short(Key::A)), Key::B)]);

    assert_eq!(tap(&mut engine, Key::C, ms(30)), (false, false));
    assert!(engine.host().performed.is_empty());
}

#[test]
fn test_non_consuming_key_still_fires() {
    let trigger = Trigger::single(short(Key::A).with_consume(false));
    let mut engine = engine(&[key_map("a", trigger, Key::B)]);

    assert_eq!(tap(&mut engine, Key::A, ms(30)), (false, false));
    assert_eq!(engine.host().performed.len(), 1);
}

#[test]
fn test_long_press_fires_after_delay() {
    let mut engine = engine(&[key_map("long", Trigger::single(long(Key::A)), Key::B)]);

    assert!(down(&mut engine, Key::A));
    engine.advance_by(ms(499));
    assert!(engine.host().performed.is_empty());

    engine.advance_by(ms(101));
    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::B, InputEventAction::DownUp)]
    );

    assert!(up(&mut engine, Key::A));
    assert_eq!(engine.host().performed.len(), 1);
    assert!(engine.host().resynthesized.is_empty());
}

#[test]
fn test_long_press_released_early_replays_key() {
    let mut engine = engine(&[key_map("long", Trigger::single(long(Key::A)), Key::B)]);

    assert_eq!(tap(&mut engine, Key::A, ms(200)), (true, true));
    assert_eq!(engine.host().replayed(), vec![(Key::A, InputEventAction::DownUp)]);

    engine.advance_by(ms(1000));
    assert!(engine.host().performed.is_empty());
}

#[test]
fn test_trigger_long_press_delay_overrides_settings() {
    let mut trigger = Trigger::single(long(Key::A));
    trigger.long_press_delay = Some(ms(150));
    let mut engine = engine(&[key_map("long", trigger, Key::B)]);

    down(&mut engine, Key::A);
    engine.advance_by(ms(150));
    assert_eq!(engine.host().performed.len(), 1);
}

#[test]
fn test_short_and_long_press_on_same_key() {
    let key_maps = [
        key_map("short", Trigger::single(short(Key::A)), Key::X),
        key_map("long", Trigger::single(long(Key::A)), Key::Y),
    ];

    let mut engine = engine(&key_maps);
    assert_eq!(tap(&mut engine, Key::A, ms(100)), (true, true));
    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::X, InputEventAction::DownUp)]
    );

    let mut engine = common::engine(&key_maps);
    assert_eq!(tap(&mut engine, Key::A, ms(600)), (true, true));
    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::Y, InputEventAction::DownUp)]
    );
    assert!(engine.host().resynthesized.is_empty());
}

#[test]
fn test_double_press() {
    let mut engine = engine(&[key_map("double", Trigger::single(double(Key::A)), Key::B)]);

    assert_eq!(tap(&mut engine, Key::A, ms(50)), (true, true));
    assert!(engine.host().performed.is_empty());

    engine.advance_by(ms(50));
    assert_eq!(tap(&mut engine, Key::A, ms(50)), (true, true));
    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::B, InputEventAction::DownUp)]
    );

    engine.advance_by(ms(1000));
    assert_eq!(engine.host().performed.len(), 1);
    assert!(engine.host().resynthesized.is_empty());
}

#[test]
fn test_single_press_of_double_press_key_replayed_after_timeout() {
    let mut engine = engine(&[key_map("double", Trigger::single(double(Key::A)), Key::B)]);

    tap(&mut engine, Key::A, ms(50));
    engine.advance_by(ms(299));
    assert!(engine.host().resynthesized.is_empty());

    engine.advance_by(ms(1));
    assert_eq!(engine.host().replayed(), vec![(Key::A, InputEventAction::DownUp)]);
    assert!(engine.host().performed.is_empty());
}

#[test]
fn test_short_press_fires_when_double_press_fails() {
    let key_maps = [
        key_map("short", Trigger::single(short(Key::A)), Key::X),
        key_map("double", Trigger::single(double(Key::A)), Key::Y),
    ];
    let mut engine = engine(&key_maps);

    assert_eq!(tap(&mut engine, Key::A, ms(30)), (true, true));
    engine.advance_by(ms(299));
    assert!(engine.host().performed.is_empty());

    engine.advance_by(ms(1));
    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::X, InputEventAction::DownUp)]
    );
    assert!(engine.host().resynthesized.is_empty());
}

#[test]
fn test_double_press_wins_over_short_press() {
    let key_maps = [
        key_map("short", Trigger::single(short(Key::A)), Key::X),
        key_map("double", Trigger::single(double(Key::A)), Key::Y),
    ];
    let mut engine = engine(&key_maps);

    tap(&mut engine, Key::A, ms(30));
    engine.advance_by(ms(50));
    tap(&mut engine, Key::A, ms(30));
    engine.advance_by(ms(1000));

    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::Y, InputEventAction::DownUp)]
    );
    assert!(engine.host().resynthesized.is_empty());
}

// =========================================================================
// Auto-repeat
// =========================================================================

fn repeat_down(engine: &mut TestEngine, key: Key, count: u32) -> bool {
    engine.on_key_event(&KeyEvent::down(key, keyboard()).with_repeat_count(count))
}

#[test]
fn test_auto_repeat_fires_short_press_once() {
    let mut engine = engine(&[key_map("a", Trigger::single(short(Key::A)), Key::B)]);

    assert!(down(&mut engine, Key::A));
    for count in 1..=3 {
        engine.advance_by(ms(50));
        assert!(repeat_down(&mut engine, Key::A, count));
    }
    assert!(up(&mut engine, Key::A));

    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::B, InputEventAction::DownUp)]
    );
    assert!(engine.host().resynthesized.is_empty());
}

#[test]
fn test_auto_repeat_of_unmapped_key_passes_through() {
    let mut engine = engine(&[key_map("a", Trigger::single(short(Key::A)), Key::B)]);

    assert!(!down(&mut engine, Key::C));
    assert!(!repeat_down(&mut engine, Key::C, 1));
    assert!(!up(&mut engine, Key::C));
    assert!(engine.host().performed.is_empty());
}

#[test]
fn test_auto_repeat_does_not_delay_long_press() {
    let mut engine = engine(&[key_map("long", Trigger::single(long(Key::A)), Key::B)]);

    assert!(down(&mut engine, Key::A));
    engine.advance_by(ms(300));
    assert!(repeat_down(&mut engine, Key::A, 1));
    engine.advance_by(ms(300));
    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::B, InputEventAction::DownUp)]
    );

    assert!(repeat_down(&mut engine, Key::A, 2));
    engine.advance_by(ms(300));
    assert!(up(&mut engine, Key::A));

    assert_eq!(engine.host().performed.len(), 1);
    assert!(engine.host().resynthesized.is_empty());
}

#[test]
fn test_input_method_repeats_swallowed() {
    let trigger = Trigger::single(short(Key::A).with_input_method(true));
    let mut engine = engine(&[key_map("ime", trigger, Key::B)]);

    // a repeat with no press seen is still swallowed
    assert!(repeat_down(&mut engine, Key::A, 1));
    assert!(engine.host().performed.is_empty());

    assert!(down(&mut engine, Key::A));
    assert!(repeat_down(&mut engine, Key::A, 1));
    assert!(repeat_down(&mut engine, Key::A, 2));
    assert!(up(&mut engine, Key::A));
    assert_eq!(engine.host().performed.len(), 1);
}

// =========================================================================
// Parallel triggers
// =========================================================================

#[test]
fn test_parallel_chord() {
    let trigger = Trigger::parallel(vec![short(Key::LEFT_CTRL), short(Key::C)]);
    let mut engine = engine(&[key_map("copy", trigger, Key::X)]);

    assert!(down(&mut engine, Key::LEFT_CTRL));
    engine.advance_by(ms(20));
    assert!(down(&mut engine, Key::C));
    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::X, InputEventAction::DownUp)]
    );

    assert!(up(&mut engine, Key::C));
    assert!(up(&mut engine, Key::LEFT_CTRL));
    assert_eq!(engine.host().performed.len(), 1);
    assert!(engine.host().resynthesized.is_empty());
}

#[test]
fn test_incomplete_chord_replays_pressed_key() {
    let trigger = Trigger::parallel(vec![short(Key::LEFT_CTRL), short(Key::C)]);
    let mut engine = engine(&[key_map("copy", trigger, Key::X)]);

    assert_eq!(tap(&mut engine, Key::LEFT_CTRL, ms(40)), (true, true));
    assert_eq!(
        engine.host().replayed(),
        vec![(Key::LEFT_CTRL, InputEventAction::DownUp)]
    );
    assert!(engine.host().performed.is_empty());
}

// =========================================================================
// Sequence triggers
// =========================================================================

#[test]
fn test_sequence_fires_on_last_release() {
    let trigger = Trigger::sequence(vec![short(Key::A), short(Key::B)]);
    let mut engine = engine(&[key_map("ab", trigger, Key::C)]);

    assert_eq!(tap(&mut engine, Key::A, ms(50)), (true, true));
    engine.advance_by(ms(50));
    assert_eq!(tap(&mut engine, Key::B, ms(50)), (true, true));
    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::C, InputEventAction::DownUp)]
    );

    engine.advance_by(ms(2000));
    assert!(engine.host().resynthesized.is_empty());
}

#[test]
fn test_sequence_timeout_replays_consumed_press() {
    let trigger = Trigger::sequence(vec![short(Key::A), short(Key::B)]);
    let mut engine = engine(&[key_map("ab", trigger, Key::C)]);

    tap(&mut engine, Key::A, ms(50));
    engine.advance_by(ms(999));
    assert!(engine.host().resynthesized.is_empty());

    engine.advance_by(ms(1));
    assert_eq!(engine.host().replayed(), vec![(Key::A, InputEventAction::DownUp)]);

    // B alone no longer completes the sequence and is handed back
    assert_eq!(tap(&mut engine, Key::B, ms(50)), (true, true));
    assert_eq!(
        engine.host().replayed(),
        vec![
            (Key::A, InputEventAction::DownUp),
            (Key::B, InputEventAction::DownUp)
        ]
    );
    assert!(engine.host().performed.is_empty());
}

#[test]
fn test_sequence_timeout_from_settings() {
    let trigger = Trigger::sequence(vec![short(Key::A), short(Key::B)]);
    let mut settings = Settings::default();
    settings.sequence_trigger_timeout = ms(200);

    let mut engine = engine(&[key_map("ab", trigger, Key::C)]);
    engine.set_settings(settings);

    tap(&mut engine, Key::A, ms(50));
    engine.advance_by(ms(200));
    assert_eq!(engine.host().replayed(), vec![(Key::A, InputEventAction::DownUp)]);
}

// =========================================================================
// Overlapping triggers
// =========================================================================

#[test]
fn test_short_press_waits_for_overlapping_sequence() {
    let key_maps = [
        key_map("a", Trigger::single(short(Key::A)), Key::X),
        key_map("ab", Trigger::sequence(vec![short(Key::A), short(Key::B)]), Key::Y),
    ];
    let mut engine = engine(&key_maps);

    assert_eq!(tap(&mut engine, Key::A, ms(50)), (true, true));
    assert!(engine.host().performed.is_empty());

    engine.advance_by(ms(1000));
    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::X, InputEventAction::DownUp)]
    );
    assert!(engine.host().resynthesized.is_empty());
}

#[test]
fn test_completed_sequence_cancels_waiting_short_press() {
    let key_maps = [
        key_map("a", Trigger::single(short(Key::A)), Key::X),
        key_map("ab", Trigger::sequence(vec![short(Key::A), short(Key::B)]), Key::Y),
    ];
    let mut engine = engine(&key_maps);

    tap(&mut engine, Key::A, ms(50));
    engine.advance_by(ms(50));
    tap(&mut engine, Key::B, ms(50));
    assert_eq!(
        engine.host().actions(),
        vec![key_action(Key::Y, InputEventAction::DownUp)]
    );

    engine.advance_by(ms(2000));
    assert_eq!(engine.host().performed.len(), 1);
    assert!(engine.host().resynthesized.is_empty());
}
