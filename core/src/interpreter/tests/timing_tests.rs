//! Timed playback tests
//!
//! Run with paused tokio time so every tick lands exactly on its period.
//! Assertions are taken 10ms after the tick they are about.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::helpers::{cleared, emit, highlight, program, run_local, sleep_ms, Recorder};
use crate::interpreter::{Mode, PlaybackEngine, StepOutcome};
use crate::types::{Command, Program, Speed};

fn three_step_program() -> Program {
    program(&[Command::MoveForwards, Command::TurnLeft, Command::Deliver])
}

/* ===================== Play ===================== */

#[tokio::test(start_paused = true)]
async fn test_play_emits_one_instruction_per_period() {
    run_local(async {
        let recorder = Recorder::new();
        let engine = recorder.engine(three_step_program());

        engine.play();
        assert_eq!(engine.mode(), Mode::Running);
        assert!(recorder.events().is_empty());

        sleep_ms(690).await;
        assert!(recorder.events().is_empty());

        sleep_ms(20).await;
        assert_eq!(recorder.events(), vec![emit(Command::MoveForwards), highlight("i1")]);

        sleep_ms(700).await;
        assert_eq!(recorder.emitted().len(), 2);

        sleep_ms(700).await;
        assert_eq!(recorder.emitted().len(), 3);
        assert_eq!(engine.mode(), Mode::Running);

        // The tick after the last instruction clears the highlight and goes idle
        sleep_ms(700).await;
        assert_eq!(
            recorder.events(),
            vec![
                emit(Command::MoveForwards),
                highlight("i1"),
                emit(Command::TurnLeft),
                highlight("i2"),
                emit(Command::Deliver),
                highlight("i3"),
                cleared(),
            ]
        );
        assert_eq!(engine.mode(), Mode::Idle);

        sleep_ms(3000).await;
        assert_eq!(recorder.events().len(), 7);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_play_while_running_is_a_no_op() {
    run_local(async {
        let recorder = Recorder::new();
        let engine = recorder.engine(three_step_program());

        engine.play();
        sleep_ms(350).await;
        engine.play();

        sleep_ms(360).await;
        assert_eq!(recorder.emitted(), vec![Command::MoveForwards]);

        sleep_ms(700).await;
        assert_eq!(recorder.emitted(), vec![Command::MoveForwards, Command::TurnLeft]);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_play_after_finish_clears_highlight() {
    run_local(async {
        let recorder = Recorder::new();
        let engine = recorder.engine(program(&[Command::Wait]));

        engine.play();
        sleep_ms(1410).await;
        assert_eq!(engine.mode(), Mode::Idle);
        recorder.clear();

        engine.play();

        assert_eq!(recorder.events(), vec![cleared()]);
        assert_eq!(engine.mode(), Mode::Idle);
        sleep_ms(2000).await;
        assert_eq!(recorder.events(), vec![cleared()]);
    })
    .await;
}

/* ===================== Stop ===================== */

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_and_rewinds() {
    run_local(async {
        let recorder = Recorder::new();
        let engine = recorder.engine(three_step_program());

        engine.play();
        sleep_ms(710).await;
        engine.stop();

        assert_eq!(engine.mode(), Mode::Idle);
        assert_eq!(engine.cursor(), 0);
        assert_eq!(recorder.last(), Some(emit(Command::Reset)));

        sleep_ms(3000).await;
        assert_eq!(
            recorder.emitted(),
            vec![Command::MoveForwards, Command::Reset]
        );

        // Playing again starts over from the first instruction
        engine.play();
        sleep_ms(710).await;
        assert_eq!(recorder.last(), Some(highlight("i1")));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_from_emit_callback_ends_the_run() {
    run_local(async {
        let recorder = Recorder::new();
        let slot: Rc<RefCell<Option<PlaybackEngine>>> = Rc::new(RefCell::new(None));

        let events = recorder.clone();
        let engine_slot = Rc::clone(&slot);
        let engine = recorder
            .builder()
            .emit(move |command| {
                events.push(emit(*command));
                if *command == Command::MoveForwards {
                    if let Some(engine) = engine_slot.borrow().as_ref() {
                        engine.stop();
                    }
                }
            })
            .program(three_step_program())
            .build();
        *slot.borrow_mut() = Some(engine.clone());

        engine.play();
        sleep_ms(2500).await;

        // Nothing of the stopped run follows the reset
        assert_eq!(
            recorder.events(),
            vec![emit(Command::MoveForwards), emit(Command::Reset)]
        );
        assert_eq!(engine.cursor(), 0);
        assert_eq!(engine.mode(), Mode::Idle);

        slot.borrow_mut().take();
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_dropping_engine_cancels_timer() {
    run_local(async {
        let recorder = Recorder::new();
        let engine = recorder.engine(three_step_program());

        engine.play();
        drop(engine);

        sleep_ms(3000).await;
        assert!(recorder.events().is_empty());
    })
    .await;
}

/* ===================== Step / Load While Running ===================== */

#[tokio::test(start_paused = true)]
async fn test_step_while_running_is_ignored() {
    run_local(async {
        let recorder = Recorder::new();
        let engine = recorder.engine(three_step_program());

        engine.play();
        assert_eq!(engine.step(), StepOutcome::Ignored);
        assert!(recorder.events().is_empty());

        sleep_ms(710).await;
        assert_eq!(engine.step(), StepOutcome::Ignored);
        assert_eq!(recorder.emitted(), vec![Command::MoveForwards]);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_load_while_running_stops_first() {
    run_local(async {
        let recorder = Recorder::new();
        let engine = recorder.engine(three_step_program());

        engine.play();
        sleep_ms(710).await;
        engine.load(program(&[Command::SoundHorn, Command::Wait]));

        assert_eq!(engine.mode(), Mode::Idle);
        assert_eq!(engine.cursor(), 0);
        assert_eq!(recorder.emitted(), vec![Command::MoveForwards, Command::Reset]);

        sleep_ms(3000).await;
        assert_eq!(recorder.emitted().len(), 2);

        engine.play();
        sleep_ms(710).await;
        assert_eq!(recorder.last(), Some(highlight("i1")));
        assert_eq!(recorder.emitted().last(), Some(&Command::SoundHorn));
    })
    .await;
}

/* ===================== Speed ===================== */

#[tokio::test(start_paused = true)]
async fn test_double_speed_halves_period() {
    run_local(async {
        let recorder = Recorder::new();
        let engine = recorder.engine(three_step_program());
        engine.set_speed(Speed::new(2.0).unwrap());

        engine.play();

        sleep_ms(360).await;
        assert_eq!(recorder.emitted().len(), 1);
        sleep_ms(350).await;
        assert_eq!(recorder.emitted().len(), 2);
        sleep_ms(350).await;
        assert_eq!(recorder.emitted().len(), 3);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_speed_change_applies_at_next_play() {
    run_local(async {
        let recorder = Recorder::new();
        let engine = recorder.engine(three_step_program());

        engine.play();
        sleep_ms(710).await;
        engine.set_speed(Speed::new(2.0).unwrap());

        // Running timer keeps its period
        sleep_ms(350).await;
        assert_eq!(recorder.emitted().len(), 1);
        sleep_ms(350).await;
        assert_eq!(recorder.emitted().len(), 2);

        engine.stop();
        recorder.clear();
        engine.play();
        sleep_ms(360).await;
        assert_eq!(recorder.emitted(), vec![Command::MoveForwards]);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_speed_change_reschedules_when_enabled() {
    run_local(async {
        let recorder = Recorder::new();
        let engine = recorder
            .builder()
            .reschedule_on_speed_change(true)
            .program(three_step_program())
            .build();

        engine.play();
        sleep_ms(710).await;
        engine.set_speed(Speed::new(2.0).unwrap());
        assert_eq!(engine.mode(), Mode::Running);

        // Restarted at 710 with a 350ms period: next tick at 1060
        sleep_ms(340).await;
        assert_eq!(recorder.emitted().len(), 1);
        sleep_ms(20).await;
        assert_eq!(recorder.emitted(), vec![Command::MoveForwards, Command::TurnLeft]);

        // Restarting did not rewind or emit a reset
        assert_eq!(engine.cursor(), 2);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_extreme_speed_still_plays_to_the_end() {
    run_local(async {
        let recorder = Recorder::new();
        let engine = recorder.engine(three_step_program());
        engine.set_speed(Speed::new(1e10).unwrap());
        assert!(engine.period() > Duration::ZERO);

        engine.play();
        sleep_ms(20).await;

        assert_eq!(
            recorder.emitted(),
            vec![Command::MoveForwards, Command::TurnLeft, Command::Deliver]
        );
        assert_eq!(recorder.last(), Some(cleared()));
        assert_eq!(engine.mode(), Mode::Idle);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_zero_base_period_still_plays_to_the_end() {
    run_local(async {
        let recorder = Recorder::new();
        let engine = recorder
            .builder()
            .base_period(Duration::ZERO)
            .program(three_step_program())
            .build();

        engine.play();
        sleep_ms(20).await;

        assert_eq!(recorder.emitted().len(), 3);
        assert_eq!(engine.mode(), Mode::Idle);
        assert_eq!(engine.step(), StepOutcome::Exhausted);
    })
    .await;
}
