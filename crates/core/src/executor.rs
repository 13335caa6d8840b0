//! Replays dispatcher actions through an input device with settle delays.
//!
//! A pressed button (or held modifier) never outlives a failed call: every
//! error path releases them before the error propagates.

use crate::dispatch::Action;
use crate::error::{BrushError, Result};
use crate::logger;
use crate::platform::{InputDevice, Modifier};
use crate::settings::Delays;
use crate::sleep::sleep_ms;
use crate::types::ScreenPoint;

pub struct ActionExecutor<'a, I: InputDevice + ?Sized> {
    input: &'a mut I,
    delays: &'a Delays,
    held: Option<Modifier>,
}

impl<'a, I: InputDevice + ?Sized> ActionExecutor<'a, I> {
    pub fn new(input: &'a mut I, delays: &'a Delays) -> Self {
        Self { input, delays, held: None }
    }

    pub fn move_to(&mut self, p: ScreenPoint) -> Result<()> {
        self.guarded(|ex| {
            ex.input.move_to(p)?;
            sleep_ms(ex.delays.settle_ms);
            Ok(())
        })
    }

    pub fn move_and_click(&mut self, p: ScreenPoint) -> Result<()> {
        self.guarded(|ex| {
            ex.input.move_to(p)?;
            sleep_ms(ex.delays.settle_ms);
            ex.input.button_down()?;
            sleep_ms(ex.delays.settle_ms);
            ex.input.button_up()?;
            sleep_ms(ex.delays.click_settle_ms);
            Ok(())
        })
    }

    /// Press at `from`, move to `to`, release. With `constrain`, Shift is held
    /// from before the press until just after the release.
    pub fn drag_between(&mut self, from: ScreenPoint, to: ScreenPoint, constrain: bool) -> Result<()> {
        self.guarded(|ex| {
            ex.input.move_to(from)?;
            sleep_ms(ex.delays.settle_ms);
            if constrain {
                ex.input.key_down(Modifier::Shift)?;
                ex.held = Some(Modifier::Shift);
            }
            ex.input.button_down()?;
            sleep_ms(ex.delays.drag_settle_ms);
            ex.input.move_to(to)?;
            sleep_ms(ex.delays.drag_settle_ms);
            ex.input.button_up()?;
            if let Some(key) = ex.held.take() {
                ex.input.key_up(key)?;
            }
            sleep_ms(ex.delays.settle_ms);
            Ok(())
        })
    }

    pub fn type_text(&mut self, text: &str) -> Result<()> {
        self.guarded(|ex| {
            ex.input.type_text(text)?;
            sleep_ms(ex.delays.type_settle_ms);
            Ok(())
        })
    }

    /// Run a whole plan, stopping at the first failing action.
    pub fn run(&mut self, actions: &[Action]) -> Result<()> {
        for (i, action) in actions.iter().enumerate() {
            let result = match action {
                Action::Click(p) => self.move_and_click(*p),
                Action::MoveTo(p) => self.move_to(*p),
                Action::Drag { from, to, constrain } => self.drag_between(*from, *to, *constrain),
                Action::TypeText(text) => self.type_text(text),
            };
            if let Err(e) = result {
                logger::error_p("exec", &format!("action {}/{} {:?} failed: {}", i + 1, actions.len(), action, e));
                return Err(e);
            }
        }
        Ok(())
    }

    fn guarded<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let result = f(self);
        if let Err(e) = &result {
            self.release_all(e);
        }
        result
    }

    fn release_all(&mut self, cause: &BrushError) {
        logger::warn_p("exec", &format!("releasing input after error: {}", cause));
        if let Err(e) = self.input.button_up() {
            logger::error_p("exec", &format!("button release failed: {}", e));
        }
        if let Some(key) = self.held.take() {
            if let Err(e) = self.input.key_up(key) {
                logger::error_p("exec", &format!("{:?} release failed: {}", key, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::stub::{InputEvent, StubPlatform};

    fn no_delays() -> Delays {
        Delays {
            settle_ms: 0,
            click_settle_ms: 0,
            drag_settle_ms: 0,
            type_settle_ms: 0,
            verify_settle_ms: 0,
        }
    }

    #[test]
    fn click_is_move_press_release() {
        let mut stub = StubPlatform::new();
        let handle = stub.handle();
        let delays = no_delays();
        ActionExecutor::new(&mut stub, &delays)
            .move_and_click(ScreenPoint::new(10, 20))
            .unwrap();
        assert_eq!(
            handle.lock().events,
            vec![InputEvent::Move(ScreenPoint::new(10, 20)), InputEvent::Down, InputEvent::Up]
        );
    }

    #[test]
    fn constrained_drag_releases_shift_right_after_button() {
        let mut stub = StubPlatform::new();
        let handle = stub.handle();
        let delays = no_delays();
        ActionExecutor::new(&mut stub, &delays)
            .drag_between(ScreenPoint::new(100, 100), ScreenPoint::new(200, 200), true)
            .unwrap();
        let s = handle.lock();
        assert_eq!(
            s.events,
            vec![
                InputEvent::Move(ScreenPoint::new(100, 100)),
                InputEvent::KeyDown(Modifier::Shift),
                InputEvent::Down,
                InputEvent::Move(ScreenPoint::new(200, 200)),
                InputEvent::Up,
                InputEvent::KeyUp(Modifier::Shift),
            ]
        );
        assert!(s.held_keys.is_empty());
    }

    #[test]
    fn failure_mid_drag_releases_button_and_modifier() {
        let mut stub = StubPlatform::new();
        let handle = stub.handle();
        // move, shift, press succeed; the drag motion fails
        handle.lock().fail_after = Some(3);
        let delays = no_delays();
        let err = ActionExecutor::new(&mut stub, &delays)
            .drag_between(ScreenPoint::new(100, 100), ScreenPoint::new(200, 200), true)
            .unwrap_err();
        assert!(matches!(err, BrushError::Input(_)));

        let s = handle.lock();
        assert!(!s.button_held);
        assert!(s.held_keys.is_empty());
        assert_eq!(&s.events[3..], &[InputEvent::Up, InputEvent::KeyUp(Modifier::Shift)]);
    }

    #[test]
    fn run_stops_at_first_failure() {
        let mut stub = StubPlatform::new();
        let handle = stub.handle();
        handle.lock().fail_after = Some(3);
        let delays = no_delays();
        let actions = vec![
            Action::Click(ScreenPoint::new(1, 1)),
            Action::Click(ScreenPoint::new(2, 2)),
            Action::TypeText("never".into()),
        ];
        assert!(ActionExecutor::new(&mut stub, &delays).run(&actions).is_err());
        let s = handle.lock();
        assert!(!s.button_held);
        assert!(!s.events.iter().any(|e| matches!(e, InputEvent::Type(_))));
    }
}
