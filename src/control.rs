//! Operator stop controls: Ctrl+C and a `q` keypress
//!
//! Both are polled once per loop iteration and never interrupt a bus
//! transaction in flight.

use crate::acquisition::StopReason;
use crate::error::{Adxl345Error, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Something the acquisition loop asks "should we stop?" at the top of every tick
pub trait StopSource {
    fn poll_stop(&mut self) -> Option<StopReason>;
}

impl<F: FnMut() -> Option<StopReason>> StopSource for F {
    fn poll_stop(&mut self) -> Option<StopReason> {
        self()
    }
}

/// Shared flag raised from the Ctrl+C handler
#[derive(Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Create a flag and register it as the process Ctrl+C handler
    ///
    /// Only one handler may be installed per process.
    pub fn install() -> Result<Self> {
        let flag = Self::default();
        let handler_flag = flag.clone();
        ctrlc::set_handler(move || handler_flag.raise())
            .map_err(|e| Adxl345Error::Control(format!("Ctrl+C handler: {}", e)))?;
        Ok(flag)
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl StopSource for InterruptFlag {
    fn poll_stop(&mut self) -> Option<StopReason> {
        self.is_raised().then_some(StopReason::Interrupt)
    }
}

/// Non-blocking `q` / `Q` detection on a raw-mode terminal
///
/// Raw mode is held for the lifetime of the value and restored on drop.
/// Raw mode also swallows SIGINT, so Ctrl+C arrives here as a key event.
pub struct KeyboardStop {
    _raw: (),
}

impl KeyboardStop {
    pub fn enable() -> Result<Self> {
        terminal::enable_raw_mode()
            .map_err(|e| Adxl345Error::Control(format!("raw mode: {}", e)))?;
        Ok(Self { _raw: () })
    }
}

impl Drop for KeyboardStop {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

impl StopSource for KeyboardStop {
    fn poll_stop(&mut self) -> Option<StopReason> {
        // Drain everything pending without ever blocking
        while event::poll(Duration::ZERO).unwrap_or(false) {
            let key = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
                Ok(_) => continue,
                Err(_) => return None,
            };
            match key.code {
                KeyCode::Char('q') | KeyCode::Char('Q') => return Some(StopReason::Keypress),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Some(StopReason::Interrupt)
                }
                _ => {}
            }
        }
        None
    }
}

/// Interrupt flag plus an optional keyboard watcher
pub struct OperatorControls {
    interrupt: InterruptFlag,
    keyboard: Option<KeyboardStop>,
}

impl OperatorControls {
    pub fn new(interrupt: InterruptFlag, keyboard: Option<KeyboardStop>) -> Self {
        Self { interrupt, keyboard }
    }

    /// True while the keyboard watcher holds the terminal in raw mode
    pub fn raw_terminal(&self) -> bool {
        self.keyboard.is_some()
    }
}

impl StopSource for OperatorControls {
    fn poll_stop(&mut self) -> Option<StopReason> {
        if let Some(reason) = self.interrupt.poll_stop() {
            return Some(reason);
        }
        self.keyboard.as_mut().and_then(KeyboardStop::poll_stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_flag_shared_between_clones() {
        let flag = InterruptFlag::default();
        let mut polled = flag.clone();
        assert_eq!(polled.poll_stop(), None);
        flag.raise();
        assert_eq!(polled.poll_stop(), Some(StopReason::Interrupt));
    }

    #[test]
    fn test_controls_without_keyboard() {
        let flag = InterruptFlag::default();
        let mut controls = OperatorControls::new(flag.clone(), None);
        assert!(!controls.raw_terminal());
        assert_eq!(controls.poll_stop(), None);
        flag.raise();
        assert_eq!(controls.poll_stop(), Some(StopReason::Interrupt));
    }

    #[test]
    fn test_closure_stop_source() {
        let mut calls = 0;
        let mut source = || {
            calls += 1;
            (calls > 2).then_some(StopReason::Keypress)
        };
        assert_eq!(source.poll_stop(), None);
        assert_eq!(source.poll_stop(), None);
        assert_eq!(source.poll_stop(), Some(StopReason::Keypress));
    }
}
