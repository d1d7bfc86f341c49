//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Mailextract.
//
// Mailextract is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mailextract is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Mailextract. If not, see <http://www.gnu.org/licenses/>.

//! The level-gated progress event channel.
//!
//! Every event has a `ProgressLevel`; the channel drops events less important
//! than its threshold. Surviving events always go to the `ProgressSink` (by
//! default the log) and may additionally be handed to a callback, which is how
//! a UI follows along. After each callback invocation the channel pauses
//! briefly so the UI thread gets a chance to run, and that pause doubles as
//! the point where a requested interrupt is noticed.

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{
    self, Receiver, RecvTimeoutError, Sender, TryRecvError,
};
use log::{log, warn};

use crate::support::error::Error;

/// The importance of a progress event.
///
/// Lower values are more important.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgressLevel {
    Global = 10,
    Warning = 20,
    Folder = 30,
    MessageGroup = 40,
    Message = 50,
    MessageDetails = 60,
}

impl ProgressLevel {
    pub const ALL: [ProgressLevel; 6] = [
        ProgressLevel::Global,
        ProgressLevel::Warning,
        ProgressLevel::Folder,
        ProgressLevel::MessageGroup,
        ProgressLevel::Message,
        ProgressLevel::MessageDetails,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProgressLevel::Global => "GLOBAL",
            ProgressLevel::Warning => "WARNING",
            ProgressLevel::Folder => "FOLDER",
            ProgressLevel::MessageGroup => "MESSAGE_GROUP",
            ProgressLevel::Message => "MESSAGE",
            ProgressLevel::MessageDetails => "MESSAGE_DETAILS",
        }
    }
}

impl fmt::Display for ProgressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProgressLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        ProgressLevel::ALL
            .iter()
            .copied()
            .find(|level| level.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownProgressLevel(s.to_owned()))
    }
}

/// The threshold of a progress channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressLevelFilter {
    /// Nothing is delivered.
    Off,
    /// Events at this level or more important are delivered.
    Level(ProgressLevel),
}

impl ProgressLevelFilter {
    pub fn allows(self, level: ProgressLevel) -> bool {
        match self {
            ProgressLevelFilter::Off => false,
            ProgressLevelFilter::Level(threshold) => level <= threshold,
        }
    }
}

impl fmt::Display for ProgressLevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProgressLevelFilter::Off => f.write_str("OFF"),
            ProgressLevelFilter::Level(level) => level.fmt(f),
        }
    }
}

impl FromStr for ProgressLevelFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if s.trim().eq_ignore_ascii_case("OFF") {
            Ok(ProgressLevelFilter::Off)
        } else {
            s.parse().map(ProgressLevelFilter::Level)
        }
    }
}

/// Where delivered events are recorded.
pub trait ProgressSink {
    fn record(&mut self, level: ProgressLevel, message: &str);
}

/// Forwards events to the `log` crate.
///
/// `WARNING` events are logged as warnings and everything else as info, all
/// under the `mailextract::progress` target so they can be routed separately.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn record(&mut self, level: ProgressLevel, message: &str) {
        let log_level = match level {
            ProgressLevel::Warning => log::Level::Warn,
            _ => log::Level::Info,
        };
        log!(
            target: "mailextract::progress",
            log_level,
            "[{}] {}",
            level,
            message
        );
    }
}

/// The UI callback.
///
/// The first argument is the item counter for step events, or -1 for
/// everything else. Returning an error aborts the extraction.
pub type ProgressCallback = Box<dyn FnMut(i64, &str) -> Result<(), Error>>;

/// A handle used to stop an extraction from another thread.
#[derive(Clone, Debug)]
pub struct Interrupter(Sender<()>);

/// The receiving end of an `Interrupter`, given to a `ProgressChannel`.
#[derive(Debug)]
pub struct InterruptSignal(Receiver<()>);

impl Interrupter {
    pub fn new() -> (Self, InterruptSignal) {
        let (tx, rx) = channel::bounded(1);
        (Interrupter(tx), InterruptSignal(rx))
    }

    /// Request the extraction to stop at its next suspension point.
    ///
    /// Interrupting more than once, or after the extraction has finished, is
    /// harmless.
    pub fn interrupt(&self) {
        let _ = self.0.try_send(());
    }
}

pub struct ProgressChannel {
    threshold: ProgressLevelFilter,
    callback: Option<(u64, ProgressCallback)>,
    sink: Box<dyn ProgressSink>,
    pause: Duration,
    interrupt: Option<Receiver<()>>,
    interrupted: bool,
}

impl fmt::Debug for ProgressChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressChannel")
            .field("threshold", &self.threshold)
            .field("step", &self.callback.as_ref().map(|&(step, _)| step))
            .field("pause", &self.pause)
            .field("interrupted", &self.interrupted)
            .finish()
    }
}

impl ProgressChannel {
    /// Create a channel delivering events at `threshold` or more important
    /// to the log, with no callback, no pause, and no way to interrupt it.
    pub fn new(threshold: ProgressLevelFilter) -> Self {
        ProgressChannel {
            threshold,
            callback: None,
            sink: Box::new(LogSink),
            pause: Duration::from_millis(0),
            interrupt: None,
            interrupted: false,
        }
    }

    /// Hand events to `callback` as well.
    ///
    /// `step` controls how often `emit_if_step` calls back; 0 means never.
    pub fn with_callback(
        mut self,
        step: u64,
        callback: impl FnMut(i64, &str) -> Result<(), Error> + 'static,
    ) -> Self {
        self.callback = Some((step, Box::new(callback)));
        self
    }

    pub fn with_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_interrupt(mut self, signal: InterruptSignal) -> Self {
        self.interrupt = Some(signal.0);
        self
    }

    pub fn is_enabled(&self, level: ProgressLevel) -> bool {
        self.threshold.allows(level)
    }

    /// Emit an event, then suspend briefly.
    ///
    /// Fails if the callback fails or if an interrupt has been requested.
    pub fn emit(
        &mut self,
        level: ProgressLevel,
        message: &str,
    ) -> Result<(), Error> {
        let called_back = self.deliver(level, None, message)?;
        self.suspend(called_back)
    }

    /// Emit an event whose callback delivery is rate-limited by `counter`.
    ///
    /// The event is recorded like any other, but the callback only sees it
    /// if `counter` is a non-zero multiple of the configured step.
    pub fn emit_if_step(
        &mut self,
        level: ProgressLevel,
        counter: u64,
        message: &str,
    ) -> Result<(), Error> {
        let called_back = self.deliver(level, Some(counter), message)?;
        self.suspend(called_back)
    }

    /// Emit an event without pausing or checking for interrupts.
    ///
    /// This is for reporting that the run is already over, where an
    /// interrupt has nothing left to stop.
    pub fn emit_without_suspension(
        &mut self,
        level: ProgressLevel,
        message: &str,
    ) -> Result<(), Error> {
        self.deliver(level, None, message).map(|_| ())
    }

    /// Returns whether the callback was invoked.
    fn deliver(
        &mut self,
        level: ProgressLevel,
        counter: Option<u64>,
        message: &str,
    ) -> Result<bool, Error> {
        if !self.threshold.allows(level) {
            return Ok(false);
        }

        self.sink.record(level, message);

        let (step, callback) = match self.callback {
            Some((step, ref mut callback)) => (step, callback),
            None => return Ok(false),
        };

        match counter {
            None => {
                callback(-1, message)?;
                Ok(true)
            },
            Some(counter)
                if 0 != counter && 0 != step && 0 == counter % step =>
            {
                callback(counter as i64, message)?;
                Ok(true)
            },
            Some(_) => Ok(false),
        }
    }

    fn suspend(&mut self, called_back: bool) -> Result<(), Error> {
        if self.interrupted {
            return Err(Error::Interrupted);
        }

        let pause = if called_back { self.pause } else { Duration::default() };

        match self.interrupt {
            Some(ref rx) if pause > Duration::default() => {
                match rx.recv_timeout(pause) {
                    Ok(()) => self.interrupted = true,
                    Err(RecvTimeoutError::Timeout) => (),
                    Err(RecvTimeoutError::Disconnected) => {
                        self.interrupt = None;
                        thread::sleep(pause);
                    },
                }
            },

            Some(ref rx) => match rx.try_recv() {
                Ok(()) => self.interrupted = true,
                Err(TryRecvError::Empty) => (),
                Err(TryRecvError::Disconnected) => self.interrupt = None,
            },

            None if pause > Duration::default() => thread::sleep(pause),
            None => (),
        }

        if self.interrupted {
            warn!("Extraction interrupted");
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// A sink that remembers every event, for inspection by tests.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub struct MemorySink(
    pub std::rc::Rc<std::cell::RefCell<Vec<(ProgressLevel, String)>>>,
);

#[cfg(test)]
impl MemorySink {
    pub fn events(&self) -> Vec<(ProgressLevel, String)> {
        self.0.borrow().clone()
    }

    pub fn at_level(&self, level: ProgressLevel) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter(|&&(l, _)| l == level)
            .map(|&(_, ref message)| message.clone())
            .collect()
    }
}

#[cfg(test)]
impl ProgressSink for MemorySink {
    fn record(&mut self, level: ProgressLevel, message: &str) {
        self.0.borrow_mut().push((level, message.to_owned()));
    }
}
