//! Frame and interleaver synchronization state machines
//!
//! Frame sync moves `Search -> Trial -> Synced` as the demodulator finds a pilot correlation peak
//! and then confirms it with clean unique words. Interleaver sync tracks whether the receiver knows
//! where a multi-frame interleaver window starts; it falls back to `Search` whenever frame sync is
//! lost.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// UW errors above which a frame counts as bad
pub const UW_ERROR_THRESHOLD: usize = 2;

/// Bad frames in `Trial` that force a return to `Search`
const TRIAL_BAD_FRAMES_MAX: usize = 2;

/// Consecutive good frames in `Trial` needed to reach `Synced`
const TRIAL_GOOD_FRAMES_MIN: usize = 4;

/// Consecutive bad frames in `Synced` that force a return to `Search` in automatic mode
const SYNCED_BAD_FRAMES_MAX: usize = 12;

/// Enumeration of synchronization states
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub enum SyncState {
    /// Looking for a frame
    #[default]
    Search,
    /// Frame found, waiting for confirmation
    Trial,
    /// Frame confirmed
    Synced,
}

/// Enumeration of synchronization modes
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub enum SyncMode {
    /// Sync is dropped after a run of bad frames
    #[default]
    Auto,
    /// Sync is held through bad frames until the operator drops it
    Manual,
}

/// Enumeration of operator sync commands
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub enum SyncCommand {
    /// Drop frame and interleaver sync immediately
    Unsync,
    /// Switch to automatic mode
    Autosync,
    /// Switch to manual mode
    Manualsync,
}

/// Frame and interleaver sync state machines with their counters
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct FrameSync {
    /// Current frame sync state
    state: SyncState,
    /// Frame sync state before the last step
    last_state: SyncState,
    /// Current interleaver sync state
    interleaver_state: SyncState,
    /// Interleaver sync state before the last step
    last_interleaver_state: SyncState,
    /// Sync mode
    mode: SyncMode,
    /// Frames since entering `Trial` (reset by each bad frame in `Trial`)
    frame_count: usize,
    /// Frames since the start of the current interleaver window
    frame_count_interleaver: usize,
    /// Bad frame counter
    sync_counter: usize,
    /// UW errors in the most recent frame
    uw_errors: usize,
}

impl FrameSync {
    /// Returns state machines in `Search`, automatic mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances frame sync by one frame.
    ///
    /// # Parameters
    ///
    /// - `timing_valid`: Whether the last acquisition attempt found a valid correlation peak.
    ///
    /// - `uw_errors`: Number of UW bit errors in the frame just demodulated (ignored in
    ///   `Search`).
    ///
    /// # Returns
    ///
    /// - `state`: Frame sync state after the step.
    pub fn step(&mut self, timing_valid: bool, uw_errors: usize) -> SyncState {
        self.last_state = self.state;
        self.last_interleaver_state = self.interleaver_state;
        let mut next_state = self.state;
        if self.state == SyncState::Search && timing_valid {
            self.frame_count = 0;
            self.sync_counter = 0;
            next_state = SyncState::Trial;
        }
        if matches!(self.state, SyncState::Trial | SyncState::Synced) {
            self.frame_count += 1;
            self.frame_count_interleaver += 1;
            self.uw_errors = uw_errors;
            debug!("Frame {} has {uw_errors} UW errors", self.frame_count);
            let bad_frame = uw_errors > UW_ERROR_THRESHOLD;
            if self.state == SyncState::Trial {
                if bad_frame {
                    self.sync_counter += 1;
                    self.frame_count = 0;
                }
                if self.sync_counter == TRIAL_BAD_FRAMES_MAX {
                    next_state = SyncState::Search;
                    self.interleaver_state = SyncState::Search;
                }
                if self.frame_count == TRIAL_GOOD_FRAMES_MIN {
                    next_state = SyncState::Synced;
                }
            } else {
                if bad_frame {
                    self.sync_counter += 1;
                } else {
                    self.sync_counter = 0;
                }
                if self.mode == SyncMode::Auto && self.sync_counter == SYNCED_BAD_FRAMES_MAX {
                    next_state = SyncState::Search;
                    self.interleaver_state = SyncState::Search;
                }
            }
        }
        if next_state != self.state {
            info!("Frame sync {:?} -> {next_state:?}", self.state);
        }
        self.state = next_state;
        self.state
    }

    /// Applies an operator command.
    pub fn command(&mut self, cmd: SyncCommand) {
        match cmd {
            SyncCommand::Unsync => {
                if self.state != SyncState::Search {
                    warn!("Frame sync dropped by operator");
                }
                self.state = SyncState::Search;
                self.interleaver_state = SyncState::Search;
            }
            SyncCommand::Autosync => self.mode = SyncMode::Auto,
            SyncCommand::Manualsync => self.mode = SyncMode::Manual,
        }
    }

    /// Declares interleaver sync and marks the current frame as the end of a window.
    pub fn set_interleaver_synced(&mut self, frame_count_interleaver: usize) {
        if self.interleaver_state != SyncState::Synced {
            info!("Interleaver sync acquired");
        }
        self.interleaver_state = SyncState::Synced;
        self.frame_count_interleaver = frame_count_interleaver;
    }

    /// Restarts the interleaver window count.
    pub fn reset_frame_count_interleaver(&mut self) {
        self.frame_count_interleaver = 0;
    }

    /// Returns current frame sync state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Returns frame sync state before the last step.
    #[must_use]
    pub fn last_state(&self) -> SyncState {
        self.last_state
    }

    /// Returns current interleaver sync state.
    #[must_use]
    pub fn interleaver_state(&self) -> SyncState {
        self.interleaver_state
    }

    /// Returns interleaver sync state before the last step.
    #[must_use]
    pub fn last_interleaver_state(&self) -> SyncState {
        self.last_interleaver_state
    }

    /// Returns sync mode.
    #[must_use]
    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Returns frames counted since entering `Trial`.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Returns frames counted in the current interleaver window.
    #[must_use]
    pub fn frame_count_interleaver(&self) -> usize {
        self.frame_count_interleaver
    }

    /// Returns bad frame counter.
    #[must_use]
    pub fn sync_counter(&self) -> usize {
        self.sync_counter
    }

    /// Returns UW errors in the most recent frame.
    #[must_use]
    pub fn uw_errors(&self) -> usize {
        self.uw_errors
    }
}
