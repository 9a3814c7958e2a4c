use serde::{Deserialize, Serialize};

use crate::traits::CustomGlobal;

/// Clock and counters shared by the whole simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalState {
    /// Round number in synchronous mode, event time in asynchronous mode.
    pub current_time: u64,
    pub is_running: bool,
    pub is_even_round: bool,
    pub number_of_messages_in_this_round: u64,
    pub number_of_messages_over_all: u64,
    /// Lines logged by hooks during the current round.
    pub round_log: Vec<String>,
    pub rounds_completed: u64,
    pub events_processed: u64,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            current_time: 0,
            is_running: false,
            is_even_round: true,
            number_of_messages_in_this_round: 0,
            number_of_messages_over_all: 0,
            round_log: Vec::new(),
            rounds_completed: 0,
            events_processed: 0,
        }
    }
}

impl GlobalState {
    /// Advance the clock by one round and reset the per-round counters.
    pub(crate) fn begin_round(&mut self) {
        self.current_time += 1;
        self.is_even_round = !self.is_even_round;
        self.number_of_messages_in_this_round = 0;
        self.round_log.clear();
    }

    pub(crate) fn end_round(&mut self) {
        self.number_of_messages_over_all += self.number_of_messages_in_this_round;
        self.rounds_completed += 1;
    }
}

/// Never terminates on its own; runs stop after the requested step count.
#[derive(Debug, Default)]
pub struct DefaultCustomGlobal;

impl CustomGlobal for DefaultCustomGlobal {
    fn has_terminated(&self, _state: &GlobalState) -> bool {
        false
    }
}
