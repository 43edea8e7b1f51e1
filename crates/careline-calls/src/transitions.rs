// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call lifecycle transition table.
//!
//! ```text
//! initiated -> ringing -> answered -> connected -> ended -> completed
//!     \__________\___________\______________________/
//!      \__________\___________\-> failed
//! ```
//!
//! Steps may be skipped forward (gateways do not report every state), but
//! never backward. `failed` is reachable only before `connected`.

use careline_core::types::CallStatus;

/// Targets reachable from `from` in one step.
pub fn allowed_targets(from: CallStatus) -> &'static [CallStatus] {
    use CallStatus::*;
    match from {
        Initiated => &[Ringing, Answered, Connected, Ended, Failed],
        Ringing => &[Answered, Connected, Ended, Failed],
        Answered => &[Connected, Ended, Failed],
        Connected => &[Ended],
        Ended => &[Completed],
        Completed | Failed => &[],
    }
}

pub fn can_transition(from: CallStatus, to: CallStatus) -> bool {
    allowed_targets(from).contains(&to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use CallStatus::*;

    const ALL: [CallStatus; 7] = [Initiated, Ringing, Answered, Connected, Ended, Completed, Failed];

    #[test]
    fn happy_path_is_allowed() {
        let path = [Initiated, Ringing, Answered, Connected, Ended, Completed];
        for pair in path.windows(2) {
            assert!(can_transition(pair[0], pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn failed_only_before_connected() {
        assert!(can_transition(Initiated, Failed));
        assert!(can_transition(Ringing, Failed));
        assert!(can_transition(Answered, Failed));
        assert!(!can_transition(Connected, Failed));
        assert!(!can_transition(Ended, Failed));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for to in ALL {
            assert!(!can_transition(Completed, to));
            assert!(!can_transition(Failed, to));
        }
    }

    #[test]
    fn no_backward_or_self_transitions() {
        for from in ALL {
            assert!(!can_transition(from, from), "{from} -> {from}");
        }
        assert!(!can_transition(Connected, Ringing));
        assert!(!can_transition(Answered, Initiated));
        assert!(!can_transition(Ended, Connected));
    }
}
