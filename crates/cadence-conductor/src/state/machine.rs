use crate::error::RunError;
use cadence_core::SimulationStatus;
use serde::Serialize;

// ── Valid transitions ──

const VALID_TRANSITIONS: &[(SimulationStatus, &[SimulationStatus])] = &[
    (
        SimulationStatus::Idle,
        &[SimulationStatus::Planning, SimulationStatus::Error],
    ),
    (
        SimulationStatus::Planning,
        &[SimulationStatus::Running, SimulationStatus::Error],
    ),
    (
        SimulationStatus::Running,
        &[
            SimulationStatus::Paused,
            SimulationStatus::Completed,
            SimulationStatus::Error,
        ],
    ),
    (
        SimulationStatus::Paused,
        &[SimulationStatus::Running, SimulationStatus::Error],
    ),
    // Completed and Error are terminal
];

pub fn is_valid_transition(from: SimulationStatus, to: SimulationStatus) -> bool {
    VALID_TRANSITIONS
        .iter()
        .any(|(f, targets)| *f == from && targets.contains(&to))
}

/// Move `status` to `to`, rejecting anything not in the table.
pub fn transition(status: &mut SimulationStatus, to: SimulationStatus) -> Result<(), RunError> {
    if !is_valid_transition(*status, to) {
        return Err(RunError::InvalidTransition { from: *status, to });
    }
    *status = to;
    Ok(())
}

// ── Run position ──

/// Where the run loop resumes: the next planned commit of `day`.
/// `commit == count` means the day's commits are done and only its
/// issue/pull-request actions remain.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Cursor {
    pub day: usize,
    pub commit: u32,
}

impl Cursor {
    pub fn next_commit(&mut self) {
        self.commit += 1;
    }

    pub fn next_day(&mut self) {
        self.day += 1;
        self.commit = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SimulationStatus::*;

    #[test]
    fn happy_path() {
        let mut s = Idle;
        for to in [Planning, Running, Paused, Running, Completed] {
            transition(&mut s, to).unwrap();
        }
        assert_eq!(s, Completed);
    }

    #[test]
    fn error_reachable_from_every_live_state() {
        for from in [Idle, Planning, Running, Paused] {
            assert!(is_valid_transition(from, Error), "{from}");
        }
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        for from in [Completed, Error] {
            for to in [Idle, Planning, Running, Paused, Completed, Error] {
                assert!(!is_valid_transition(from, to));
            }
        }
    }

    #[test]
    fn invalid_transition_leaves_status() {
        let mut s = Idle;
        let err = transition(&mut s, Running).unwrap_err();
        assert!(matches!(err, RunError::InvalidTransition { from: Idle, to: Running }));
        assert_eq!(s, Idle);
        // paused cannot complete without running again
        assert!(!is_valid_transition(Paused, Completed));
    }

    #[test]
    fn cursor_advances() {
        let mut c = Cursor::default();
        c.next_commit();
        c.next_commit();
        assert_eq!(c, Cursor { day: 0, commit: 2 });
        c.next_day();
        assert_eq!(c, Cursor { day: 1, commit: 0 });
    }
}
