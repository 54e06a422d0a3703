use std::fmt;

/// Wire lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WireState {
    #[default]
    Stopped,
    Prepared,
    Starting,
    Iterating,
    IterationEnded,
    Failed,
    Ended,
}

impl WireState {
    /// Legal edges of the lifecycle graph
    pub fn can_transition_to(self, next: WireState) -> bool {
        use WireState::*;
        matches!(
            (self, next),
            (Stopped, Prepared)
                | (Prepared, Starting)
                | (Prepared, Stopped)
                | (Starting, Iterating)
                | (Starting, Failed)
                | (Iterating, IterationEnded)
                | (Iterating, Failed)
                | (Iterating, Ended)
                | (IterationEnded, Iterating)
                | (IterationEnded, Ended)
                | (IterationEnded, Failed)
                | (Failed, Ended)
                | (Ended, Stopped)
        )
    }

    /// Warmed up and not yet cleaned
    pub fn is_running(self) -> bool {
        matches!(
            self,
            WireState::Starting | WireState::Iterating | WireState::IterationEnded
        )
    }
}

impl fmt::Display for WireState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [WireState; 7] = [
        WireState::Stopped,
        WireState::Prepared,
        WireState::Starting,
        WireState::Iterating,
        WireState::IterationEnded,
        WireState::Failed,
        WireState::Ended,
    ];

    fn successors(state: WireState) -> Vec<WireState> {
        ALL.iter()
            .copied()
            .filter(|next| state.can_transition_to(*next))
            .collect()
    }

    #[test]
    fn stopped_only_reaches_prepared() {
        assert_eq!(successors(WireState::Stopped), vec![WireState::Prepared]);
    }

    #[test]
    fn failed_only_reaches_ended() {
        assert_eq!(successors(WireState::Failed), vec![WireState::Ended]);
    }

    #[test]
    fn iteration_loop_is_bidirectional() {
        assert!(WireState::Iterating.can_transition_to(WireState::IterationEnded));
        assert!(WireState::IterationEnded.can_transition_to(WireState::Iterating));
        assert!(!WireState::Ended.can_transition_to(WireState::Iterating));
    }
}
