//! Context window assembly
//!
//! Given an ever-growing transcript and a hard token budget, the assembler
//! decides which turns go into the next request. The policy is a sliding
//! recency window:
//!
//! - the system turn is pinned: if present it is always included, never
//!   evicted under budget pressure (callers must ensure it fits on its own);
//! - the pending user turn is always included verbatim, even when it alone
//!   exceeds the budget (avoiding that is the caller's job);
//! - history is walked newest-first and turns are accepted while they fit;
//!   the first turn that does not fit terminates the walk. Older turns are
//!   never considered once one is rejected, so the selection is always a
//!   contiguous suffix of the transcript.
//!
//! The trade-off is deliberate: one very long turn can block older, cheaper
//! turns from inclusion, in exchange for a policy that is trivial to reason
//! about and guarantees the freshest context survives truncation.

use crate::config::ConfigError;
use crate::estimate::{LengthEstimator, TURN_OVERHEAD};
use crate::types::Turn;

/// Information about how full the assembled window is
#[derive(Debug, Clone)]
pub struct WindowUsage {
    /// Estimated token cost of the assembled window (contents + framing)
    pub estimated_tokens: usize,
    /// The budget the window was assembled against
    pub budget: usize,
    /// History turns that made it into the window
    pub selected_turns: usize,
    /// Turns in the full history
    pub total_turns: usize,
}

impl WindowUsage {
    /// Fraction of the budget consumed (0.0 - 1.0+)
    pub fn ratio(&self) -> f32 {
        if self.budget == 0 {
            return 0.0;
        }
        self.estimated_tokens as f32 / self.budget as f32
    }
}

/// Assembles bounded context windows from a transcript
pub struct WindowAssembler {
    estimator: Box<dyn LengthEstimator>,
    budget: usize,
}

impl WindowAssembler {
    /// Create an assembler with a history budget in tokens
    ///
    /// A zero budget is a configuration error: it would make every window
    /// degenerate and always indicates a misconfigured model profile.
    pub fn new(estimator: Box<dyn LengthEstimator>, budget: usize) -> Result<Self, ConfigError> {
        if budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        Ok(Self { estimator, budget })
    }

    /// The history budget this assembler enforces
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Cost of one turn: content estimate plus per-turn framing overhead
    pub fn turn_cost(&self, turn: &Turn) -> usize {
        self.estimator.estimate(&turn.content) + TURN_OVERHEAD
    }

    /// Build the ordered turn list to submit
    ///
    /// Output order is `[system?] ++ selected history (oldest first) ++
    /// [pending?]`. Pure with respect to its inputs: calling it twice with
    /// the same arguments yields the same window.
    pub fn assemble(
        &self,
        history: &[Turn],
        system: Option<&Turn>,
        pending: Option<&Turn>,
    ) -> Vec<Turn> {
        let selected = self.select_history(history, system, pending);

        let mut window = Vec::with_capacity(selected.len() + 2);
        if let Some(system) = system {
            window.push(system.clone());
        }
        window.extend(selected.iter().rev().map(|&turn| turn.clone()));
        if let Some(pending) = pending {
            window.push(pending.clone());
        }
        window
    }

    /// Usage statistics for the window `assemble` would produce
    pub fn usage(
        &self,
        history: &[Turn],
        system: Option<&Turn>,
        pending: Option<&Turn>,
    ) -> WindowUsage {
        let selected = self.select_history(history, system, pending);
        let pinned_cost: usize = system
            .iter()
            .chain(pending.iter())
            .map(|turn| self.turn_cost(turn))
            .sum();
        let estimated_tokens =
            pinned_cost + selected.iter().map(|turn| self.turn_cost(turn)).sum::<usize>();

        WindowUsage {
            estimated_tokens,
            budget: self.budget,
            selected_turns: selected.len(),
            total_turns: history.len(),
        }
    }

    /// Select the history suffix that fits, newest-first order
    fn select_history<'a>(
        &self,
        history: &'a [Turn],
        system: Option<&Turn>,
        pending: Option<&Turn>,
    ) -> Vec<&'a Turn> {
        // The pinned turns are charged up front; history competes for what
        // remains.
        let mut cost: usize = system
            .iter()
            .chain(pending.iter())
            .map(|turn| self.turn_cost(turn))
            .sum();

        let mut selected = Vec::new();
        for turn in history.iter().rev() {
            let candidate = cost + self.turn_cost(turn);
            if candidate < self.budget {
                selected.push(turn);
                cost = candidate;
            } else {
                // Monotonic truncation: once a turn is rejected, everything
                // older is dropped too.
                break;
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::CharacterEstimator;
    use crate::types::Role;

    /// One char = one token, so content lengths are exact costs
    fn assembler(budget: usize) -> WindowAssembler {
        WindowAssembler::new(
            Box::new(CharacterEstimator::with_chars_per_token(1)),
            budget,
        )
        .unwrap()
    }

    fn turn_of_len(len: usize) -> Turn {
        Turn::user("x".repeat(len))
    }

    #[test]
    fn test_zero_budget_is_rejected() {
        let result = WindowAssembler::new(Box::new(CharacterEstimator::new()), 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_transcript_yields_pinned_turns_only() {
        let assembler = assembler(100);
        let system = Turn::system("persona");
        let pending = Turn::user("hi");

        let window = assembler.assemble(&[], Some(&system), Some(&pending));
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].role, Role::System);
        assert_eq!(window[1].content, "hi");

        assert!(assembler.assemble(&[], None, None).is_empty());
    }

    #[test]
    fn test_spec_scenario_budget_50() {
        // budget=50, system cost 10, pending cost 5,
        // history A(40), B(3), C(2) oldest-to-newest.
        // Walking newest-first: C fits, B fits, A does not -> [B, C].
        let assembler = assembler(50);
        let system = Turn::system("x".repeat(10));
        let pending = Turn::user("x".repeat(5));
        let history = vec![
            Turn::user("A".repeat(40)),
            Turn::assistant("B".repeat(3)),
            Turn::user("C".repeat(2)),
        ];

        let window = assembler.assemble(&history, Some(&system), Some(&pending));
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].role, Role::System);
        assert_eq!(window[1].content, "BBB");
        assert_eq!(window[2].content, "CC");
        assert_eq!(window[3].content, "xxxxx");
    }

    #[test]
    fn test_never_exceeds_budget_except_pinned() {
        let assembler = assembler(40);
        let history: Vec<Turn> = (0..20).map(|_| turn_of_len(7)).collect();

        let window = assembler.assemble(&history, None, None);
        let cost: usize = window.iter().map(|t| assembler.turn_cost(t)).sum();
        assert!(cost < 40, "selected cost {} must stay under budget", cost);
        assert!(!window.is_empty());
    }

    #[test]
    fn test_selection_is_contiguous_suffix() {
        let assembler = assembler(60);
        let history: Vec<Turn> = (0..10)
            .map(|i| Turn::user(format!("{:0>6}", i))) // each cost 6 + 4 overhead
            .collect();

        let window = assembler.assemble(&history, None, None);
        // 60 budget / 10 per turn -> 5 accepted strictly under budget
        let expected: Vec<&Turn> = history.iter().skip(history.len() - window.len()).collect();
        let got: Vec<&Turn> = window.iter().collect();
        assert_eq!(
            got.iter().map(|t| &t.content).collect::<Vec<_>>(),
            expected.iter().map(|t| &t.content).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_oversized_middle_turn_blocks_older_history() {
        let assembler = assembler(30);
        let history = vec![
            turn_of_len(1), // old, cheap, but unreachable
            turn_of_len(500),
            turn_of_len(1),
            turn_of_len(1),
        ];

        let window = assembler.assemble(&history, None, None);
        // The walk stops at the 500-char turn; the cheap oldest turn is lost.
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_oversized_pending_turn_is_still_included() {
        let assembler = assembler(10);
        let pending = turn_of_len(1000);

        let window = assembler.assemble(&[turn_of_len(2)], None, Some(&pending));
        // Pending blew the budget by itself: history is squeezed out entirely
        // but the pending turn is returned verbatim.
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].content.len(), 1000);
    }

    #[test]
    fn test_system_turn_is_pinned() {
        let assembler = assembler(20);
        let system = Turn::system("x".repeat(100));

        let window = assembler.assemble(&[turn_of_len(2)], Some(&system), None);
        assert_eq!(window[0].role, Role::System);
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let assembler = assembler(50);
        let system = Turn::system("sys");
        let pending = Turn::user("pending");
        let history = vec![turn_of_len(8), turn_of_len(8), turn_of_len(8)];

        let first = assembler.assemble(&history, Some(&system), Some(&pending));
        let second = assembler.assemble(&history, Some(&system), Some(&pending));
        assert_eq!(first, second);
        // The history slice itself is untouched
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_usage_reports_selection() {
        let assembler = assembler(60);
        let history: Vec<Turn> = (0..10).map(|_| turn_of_len(6)).collect();

        let usage = assembler.usage(&history, None, None);
        assert_eq!(usage.total_turns, 10);
        assert!(usage.selected_turns < 10);
        assert!(usage.estimated_tokens < usage.budget);
        assert!(usage.ratio() > 0.0 && usage.ratio() < 1.0);
    }
}
