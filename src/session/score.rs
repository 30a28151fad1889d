use crate::session::SessionError;
use log::{debug, info, warn};
use matchday_api::client::ApiResult;
use matchday_api::{GoalSide, MatchSnapshot};

/// A goal write in flight: the absolute value sent for `side`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingGoal {
    pub side: GoalSide,
    pub sequence: u64,
    pub value: u32,
}

/// Optimistic scoreline with explicit reconciliation.
///
/// A recorded goal shows immediately. The value in the response then
/// replaces it once no other goal write is outstanding. A refused write
/// takes the goal back, and an unknown outcome keeps it but flags the
/// scoreline as unconfirmed until the next authoritative value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreKeeper {
    goals_for: u32,
    goals_against: u32,
    confirmed_for: u32,
    confirmed_against: u32,
    next_sequence: u64,
    latest_applied: u64,
    in_flight: u32,
    unconfirmed: bool,
}

impl ScoreKeeper {
    pub fn goals_for(&self) -> u32 {
        self.goals_for
    }

    pub fn goals_against(&self) -> u32 {
        self.goals_against
    }

    pub fn is_unconfirmed(&self) -> bool {
        self.unconfirmed
    }

    pub fn has_pending(&self) -> bool {
        self.in_flight > 0
    }

    /// Count the goal locally and return the write to send.
    pub fn record(&mut self, side: GoalSide) -> PendingGoal {
        let value = {
            let slot = self.slot(side);
            *slot = slot.saturating_add(1);
            *slot
        };
        self.next_sequence += 1;
        self.in_flight += 1;
        debug!("goal {} -> {value} as #{}", side.field(), self.next_sequence);
        PendingGoal { side, sequence: self.next_sequence, value }
    }

    /// Apply the answer to a goal write. Once the last outstanding write
    /// resolves, the shown score settles on the latest server value unless
    /// the outcome of this write is unknown.
    pub fn resolve(
        &mut self,
        pending: PendingGoal,
        result: ApiResult<MatchSnapshot>,
    ) -> Result<(), SessionError> {
        self.in_flight = self.in_flight.saturating_sub(1);
        let outcome = self.reconcile(pending, result);
        if self.in_flight == 0 && !matches!(outcome, Err(SessionError::TransportFailure(_))) {
            self.settle();
        }
        outcome
    }

    fn reconcile(
        &mut self,
        pending: PendingGoal,
        result: ApiResult<MatchSnapshot>,
    ) -> Result<(), SessionError> {
        match result {
            Ok(snapshot) if pending.sequence <= self.latest_applied => {
                debug!(
                    "discarding goal response #{} (latest #{}) for match {}",
                    pending.sequence, self.latest_applied, snapshot.id
                );
                Err(SessionError::StaleResponseDiscarded {
                    sequence: pending.sequence,
                    latest: self.latest_applied,
                })
            }
            Ok(snapshot) => {
                self.latest_applied = pending.sequence;
                self.apply_authoritative(snapshot.goals_scored, snapshot.goals_conceded);
                Ok(())
            }
            Err(err) if err.is_unauthorized() => {
                warn!("goal write unauthorized; restoring confirmed score");
                self.goals_for = self.confirmed_for;
                self.goals_against = self.confirmed_against;
                Err(SessionError::SessionInvalid)
            }
            Err(err) if err.is_rejection() => {
                let slot = self.slot(pending.side);
                *slot = slot.saturating_sub(1);
                warn!("goal write refused, rolled back {}: {err}", pending.side.field());
                Err(SessionError::Rejected(err.user_message()))
            }
            Err(err) => {
                self.unconfirmed = true;
                warn!("goal write outcome unknown, keeping local score: {err}");
                Err(SessionError::TransportFailure(err.user_message()))
            }
        }
    }

    /// Server values from a load, a response, or a push correction.
    /// While goal writes are outstanding only the confirmed baseline moves.
    pub fn apply_authoritative(&mut self, goals_for: u32, goals_against: u32) {
        self.confirmed_for = goals_for;
        self.confirmed_against = goals_against;
        if self.in_flight > 0 {
            debug!("score {goals_for}-{goals_against} held back, {} write(s) pending", self.in_flight);
            return;
        }
        self.settle();
    }

    /// Show the confirmed baseline.
    fn settle(&mut self) {
        let (goals_for, goals_against) = (self.confirmed_for, self.confirmed_against);
        if (self.goals_for, self.goals_against) != (goals_for, goals_against) {
            info!(
                "score corrected {}-{} -> {goals_for}-{goals_against}",
                self.goals_for, self.goals_against
            );
        }
        self.goals_for = goals_for;
        self.goals_against = goals_against;
        self.unconfirmed = false;
    }

    fn slot(&mut self, side: GoalSide) -> &mut u32 {
        match side {
            GoalSide::Scored => &mut self.goals_for,
            GoalSide::Conceded => &mut self.goals_against,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchday_api::MatchState;
    use matchday_api::client::ApiError;

    fn snapshot(goals_scored: u32, goals_conceded: u32) -> MatchSnapshot {
        MatchSnapshot {
            id: "7".into(),
            opponent: "Rovers".into(),
            state: MatchState::FirstHalf,
            elapsed_seconds: 600,
            goals_scored,
            goals_conceded,
            formation: None,
            opponent_formation: None,
        }
    }

    #[test]
    fn goal_shows_before_the_server_answers() {
        let mut score = ScoreKeeper::default();
        let pending = score.record(GoalSide::Scored);

        assert_eq!(pending.value, 1);
        assert_eq!(score.goals_for(), 1);
        assert!(score.has_pending());

        score.resolve(pending, Ok(snapshot(1, 0))).unwrap();
        assert_eq!((score.goals_for(), score.goals_against()), (1, 0));
        assert!(!score.has_pending());
    }

    #[test]
    fn response_value_replaces_the_optimistic_one() {
        let mut score = ScoreKeeper::default();
        let pending = score.record(GoalSide::Conceded);
        score.resolve(pending, Ok(snapshot(2, 3))).unwrap();
        assert_eq!((score.goals_for(), score.goals_against()), (2, 3));
    }

    #[test]
    fn refused_write_is_rolled_back() {
        let mut score = ScoreKeeper::default();
        score.apply_authoritative(1, 1);
        let pending = score.record(GoalSide::Scored);

        let err = score.resolve(
            pending,
            Err(ApiError::Api {
                status: 400,
                detail: Some("Match is finished.".into()),
                url: "u".into(),
            }),
        );

        assert_eq!(err, Err(SessionError::Rejected("Match is finished.".into())));
        assert_eq!(score.goals_for(), 1);
    }

    #[test]
    fn transport_failure_keeps_the_goal_but_flags_it() {
        let mut score = ScoreKeeper::default();
        let pending = score.record(GoalSide::Scored);

        let err = score.resolve(pending, Err(ApiError::Other("timed out".into())));

        assert!(matches!(err, Err(SessionError::TransportFailure(_))));
        assert_eq!(score.goals_for(), 1);
        assert!(score.is_unconfirmed());

        score.apply_authoritative(1, 0);
        assert!(!score.is_unconfirmed());
    }

    #[test]
    fn unauthorized_restores_the_confirmed_score() {
        let mut score = ScoreKeeper::default();
        score.apply_authoritative(2, 0);
        let pending = score.record(GoalSide::Scored);

        let err = score.resolve(pending, Err(ApiError::Unauthorized("u".into())));
        assert_eq!(err, Err(SessionError::SessionInvalid));
        assert_eq!(score.goals_for(), 2);
    }

    #[test]
    fn quick_double_goal_survives_out_of_order_answers() {
        let mut score = ScoreKeeper::default();
        let first = score.record(GoalSide::Scored);
        let second = score.record(GoalSide::Scored);
        assert_eq!(second.value, 2);

        score.resolve(second, Ok(snapshot(2, 0))).unwrap();
        assert_eq!(score.goals_for(), 2);
        assert!(matches!(
            score.resolve(first, Ok(snapshot(1, 0))),
            Err(SessionError::StaleResponseDiscarded { .. })
        ));
        assert_eq!(score.goals_for(), 2);
    }

    #[test]
    fn stale_last_answer_still_settles_on_the_server_score() {
        let mut score = ScoreKeeper::default();
        let first = score.record(GoalSide::Scored);
        let second = score.record(GoalSide::Scored);

        score.resolve(second, Ok(snapshot(3, 0))).unwrap();
        assert_eq!(score.goals_for(), 2);

        assert!(matches!(
            score.resolve(first, Ok(snapshot(2, 0))),
            Err(SessionError::StaleResponseDiscarded { .. })
        ));
        assert!(!score.has_pending());
        assert_eq!((score.goals_for(), score.goals_against()), (3, 0));
    }

    #[test]
    fn rejection_as_last_answer_settles_on_the_server_score() {
        let mut score = ScoreKeeper::default();
        let first = score.record(GoalSide::Scored);
        let second = score.record(GoalSide::Conceded);

        score.resolve(first, Ok(snapshot(1, 0))).unwrap();
        let refused = ApiError::Api { status: 400, detail: None, url: "u".into() };
        assert!(matches!(score.resolve(second, Err(refused)), Err(SessionError::Rejected(_))));
        assert_eq!((score.goals_for(), score.goals_against()), (1, 0));
    }

    #[test]
    fn push_correction_waits_for_pending_writes() {
        let mut score = ScoreKeeper::default();
        let pending = score.record(GoalSide::Scored);

        score.apply_authoritative(0, 1);
        assert_eq!((score.goals_for(), score.goals_against()), (1, 0));

        score.resolve(pending, Ok(snapshot(1, 1))).unwrap();
        assert_eq!((score.goals_for(), score.goals_against()), (1, 1));
    }
}
