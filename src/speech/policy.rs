use std::time::Duration;

use tokio::time::Instant;

use crate::analysis::Verdict;

const NUDGE_PREFIX: &str = "You are probably not being productive.";
const DEFAULT_ENCOURAGEMENT: &str = "Good job! Keep up the great work.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utterance {
    Nudge(String),
    Encouragement(String),
}

impl Utterance {
    pub fn text(&self) -> &str {
        match self {
            Utterance::Nudge(text) | Utterance::Encouragement(text) => text,
        }
    }
}

/// Decides what to say after each verdict: a nudge every time the user is
/// off task, encouragement only once a productive streak has lasted
/// `interval` since it started or since the last encouragement.
#[derive(Debug, Clone)]
pub struct EncouragementPolicy {
    interval: Duration,
    streak_started: Instant,
    last_spoken: Option<Instant>,
}

impl EncouragementPolicy {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            streak_started: now,
            last_spoken: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn on_verdict(&mut self, verdict: &Verdict, now: Instant) -> Option<Utterance> {
        if !verdict.productive {
            self.streak_started = now;
            self.last_spoken = None;
            let message = if verdict.reason.is_empty() {
                NUDGE_PREFIX.to_string()
            } else {
                format!("{NUDGE_PREFIX} {}", verdict.reason)
            };
            return Some(Utterance::Nudge(message));
        }

        if self.remaining(now) > Duration::ZERO {
            return None;
        }

        self.last_spoken = Some(now);
        let message = if verdict.reason.is_empty() {
            DEFAULT_ENCOURAGEMENT.to_string()
        } else {
            verdict.reason.clone()
        };
        Some(Utterance::Encouragement(message))
    }

    /// Time left before a productive verdict earns encouragement.
    pub fn remaining(&self, now: Instant) -> Duration {
        let since = self.last_spoken.unwrap_or(self.streak_started);
        self.interval.saturating_sub(now.saturating_duration_since(since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(productive: bool, reason: &str) -> Verdict {
        Verdict {
            productive,
            reason: reason.into(),
            raw: String::new(),
        }
    }

    #[test]
    fn nudges_on_every_unproductive_verdict() {
        let start = Instant::now();
        let mut policy = EncouragementPolicy::new(Duration::from_secs(600), start);

        let said = policy.on_verdict(&verdict(false, "Hey, I noticed your phone."), start);
        assert_eq!(
            said,
            Some(Utterance::Nudge(
                "You are probably not being productive. Hey, I noticed your phone.".into()
            ))
        );
        assert!(policy.on_verdict(&verdict(false, ""), start).is_some());
    }

    #[test]
    fn encouragement_waits_for_a_sustained_streak() {
        let start = Instant::now();
        let mut policy = EncouragementPolicy::new(Duration::from_secs(600), start);

        let early = start + Duration::from_secs(300);
        assert_eq!(policy.on_verdict(&verdict(true, "Nice work!"), early), None);
        assert_eq!(policy.remaining(early), Duration::from_secs(300));

        let due = start + Duration::from_secs(600);
        assert_eq!(
            policy.on_verdict(&verdict(true, "Nice work!"), due),
            Some(Utterance::Encouragement("Nice work!".into()))
        );

        // cadence restarts from the last encouragement
        let soon_after = due + Duration::from_secs(60);
        assert_eq!(policy.on_verdict(&verdict(true, "Nice work!"), soon_after), None);
    }

    #[test]
    fn nudge_resets_the_streak() {
        let start = Instant::now();
        let mut policy = EncouragementPolicy::new(Duration::from_secs(600), start);

        let slip = start + Duration::from_secs(590);
        policy.on_verdict(&verdict(false, "distracted"), slip);

        let later = start + Duration::from_secs(700);
        assert_eq!(policy.on_verdict(&verdict(true, "back at it"), later), None);
        assert_eq!(policy.remaining(later), Duration::from_secs(490));
    }

    #[test]
    fn empty_reason_uses_default_phrase() {
        let start = Instant::now();
        let mut policy = EncouragementPolicy::new(Duration::ZERO, start);
        assert_eq!(
            policy.on_verdict(&verdict(true, ""), start),
            Some(Utterance::Encouragement(DEFAULT_ENCOURAGEMENT.into()))
        );
    }
}
