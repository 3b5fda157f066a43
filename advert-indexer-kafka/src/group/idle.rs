//! Idle detection for error consumer groups.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::state::{HandlerSnapshot, HandlerStatus, TopicState, TopicStatus};

/// Thresholds after which an error group partition counts as idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleThresholds {
    pub no_message: Duration,
    pub message_too_fresh: Duration,
}

fn elapsed_over(since: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold: Duration) -> bool {
    since
        .and_then(|t| (now - t).to_std().ok())
        .is_some_and(|elapsed| elapsed > threshold)
}

/// Whether a single partition is idle.
///
/// A partition parked on a too-fresh message is idle. A closed partition of a
/// handler that is still running is not; only a closed handler ends the group.
pub fn is_partition_idle(state: &TopicState, thresholds: &IdleThresholds, now: DateTime<Utc>) -> bool {
    match state.status {
        TopicStatus::NewMessage => true,
        TopicStatus::Closed => false,
        TopicStatus::Created => elapsed_over(Some(state.created_at), now, thresholds.no_message),
        TopicStatus::Listening => {
            elapsed_over(state.listening_at.or(Some(state.created_at)), now, thresholds.no_message)
        }
        TopicStatus::Started => {
            elapsed_over(state.latest_consumed_at, now, thresholds.no_message)
                || elapsed_over(state.latest_consumed_at, now, thresholds.message_too_fresh)
        }
    }
}

/// Whether the monitor should unsubscribe the group.
///
/// True once the handler is closed, or when it has claimed partitions and
/// every one of them is idle.
pub fn should_unsubscribe(snapshot: &HandlerSnapshot, thresholds: &IdleThresholds, now: DateTime<Utc>) -> bool {
    if snapshot.status == HandlerStatus::Closed {
        return true;
    }
    !snapshot.topics.is_empty()
        && snapshot
            .topics
            .iter()
            .all(|state| is_partition_idle(state, thresholds, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ConsumerGroupHandlerState, TopicPartition};
    use chrono::Duration as ChronoDuration;

    const THRESHOLDS: IdleThresholds = IdleThresholds {
        no_message: Duration::from_secs(60),
        message_too_fresh: Duration::from_secs(30),
    };

    fn tp(partition: i32) -> TopicPartition {
        TopicPartition::new("advert.error", partition)
    }

    #[test]
    fn test_single_active_partition_blocks_unsubscribe() {
        let start = Utc::now();
        let state = ConsumerGroupHandlerState::new("g", start);
        state.setup([tp(0), tp(1)], start);
        state.mark_listening(&tp(0), start);
        state.mark_listening(&tp(1), start);

        let now = start + ChronoDuration::minutes(5);
        state.record_message(&tp(1), 10, TopicStatus::Started, now - ChronoDuration::seconds(1));

        assert!(!should_unsubscribe(&state.snapshot(), &THRESHOLDS, now));
    }

    #[test]
    fn test_all_idle_partitions_unsubscribe() {
        let start = Utc::now();
        let state = ConsumerGroupHandlerState::new("g", start);
        state.setup([tp(0), tp(1), tp(2)], start);
        state.mark_listening(&tp(1), start);
        state.record_message(&tp(2), 3, TopicStatus::Started, start);

        let now = start + ChronoDuration::seconds(61);
        assert!(should_unsubscribe(&state.snapshot(), &THRESHOLDS, now));
    }

    #[test]
    fn test_started_uses_shorter_threshold() {
        let start = Utc::now();
        let state = ConsumerGroupHandlerState::new("g", start);
        state.setup([tp(0)], start);
        state.record_message(&tp(0), 1, TopicStatus::Started, start);

        assert!(!should_unsubscribe(&state.snapshot(), &THRESHOLDS, start + ChronoDuration::seconds(20)));
        assert!(should_unsubscribe(&state.snapshot(), &THRESHOLDS, start + ChronoDuration::seconds(31)));
    }

    #[test]
    fn test_new_message_counts_as_idle() {
        let start = Utc::now();
        let state = ConsumerGroupHandlerState::new("g", start);
        state.setup([tp(0)], start);
        state.record_message(&tp(0), 1, TopicStatus::NewMessage, start);

        assert!(should_unsubscribe(&state.snapshot(), &THRESHOLDS, start));
    }

    #[test]
    fn test_closed_partition_of_running_handler_blocks_unsubscribe() {
        let start = Utc::now();
        let state = ConsumerGroupHandlerState::new("g", start);
        state.setup([tp(0), tp(1)], start);
        state.record_message(&tp(0), 1, TopicStatus::NewMessage, start);
        state.close_partition(&tp(1), start);

        let now = start + ChronoDuration::minutes(5);
        assert!(!should_unsubscribe(&state.snapshot(), &THRESHOLDS, now));
    }

    #[test]
    fn test_closed_handler_unsubscribes_and_no_claims_do_not() {
        let start = Utc::now();
        let state = ConsumerGroupHandlerState::new("g", start);
        assert!(!should_unsubscribe(&state.snapshot(), &THRESHOLDS, start + ChronoDuration::hours(1)));

        state.close(start);
        assert!(should_unsubscribe(&state.snapshot(), &THRESHOLDS, start));
    }
}
