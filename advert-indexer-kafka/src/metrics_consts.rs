// ==== Message processing ====
/// Counter for messages handed to a consumer, labelled by topic and `status` (success|failure|timeout)
pub const MESSAGES_CONSUMED: &str = "kafka_messages_consumed_total";

/// Histogram for consumer invocation time in seconds, labelled by topic
pub const MESSAGE_PROCESSING_DURATION: &str = "kafka_message_processing_duration_seconds";

// ==== Escalation ====
/// Counter for failed messages published to their next stage, labelled by `source` and `target` topic
pub const MESSAGES_ESCALATED: &str = "kafka_messages_escalated_total";

/// Counter for escalation publishes that failed, labelled by `source` and `target` topic
pub const ESCALATION_PUBLISH_FAILED: &str = "kafka_escalation_publish_failed_total";

/// Counter for messages dropped permanently, labelled by topic and `reason`
pub const MESSAGES_DROPPED: &str = "kafka_messages_dropped_total";

// ==== Error groups ====
/// Counter for error-topic messages skipped as too fresh, labelled by topic
pub const MESSAGES_TOO_FRESH: &str = "kafka_error_messages_too_fresh_total";

/// Counter for error consumer group subscribe/unsubscribe transitions, labelled by `group_id` and `action`
pub const ERROR_GROUP_TRANSITIONS: &str = "kafka_error_group_transitions_total";

// ==== Drop reasons ====
pub const DROP_NO_TARGET: &str = "no_target";
pub const DROP_RETRIES_EXHAUSTED: &str = "retries_exhausted";
pub const DROP_MAX_ERROR_COUNT: &str = "max_error_count";
pub const DROP_NO_CONSUMER: &str = "no_consumer";
pub const DROP_UNHANDLED_TOPIC: &str = "unhandled_topic";
