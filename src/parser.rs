//! Line-level parser for the push protocol.
//!
//! Raw lines are classified by their leading token (`data: `, `event: `,
//! `id: `) and turned into [`MessageRecord`]s. Unrecognized lines are
//! ignored so protocol extensions never break the client.

/// One structured message produced from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Event type, `"message"` unless an `event:` line declared otherwise
    pub event_type: String,
    /// Raw payload string
    pub payload: String,
    /// Resumption id in effect when this record was produced
    pub event_id: Option<String>,
}

/// Default event type for untyped records
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// Stateful line classifier.
///
/// Holds the pending `event:` type between lines. The protocol here does not
/// use blank-line event framing: a `data:` line dispatches immediately, and a
/// claimed `event:` line dispatches on its own (see [`parse_line`]).
///
/// [`parse_line`]: StreamParser::parse_line
#[derive(Debug, Default)]
pub(crate) struct StreamParser {
    /// Event type declared by the most recent `event:` line, consumed by the
    /// next record and cleared by a blank line
    pending_event: Option<String>,
}

impl StreamParser {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed one raw protocol line (newline already stripped).
    ///
    /// `last_event_id` is advanced in place the moment an `id:` line is seen,
    /// independent of whether any record is later delivered or buffered.
    /// `claims_type` reports which event types the consumer registered a
    /// typed handler for; those dispatch synthetically from the `event:`
    /// line alone, without waiting for a `data:` line.
    pub(crate) fn parse_line(
        &mut self,
        line: &str,
        last_event_id: &mut Option<String>,
        claims_type: impl Fn(&str) -> bool,
    ) -> Option<MessageRecord> {
        if line.is_empty() {
            self.pending_event = None;
            return None;
        }

        if let Some(payload) = line.strip_prefix("data: ") {
            let event_type = self
                .pending_event
                .take()
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string());
            return Some(MessageRecord {
                event_type,
                payload: payload.to_string(),
                event_id: last_event_id.clone(),
            });
        }

        if let Some(event_type) = line.strip_prefix("event: ") {
            self.pending_event = Some(event_type.to_string());
            if claims_type(event_type) {
                return Some(MessageRecord {
                    event_type: event_type.to_string(),
                    payload: String::new(),
                    event_id: last_event_id.clone(),
                });
            }
            return None;
        }

        if let Some(id) = line.strip_prefix("id: ") {
            *last_event_id = Some(id.to_string());
            return None;
        }

        // Unrecognized line, ignore
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_claims(_: &str) -> bool {
        false
    }

    #[test]
    fn test_data_line_yields_message_record() {
        let mut parser = StreamParser::new();
        let mut id = None;

        let record = parser
            .parse_line("data: hello", &mut id, no_claims)
            .expect("record");
        assert_eq!(record.event_type, "message");
        assert_eq!(record.payload, "hello");
        assert_eq!(record.event_id, None);
    }

    #[test]
    fn test_event_line_types_next_data_line() {
        let mut parser = StreamParser::new();
        let mut id = None;

        assert!(parser.parse_line("event: trade", &mut id, no_claims).is_none());
        let record = parser
            .parse_line("data: {\"px\":1}", &mut id, no_claims)
            .expect("record");
        assert_eq!(record.event_type, "trade");

        // Pending type is consumed by the record it typed
        let record = parser
            .parse_line("data: next", &mut id, no_claims)
            .expect("record");
        assert_eq!(record.event_type, "message");
    }

    #[test]
    fn test_blank_line_clears_pending_event() {
        let mut parser = StreamParser::new();
        let mut id = None;

        parser.parse_line("event: trade", &mut id, no_claims);
        parser.parse_line("", &mut id, no_claims);
        let record = parser
            .parse_line("data: x", &mut id, no_claims)
            .expect("record");
        assert_eq!(record.event_type, "message");
    }

    #[test]
    fn test_id_line_advances_immediately() {
        let mut parser = StreamParser::new();
        let mut id = None;

        assert!(parser.parse_line("id: evt-42", &mut id, no_claims).is_none());
        // Advanced even though no record was produced yet
        assert_eq!(id.as_deref(), Some("evt-42"));

        let record = parser
            .parse_line("data: payload", &mut id, no_claims)
            .expect("record");
        assert_eq!(record.event_id.as_deref(), Some("evt-42"));
    }

    #[test]
    fn test_claimed_event_dispatches_without_data() {
        let mut parser = StreamParser::new();
        let mut id = None;

        let record = parser
            .parse_line("event: ping", &mut id, |t| t == "ping")
            .expect("synthetic record");
        assert_eq!(record.event_type, "ping");
        assert!(record.payload.is_empty());

        // Unclaimed types still wait for a data line
        assert!(parser
            .parse_line("event: other", &mut id, |t| t == "ping")
            .is_none());
    }

    #[test]
    fn test_unrecognized_lines_ignored() {
        let mut parser = StreamParser::new();
        let mut id = None;

        assert!(parser.parse_line(": comment", &mut id, no_claims).is_none());
        assert!(parser.parse_line("retry: 3000", &mut id, no_claims).is_none());
        assert!(parser
            .parse_line("garbage without colon", &mut id, no_claims)
            .is_none());
        assert_eq!(id, None);
    }
}
