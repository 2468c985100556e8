use http::HeaderMap;
use url::Url;

/// Client-side state for one logical stream.
///
/// Owned exclusively by the driver task for the lifetime of the client. The
/// `stream_id` is generated once and stays constant across reconnections so
/// the server can correlate retries to the same logical session;
/// `last_event_id` only ever moves forward.
#[derive(Debug)]
pub(crate) struct StreamSession {
    pub(crate) stream_id: String,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) last_event_id: Option<String>,
}

impl StreamSession {
    pub(crate) fn new(url: Url, headers: HeaderMap) -> Self {
        Self {
            stream_id: generate_stream_id(),
            url,
            headers,
            last_event_id: None,
        }
    }

    /// Connection URL for the next attempt, with resumption parameters.
    ///
    /// Appends `last-event-id` (when one has been seen) and `stream-id` to
    /// the configured URL's query string.
    pub(crate) fn resume_url(&self) -> Url {
        let mut url = self.url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(id) = &self.last_event_id {
                pairs.append_pair("last-event-id", id);
            }
            pairs.append_pair("stream-id", &self.stream_id);
        }
        url
    }
}

/// Opaque per-client identifier, 128 bits of randomness as hex.
fn generate_stream_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(url: &str) -> StreamSession {
        StreamSession::new(Url::parse(url).expect("valid url"), HeaderMap::new())
    }

    #[test]
    fn test_resume_url_without_last_event_id() {
        let session = session("http://example.com/stream");
        let url = session.resume_url();

        let query = url.query().expect("query string");
        assert!(!query.contains("last-event-id"));
        assert!(query.contains(&format!("stream-id={}", session.stream_id)));
    }

    #[test]
    fn test_resume_url_with_last_event_id() {
        let mut session = session("http://example.com/stream");
        session.last_event_id = Some("evt-7".to_string());
        let url = session.resume_url();

        let query = url.query().expect("query string");
        assert!(query.contains("last-event-id=evt-7"));
        assert!(query.contains("stream-id="));
    }

    #[test]
    fn test_resume_url_preserves_existing_query() {
        let session = session("http://example.com/stream?channel=ticks");
        let url = session.resume_url();

        let query = url.query().expect("query string");
        assert!(query.contains("channel=ticks"));
        assert!(query.contains("stream-id="));
    }

    #[test]
    fn test_stream_id_constant_across_attempts() {
        let mut session = session("http://example.com/stream");
        let first = session.resume_url();
        session.last_event_id = Some("evt-1".to_string());
        let second = session.resume_url();

        let id_of = |url: &Url| {
            url.query_pairs()
                .find(|(k, _)| k == "stream-id")
                .map(|(_, v)| v.into_owned())
                .expect("stream-id present")
        };
        assert_eq!(id_of(&first), id_of(&second));
    }
}
