//! Orchestration of the batch lookup run.
//!
//! group → per batch: build → throttle → post → parse, strictly one batch
//! at a time. Results accumulate in batch order; within a batch, order is
//! whatever the response document yielded, but every record stays
//! addressable by its batch key.

use std::time::Duration;

use crate::batch::group;
use crate::request::RequestBuilder;
use crate::response::{self, ResultRecord};
use crate::throttle::Throttle;
use crate::transport::Transport;
use crate::{AmrError, LookupRecord};

/// Progress events emitted once per batch step.
#[derive(Debug, Clone)]
pub enum LookupProgress {
    /// Emitted before the throttle sleeps.
    Throttled { wait: Duration },
    BatchStarted { index: usize, total: usize },
    BatchComplete { index: usize, records: usize },
}

pub struct Pipeline<T: Transport> {
    builder: RequestBuilder,
    transport: T,
    throttle: Throttle,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(builder: RequestBuilder, transport: T, throttle: Throttle) -> Self {
        Self {
            builder,
            transport,
            throttle,
        }
    }

    /// Run the full lookup, returning `(batch key, record)` pairs in batch
    /// order.
    ///
    /// Transport and protocol errors abort the run; an empty-but-successful
    /// batch contributes nothing and processing continues.
    pub async fn run(
        &mut self,
        records: Vec<LookupRecord>,
        key_field: &str,
        batch_size: usize,
        mut on_progress: impl FnMut(LookupProgress),
    ) -> Result<Vec<(String, ResultRecord)>, AmrError> {
        let batches = group(records, batch_size)?;
        let total = batches.len();
        let mut results = Vec::new();

        for (idx, batch) in batches.iter().enumerate() {
            // Throttle accounting is 1-based.
            let index = idx + 1;
            let xml = self.builder.build(batch, key_field)?;

            if let Some(wait) = self.throttle.required_pause(index as u32, batch_size as u32) {
                on_progress(LookupProgress::Throttled { wait });
                self.throttle.pause(wait).await;
            }

            on_progress(LookupProgress::BatchStarted { index, total });
            tracing::debug!(batch = index, total, "posting batch");

            let body = self.transport.post(xml).await?;
            let parsed = response::parse(&body)?;

            on_progress(LookupProgress::BatchComplete {
                index,
                records: parsed.len(),
            });
            results.extend(parsed);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::request::{Credentials, LookupKind};

    /// Canned transport: records every posted body, replays responses in
    /// order (repeating the last when exhausted).
    struct MockTransport {
        requests: Mutex<Vec<String>>,
        responses: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn new(responses: Vec<&str>) -> Self {
            assert!(!responses.is_empty());
            Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            }
        }

        fn single(response: &str) -> Self {
            Self::new(vec![response])
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for &MockTransport {
        async fn post(&self, body: String) -> Result<String, AmrError> {
            self.requests.lock().unwrap().push(body);
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                Ok(responses.remove(0))
            } else {
                Ok(responses[0].clone())
            }
        }
    }

    /// Transport that always fails with an HTTP error.
    struct FailingTransport;

    impl Transport for FailingTransport {
        async fn post(&self, _body: String) -> Result<String, AmrError> {
            Err(AmrError::Http {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            })
        }
    }

    fn pipeline(transport: &MockTransport, cap: u32) -> Pipeline<&MockTransport> {
        let builder = RequestBuilder::new(
            LookupKind::Ids,
            Credentials {
                username: "user".into(),
                password: "secret".into(),
            },
        );
        Pipeline::new(builder, transport, Throttle::new(cap))
    }

    const RESPONSE_TWO_HITS: &str = r#"<response xmlns="http://www.isinet.com/xrpc41">
 <fn rc="OK" name="LinksAMR.retrieve">
  <map>
   <map name="0">
    <map name="WOS">
     <val name="ut">000081510800006</val>
     <val name="timesCited">3</val>
    </map>
   </map>
   <map name="1">
    <map name="WOS">
     <val name="ut">000087045000005</val>
    </map>
   </map>
  </map>
 </fn>
</response>"#;

    const RESPONSE_EMPTY: &str = r#"<response xmlns="http://www.isinet.com/xrpc41">
 <fn rc="OK" name="LinksAMR.retrieve">
  <map/>
 </fn>
</response>"#;

    #[tokio::test(start_paused = true)]
    async fn two_ut_rows_make_one_batch_with_positional_keys() {
        let transport = MockTransport::single(RESPONSE_TWO_HITS);
        let records = vec![
            LookupRecord::from_pairs([("ut", "01234")]),
            LookupRecord::from_pairs([("ut", "02394")]),
        ];

        let mut events = Vec::new();
        let results = pipeline(&transport, 300)
            .run(records, "id", 50, |e| events.push(e))
            .await
            .unwrap();

        // Exactly one request, containing exactly two positionally-keyed maps.
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let xml = &requests[0];
        assert_eq!(xml.matches("<map name=\"").count(), 2);
        assert!(xml.contains(r#"<map name="0">"#));
        assert!(xml.contains(r#"<map name="1">"#));
        assert!(xml.contains(r#"<val name="ut">01234</val>"#));
        assert!(xml.contains(r#"<val name="ut">02394</val>"#));

        assert_eq!(results.len(), 2);
        let keys: Vec<&str> = results.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"0") && keys.contains(&"1"));

        assert!(matches!(
            events[0],
            LookupProgress::BatchStarted { index: 1, total: 1 }
        ));
        assert!(matches!(
            events[1],
            LookupProgress::BatchComplete {
                index: 1,
                records: 2
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn batches_accumulate_in_order() {
        let batch1 = r#"<response xmlns="http://www.isinet.com/xrpc41">
 <fn rc="OK" name="LinksAMR.retrieve">
  <map><map name="a"><map name="WOS"><val name="ut">1</val></map></map></map>
 </fn>
</response>"#;
        let batch2 = r#"<response xmlns="http://www.isinet.com/xrpc41">
 <fn rc="OK" name="LinksAMR.retrieve">
  <map><map name="b"><map name="WOS"><val name="ut">2</val></map></map></map>
 </fn>
</response>"#;
        let transport = MockTransport::new(vec![batch1, batch2]);
        let records = vec![
            LookupRecord::from_pairs([("id", "a"), ("doi", "10.1/x")]),
            LookupRecord::from_pairs([("id", "b"), ("doi", "10.1/y")]),
        ];

        let results = pipeline(&transport, 300)
            .run(records, "id", 1, |_| {})
            .await
            .unwrap();

        assert_eq!(transport.requests().len(), 2);
        assert_eq!(results[0].0, "a");
        assert_eq!(results[1].0, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batches_contribute_nothing_and_continue() {
        let transport = MockTransport::new(vec![RESPONSE_EMPTY, RESPONSE_TWO_HITS]);
        let records = vec![
            LookupRecord::from_pairs([("ut", "0")]),
            LookupRecord::from_pairs([("ut", "1")]),
        ];

        let results = pipeline(&transport, 300)
            .run(records, "id", 1, |_| {})
            .await
            .unwrap();

        // First batch was an all-miss; second still ran and contributed.
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(results.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_aborts_the_run() {
        let transport = MockTransport::single("<response><fn></response>");
        let records = vec![LookupRecord::from_pairs([("ut", "0")])];

        let err = pipeline(&transport, 300)
            .run(records, "id", 50, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, AmrError::Protocol { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_aborts_the_run() {
        let builder = RequestBuilder::new(
            LookupKind::Ids,
            Credentials {
                username: "user".into(),
                password: "secret".into(),
            },
        );
        let mut pipeline = Pipeline::new(builder, FailingTransport, Throttle::new(300));
        let records = vec![LookupRecord::from_pairs([("ut", "0")])];

        let err = pipeline.run(records, "id", 50, |_| {}).await.unwrap_err();
        assert!(matches!(err, AmrError::Http { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_event_precedes_the_pause() {
        let transport = MockTransport::single(RESPONSE_EMPTY);
        let records = (0..4)
            .map(|i| LookupRecord::from_pairs([("ut", i.to_string().as_str())]))
            .collect();

        let mut events = Vec::new();
        pipeline(&transport, 2)
            .run(records, "id", 2, |e| events.push(e))
            .await
            .unwrap();

        // Batch 2 pushes the run to 4 records against a 2/min cap: paused
        // for the remainder of the first window plus one second.
        let throttled: Vec<&LookupProgress> = events
            .iter()
            .filter(|e| matches!(e, LookupProgress::Throttled { .. }))
            .collect();
        assert_eq!(throttled.len(), 1);
        match throttled[0] {
            LookupProgress::Throttled { wait } => {
                assert_eq!(*wait, Duration::from_secs(61));
            }
            _ => unreachable!(),
        }
    }
}
