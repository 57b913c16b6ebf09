use std::collections::HashSet;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use sidekick_model::{
    AssistantMessage, ErrorKind, ModelFinishReason, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
};
use tracing::Instrument;

/// A callback that receives text deltas as the model streams them.
pub type TranscriptFn = Arc<dyn Fn(&str) + Send + Sync>;

type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, Option<TranscriptFn>) -> BoxedSendRequestFuture
        + Send + Sync
>;

/// A wrapper around a model provider that collects streamed responses and
/// provides a type-erased interface for the other modules.
///
/// Requests failing with a transient error (see
/// [`ErrorKind::is_transient`]) are sent again with an exponential backoff,
/// unless some text has already been delivered to the transcript callback.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    retry_budget: Duration,
}

impl ModelClient {
    /// Creates a client for `provider`.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_transcript| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_transcript).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            handler_fn,
            retry_budget: Duration::from_secs(30),
        }
    }

    /// Sets how long transient failures are retried before giving up.
    /// `Duration::ZERO` disables retrying.
    #[inline]
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Sends a request and waits for the complete response.
    ///
    /// `on_transcript` is invoked with every text delta as it arrives. Each
    /// delta is delivered at most once: a stream that fails after delivering
    /// text is not retried.
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_transcript: Option<TranscriptFn>,
    ) -> Result<ModelClientResponse, Box<dyn ModelProviderError>> {
        if self.retry_budget.is_zero() {
            return (self.handler_fn)(req, on_transcript).await;
        }

        let streamed = Arc::new(AtomicBool::new(false));
        let on_transcript = on_transcript.map(|inner| -> TranscriptFn {
            let streamed = Arc::clone(&streamed);
            Arc::new(move |delta| {
                streamed.store(true, Ordering::Relaxed);
                inner(delta);
            })
        });

        backoff::future::retry(self.retry_policy(), || {
            let fut = (self.handler_fn)(req.clone(), on_transcript.clone());
            let streamed = Arc::clone(&streamed);
            async move {
                fut.await.map_err(|err| {
                    if !err.kind().is_transient() {
                        backoff::Error::permanent(err)
                    } else if streamed.load(Ordering::Relaxed) {
                        warn!("model failed mid-stream, not retrying: {err}");
                        backoff::Error::permanent(err)
                    } else {
                        warn!("transient model error, retrying: {err}");
                        backoff::Error::transient(err)
                    }
                })
            }
        })
        .await
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_elapsed_time(Some(self.retry_budget))
            .build()
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub struct ModelClientResponse {
    /// The assembled assistant message.
    pub message: AssistantMessage,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

/// Raised when a response breaks the protocol in a way the provider
/// didn't catch itself.
#[derive(Debug)]
struct ProtocolError(String);

impl Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for ProtocolError {}

impl ModelProviderError for ProtocolError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedResponse
    }
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_transcript: Option<TranscriptFn>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut message = AssistantMessage::default();
    let mut seen_ids = HashSet::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                if let Some(on_transcript) = &on_transcript {
                    on_transcript(&delta);
                }
                message.text.push_str(&delta);
            }
            ModelResponseEvent::ToolCall(req) => {
                if !seen_ids.insert(req.id.clone()) {
                    return Err(Box::new(ProtocolError(format!(
                        "duplicated tool call id `{}`",
                        req.id
                    ))));
                }
                message.tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        message,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use sidekick_model::ModelMessage;
    use sidekick_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };

    use super::*;

    fn hi_request() -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::user("Hi")],
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let model_provider = TestModelProvider::default();
        for _ in 0..3 {
            model_provider.add_response(PresetResponse::with_events([
                PresetEvent::MessageDelta("How ".to_owned()),
                PresetEvent::MessageDelta("are ".to_owned()),
                PresetEvent::MessageDelta("you?".to_owned()),
            ]));
        }

        let model_client = ModelClient::new(model_provider);

        for _ in 0..3 {
            let deltas = Arc::new(Mutex::new(Vec::<String>::new()));
            let on_transcript: TranscriptFn = {
                let deltas = Arc::clone(&deltas);
                Arc::new(move |delta| {
                    deltas.lock().unwrap().push(delta.to_owned())
                })
            };
            let resp = model_client
                .send_request(hi_request(), Some(on_transcript))
                .await
                .unwrap();
            assert_eq!(resp.message.text, "How are you?");
            assert!(resp.message.tool_calls.is_empty());
            assert_eq!(resp.finish_reason, Some(ModelFinishReason::Stop));
            assert_eq!(deltas.lock().unwrap().len(), 3);
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let resp_or_err = model_client.send_request(hi_request(), None).await;
        assert!(matches!(resp_or_err, Err(_)));
    }

    #[tokio::test]
    async fn test_duplicated_tool_call_ids() {
        let model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::with_events([
            PresetEvent::tool_call("call_0", "speak", json!({ "text": "a" })),
            PresetEvent::tool_call("call_0", "speak", json!({ "text": "b" })),
        ]));
        let model_client = ModelClient::new(model_provider);
        let err = model_client
            .send_request(hi_request(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_transient_errors() {
        let model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::text("ok").with_failures(2));
        let model_client = ModelClient::new(model_provider.clone());

        let resp = model_client.send_request(hi_request(), None).await.unwrap();
        assert_eq!(resp.message.text, "ok");
        assert_eq!(model_provider.request_count(), 3);
    }

    #[derive(Debug)]
    struct RateLimited;

    impl Display for RateLimited {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("rate limited")
        }
    }

    impl StdError for RateLimited {}

    impl ModelProviderError for RateLimited {
        fn kind(&self) -> ErrorKind {
            ErrorKind::RateLimitExceeded
        }
    }

    /// Streams one delta, then fails with a rate limit.
    struct CutOffResponse {
        sent_delta: bool,
    }

    impl ModelResponse for CutOffResponse {
        type Error = RateLimited;

        fn poll_next_event(
            self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<Option<ModelResponseEvent>, Self::Error>>
        {
            let this = self.get_mut();
            if this.sent_delta {
                return std::task::Poll::Ready(Err(RateLimited));
            }
            this.sent_delta = true;
            std::task::Poll::Ready(Ok(Some(ModelResponseEvent::MessageDelta(
                "Hel".to_owned(),
            ))))
        }
    }

    #[derive(Clone, Default)]
    struct CutOffProvider {
        requests: Arc<Mutex<usize>>,
    }

    impl ModelProvider for CutOffProvider {
        type Error = RateLimited;
        type Response = CutOffResponse;

        fn send_request(
            &self,
            _req: &ModelRequest,
        ) -> impl Future<Output = Result<Self::Response, Self::Error>>
        + Send
        + 'static {
            *self.requests.lock().unwrap() += 1;
            std::future::ready(Ok(CutOffResponse { sent_delta: false }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_after_streamed_text() {
        let model_provider = CutOffProvider::default();
        let model_client = ModelClient::new(model_provider.clone());

        let deltas = Arc::new(Mutex::new(Vec::<String>::new()));
        let on_transcript: TranscriptFn = {
            let deltas = Arc::clone(&deltas);
            Arc::new(move |delta| deltas.lock().unwrap().push(delta.to_owned()))
        };
        let err = model_client
            .send_request(hi_request(), Some(on_transcript))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(*model_provider.requests.lock().unwrap(), 1);
        assert_eq!(*deltas.lock().unwrap(), ["Hel"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_before_streamed_text() {
        let model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::text("ok").with_failures(1));
        let model_client = ModelClient::new(model_provider.clone());

        let deltas = Arc::new(Mutex::new(Vec::<String>::new()));
        let on_transcript: TranscriptFn = {
            let deltas = Arc::clone(&deltas);
            Arc::new(move |delta| deltas.lock().unwrap().push(delta.to_owned()))
        };
        let resp = model_client
            .send_request(hi_request(), Some(on_transcript))
            .await
            .unwrap();
        assert_eq!(resp.message.text, "ok");
        assert_eq!(model_provider.request_count(), 2);
        assert_eq!(deltas.lock().unwrap().concat(), "ok");
    }

    #[tokio::test]
    async fn test_no_retry_without_budget() {
        let model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::text("ok").with_failures(1));
        let model_client = ModelClient::new(model_provider.clone())
            .with_retry_budget(Duration::ZERO);

        let err = model_client
            .send_request(hi_request(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(model_provider.request_count(), 1);
    }
}
