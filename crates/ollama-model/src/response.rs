use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use sidekick_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};

use crate::Error;
use crate::io::NdJson;
use crate::proto::{self, ChatChunk};

struct PartialState {
    lines: NdJson,
    tool_call_count: usize,
    // Events decoded from a record but not yet handed out. One record may
    // carry a text delta and several tool calls at once.
    pending: VecDeque<ModelResponseEvent>,
    done: bool,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OllamaResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OllamaResponse {
    #[inline]
    pub fn from_lines(lines: NdJson) -> Self {
        let partial_state = PartialState {
            lines,
            tool_call_count: 0,
            pending: VecDeque::new(),
            done: false,
        };
        Self {
            next_event_fut: Some(Box::pin(next_event(partial_state))),
        }
    }
}

impl ModelResponse for OllamaResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        *this.next_event_fut = Some(Box::pin(next_event(partial_state)));
        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(mut partial_state: PartialState) -> NextEvent {
    loop {
        if let Some(event) = partial_state.pending.pop_front() {
            return Ok((Some(event), partial_state));
        }
        if partial_state.done {
            return Ok((None, partial_state));
        }

        let line = match partial_state.lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                return Err(Error::new(
                    "stream ended before the response was done",
                    ErrorKind::Other,
                ));
            }
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got ndjson record: {line}");

        let chunk = serde_json::from_str::<ChatChunk>(&line).map_err(|err| {
            Error::new(format!("{err}"), ErrorKind::MalformedResponse)
        })?;
        if let Some(message) = chunk.error {
            return Err(Error::new(message, ErrorKind::Other));
        }

        if let Some(message) = chunk.message {
            if !message.content.is_empty() {
                partial_state
                    .pending
                    .push_back(ModelResponseEvent::MessageDelta(message.content));
            }
            for call in message.tool_calls {
                let req =
                    proto::tool_call_request(call, partial_state.tool_call_count)?;
                partial_state.tool_call_count += 1;
                partial_state
                    .pending
                    .push_back(ModelResponseEvent::ToolCall(req));
            }
        }

        if chunk.done {
            let finish_reason = match chunk.done_reason.as_deref() {
                Some("length") => ModelFinishReason::Length,
                _ if partial_state.tool_call_count > 0 => {
                    ModelFinishReason::ToolCalls
                }
                _ => ModelFinishReason::Stop,
            };
            partial_state
                .pending
                .push_back(ModelResponseEvent::Completed(finish_reason));
            partial_state.done = true;
        }
    }
}
