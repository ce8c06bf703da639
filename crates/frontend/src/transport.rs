//! `fetch`-backed transport with an abort controller armed by the timeout.

use std::time::Duration;

use async_trait::async_trait;
use engine::fetcher::ReportTransport;
use engine::{Payload, ReportError};
use futures::future::{select, Either};
use futures::pin_mut;
use gloo_net::http::Request;
use gloo_timers::future::TimeoutFuture;
use web_sys::AbortController;

pub struct FetchTransport;

#[async_trait(?Send)]
impl ReportTransport for FetchTransport {
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Payload, ReportError> {
        let controller = AbortController::new().ok();

        let mut builder = Request::get(url);
        let signal = controller.as_ref().map(|c| c.signal());
        if signal.is_some() {
            builder = builder.abort_signal(signal.as_ref());
        }

        let send = builder.send();
        let timer = TimeoutFuture::new(timeout.as_millis() as u32);
        pin_mut!(send, timer);

        match select(send, timer).await {
            Either::Left((response, _)) => {
                let response =
                    response.map_err(|e| ReportError::Network(format!("Request failed: {e}")))?;
                if !response.ok() {
                    return Err(ReportError::Http(response.status()));
                }
                response
                    .json::<Payload>()
                    .await
                    .map_err(|e| ReportError::Decode(format!("Failed to parse response: {e}")))
            }
            Either::Right(((), _)) => {
                // the server may still answer; make sure the socket is released
                if let Some(controller) = &controller {
                    controller.abort();
                }
                Err(ReportError::Timeout)
            }
        }
    }
}
