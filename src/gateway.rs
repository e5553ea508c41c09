// src/gateway.rs
//
// Processing gateway: the single boundary between validated operations and
// the engine. The native codecs (mozjpeg in particular) can panic on
// malformed input; the gateway traps the unwind and converts it into an
// ordinary processing error so one bad image never takes the process down.

use crate::engine::{self, EngineOptions, ImageType};
use crate::error::{PixelmillError, Result};
use crate::Image;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error};

/// Run the engine for one request and wrap the output with its MIME type.
/// The MIME type is resolved from the OUTPUT bytes, so it always reflects
/// what was actually produced.
pub fn process(buf: &[u8], opts: EngineOptions) -> Result<Image> {
    process_with(buf, &opts, engine::resize)
}

/// Panic boundary around a single engine invocation. Scoped strictly to this
/// call: a trapped panic leaves the thread usable for the next request.
pub(crate) fn process_with<F>(buf: &[u8], opts: &EngineOptions, op: F) -> Result<Image>
where
    F: FnOnce(&[u8], &EngineOptions) -> Result<Vec<u8>>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| op(buf, opts)));
    match outcome {
        Ok(Ok(body)) => {
            let mime = ImageType::detect(&body).mime().to_string();
            debug!(bytes = body.len(), %mime, "engine produced output");
            Ok(Image { body, mime })
        }
        Ok(Err(err)) => Err(err),
        Err(payload) => {
            let err = classify_panic(payload);
            error!(%err, "engine panicked");
            Err(err)
        }
    }
}

/// Turn a panic payload into a processing error. String payloads keep their
/// message; anything else gets a generic one.
fn classify_panic(payload: Box<dyn Any + Send>) -> PixelmillError {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        PixelmillError::engine_panic((*msg).to_string())
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        PixelmillError::engine_panic(msg.clone())
    } else {
        PixelmillError::engine_panic("codec internal error")
    }
}
