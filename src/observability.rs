use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("confab.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("confab.client.request_errors");
pub(crate) static CLIENT_AUTH_FAILURES: Counter = Counter::new("confab.client.auth_failures");

pub(crate) static STREAM_FRAMES: Counter = Counter::new("confab.stream.frames");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("confab.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("confab.stream.bytes");

pub(crate) static SEND_REJECTED_BUSY: Counter = Counter::new("confab.send.rejected_busy");
pub(crate) static SEND_CANCELLED: Counter = Counter::new("confab.send.cancelled");
pub(crate) static SEND_DURATION: Moments = Moments::new("confab.send.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_AUTH_FAILURES);

    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&SEND_REJECTED_BUSY);
    collector.register_counter(&SEND_CANCELLED);
    collector.register_moments(&SEND_DURATION);
}
