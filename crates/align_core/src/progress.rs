use shared::protocol::AlignmentEvent;

/// One-way outlet for progress snapshots.
///
/// Implementations must not block for long: the engine publishes from the
/// search thread between hardware calls.
pub trait ProgressSink {
    fn publish(&mut self, event: AlignmentEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn publish(&mut self, _event: AlignmentEvent) {}
}

impl ProgressSink for Vec<AlignmentEvent> {
    fn publish(&mut self, event: AlignmentEvent) {
        self.push(event);
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
    fn publish(&mut self, event: AlignmentEvent) {
        (**self).publish(event);
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Box<S> {
    fn publish(&mut self, event: AlignmentEvent) {
        (**self).publish(event);
    }
}
