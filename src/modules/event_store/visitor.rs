use crate::shared::core::primitives::DomainEventMessage;

/// Receives every stored event during a full-store visit, e.g. to rebuild a projection.
pub trait EventVisitor<P> {
    fn visit(&mut self, event: DomainEventMessage<P>);
}

impl<P, F> EventVisitor<P> for F
where
    F: FnMut(DomainEventMessage<P>),
{
    fn visit(&mut self, event: DomainEventMessage<P>) {
        self(event)
    }
}
