use crate::ProcessControlBlock;

/// Where CPU register state crosses into and out of a PCB.
///
/// The scheduler only does bookkeeping. On every switch it hands the
/// outgoing PCB to [`save`](Self::save) and the incoming PCB to
/// [`restore`](Self::restore); the implementation belongs to the platform's
/// trap entry/exit code.
pub trait ContextSwitch {
    /// Persist the live registers into `outgoing`.
    fn save(&mut self, outgoing: &mut ProcessControlBlock);

    /// Arrange for `incoming`'s registers to be live when the trap returns.
    fn restore(&mut self, incoming: &mut ProcessControlBlock);
}

/// A boundary that does nothing; bookkeeping-only scheduling.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoContextSwitch;

impl ContextSwitch for NoContextSwitch {
    fn save(&mut self, _outgoing: &mut ProcessControlBlock) {}

    fn restore(&mut self, _incoming: &mut ProcessControlBlock) {}
}
