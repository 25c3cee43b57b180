use std::fmt;
use std::time::Duration;

use crate::backend::{Device, GpuFence};
use crate::device::DeviceContext;
use crate::error::{RenderError, Result};

/// Fence value that proves a batch of submitted work has finished.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FenceTicket(u64);

impl FenceTicket {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FenceTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strictly increasing counter shared between the CPU and the direct queue.
pub struct FrameFence<D: Device> {
    fence: D::Fence,
    last_signaled: u64,
    timeout: Option<Duration>,
}

impl<D: Device> FrameFence<D> {
    /// Creates the fence at value 0. `timeout` bounds every wait; `None` waits forever.
    pub fn new(ctx: &DeviceContext<D>, timeout: Option<Duration>) -> Result<Self> {
        let fence = ctx.device().create_fence(0)?;
        Ok(Self {
            fence,
            last_signaled: 0,
            timeout,
        })
    }

    /// Posts the next value after everything queued so far.
    pub fn signal(&mut self, ctx: &DeviceContext<D>) -> Result<FenceTicket> {
        let value = self.last_signaled + 1;
        ctx.device().signal(ctx.queue(), &self.fence, value)?;
        self.last_signaled = value;
        log::trace!("fence signaled {value}");
        Ok(FenceTicket(value))
    }

    /// Highest value the GPU has reported complete.
    pub fn completed(&self) -> u64 {
        self.fence.completed_value()
    }

    pub fn last_signaled(&self) -> u64 {
        self.last_signaled
    }

    /// Ticket for the most recent signal; complete immediately if nothing was signaled.
    pub fn last_ticket(&self) -> FenceTicket {
        FenceTicket(self.last_signaled)
    }

    pub fn is_complete(&self, ticket: FenceTicket) -> bool {
        self.completed() >= ticket.0
    }

    /// `true` while some signaled value has not been reached.
    pub fn has_pending(&self) -> bool {
        self.completed() < self.last_signaled
    }

    /// Blocks until the GPU has reached `ticket`.
    pub fn wait_until(&self, ticket: FenceTicket) -> Result<()> {
        if ticket.0 > self.last_signaled {
            return Err(RenderError::device_lost(format!(
                "wait on fence value {} which was never signaled (last {})",
                ticket.0, self.last_signaled
            )));
        }

        if self.is_complete(ticket) {
            return Ok(());
        }

        log::trace!("waiting for fence {} (completed {})", ticket.0, self.completed());
        self.fence.wait(ticket.0, self.timeout)?;

        let completed = self.completed();
        if completed < ticket.0 {
            return Err(RenderError::device_lost(format!(
                "fence stalled at {completed} after waiting for {}",
                ticket.0
            )));
        }
        Ok(())
    }

    /// Waits for everything signaled so far.
    pub fn drain(&self) -> Result<()> {
        if self.last_signaled == 0 {
            return Ok(());
        }
        log::debug!("draining queue up to fence {}", self.last_signaled);
        self.wait_until(FenceTicket(self.last_signaled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{HeadlessConfig, HeadlessInstance};
    use crate::device::DeviceInit;

    fn context() -> (HeadlessInstance, DeviceContext<crate::backend::headless::HeadlessDevice>) {
        let mut instance = HeadlessInstance::new(HeadlessConfig::default());
        let ctx = DeviceContext::create(&mut instance, &DeviceInit::default()).unwrap();
        (instance, ctx)
    }

    #[test]
    fn tickets_increase_strictly() {
        let (_instance, ctx) = context();
        let mut fence = FrameFence::new(&ctx, None).unwrap();

        let a = fence.signal(&ctx).unwrap();
        let b = fence.signal(&ctx).unwrap();
        assert!(b > a);
        assert_eq!(fence.last_signaled(), b.value());
    }

    #[test]
    fn signal_completes_only_after_wait() {
        let (_instance, ctx) = context();
        let mut fence = FrameFence::new(&ctx, None).unwrap();

        let ticket = fence.signal(&ctx).unwrap();
        assert!(!fence.is_complete(ticket));
        assert!(fence.has_pending());

        fence.wait_until(ticket).unwrap();
        assert!(fence.is_complete(ticket));
        assert!(!fence.has_pending());
    }

    #[test]
    fn waiting_on_unsignaled_value_is_device_loss() {
        let (_instance, ctx) = context();
        let fence = FrameFence::new(&ctx, None).unwrap();
        let err = fence.wait_until(FenceTicket(3)).unwrap_err();
        assert!(matches!(err, RenderError::DeviceLost { .. }));
    }

    #[test]
    fn drain_without_work_is_a_no_op() {
        let (_instance, ctx) = context();
        let fence = FrameFence::new(&ctx, None).unwrap();
        fence.drain().unwrap();
        assert!(fence.is_complete(fence.last_ticket()));
    }
}
