use crate::buffer::SampleBuffer;
use crate::source::SampleTimer;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcquisitionState {
    /// Never armed.
    Idle,
    /// Timer subscribed, buffer accepting samples.
    Armed,
    /// Buffer at capacity, timer still subscribed.
    Full,
    /// Timer unsubscribed, samples may be drained.
    Draining,
    /// Run complete. A new run may be armed.
    Done,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AcquisitionError {
    #[error("a run is already in progress ({0:?})")]
    Busy(AcquisitionState),
    #[error("samples can only be drained after the timer was released ({0:?})")]
    NotDraining(AcquisitionState),
}

/// Owns the sample buffer and the timer subscription of one acquisition run.
///
/// The producer side is [`AcquisitionController::on_tick`], called from the timer interrupt.
/// Everything else is meant for the foreground loop. Draining is only possible once the timer
/// has been released, so producer and consumer never touch the buffer at the same time.
pub struct AcquisitionController<T, const N: usize> {
    timer: T,
    buffer: SampleBuffer<N>,
    state: AcquisitionState,
    subscribed: bool,
}

impl<T: SampleTimer, const N: usize> AcquisitionController<T, N> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            buffer: SampleBuffer::new(),
            state: AcquisitionState::Idle,
            subscribed: false,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Start a fresh run: empty the buffer and subscribe to the timer.
    pub fn arm(&mut self) -> Result<(), AcquisitionError> {
        match self.state {
            AcquisitionState::Idle | AcquisitionState::Done => {}
            s => return Err(AcquisitionError::Busy(s)),
        }
        self.buffer.reset();
        self.state = AcquisitionState::Armed;
        if !self.subscribed {
            self.timer.subscribe();
            self.subscribed = true;
        }
        Ok(())
    }

    /// Producer entry point. Samples arriving while not armed are dropped.
    pub fn on_tick(&mut self, raw: u16) {
        match self.state {
            AcquisitionState::Armed => {
                self.buffer.try_put(raw);
                if self.buffer.is_full() {
                    self.state = AcquisitionState::Full;
                }
            }
            // Ticks can still arrive until the foreground gets around to unsubscribing.
            AcquisitionState::Full => self.buffer.try_put(raw),
            _ => {}
        }
    }

    /// One step of the foreground loop. Releases the timer as soon as the buffer is full.
    pub fn poll(&mut self) -> AcquisitionState {
        if self.state == AcquisitionState::Full {
            self.disable();
        }
        self.state
    }

    /// Release the timer after the buffer filled up. Calling it again is harmless.
    pub fn disable(&mut self) {
        if self.state == AcquisitionState::Full {
            self.release_timer();
            self.state = AcquisitionState::Draining;
        }
    }

    /// Abort an armed run, keeping whatever was sampled so far for draining.
    pub fn cancel(&mut self) {
        if let AcquisitionState::Armed | AcquisitionState::Full = self.state {
            self.release_timer();
            self.state = AcquisitionState::Draining;
        }
    }

    pub fn drain_all(&mut self) -> Result<impl Iterator<Item = u16> + '_, AcquisitionError> {
        if self.state != AcquisitionState::Draining {
            return Err(AcquisitionError::NotDraining(self.state));
        }
        Ok(self.buffer.drain_all())
    }

    /// Mark the run as complete once the end of stream has been emitted.
    pub fn finish(&mut self) {
        if self.state == AcquisitionState::Draining {
            // Anything not drained by now belongs to an abandoned run.
            self.buffer.reset();
            self.state = AcquisitionState::Done;
        }
    }

    fn release_timer(&mut self) {
        if self.subscribed {
            self.timer.unsubscribe();
            self.subscribed = false;
        }
    }
}
