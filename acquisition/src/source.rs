use core::marker::PhantomData;

use embedded_hal::adc::{Channel, OneShot};

/// A periodic interrupt source the controller can attach to and detach from.
pub trait SampleTimer {
    /// Start delivering ticks.
    fn subscribe(&mut self);
    /// Stop delivering ticks. No tick may be delivered after this returns.
    fn unsubscribe(&mut self);
}

/// Something that produces one raw converter code per call.
pub trait SampleSource {
    /// `None` if the conversion failed; the tick is then simply skipped.
    fn sample(&mut self) -> Option<u16>;
}

/// [`SampleSource`] on top of an `embedded-hal` one-shot ADC and one of its channels.
pub struct AdcSource<A, ADC, PIN> {
    adc: ADC,
    pin: PIN,
    _adc_kind: PhantomData<A>,
}

impl<A, ADC, PIN> AdcSource<A, ADC, PIN>
where
    ADC: OneShot<A, u16, PIN>,
    PIN: Channel<A>,
{
    pub fn new(adc: ADC, pin: PIN) -> Self {
        Self {
            adc,
            pin,
            _adc_kind: PhantomData,
        }
    }

    pub fn free(self) -> (ADC, PIN) {
        (self.adc, self.pin)
    }
}

impl<A, ADC, PIN> SampleSource for AdcSource<A, ADC, PIN>
where
    ADC: OneShot<A, u16, PIN>,
    PIN: Channel<A>,
{
    fn sample(&mut self) -> Option<u16> {
        nb::block!(self.adc.read(&mut self.pin)).ok()
    }
}
