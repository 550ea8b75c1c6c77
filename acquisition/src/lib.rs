#![cfg_attr(not(test), no_std)]

//! Hardware-independent core of the step-response sampler.
//!
//! A timer interrupt feeds raw ADC codes into a [`SampleBuffer`] owned by an
//! [`AcquisitionController`]. When the buffer is full the foreground loop releases the timer,
//! drains the samples and writes them out as CSV lines with [`emit_records`].

pub mod buffer;
pub mod controller;
pub mod csv;
pub mod source;

pub use buffer::SampleBuffer;
pub use controller::{AcquisitionController, AcquisitionError, AcquisitionState};
pub use csv::{emit_records, AdcScale, SampleRecord};
pub use source::{AdcSource, SampleSource, SampleTimer};
