#![no_std]

// ----------------------------------------------------------------------------
// Configurable
// ----------------------------------------------------------------------------
pub const SAMPLE_CAPACITY: usize = 200;
pub const SAMPLE_PERIOD_MS: u32 = 10;
pub const DISCHARGE_MILLIS: u64 = 2000; // ~6 time constants of the lab circuit
pub const ARM_TIMEOUT_MILLIS: u64 = 5000;
pub const SERIAL_BAUD_RATE: u32 = 115_200;

// ----------------------------------------------------------------------------
// Should probably not be changed:
// ----------------------------------------------------------------------------
pub const ADC_BITS: u16 = 12;
pub const V_REF: f64 = 3.3;
pub const RESET_BYTE: u8 = 0x04; // Ctrl+D, what the REPL used for a soft reset
pub const END_MARKER: &str = "End";

// ----------------------------------------------------------------------------
// Derived from other values:
// ----------------------------------------------------------------------------
pub const ADC_MAX_CODE: u16 = (1 << ADC_BITS) - 1;
pub const SAMPLE_PERIOD_US: u32 = SAMPLE_PERIOD_MS * 1000;
pub const SAMPLE_RATE_HZ: u32 = 1000 / SAMPLE_PERIOD_MS;

/// Timestamp of the last sample of a full run.
pub const RUN_LENGTH_MS: u32 = (SAMPLE_CAPACITY as u32 - 1) * SAMPLE_PERIOD_MS;
