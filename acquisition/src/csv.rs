use core::fmt;

/// Conversion from raw converter codes to volts.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AdcScale {
    pub v_ref: f64,
    pub max_code: u16,
}

impl Default for AdcScale {
    fn default() -> Self {
        Self {
            v_ref: config::V_REF,
            max_code: config::ADC_MAX_CODE,
        }
    }
}

impl AdcScale {
    pub fn to_volts(&self, raw: u16) -> f64 {
        // Multiply first so that full scale maps to exactly `v_ref`.
        raw as f64 * self.v_ref / self.max_code as f64
    }
}

/// One emitted line: `<timestamp>,<voltage>`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SampleRecord {
    pub timestamp: u32,
    pub voltage: f64,
}

impl SampleRecord {
    pub fn from_raw(index: usize, raw: u16, period: u32, scale: &AdcScale) -> Self {
        Self {
            timestamp: index as u32 * period,
            voltage: scale.to_volts(raw),
        }
    }
}

impl fmt::Display for SampleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `{:?}` keeps the fractional part for whole numbers ("0.0", not "0").
        write!(f, "{},{:?}", self.timestamp, self.voltage)
    }
}

/// Write one line per sample followed by the end marker. Returns the number of records.
pub fn emit_records<W: fmt::Write>(
    out: &mut W,
    samples: impl IntoIterator<Item = u16>,
    period: u32,
    scale: &AdcScale,
) -> Result<usize, fmt::Error> {
    let mut count = 0;
    for (i, raw) in samples.into_iter().enumerate() {
        write!(out, "{}\r\n", SampleRecord::from_raw(i, raw, period, scale))?;
        count += 1;
    }
    write!(out, "{}\r\n", config::END_MARKER)?;
    Ok(count)
}
