use core::convert::Infallible;

use embedded_hal::digital::v2::OutputPin;

/// On/off sequence for the LED. Each entry holds the LED for `len` units; `on` selects the level.
pub struct Pattern {
    pub unit_ms: u32,
    pub steps: &'static [(bool, u8)],
    pub pause_ms: u32,
}

/// Three short, three long: the sampler has panicked and needs a power cycle.
pub const PANIC: Pattern = Pattern {
    unit_ms: 150,
    steps: &[
        (true, 1),
        (false, 1),
        (true, 1),
        (false, 1),
        (true, 1),
        (false, 2),
        (true, 3),
        (false, 1),
        (true, 3),
        (false, 1),
        (true, 3),
    ],
    pause_ms: 1200,
};

pub fn show(
    led: &mut dyn OutputPin<Error = Infallible>,
    delay: &mut cortex_m::delay::Delay,
    pattern: &Pattern,
) {
    for &(on, len) in pattern.steps {
        let _ = if on { led.set_high() } else { led.set_low() };
        delay.delay_ms(pattern.unit_ms * len as u32);
    }
    let _ = led.set_low();
    delay.delay_ms(pattern.pause_ms);
}

pub fn show_forever(
    led: &mut dyn OutputPin<Error = Infallible>,
    delay: &mut cortex_m::delay::Delay,
    pattern: &Pattern,
) -> ! {
    loop {
        show(led, delay, pattern);
    }
}
