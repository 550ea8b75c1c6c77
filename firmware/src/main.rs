#![no_std]
#![no_main]

mod blink;
mod panic;
mod sampler;
mod serial;

use acquisition::emit_records;
use acquisition::AcquisitionState;
use acquisition::AdcScale;
use defmt::{info, warn};
use defmt_rtt as _;
use embedded_hal::digital::v2::OutputPin;
use fugit::TimerDurationU64;
// The macro for our start-up function
use rp_pico::entry;

// Pull in any important traits
use rp_pico::hal;
use rp_pico::hal::pac;
use rp_pico::hal::prelude::*;
use rp_pico::hal::timer::Instant;

use usb_device::class_prelude::*;
use usb_device::prelude::*;
use usbd_serial::*;

use crate::serial::SerialOut;

defmt::timestamp!("{=u64:us}", {
    // The timer is free-running from reset, reading the raw counter needs no ownership.
    let timer = unsafe { &*pac::TIMER::ptr() };
    let lo = timer.timelr.read().bits();
    let hi = timer.timehr.read().bits();
    ((hi as u64) << 32) | lo as u64
});

type StepPin = hal::gpio::Pin<hal::gpio::bank0::Gpio15, hal::gpio::PushPullOutput>;
type LedPin = hal::gpio::Pin<hal::gpio::bank0::Gpio25, hal::gpio::PushPullOutput>;

/// Entry point to our bare-metal application.
///
/// The `#[entry]` macro ensures the Cortex-M start-up code calls this function
/// as soon as all global variables are initialised.
#[entry]
fn main() -> ! {
    run()
}

#[derive(Copy, Clone)]
enum RunState {
    /// Step input held low until the capacitor has emptied.
    Discharging { until: Instant },
    /// Step input high, the timer interrupt is filling the buffer.
    Sampling { since: Instant },
    /// Waiting for the host to ask for another run.
    Idle,
}

fn start_discharge(timer: &hal::Timer, step_pin: &mut StepPin) -> RunState {
    let _ = step_pin.set_low();
    let discharge = TimerDurationU64::millis(config::DISCHARGE_MILLIS);
    RunState::Discharging {
        until: timer.get_counter() + discharge,
    }
}

fn run() -> ! {
    let mut pac = pac::Peripherals::take().unwrap();

    // Set up the watchdog driver - needed by the clock setup code
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    // The single-cycle I/O block controls our GPIO pins
    let sio = hal::Sio::new(pac.SIO);

    // Configure the clocks
    //
    // The default is to generate a 125 MHz system clock
    let clocks = hal::clocks::init_clocks_and_plls(
        rp_pico::XOSC_CRYSTAL_FREQ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();

    //USB
    let usb_bus = UsbBusAllocator::new(hal::usb::UsbBus::new(
        pac.USBCTRL_REGS,
        pac.USBCTRL_DPRAM,
        clocks.usb_clock,
        true,
        &mut pac.RESETS,
    ));

    let mut serial = SerialPort::new(&usb_bus);

    let mut usb_dev = UsbDeviceBuilder::new(&usb_bus, UsbVidPid(0x16c0, 0x27dd))
        .product("Step response sampler")
        .device_class(USB_CLASS_CDC)
        .build();

    let pins = rp_pico::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let mut step_pin: StepPin = pins.gpio15.into_push_pull_output();
    let mut led_pin: LedPin = pins.led.into_push_pull_output();

    let adc = hal::Adc::new(pac.ADC, &mut pac.RESETS);
    let adc_pin = pins.gpio26.into_floating_input();

    let mut timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS);
    sampler::setup_timer_interrupt(&mut timer, adc, adc_pin);

    info!(
        "sampler ready: {} samples every {} ms",
        config::SAMPLE_CAPACITY,
        config::SAMPLE_PERIOD_MS
    );

    let scale = AdcScale::default();
    let arm_timeout = TimerDurationU64::millis(config::ARM_TIMEOUT_MILLIS);
    let mut samples = [0u16; config::SAMPLE_CAPACITY];

    // First run starts right after boot.
    let mut state = start_discharge(&timer, &mut step_pin);

    loop {
        let reset_requested = serial::poll_reset_request(&mut usb_dev, &mut serial);
        let now = timer.get_counter();

        state = match state {
            RunState::Idle | RunState::Discharging { .. } if reset_requested => {
                info!("reset requested");
                start_discharge(&timer, &mut step_pin)
            }
            RunState::Sampling { .. } if reset_requested => {
                info!("reset requested, abandoning current run");
                let _ = led_pin.set_low();
                sampler::cancel();
                sampler::finish();
                start_discharge(&timer, &mut step_pin)
            }
            RunState::Discharging { until } if until < now => {
                if sampler::arm() {
                    let _ = step_pin.set_high();
                    let _ = led_pin.set_high();
                    info!("run armed");
                    RunState::Sampling { since: now }
                } else {
                    warn!("previous run still active, not arming");
                    RunState::Idle
                }
            }
            RunState::Sampling { since } => {
                let mut s = sampler::poll();
                if s == AcquisitionState::Armed && since + arm_timeout < now {
                    warn!("buffer did not fill in time, emitting partial run");
                    sampler::cancel();
                    s = sampler::poll();
                }

                if s == AcquisitionState::Draining {
                    let _ = led_pin.set_low();
                    let n = sampler::drain_into(&mut samples);
                    let mut out = SerialOut {
                        usb_dev: &mut usb_dev,
                        serial: &mut serial,
                    };
                    match emit_records(
                        &mut out,
                        samples[..n].iter().copied(),
                        config::SAMPLE_PERIOD_MS,
                        &scale,
                    ) {
                        Ok(n) => info!("emitted {} samples", n),
                        Err(_) => warn!("host stopped reading, run output truncated"),
                    }
                    sampler::finish();
                    RunState::Idle
                } else {
                    RunState::Sampling { since }
                }
            }
            o => o,
        };
    }
}
