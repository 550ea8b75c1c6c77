use core::cell::RefCell;

use acquisition::AcquisitionController;
use acquisition::AcquisitionState;
use acquisition::AdcSource;
use acquisition::SampleSource;
use acquisition::SampleTimer;
use cortex_m::interrupt::Mutex;
use fugit::ExtU32;

use rp_pico::hal;
use rp_pico::hal::pac;

use hal::gpio::bank0::Gpio26;
use hal::gpio::FloatingInput;
use hal::gpio::Pin;
use pac::interrupt;
use rp_pico::hal::timer::Alarm;
use rp_pico::hal::timer::Alarm0;

pub type AdcPin = Pin<Gpio26, FloatingInput>;
type Source = AdcSource<hal::Adc, hal::Adc, AdcPin>;
type Controller = AcquisitionController<AlarmTimer, { config::SAMPLE_CAPACITY }>;

/// Alarm 0 of the system timer, re-scheduled from its own interrupt every sample period.
pub struct AlarmTimer {
    alarm: Alarm0,
    period: fugit::MicrosDurationU32,
}

impl AlarmTimer {
    fn schedule_next(&mut self) {
        // Only fails for periods beyond the alarm range, which a constant period never is.
        let _ = self.alarm.schedule(self.period);
    }
}

impl SampleTimer for AlarmTimer {
    fn subscribe(&mut self) {
        self.alarm.clear_interrupt();
        self.alarm.enable_interrupt();
        self.schedule_next();
    }

    fn unsubscribe(&mut self) {
        self.alarm.disable_interrupt();
        self.alarm.clear_interrupt();
    }
}

struct SamplerIrqData {
    controller: Controller,
    source: Source,
}

static SAMPLER_IRQ_DATA: Mutex<RefCell<Option<SamplerIrqData>>> = Mutex::new(RefCell::new(None));

pub fn setup_timer_interrupt(timer: &mut hal::Timer, adc: hal::Adc, pin: AdcPin) {
    let Some(alarm) = timer.alarm_0() else {
        panic!("alarm 0 already taken");
    };
    let timer = AlarmTimer {
        alarm,
        period: config::SAMPLE_PERIOD_US.micros(),
    };
    cortex_m::interrupt::free(|cs| {
        SAMPLER_IRQ_DATA.borrow(cs).replace(Some(SamplerIrqData {
            controller: AcquisitionController::new(timer),
            source: AdcSource::new(adc, pin),
        }));
    });

    unsafe {
        pac::NVIC::unmask(pac::Interrupt::TIMER_IRQ_0);
    }
}

fn with_controller<R>(f: impl FnOnce(&mut Controller) -> R) -> R {
    cortex_m::interrupt::free(|cs| {
        let data = SAMPLER_IRQ_DATA.borrow(cs);
        let mut data = data.borrow_mut();
        let data = data.as_mut().unwrap();
        f(&mut data.controller)
    })
}

/// Start a new run. Returns false if the previous one has not been finished yet.
pub fn arm() -> bool {
    with_controller(|c| c.arm().is_ok())
}

pub fn poll() -> AcquisitionState {
    with_controller(|c| c.poll())
}

pub fn cancel() {
    with_controller(|c| c.cancel())
}

/// Copy the captured samples out so they can be written without holding the critical section.
pub fn drain_into(out: &mut [u16; config::SAMPLE_CAPACITY]) -> usize {
    with_controller(|c| {
        let mut n = 0;
        if let Ok(samples) = c.drain_all() {
            for (slot, raw) in out.iter_mut().zip(samples) {
                *slot = raw;
                n += 1;
            }
        }
        n
    })
}

pub fn finish() {
    with_controller(|c| c.finish())
}

#[interrupt]
fn TIMER_IRQ_0() {
    cortex_m::interrupt::free(|cs| {
        let data = SAMPLER_IRQ_DATA.borrow(cs);
        let mut data = data.borrow_mut();
        let Some(data) = data.as_mut() else {
            return;
        };

        data.controller.timer_mut().alarm.clear_interrupt();
        if !data.controller.is_subscribed() {
            return;
        }

        if let Some(raw) = data.source.sample() {
            data.controller.on_tick(raw);
        }
        data.controller.timer_mut().schedule_next();
    })
}
