use usb_device::class_prelude::*;
use usb_device::prelude::*;
use usbd_serial::SerialPort;

/// Blocking line writer on top of the CDC serial port.
///
/// The endpoint buffer is much smaller than a full run, so writes keep polling the device until
/// the host has picked up the data. Output is dropped if the host goes away.
pub struct SerialOut<'a, 'b, B>
where
    B: UsbBus,
{
    pub usb_dev: &'a mut UsbDevice<'b, B>,
    pub serial: &'a mut SerialPort<'b, B>,
}

const MAX_STALLED_POLLS: u32 = 100_000;

impl<'a, 'b, B> core::fmt::Write for SerialOut<'a, 'b, B>
where
    B: UsbBus,
{
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let mut buf = s.as_bytes();
        let mut stalled = 0;
        while !buf.is_empty() {
            match self.serial.write(buf) {
                Ok(n) => {
                    buf = &buf[n..];
                    stalled = 0;
                }
                Err(UsbError::WouldBlock) => {
                    stalled += 1;
                    if stalled > MAX_STALLED_POLLS {
                        return Err(core::fmt::Error);
                    }
                }
                Err(_) => return Err(core::fmt::Error),
            }
            self.usb_dev.poll(&mut [&mut *self.serial]);
        }
        Ok(())
    }
}

/// Poll the device and report whether the host asked for a new run.
pub fn poll_reset_request<B: UsbBus>(
    usb_dev: &mut UsbDevice<'_, B>,
    serial: &mut SerialPort<'_, B>,
) -> bool {
    if !usb_dev.poll(&mut [&mut *serial]) {
        return false;
    }
    let mut buf = [0u8; 64];
    match serial.read(&mut buf) {
        Ok(n) => buf[..n].contains(&config::RESET_BYTE),
        Err(_) => false,
    }
}
