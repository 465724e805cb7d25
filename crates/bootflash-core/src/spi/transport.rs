//! Byte-level SPI transport trait

use crate::error::{Error, Result};

/// Primitive operations of an SPI controller driving one flash
///
/// Implementors only need the byte exchange, chip select, speed and
/// deactivation hooks; the block transfers default to byte loops so a
/// controller with a FIFO can override them for throughput.
///
/// Chip select is explicit: a command is everything clocked between
/// `select(true)` and `select(false)`.
pub trait SpiTransport {
    /// Assert (`true`) or release (`false`) the chip select line
    fn select(&mut self, selected: bool) -> Result<()>;

    /// Clock one byte out and return the byte clocked in
    fn exchange_byte(&mut self, byte: u8) -> Result<u8>;

    /// Byte clocked out while only receiving
    fn idle_byte(&self) -> u8 {
        0xFF
    }

    /// Send a block, discarding what comes back
    fn send(&mut self, data: &[u8]) -> Result<()> {
        for &byte in data {
            self.exchange_byte(byte)?;
        }
        Ok(())
    }

    /// Fill `buf` from the bus, clocking out the idle byte
    fn receive(&mut self, buf: &mut [u8]) -> Result<()> {
        let idle = self.idle_byte();
        for byte in buf.iter_mut() {
            *byte = self.exchange_byte(idle)?;
        }
        Ok(())
    }

    /// Full duplex transfer, `out` and `inp` must have the same length
    fn exchange(&mut self, out: &[u8], inp: &mut [u8]) -> Result<()> {
        if out.len() != inp.len() {
            return Err(Error::InvalidArgument);
        }
        for (o, i) in out.iter().zip(inp.iter_mut()) {
            *i = self.exchange_byte(*o)?;
        }
        Ok(())
    }

    /// Clock `count` idle bytes, used for dummy cycles
    fn send_idle(&mut self, count: usize) -> Result<()> {
        let idle = self.idle_byte();
        for _ in 0..count {
            self.exchange_byte(idle)?;
        }
        Ok(())
    }

    /// Program the bus clock, returning the speed actually set in kHz
    fn set_speed_khz(&mut self, khz: u32) -> Result<u32>;

    /// Release the bus and return the pins to their idle state
    fn deactivate(&mut self);

    /// Busy-wait for the given number of microseconds
    fn delay_us(&mut self, us: u32);
}

impl<T: SpiTransport + ?Sized> SpiTransport for &mut T {
    fn select(&mut self, selected: bool) -> Result<()> {
        (**self).select(selected)
    }

    fn exchange_byte(&mut self, byte: u8) -> Result<u8> {
        (**self).exchange_byte(byte)
    }

    fn idle_byte(&self) -> u8 {
        (**self).idle_byte()
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).receive(buf)
    }

    fn exchange(&mut self, out: &[u8], inp: &mut [u8]) -> Result<()> {
        (**self).exchange(out, inp)
    }

    fn send_idle(&mut self, count: usize) -> Result<()> {
        (**self).send_idle(count)
    }

    fn set_speed_khz(&mut self, khz: u32) -> Result<u32> {
        (**self).set_speed_khz(khz)
    }

    fn deactivate(&mut self) {
        (**self).deactivate()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    /// Echoes every byte inverted and records what was clocked out
    #[derive(Default)]
    struct Loopback {
        sent: Vec<u8>,
        idle: u8,
    }

    impl SpiTransport for Loopback {
        fn select(&mut self, _selected: bool) -> Result<()> {
            Ok(())
        }

        fn exchange_byte(&mut self, byte: u8) -> Result<u8> {
            self.sent.push(byte);
            Ok(!byte)
        }

        fn idle_byte(&self) -> u8 {
            self.idle
        }

        fn set_speed_khz(&mut self, khz: u32) -> Result<u32> {
            Ok(khz)
        }

        fn deactivate(&mut self) {}

        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn test_receive_clocks_idle_byte() {
        let mut bus = Loopback::default();
        let mut buf = [0u8; 3];
        bus.receive(&mut buf).unwrap();
        assert_eq!(bus.sent, vec![0x00; 3]);
        assert_eq!(buf, [0xFF; 3]);

        bus.idle = 0xFF;
        bus.send_idle(2).unwrap();
        assert_eq!(&bus.sent[3..], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_exchange_full_duplex() {
        let mut bus = Loopback::default();
        let mut inp = [0u8; 2];
        bus.exchange(&[0x0F, 0xA5], &mut inp).unwrap();
        assert_eq!(inp, [0xF0, 0x5A]);

        let mut short = [0u8; 1];
        assert_eq!(
            bus.exchange(&[1, 2], &mut short).unwrap_err(),
            Error::InvalidArgument
        );
    }

    #[test]
    fn test_mut_ref_forwards() {
        fn send_through<T: SpiTransport>(mut transport: T) -> Result<()> {
            transport.send(&[1, 2, 3])
        }

        let mut bus = Loopback::default();
        send_through(&mut bus).unwrap();
        assert_eq!(bus.sent, vec![1, 2, 3]);
    }
}
