//! Checksum command implementation

use bootflash_core::flash::{self, HashSink, SpiFlash, STAGING_BUFFER_SIZE};
use crc::{Crc, Digest, CRC_32_ISO_HDLC};

use super::progress::IndicatifProgress;
use crate::cli::RangeArgs;
use crate::error::Result;
use crate::session::Session;

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-32 digest fed by the flash engine
struct Crc32Sink(Digest<'static, u32>);

impl HashSink for Crc32Sink {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }
}

/// Run the checksum command
pub fn run_checksum(session: &mut Session, range: RangeArgs) -> Result<()> {
    let found = session.detect()?;

    let mut staging = vec![0u8; STAGING_BUFFER_SIZE];
    let mut sink = Crc32Sink(CRC32.digest());
    let mut device = SpiFlash::new(session.transport(), found.descriptor);
    flash::checksum(
        &mut device,
        &mut staging,
        range.start,
        range.end,
        &mut sink,
        &mut IndicatifProgress::new(),
    )?;

    println!(
        "CRC-32 of 0x{:08X} - 0x{:08X}: 0x{:08X}",
        range.start,
        range.end,
        sink.0.finalize()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_sink_matches_one_shot() {
        let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        let mut sink = Crc32Sink(CRC32.digest());
        for chunk in data.chunks(300) {
            sink.update(chunk);
        }
        assert_eq!(sink.0.finalize(), CRC32.checksum(&data));
    }
}
