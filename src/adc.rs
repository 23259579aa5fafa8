/*!
  # Bit banged read of a serial ADC

  This implementation consumes the following hardware resources:
  - A chip-select output, active low.
  - A clock output.
  - A data input (MISO) that the converter shifts its result out on.

  One transaction selects the device, clocks in a fixed number of bits most
  significant bit first, and deselects it again. The data line is sampled
  while the clock is high.

  Note that the current implementation does not insert any setup or hold
  delay between pin toggles; the clock runs as fast as the pins can be
  driven.

  ## Example

  ```no_run
    use bitbang_adc::adc::{Adc, AdcReader, Error};
    use embedded_hal::digital::v2::{InputPin, OutputPin};

    fn sample<CS, CLK, MISO, E>(cs: CS, clk: CLK, miso: MISO) -> Result<u32, Error<E>>
    where
        CS: OutputPin<Error = E>,
        CLK: OutputPin<Error = E>,
        MISO: InputPin<Error = E>,
    {
        let mut adc = AdcReader::new(cs, clk, miso);
        adc.read()
    }
  ```
*/

use core::fmt;
use embedded_hal::digital::v2::{InputPin, OutputPin};

/// Width of one conversion result shifted out by the converter.
pub const SAMPLE_BITS: u8 = 32;

/// ADC read error
#[derive(Debug, Eq, PartialEq)]
pub enum Error<E> {
    /// GPIO error
    Bus(E),
    /// Bit count outside 1..=32
    InvalidBitCount(u8),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "GPIO error: {:?}", e),
            Error::InvalidBitCount(bits) => {
                write!(f, "invalid bit count {}, expected 1..={}", bits, SAMPLE_BITS)
            }
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for Error<E> {}

/// Something that produces one conversion result per call.
pub trait Adc {
    type Error;

    /// Run one complete transaction and return the sample.
    fn read(&mut self) -> Result<u32, Self::Error>;
}

/// Bit banging ADC reader
pub struct AdcReader<CS, CLK, MISO>
where
    CS: OutputPin,
    CLK: OutputPin,
    MISO: InputPin,
{
    cs: CS,
    clk: CLK,
    miso: MISO,
    bits: u8,
}

impl<CS, CLK, MISO, E> AdcReader<CS, CLK, MISO>
where
    CS: OutputPin<Error = E>,
    CLK: OutputPin<Error = E>,
    MISO: InputPin<Error = E>,
{
    /// Create a reader for a converter that shifts out `SAMPLE_BITS` bits.
    pub fn new(cs: CS, clk: CLK, miso: MISO) -> Self {
        AdcReader {
            cs,
            clk,
            miso,
            bits: SAMPLE_BITS,
        }
    }

    /// Create a reader for a converter with a narrower result.
    pub fn with_bits(cs: CS, clk: CLK, miso: MISO, bits: u8) -> Result<Self, Error<E>> {
        if bits == 0 || bits > SAMPLE_BITS {
            return Err(Error::InvalidBitCount(bits));
        }
        Ok(AdcReader { cs, clk, miso, bits })
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Give back the pins.
    pub fn release(self) -> (CS, CLK, MISO) {
        (self.cs, self.clk, self.miso)
    }

    fn shift_in(&mut self) -> Result<u32, Error<E>> {
        let mut data_in: u32 = 0;

        for bit in 0..self.bits {
            self.set_clk_high()?;

            if self.miso.is_high().map_err(Error::Bus)? {
                data_in |= 0x1;
            }

            if bit != self.bits - 1 {
                data_in <<= 1;
            }

            self.set_clk_low()?;
        }

        Ok(data_in)
    }

    #[inline]
    fn select(&mut self) -> Result<(), Error<E>> {
        self.cs.set_low().map_err(Error::Bus)
    }

    #[inline]
    fn deselect(&mut self) -> Result<(), Error<E>> {
        self.cs.set_high().map_err(Error::Bus)
    }

    #[inline]
    fn set_clk_high(&mut self) -> Result<(), Error<E>> {
        self.clk.set_high().map_err(Error::Bus)
    }

    #[inline]
    fn set_clk_low(&mut self) -> Result<(), Error<E>> {
        self.clk.set_low().map_err(Error::Bus)
    }
}

impl<CS, CLK, MISO, E> Adc for AdcReader<CS, CLK, MISO>
where
    CS: OutputPin<Error = E>,
    CLK: OutputPin<Error = E>,
    MISO: InputPin<Error = E>,
{
    type Error = Error<E>;

    fn read(&mut self) -> Result<u32, Self::Error> {
        self.select()?;

        let result = self.shift_in();

        // CS goes back high even when the clock loop failed
        let deselected = self.deselect();
        let sample = result?;
        deselected?;

        log::trace!("adc sample {:#010x}", sample);
        Ok(sample)
    }
}
