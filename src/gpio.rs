//! Linux sysfs pins for the ADC lines.
//!
//! Pins are exported and given a direction before use. Outputs are opened
//! with their idle level already applied, so the converter never sees a
//! spurious chip-select edge when the process starts.

use core::fmt;

use linux_embedded_hal::sysfs_gpio::{self, Direction};
use linux_embedded_hal::SysfsPin;
use log::{error, info, warn};

/// What a pin is used for, carried in open errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    ChipSelect,
    Clock,
    DataIn,
}

impl Role {
    /// Direction and initial level for this line.
    pub fn direction(self) -> Direction {
        match self {
            Role::ChipSelect => Direction::High,
            Role::Clock => Direction::Low,
            Role::DataIn => Direction::In,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::ChipSelect => "chip-select",
            Role::Clock => "clock",
            Role::DataIn => "data-in",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to open {role} pin {number}")]
pub struct OpenError {
    pub role: Role,
    pub number: u64,
    #[source]
    pub source: sysfs_gpio::Error,
}

/// Export pin `number` and configure it for `role`.
pub fn open(number: u64, role: Role) -> Result<SysfsPin, OpenError> {
    let pin = SysfsPin::new(number);
    let wrap = |source| OpenError {
        role,
        number,
        source,
    };

    pin.export().map_err(wrap)?;
    pin.set_direction(role.direction()).map_err(wrap)?;

    info!("opened {} pin {}", role, number);
    Ok(pin)
}

/// Unexport a pin opened with [`open`].
pub fn close(pin: SysfsPin) -> Result<(), sysfs_gpio::Error> {
    let number = pin.get_pin_num();
    pin.unexport()?;
    info!("released pin {}", number);
    Ok(())
}

/// The three lines of one converter.
pub struct AdcPins {
    pub cs: SysfsPin,
    pub clk: SysfsPin,
    pub miso: SysfsPin,
}

impl AdcPins {
    /// Unexport all three pins, reporting the first failure.
    pub fn close(self) -> Result<(), sysfs_gpio::Error> {
        let cs = close(self.cs);
        let clk = close(self.clk);
        let miso = close(self.miso);
        cs.and(clk).and(miso)
    }
}

/// Open chip-select, clock and data-in, stopping at the first failure.
///
/// Pins opened before the failing one are unexported again.
pub fn open_adc_pins(cs: u64, clk: u64, miso: u64) -> Result<AdcPins, OpenError> {
    let [cs, clk, miso] = open_all(
        [(cs, Role::ChipSelect), (clk, Role::Clock), (miso, Role::DataIn)],
        open,
        |pin| {
            if let Err(e) = close(pin) {
                warn!("could not release pin: {}", e);
            }
        },
    )
    .map_err(|e| {
        error!("{}: {}", e, e.source);
        e
    })?;
    Ok(AdcPins { cs, clk, miso })
}

fn open_all<P, O, C>(lines: [(u64, Role); 3], mut open: O, mut release: C) -> Result<[P; 3], OpenError>
where
    O: FnMut(u64, Role) -> Result<P, OpenError>,
    C: FnMut(P),
{
    let [(cs, cs_role), (clk, clk_role), (miso, miso_role)] = lines;

    let cs = open(cs, cs_role)?;
    let clk = match open(clk, clk_role) {
        Ok(pin) => pin,
        Err(e) => {
            release(cs);
            return Err(e);
        }
    };
    let miso = match open(miso, miso_role) {
        Ok(pin) => pin,
        Err(e) => {
            release(clk);
            release(cs);
            return Err(e);
        }
    };

    Ok([cs, clk, miso])
}
