//! Mapping from registry tags to Modbus data points.
//!
//! Registry addresses use the conventional 1-based numbering where the
//! leading digit selects the data table:
//!
//! | Band            | Logical range | Table            |
//! |-----------------|---------------|------------------|
//! | Coils           | 1-9999        | read coils       |
//! | Discrete inputs | 10001-19999   | read discrete    |
//! | Holding         | 40001-49999   | read holding     |
//!
//! The wire offset is `address - band_base`.

use scadalink_common::{Encoding, Tag, TagClass};

use crate::decoder::{DecodeError, RawPayload};
use crate::transport::{ModbusTransport, TransportError};

/// Number of addresses in each band.
pub const BAND_WIDTH: u32 = 9999;

/// Address numbering band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressBand {
    Coil,
    DiscreteInput,
    HoldingRegister,
}

impl AddressBand {
    /// First logical address of the band.
    pub const fn base(self) -> u32 {
        match self {
            AddressBand::Coil => 1,
            AddressBand::DiscreteInput => 10001,
            AddressBand::HoldingRegister => 40001,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AddressBand::Coil => "coil",
            AddressBand::DiscreteInput => "discrete input",
            AddressBand::HoldingRegister => "holding register",
        }
    }

    /// Convert a logical registry address into a zero-based wire offset.
    pub fn offset(self, address: u32) -> Result<u16, DecodeError> {
        let base = self.base();
        if address < base || address >= base + BAND_WIDTH {
            return Err(DecodeError::AddressOutOfBand {
                address,
                band: self.as_str(),
            });
        }
        // BAND_WIDTH < u16::MAX so this always fits
        Ok((address - base) as u16)
    }
}

/// One tag resolved to what must be read from the controller and how to
/// interpret it. Each variant owns its address mapping and decode rule.
#[derive(Debug, Clone, PartialEq)]
pub enum ModbusPoint {
    /// Two consecutive holding registers (AI/AO).
    Analog { offset: u16, encoding: Encoding },
    /// Single discrete input bit (DI).
    DiscreteInput { offset: u16 },
    /// Single coil bit (DO).
    Coil { offset: u16 },
    /// Class the agent does not know how to read. Nothing goes on the wire.
    Unsupported { class: String },
}

/// Registers fetched for every analog tag, whatever its encoding.
pub const ANALOG_REGISTER_COUNT: u16 = 2;

impl ModbusPoint {
    /// Resolve a registry tag to a point.
    pub fn resolve(tag: &Tag) -> Result<Self, DecodeError> {
        let offset = |band: AddressBand| {
            tag.address
                .ok_or(DecodeError::MissingAddress)
                .and_then(|address| band.offset(address))
        };

        Ok(match &tag.class {
            TagClass::AnalogInput | TagClass::AnalogOutput => ModbusPoint::Analog {
                offset: offset(AddressBand::HoldingRegister)?,
                encoding: tag.encoding.clone(),
            },
            TagClass::DigitalInput => ModbusPoint::DiscreteInput {
                offset: offset(AddressBand::DiscreteInput)?,
            },
            TagClass::DigitalOutput => ModbusPoint::Coil {
                offset: offset(AddressBand::Coil)?,
            },
            TagClass::Unknown(class) => ModbusPoint::Unsupported {
                class: class.clone(),
            },
        })
    }

    /// Fetch the raw data for this point.
    pub async fn read<T: ModbusTransport>(
        &self,
        transport: &mut T,
    ) -> Result<RawPayload, TransportError> {
        match self {
            ModbusPoint::Analog { offset, .. } => transport
                .read_holding_registers(*offset, ANALOG_REGISTER_COUNT)
                .await
                .map(RawPayload::Registers),
            ModbusPoint::DiscreteInput { offset } => transport
                .read_discrete_inputs(*offset, 1)
                .await
                .map(RawPayload::Bits),
            ModbusPoint::Coil { offset } => {
                transport.read_coils(*offset, 1).await.map(RawPayload::Bits)
            }
            ModbusPoint::Unsupported { .. } => Ok(RawPayload::Empty),
        }
    }

    /// Interpret a raw payload as the tag's numeric value.
    pub fn decode(&self, payload: &RawPayload) -> Result<f64, DecodeError> {
        match (self, payload) {
            (ModbusPoint::Analog { encoding, .. }, RawPayload::Registers(regs)) => {
                decode_registers(encoding, regs)
            }
            (ModbusPoint::DiscreteInput { .. } | ModbusPoint::Coil { .. }, RawPayload::Bits(bits)) => {
                bits.first()
                    .map(|&on| if on { 1.0 } else { 0.0 })
                    .ok_or(DecodeError::MalformedPayload {
                        expected: 1,
                        actual: 0,
                    })
            }
            (ModbusPoint::Unsupported { class }, _) => {
                Err(DecodeError::UnsupportedClass(class.clone()))
            }
            _ => Err(DecodeError::PayloadKindMismatch),
        }
    }
}

/// Decode two big-endian registers. 16-bit encodings use the first
/// (lowest-addressed) register.
pub fn decode_registers(encoding: &Encoding, regs: &[u16]) -> Result<f64, DecodeError> {
    let &[high, low, ..] = regs else {
        return Err(DecodeError::MalformedPayload {
            expected: ANALOG_REGISTER_COUNT as usize,
            actual: regs.len(),
        });
    };
    let word = ((high as u32) << 16) | (low as u32);

    Ok(match encoding {
        Encoding::Float32 => f32::from_bits(word) as f64,
        Encoding::Uint32 => word as f64,
        Encoding::Int16 => high as i16 as f64,
        Encoding::Uint16 | Encoding::Other(_) => high as f64,
    })
}
