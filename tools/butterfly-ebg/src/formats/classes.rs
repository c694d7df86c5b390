//! ebg.bearing_classes / ebg.entry_classes formats - interned intersection
//! classes, indexed by class id

use anyhow::Result;

use super::records::{Decoder, Record};
use crate::guidance::{BearingClass, EntryClass};

pub const BEARING_CLASSES_MAGIC: u32 = 0x45424243; // "EBBC"
pub const ENTRY_CLASSES_MAGIC: u32 = 0x45424543; // "EBEC"
pub const BEARING_CLASS_IDS_MAGIC: u32 = 0x45424249; // "EBBI"

impl Record for BearingClass {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.bearings().len() as u16).to_le_bytes());
        for bearing in self.bearings() {
            out.extend_from_slice(&bearing.to_le_bytes());
        }
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        let len = input.u16()?;
        let bearings = (0..len).map(|_| input.u16()).collect::<Result<Vec<_>>>()?;
        Ok(BearingClass::new(bearings))
    }
}

impl Record for EntryClass {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.bits().to_le_bytes());
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        Ok(EntryClass::from_bits(input.u32()?))
    }
}
