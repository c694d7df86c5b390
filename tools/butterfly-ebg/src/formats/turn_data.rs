//! ebg.turn_data / ebg.turn_index formats - per-turn guidance data and the
//! (from, via, to) node triple of every turn
//!
//! The turn index is the only table written while turns are still being
//! generated, through a [`TurnIndexSink`].

use anyhow::Result;
use butterfly_common::{EntryClassId, LaneDataId, NodeId};
use std::io;
use std::path::Path;

use super::records::{Decoder, Record, RecordWriter};
use crate::guidance::{TurnBearing, TurnInstruction};

pub const TURN_DATA_MAGIC: u32 = 0x45425444; // "EBTD"
pub const TURN_INDEX_MAGIC: u32 = 0x45425449; // "EBTI"

/// Guidance data of one turn, indexed by turn id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnData {
    pub instruction: TurnInstruction,
    pub lane_data_id: LaneDataId,
    pub entry_class_id: EntryClassId,
    /// Heading when arriving at the intersection
    pub pre_turn_bearing: TurnBearing,
    /// Heading when leaving the intersection
    pub post_turn_bearing: TurnBearing,
}

impl Record for TurnData {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.instruction.to_bytes());
        out.extend_from_slice(&self.lane_data_id.to_le_bytes());
        out.extend_from_slice(&self.entry_class_id.to_le_bytes());
        out.extend_from_slice(&self.pre_turn_bearing.0.to_le_bytes());
        out.extend_from_slice(&self.post_turn_bearing.0.to_le_bytes());
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        let raw = [input.u8()?, input.u8()?];
        let instruction = TurnInstruction::from_bytes(raw)
            .ok_or_else(|| anyhow::anyhow!("invalid turn instruction {raw:?}"))?;
        Ok(Self {
            instruction,
            lane_data_id: input.u16()?,
            entry_class_id: input.u32()?,
            pre_turn_bearing: TurnBearing(input.u16()?),
            post_turn_bearing: TurnBearing(input.u16()?),
        })
    }
}

/// Node triple of a turn: last node before the intersection, the
/// intersection, first node after it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnIndexBlock {
    pub from: NodeId,
    pub via: NodeId,
    pub to: NodeId,
}

impl Record for TurnIndexBlock {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.from.to_le_bytes());
        out.extend_from_slice(&self.via.to_le_bytes());
        out.extend_from_slice(&self.to.to_le_bytes());
    }

    fn decode(input: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            from: input.u32()?,
            via: input.u32()?,
            to: input.u32()?,
        })
    }
}

/// Receives turn index blocks in final turn order.
pub trait TurnIndexSink {
    fn append(&mut self, blocks: &[TurnIndexBlock]) -> io::Result<()>;
}

impl TurnIndexSink for Vec<TurnIndexBlock> {
    fn append(&mut self, blocks: &[TurnIndexBlock]) -> io::Result<()> {
        self.extend_from_slice(blocks);
        Ok(())
    }
}

/// Streams the turn index straight into `ebg.turn_index`.
pub struct TurnIndexWriter {
    writer: RecordWriter,
}

impl TurnIndexWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self {
            writer: RecordWriter::create(path, TURN_INDEX_MAGIC)?,
        })
    }

    pub fn count(&self) -> u64 {
        self.writer.count()
    }

    pub fn finish(self) -> io::Result<u64> {
        self.writer.finish()
    }
}

impl TurnIndexSink for TurnIndexWriter {
    fn append(&mut self, blocks: &[TurnIndexBlock]) -> io::Result<()> {
        for block in blocks {
            self.writer.push(block)?;
        }
        Ok(())
    }
}
