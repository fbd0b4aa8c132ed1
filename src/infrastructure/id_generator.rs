// Snowflake ID Generator - time-ordered 64-bit ids with an embedded node id
// Ids double as a creation-order tie breaker when two rows share a millisecond

use std::sync::Mutex;

use crate::core::current_time_millis;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const TIMESTAMP_MASK: u64 = (1 << 41) - 1;
/// 2024-01-01T00:00:00Z, the zero point of the timestamp field.
const EPOCH_MILLIS: i64 = 1_704_067_200_000;

/// 64-bit ID format: [timestamp:41][node_id:10][sequence:12]
/// This allows for 1024 nodes and 4096 IDs per millisecond per node;
/// the top bit stays clear so ids are always positive `i64`s.
#[derive(Debug)]
pub struct IdGenerator {
    node_id: u16,
    state: Mutex<GeneratorState>,
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

impl IdGenerator {
    /// Create a generator for `node_id`; values above 1023 are masked.
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id: node_id & MAX_NODE_ID,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    pub fn next_id(&self) -> i64 {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut now = (current_time_millis() - EPOCH_MILLIS).max(0) as u64;
        // Never step backwards if the wall clock does.
        if now < state.last_timestamp {
            now = state.last_timestamp;
        }

        if now == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond, borrow the next one.
                now = state.last_timestamp + 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = now;

        let id = ((now & TIMESTAMP_MASK) << (NODE_BITS + SEQUENCE_BITS))
            | ((self.node_id as u64) << SEQUENCE_BITS)
            | state.sequence;
        id as i64
    }

    pub fn extract_node_id(id: i64) -> u16 {
        ((id as u64 >> SEQUENCE_BITS) & MAX_NODE_ID as u64) as u16
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }
}
