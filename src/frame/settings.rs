use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};
use bytes::BufMut;

use super::head::{Head, Kind, StreamId, HEADER_LEN};
use crate::error::Reason;

pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;
pub const DEFAULT_SETTINGS_HEADER_TABLE_SIZE: u32 = 4_096;

const ACK_FLAG: u8 = 0x1;

const HEADER_TABLE_SIZE: u16 = 0x1;
const ENABLE_PUSH: u16 = 0x2;
const MAX_CONCURRENT_STREAMS: u16 = 0x3;
const INITIAL_WINDOW_SIZE: u16 = 0x4;
const MAX_FRAME_SIZE: u16 = 0x5;
const MAX_HEADER_LIST_SIZE: u16 = 0x6;

/// An (unordered, deduplicated-by-last-write) set of SETTINGS parameters.
/// Ordering within a frame does not matter to the engine: only the final
/// value per identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingSet {
    values: BTreeMap<u16, u32>,
}

impl SettingSet {
    pub fn new() -> SettingSet {
        SettingSet::default()
    }

    pub fn set(&mut self, id: u16, value: u32) {
        self.values.insert(id, value);
    }

    pub fn header_table_size(&self) -> Option<u32> {
        self.values.get(&HEADER_TABLE_SIZE).copied()
    }

    pub fn enable_push(&self) -> Option<bool> {
        self.values.get(&ENABLE_PUSH).map(|&v| v != 0)
    }

    pub fn max_concurrent_streams(&self) -> Option<u32> {
        self.values.get(&MAX_CONCURRENT_STREAMS).copied()
    }

    pub fn initial_window_size(&self) -> Option<u32> {
        self.values.get(&INITIAL_WINDOW_SIZE).copied()
    }

    pub fn max_frame_size(&self) -> Option<u32> {
        self.values.get(&MAX_FRAME_SIZE).copied()
    }

    pub fn set_max_frame_size(&mut self, v: u32) {
        self.set(MAX_FRAME_SIZE, v);
    }

    pub fn max_header_list_size(&self) -> Option<u32> {
        self.values.get(&MAX_HEADER_LIST_SIZE).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, u32)> + '_ {
        self.values.iter().map(|(&k, &v)| (k, v))
    }
}

/// A SETTINGS frame, either carrying parameters or acknowledging a
/// previously-sent one.
#[derive(Debug, Clone)]
pub struct Settings {
    flag: u8,
    values: SettingSet,
}

impl Settings {
    pub fn new(values: SettingSet) -> Settings {
        Settings { flag: 0, values }
    }

    pub fn ack() -> Settings {
        Settings {
            flag: ACK_FLAG,
            values: SettingSet::new(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.flag & ACK_FLAG == ACK_FLAG
    }

    pub fn values(&self) -> &SettingSet {
        &self.values
    }

    pub fn into_values(self) -> SettingSet {
        self.values
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<Settings, Reason> {
        if !head.stream_id().is_zero() {
            return Err(Reason::ProtocolError);
        }

        let flag = head.flag();
        let is_ack = flag & ACK_FLAG == ACK_FLAG;

        if is_ack {
            if !payload.is_empty() {
                return Err(Reason::FrameSizeError);
            }
            return Ok(Settings {
                flag,
                values: SettingSet::new(),
            });
        }

        if payload.len() % 6 != 0 {
            return Err(Reason::FrameSizeError);
        }

        let mut values = SettingSet::new();
        for chunk in payload.chunks_exact(6) {
            let id = BigEndian::read_u16(&chunk[0..2]);
            let value = BigEndian::read_u32(&chunk[2..6]);
            values.set(id, value);
        }

        Ok(Settings { flag, values })
    }

    pub fn encode(&self, dst: &mut bytes::BytesMut) {
        let len = self.values.values.len() * 6;
        Head::new(Kind::Settings, self.flag, StreamId::ZERO).encode(len, dst);
        for (&id, &value) in &self.values.values {
            dst.put_u16(id);
            dst.put_u32(value);
        }
    }
}

pub const SETTINGS_FRAME_HEADER_LEN: usize = HEADER_LEN;
