//! Meter/load profiles and the processing strategy table.
//!
//! Each supported (meter type, load type) pair maps to a
//! [`ProcessingStrategy`]: the head group to resolve and the column that
//! identifies a record in reports.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::schema::HeadGroupKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeterType {
    SinglePhase,
    ThreePhase,
    LtCt,
}

impl MeterType {
    pub const ALL: [MeterType; 3] = [MeterType::SinglePhase, MeterType::ThreePhase, MeterType::LtCt];

    /// Label used by upload clients.
    pub fn label(&self) -> &'static str {
        match self {
            MeterType::SinglePhase => "Phase-1",
            MeterType::ThreePhase => "3-Phase",
            MeterType::LtCt => "LT_HTCT",
        }
    }

    /// Code stored on head groups.
    pub fn code(&self) -> &'static str {
        match self {
            MeterType::SinglePhase => "P-1",
            MeterType::ThreePhase => "P-3",
            MeterType::LtCt => "LTCT",
        }
    }
}

impl FromStr for MeterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        MeterType::ALL
            .into_iter()
            .find(|m| s.eq_ignore_ascii_case(m.label()) || s.eq_ignore_ascii_case(m.code()))
            .ok_or_else(|| s.to_string())
    }
}

impl fmt::Display for MeterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadType {
    BlockLoad,
    InstantaneousProfile,
}

impl LoadType {
    pub const ALL: [LoadType; 2] = [LoadType::BlockLoad, LoadType::InstantaneousProfile];

    pub fn label(&self) -> &'static str {
        match self {
            LoadType::BlockLoad => "Block Load",
            LoadType::InstantaneousProfile => "Instantaneous Profile",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LoadType::BlockLoad => "BL",
            LoadType::InstantaneousProfile => "IP",
        }
    }
}

impl FromStr for LoadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        LoadType::ALL
            .into_iter()
            .find(|l| s.eq_ignore_ascii_case(l.label()) || s.eq_ignore_ascii_case(l.code()))
            .ok_or_else(|| s.to_string())
    }
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How one meter/load combination is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingStrategy {
    pub meter_type: MeterType,
    pub load_type: LoadType,
    pub head_group: HeadGroupKey,
    pub record_key_field: String,
}

#[derive(Debug, Clone, Default)]
pub struct StrategyTable {
    strategies: HashMap<(MeterType, LoadType), ProcessingStrategy>,
}

impl StrategyTable {
    /// Every meter/load combination, keyed by `record_key_field`.
    pub fn standard(record_key_field: &str) -> Self {
        let mut table = Self::default();
        for meter_type in MeterType::ALL {
            for load_type in LoadType::ALL {
                table.register(ProcessingStrategy {
                    meter_type,
                    load_type,
                    head_group: HeadGroupKey::new(meter_type.code(), load_type.code()),
                    record_key_field: record_key_field.to_string(),
                });
            }
        }
        table
    }

    pub fn register(&mut self, strategy: ProcessingStrategy) {
        self.strategies
            .insert((strategy.meter_type, strategy.load_type), strategy);
    }

    pub fn get(&self, meter_type: MeterType, load_type: LoadType) -> Option<&ProcessingStrategy> {
        self.strategies.get(&(meter_type, load_type))
    }

    /// Look up by client-supplied labels or codes.
    pub fn lookup(&self, meter_type: &str, load_type: &str) -> Option<&ProcessingStrategy> {
        let meter = meter_type.parse::<MeterType>().ok()?;
        let load = load_type.parse::<LoadType>().ok()?;
        self.get(meter, load)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
