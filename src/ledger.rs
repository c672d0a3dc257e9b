use crate::error::LedgerError;
use chrono::{DateTime, Local};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
}

impl UsageRecord {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageRow {
    pub date: String,
    pub duration: String,
}

#[derive(Debug, Clone, Default)]
pub struct UsageLedger {
    records: Vec<UsageRecord>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a record at `t`. Returns false, leaving the ledger untouched, when
    /// a record is already open.
    pub fn record_start(&mut self, t: DateTime<Local>) -> bool {
        if self.open_record().is_some() {
            return false;
        }
        self.records.push(UsageRecord {
            started_at: t,
            ended_at: None,
        });
        true
    }

    pub fn record_stop(&mut self, t: DateTime<Local>) -> Result<&UsageRecord, LedgerError> {
        match self.records.last_mut() {
            Some(record) if record.is_open() => {
                record.ended_at = Some(t.max(record.started_at));
                Ok(record)
            }
            _ => Err(LedgerError::NoOpenRecord),
        }
    }

    pub fn open_record(&self) -> Option<&UsageRecord> {
        self.records.last().filter(|record| record.is_open())
    }

    pub fn records(&self) -> &[UsageRecord] {
        &self.records
    }

    pub fn closed_records(&self) -> Vec<UsageRow> {
        self.records
            .iter()
            .filter_map(|record| {
                let ended_at = record.ended_at?;
                Some(UsageRow {
                    date: record.started_at.format("%m/%d/%Y").to_string(),
                    duration: format_duration(record.started_at, ended_at),
                })
            })
            .collect()
    }
}

pub fn format_duration(start: DateTime<Local>, end: DateTime<Local>) -> String {
    let seconds = (end - start).num_seconds().max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    format!("{hours} hours {minutes} minutes")
}

pub fn format_total_usage(total_seconds: f64) -> String {
    let whole = total_seconds.max(0.0) as u64;
    format!("{} minutes and {} seconds", whole / 60, whole % 60)
}
