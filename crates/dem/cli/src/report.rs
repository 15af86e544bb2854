//! Running a restoration offline and rendering the outcome.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use dem_memory::{
    BlockId, Collaborators, Component, InMemoryCore, InvariantViolation, MemoryEngine, MemoryFault,
    MemoryStats, RecordingFaults, RecordingPersistence, RestorationReport, Urgency,
};
use dem_types::{BankId, EventId, MemoryConfig, MemoryImage, SlotIndex, UdsStatus};
use serde::Serialize;

use crate::error::CliResult;

/// Report output format
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON document
    Json,
}

#[derive(Debug, Serialize)]
pub struct BankChronology {
    pub bank: BankId,
    /// Owners, oldest first.
    pub entries: Vec<ChronologyEntry>,
}

#[derive(Debug, Serialize)]
pub struct ChronologyEntry {
    pub slot: SlotIndex,
    pub event: Option<EventId>,
    pub timestamp: u32,
}

#[derive(Debug, Serialize)]
pub struct FaultRecord {
    pub component: Component,
    pub fault: MemoryFault,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DirtyBlock {
    pub block: BlockId,
    pub urgency: Urgency,
}

/// Everything observable after restoring one image.
#[derive(Debug, Serialize)]
pub struct RestoreSummary {
    pub restoration: RestorationReport,
    pub stats: MemoryStats,
    pub chronology: Vec<BankChronology>,
    pub statuses: BTreeMap<EventId, UdsStatus>,
    pub dirty_blocks: Vec<DirtyBlock>,
    pub faults: Vec<FaultRecord>,
    pub violations: Vec<InvariantViolation>,
}

/// Restore `image` against `config` with in-memory collaborators.
///
/// Returns the summary and the repaired image.
pub fn restore(
    config: MemoryConfig,
    image: &MemoryImage,
) -> CliResult<(RestoreSummary, MemoryImage)> {
    let core = InMemoryCore::new();
    let persistence = RecordingPersistence::new();
    let faults = RecordingFaults::new();
    let mut engine = MemoryEngine::new(
        config,
        Collaborators::new(persistence.clone(), core.clone(), faults.clone()),
    )?;

    engine.load_image(&image.entries);
    let restoration = engine.restore_all();

    let chronology = restoration
        .banks
        .iter()
        .map(|report| BankChronology {
            bank: report.bank,
            entries: engine
                .chronological_slots(report.bank)
                .into_iter()
                .map(|slot| {
                    let entry = engine.entry(slot);
                    ChronologyEntry {
                        slot,
                        event: entry.and_then(|e| e.event_id),
                        timestamp: entry.map_or(0, |e| e.timestamp),
                    }
                })
                .collect(),
        })
        .collect();

    let summary = RestoreSummary {
        stats: engine.stats(),
        chronology,
        statuses: core.statuses(),
        dirty_blocks: persistence
            .dirty_blocks()
            .into_iter()
            .map(|(block, urgency)| DirtyBlock { block, urgency })
            .collect(),
        faults: faults
            .faults()
            .into_iter()
            .map(|(component, fault)| FaultRecord {
                component,
                message: fault.to_string(),
                fault,
            })
            .collect(),
        violations: engine.verify(),
        restoration,
    };
    Ok((summary, engine.image()))
}

pub fn render(summary: &RestoreSummary, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
        OutputFormat::Text => Ok(render_text(summary)),
    }
}

fn render_text(summary: &RestoreSummary) -> String {
    let mut out = String::new();
    for (report, chronology) in summary.restoration.banks.iter().zip(&summary.chronology) {
        let _ = writeln!(
            out,
            "{}: {} restored, {} corrupt cleared, {} duplicates dropped, {} root causes",
            report.bank,
            report.restored,
            report.cleared_corrupt,
            report.dropped_duplicates,
            report.root_causes
        );
        for entry in &chronology.entries {
            let owner = entry.event.map_or_else(|| "-".to_string(), |e| e.to_string());
            let _ = writeln!(out, "  {} {} @{}", entry.slot, owner, entry.timestamp);
        }
    }
    for (event, status) in &summary.statuses {
        let _ = writeln!(out, "{event} status {status}");
    }
    for fault in &summary.faults {
        let _ = writeln!(out, "fault [{:?}] {}", fault.component, fault.message);
    }
    for violation in &summary.violations {
        let _ = writeln!(out, "violation {violation}");
    }
    let _ = writeln!(
        out,
        "next timestamp {}, {} blocks to rewrite",
        summary.restoration.next_timestamp,
        summary.dirty_blocks.len()
    );
    out
}
