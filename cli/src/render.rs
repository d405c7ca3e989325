//! Text and JSON rendering of hourly VWAP snapshots.

use std::collections::HashSet;
use std::io::{self, Write};

use orderbook::clock::format_hms;
use orderbook::{LocateId, Order, SnapshotBoundary, SnapshotSink, Symbol, Vwap};
use serde::Serialize;

/// One output line per security per boundary.
#[derive(Debug, Serialize)]
pub struct SnapshotRow<'a> {
    pub at: String,
    pub seq: u64,
    pub late: bool,
    pub is_final: bool,
    pub locate: LocateId,
    pub symbol: &'a str,
    pub fills: u64,
    pub volume: u64,
    pub vwap: Option<f64>,
}

pub struct ReportSink<W> {
    out: W,
    json: bool,
    show_idle: bool,
    filter: Option<HashSet<String>>,
    header_seq: Option<u64>,
    rows: u64,
    error: Option<io::Error>,
}

impl<W: Write> ReportSink<W> {
    pub fn new(out: W, json: bool, show_idle: bool) -> Self {
        Self {
            out,
            json,
            show_idle,
            filter: None,
            header_seq: None,
            rows: 0,
            error: None,
        }
    }

    /// Only report these symbols.
    pub fn with_filter(mut self, symbols: Vec<String>) -> Self {
        if !symbols.is_empty() {
            self.filter = Some(symbols.into_iter().map(|s| s.to_uppercase()).collect());
        }
        self
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// First write error, if any; the sink stops writing after one.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_row(&mut self, boundary: &SnapshotBoundary, row: &SnapshotRow<'_>) -> io::Result<()> {
        if self.json {
            serde_json::to_writer(&mut self.out, row)?;
            return writeln!(self.out);
        }
        if self.header_seq != Some(boundary.seq) {
            self.write_header(boundary)?;
        }
        writeln!(self.out, "{}", format_row(row))
    }

    fn write_header(&mut self, boundary: &SnapshotBoundary) -> io::Result<()> {
        self.header_seq = Some(boundary.seq);
        writeln!(self.out, "\n{}", boundary_title(boundary))?;
        writeln!(
            self.out,
            "{:<8} {:>6} {:>8} {:>12} {:>14}",
            "SYMBOL", "LOCATE", "FILLS", "VOLUME", "VWAP"
        )
    }

    fn record(&mut self, result: io::Result<()>) {
        if let Err(err) = result {
            self.error.get_or_insert(err);
        }
    }
}

impl<W: Write> SnapshotSink for ReportSink<W> {
    fn on_hourly_snapshot(
        &mut self,
        boundary: &SnapshotBoundary,
        locate: LocateId,
        symbol: &Symbol,
        records: &[Order],
    ) {
        if self.error.is_some() {
            return;
        }
        if let Some(filter) = &self.filter {
            if !filter.contains(symbol.as_str()) {
                return;
            }
        }
        let vwap = Vwap::from_records(records);
        if vwap.is_empty() && !self.show_idle {
            return;
        }

        let row = SnapshotRow {
            at: format_hms(boundary.at),
            seq: boundary.seq,
            late: boundary.late,
            is_final: boundary.is_final,
            locate,
            symbol: symbol.as_str(),
            fills: vwap.fills,
            volume: vwap.volume,
            vwap: vwap.price(),
        };
        let result = self.write_row(boundary, &row);
        self.record(result);
        self.rows += 1;
    }

    fn on_boundary_complete(&mut self, boundary: &SnapshotBoundary) {
        if self.json || self.error.is_some() || self.header_seq == Some(boundary.seq) {
            return;
        }
        let result = writeln!(self.out, "\n{} (no executions)", boundary_title(boundary));
        self.record(result);
    }
}

pub fn boundary_title(boundary: &SnapshotBoundary) -> String {
    let kind = if boundary.is_final { "final" } else { "hourly" };
    let late = if boundary.late { " [late]" } else { "" };
    format!(
        "== {} {} snapshot #{}{} ==",
        format_hms(boundary.at),
        kind,
        boundary.seq,
        late
    )
}

pub fn format_row(row: &SnapshotRow<'_>) -> String {
    let vwap = row
        .vwap
        .map(|p| format!("{p:.4}"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<8} {:>6} {:>8} {:>12} {:>14}",
        row.symbol, row.locate, row.fills, row.volume, vwap
    )
}
