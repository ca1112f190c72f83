//! Typed header schema.
//!
//! The table is consumed by column NAME, never by fixed position. The
//! schema resolves every logical field to its column index once per cycle
//! and fails fast when a required column is missing. Columns the sync does
//! not interpret are passthrough: carried through updates and archived in
//! sheet order.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::SchemaError;
use crate::model::{CellValue, Record, Row};

/// Canonical column names.
pub mod columns {
    pub const TITLE: &str = "Title";
    pub const DESCRIPTION: &str = "Description";
    pub const START: &str = "Start";
    pub const END: &str = "End";
    pub const LOCATION: &str = "Location";
    pub const GUESTS: &str = "Guests";
    pub const COLOR: &str = "Color";
    pub const PROJECT: &str = "Project";
    pub const EVENT_ID: &str = "Event Id";
    pub const EVENT_UPDATED: &str = "Event Updated";
    pub const SYNCED_AT: &str = "Synced At";
    pub const EDITED_AT: &str = "Edited At";
    pub const ARCHIVE: &str = "Archive";
    pub const GANTT: &str = "Gantt";
}

/// All columns the sync interprets. Anything else is passthrough.
const REQUIRED: [&str; 14] = [
    columns::TITLE,
    columns::DESCRIPTION,
    columns::START,
    columns::END,
    columns::LOCATION,
    columns::GUESTS,
    columns::COLOR,
    columns::PROJECT,
    columns::EVENT_ID,
    columns::EVENT_UPDATED,
    columns::SYNCED_AT,
    columns::EDITED_AT,
    columns::ARCHIVE,
    columns::GANTT,
];

/// Resolved mapping of logical field -> column index.
#[derive(Debug, Clone)]
pub struct Schema {
    title: usize,
    description: usize,
    start: usize,
    end: usize,
    location: usize,
    guests: usize,
    color: usize,
    project: usize,
    event_id: usize,
    event_updated: usize,
    synced_at: usize,
    edited_at: usize,
    archive: usize,
    gantt: usize,
    /// Column indices not claimed by any field, in sheet order.
    passthrough: Vec<usize>,
    width: usize,
}

impl Schema {
    /// Resolve the schema from a header row. Every required column must be
    /// present; the error lists all missing names at once.
    pub fn resolve(header: &[String]) -> Result<Self, SchemaError> {
        let find = |name: &str| header.iter().position(|h| h == name);

        let missing: Vec<String> = REQUIRED
            .iter()
            .filter(|name| find(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError { missing });
        }

        let claimed: Vec<usize> = REQUIRED.iter().map(|n| find(n).unwrap()).collect();
        let passthrough = (0..header.len())
            .filter(|i| !claimed.contains(i))
            .collect();

        Ok(Schema {
            title: claimed[0],
            description: claimed[1],
            start: claimed[2],
            end: claimed[3],
            location: claimed[4],
            guests: claimed[5],
            color: claimed[6],
            project: claimed[7],
            event_id: claimed[8],
            event_updated: claimed[9],
            synced_at: claimed[10],
            edited_at: claimed[11],
            archive: claimed[12],
            gantt: claimed[13],
            passthrough,
            width: header.len(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// A fresh row of the right width, all cells empty.
    pub fn new_row(&self) -> Row {
        vec![CellValue::Empty; self.width]
    }

    fn cell<'a>(&self, row: &'a [CellValue], idx: usize) -> &'a CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        row.get(idx).unwrap_or(&EMPTY)
    }

    fn text(&self, row: &[CellValue], idx: usize) -> String {
        self.cell(row, idx).display()
    }

    fn set(&self, row: &mut Row, idx: usize, value: CellValue) {
        if row.len() < self.width {
            row.resize(self.width, CellValue::Empty);
        }
        row[idx] = value;
    }

    // Typed getters ------------------------------------------------------

    pub fn title(&self, row: &[CellValue]) -> String {
        self.text(row, self.title)
    }

    pub fn description(&self, row: &[CellValue]) -> String {
        self.text(row, self.description)
    }

    pub fn location(&self, row: &[CellValue]) -> String {
        self.text(row, self.location)
    }

    pub fn guests(&self, row: &[CellValue]) -> String {
        self.text(row, self.guests)
    }

    pub fn project(&self, row: &[CellValue]) -> String {
        self.text(row, self.project)
    }

    pub fn start(&self, row: &[CellValue]) -> Option<NaiveDateTime> {
        parse_table_datetime(self.cell(row, self.start))
    }

    pub fn end(&self, row: &[CellValue]) -> Option<NaiveDateTime> {
        parse_table_datetime(self.cell(row, self.end))
    }

    pub fn color(&self, row: &[CellValue]) -> Option<u8> {
        match self.cell(row, self.color) {
            CellValue::Number(n) if *n >= 0.0 && *n <= 255.0 => Some(*n as u8),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn event_id(&self, row: &[CellValue]) -> Option<String> {
        self.cell(row, self.event_id).as_text().map(str::to_string)
    }

    pub fn registered_at(&self, row: &[CellValue]) -> Option<DateTime<Utc>> {
        parse_timestamp(self.cell(row, self.event_updated))
    }

    pub fn synced_at(&self, row: &[CellValue]) -> Option<DateTime<Utc>> {
        parse_timestamp(self.cell(row, self.synced_at))
    }

    pub fn edited_at(&self, row: &[CellValue]) -> Option<DateTime<Utc>> {
        parse_timestamp(self.cell(row, self.edited_at))
    }

    pub fn archive_flag(&self, row: &[CellValue]) -> bool {
        self.cell(row, self.archive).is_checked()
    }

    pub fn gantt_flag(&self, row: &[CellValue]) -> bool {
        self.cell(row, self.gantt).is_checked()
    }

    /// Decoded snapshot of the tracked fields.
    pub fn record(&self, row: &[CellValue]) -> Record {
        Record {
            title: self.title(row),
            description: self.description(row),
            location: self.location(row),
            start: self.start(row),
            end: self.end(row),
            guests: self.guests(row),
            color: self.color(row),
            event_id: self.event_id(row),
            registered_at: self.registered_at(row),
            synced_at: self.synced_at(row),
            edited_at: self.edited_at(row),
            archive: self.archive_flag(row),
        }
    }

    // Typed setters ------------------------------------------------------

    pub fn set_title(&self, row: &mut Row, title: &str) {
        self.set(row, self.title, title.into());
    }

    pub fn set_description(&self, row: &mut Row, description: &str) {
        self.set(row, self.description, description.into());
    }

    pub fn set_location(&self, row: &mut Row, location: &str) {
        self.set(row, self.location, location.into());
    }

    pub fn set_guests(&self, row: &mut Row, guests: &str) {
        self.set(row, self.guests, guests.into());
    }

    pub fn set_color(&self, row: &mut Row, color: Option<u8>) {
        let value = match color {
            Some(c) => CellValue::Number(c as f64),
            None => CellValue::Empty,
        };
        self.set(row, self.color, value);
    }

    pub fn set_start(&self, row: &mut Row, start: Option<NaiveDateTime>) {
        self.set(row, self.start, datetime_cell(start));
    }

    pub fn set_end(&self, row: &mut Row, end: Option<NaiveDateTime>) {
        self.set(row, self.end, datetime_cell(end));
    }

    pub fn set_event_id(&self, row: &mut Row, id: Option<&str>) {
        self.set(row, self.event_id, id.unwrap_or("").into());
    }

    pub fn set_registered_at(&self, row: &mut Row, at: Option<DateTime<Utc>>) {
        self.set(row, self.event_updated, timestamp_cell(at));
    }

    pub fn set_synced_at(&self, row: &mut Row, at: Option<DateTime<Utc>>) {
        self.set(row, self.synced_at, timestamp_cell(at));
    }

    pub fn set_edited_at(&self, row: &mut Row, at: Option<DateTime<Utc>>) {
        self.set(row, self.edited_at, timestamp_cell(at));
    }

    pub fn set_archive_flag(&self, row: &mut Row, flagged: bool) {
        let value = if flagged {
            CellValue::Bool(true)
        } else {
            CellValue::Empty
        };
        self.set(row, self.archive, value);
    }

    // Archive layout -----------------------------------------------------

    /// Reorder a row into the fixed archive column order:
    /// title, description, start, end, location, guests, color, project,
    /// passthrough (sheet order), event id, event updated, synced at,
    /// edited at, gantt, archive. This order is an external contract.
    pub fn archive_row(&self, row: &[CellValue]) -> Row {
        let mut out = Vec::with_capacity(self.archive_width());
        for idx in [
            self.title,
            self.description,
            self.start,
            self.end,
            self.location,
            self.guests,
            self.color,
            self.project,
        ] {
            out.push(self.cell(row, idx).clone());
        }
        for &idx in &self.passthrough {
            out.push(self.cell(row, idx).clone());
        }
        for idx in [
            self.event_id,
            self.event_updated,
            self.synced_at,
            self.edited_at,
            self.gantt,
            self.archive,
        ] {
            out.push(self.cell(row, idx).clone());
        }
        out
    }

    pub fn archive_width(&self) -> usize {
        14 + self.passthrough.len()
    }

    /// Position of the event id column within an archive entry.
    pub fn archive_id_column(&self) -> usize {
        8 + self.passthrough.len()
    }
}

fn datetime_cell(dt: Option<NaiveDateTime>) -> CellValue {
    match dt {
        Some(dt) => CellValue::DateTime(dt),
        None => CellValue::Empty,
    }
}

fn timestamp_cell(at: Option<DateTime<Utc>>) -> CellValue {
    match at {
        Some(at) => CellValue::Text(at.to_rfc3339()),
        None => CellValue::Empty,
    }
}

/// Parse a date-bearing cell. Typed cells pass through; text cells accept
/// the table's display formats (`dd/mm/yy[yy]`, optional `HH:MM[:SS]`).
pub fn parse_table_datetime(cell: &CellValue) -> Option<NaiveDateTime> {
    match cell {
        CellValue::DateTime(dt) => Some(*dt),
        CellValue::Text(s) => parse_text_datetime(s.trim()),
        _ => None,
    }
}

fn parse_text_datetime(s: &str) -> Option<NaiveDateTime> {
    const WITH_TIME: [&str; 4] = [
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%d/%m/%y %H:%M:%S",
        "%d/%m/%y %H:%M",
    ];
    for fmt in WITH_TIME {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%d/%m/%Y", "%d/%m/%y"] {
        if let Ok(d) = chrono::NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(chrono::NaiveTime::MIN));
        }
    }
    None
}

fn parse_timestamp(cell: &CellValue) -> Option<DateTime<Utc>> {
    cell.as_text()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// The header a freshly created table gets.
pub fn default_header() -> Vec<String> {
    [
        columns::ARCHIVE,
        columns::TITLE,
        columns::DESCRIPTION,
        columns::START,
        columns::END,
        columns::LOCATION,
        columns::GUESTS,
        columns::COLOR,
        columns::PROJECT,
        "Stage",
        "Status",
        "Owner",
        "Contacts",
        "Planned Actions",
        "Priority",
        "Done Actions",
        "Notes",
        columns::EVENT_ID,
        columns::EVENT_UPDATED,
        columns::SYNCED_AT,
        columns::EDITED_AT,
        columns::GANTT,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
