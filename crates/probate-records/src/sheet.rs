use std::io::Write;

use csv::{Terminator, WriterBuilder};

use crate::{CaseRecord, Result};

/// Column order of every month sheet.
pub const HEADERS: [&str; 8] = [
    "filing_date",
    "case_file_number",
    "caseFileNum",
    "caseFileId",
    "date_of_death",
    "decedent_address",
    "representative_name",
    "representative_address",
];

fn to_row(record: &CaseRecord) -> [&str; 8] {
    [
        record.filing_date.as_str(),
        record.case_file_number.as_deref().unwrap_or(""),
        record.case_file_num_alt.as_str(),
        record.case_file_id.as_str(),
        record.date_of_death.as_str(),
        record.decedent_address.as_str(),
        record.representative_name.as_str(),
        record.representative_address.as_str(),
    ]
}

/// Write one month sheet: header row, then one CRLF-terminated line per
/// record.
pub fn write_sheet<W: Write>(w: W, records: &[&CaseRecord]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .from_writer(w);
    wtr.write_record(HEADERS)?;
    for record in records {
        wtr.write_record(to_row(record))?;
    }
    wtr.flush()?;
    Ok(())
}
