//! Pure parsing of detail-view markup.

use crate::config::{DecedentFields, FieldSpec, RepresentativeRules};
use probate_records::{join_address, CaseIds, DecedentInfo, Representative};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            debug!("Invalid selector '{}': {:?}", css, e);
            None
        }
    }
}

/// Text of an element: trimmed text nodes joined by single spaces.
pub fn cell_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Nearest enclosing table row.
fn row_of(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "tr")
}

/// Cells of `row` itself, not of tables nested in it.
fn direct_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .collect()
}

pub fn has_match(html: &str, css: &str) -> bool {
    let Some(sel) = selector(css) else {
        return false;
    };
    Html::parse_document(html).select(&sel).next().is_some()
}

fn read_anchored(doc: &Html, anchor: &str, spec: &FieldSpec) -> Option<String> {
    let sel = selector(anchor)?;
    let row = row_of(doc.select(&sel).next()?)?;
    match spec.nested {
        Some(n) => {
            let nested = selector("table.base td")?;
            row.select(&nested).nth(n).map(cell_text)
        }
        None => direct_cells(row).get(spec.cell).map(|c| cell_text(*c)),
    }
}

fn read_labelled(doc: &Html, label: &str) -> Option<String> {
    let cells = selector("td, th")?;
    doc.select(&cells)
        .find(|c| cell_text(*c).starts_with(label))
        .and_then(|c| {
            c.next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "td")
        })
        .map(cell_text)
}

/// Value of one field, or an empty string.
pub fn read_field(doc: &Html, spec: &FieldSpec) -> String {
    let anchored = spec
        .anchor
        .as_deref()
        .and_then(|a| read_anchored(doc, a, spec))
        .filter(|v| !v.is_empty());
    anchored
        .or_else(|| {
            spec.label
                .as_deref()
                .and_then(|l| read_labelled(doc, l))
        })
        .unwrap_or_default()
}

/// Fields of the decedent tab. Missing fields are empty.
pub fn parse_decedent(html: &str, fields: &DecedentFields) -> DecedentInfo {
    let doc = Html::parse_document(html);
    let street = read_field(&doc, &fields.street);
    let city = read_field(&doc, &fields.city);
    let state = read_field(&doc, &fields.state);
    let zip = read_field(&doc, &fields.zip);
    let case_file_number = read_field(&doc, &fields.case_file_number);

    DecedentInfo {
        case_file_number: (!case_file_number.is_empty()).then_some(case_file_number),
        filing_date: read_field(&doc, &fields.filing_date),
        date_of_death: read_field(&doc, &fields.date_of_death),
        decedent_address: join_address([
            street.as_str(),
            city.as_str(),
            state.as_str(),
            zip.as_str(),
        ]),
    }
}

/// How one representatives row is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Name,
    Address,
    Other,
}

/// Short digit-free text is a name; text with a digit or a street keyword
/// continues the current address.
///
/// Digit-free short addresses such as "PO BOX" read as names.
pub fn classify_row(text: &str, rules: &RepresentativeRules) -> RowKind {
    let text = text.trim();
    if text.is_empty() {
        return RowKind::Other;
    }
    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    if !has_digit && text.chars().count() < rules.name_max_len {
        return RowKind::Name;
    }
    let upper = text.to_uppercase();
    if has_digit
        || rules
            .address_keywords
            .iter()
            .any(|k| upper.contains(k.as_str()))
    {
        return RowKind::Address;
    }
    RowKind::Other
}

/// Representatives of the representatives tab, in row order.
pub fn parse_representatives(html: &str, rules: &RepresentativeRules) -> Vec<Representative> {
    let Some(rows) = selector(&rules.row_selector) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    let mut reps: Vec<Representative> = Vec::new();
    // Address rows seen before the first name belong to that name.
    let mut pending = String::new();

    for row in doc.select(&rows) {
        let cells = direct_cells(row);
        let Some(cell) = cells.get(rules.cell) else {
            continue;
        };
        let text = cell_text(*cell);
        match classify_row(&text, rules) {
            RowKind::Name => {
                reps.push(Representative::new(text, std::mem::take(&mut pending)));
            }
            RowKind::Address => {
                let address = match reps.last_mut() {
                    Some(rep) => &mut rep.address,
                    None => {
                        debug!("Address row before any name: {}", text);
                        &mut pending
                    }
                };
                if !address.is_empty() {
                    address.push(' ');
                }
                address.push_str(&text);
            }
            RowKind::Other => debug!("Skipping representatives row: {}", text),
        }
    }
    reps
}

/// Case ids from the query string of a detail frame URL.
pub fn parse_case_ids(url: &str, id_param: &str, num_param: &str) -> CaseIds {
    let Some((_, query)) = url.split_once('?') else {
        return CaseIds::default();
    };
    let query = query.split('#').next().unwrap_or_default();
    let mut ids = CaseIds::default();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key == id_param {
            ids.case_file_id = value.into_owned();
        } else if key == num_param {
            ids.case_file_num = value.into_owned();
        }
    }
    ids
}
