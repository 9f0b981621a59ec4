use scraper::{ElementRef, Html, Selector};
use tracing::{error, warn};

use crate::record::TrademarkRecord;
use crate::{Error, Result};

/// The main data table is the third one, unless that one is too short to be it.
const MIN_MAIN_TABLE_ROWS: usize = 5;

/// Attempts to parse the full detail page into a flat record.
///
/// The status lives in a red `<font>` in the second row of the second table of `#panelgetdetail`.
/// Without it the page is considered malformed. A missing data table after that is only logged,
/// leaving a record holding the status alone.
pub fn parse_detail(html: &str) -> Result<TrademarkRecord> {
    let doc = Html::parse_document(html);

    let table_selector = create_selector("#panelgetdetail table")?;
    let row_selector = create_selector("tr")?;
    let cell_selector = create_selector("td")?;
    let status_selector = create_selector(r#"font[color="red"]"#)?;

    let tables: Vec<ElementRef> = doc.select(&table_selector).collect();

    let status = tables
        .get(1)
        .and_then(|table| table.select(&row_selector).nth(1))
        .and_then(|row| row.select(&status_selector).next())
        .map(|font| font.text().collect::<String>().trim().to_string())
        .ok_or_else(|| {
            error!(tables = tables.len(), "Status structure not found on detail page");
            Error::MalformedPage(format!(
                "no status node in second table ({} tables under #panelgetdetail)",
                tables.len()
            ))
        })?;

    let mut record = TrademarkRecord::with_status(status);

    let main_table = match tables.get(2) {
        Some(third) if third.select(&row_selector).count() >= MIN_MAIN_TABLE_ROWS => Some(third),
        Some(_) => tables.get(3),
        None => None,
    };
    let Some(main_table) = main_table else {
        warn!(tables = tables.len(), "Couldn't find the main data table, keeping status only");
        return Ok(record);
    };

    for row in main_table.select(&row_selector) {
        let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
        if let [key, value] = cells.as_slice() {
            record.insert(joined_text(key, ""), joined_text(value, " "));
        }
    }

    Ok(record)
}

/// Trims every text node of the element, drops the empty ones and joins the rest with `sep`.
fn joined_text(el: &ElementRef, sep: &str) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

#[inline]
pub(crate) fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}
