use calamine::ExcelDateTime;
use chrono::NaiveDate;

/// Serial of 9999-12-31, the last date a spreadsheet can display.
const MAX_SERIAL: f64 = 2_958_465.0;

/// A date-formatted spreadsheet cell: days since the workbook's epoch.
///
/// The epoch is 1899-12-30 or, for workbooks using the 1904 date system,
/// 1904-01-01. Serials outside `0..=9999-12-31` are not dates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExcelSerial(ExcelDateTime);

impl ExcelSerial {
    pub fn in_range(&self) -> bool {
        let value = self.0.as_f64();
        value.is_finite() && (0.0..=MAX_SERIAL).contains(&value)
    }
}

impl From<ExcelDateTime> for ExcelSerial {
    fn from(value: ExcelDateTime) -> Self {
        Self(value)
    }
}

impl TryFrom<ExcelSerial> for NaiveDate {
    type Error = ();

    fn try_from(serial: ExcelSerial) -> Result<Self, Self::Error> {
        if !serial.in_range() {
            return Err(());
        }
        serial.0.as_datetime().map(|dt| dt.date()).ok_or(())
    }
}
