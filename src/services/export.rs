//! Spreadsheet exports (XLSX and CSV).

use chrono::{NaiveDate, NaiveTime};
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, XlsxError};
use serde::Deserialize;
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Hours(f64),
}

impl Cell {
    fn as_text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Hours(h) => format!("{h:.2}"),
        }
    }
}

pub trait ExportRow {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<Cell>;
}

#[derive(Debug, Clone)]
pub struct PointageExportRow {
    pub matricule: String,
    pub full_name: String,
    pub departement: Option<String>,
    pub date: NaiveDate,
    pub check_in: NaiveTime,
    pub check_out: Option<NaiveTime>,
    pub day_hours: f64,
    pub night_hours: f64,
    pub worked_hours: f64,
    pub normal_hours: f64,
    pub overtime_hours: f64,
}

impl ExportRow for PointageExportRow {
    fn headers() -> &'static [&'static str] {
        &[
            "Matricule",
            "Full Name",
            "Departement",
            "Date",
            "Check In",
            "Check Out",
            "Day Hours",
            "Night Hours",
            "Worked Hours",
            "Normal Hours",
            "Overtime Hours",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.matricule.clone()),
            Cell::Text(self.full_name.clone()),
            Cell::Text(self.departement.clone().unwrap_or_default()),
            Cell::Text(self.date.to_string()),
            Cell::Text(self.check_in.format("%H:%M").to_string()),
            Cell::Text(
                self.check_out
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_default(),
            ),
            Cell::Hours(self.day_hours),
            Cell::Hours(self.night_hours),
            Cell::Hours(self.worked_hours),
            Cell::Hours(self.normal_hours),
            Cell::Hours(self.overtime_hours),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct OvertimeExportRow {
    pub matricule: String,
    pub full_name: String,
    pub departement: Option<String>,
    pub days_worked: u32,
    pub worked_hours: f64,
    pub normal_hours: f64,
    pub overtime_hours: f64,
    pub night_hours: f64,
}

impl ExportRow for OvertimeExportRow {
    fn headers() -> &'static [&'static str] {
        &[
            "Matricule",
            "Full Name",
            "Departement",
            "Days Worked",
            "Worked Hours",
            "Normal Hours",
            "Overtime Hours",
            "Night Hours",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.matricule.clone()),
            Cell::Text(self.full_name.clone()),
            Cell::Text(self.departement.clone().unwrap_or_default()),
            Cell::Text(self.days_worked.to_string()),
            Cell::Hours(self.worked_hours),
            Cell::Hours(self.normal_hours),
            Cell::Hours(self.overtime_hours),
            Cell::Hours(self.night_hours),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct LeaveBalanceExportRow {
    pub matricule: String,
    pub full_name: String,
    pub hire_date: NaiveDate,
    pub accrued: f64,
    pub taken: f64,
    pub pending: f64,
    pub available: f64,
}

impl ExportRow for LeaveBalanceExportRow {
    fn headers() -> &'static [&'static str] {
        &[
            "Matricule",
            "Full Name",
            "Hire Date",
            "Accrued Days",
            "Taken Days",
            "Pending Days",
            "Available Days",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.matricule.clone()),
            Cell::Text(self.full_name.clone()),
            Cell::Text(self.hire_date.to_string()),
            Cell::Hours(self.accrued),
            Cell::Hours(self.taken),
            Cell::Hours(self.pending),
            Cell::Hours(self.available),
        ]
    }
}

/// Builds a single-sheet workbook: bold header row, frozen, with an
/// autofilter over the data.
pub fn to_xlsx<R: ExportRow>(sheet_name: &str, rows: &[R]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x4472C4))
        .set_font_color(Color::White)
        .set_border(FormatBorder::Thin);
    let hours_format = Format::new().set_num_format("0.00");

    let headers = R::headers();
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        worksheet.set_column_width(col as u16, (header.len() + 4).max(12) as f64)?;
    }

    for (idx, record) in rows.iter().enumerate() {
        let row = (idx + 1) as u32;
        for (col, cell) in record.cells().into_iter().enumerate() {
            match cell {
                Cell::Text(s) => {
                    worksheet.write_string(row, col as u16, s)?;
                }
                Cell::Hours(h) => {
                    worksheet.write_number_with_format(row, col as u16, h, &hours_format)?;
                }
            }
        }
    }

    if !rows.is_empty() {
        worksheet.autofilter(0, 0, rows.len() as u32, (headers.len() - 1) as u16)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    workbook.save_to_buffer()
}

pub fn to_csv<R: ExportRow>(rows: &[R]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(R::headers())?;
    for row in rows {
        writer.write_record(row.cells().iter().map(Cell::as_text))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!(e.to_string()))
}

pub fn render<R: ExportRow>(format: ExportFormat, sheet_name: &str, rows: &[R]) -> anyhow::Result<Vec<u8>> {
    match format {
        ExportFormat::Xlsx => Ok(to_xlsx(sheet_name, rows)?),
        ExportFormat::Csv => to_csv(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OvertimeExportRow {
        OvertimeExportRow {
            matricule: "EMP-001".into(),
            full_name: "Amina Benali".into(),
            departement: None,
            days_worked: 20,
            worked_hours: 170.5,
            normal_hours: 160.0,
            overtime_hours: 10.5,
            night_hours: 0.0,
        }
    }

    #[test]
    fn csv_has_header_and_formatted_hours() {
        let bytes = to_csv(&[sample()]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Matricule,Full Name,Departement,Days Worked,Worked Hours,Normal Hours,Overtime Hours,Night Hours"
        );
        assert_eq!(
            lines.next().unwrap(),
            "EMP-001,Amina Benali,,20,170.50,160.00,10.50,0.00"
        );
    }

    #[test]
    fn xlsx_is_a_zip_container() {
        let bytes = to_xlsx("Overtime", &[sample()]).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
