use crate::analytics::{RateReport, ReportKind};
use crate::domain::filters::{DepartmentFilter, ReportQuery};
use crate::domain::period::month_name;
use csv::WriterBuilder;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn filename_part(raw: &str) -> String {
    raw.trim().replace(' ', "_")
}

/// `{Kind}_Analytics_{year}_{department}_{month}.csv`
pub fn export_filename(kind: ReportKind, query: &ReportQuery) -> String {
    let department = match &query.department {
        DepartmentFilter::All => "All_Departments".to_string(),
        DepartmentFilter::Named(name) => filename_part(name),
    };
    let month = query
        .period
        .month
        .map(|m| month_name(m).to_string())
        .unwrap_or_else(|| "All_Months".to_string());
    format!(
        "{}_Analytics_{}_{}_{}.csv",
        kind.export_title(),
        query.period.year,
        department,
        month
    )
}

fn optional(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ExportError> {
    wtr.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// Bucket table, a blank line, then the department table with one extra
/// column per recognition category or survey.
pub fn render_csv(report: &RateReport) -> Result<Vec<u8>, ExportError> {
    let mut wtr = WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record(["Period", report.kind.rate_label(), "Count", "Maximum"])?;
    for bucket in &report.buckets {
        wtr.write_record(&[
            bucket.label.clone(),
            format!("{:.2}", bucket.rate),
            bucket.count.to_string(),
            optional(bucket.maximum),
        ])?;
    }
    let mut out = finish(wtr)?;
    out.push(b'\n');

    let columns = report.category_columns();
    let mut wtr = WriterBuilder::new().from_writer(out);
    let mut header = vec![
        "Department".to_string(),
        "Employees".to_string(),
        "Count".to_string(),
        report.kind.rate_label().to_string(),
        "Maximum".to_string(),
    ];
    header.extend(columns.iter().cloned());
    wtr.write_record(&header)?;

    for row in &report.departments {
        let mut record = vec![
            row.department.clone(),
            row.employees.to_string(),
            row.count.to_string(),
            format!("{:.2}", row.rate),
            optional(row.maximum),
        ];
        record.extend(
            columns
                .iter()
                .map(|c| row.categories.get(c).copied().unwrap_or(0).to_string()),
        );
        wtr.write_record(&record)?;
    }
    finish(wtr)
}
