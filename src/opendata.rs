//! Probe of the optional open-data accessibility spreadsheet.
//!
//! The workbook is only inspected (sheet list and row count of the first
//! worksheet). Accessibility rates are not derived from it.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

const WORKSHEET_PREFIX: &str = "xl/worksheets/";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OpenDataProbe {
    Absent,
    Unreadable { error: String },
    Workbook { sheets: usize, first_sheet_rows: usize },
}

/// Inspects the spreadsheet at `path`. Never fails; problems are reported in the result.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn probe(path: &Path) -> OpenDataProbe {
    if !path.exists() {
        return OpenDataProbe::Absent;
    }
    match read_workbook(path) {
        Ok((sheets, first_sheet_rows)) => {
            info!(sheets, first_sheet_rows, "Open-data workbook found");
            OpenDataProbe::Workbook {
                sheets,
                first_sheet_rows,
            }
        }
        Err(e) => {
            warn!(error = %e, "Open-data workbook unreadable, using default rates");
            OpenDataProbe::Unreadable {
                error: e.to_string(),
            }
        }
    }
}

fn read_workbook(path: &Path) -> Result<(usize, usize)> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).context("not an xlsx (zip) container")?;

    let mut sheets: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(WORKSHEET_PREFIX) && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    if sheets.is_empty() {
        bail!("workbook has no worksheets");
    }
    sheets.sort();

    let mut xml = String::new();
    archive.by_name(&sheets[0])?.read_to_string(&mut xml)?;
    let rows = xml.matches("<row ").count() + xml.matches("<row>").count();

    Ok((sheets.len(), rows))
}
