use super::{DocumentConverter, ReadSeek};
use crate::classify::StreamInfo;
use crate::config::ConversionConfig;
use crate::error::ConverterError;
use crate::output::ConversionResult;

/// Modern Excel workbooks (.xlsx, .xlsm, .xlsb).
pub struct XlsxConverter {
    config: ConversionConfig,
}

/// Legacy Excel workbooks (.xls).
pub struct XlsConverter {
    config: ConversionConfig,
}

impl XlsxConverter {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl XlsConverter {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl DocumentConverter for XlsxConverter {
    fn name(&self) -> &'static str {
        "XlsxConverter"
    }

    fn convert(
        &self,
        stream: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError> {
        convert_workbook(self.name(), ".xlsx", stream, &self.config)
    }
}

impl DocumentConverter for XlsConverter {
    fn name(&self) -> &'static str {
        "XlsConverter"
    }

    fn convert(
        &self,
        stream: &mut dyn ReadSeek,
        _info: &StreamInfo,
    ) -> Result<ConversionResult, ConverterError> {
        convert_workbook(self.name(), ".xls", stream, &self.config)
    }
}

/// Every sheet becomes `## <name>` followed by a Markdown table; with
/// chunking on, chunks carry the sheet index as their page id.
#[cfg(feature = "office")]
fn convert_workbook(
    _converter: &'static str,
    _extension: &'static str,
    stream: &mut dyn ReadSeek,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConverterError> {
    use super::markdown_table;
    use calamine::{open_workbook_auto_from_rs, Reader};
    use std::io::Cursor;
    use tracing::{debug, warn};

    let bytes = super::read_all(stream)?;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.as_slice()))
        .map_err(|e| ConverterError::backend("calamine", e))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(ConverterError::Malformed("no sheets found in workbook".into()));
    }

    let mut sections = Vec::with_capacity(sheet_names.len());
    for name in &sheet_names {
        match workbook.worksheet_range(name) {
            Ok(range) => {
                let rows: Vec<Vec<String>> = range
                    .rows()
                    .map(|row| row.iter().map(cell_to_string).collect())
                    .collect();
                debug!("Sheet '{}': {} rows", name, rows.len());
                sections.push(format!("## {name}\n\n{}", markdown_table(&rows)));
            }
            Err(e) => warn!("Skipping sheet '{}': {}", name, e),
        }
    }

    Ok(super::finish_sections(&sections, None, config))
}

#[cfg(not(feature = "office"))]
fn convert_workbook(
    converter: &'static str,
    extension: &'static str,
    _stream: &mut dyn ReadSeek,
    _config: &ConversionConfig,
) -> Result<ConversionResult, ConverterError> {
    Err(ConverterError::missing_dependency(converter, extension, "office"))
}

#[cfg(feature = "office")]
fn cell_to_string(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{:?}", e),
    }
}
