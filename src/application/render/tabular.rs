//! Table renderers: Stata `.dta` headers and delimited text.

use std::fs;
use std::path::Path;

use ammonia::clean_text;
use csv::ReaderBuilder;

use super::types::RendererError;

pub const MAX_TABLE_ROWS: usize = 1000;

const SUPPORTED_STATA_VERSIONS: [u8; 6] = [104, 105, 108, 113, 114, 115];
const STATA_XML_MAGIC: &[u8] = b"<stata_dta>";
const STATA_FIXED_HEADER: usize = 10;
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StataVariable {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StataHeader {
    pub version: u8,
    pub observations: u32,
    pub label: String,
    pub variables: Vec<StataVariable>,
}

pub fn render_stata(path: &Path) -> Result<String, RendererError> {
    let bytes = fs::read(path)?;
    let header = parse_stata_header(&bytes)?;

    let mut html = String::from("<div class=\"quire-table\">\n");
    if !header.label.is_empty() {
        html.push_str(&format!("<h4>{}</h4>\n", clean_text(&header.label)));
    }
    html.push_str(&format!(
        "<p>{} observations, {} variables (Stata format {})</p>\n",
        header.observations,
        header.variables.len(),
        header.version
    ));
    html.push_str("<table class=\"table\">\n<thead><tr><th>Variable</th><th>Type</th></tr></thead>\n<tbody>\n");
    for variable in &header.variables {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            clean_text(&variable.name),
            clean_text(&variable.type_name)
        ));
    }
    html.push_str("</tbody>\n</table>\n</div>");
    Ok(html)
}

/// Parse the fixed header, type list and variable names of a binary `.dta` file.
pub fn parse_stata_header(bytes: &[u8]) -> Result<StataHeader, RendererError> {
    if bytes.is_empty() {
        return Err(RendererError::blank_or_corrupt("file is empty"));
    }
    if bytes.starts_with(STATA_XML_MAGIC) {
        return Err(RendererError::StataVersion {
            version: "117+".to_string(),
        });
    }

    let version = bytes[0];
    if !SUPPORTED_STATA_VERSIONS.contains(&version) {
        return Err(RendererError::StataVersion {
            version: version.to_string(),
        });
    }
    if bytes.len() < STATA_FIXED_HEADER {
        return Err(RendererError::blank_or_corrupt("truncated header"));
    }

    let big_endian = match bytes[1] {
        1 => true,
        2 => false,
        other => {
            return Err(RendererError::blank_or_corrupt(format!(
                "unknown byte order marker {other}"
            )));
        }
    };

    let nvar = if big_endian {
        u16::from_be_bytes([bytes[4], bytes[5]])
    } else {
        u16::from_le_bytes([bytes[4], bytes[5]])
    } as usize;
    let nobs_bytes = [bytes[6], bytes[7], bytes[8], bytes[9]];
    let observations = if big_endian {
        u32::from_be_bytes(nobs_bytes)
    } else {
        u32::from_le_bytes(nobs_bytes)
    };

    let label_len = if version >= 108 { 81 } else { 32 };
    let timestamp_len = if version >= 105 { 18 } else { 0 };
    let name_len = if version >= 110 { 33 } else { 9 };

    let label_end = STATA_FIXED_HEADER + label_len;
    let types_start = label_end + timestamp_len;
    let names_start = types_start + nvar;
    let names_end = names_start + nvar * name_len;
    if bytes.len() < names_end {
        return Err(RendererError::blank_or_corrupt(
            "file ends before the variable list",
        ));
    }

    let label = c_string(&bytes[STATA_FIXED_HEADER..label_end]);
    let variables = bytes[types_start..names_start]
        .iter()
        .zip(bytes[names_start..names_end].chunks(name_len))
        .map(|(&code, name)| {
            Ok(StataVariable {
                name: c_string(name),
                type_name: stata_type_name(version, code)?,
            })
        })
        .collect::<Result<Vec<_>, RendererError>>()?;

    Ok(StataHeader {
        version,
        observations,
        label,
        variables,
    })
}

fn stata_type_name(version: u8, code: u8) -> Result<String, RendererError> {
    let name = if version >= 113 {
        match code {
            251 => "byte".to_string(),
            252 => "int".to_string(),
            253 => "long".to_string(),
            254 => "float".to_string(),
            255 => "double".to_string(),
            1..=244 => format!("str{code}"),
            _ => return Err(unknown_type(code)),
        }
    } else {
        match code {
            b'b' => "byte".to_string(),
            b'i' => "int".to_string(),
            b'l' => "long".to_string(),
            b'f' => "float".to_string(),
            b'd' => "double".to_string(),
            128..=255 => format!("str{}", code - 127),
            _ => return Err(unknown_type(code)),
        }
    };
    Ok(name)
}

fn unknown_type(code: u8) -> RendererError {
    RendererError::blank_or_corrupt(format!("unknown variable type code {code}"))
}

fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

pub fn render_delimited(path: &Path, delimiter: u8) -> Result<String, RendererError> {
    let bytes = fs::read(path)?;
    let rows = parse_delimited(&bytes, delimiter)?;

    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Err(RendererError::blank_or_corrupt("no rows"));
    };

    let mut html = String::from("<div class=\"quire-table\">\n<table class=\"table\">\n<thead><tr>");
    for cell in &header {
        html.push_str(&format!("<th>{}</th>", clean_text(cell)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    let mut shown = 0usize;
    let mut total = 0usize;
    for row in rows {
        total += 1;
        if shown == MAX_TABLE_ROWS {
            continue;
        }
        shown += 1;
        html.push_str("<tr>");
        for cell in &row {
            html.push_str(&format!("<td>{}</td>", clean_text(cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");
    if total > shown {
        html.push_str(&format!(
            "<p>Showing the first {shown} of {total} rows.</p>\n"
        ));
    }
    html.push_str("</div>");
    Ok(html)
}

/// Read delimited text into rows; whitespace-only rows are dropped.
pub fn parse_delimited(bytes: &[u8], delimiter: u8) -> Result<Vec<Vec<String>>, RendererError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(RendererError::blank_or_corrupt("file is blank"));
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|err| RendererError::blank_or_corrupt(err.to_string()))?;
        let row: Vec<String> = record
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();
        if row.iter().any(|cell| !cell.trim().is_empty()) {
            rows.push(row);
        }
    }

    if rows.is_empty() {
        return Err(RendererError::blank_or_corrupt("no rows"));
    }
    Ok(rows)
}
