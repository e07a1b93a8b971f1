// ============================================================
// Layer 4 — NPY Feature Reader
// ============================================================
// Visual features are stored one file per video as NumPy `.npy`
// arrays of shape [T, D] (T feature steps, D feature size).
//
// Supported subset of the format:
//   magic "\x93NUMPY", version 1.x / 2.x / 3.x
//   descr '<f4' or '<f8' (little-endian float), fortran_order False
//   a 1-D shape is read as a single step, a 2-D shape as [T, D]
//
// Values are always returned as f32.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};

const MAGIC: &[u8] = b"\x93NUMPY";

/// A dense row-major `[steps, dim]` feature block.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub steps:  usize,
    pub dim:    usize,
    pub values: Vec<f32>,
}

impl FeatureMatrix {
    pub fn new(steps: usize, dim: usize, values: Vec<f32>) -> Result<Self> {
        if values.len() != steps * dim {
            bail!(
                "feature matrix [{steps}, {dim}] needs {} values, got {}",
                steps * dim,
                values.len()
            );
        }
        Ok(Self { steps, dim, values })
    }
}

pub fn read_npy(path: impl AsRef<Path>) -> Result<FeatureMatrix> {
    let path  = path.as_ref();
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read features '{}'", path.display()))?;
    parse_npy(&bytes).with_context(|| format!("Invalid npy file '{}'", path.display()))
}

pub fn parse_npy(bytes: &[u8]) -> Result<FeatureMatrix> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        bail!("missing NUMPY magic");
    }

    // Header length is u16 in v1 and u32 from v2 on
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                bail!("truncated header");
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => bail!("unsupported npy version {v}"),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        bail!("truncated header");
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .context("header is not utf-8")?;

    let descr   = header_value(header, "descr").context("header has no descr")?;
    let fortran = header_value(header, "fortran_order").context("header has no fortran_order")?;
    let shape   = header_value(header, "shape").context("header has no shape")?;

    if fortran.starts_with("True") {
        bail!("fortran-ordered arrays are not supported");
    }

    let dims = parse_shape(shape)?;
    let (steps, dim) = match dims.as_slice() {
        [d]    => (1, *d),
        [t, d] => (*t, *d),
        other  => bail!("expected a 1-D or 2-D array, got shape {:?}", other),
    };

    let data = &bytes[data_start..];
    let values: Vec<f32> = match descr.trim_matches(|c| c == '\'' || c == '"') {
        "<f4" => data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        "<f8" => data
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect(),
        other => bail!("unsupported dtype {other}"),
    };

    FeatureMatrix::new(steps, dim, values)
}

/// Extract the raw text of `'key': value` from the header dict.
fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{key}':");
    let start  = header.find(&needle)? + needle.len();
    let rest   = header[start..].trim_start();

    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else {
        rest.find(',').unwrap_or(rest.len())
    };
    Some(rest[..end].trim())
}

fn parse_shape(shape: &str) -> Result<Vec<usize>> {
    shape
        .trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().with_context(|| format!("bad shape entry '{s}'")))
        .collect()
}

/// Serialise a matrix as a v1 `<f4` npy file.
#[cfg(test)]
pub fn to_npy_bytes(m: &FeatureMatrix) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        m.steps, m.dim
    );
    // Pad so the data starts on a 64-byte boundary
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + m.values.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in &m.values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}
