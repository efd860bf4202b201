//! Instance file I/O (C11, §4.11/§6.1).
//!
//! Generalizes the teacher's `parse_input` (line-oriented `BufReader` scan) to the §6.1
//! `m`/`n`/capacities/items layout, adding `#`-comment and blank-line skipping. Reports are
//! written as pretty JSON via `serde_json`, mirroring the teacher's `serde_json::to_writer`.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::driver::SolveReport;
use crate::error::{BpError, BpResult};
use crate::model::{Bin, Instance, Item};

fn tokenize(lines: impl Iterator<Item = std::io::Result<String>>) -> BpResult<Vec<String>> {
    let mut tokens = Vec::new();
    for line in lines {
        let line = line.map_err(|e| BpError::InvalidInstance(format!("read error: {e}")))?;
        let line = match line.split_once('#') {
            Some((before, _)) => before,
            None => line.as_str(),
        };
        tokens.extend(line.split_whitespace().map(String::from));
    }
    Ok(tokens)
}

fn next_usize(tokens: &mut impl Iterator<Item = String>, what: &str) -> BpResult<usize> {
    let tok = tokens
        .next()
        .ok_or_else(|| BpError::InvalidInstance(format!("missing {what}")))?;
    tok.parse()
        .map_err(|_| BpError::InvalidInstance(format!("invalid {what}: {tok:?}")))
}

fn next_u64(tokens: &mut impl Iterator<Item = String>, what: &str) -> BpResult<u64> {
    let tok = tokens
        .next()
        .ok_or_else(|| BpError::InvalidInstance(format!("missing {what}")))?;
    tok.parse()
        .map_err(|_| BpError::InvalidInstance(format!("invalid {what}: {tok:?}")))
}

/// Parses the §6.1 text format: `m`, `n`, `m` capacities, then `n` `weight profit` pairs.
/// Comments (`#...`) and blank lines are ignored anywhere.
pub fn read_instance(path: impl AsRef<Path>, name: impl Into<String>) -> BpResult<Instance> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        BpError::InvalidInstance(format!("cannot open instance file {}: {e}", path.display()))
    })?;
    let reader = BufReader::new(file);
    let mut tokens = tokenize(reader.lines())?.into_iter();

    let m = next_usize(&mut tokens, "number of bins (m)")?;
    let n = next_usize(&mut tokens, "number of items (n)")?;

    let mut bins = Vec::with_capacity(m);
    for id in 0..m {
        let capacity = next_u64(&mut tokens, "bin capacity")?;
        bins.push(Bin { id, capacity });
    }

    let mut items = Vec::with_capacity(n);
    for id in 0..n {
        let weight = next_u64(&mut tokens, "item weight")?;
        let profit = next_u64(&mut tokens, "item profit")?;
        items.push(Item { id, weight, profit });
    }

    Instance::new(name, items, bins)
}

/// Writes `report` as pretty JSON to `path`, or to stdout if `path` is `None`.
pub fn write_report(report: &SolveReport, path: Option<&Path>) -> BpResult<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| BpError::SolverFailure(format!("failed to serialize report: {e}")))?;
    match path {
        Some(path) => {
            let mut file = File::create(path)
                .map_err(|e| BpError::InvalidInstance(format!("cannot create {}: {e}", path.display())))?;
            file.write_all(json.as_bytes())
                .map_err(|e| BpError::SolverFailure(format!("failed to write report: {e}")))?;
        }
        None => println!("{json}"),
    }
    Ok(())
}
