// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — Subject Input Loader
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Loads a [`SubjectSolverConfig`] from a VMEC `&INDATA` namelist or from its
//! JSON form.
//!
//! Only the keys the comparator needs are interpreted: `LASYM`, `NFP`,
//! `MPOL`, `NTOR`, `FTOL_ARRAY`/`FTOL`, the axis arrays and the boundary
//! tables `RBC/ZBS/RBS/ZBC(n,m)`. Everything else in the group is skipped.

use log::{debug, warn};
use ndarray::Array2;
use parity_types::error::{ParityError, ParityResult};
use parity_types::subject::{BoundaryCoefficients, SubjectSolverConfig};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

fn invalid(msg: impl Into<String>) -> ParityError {
    ParityError::InvalidInput(msg.into())
}

/// Loads the subject input at `path`; `.json` files use the serde form,
/// anything else is parsed as an `&INDATA` namelist.
pub fn load_subject_config(path: impl AsRef<Path>) -> ParityResult<SubjectSolverConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ParityError::ResourceNotFound {
            path: path.display().to_string(),
        },
        _ => ParityError::Io(e),
    })?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let mut config = if is_json {
        let config: SubjectSolverConfig = serde_json::from_str(&text)?;
        config.validate()?;
        config
    } else {
        parse_indata(&text)?
    };
    config.source_path = Some(path.to_path_buf());
    debug!(
        "loaded subject input '{}' (lasym={}, mpol={}, ntor={})",
        path.display(),
        config.lasym,
        config.mpol,
        config.ntor
    );
    Ok(config)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Equals,
}

/// Removes `!` comments, leaving quoted text alone.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let mut quote: Option<char> = None;
        for ch in line.chars() {
            match (quote, ch) {
                (None, '!') => break,
                (None, '\'' | '"') => quote = Some(ch),
                (Some(q), c) if c == q => quote = None,
                _ => {}
            }
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

/// Body of the `&INDATA` group, up to its `/` or `&END` terminator.
fn indata_body(text: &str) -> ParityResult<&str> {
    let lower = text.to_ascii_lowercase();
    let start = lower
        .find("&indata")
        .ok_or_else(|| invalid("no &INDATA namelist group found"))?
        + "&indata".len();
    let mut quote: Option<char> = None;
    for (offset, ch) in text[start..].char_indices() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            (None, '/') => return Ok(&text[start..start + offset]),
            (None, '&') if lower[start + offset..].starts_with("&end") => {
                return Ok(&text[start..start + offset])
            }
            _ => {}
        }
    }
    Err(invalid("&INDATA group is not terminated by '/' or &END"))
}

fn tokenize(body: &str) -> ParityResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = body.chars();
    let mut word = String::new();
    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    };
    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() || c == ',' => flush(&mut word, &mut tokens),
            '=' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Equals);
            }
            '\'' | '"' => {
                flush(&mut word, &mut tokens);
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == ch => break,
                        Some(c) => quoted.push(c),
                        None => return Err(invalid("unterminated string literal")),
                    }
                }
                tokens.push(Token::Quoted(quoted));
            }
            '(' => {
                // `RBC (0,1)`: the subscript belongs to the preceding name.
                let detached = word.is_empty()
                    && matches!(tokens.last(), Some(Token::Word(name)) if !name.ends_with(')'));
                if detached {
                    if let Some(Token::Word(name)) = tokens.pop() {
                        word = name;
                    }
                }
                word.push('(');
                loop {
                    match chars.next() {
                        Some(')') => {
                            word.push(')');
                            break;
                        }
                        Some(c) if !c.is_whitespace() => word.push(c),
                        Some(_) => {}
                        None => return Err(invalid("unbalanced '(' in index")),
                    }
                }
            }
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
struct Assignment {
    name: String,
    /// Raw subscript text between the parentheses, whitespace removed.
    subscript: Option<String>,
    values: Vec<String>,
}

impl Assignment {
    /// Integer subscripts. Only the keys the loader interprets call this, so
    /// array sections such as `NS_ARRAY(1:2)` on skipped keys never fail.
    fn indices(&self) -> ParityResult<Vec<i64>> {
        let Some(subscript) = &self.subscript else {
            return Ok(Vec::new());
        };
        subscript
            .split(',')
            .map(|idx| {
                idx.parse::<i64>().map_err(|e| {
                    invalid(format!(
                        "bad index '{idx}' in '{}({subscript})': {e}",
                        self.name
                    ))
                })
            })
            .collect()
    }
}

fn parse_target(target: &str) -> ParityResult<(String, Option<String>)> {
    let Some((name, rest)) = target.split_once('(') else {
        return Ok((target.to_ascii_lowercase(), None));
    };
    let inner = rest
        .strip_suffix(')')
        .ok_or_else(|| invalid(format!("malformed index in '{target}'")))?;
    if name.is_empty() {
        return Err(invalid(format!("subscript '{target}' without a variable name")));
    }
    Ok((name.to_ascii_lowercase(), Some(inner.to_string())))
}

/// Expands `r*value` repeat counts.
fn expand_value(token: &str, out: &mut Vec<String>) -> ParityResult<()> {
    if let Some((count, value)) = token.split_once('*') {
        let count: usize = count
            .parse()
            .map_err(|e| invalid(format!("bad repeat count in '{token}': {e}")))?;
        out.extend(std::iter::repeat(value.to_string()).take(count));
    } else {
        out.push(token.to_string());
    }
    Ok(())
}

fn assignments(tokens: &[Token]) -> ParityResult<Vec<Assignment>> {
    let mut out: Vec<Assignment> = Vec::new();
    let mut idx = 0;
    while idx < tokens.len() {
        let is_target = matches!(tokens.get(idx + 1), Some(Token::Equals));
        match (&tokens[idx], is_target) {
            (Token::Word(target), true) => {
                let (name, subscript) = parse_target(target)?;
                out.push(Assignment {
                    name,
                    subscript,
                    values: Vec::new(),
                });
                idx += 2;
            }
            (Token::Equals, _) => return Err(invalid("'=' without a variable name")),
            (Token::Word(value), false) => {
                let current = out
                    .last_mut()
                    .ok_or_else(|| invalid("value before the first assignment"))?;
                expand_value(value, &mut current.values)?;
                idx += 1;
            }
            (Token::Quoted(value), _) => {
                let current = out
                    .last_mut()
                    .ok_or_else(|| invalid("value before the first assignment"))?;
                current.values.push(value.clone());
                idx += 1;
            }
        }
    }
    Ok(out)
}

fn parse_real(key: &str, text: &str) -> ParityResult<f64> {
    let normalized = text.replace(['d', 'D'], "e");
    let val = normalized
        .parse::<f64>()
        .map_err(|e| invalid(format!("failed to parse '{key}' value '{text}' as real: {e}")))?;
    if !val.is_finite() {
        return Err(invalid(format!("'{key}' must be finite, got {val}")));
    }
    Ok(val)
}

fn parse_logical(key: &str, text: &str) -> ParityResult<bool> {
    match text.to_ascii_lowercase().trim_matches('.') {
        "t" | "true" => Ok(true),
        "f" | "false" => Ok(false),
        other => Err(invalid(format!("'{key}' expects a logical, got '{other}'"))),
    }
}

fn parse_count(key: &str, text: &str) -> ParityResult<usize> {
    text.parse::<usize>()
        .map_err(|e| invalid(format!("failed to parse '{key}' as integer: {e}")))
}

fn single<'a>(a: &'a Assignment) -> ParityResult<&'a str> {
    match a.values.as_slice() {
        [value] => Ok(value.as_str()),
        _ => Err(invalid(format!(
            "'{}' expects exactly one value, got {}",
            a.name,
            a.values.len()
        ))),
    }
}

/// Sparse boundary table keyed by (m, n).
type SparseTable = BTreeMap<(usize, i64), f64>;

#[derive(Default)]
struct RawIndata {
    lasym: Option<bool>,
    nfp: Option<u32>,
    mpol: Option<usize>,
    ntor: Option<usize>,
    ftol: Option<f64>,
    axes: BTreeMap<&'static str, Vec<f64>>,
    boundary: BTreeMap<&'static str, SparseTable>,
}

const AXIS_KEYS: [(&str, &str); 6] = [
    ("raxis_cc", "raxis_c"),
    ("raxis", "raxis_c"),
    ("zaxis_cs", "zaxis_s"),
    ("zaxis", "zaxis_s"),
    ("raxis_cs", "raxis_s"),
    ("zaxis_cc", "zaxis_c"),
];

const BOUNDARY_KEYS: [&str; 4] = ["rbc", "zbs", "rbs", "zbc"];

fn collect(assignments: &[Assignment]) -> ParityResult<RawIndata> {
    let mut raw = RawIndata::default();
    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
    for a in assignments {
        if !seen.insert((a.name.clone(), a.subscript.clone())) {
            return Err(invalid(format!("Duplicate INDATA key: {}", a.name)));
        }
        match a.name.as_str() {
            "lasym" => raw.lasym = Some(parse_logical("lasym", single(a)?)?),
            "nfp" => {
                let nfp = parse_count("nfp", single(a)?)?;
                raw.nfp = Some(
                    u32::try_from(nfp).map_err(|_| invalid(format!("nfp out of range: {nfp}")))?,
                );
            }
            "mpol" => raw.mpol = Some(parse_count("mpol", single(a)?)?),
            "ntor" => raw.ntor = Some(parse_count("ntor", single(a)?)?),
            "ftol_array" | "ftol" => {
                let values = a
                    .values
                    .iter()
                    .map(|v| parse_real(&a.name, v))
                    .collect::<ParityResult<Vec<f64>>>()?;
                // The last nonzero stage is the tolerance the final grid runs to.
                raw.ftol = values.into_iter().rev().find(|v| *v > 0.0).or(raw.ftol);
            }
            name => {
                if let Some(&(_, canonical)) = AXIS_KEYS.iter().find(|(key, _)| *key == name) {
                    let start = match a.indices()?.as_slice() {
                        [] => 0,
                        [n] if *n >= 0 => *n as usize,
                        _ => return Err(invalid(format!("bad axis index for '{name}'"))),
                    };
                    let slot = raw.axes.entry(canonical).or_default();
                    for (offset, v) in a.values.iter().enumerate() {
                        let pos = start + offset;
                        if slot.len() <= pos {
                            slot.resize(pos + 1, 0.0);
                        }
                        slot[pos] = parse_real(name, v)?;
                    }
                } else if let Some(&key) = BOUNDARY_KEYS.iter().find(|k| **k == name) {
                    let indices = a.indices()?;
                    let (n, m) = match indices.as_slice() {
                        [n, m] => (*n, *m),
                        _ => {
                            return Err(invalid(format!(
                                "'{name}' requires two indices (n,m), got {indices:?}"
                            )))
                        }
                    };
                    if m < 0 {
                        return Err(invalid(format!("'{name}({n},{m})' requires m >= 0")));
                    }
                    let table = raw.boundary.entry(key).or_default();
                    // Extra values continue along the first (toroidal) index.
                    for (offset, v) in a.values.iter().enumerate() {
                        table.insert((m as usize, n + offset as i64), parse_real(name, v)?);
                    }
                } else {
                    debug!("ignoring INDATA key '{name}'");
                }
            }
        }
    }
    Ok(raw)
}

fn dense_table(
    name: &str,
    sparse: Option<&SparseTable>,
    mpol: usize,
    ntor: usize,
) -> ParityResult<Array2<f64>> {
    let mut table = Array2::zeros((mpol, 2 * ntor + 1));
    for (&(m, n), &value) in sparse.into_iter().flatten() {
        if m >= mpol || n.unsigned_abs() as usize > ntor {
            return Err(invalid(format!(
                "{}({n},{m}) lies outside mpol={mpol}, ntor={ntor}",
                name.to_ascii_uppercase()
            )));
        }
        table[[m, (n + ntor as i64) as usize]] = value;
    }
    Ok(table)
}

fn axis_vector(raw: &mut RawIndata, key: &str, ntor: usize) -> Vec<f64> {
    let mut values = raw.axes.remove(key).unwrap_or_default();
    if values.len() > ntor + 1 {
        warn!(
            "{key} has {} entries but ntor={ntor}; extra modes ignored",
            values.len()
        );
    }
    values.resize(ntor + 1, 0.0);
    values
}

/// Parses the `&INDATA` group of a VMEC input deck.
pub fn parse_indata(text: &str) -> ParityResult<SubjectSolverConfig> {
    let cleaned = strip_comments(text);
    let body = indata_body(&cleaned)?;
    let tokens = tokenize(body)?;
    let mut raw = collect(&assignments(&tokens)?)?;

    let implied_mpol = raw
        .boundary
        .values()
        .flat_map(|t| t.keys())
        .map(|&(m, _)| m + 1)
        .max()
        .unwrap_or(1);
    let implied_ntor = raw
        .boundary
        .values()
        .flat_map(|t| t.keys())
        .map(|&(_, n)| n.unsigned_abs() as usize)
        .chain(raw.axes.values().map(|v| v.len().saturating_sub(1)))
        .max()
        .unwrap_or(0);
    let mpol = raw.mpol.unwrap_or(implied_mpol).max(1);
    let ntor = raw.ntor.unwrap_or(implied_ntor);
    let lasym = raw.lasym.unwrap_or(false);

    if !lasym {
        let dropped: Vec<&str> = ["rbs", "zbc"]
            .into_iter()
            .filter(|k| raw.boundary.get(*k).is_some_and(|t| !t.is_empty()))
            .chain(
                ["raxis_s", "zaxis_c"]
                    .into_iter()
                    .filter(|k| raw.axes.contains_key(*k)),
            )
            .collect();
        if !dropped.is_empty() {
            warn!("LASYM is false; ignoring antisymmetric inputs {dropped:?}");
        }
    }

    let boundary = BoundaryCoefficients {
        rbc: dense_table("rbc", raw.boundary.get("rbc"), mpol, ntor)?,
        zbs: dense_table("zbs", raw.boundary.get("zbs"), mpol, ntor)?,
        rbs: if lasym {
            Some(dense_table("rbs", raw.boundary.get("rbs"), mpol, ntor)?)
        } else {
            None
        },
        zbc: if lasym {
            Some(dense_table("zbc", raw.boundary.get("zbc"), mpol, ntor)?)
        } else {
            None
        },
    };

    let config = SubjectSolverConfig {
        lasym,
        nfp: raw.nfp.unwrap_or(1),
        mpol,
        ntor,
        ftol: raw.ftol,
        raxis_c: axis_vector(&mut raw, "raxis_c", ntor),
        zaxis_s: axis_vector(&mut raw, "zaxis_s", ntor),
        raxis_s: lasym.then(|| axis_vector(&mut raw, "raxis_s", ntor)),
        zaxis_c: lasym.then(|| axis_vector(&mut raw, "zaxis_c", ntor)),
        boundary,
        source_path: None,
    };
    config.validate()?;
    Ok(config)
}
