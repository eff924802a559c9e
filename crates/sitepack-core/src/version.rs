//! Version constraint evaluation over the numeric prefix of dotted versions.
//!
//! This is an approximation, not PEP 440: `1.0rc1` compares as `1.0`, and
//! pre-release or local tags are ignored entirely.

use std::cmp::Ordering;

use crate::requirement::Operator;

/// Dotted numeric prefix of `v` as integers. Everything from the first
/// character that is neither a digit nor `.` is dropped. Empty segments count
/// as zero; segments too large for `u64` saturate at `u64::MAX`.
pub fn normalize(v: &str) -> Vec<u64> {
    let end = v
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(v.len());
    v[..end]
        .split('.')
        .map(|seg| match seg.parse::<u64>() {
            Ok(n) => n,
            Err(_) if seg.is_empty() => 0,
            Err(_) => u64::MAX,
        })
        .collect()
}

fn padded(a: &[u64], b: &[u64]) -> (Vec<u64>, Vec<u64>) {
    let len = a.len().max(b.len());
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.resize(len, 0);
    b.resize(len, 0);
    (a, b)
}

/// Compare two version strings after zero padding.
pub fn compare(a: &str, b: &str) -> Ordering {
    let (a, b) = padded(&normalize(a), &normalize(b));
    a.cmp(&b)
}

/// Whether `installed` satisfies `op required`. `None` accepts anything.
pub fn satisfies(installed: &str, op: Option<Operator>, required: &str) -> bool {
    let Some(op) = op else {
        return true;
    };
    let req_parts = normalize(required);
    let (inst, req) = padded(&normalize(installed), &req_parts);
    match op {
        Operator::Eq => inst == req,
        Operator::Ne => inst != req,
        Operator::Ge => inst >= req,
        Operator::Le => inst <= req,
        Operator::Gt => inst > req,
        Operator::Lt => inst < req,
        Operator::Compatible => {
            // ~=1.4.5 means >=1.4.5 and ==1.4.*
            if req_parts.len() >= 2 {
                let base = &req_parts[..req_parts.len() - 1];
                inst[..base.len()] == *base && inst >= req
            } else {
                inst >= req
            }
        }
    }
}

/// String-operator form: `""` means any version, unknown operators never match.
pub fn satisfies_str(installed: &str, op: &str, required: &str) -> bool {
    if op.is_empty() {
        return true;
    }
    match Operator::from_token(op) {
        Some(op) => satisfies(installed, Some(op), required),
        None => false,
    }
}
