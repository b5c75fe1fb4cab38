//! Binary form of expression fragments.
//!
//! Layout: a tag byte followed by the node body. Strings are varint length
//! prefixed.
//!
//! - `0` term: field, op byte, value
//! - `1` and / `2` or: varint child count, children
//! - `3` not: child
//! - `4` marker: kind byte, source

use super::tree::{CompareOp, Expr, ExprKind, ExprRef, MarkerKind};
use crate::error::{Error, Result};
use crate::utils::encoding::{SliceReader, encode_str, encode_varint};

const TAG_TERM: u8 = 0;
const TAG_AND: u8 = 1;
const TAG_OR: u8 = 2;
const TAG_NOT: u8 = 3;
const TAG_MARKER: u8 = 4;

/// Nesting limit when decoding untrusted input
const MAX_DEPTH: usize = 128;

pub fn encode(node: &Expr, buf: &mut Vec<u8>) {
    match node.kind() {
        ExprKind::Term { field, op, value } => {
            buf.push(TAG_TERM);
            encode_str(field, buf);
            buf.push(op.code());
            encode_str(value, buf);
        }
        ExprKind::And(children) | ExprKind::Or(children) => {
            buf.push(if node.is_and() { TAG_AND } else { TAG_OR });
            encode_varint(children.len() as u32, buf);
            for child in children {
                encode(child, buf);
            }
        }
        ExprKind::Not(child) => {
            buf.push(TAG_NOT);
            encode(child, buf);
        }
        ExprKind::Marker { kind, source } => {
            buf.push(TAG_MARKER);
            buf.push(kind.code());
            encode(source, buf);
        }
    }
}

pub fn decode(reader: &mut SliceReader<'_>) -> Result<ExprRef> {
    decode_at(reader, 0)
}

fn decode_at(reader: &mut SliceReader<'_>, depth: usize) -> Result<ExprRef> {
    if depth > MAX_DEPTH {
        return Err(Error::decode("expression nested too deeply"));
    }

    let tag = reader.read_u8()?;
    let node = match tag {
        TAG_TERM => {
            let field = reader.read_str()?;
            let code = reader.read_u8()?;
            let op = CompareOp::from_code(code)
                .ok_or_else(|| Error::decode(format!("unknown operator code {}", code)))?;
            let value = reader.read_str()?;
            Expr::term(field, op, value)
        }
        TAG_AND | TAG_OR => {
            let count = reader.read_varint()? as usize;
            // Cap the reservation; the count is untrusted
            let mut children = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                children.push(decode_at(reader, depth + 1)?);
            }
            if tag == TAG_AND {
                Expr::and(children)
            } else {
                Expr::or(children)
            }
        }
        TAG_NOT => Expr::not(decode_at(reader, depth + 1)?),
        TAG_MARKER => {
            let code = reader.read_u8()?;
            let kind = MarkerKind::from_code(code)
                .ok_or_else(|| Error::decode(format!("unknown marker code {}", code)))?;
            Expr::marker(kind, decode_at(reader, depth + 1)?)
        }
        other => return Err(Error::decode(format!("unknown node tag {}", other))),
    };
    Ok(node)
}
