//! Colored printing of emitted entries and iterator results

use crate::index::{IndexEntry, IndexInfo};
use crate::iterator::Document;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn stdout(color: bool) -> StandardStream {
    let choice = if color { ColorChoice::Auto } else { ColorChoice::Never };
    StandardStream::stdout(choice)
}

/// Regime tag shown next to a count
fn regime(info: &IndexInfo) -> (&'static str, Color) {
    if info.is_infinite() {
        ("infinite", Color::Yellow)
    } else if info.is_exact() {
        ("exact", Color::Green)
    } else {
        ("pruned", Color::Cyan)
    }
}

/// Print planning entries, one key per line followed by its ids
pub fn print_entries(entries: &[IndexEntry], color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    write_entries(&mut out, entries)
}

pub fn write_entries<W: WriteColor>(out: &mut W, entries: &[IndexEntry]) -> io::Result<()> {
    for (key, info) in entries {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true))?;
        write!(out, "{}", key)?;
        out.reset()?;

        let (tag, tag_color) = regime(info);
        write!(out, " {} ", info)?;
        out.set_color(ColorSpec::new().set_fg(Some(tag_color)))?;
        write!(out, "[{}]", tag)?;
        out.reset()?;

        if let Some(node) = info.node() {
            write!(out, " {}", node)?;
        }
        writeln!(out)?;

        for m in info.ids() {
            write!(out, "  ")?;
            out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
            write!(out, "{}", m.id())?;
            out.reset()?;
            match m.node() {
                Some(node) => writeln!(out, " {}", node)?,
                None => writeln!(out)?,
            }
        }
    }
    Ok(())
}

/// Print iterator keys with their gathered attributes
pub fn print_keys(results: &[(String, Document)], color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    for (key, doc) in results {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
        write!(out, "{}", key)?;
        out.reset()?;

        for (field, values) in doc.fields() {
            let joined: Vec<&str> = values.iter().map(String::as_str).collect();
            write!(out, " ")?;
            out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
            write!(out, "{}", field)?;
            out.reset()?;
            write!(out, "={}", joined.join(","))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Print the hex wire form of an entry and whether it decoded back intact
pub fn print_encoded(key: &str, bytes: &[u8], round_trip: bool, color: bool) -> io::Result<()> {
    let mut out = stdout(color);
    out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
    write!(out, "{}", key)?;
    out.reset()?;
    write!(out, ":")?;

    if round_trip {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "ok")?;
    } else {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(out, "MISMATCH")?;
    }
    out.reset()?;
    writeln!(out, ":{}", to_hex(bytes))?;
    Ok(())
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::index::IndexMatch;
    use termcolor::NoColor;

    #[test]
    fn test_hex() {
        assert_eq!(to_hex(&[0x00, 0x0f, 0xff]), "000fff");
    }

    #[test]
    fn test_plain_entries() {
        let mut info = IndexInfo::from_ids([IndexMatch::new("uid.1")]);
        info.apply_node(Expr::eq("FOO", "bar"));
        let entries = vec![("20200101_0".to_string(), info), ("20200102".to_string(), IndexInfo::infinite())];

        let mut out = NoColor::new(Vec::new());
        write_entries(&mut out, &entries).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "20200101_0 { \"count\": 1 - 1 } [exact] FOO == 'bar'");
        assert_eq!(lines[1], "  uid.1 FOO == 'bar'");
        assert_eq!(lines[2], "20200102 { \"count\": -1 - 0 } [infinite]");
    }
}
