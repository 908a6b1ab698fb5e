//! Transcript-level utilities that work on the raw XML rather than the
//! document model: repairing shifted characters and finding folio numbers.

use std::sync::LazyLock;

use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;

use crate::error::Result;

/// Shifts every character of every `TextEquiv/PlainText` and
/// `TextEquiv/Unicode` text node one code point down.
///
/// Some HTR exports store each character one code point too high ("Wbefs"
/// for "Vader"). Characters whose shifted form is not a legal XML character
/// are kept as they are.
pub fn fix_transcript(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let mut stack: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) => {
                stack.push(e.local_name().as_ref().to_vec());
                writer.write_event(Event::Start(e))?;
            }
            Event::End(e) => {
                stack.pop();
                writer.write_event(Event::End(e))?;
            }
            Event::Text(t) if in_transcription(&stack) => {
                let shifted: String = t.unescape()?.chars().map(shift_down).collect();
                writer.write_event(Event::Text(BytesText::new(&shifted)))?;
            }
            Event::Text(t) if t.iter().all(|b| b.is_ascii_whitespace()) => {}
            event => writer.write_event(event)?,
        }
    }

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn in_transcription(stack: &[Vec<u8>]) -> bool {
    match stack {
        [.., parent, leaf] => {
            parent.as_slice() == b"TextEquiv"
                && (leaf.as_slice() == b"PlainText" || leaf.as_slice() == b"Unicode")
        }
        _ => false,
    }
}

fn shift_down(c: char) -> char {
    let Some(shifted) = (c as u32).checked_sub(1).and_then(char::from_u32) else {
        return c;
    };
    if shifted.is_control() && !matches!(shifted, '\t' | '\n' | '\r') {
        c
    } else {
        shifted
    }
}

static FOLIO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)folio\s+\d+").expect("valid folio pattern"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolioScan {
    /// Whether the document carries any `PlainText` element at all.
    pub has_transcription: bool,
    /// Full texts of the `PlainText` elements mentioning a folio number.
    pub folios: Vec<String>,
}

pub fn find_folios(xml: &str) -> Result<FolioScan> {
    let mut reader = Reader::from_str(xml);
    let mut scan = FolioScan::default();
    let mut in_plain_text = false;
    let mut buffer = String::new();

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"PlainText" => {
                scan.has_transcription = true;
                in_plain_text = true;
                buffer.clear();
            }
            Event::Empty(e) if e.local_name().as_ref() == b"PlainText" => {
                scan.has_transcription = true;
            }
            Event::Text(t) if in_plain_text => buffer.push_str(&t.unescape()?),
            Event::End(e) if e.local_name().as_ref() == b"PlainText" => {
                in_plain_text = false;
                if FOLIO.is_match(&buffer) {
                    scan.folios.push(buffer.trim().to_string());
                }
            }
            _ => {}
        }
    }

    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::reader::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn shifts_transcribed_text_only() {
        let xml = r#"<PcGts><Page imageWidth="10" imageHeight="10">
            <TextRegion id="Wbefs"><Coords points="0,0 5,0 5,5"/>
            <TextLine id="l"><Coords points="0,0 5,0 5,5"/>
            <TextEquiv><PlainText>Wbefs!Kbotfo</PlainText><Unicode>Wbefs</Unicode></TextEquiv>
            </TextLine></TextRegion></Page></PcGts>"#;
        let fixed = fix_transcript(xml).unwrap();
        let doc = parse(&fixed).unwrap();
        assert_eq!(doc.regions[0].id, "Wbefs");
        assert_eq!(doc.regions[0].lines[0].text.as_deref(), Some("Vader Jansen"));
        assert!(fixed.contains("<Unicode>Vader</Unicode>"));
    }

    #[test]
    fn keeps_characters_that_would_become_control_codes() {
        assert_eq!(shift_down(' '), ' ');
        assert_eq!(shift_down('\u{0}'), '\u{0}');
        assert_eq!(shift_down('b'), 'a');
    }

    #[test]
    fn finds_folio_mentions() {
        let xml = r#"<PcGts><Page>
            <TextEquiv><PlainText>Folio 12</PlainText></TextEquiv>
            <TextEquiv><PlainText>Vader Jansen</PlainText></TextEquiv>
            </Page></PcGts>"#;
        let scan = find_folios(xml).unwrap();
        assert!(scan.has_transcription);
        assert_eq!(scan.folios, vec!["Folio 12".to_string()]);
    }

    #[test]
    fn reports_missing_transcription() {
        let scan = find_folios("<PcGts><Page/></PcGts>").unwrap();
        assert_eq!(scan, FolioScan::default());
    }
}
