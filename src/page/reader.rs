use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::core::geometry::{parse_points, Point};
use crate::core::model::{split_annotation, Document, Line, Region};
use crate::error::{DocumentError, Result};

pub fn load(path: &Path) -> Result<Document> {
    let xml = fs::read_to_string(path)?;
    parse(&xml)
}

/// Parses a PAGE document. Elements are matched on their local names, so any
/// PAGE schema version (or none) is accepted.
pub fn parse(xml: &str) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    let mut builder = DocumentBuilder::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => builder.open(&e)?,
            Event::Empty(e) => {
                builder.open(&e)?;
                builder.close()?;
            }
            Event::End(_) => builder.close()?,
            Event::Text(t) => builder.text(&t.unescape()?),
            Event::CData(c) => builder.text(&String::from_utf8_lossy(&c)),
            Event::Eof => break,
            _ => {}
        }
    }

    builder.finish(xml)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Page,
    TextRegion(usize),
    TextLine,
    Word,
    TextEquiv,
    PlainText,
    Unicode,
    Coords,
    Other,
}

#[derive(Debug)]
struct LineDraft {
    region: usize,
    ordinal: usize,
    id: String,
    custom: Option<String>,
    points: Option<Vec<Point>>,
    plain_text: Option<String>,
    unicode: Option<String>,
}

#[derive(Debug, Default)]
struct DocumentBuilder {
    stack: Vec<Element>,
    size: Option<(u32, u32)>,
    regions: Vec<Region>,
    region_has_coords: Vec<bool>,
    region_stack: Vec<usize>,
    line: Option<LineDraft>,
    line_count: usize,
}

impl DocumentBuilder {
    fn open(&mut self, e: &BytesStart) -> Result<()> {
        let element = match e.local_name().as_ref() {
            b"Page" => {
                let width = required_number(e, "Page", "imageWidth")?;
                let height = required_number(e, "Page", "imageHeight")?;
                self.size = Some((width, height));
                Element::Page
            }
            b"TextRegion" => {
                let idx = self.regions.len();
                let id = attribute(e, "id")?.unwrap_or_else(|| format!("region_{idx}"));
                self.regions.push(Region {
                    id,
                    points: Vec::new(),
                    lines: Vec::new(),
                });
                self.region_has_coords.push(false);
                self.region_stack.push(idx);
                Element::TextRegion(idx)
            }
            b"TextLine" => {
                let ordinal = self.line_count;
                self.line_count += 1;
                if let Some(&region) = self.region_stack.last() {
                    self.line = Some(LineDraft {
                        region,
                        ordinal,
                        id: attribute(e, "id")?.unwrap_or_else(|| format!("line_{ordinal}")),
                        custom: attribute(e, "custom")?,
                        points: None,
                        plain_text: None,
                        unicode: None,
                    });
                }
                Element::TextLine
            }
            b"Word" => Element::Word,
            b"TextEquiv" => Element::TextEquiv,
            b"PlainText" => Element::PlainText,
            b"Unicode" => Element::Unicode,
            b"Coords" => {
                match self.stack.last() {
                    Some(Element::TextLine) => {
                        if let Some(line) = self.line.as_mut() {
                            line.points = Some(required_points(e, "TextLine")?);
                        }
                    }
                    Some(Element::TextRegion(idx)) => {
                        let idx = *idx;
                        self.regions[idx].points = required_points(e, "TextRegion")?;
                        self.region_has_coords[idx] = true;
                    }
                    _ => {}
                }
                Element::Coords
            }
            _ => Element::Other,
        };
        self.stack.push(element);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Element::TextLine) => {
                if let Some(draft) = self.line.take() {
                    let points = draft.points.ok_or(DocumentError::MissingField {
                        element: "TextLine",
                        field: "Coords",
                    })?;
                    let (custom, category) = draft
                        .custom
                        .as_deref()
                        .map(split_annotation)
                        .unwrap_or_default();
                    let text = draft
                        .plain_text
                        .or(draft.unicode)
                        .map(|text| text.trim().to_string());
                    self.regions[draft.region].lines.push(Line {
                        id: draft.id,
                        ordinal: draft.ordinal,
                        points,
                        text,
                        custom,
                        category,
                    });
                }
            }
            Some(Element::TextRegion(idx)) => {
                self.region_stack.pop();
                if !self.region_has_coords[idx] {
                    return Err(DocumentError::MissingField {
                        element: "TextRegion",
                        field: "Coords",
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, content: &str) {
        // Only the line's own transcription counts, not word-level ones.
        let Some(line) = self.line.as_mut() else {
            return;
        };
        let n = self.stack.len();
        if n < 3 || self.stack[n - 3] != Element::TextLine || self.stack[n - 2] != Element::TextEquiv
        {
            return;
        }
        let slot = match self.stack[n - 1] {
            Element::PlainText => &mut line.plain_text,
            Element::Unicode => &mut line.unicode,
            _ => return,
        };
        slot.get_or_insert_with(String::new).push_str(content);
    }

    fn finish(self, xml: &str) -> Result<Document> {
        let (width, height) = self.size.ok_or(DocumentError::MissingField {
            element: "Page",
            field: "imageWidth",
        })?;
        Ok(Document {
            width,
            height,
            regions: self.regions,
            source: Some(xml.to_string()),
        })
    }
}

fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>> {
    match e.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn required_number(e: &BytesStart, element: &'static str, field: &'static str) -> Result<u32> {
    let raw = attribute(e, field)?.ok_or(DocumentError::MissingField { element, field })?;
    raw.trim()
        .parse::<u32>()
        .map_err(|_| DocumentError::InvalidValue {
            element,
            field,
            value: raw,
        })
}

fn required_points(e: &BytesStart, element: &'static str) -> Result<Vec<Point>> {
    let raw = attribute(e, "points")?.ok_or(DocumentError::MissingField {
        element,
        field: "Coords",
    })?;
    parse_points(&raw).map_err(|value| DocumentError::InvalidValue {
        element,
        field: "Coords",
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Category;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PcGts xmlns="http://schema.primaresearch.org/PAGE/gts/pagecontent/2013-07-15">
  <Page imageFilename="NL-HaNA_2.10.50_71_0006.jpg" imageWidth="3000" imageHeight="4000">
    <TextRegion id="r1" custom="readingOrder {index:0;}">
      <Coords points="0,0 1000,0 1000,500 0,500"/>
      <TextLine id="r1l1" custom="readingOrder {index:0;}">
        <Coords points="10,10 900,10 900,60 10,60"/>
        <TextEquiv><PlainText>Vader Jan Jansen</PlainText></TextEquiv>
      </TextLine>
      <TextLine id="r1l2" custom="readingOrder {index:1;} structure {type:Mother;}">
        <Coords points="10,70 900,70 900,120 10,120"/>
        <Word id="w1">
          <Coords points="10,70 100,70 100,120 10,120"/>
          <TextEquiv><PlainText>word-level</PlainText></TextEquiv>
        </Word>
        <TextEquiv><Unicode>Moeder Marie de Vries</Unicode></TextEquiv>
      </TextLine>
      <TextLine id="r1l3">
        <Coords points="10,130 900,130 900,180 10,180"/>
        <TextEquiv><PlainText/></TextEquiv>
      </TextLine>
    </TextRegion>
  </Page>
</PcGts>"#;

    #[test]
    fn reads_regions_lines_and_labels() {
        let doc = parse(SAMPLE).unwrap();
        assert_eq!((doc.width, doc.height), (3000, 4000));
        assert_eq!(doc.regions.len(), 1);
        let lines = &doc.regions[0].lines;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text.as_deref(), Some("Vader Jan Jansen"));
        assert_eq!(lines[0].category, None);
        assert_eq!(lines[1].text.as_deref(), Some("Moeder Marie de Vries"));
        assert_eq!(lines[1].category, Some(Category::Mother));
        assert_eq!(lines[1].custom, "readingOrder {index:1;}");
        assert_eq!(lines[2].recognized_text(), None);
        assert_eq!(lines[2].ordinal, 2);
        assert_eq!(lines[0].left(), Some(10));
    }

    #[test]
    fn empty_page_is_valid() {
        let doc = parse(r#"<PcGts><Page imageWidth="10" imageHeight="20"/></PcGts>"#).unwrap();
        assert!(doc.regions.is_empty());
    }

    #[test]
    fn missing_width_is_an_error() {
        let err = parse(r#"<PcGts><Page imageHeight="20"/></PcGts>"#).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::MissingField {
                element: "Page",
                field: "imageWidth"
            }
        ));
    }

    #[test]
    fn missing_line_coords_is_an_error() {
        let xml = r#"<PcGts><Page imageWidth="10" imageHeight="20">
            <TextRegion id="r"><Coords points="0,0 1,0 1,1"/>
            <TextLine id="l"><TextEquiv><PlainText>x</PlainText></TextEquiv></TextLine>
            </TextRegion></Page></PcGts>"#;
        assert!(matches!(
            parse(xml).unwrap_err(),
            DocumentError::MissingField {
                element: "TextLine",
                ..
            }
        ));
    }

    #[test]
    fn malformed_xml_is_reported() {
        let err = parse("<PcGts><Page imageWidth=\"1\" imageHeight=\"1\"></PcGts>").unwrap_err();
        assert!(matches!(err, DocumentError::Malformed(_)));
    }
}
