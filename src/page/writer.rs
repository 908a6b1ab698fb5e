use std::collections::HashMap;
use std::fs;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::core::geometry::format_points;
use crate::core::model::{Document, Line};
use crate::error::Result;

pub const PAGE_NAMESPACE: &str = "http://schema.primaresearch.org/PAGE/gts/pagecontent/2013-07-15";

pub fn save(document: &Document, path: &Path) -> Result<()> {
    let xml = to_xml(document)?;
    fs::write(path, xml)?;
    Ok(())
}

/// Serializes a document with two-space indentation.
///
/// A document read from XML is re-emitted from its source with only the line
/// annotations replaced; a document built in memory is written from scratch.
pub fn to_xml(document: &Document) -> Result<String> {
    match &document.source {
        Some(source) => rewrite(source, document),
        None => synthesize(document),
    }
}

fn rewrite(source: &str, document: &Document) -> Result<String> {
    let annotations: HashMap<usize, String> = document
        .lines()
        .map(|line| (line.ordinal, line.annotation()))
        .collect();

    let mut reader = Reader::from_str(source);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let mut ordinal = 0;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Text(t) if t.iter().all(|b| b.is_ascii_whitespace()) => {}
            Event::Start(e) if e.local_name().as_ref() == b"TextLine" => {
                let e = with_custom(&e, annotations.get(&ordinal))?;
                ordinal += 1;
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"TextLine" => {
                let e = with_custom(&e, annotations.get(&ordinal))?;
                ordinal += 1;
                writer.write_event(Event::Empty(e))?;
            }
            event => writer.write_event(event)?,
        }
    }

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Copies a `TextLine` start tag, replacing its `custom` attribute in place
/// or appending one when the line gained an annotation.
fn with_custom(e: &BytesStart, custom: Option<&String>) -> Result<BytesStart<'static>> {
    let Some(custom) = custom else {
        return Ok(e.clone().into_owned());
    };
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    let mut replaced = false;
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"custom" {
            out.push_attribute(("custom", custom.as_str()));
            replaced = true;
        } else {
            out.push_attribute(attr);
        }
    }
    if !replaced && !custom.is_empty() {
        out.push_attribute(("custom", custom.as_str()));
    }
    Ok(out)
}

fn synthesize(document: &Document) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("PcGts");
    root.push_attribute(("xmlns", PAGE_NAMESPACE));
    writer.write_event(Event::Start(root))?;

    let width = document.width.to_string();
    let height = document.height.to_string();
    let mut page = BytesStart::new("Page");
    page.push_attribute(("imageWidth", width.as_str()));
    page.push_attribute(("imageHeight", height.as_str()));
    writer.write_event(Event::Start(page))?;

    for region in &document.regions {
        let mut start = BytesStart::new("TextRegion");
        start.push_attribute(("id", region.id.as_str()));
        writer.write_event(Event::Start(start))?;
        write_coords(&mut writer, &format_points(&region.points))?;
        for line in &region.lines {
            write_line(&mut writer, line)?;
        }
        writer.write_event(Event::End(BytesEnd::new("TextRegion")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Page")))?;
    writer.write_event(Event::End(BytesEnd::new("PcGts")))?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn write_line(writer: &mut Writer<Vec<u8>>, line: &Line) -> Result<()> {
    let annotation = line.annotation();
    let mut start = BytesStart::new("TextLine");
    start.push_attribute(("id", line.id.as_str()));
    if !annotation.is_empty() {
        start.push_attribute(("custom", annotation.as_str()));
    }
    writer.write_event(Event::Start(start))?;
    write_coords(writer, &format_points(&line.points))?;
    if let Some(text) = &line.text {
        writer.write_event(Event::Start(BytesStart::new("TextEquiv")))?;
        writer.write_event(Event::Start(BytesStart::new("PlainText")))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(BytesEnd::new("PlainText")))?;
        writer.write_event(Event::End(BytesEnd::new("TextEquiv")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("TextLine")))?;
    Ok(())
}

fn write_coords(writer: &mut Writer<Vec<u8>>, points: &str) -> Result<()> {
    let mut coords = BytesStart::new("Coords");
    coords.push_attribute(("points", points));
    writer.write_event(Event::Empty(coords))?;
    Ok(())
}
