//! Word (.docx) text: paragraphs from `word/document.xml`, one per line.

use quick_xml::events::Event;
use quick_xml::Reader;
use sauti_core::error::SautiError;
use std::io::{Cursor, Read};

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Plain text of a .docx file.
pub fn docx_to_text(data: &[u8]) -> Result<String, SautiError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| SautiError::Tool(format!("not a Word document: {e}")))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| SautiError::Tool(format!("Word document has no body: {e}")))?
        .read_to_string(&mut xml)?;
    document_xml_to_text(&xml)
}

fn document_xml_to_text(xml: &str) -> Result<String, SautiError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" | b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| SautiError::Tool(format!("bad text in Word document: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SautiError::Tool(format!(
                    "malformed Word document at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    Ok(out.trim_end().to_string())
}
