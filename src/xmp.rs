//! Minimal XMP editor
//!
//! This module provides just enough XMP handling to read and set simple
//! key/value properties such as `GCamera:MicroVideoOffset`.
//!
//! XMP Structure:
//! - XMP packets are XML-based RDF metadata
//! - Properties can be attributes on rdf:Description or child elements
//! - New properties are always written as attributes on the first rdf:Description

use crate::error::{Error, Result};
use quick_xml::{
    events::{BytesStart, Event},
    name::QName,
    Reader, Writer,
};
use std::io::Cursor;

const RDF_DESCRIPTION: &str = "rdf:Description";

/// A packet with an empty `rdf:Description`, used for photos without XMP
pub fn new_packet() -> String {
    concat!(
        "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n",
        "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n",
        "  <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n",
        "    <rdf:Description rdf:about=\"\"/>\n",
        "  </rdf:RDF>\n",
        "</x:xmpmeta>\n",
        "<?xpacket end=\"w\"?>",
    )
    .to_string()
}

/// Extract a value from XMP using a key.
///
/// Searches for the key as an attribute on `rdf:Description` or as a child element.
///
/// # Example
///
/// ```
/// use motion_photo_muxer::xmp::extract_key;
///
/// let xmp = r#"<rdf:Description GCamera:MicroVideo="1" />"#;
/// assert_eq!(extract_key(xmp, "GCamera:MicroVideo"), Some("1".to_string()));
/// ```
pub fn extract_key(xmp: &str, key: &str) -> Option<String> {
    let mut reader = Reader::from_str(xmp);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.name() == QName(RDF_DESCRIPTION.as_bytes()) {
                    for attr in e.attributes().flatten() {
                        if attr.key == QName(key.as_bytes()) {
                            if let Ok(s) = String::from_utf8(attr.value.to_vec()) {
                                return Some(s);
                            }
                        }
                    }
                } else if e.name() == QName(key.as_bytes()) {
                    if let Ok(s) = reader.read_text(e.name()) {
                        return Some(s.trim().to_string());
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    None
}

/// Add or replace a key/value pair in XMP.
///
/// The value is written as an attribute on the first `rdf:Description`,
/// in place if the attribute already exists. Any other occurrence of the key
/// (attributes on later descriptions, or child elements) is dropped so the
/// packet never holds two values for it.
///
/// # Example
///
/// ```
/// use motion_photo_muxer::xmp::{add_key, extract_key};
///
/// let xmp = r#"<?xpacket begin=""?><rdf:RDF><rdf:Description /></rdf:RDF><?xpacket end="w"?>"#;
/// let updated = add_key(xmp, "dc:title", "My Photo").unwrap();
/// assert!(updated.contains(r#"dc:title="My Photo""#));
/// ```
pub fn add_key(xmp: &str, key: &str, value: &str) -> Result<String> {
    set_key(xmp, key, value)
}

fn set_key(xmp: &str, key: &str, value: &str) -> Result<String> {
    let mut reader = Reader::from_str(xmp);
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = false;

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    // Taken by the first description; later ones only lose the key
    let mut pending = Some(value);
    let key_name = QName(key.as_bytes());

    loop {
        match reader.read_event()? {
            Event::Start(ref e) if e.name() == QName(RDF_DESCRIPTION.as_bytes()) => {
                let elem = rebuild_description(e, key, pending.take())?;
                writer.write_event(Event::Start(elem))?;
            }
            Event::Empty(ref e) if e.name() == QName(RDF_DESCRIPTION.as_bytes()) => {
                let elem = rebuild_description(e, key, pending.take())?;
                writer.write_event(Event::Empty(elem))?;
            }
            // Element form of the key: drop it with its content
            Event::Start(ref e) if e.name() == key_name => {
                let end = e.to_end().into_owned();
                reader.read_to_end(end.name())?;
            }
            Event::Empty(ref e) if e.name() == key_name => {}
            Event::Eof => break,
            e => writer.write_event(e)?,
        }
    }

    if pending.is_some() {
        return Err(Error::InvalidFormat(format!(
            "XMP has no {} to hold {}",
            RDF_DESCRIPTION, key
        )));
    }

    let result = writer.into_inner().into_inner();
    String::from_utf8(result).map_err(|e| Error::InvalidFormat(e.to_string()))
}

/// Copy a description's attributes, replacing or dropping `key`
fn rebuild_description(
    e: &BytesStart<'_>,
    key: &str,
    value: Option<&str>,
) -> Result<BytesStart<'static>> {
    let mut elem = BytesStart::new(RDF_DESCRIPTION);
    let mut placed = false;

    for attr_result in e.attributes() {
        let attr = attr_result
            .map_err(|e| Error::InvalidFormat(format!("XMP attribute error: {}", e)))?;
        if attr.key == QName(key.as_bytes()) {
            if let Some(value) = value {
                elem.push_attribute((key, value));
                placed = true;
            }
        } else {
            elem.push_attribute(attr);
        }
    }

    if let (Some(value), false) = (value, placed) {
        elem.push_attribute((key, value));
    }

    Ok(elem)
}
