use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use super::{DecodeError, DecodedMetadata};

const ROOT_ELEMENT: &str = "Ableton";

/// Rutas conocidas del tempo del set, de la revisión más nueva a la más vieja.
/// Live 12 renombró `MasterTrack` a `MainTrack`; el resto del camino no cambió.
pub const TEMPO_PATHS: &[&[&str]] = &[
    &["Ableton", "LiveSet", "MainTrack", "DeviceChain", "Mixer", "Tempo", "Manual"],
    &["Ableton", "LiveSet", "MasterTrack", "DeviceChain", "Mixer", "Tempo", "Manual"],
];

pub(super) fn extract(xml: &[u8]) -> Result<DecodedMetadata, DecodeError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::with_capacity(16);
    let mut creator = None;
    // `Some(None)`: se encontró el elemento del tempo pero sin `Value`.
    let mut tempo: Option<Option<String>> = None;
    let mut saw_root = false;

    // Se lee el documento entero aunque el tempo aparezca pronto: un set
    // escrito a medias tiene que fallar como documento mal formado.
    loop {
        buf.clear();
        let (element, empty) = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => (e, false),
            Ok(Event::Empty(e)) => (e, true),
            Ok(Event::End(_)) => {
                stack.pop();
                continue;
            }
            Ok(Event::Eof) => break,
            Ok(_) => continue,
            Err(e) => {
                return Err(DecodeError::MalformedDocument(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        };

        let name = element_name(&element)?;

        if stack.is_empty() {
            if saw_root {
                return Err(DecodeError::MalformedDocument(
                    "more than one root element".into(),
                ));
            }
            if name != ROOT_ELEMENT {
                return Err(DecodeError::MalformedDocument(format!(
                    "unexpected root element <{name}>"
                )));
            }
            saw_root = true;
            creator = attribute(&element, "Creator")?;
        }

        stack.push(name);

        if tempo.is_none() && is_tempo_path(&stack) {
            tempo = Some(attribute(&element, "Value")?);
        }

        if empty {
            stack.pop();
        }
    }

    if !saw_root {
        return Err(DecodeError::MalformedDocument("document has no root element".into()));
    }
    if !stack.is_empty() {
        return Err(DecodeError::MalformedDocument(format!(
            "unexpected end of document inside <{}>",
            stack.join("/")
        )));
    }

    let raw = tempo.flatten().ok_or(DecodeError::FieldNotFound("Tempo"))?;

    Ok(DecodedMetadata {
        tempo_bpm: parse_tempo(&raw)?,
        creator,
    })
}

fn element_name(element: &BytesStart<'_>) -> Result<String, DecodeError> {
    std::str::from_utf8(element.local_name().as_ref())
        .map(str::to_owned)
        .map_err(|e| DecodeError::MalformedDocument(format!("element name is not UTF-8: {e}")))
}

fn attribute(element: &BytesStart<'_>, key: &str) -> Result<Option<String>, DecodeError> {
    let Some(attr) = element
        .try_get_attribute(key)
        .map_err(|e| DecodeError::MalformedDocument(e.to_string()))?
    else {
        return Ok(None);
    };

    let value = attr
        .unescape_value()
        .map_err(|e| DecodeError::MalformedDocument(e.to_string()))?;
    Ok(Some(value.into_owned()))
}

fn is_tempo_path(stack: &[String]) -> bool {
    TEMPO_PATHS
        .iter()
        .any(|path| path.len() == stack.len() && path.iter().zip(stack).all(|(a, b)| *a == b))
}

fn parse_tempo(raw: &str) -> Result<f64, DecodeError> {
    match raw.trim().parse::<f64>() {
        Ok(bpm) if bpm.is_finite() && bpm > 0.0 => Ok(bpm),
        _ => Err(DecodeError::InvalidValue {
            field: "Tempo",
            value: raw.to_owned(),
        }),
    }
}
