//! Lecture en streaming des features `AX_Flurstueck`
//!
//! Le document n'est jamais chargé entièrement: le lecteur avance
//! événement par événement et ne matérialise qu'un sous-arbre
//! `AX_Flurstueck` à la fois.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::element::Element;
use crate::error::NasError;

/// Tag local des features parcellaires
const PARCEL_TAG: &[u8] = b"AX_Flurstueck";

/// Itérateur lazy, forward-only, non redémarrable sur les parcelles
/// d'un extrait NAS/GML (plain ou gzip)
pub struct FeatureReader {
    reader: Reader<Box<dyn BufRead>>,
    buf: Vec<u8>,
    file: String,
    finished: bool,
    saw_content: bool,
}

impl FeatureReader {
    /// Ouvre un extrait, en choisissant le transport d'après le suffixe
    /// (`.gz` → gzip multi-membres, sinon XML brut)
    pub fn open(path: &Path) -> Result<Self, NasError> {
        let file = File::open(path)?;

        let source: Box<dyn BufRead> = if path.extension().map_or(false, |ext| ext == "gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(BufReader::new(file))))
        } else {
            Box::new(BufReader::new(file))
        };

        debug!(file = %path.display(), "parsing file");
        Ok(Self::from_buf_read(source, path.display().to_string()))
    }

    /// Construit un lecteur sur un flux arbitraire (tests, stdin, ...)
    pub fn from_reader(source: impl BufRead + 'static) -> Self {
        Self::from_buf_read(Box::new(source), "<reader>".to_string())
    }

    fn from_buf_read(source: Box<dyn BufRead>, file: String) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);

        Self {
            reader,
            buf: Vec::with_capacity(4096),
            file,
            finished: false,
            saw_content: false,
        }
    }

    /// Les distributions sources laissent des octets parasites après le
    /// dernier membre gzip; le décodeur échoue alors sur l'en-tête du
    /// membre suivant. Ce cas précis est une fin de flux, pas une erreur —
    /// mais seulement si du contenu a déjà été décodé, sinon le fichier
    /// est simplement corrompu.
    fn is_benign_gzip_trailer(&self, error: &quick_xml::Error) -> bool {
        self.saw_content
            && matches!(error, quick_xml::Error::Io(io) if io.to_string().contains("gzip header"))
    }

    fn read_subtree(&mut self, start: &BytesStart) -> Result<Element, NasError> {
        let mut stack = vec![element_from_start(start, &self.file)?];

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(child)) => {
                    stack.push(element_from_start(&child, &self.file)?);
                }
                Ok(Event::Empty(child)) => {
                    let element = element_from_start(&child, &self.file)?;
                    // stack n'est jamais vide avant le End du sommet
                    stack.last_mut().unwrap().push_child(element);
                }
                Ok(Event::Text(text)) => {
                    let text = text.unescape().map_err(|e| {
                        NasError::invalid_document(&self.file, format!("bad text content: {e}"))
                    })?;
                    stack.last_mut().unwrap().append_text(&text);
                }
                Ok(Event::CData(data)) => {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    stack.last_mut().unwrap().append_text(&text);
                }
                Ok(Event::End(_)) => {
                    let done = stack.pop().unwrap();
                    match stack.last_mut() {
                        Some(parent) => parent.push_child(done),
                        None => return Ok(done),
                    }
                }
                Ok(Event::Eof) => {
                    return Err(NasError::invalid_document(
                        &self.file,
                        "unexpected end of file inside a parcel element",
                    ));
                }
                Ok(_) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Iterator for FeatureReader {
    type Item = Result<Element, NasError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(start)) => {
                    self.saw_content = true;
                    if start.local_name().as_ref() == PARCEL_TAG {
                        let start = start.into_owned();
                        return Some(self.read_subtree(&start));
                    }
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => {
                    self.saw_content = true;
                }
                Err(e) => {
                    self.finished = true;
                    if self.is_benign_gzip_trailer(&e) {
                        debug!(file = %self.file, "ignoring gzip trailer issue");
                        return None;
                    }
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// Convertit un tag ouvrant en noeud (nom local + attributs par nom local)
fn element_from_start(start: &BytesStart, file: &str) -> Result<Element, NasError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            NasError::invalid_document(file, format!("bad attribute in <{name}>: {e}"))
        })?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| {
                NasError::invalid_document(file, format!("bad attribute value in <{name}>: {e}"))
            })?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Element::new(name, attributes))
}
