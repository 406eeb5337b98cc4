//! Assemblage d'un enregistrement parcellaire typé
//!
//! Les champs scalaires sont tous fail-soft. Trois manques sont durs:
//! identifiant, numéro de Gemarkung, géométrie — la parcelle est alors
//! abandonnée (comptée comme skipped par l'appelant).

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::attributes::{find_text, parse_bool, parse_int, parse_timestamp};
use crate::element::Element;
use crate::geometry;

/// Une parcelle prête à être persistée
#[derive(Debug, Clone)]
pub struct Parcel {
    /// Identifiant ADV (gml:identifier)
    pub adv_id: String,

    /// Début de l'intervalle de vie de l'objet
    pub start_time: Option<DateTime<FixedOffset>>,

    /// Clé du Land (texte, les zéros de tête sont significatifs)
    pub state_number: Option<String>,

    /// Regierungsbezirk
    pub administrative_district_number: Option<i32>,

    /// Kreis
    pub county_number: Option<i32>,

    /// Gemeinde
    pub municipality_number: Option<i32>,

    /// Numéro de Gemarkung (district cadastral, obligatoire)
    pub cadastral_district_number: i32,

    /// Numéro de Flur d'origine
    pub field_number_original: Option<String>,

    /// Dénominateur du numéro de parcelle
    pub denominator: Option<i32>,

    /// Numérateur du numéro de parcelle
    pub numerator: Option<i32>,

    /// Abweichender Rechtszustand
    pub different_legal_status: Option<bool>,

    /// Géométrie sérialisée (POLYGON/MULTIPOLYGON, projection source)
    pub wkt_geometry: String,
}

impl Parcel {
    /// Convertit un élément `AX_Flurstueck` en enregistrement typé.
    /// `None` signifie que l'élément doit être compté comme skipped.
    pub fn from_element(element: &Element) -> Option<Self> {
        let adv_id = find_text(element, &["identifier"]).map(str::to_string);

        let Some(wkt_geometry) = geometry::decode_geometry(element) else {
            debug!(
                parcel = adv_id.as_deref().unwrap_or("<no id>"),
                "skipping parcel without supported geometry"
            );
            return None;
        };

        let Some(adv_id) = adv_id else {
            debug!("missing ADV identifier for one parcel; skipping");
            return None;
        };

        let Some(cadastral_district_number) = parse_int(find_text(
            element,
            &["gemarkung", "AX_Gemarkung_Schluessel", "gemarkungsnummer"],
        )) else {
            debug!(parcel = %adv_id, "missing cadastral district for parcel");
            return None;
        };

        Some(Self {
            start_time: parse_timestamp(find_text(
                element,
                &["lebenszeitintervall", "AA_Lebenszeitintervall", "beginnt"],
            )),
            state_number: find_text(
                element,
                &["gemeindezugehoerigkeit", "AX_Gemeindekennzeichen", "land"],
            )
            .map(str::to_string),
            administrative_district_number: parse_int(find_text(
                element,
                &[
                    "gemeindezugehoerigkeit",
                    "AX_Gemeindekennzeichen",
                    "regierungsbezirk",
                ],
            )),
            county_number: parse_int(find_text(
                element,
                &["gemeindezugehoerigkeit", "AX_Gemeindekennzeichen", "kreis"],
            )),
            municipality_number: parse_int(find_text(
                element,
                &["gemeindezugehoerigkeit", "AX_Gemeindekennzeichen", "gemeinde"],
            )),
            field_number_original: find_text(element, &["flurnummer"]).map(str::to_string),
            denominator: parse_int(find_text(
                element,
                &["flurstuecksnummer", "AX_Flurstuecksnummer", "nenner"],
            )),
            numerator: parse_int(find_text(
                element,
                &["flurstuecksnummer", "AX_Flurstuecksnummer", "zaehler"],
            )),
            different_legal_status: parse_bool(find_text(
                element,
                &["abweichenderRechtszustand"],
            )),
            adv_id,
            cadastral_district_number,
            wkt_geometry,
        })
    }
}
