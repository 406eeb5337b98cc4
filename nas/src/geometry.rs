//! Reconstruction des polygones depuis les structures curve/ring/surface
//!
//! Le décodeur ne couvre que les formes réellement émises par les extraits
//! ALKIS: un ring extérieur + rings intérieurs optionnels, groupés en
//! Polygon / Surface / MultiSurface. Les coordonnées restent dans la
//! projection source, la reprojection appartient au store.

use geo::{Coord, LineString, Polygon};
use tracing::debug;

use crate::element::Element;

/// Reconstruit la géométrie d'une parcelle et la sérialise en texte
/// `POLYGON(...)` ou `MULTIPOLYGON(...)`.
///
/// Le premier groupement trouvé gagne, dans l'ordre de préférence
/// MultiSurface → Surface → Polygon. `None` si aucun polygone n'est
/// reconstructible.
pub fn decode_geometry(element: &Element) -> Option<String> {
    let geometry = element
        .descendant("MultiSurface")
        .or_else(|| element.descendant("Surface"))
        .or_else(|| element.descendant("Polygon"))?;

    let polygons = geometry_to_polygons(geometry);
    polygons_to_wkt(&polygons)
}

/// Développe un groupement géométrique en liste de polygones
fn geometry_to_polygons(geometry: &Element) -> Vec<Polygon> {
    match geometry.name() {
        "MultiSurface" => geometry
            .children("surfaceMember")
            .filter_map(|member| member.child("Surface"))
            .flat_map(surface_to_polygons)
            .collect(),
        "Surface" => surface_to_polygons(geometry),
        // Un Polygon nu est traité comme un patch unique
        "Polygon" => patch_to_polygon(geometry).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn surface_to_polygons(surface: &Element) -> Vec<Polygon> {
    let Some(patches) = surface.child("patches") else {
        return Vec::new();
    };

    patches
        .children("PolygonPatch")
        .filter_map(patch_to_polygon)
        .collect()
}

/// Un patch sans ring extérieur valide est abandonné en entier;
/// un ring intérieur invalide est abandonné individuellement
fn patch_to_polygon(patch: &Element) -> Option<Polygon> {
    let exterior_ring = patch.child("exterior")?.child("Ring")?;
    let exterior = ring_coordinates(exterior_ring)?;

    let interiors: Vec<LineString> = patch
        .children("interior")
        .filter_map(|interior| interior.child("Ring"))
        .filter_map(ring_coordinates)
        .collect();

    Some(Polygon::new(exterior, interiors))
}

/// Concatène les curveMember d'un ring et ferme la séquence.
/// Un ring de moins de 4 points après fermeture est invalide.
fn ring_coordinates(ring: &Element) -> Option<LineString> {
    let mut coords: Vec<Coord> = Vec::new();

    for member in ring.children("curveMember") {
        match member.child("Curve") {
            Some(curve) => append_curve_points(&mut coords, curve),
            None => {
                // Courbe référencée au lieu d'être définie inline
                if let Some(href) = member.attr("href") {
                    debug!(href, "curve references via xlink are not supported");
                }
            }
        }
    }

    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }

    if coords.len() < 4 {
        debug!(points = coords.len(), "ring has insufficient points");
        return None;
    }

    Some(LineString::new(coords))
}

/// Ajoute les points de tous les segments d'une courbe, en dédupliquant
/// le point de jonction partagé entre segments consécutifs
fn append_curve_points(current: &mut Vec<Coord>, curve: &Element) {
    let Some(segments) = curve.child("segments") else {
        return;
    };

    let curve_dimension = parse_dimension(curve.attr("srsDimension"));

    for segment in segments.iter_children() {
        let points = parse_segment(segment, curve_dimension);
        if points.is_empty() {
            continue;
        }

        if current.last() == points.first() {
            current.extend_from_slice(&points[1..]);
        } else {
            current.extend_from_slice(&points);
        }
    }
}

/// Extrait la liste de coordonnées d'un segment, en essayant dans l'ordre:
/// posList compact, séquence de pos, liste legacy `coordinates`
fn parse_segment(segment: &Element, curve_dimension: Option<usize>) -> Vec<Coord> {
    if let Some(pos_list) = segment.child("posList") {
        if let Some(text) = pos_list.text() {
            let dimension = parse_dimension(pos_list.attr("srsDimension"))
                .or_else(|| parse_dimension(segment.attr("srsDimension")))
                .or(curve_dimension);
            return parse_pos_list(text, dimension);
        }
    }

    let mut coords = Vec::new();
    let mut saw_pos = false;
    for pos in segment.children("pos") {
        if let Some(text) = pos.text() {
            saw_pos = true;
            coords.extend(parse_pos_list(text, None));
        }
    }
    if saw_pos {
        return coords;
    }

    if let Some(text) = segment.child("coordinates").and_then(|c| c.text()) {
        return parse_pos_list(&text.replace(',', " "), None);
    }

    Vec::new()
}

fn parse_dimension(value: Option<&str>) -> Option<usize> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Décode une liste compacte de coordonnées.
/// dimension < 2 est ramenée à 2; un compte de valeurs non divisible par la
/// dimension invalide le segment entier; les composantes au-delà de x/y
/// sont tronquées.
fn parse_pos_list(text: &str, dimension: Option<usize>) -> Vec<Coord> {
    let mut raw: Vec<f64> = Vec::new();
    for token in text.split_whitespace() {
        let parsed: Result<f64, _> = fast_float::parse(token);
        match parsed {
            Ok(value) => raw.push(value),
            Err(_) => {
                debug!(token, "failed to parse coordinate");
                return Vec::new();
            }
        }
    }

    let dim = dimension.unwrap_or(2).max(2);

    if raw.len() % dim != 0 {
        debug!(
            count = raw.len(),
            dimension = dim,
            "unexpected coordinate count for dimension"
        );
        return Vec::new();
    }

    raw.chunks(dim)
        .map(|chunk| Coord {
            x: chunk[0],
            y: chunk[1],
        })
        .collect()
}

/// Sérialise en texte: un polygone → `POLYGON(...)`, plusieurs →
/// `MULTIPOLYGON(...)`, aucun → `None`
fn polygons_to_wkt(polygons: &[Polygon]) -> Option<String> {
    match polygons {
        [] => None,
        [single] => Some(format!("POLYGON({})", polygon_rings_text(single))),
        many => {
            let groups: Vec<String> = many
                .iter()
                .map(|polygon| format!("({})", polygon_rings_text(polygon)))
                .collect();
            Some(format!("MULTIPOLYGON({})", groups.join(", ")))
        }
    }
}

fn polygon_rings_text(polygon: &Polygon) -> String {
    let mut rings = vec![ring_text(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(ring_text));
    rings.join(", ")
}

fn ring_text(ring: &LineString) -> String {
    let pairs: Vec<String> = ring
        .0
        .iter()
        .map(|coord| format!("{} {}", coord.x, coord.y))
        .collect();
    format!("({})", pairs.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::FeatureReader;

    /// Enveloppe un fragment de géométrie dans une parcelle et le parse
    fn parcel_with_geometry(geometry_xml: &str) -> Element {
        let xml = format!(
            r#"<root xmlns:adv="urn:adv" xmlns:gml="urn:gml" xmlns:xlink="urn:xlink">
                 <adv:AX_Flurstueck>
                   <adv:position>{geometry_xml}</adv:position>
                 </adv:AX_Flurstueck>
               </root>"#
        );
        FeatureReader::from_reader(std::io::Cursor::new(xml.into_bytes()))
            .next()
            .unwrap()
            .unwrap()
    }

    fn ring_xml(pos_list: &str) -> String {
        format!(
            r#"<gml:Ring><gml:curveMember><gml:Curve><gml:segments>
                 <gml:LineStringSegment><gml:posList>{pos_list}</gml:posList></gml:LineStringSegment>
               </gml:segments></gml:Curve></gml:curveMember></gml:Ring>"#
        )
    }

    fn polygon_xml(exterior: &str) -> String {
        format!(
            "<gml:Polygon><gml:exterior>{}</gml:exterior></gml:Polygon>",
            ring_xml(exterior)
        )
    }

    fn surface_xml(exterior: &str) -> String {
        format!(
            r#"<gml:Surface><gml:patches><gml:PolygonPatch>
                 <gml:exterior>{}</gml:exterior>
               </gml:PolygonPatch></gml:patches></gml:Surface>"#,
            ring_xml(exterior)
        )
    }

    #[test]
    fn test_single_polygon_five_points() {
        let element = parcel_with_geometry(&polygon_xml("0 0 10 0 10 10 0 10 0 0"));
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))")
        );
    }

    #[test]
    fn test_open_ring_is_closed() {
        let element = parcel_with_geometry(&polygon_xml("0 0 10 0 10 10 0 10"));
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))")
        );
    }

    #[test]
    fn test_ring_with_too_few_points_is_dropped() {
        let element = parcel_with_geometry(&polygon_xml("0 0 10 0"));
        assert_eq!(decode_geometry(&element), None);
    }

    #[test]
    fn test_segment_join_deduplicates_shared_point() {
        let geometry = r#"<gml:Polygon><gml:exterior><gml:Ring><gml:curveMember>
              <gml:Curve><gml:segments>
                <gml:LineStringSegment><gml:posList>0 0 10 0 10 10</gml:posList></gml:LineStringSegment>
                <gml:LineStringSegment><gml:posList>10 10 0 10 0 0</gml:posList></gml:LineStringSegment>
              </gml:segments></gml:Curve>
            </gml:curveMember></gml:Ring></gml:exterior></gml:Polygon>"#;
        let element = parcel_with_geometry(geometry);
        let wkt = decode_geometry(&element).unwrap();
        assert_eq!(wkt, "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))");
        assert_eq!(wkt.matches("10 10").count(), 1);
    }

    #[test]
    fn test_segment_join_without_shared_point_appends_as_is() {
        // Pas de point partagé entre les segments: aucun comblement de trou
        let geometry = r#"<gml:Polygon><gml:exterior><gml:Ring><gml:curveMember>
              <gml:Curve><gml:segments>
                <gml:LineStringSegment><gml:posList>0 0 10 0</gml:posList></gml:LineStringSegment>
                <gml:LineStringSegment><gml:posList>10 10 0 10</gml:posList></gml:LineStringSegment>
              </gml:segments></gml:Curve>
            </gml:curveMember></gml:Ring></gml:exterior></gml:Polygon>"#;
        let element = parcel_with_geometry(geometry);
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))")
        );
    }

    #[test]
    fn test_multisurface_two_members_in_order() {
        let geometry = format!(
            r#"<gml:MultiSurface>
                 <gml:surfaceMember>{}</gml:surfaceMember>
                 <gml:surfaceMember>{}</gml:surfaceMember>
               </gml:MultiSurface>"#,
            surface_xml("0 0 1 0 1 1 0 1 0 0"),
            surface_xml("5 5 6 5 6 6 5 6 5 5"),
        );
        let element = parcel_with_geometry(&geometry);
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some(
                "MULTIPOLYGON(((0 0, 1 0, 1 1, 0 1, 0 0)), ((5 5, 6 5, 6 6, 5 6, 5 5)))"
            )
        );
    }

    #[test]
    fn test_multisurface_single_member_is_plain_polygon() {
        let geometry = format!(
            "<gml:MultiSurface><gml:surfaceMember>{}</gml:surfaceMember></gml:MultiSurface>",
            surface_xml("0 0 1 0 1 1 0 1 0 0"),
        );
        let element = parcel_with_geometry(&geometry);
        assert!(decode_geometry(&element).unwrap().starts_with("POLYGON(("));
    }

    #[test]
    fn test_multisurface_preferred_over_polygon() {
        // Premier groupement trouvé gagne: MultiSurface avant Polygon
        let multisurface = format!(
            "<gml:MultiSurface><gml:surfaceMember>{}</gml:surfaceMember></gml:MultiSurface>",
            surface_xml("5 5 6 5 6 6 5 6 5 5")
        );
        let geometry = format!("{}{}", multisurface, polygon_xml("0 0 1 0 1 1 0 1 0 0"));
        let element = parcel_with_geometry(&geometry);
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some("POLYGON((5 5, 6 5, 6 6, 5 6, 5 5))")
        );
    }

    #[test]
    fn test_interior_ring_kept_and_invalid_hole_dropped() {
        let geometry = format!(
            r#"<gml:Polygon>
                 <gml:exterior>{}</gml:exterior>
                 <gml:interior>{}</gml:interior>
                 <gml:interior>{}</gml:interior>
               </gml:Polygon>"#,
            ring_xml("0 0 10 0 10 10 0 10 0 0"),
            ring_xml("2 2 3 2 3 3 2 3 2 2"),
            // trop peu de points: ce trou est abandonné, pas le polygone
            ring_xml("4 4 5 5"),
        );
        let element = parcel_with_geometry(&geometry);
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0), (2 2, 3 2, 3 3, 2 3, 2 2))")
        );
    }

    #[test]
    fn test_patch_without_exterior_is_dropped() {
        let geometry = format!(
            "<gml:Polygon><gml:interior>{}</gml:interior></gml:Polygon>",
            ring_xml("2 2 3 2 3 3 2 3 2 2"),
        );
        let element = parcel_with_geometry(&geometry);
        assert_eq!(decode_geometry(&element), None);
    }

    #[test]
    fn test_xlink_curve_member_contributes_nothing() {
        let geometry = r##"<gml:Polygon><gml:exterior><gml:Ring>
              <gml:curveMember xlink:href="#remote"/>
              <gml:curveMember><gml:Curve><gml:segments>
                <gml:LineStringSegment><gml:posList>0 0 10 0 10 10 0 10 0 0</gml:posList></gml:LineStringSegment>
              </gml:segments></gml:Curve></gml:curveMember>
            </gml:Ring></gml:exterior></gml:Polygon>"##;
        let element = parcel_with_geometry(geometry);
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))")
        );
    }

    #[test]
    fn test_three_dimensional_pos_list_is_truncated() {
        let geometry = r#"<gml:Polygon><gml:exterior><gml:Ring><gml:curveMember>
              <gml:Curve><gml:segments>
                <gml:LineStringSegment>
                  <gml:posList srsDimension="3">0 0 99 10 0 99 10 10 99 0 10 99 0 0 99</gml:posList>
                </gml:LineStringSegment>
              </gml:segments></gml:Curve>
            </gml:curveMember></gml:Ring></gml:exterior></gml:Polygon>"#;
        let element = parcel_with_geometry(geometry);
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))")
        );
    }

    #[test]
    fn test_dimension_inherited_from_curve() {
        let geometry = r#"<gml:Polygon><gml:exterior><gml:Ring><gml:curveMember>
              <gml:Curve srsDimension="3"><gml:segments>
                <gml:LineStringSegment>
                  <gml:posList>0 0 99 10 0 99 10 10 99 0 10 99 0 0 99</gml:posList>
                </gml:LineStringSegment>
              </gml:segments></gml:Curve>
            </gml:curveMember></gml:Ring></gml:exterior></gml:Polygon>"#;
        let element = parcel_with_geometry(geometry);
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))")
        );
    }

    #[test]
    fn test_count_not_divisible_by_dimension_invalidates_segment() {
        let element = parcel_with_geometry(&polygon_xml("0 0 10 0 10"));
        assert_eq!(decode_geometry(&element), None);
    }

    #[test]
    fn test_dimension_below_two_is_clamped() {
        let geometry = r#"<gml:Polygon><gml:exterior><gml:Ring><gml:curveMember>
              <gml:Curve><gml:segments>
                <gml:LineStringSegment>
                  <gml:posList srsDimension="1">0 0 10 0 10 10 0 10 0 0</gml:posList>
                </gml:LineStringSegment>
              </gml:segments></gml:Curve>
            </gml:curveMember></gml:Ring></gml:exterior></gml:Polygon>"#;
        let element = parcel_with_geometry(geometry);
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))")
        );
    }

    #[test]
    fn test_pos_sequence_segment() {
        let geometry = r#"<gml:Polygon><gml:exterior><gml:Ring><gml:curveMember>
              <gml:Curve><gml:segments>
                <gml:LineStringSegment>
                  <gml:pos>0 0</gml:pos>
                  <gml:pos>10 0</gml:pos>
                  <gml:pos>10 10</gml:pos>
                  <gml:pos>0 10</gml:pos>
                </gml:LineStringSegment>
              </gml:segments></gml:Curve>
            </gml:curveMember></gml:Ring></gml:exterior></gml:Polygon>"#;
        let element = parcel_with_geometry(geometry);
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))")
        );
    }

    #[test]
    fn test_legacy_coordinates_segment() {
        let geometry = r#"<gml:Polygon><gml:exterior><gml:Ring><gml:curveMember>
              <gml:Curve><gml:segments>
                <gml:LineStringSegment>
                  <gml:coordinates>0,0 10,0 10,10 0,10 0,0</gml:coordinates>
                </gml:LineStringSegment>
              </gml:segments></gml:Curve>
            </gml:curveMember></gml:Ring></gml:exterior></gml:Polygon>"#;
        let element = parcel_with_geometry(geometry);
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))")
        );
    }

    #[test]
    fn test_fractional_coordinates_formatting() {
        let element =
            parcel_with_geometry(&polygon_xml("0.5 0.25 10.5 0.25 10.5 9.75 0.5 9.75 0.5 0.25"));
        assert_eq!(
            decode_geometry(&element).as_deref(),
            Some("POLYGON((0.5 0.25, 10.5 0.25, 10.5 9.75, 0.5 9.75, 0.5 0.25))")
        );
    }

    #[test]
    fn test_no_geometry_grouping() {
        let element = parcel_with_geometry("<gml:Point><gml:pos>1 1</gml:pos></gml:Point>");
        assert_eq!(decode_geometry(&element), None);
    }
}
