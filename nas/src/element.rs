//! Arbre XML minimal pour une feature parcellaire
//!
//! Un seul `AX_Flurstueck` est matérialisé à la fois; l'arbre est détruit
//! dès que l'appelant a copié attributs et géométrie. Les noms sont les
//! noms locaux (préfixe de namespace retiré): les vocabulaires ADV et GML
//! consommés ici ne se recouvrent pas.

/// Un noeud XML possédé (nom local, attributs, texte, enfants)
#[derive(Debug, Clone, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    pub(crate) fn new(name: String, attributes: Vec<(String, String)>) -> Self {
        Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn append_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub(crate) fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Nom local du noeud (sans préfixe de namespace)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Valeur d'un attribut par nom local
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Contenu texte du noeud, trimé; `None` si vide
    pub fn text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    /// Premier enfant direct portant ce nom local
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Enfants directs portant ce nom local
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Tous les enfants directs, dans l'ordre du document
    pub fn iter_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter()
    }

    /// Premier descendant portant ce nom local (parcours en profondeur,
    /// le noeud lui-même est exclu)
    pub fn descendant(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// Descente par enfants directs successifs
    pub fn path(&self, names: &[&str]) -> Option<&Element> {
        let mut current = self;
        for name in names {
            current = current.child(name)?;
        }
        Some(current)
    }
}
