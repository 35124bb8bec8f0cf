// src/catalog.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::extract::{RateCandidate, SectionedTariffRecord, TariffRecord};

type Localities<T> = BTreeMap<String, T>;
type Companies<T> = BTreeMap<String, Localities<T>>;

/// Values keyed region → company → locality, serialized as nested JSON objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog<T> {
    regions: BTreeMap<String, Companies<T>>,
}

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Self {
            regions: BTreeMap::new(),
        }
    }
}

impl<T> Catalog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for a triple, returning the old one.
    pub fn insert(
        &mut self,
        region: impl Into<String>,
        company: impl Into<String>,
        locality: impl Into<String>,
        value: T,
    ) -> Option<T> {
        self.regions
            .entry(region.into())
            .or_default()
            .entry(company.into())
            .or_default()
            .insert(locality.into(), value)
    }

    pub fn get(&self, region: &str, company: &str, locality: &str) -> Option<&T> {
        self.regions.get(region)?.get(company)?.get(locality)
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    pub fn companies(&self, region: &str) -> impl Iterator<Item = &str> {
        self.regions
            .get(region)
            .into_iter()
            .flat_map(|c| c.keys().map(String::as_str))
    }

    pub fn localities(&self, region: &str, company: &str) -> impl Iterator<Item = &str> {
        self.regions
            .get(region)
            .and_then(|c| c.get(company))
            .into_iter()
            .flat_map(|l| l.keys().map(String::as_str))
    }

    /// Every `(region, company, locality, value)` in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &str, &T)> {
        self.regions.iter().flat_map(|(r, companies)| {
            companies.iter().flat_map(move |(c, localities)| {
                localities
                    .iter()
                    .map(move |(l, v)| (r.as_str(), c.as_str(), l.as_str(), v))
            })
        })
    }

    /// Keep only the triples for which `keep` returns true; empty levels are pruned.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str, &str, &T) -> bool) {
        for (r, companies) in self.regions.iter_mut() {
            for (c, localities) in companies.iter_mut() {
                localities.retain(|l, v| keep(r, c, l, v));
            }
            companies.retain(|_, l| !l.is_empty());
        }
        self.regions.retain(|_, c| !c.is_empty());
    }

    pub fn len(&self) -> usize {
        self.regions
            .values()
            .flat_map(|c| c.values())
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A scraped listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfLinkEntry {
    pub region: String,
    pub company: String,
    pub locality: String,
    pub pdf_url: String,
}

/// Leaf of the link catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfLink {
    pub tarifa_vigente_pdf: String,
}

pub type LinkCatalog = Catalog<PdfLink>;

impl FromIterator<PdfLinkEntry> for LinkCatalog {
    /// Later rows for the same triple replace earlier ones.
    fn from_iter<I: IntoIterator<Item = PdfLinkEntry>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for e in iter {
            catalog.insert(
                e.region,
                e.company,
                e.locality,
                PdfLink {
                    tarifa_vigente_pdf: e.pdf_url,
                },
            );
        }
        catalog
    }
}

impl LinkCatalog {
    pub fn links(&self) -> impl Iterator<Item = PdfLinkEntry> + '_ {
        self.entries().map(|(r, c, l, link)| PdfLinkEntry {
            region: r.to_string(),
            company: c.to_string(),
            locality: l.to_string(),
            pdf_url: link.tarifa_vigente_pdf.clone(),
        })
    }
}

/// Everything extracted from one locality's current tariff PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffEntry {
    pub source_pdf: String,
    pub record: TariffRecord,
    pub sections: SectionedTariffRecord,
    pub headline_rate: Option<RateCandidate>,
    /// Whether table mode saw column gaps or only plain lines.
    #[serde(default)]
    pub table_layout: bool,
    pub extracted_at: DateTime<Utc>,
}

pub type TariffCatalog = Catalog<TariffEntry>;

impl TariffCatalog {
    /// Latest extracted tariff for a locality.
    pub fn lookup(&self, region: &str, company: &str, locality: &str) -> Option<&TariffEntry> {
        self.get(region, company, locality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(region: &str, company: &str, locality: &str, url: &str) -> PdfLinkEntry {
        PdfLinkEntry {
            region: region.into(),
            company: company.into(),
            locality: locality.into(),
            pdf_url: url.into(),
        }
    }

    #[test]
    fn one_value_per_triple() {
        let links: LinkCatalog = vec![
            entry("Región de Valparaíso", "Esval", "Quillota", "https://x/1.pdf"),
            entry("Región de Valparaíso", "Esval", "Quillota", "https://x/2.pdf"),
            entry("Región de Valparaíso", "Esval", "Limache", "https://x/3.pdf"),
            entry("Región Metropolitana", "Aguas Andinas", "Santiago", "https://x/4.pdf"),
        ]
        .into_iter()
        .collect();

        assert_eq!(links.len(), 3);
        assert_eq!(
            links.get("Región de Valparaíso", "Esval", "Quillota"),
            Some(&PdfLink {
                tarifa_vigente_pdf: "https://x/2.pdf".into()
            })
        );
        assert_eq!(
            links.regions().collect::<Vec<_>>(),
            vec!["Región Metropolitana", "Región de Valparaíso"]
        );
        assert_eq!(
            links
                .localities("Región de Valparaíso", "Esval")
                .collect::<Vec<_>>(),
            vec!["Limache", "Quillota"]
        );
        assert_eq!(links.companies("Región de Aysén").count(), 0);
        assert_eq!(links.links().count(), 3);
    }

    #[test]
    fn serializes_as_nested_objects() {
        let links: LinkCatalog = vec![entry("R", "C", "L", "https://x/a.pdf")]
            .into_iter()
            .collect();
        let json = serde_json::to_value(&links).unwrap();
        assert_eq!(json["R"]["C"]["L"]["tarifa_vigente_pdf"], "https://x/a.pdf");

        let back: LinkCatalog = serde_json::from_value(json).unwrap();
        assert_eq!(back, links);
    }

    #[test]
    fn retain_prunes_empty_levels() {
        let mut links: LinkCatalog = vec![
            entry("R1", "C1", "L1", "a"),
            entry("R1", "C2", "L2", "b"),
            entry("R2", "C3", "L3", "c"),
        ]
        .into_iter()
        .collect();
        links.retain(|_, _, l, _| l != "L2" && l != "L3");
        assert_eq!(links.len(), 1);
        assert_eq!(links.companies("R1").collect::<Vec<_>>(), vec!["C1"]);
        assert_eq!(links.regions().count(), 1);
    }
}
