// src/fetch/links.rs

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};
use url::Url;

use crate::catalog::PdfLinkEntry;

/// Element text with whitespace runs collapsed.
fn clean_text(el: &ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_pdf_href(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.to_ascii_lowercase().ends_with(".pdf")
}

/// Scrape the tariff listing page.
///
/// The page is a run of `<h3>` region headings, `<h4>` company headings and
/// one `<table>` per company. Each body row holds the locality in its first
/// cell and the current-tariff PDF link in its second; rows with fewer than
/// three cells are ignored.
pub fn parse_pdf_links(html: &str, base: &Url) -> Vec<PdfLinkEntry> {
    let doc = Html::parse_document(html);
    let blocks = Selector::parse("h3, h4, table").expect("block selector should parse");
    let tr = Selector::parse("tr").expect("row selector should parse");
    let td = Selector::parse("td").expect("cell selector should parse");
    let link = Selector::parse("a[href]").expect("link selector should parse");

    let mut region: Option<String> = None;
    let mut company: Option<String> = None;
    let mut out = Vec::new();

    for el in doc.select(&blocks) {
        match el.value().name() {
            "h3" => {
                region = Some(clean_text(&el));
                company = None;
            }
            "h4" => {
                if region.is_some() {
                    company = Some(clean_text(&el));
                }
            }
            "table" => {
                let (Some(region), Some(company)) = (&region, &company) else {
                    continue;
                };
                // first row is the header
                for row in el.select(&tr).skip(1) {
                    let cells: Vec<ElementRef> = row.select(&td).collect();
                    if cells.len() < 3 {
                        continue;
                    }
                    let locality = clean_text(&cells[0]);
                    let Some(href) = cells[1]
                        .select(&link)
                        .filter_map(|a| a.value().attr("href"))
                        .find(|h| is_pdf_href(h))
                    else {
                        continue;
                    };
                    let Ok(pdf_url) = base.join(href.trim()) else {
                        trace!(href, "unresolvable link");
                        continue;
                    };
                    out.push(PdfLinkEntry {
                        region: region.clone(),
                        company: company.clone(),
                        locality,
                        pdf_url: pdf_url.to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    debug!(links = out.len(), "parsed tariff listing");
    out
}
