//! In-memory product catalog loaded from JSON Lines exports.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use maud::html;
use pulldown_cmark::{Options, Parser, html as markdown_html};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use storefront_client_core::protocol::DocumentPayload;
use thiserror::Error;

pub const SEARCH_RESULT_LIMIT: usize = 25;

/// Product types kept out of the browse hierarchy.
const HIERARCHY_EXCLUDED_TYPES: [&str; 2] = ["Consumables", "Accessory"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid record at {source_name}:{line}: {source}")]
    Parse {
        source_name: String,
        line: usize,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub documentation_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "content")]
    pub text: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

impl Document {
    pub fn is_markdown(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|format| format.trim().eq_ignore_ascii_case("markdown"))
    }

    /// Markdown documents are rendered; anything else is shown escaped and preformatted.
    pub fn to_payload(&self) -> DocumentPayload {
        let html_content = match self.text.as_deref() {
            Some(text) if self.is_markdown() => render_markdown(text),
            text => html! { pre { (text.unwrap_or("No content found.")) } }.into_string(),
        };
        DocumentPayload {
            title: self
                .title
                .clone()
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| "Document".to_string()),
            html_content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyNode {
    pub family: String,
    pub product_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub family: Option<String>,
    pub product_type: Option<String>,
    pub tags: Vec<String>,
    pub q: Option<String>,
}

impl SearchQuery {
    /// Parses a raw query string; `tag` may repeat.
    pub fn from_query_string(raw: &str) -> Self {
        let mut query = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "family" => query.family = Some(value),
                "type" => query.product_type = Some(value),
                "tag" => query.tags.push(value),
                "q" => query.q = Some(value),
                _ => {}
            }
        }
        query
    }

    /// Query string for the same search with `tag` toggled.
    pub fn with_tag_toggled(&self, tag: &str) -> String {
        let mut next = self.clone();
        if let Some(index) = next.tags.iter().position(|current| current == tag) {
            next.tags.remove(index);
        } else {
            next.tags.push(tag.to_string());
        }
        next.to_query_string()
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        if let Some(family) = &self.family {
            serializer.append_pair("family", family);
            if let Some(product_type) = &self.product_type {
                serializer.append_pair("type", product_type);
            }
        }
        for tag in &self.tags {
            serializer.append_pair("tag", tag);
        }
        if let Some(q) = &self.q {
            serializer.append_pair("q", q);
        }
        serializer.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTag {
    pub tag: String,
    pub dynamic_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults<'a> {
    pub products: Vec<&'a Product>,
    pub display_tags: Vec<DisplayTag>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    documents: HashMap<String, Document>,
    hierarchy: Vec<FamilyNode>,
    tags_by_frequency: Vec<TagCount>,
}

impl Catalog {
    pub fn load(products_path: &Path, documents_path: &Path) -> Result<Self, CatalogError> {
        let products = read_jsonl(products_path)?;
        let documents = read_jsonl(documents_path)?;
        Ok(Self::from_parts(products, documents))
    }

    pub fn from_parts(products: Vec<Product>, documents: Vec<Document>) -> Self {
        let mut families: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut tag_counts: HashMap<String, usize> = HashMap::new();

        for product in &products {
            let (Some(family), Some(product_type)) = (
                non_empty(product.family.as_deref()),
                non_empty(product.product_type.as_deref()),
            ) else {
                continue;
            };
            if HIERARCHY_EXCLUDED_TYPES.contains(&product_type) {
                continue;
            }
            families
                .entry(family.to_string())
                .or_default()
                .insert(product_type.to_string());
            for tag in &product.tags {
                *tag_counts.entry(tag.clone()).or_default() += 1;
            }
        }

        let hierarchy = families
            .into_iter()
            .map(|(family, types)| FamilyNode {
                family,
                product_types: types.into_iter().collect(),
            })
            .collect();

        let mut tags_by_frequency: Vec<TagCount> = tag_counts
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect();
        tags_by_frequency.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));

        let documents = documents
            .into_iter()
            .map(|document| (document.id.clone(), document))
            .collect();

        Self {
            products,
            documents,
            hierarchy,
            tags_by_frequency,
        }
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn hierarchy(&self) -> &[FamilyNode] {
        &self.hierarchy
    }

    pub fn tags_by_frequency(&self) -> &[TagCount] {
        &self.tags_by_frequency
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|product| product.id == id)
    }

    pub fn product_by_sku(&self, sku: &str) -> Option<&Product> {
        self.products
            .iter()
            .find(|product| product.sku.as_deref() == Some(sku))
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    /// Documentation attached to a product, titled from the document set and sorted by title.
    pub fn documentation_for(&self, product: &Product) -> Vec<DocumentLink> {
        let mut links: Vec<DocumentLink> = product
            .documentation_ids
            .iter()
            .map(|id| DocumentLink {
                id: id.clone(),
                title: self
                    .documents
                    .get(id)
                    .and_then(|document| non_empty(document.title.as_deref()))
                    .unwrap_or(id)
                    .to_string(),
            })
            .collect();
        links.sort_by(|a, b| a.title.cmp(&b.title));
        links
    }

    pub fn search(&self, query: &SearchQuery) -> SearchResults<'_> {
        let family = query.family.as_deref();
        let product_type = family.and(query.product_type.as_deref());

        let filtered = self.products.iter().filter(|product| {
            family.is_none_or(|family| product.family.as_deref() == Some(family))
                && product_type
                    .is_none_or(|product_type| product.product_type.as_deref() == Some(product_type))
                && query.tags.iter().all(|tag| product.tags.contains(tag))
        });

        let products: Vec<&Product> = match query.q.as_deref().map(search_terms) {
            Some(terms) if !terms.is_empty() => {
                let mut ranked: Vec<(usize, &Product)> = filtered
                    .filter_map(|product| {
                        let score = relevance(product, &terms);
                        (score > 0).then_some((score, product))
                    })
                    .collect();
                ranked.sort_by(|a, b| b.0.cmp(&a.0));
                ranked
                    .into_iter()
                    .take(SEARCH_RESULT_LIMIT)
                    .map(|(_, product)| product)
                    .collect()
            }
            _ => filtered.collect(),
        };

        let mut dynamic_counts: HashMap<&str, usize> = HashMap::new();
        for product in &products {
            for tag in &product.tags {
                *dynamic_counts.entry(tag.as_str()).or_default() += 1;
            }
        }
        let display_tags = self
            .tags_by_frequency
            .iter()
            .map(|entry| DisplayTag {
                tag: entry.tag.clone(),
                dynamic_count: dynamic_counts.get(entry.tag.as_str()).copied().unwrap_or(0),
            })
            .collect();

        SearchResults {
            products,
            display_tags,
        }
    }
}

pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(text, options);
    let mut rendered = String::with_capacity(text.len() * 3 / 2);
    markdown_html::push_html(&mut rendered, parser);
    rendered
}

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CatalogError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_jsonl(&raw, &path.display().to_string())
}

pub fn parse_jsonl<T: DeserializeOwned>(raw: &str, source_name: &str) -> Result<Vec<T>, CatalogError> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|source| CatalogError::Parse {
                source_name: source_name.to_string(),
                line: index + 1,
                source,
            })
        })
        .collect()
}

fn search_terms(q: &str) -> Vec<String> {
    q.split_whitespace().map(str::to_lowercase).collect()
}

fn relevance(product: &Product, terms: &[String]) -> usize {
    let name = product.name.to_lowercase();
    let description = product.description.as_deref().unwrap_or_default().to_lowercase();
    let family = product.family.as_deref().unwrap_or_default().to_lowercase();
    let product_type = product.product_type.as_deref().unwrap_or_default().to_lowercase();
    let tags: Vec<String> = product.tags.iter().map(|tag| tag.to_lowercase()).collect();

    terms
        .iter()
        .map(|term| {
            let mut score = 0;
            if name.contains(term.as_str()) {
                score += 3;
            }
            if tags.iter().any(|tag| tag.contains(term.as_str())) {
                score += 2;
            }
            if description.contains(term.as_str())
                || family.contains(term.as_str())
                || product_type.contains(term.as_str())
            {
                score += 1;
            }
            score
        })
        .sum()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCTS: &str = r#"
{"_id":"p1","name":"Cordless Drill X200","sku":"DR-200","family":"Drills","product_type":"Cordless Drill","tags":["cordless","18v"],"description":"Compact drill.","documentation_ids":["d2","d1","d9"]}
{"_id":"p2","name":"Hammer Drill H5","family":"Drills","product_type":"Hammer Drill","tags":["corded","masonry"],"description":"For concrete."}
{"_id":"p3","name":"Circular Saw S7","family":"Saws","product_type":"Circular Saw","tags":["cordless","18v","wood"]}
{"_id":"p4","name":"Drill Bit Set","family":"Drills","product_type":"Accessory","tags":["bits"]}
{"_id":"p5","name":"Saw Blade","family":"Saws","product_type":"Consumables","tags":["wood"]}
"#;

    const DOCUMENTS: &str = r##"
{"_id":"d1","title":"User Manual","text":"# Setup\n\nCharge the battery.","format":"Markdown"}
{"_id":"d2","title":"Safety Sheet","text":"Wear <goggles>.","format":"text"}
"##;

    fn catalog() -> Catalog {
        let products = parse_jsonl(PRODUCTS, "products").expect("products");
        let documents = parse_jsonl(DOCUMENTS, "documents").expect("documents");
        Catalog::from_parts(products, documents)
    }

    #[test]
    fn hierarchy_is_sorted_and_skips_accessories_and_consumables() {
        let catalog = catalog();
        assert_eq!(
            catalog.hierarchy(),
            &[
                FamilyNode {
                    family: "Drills".to_string(),
                    product_types: vec!["Cordless Drill".to_string(), "Hammer Drill".to_string()],
                },
                FamilyNode {
                    family: "Saws".to_string(),
                    product_types: vec!["Circular Saw".to_string()],
                },
            ]
        );
    }

    #[test]
    fn tags_sort_by_frequency_then_name() {
        let catalog = catalog();
        let tags: Vec<(&str, usize)> = catalog
            .tags_by_frequency()
            .iter()
            .map(|entry| (entry.tag.as_str(), entry.count))
            .collect();
        assert_eq!(
            tags,
            [
                ("18v", 2),
                ("cordless", 2),
                ("corded", 1),
                ("masonry", 1),
                ("wood", 1)
            ]
        );
    }

    #[test]
    fn search_filters_by_family_type_and_all_tags() {
        let catalog = catalog();
        let query = SearchQuery::from_query_string("family=Drills&type=Cordless+Drill");
        let ids: Vec<&str> = catalog
            .search(&query)
            .products
            .iter()
            .map(|product| product.id.as_str())
            .collect();
        assert_eq!(ids, ["p1"]);

        let query = SearchQuery::from_query_string("tag=cordless&tag=wood");
        let results = catalog.search(&query);
        let ids: Vec<&str> = results.products.iter().map(|product| product.id.as_str()).collect();
        assert_eq!(ids, ["p3"]);
        let wood = results
            .display_tags
            .iter()
            .find(|entry| entry.tag == "wood")
            .expect("wood tag");
        assert_eq!(wood.dynamic_count, 1);
        let masonry = results
            .display_tags
            .iter()
            .find(|entry| entry.tag == "masonry")
            .expect("masonry tag");
        assert_eq!(masonry.dynamic_count, 0);
    }

    #[test]
    fn type_is_ignored_without_family() {
        let query = SearchQuery::from_query_string("type=Hammer+Drill");
        assert_eq!(catalog().search(&query).products.len(), 5);
    }

    #[test]
    fn free_text_ranks_name_matches_first() {
        let catalog = catalog();
        let query = SearchQuery::from_query_string("q=DRILL");
        let ids: Vec<&str> = catalog
            .search(&query)
            .products
            .iter()
            .map(|product| product.id.as_str())
            .collect();
        assert_eq!(ids, ["p1", "p2", "p4"]);

        let query = SearchQuery::from_query_string("q=nothing-matches");
        assert!(catalog.search(&query).products.is_empty());
    }

    #[test]
    fn documentation_uses_titles_and_sorts() {
        let catalog = catalog();
        let product = catalog.product_by_sku("DR-200").expect("sku lookup");
        let links = catalog.documentation_for(product);
        let titles: Vec<&str> = links.iter().map(|link| link.title.as_str()).collect();
        assert_eq!(titles, ["Safety Sheet", "User Manual", "d9"]);
    }

    #[test]
    fn documents_render_markdown_or_escaped_preformatted_text() {
        let catalog = catalog();
        let manual = catalog.document("d1").expect("manual").to_payload();
        assert_eq!(manual.title, "User Manual");
        assert!(manual.html_content.contains("<h1>Setup</h1>"));

        let sheet = catalog.document("d2").expect("sheet").to_payload();
        assert_eq!(sheet.html_content, "<pre>Wear &lt;goggles&gt;.</pre>");

        let empty = Document {
            id: "d3".to_string(),
            title: None,
            text: None,
            format: None,
        }
        .to_payload();
        assert_eq!(empty.title, "Document");
        assert_eq!(empty.html_content, "<pre>No content found.</pre>");
    }

    #[test]
    fn tag_toggle_keeps_other_filters() {
        let query = SearchQuery::from_query_string("family=Saws&tag=wood&q=blade");
        assert_eq!(query.with_tag_toggled("wood"), "family=Saws&q=blade");
        assert_eq!(
            query.with_tag_toggled("18v"),
            "family=Saws&tag=wood&tag=18v&q=blade"
        );
    }

    #[test]
    fn malformed_lines_report_their_position() {
        let error = parse_jsonl::<Product>("{\"_id\":\"p1\",\"name\":\"A\"}\n\nnot json", "products")
            .expect_err("parse error");
        assert!(matches!(error, CatalogError::Parse { line: 3, .. }));
    }
}
