use crate::error::{Result, TrackerError};
use crate::scrapers::traits::PriceSource;
use crate::scrapers::types::{FetchOptions, ScrapedListing};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Where to look for a price, most specific first
const PRICE_SELECTORS: &[&str] = &[
    r#"meta[property="product:price:amount"]"#,
    r#"meta[property="og:price:amount"]"#,
    r#"meta[itemprop="price"]"#,
    r#"[itemprop="price"]"#,
    r#"[data-testid="price"]"#,
    ".price",
];

const TITLE_SELECTORS: &[&str] = &[r#"meta[property="og:title"]"#, "title", "h1"];

const LOCATION_SELECTORS: &[&str] = &[
    r#"meta[property="og:locality"]"#,
    r#"[itemprop="addressLocality"]"#,
    r#"[data-testid="location"]"#,
];

const CATEGORY_SELECTORS: &[&str] = &[
    r#"meta[property="product:category"]"#,
    r#"[itemprop="category"]"#,
    r#"[data-testid="category"]"#,
];

/// Reads prices off listing pages over plain HTTP
pub struct PageScraper {
    client: Client,
}

impl PageScraper {
    /// Create a page scraper with custom fetch options
    pub fn with_options(options: FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent)
            .build()
            .map_err(|e| TrackerError::Upstream(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> Result<String> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TrackerError::Upstream(format!("failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            warn!("{} returned status: {}", url, response.status());
            return Err(TrackerError::Upstream(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| TrackerError::Upstream(format!("failed to read body of {}: {}", url, e)))?;

        debug!("Downloaded {} bytes of HTML", html.len());
        Ok(html)
    }
}

#[async_trait]
impl PriceSource for PageScraper {
    async fn fetch_listing(&self, url: &str) -> Result<ScrapedListing> {
        let html = self.download(url).await?;
        parse_listing_page(&html)
            .ok_or_else(|| TrackerError::Upstream(format!("no usable price found at {}", url)))
    }

    fn source_name(&self) -> &'static str {
        "page"
    }
}

/// Pull title, price, location and category out of a listing page.
/// `None` when no price could be found.
pub fn parse_listing_page(html: &str) -> Option<ScrapedListing> {
    let document = Html::parse_document(html);

    let price = PRICE_SELECTORS
        .iter()
        .filter_map(|sel| first_value(&document, sel))
        .find_map(|text| parse_price(&text))?;

    Some(ScrapedListing {
        title: first_of(&document, TITLE_SELECTORS),
        price,
        location: first_of(&document, LOCATION_SELECTORS),
        category: first_of(&document, CATEGORY_SELECTORS),
    })
}

fn first_of(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|sel| first_value(document, sel))
}

/// `content` attribute for meta-like elements, text otherwise
fn first_value(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).find_map(|el| element_value(&el))
}

fn element_value(el: &ElementRef) -> Option<String> {
    let raw = match el.value().attr("content") {
        Some(content) => content.to_string(),
        None => el.text().collect::<String>(),
    };
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Parse a displayed price such as `1 234,50 kr`, `$1,299.99` or `5 195 000`.
///
/// A trailing group of one or two digits after the last `,` or `.` is the
/// decimal part; every other separator is a thousands separator.
pub fn parse_price(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let number: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, ',' | '.') || c.is_whitespace())
        .filter(|c| !c.is_whitespace())
        .collect();
    let number = number.trim_end_matches([',', '.']);

    let (int_part, frac_part) = match number.rfind([',', '.']) {
        Some(pos) if (1..=2).contains(&(number.len() - pos - 1)) => (&number[..pos], &number[pos + 1..]),
        _ => (number, ""),
    };

    let digits: String = int_part.chars().filter(|c| c.is_ascii_digit()).collect();
    let normalized = if frac_part.is_empty() {
        digits
    } else {
        format!("{}.{}", digits, frac_part)
    };

    normalized.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_options_builds_client() {
        let scraper = PageScraper::with_options(FetchOptions::default()).unwrap();
        assert_eq!(scraper.source_name(), "page");
    }

    #[test]
    fn test_parse_price_formats() {
        assert_eq!(parse_price("1 234,50 kr"), Some(1234.5));
        assert_eq!(parse_price("$1,299.99"), Some(1299.99));
        assert_eq!(parse_price("5 195 000 kr"), Some(5_195_000.0));
        assert_eq!(parse_price("1.234"), Some(1234.0));
        assert_eq!(parse_price("€ 12"), Some(12.0));
        assert_eq!(parse_price("12,5"), Some(12.5));
        assert_eq!(parse_price("5\u{a0}195\u{a0}000 kr"), Some(5_195_000.0));
        assert_eq!(parse_price("Price on request"), None);
    }

    #[test]
    fn test_parse_listing_page_prefers_meta() {
        let html = r#"
            <html>
              <head>
                <title>Fallback title</title>
                <meta property="og:title" content="Road bike, 56cm">
                <meta property="product:price:amount" content="450.00">
                <meta property="product:category" content="Bikes">
              </head>
              <body>
                <span class="price">999 kr</span>
                <span itemprop="addressLocality"> Uppsala </span>
              </body>
            </html>
        "#;

        let listing = parse_listing_page(html).unwrap();
        assert_eq!(listing.title.as_deref(), Some("Road bike, 56cm"));
        assert_eq!(listing.price, 450.0);
        assert_eq!(listing.location.as_deref(), Some("Uppsala"));
        assert_eq!(listing.category.as_deref(), Some("Bikes"));
    }

    #[test]
    fn test_parse_listing_page_falls_back_to_text() {
        let html = r#"<html><head><title>Sofa</title></head>
            <body><h1>Grey sofa</h1><div class="price">1 200 kr</div></body></html>"#;

        let listing = parse_listing_page(html).unwrap();
        assert_eq!(listing.title.as_deref(), Some("Sofa"));
        assert_eq!(listing.price, 1200.0);
        assert_eq!(listing.location, None);
    }

    #[test]
    fn test_parse_listing_page_without_price() {
        let html = "<html><head><title>Sold out</title></head><body></body></html>";
        assert!(parse_listing_page(html).is_none());
    }
}
