// Field catalog: the "Test API" step of widget creation
//
// Probes a candidate URL, discovers its fields and suggests a starting
// selection for the chosen display kind.

use crate::fields::{extract_fields_with, ExtractOptions, FieldDescriptor, FieldType};
use crate::probe::{loggable_url, FetchError, Fetcher};
use crate::widget::WidgetKind;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Number of fields offered for selection
pub const MAX_CATALOG_FIELDS: usize = 40;

/// Leaf fields preselected for cards and tables
const DEFAULT_SELECTION_LEN: usize = 4;

/// A public API suggested to users as a starting point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleSource {
    pub name: &'static str,
    pub url: &'static str,
    pub kind: WidgetKind,
    pub description: &'static str,
}

pub const SAMPLE_SOURCES: &[SampleSource] = &[
    SampleSource {
        name: "Coinbase Exchange Rates",
        url: "https://api.coinbase.com/v2/exchange-rates?currency=BTC",
        kind: WidgetKind::Card,
        description: "Exchange rates for a base currency (BTC shown)",
    },
    SampleSource {
        name: "CoinGecko Crypto Market",
        url: "https://api.coingecko.com/api/v3/coins/markets?vs_currency=usd&order=market_cap_desc&per_page=10&page=1",
        kind: WidgetKind::Table,
        description: "Top cryptocurrencies market data",
    },
];

/// Outcome of testing a candidate API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub success: bool,
    pub message: String,
    pub fields: Vec<FieldDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FetchError>,
}

impl ProbeReport {
    fn failure(message: String, error: Option<FetchError>) -> Self {
        Self {
            success: false,
            message,
            fields: Vec::new(),
            raw: None,
            status: None,
            error,
        }
    }

    /// The prefix of the catalog offered for selection
    pub fn selectable(&self) -> &[FieldDescriptor] {
        let end = self.fields.len().min(MAX_CATALOG_FIELDS);
        &self.fields[..end]
    }
}

/// Probe `url` once and build its field catalog
pub async fn test_api(fetcher: &dyn Fetcher, url: &str, options: &ExtractOptions) -> ProbeReport {
    let url = url.trim();
    if url.is_empty() {
        return ProbeReport::failure("API URL is required".to_string(), None);
    }

    match fetcher.fetch(url).await {
        Ok(response) => {
            let fields = extract_fields_with(&response.data, options);
            info!(target: "catalog", url = %loggable_url(url), fields = fields.len(), "API test succeeded");
            ProbeReport {
                success: true,
                message: format!("API connection successful! {} fields found.", fields.len()),
                fields,
                raw: Some(response.data),
                status: Some(response.status),
                error: None,
            }
        }
        Err(e) => {
            warn!(target: "catalog", url = %loggable_url(url), error = %e, "API test failed");
            ProbeReport::failure(e.to_string(), Some(e))
        }
    }
}

/// Suggested initial selection for a freshly probed source.
///
/// Charts get a label and a value (first string leaf, first number leaf);
/// cards and tables get the first few leaves.
pub fn default_selection(fields: &[FieldDescriptor], kind: WidgetKind) -> Vec<String> {
    match kind {
        WidgetKind::Chart => {
            let first_of = |wanted: FieldType| {
                fields
                    .iter()
                    .find(|f| f.field_type == wanted)
                    .map(|f| f.path.clone())
            };
            [first_of(FieldType::String), first_of(FieldType::Number)]
                .into_iter()
                .flatten()
                .collect()
        }
        WidgetKind::Card | WidgetKind::Table => fields
            .iter()
            .filter(|f| f.is_leaf())
            .take(DEFAULT_SELECTION_LEN)
            .map(|f| f.path.clone())
            .collect(),
    }
}
