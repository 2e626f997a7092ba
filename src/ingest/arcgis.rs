/// ArcGIS REST feature service client
///
/// Resolves the survey feature service from its portal item, then pages
/// through the surveys layer and the observations and events tables.
///
/// Item lookup: {portal}/sharing/rest/content/items/{id}?f=json
/// Service description: {service}?f=json
/// Query: {service}/{layer}/query?where=1%3D1&outFields=*&f=json

use crate::config::{LayerKind, LayerRef, SourceConfig};
use crate::error::SourceError;
use crate::ingest::FeatureSource;
use crate::logging::{self, Stage};
use crate::model::{DisturbanceEvent, ObservationRecord, SurveyRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;

// ============================================================================
// Feature Service Response Structures
// ============================================================================

/// Error body returned with HTTP 200 when a request is rejected
#[derive(Debug, Deserialize)]
pub struct ServiceErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl From<ServiceErrorBody> for SourceError {
    fn from(body: ServiceErrorBody) -> Self {
        SourceError::Service {
            code: body.code,
            message: body.message,
        }
    }
}

/// Portal item metadata; only the service URL is used
#[derive(Debug, Deserialize)]
pub struct ItemResponse {
    pub url: Option<String>,
    pub error: Option<ServiceErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct LayerInfo {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Feature service description listing its layers and tables
#[derive(Debug, Deserialize)]
pub struct ServiceDescription {
    #[serde(default)]
    pub layers: Vec<LayerInfo>,
    #[serde(default)]
    pub tables: Vec<LayerInfo>,
    pub error: Option<ServiceErrorBody>,
}

impl ServiceDescription {
    /// Service-side id of the configured layer or table position.
    pub fn resolve(&self, layer: LayerRef) -> Result<&LayerInfo, SourceError> {
        let list = match layer.kind {
            LayerKind::Layer => &self.layers,
            LayerKind::Table => &self.tables,
        };
        list.get(layer.index).ok_or(SourceError::MissingLayer {
            kind: layer.kind.as_str(),
            index: layer.index,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct Feature<T> {
    pub attributes: T,
}

/// One page of a layer query
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct QueryResponse<T> {
    #[serde(default)]
    pub features: Vec<Feature<T>>,
    #[serde(rename = "exceededTransferLimit", default)]
    pub exceeded_transfer_limit: bool,
    pub error: Option<ServiceErrorBody>,
}

// ============================================================================
// Attribute Structures
// ============================================================================

/// Survey layer attributes as published by the field app
#[derive(Debug, Deserialize)]
pub struct SurveyAttributes {
    #[serde(alias = "GlobalID", alias = "globalID")]
    pub globalid: Option<String>,
    pub group_name: Option<String>,
    pub survey_area: Option<String>,
    #[serde(default, deserialize_with = "flexible_int")]
    pub count_block: Option<i32>,
    #[serde(default, deserialize_with = "epoch_millis")]
    pub start_date: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "epoch_millis")]
    pub end_date: Option<NaiveDateTime>,
    pub approved: Option<String>,
    #[serde(default)]
    pub visibility: Lenient<i32>,
    #[serde(default)]
    pub beaufort: Lenient<i32>,
    pub assessable: Option<String>,
    pub disturbance_obs: Option<String>,
}

impl FeatureAttributes for SurveyAttributes {
    type Record = SurveyRecord;

    fn unreadable_fields(&self) -> usize {
        [self.visibility.is_unreadable(), self.beaufort.is_unreadable()]
            .iter()
            .filter(|&&bad| bad)
            .count()
    }

    /// `None` when an identity or timing field is missing.
    fn into_record(self) -> Option<SurveyRecord> {
        Some(SurveyRecord {
            globalid: self.globalid?,
            group_name: self.group_name?,
            survey_area: self.survey_area?,
            count_block: self.count_block?,
            start_date: self.start_date?,
            end_date: self.end_date,
            approved: self.approved,
            visibility: self.visibility.value(),
            beaufort: self.beaufort.value(),
            assessable: self.assessable,
            disturbance_obs: self.disturbance_obs,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct EventAttributes {
    #[serde(alias = "GlobalID", alias = "globalID")]
    pub globalid: Option<String>,
    #[serde(alias = "ParentGlobalID", alias = "parentGlobalID")]
    pub parentglobalid: Option<String>,
}

impl FeatureAttributes for EventAttributes {
    type Record = DisturbanceEvent;

    fn into_record(self) -> Option<DisturbanceEvent> {
        Some(DisturbanceEvent {
            globalid: self.globalid?,
            parentglobalid: self.parentglobalid,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ObservationAttributes {
    #[serde(alias = "ParentGlobalID", alias = "parentGlobalID")]
    pub parentglobalid: Option<String>,
    pub species: Option<String>,
    #[serde(default)]
    pub sp_count: Lenient<f64>,
    #[serde(default)]
    pub nest_count: Lenient<f64>,
}

impl FeatureAttributes for ObservationAttributes {
    type Record = ObservationRecord;

    fn unreadable_fields(&self) -> usize {
        [self.sp_count.is_unreadable(), self.nest_count.is_unreadable()]
            .iter()
            .filter(|&&bad| bad)
            .count()
    }

    fn into_record(self) -> Option<ObservationRecord> {
        Some(ObservationRecord {
            parentglobalid: self.parentglobalid,
            species: self.species,
            sp_count: self.sp_count.value(),
            nest_count: self.nest_count.value(),
        })
    }
}

/// Attribute rows that convert into pipeline records.
pub trait FeatureAttributes {
    type Record;

    /// Optional fields whose value could not be read and was dropped.
    fn unreadable_fields(&self) -> usize {
        0
    }

    /// `None` when the row cannot become a record at all.
    fn into_record(self) -> Option<Self::Record>;
}

// ============================================================================
// Field Decoding
// ============================================================================

// Field app exports are not consistent about numbers: counts arrive as
// integers, doubles or strings, and blank strings mean missing.

fn number_from_value(value: Option<Value>) -> Result<Option<f64>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("not a number: {:?}", s)),
        Some(other) => Err(format!("not a number: {}", other)),
    }
}

fn integer_from_value(value: Option<Value>) -> Result<Option<i32>, String> {
    let Some(n) = number_from_value(value)? else {
        return Ok(None);
    };
    if n.fract() != 0.0 || n < i32::MIN as f64 || n > i32::MAX as f64 {
        return Err(format!("not an integer: {}", n));
    }
    Ok(Some(n as i32))
}

/// Identity fields: an unreadable value fails the page.
fn flexible_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    integer_from_value(Option::<Value>::deserialize(deserializer)?).map_err(D::Error::custom)
}

/// An optional numeric field. Unreadable values become `Unreadable` instead
/// of failing the page, and read as missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lenient<T> {
    Missing,
    Value(T),
    Unreadable,
}

impl<T> Default for Lenient<T> {
    fn default() -> Self {
        Lenient::Missing
    }
}

impl<T> Lenient<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Lenient::Value(v) => Some(v),
            Lenient::Missing | Lenient::Unreadable => None,
        }
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self, Lenient::Unreadable)
    }

    fn from_result(result: Result<Option<T>, String>) -> Self {
        match result {
            Ok(Some(v)) => Lenient::Value(v),
            Ok(None) => Lenient::Missing,
            Err(_) => Lenient::Unreadable,
        }
    }
}

impl<'de> Deserialize<'de> for Lenient<f64> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(Lenient::from_result(number_from_value(value)))
    }
}

impl<'de> Deserialize<'de> for Lenient<i32> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(Lenient::from_result(integer_from_value(value)))
    }
}

/// Date fields are epoch milliseconds (UTC).
fn epoch_millis<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    let ms = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(other) => return Err(D::Error::custom(format!("not an epoch timestamp: {}", other))),
    };
    ms.and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| Some(dt.naive_utc()))
        .ok_or_else(|| D::Error::custom("epoch timestamp out of range"))
}

// ============================================================================
// URL Builders and Parsers
// ============================================================================

pub fn build_item_url(portal_url: &str, content_id: &str) -> String {
    format!(
        "{}/sharing/rest/content/items/{}?f=json",
        portal_url.trim_end_matches('/'),
        content_id
    )
}

pub fn build_query_url(service_url: &str, layer_id: i64, offset: usize, count: usize) -> String {
    format!(
        "{}/{}/query?where=1%3D1&outFields=*&f=json&resultOffset={}&resultRecordCount={}",
        service_url.trim_end_matches('/'),
        layer_id,
        offset,
        count
    )
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, SourceError> {
    serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))
}

/// Service URL from an item lookup body.
pub fn parse_item_response(body: &str, content_id: &str) -> Result<String, SourceError> {
    let item: ItemResponse = parse_json(body)?;
    if let Some(err) = item.error {
        return Err(err.into());
    }
    item.url
        .filter(|url| !url.trim().is_empty())
        .map(|url| url.trim_end_matches('/').to_string())
        .ok_or_else(|| SourceError::NoServiceUrl(content_id.to_string()))
}

pub fn parse_service_description(body: &str) -> Result<ServiceDescription, SourceError> {
    let description: ServiceDescription = parse_json(body)?;
    match description.error {
        Some(err) => Err(err.into()),
        None => Ok(description),
    }
}

/// Decode one query page. A service `error` body takes precedence over
/// any features in the same response.
pub fn parse_query_response<T: DeserializeOwned>(
    body: &str,
) -> Result<QueryResponse<T>, SourceError> {
    let mut page: QueryResponse<T> = parse_json(body)?;
    match page.error.take() {
        Some(err) => Err(err.into()),
        None => Ok(page),
    }
}

/// Converts attributes to records. Incomplete rows are skipped and
/// unreadable optional values dropped, each with a warning.
fn collect_records<A: FeatureAttributes>(layer: &str, attributes: Vec<A>) -> Vec<A::Record> {
    let total = attributes.len();
    let unreadable: usize = attributes.iter().map(A::unreadable_fields).sum();
    if unreadable > 0 {
        logging::warn(
            Stage::Source,
            Some(layer),
            &format!("{} unreadable numeric values treated as missing", unreadable),
        );
    }

    let records: Vec<A::Record> = attributes
        .into_iter()
        .filter_map(FeatureAttributes::into_record)
        .collect();
    let skipped = total - records.len();
    if skipped > 0 {
        logging::warn(
            Stage::Source,
            Some(layer),
            &format!("Skipped {} of {} records with missing identity fields", skipped, total),
        );
    }
    records
}

// ============================================================================
// Feature Service Client
// ============================================================================

/// A resolved survey feature service.
pub struct FeatureService {
    client: reqwest::blocking::Client,
    service_url: String,
    page_size: usize,
    surveys_id: i64,
    observations_id: i64,
    events_id: i64,
}

impl FeatureService {
    /// Looks up the portal item and resolves the configured layer positions.
    pub fn connect(config: &SourceConfig) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let item_body = get_text(&client, &build_item_url(&config.portal_url, &config.content_id))?;
        let service_url = parse_item_response(&item_body, &config.content_id)?;

        let description_body = get_text(&client, &format!("{}?f=json", service_url))?;
        let description = parse_service_description(&description_body)?;
        let surveys_id = description.resolve(config.layers.surveys)?.id;
        let observations_id = description.resolve(config.layers.observations)?.id;
        let events_id = description.resolve(config.layers.events)?.id;

        logging::info(
            Stage::Source,
            Some(&config.content_id),
            &format!(
                "Resolved {} (surveys={}, observations={}, events={})",
                service_url, surveys_id, observations_id, events_id
            ),
        );

        Ok(FeatureService {
            client,
            service_url,
            page_size: config.page_size.max(1),
            surveys_id,
            observations_id,
            events_id,
        })
    }

    /// All attribute rows of a layer, following `exceededTransferLimit`.
    fn query_all<T: DeserializeOwned>(
        &self,
        layer_id: i64,
        layer: &str,
    ) -> Result<Vec<T>, SourceError> {
        let mut rows = Vec::new();
        let mut offset = 0;
        loop {
            let url = build_query_url(&self.service_url, layer_id, offset, self.page_size);
            let page: QueryResponse<T> = parse_query_response(&get_text(&self.client, &url)?)?;
            let received = page.features.len();
            rows.extend(page.features.into_iter().map(|f| f.attributes));
            if !page.exceeded_transfer_limit || received == 0 {
                break;
            }
            offset += received;
        }
        logging::debug(
            Stage::Source,
            Some(layer),
            &format!("Fetched {} rows", rows.len()),
        );
        Ok(rows)
    }
}

impl FeatureSource for FeatureService {
    fn surveys(&self) -> Result<Vec<SurveyRecord>, SourceError> {
        let rows: Vec<SurveyAttributes> = self.query_all(self.surveys_id, "surveys")?;
        Ok(collect_records("surveys", rows))
    }

    fn events(&self) -> Result<Vec<DisturbanceEvent>, SourceError> {
        let rows: Vec<EventAttributes> = self.query_all(self.events_id, "events")?;
        Ok(collect_records("events", rows))
    }

    fn observations(&self) -> Result<Vec<ObservationRecord>, SourceError> {
        let rows: Vec<ObservationAttributes> =
            self.query_all(self.observations_id, "observations")?;
        Ok(collect_records("observations", rows))
    }
}

fn get_text(client: &reqwest::blocking::Client, url: &str) -> Result<String, SourceError> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()?;

    if !response.status().is_success() {
        return Err(SourceError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    Ok(response.text()?)
}

// ============================================================================
// Tests
// ============================================================================
