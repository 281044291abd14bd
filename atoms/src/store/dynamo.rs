use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, TransactWriteItem, Update};
use aws_sdk_dynamodb::Client as DynamoClient;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Number, Value};

use super::{
    matches_absent, Collection, Document, DocumentStore, FieldFilter, StoreError, Write,
    DEFAULT_READ_CONCURRENCY,
};

const KEY_ATTRIBUTE: &str = "id";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
/// TransactWriteItems hard limit.
const MAX_TRANSACT_ITEMS: usize = 100;
const CONDITION_FAILED: &str = "ConditionalCheckFailed";

/// DynamoDB-backed store: one table per collection, partition key `id`.
///
/// DynamoDB has no client push, so `changes` is a polling ticker and live
/// consumers re-read on every tick.
#[derive(Clone)]
pub struct DynamoStore {
    client: DynamoClient,
    users_table: String,
    ambulances_table: String,
    read_concurrency: usize,
    poll_interval: Duration,
}

impl DynamoStore {
    pub fn new(
        client: DynamoClient,
        users_table: impl Into<String>,
        ambulances_table: impl Into<String>,
    ) -> Self {
        Self {
            client,
            users_table: users_table.into(),
            ambulances_table: ambulances_table.into(),
            read_concurrency: DEFAULT_READ_CONCURRENCY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_read_concurrency(mut self, limit: usize) -> Self {
        self.read_concurrency = limit.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    fn table(&self, collection: Collection) -> &str {
        match collection {
            Collection::Users => &self.users_table,
            Collection::Ambulances => &self.ambulances_table,
        }
    }

    fn transact_item(&self, write: Write) -> Result<TransactWriteItem, StoreError> {
        let expr = UpdateExpression::build(&write);
        let update = Update::builder()
            .table_name(self.table(write.collection))
            .key(KEY_ATTRIBUTE, AttributeValue::S(write.id.clone()))
            .update_expression(expr.update)
            .condition_expression(expr.condition)
            .set_expression_attribute_names(Some(expr.names))
            .set_expression_attribute_values(Some(expr.values))
            .build()
            .map_err(|e| StoreError::Backend(format!("DynamoDB transact item error: {}", e)))?;
        Ok(TransactWriteItem::builder().update(update).build())
    }

    async fn send_update(
        &self,
        collection: Collection,
        id: &str,
        expr: UpdateExpression,
        has_precondition: bool,
    ) -> Result<(), StoreError> {
        self.client
            .update_item()
            .table_name(self.table(collection))
            .key(KEY_ATTRIBUTE, AttributeValue::S(id.to_string()))
            .update_expression(expr.update)
            .condition_expression(expr.condition)
            .set_expression_attribute_names(Some(expr.names))
            .set_expression_attribute_values(Some(expr.values))
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                if err.is_conditional_check_failed_exception() {
                    if has_precondition {
                        StoreError::Conflict(format!("{}/{} precondition failed", collection, id))
                    } else {
                        StoreError::NotFound {
                            collection,
                            id: id.to_string(),
                        }
                    }
                } else {
                    StoreError::Backend(format!("DynamoDB update_item error: {}", err))
                }
            })?;
        Ok(())
    }

    /// Create the intermediate maps a nested write needs. Runs outside any
    /// transaction; an empty map decodes the same as a missing one.
    async fn ensure_parents(&self, write: &Write) -> Result<(), StoreError> {
        for step in UpdateExpression::parent_steps(write) {
            self.send_update(write.collection, &write.id, step, false).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct WriteTarget {
    collection: Collection,
    id: String,
    has_precondition: bool,
}

impl WriteTarget {
    fn of(write: &Write) -> Self {
        Self {
            collection: write.collection,
            id: write.id.clone(),
            has_precondition: write.precondition.is_some(),
        }
    }
}

/// DynamoDB rejects a transaction that touches one item twice.
fn duplicate_target(writes: &[Write]) -> Option<&Write> {
    let mut seen = BTreeSet::new();
    writes
        .iter()
        .find(|w| !seen.insert((w.collection, w.id.as_str())))
}

/// Map per-item cancellation codes (in write order) back to a store error.
fn cancellation_error(targets: &[WriteTarget], codes: &[Option<&str>]) -> StoreError {
    let failed = targets
        .iter()
        .zip(codes)
        .find(|(_, code)| **code == Some(CONDITION_FAILED));

    match failed {
        Some((target, _)) if !target.has_precondition => StoreError::NotFound {
            collection: target.collection,
            id: target.id.clone(),
        },
        Some((target, _)) => StoreError::Conflict(format!(
            "{}/{} precondition failed",
            target.collection, target.id
        )),
        None => StoreError::Conflict(format!("DynamoDB transaction cancelled: {:?}", codes)),
    }
}

#[async_trait]
impl DocumentStore for DynamoStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(self.table(collection))
            .key(KEY_ATTRIBUTE, AttributeValue::S(id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("DynamoDB get_item error: {}", e)))?;

        result.item().map(item_to_document).transpose()
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[FieldFilter],
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let filter = FilterExpression::build(filters);
        let mut docs = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut req = self
                .client
                .scan()
                .table_name(self.table(collection))
                .set_exclusive_start_key(start_key.take());

            if let Some(filter) = &filter {
                req = req
                    .filter_expression(filter.text.clone())
                    .set_expression_attribute_names(Some(filter.names.clone()))
                    .set_expression_attribute_values(Some(filter.values.clone()));
            }

            let result = req
                .send()
                .await
                .map_err(|e| StoreError::Backend(format!("DynamoDB scan error: {}", e)))?;

            for item in result.items() {
                let Some(id) = item.get(KEY_ATTRIBUTE).and_then(|v| v.as_s().ok()) else {
                    tracing::warn!("Skipping {} item without string id", collection);
                    continue;
                };
                docs.push((id.to_string(), item_to_document(item)?));
            }

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(docs)
    }

    async fn update(&self, write: Write) -> Result<(), StoreError> {
        self.ensure_parents(&write).await?;
        let has_precondition = write.precondition.is_some();
        self.send_update(write.collection, &write.id, UpdateExpression::build(&write), has_precondition)
            .await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        match writes.len() {
            0 => return Ok(()),
            n if n > MAX_TRANSACT_ITEMS => {
                return Err(StoreError::Backend(format!(
                    "DynamoDB transaction too large: {} writes",
                    n
                )))
            }
            _ => {}
        }

        if let Some(dup) = duplicate_target(&writes) {
            return Err(StoreError::Backend(format!(
                "DynamoDB transaction writes {}/{} twice",
                dup.collection, dup.id
            )));
        }

        for write in &writes {
            self.ensure_parents(write).await?;
        }

        let targets: Vec<WriteTarget> = writes.iter().map(WriteTarget::of).collect();
        let items = writes
            .into_iter()
            .map(|w| self.transact_item(w))
            .collect::<Result<Vec<_>, _>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                TransactWriteItemsError::TransactionCanceledException(cancelled) => {
                    let codes: Vec<Option<&str>> = cancelled
                        .cancellation_reasons()
                        .iter()
                        .map(|reason| reason.code())
                        .collect();
                    cancellation_error(&targets, &codes)
                }
                err => StoreError::Backend(format!("DynamoDB transact_write_items error: {}", err)),
            })?;
        Ok(())
    }

    fn changes(&self, _collection: Collection) -> BoxStream<'static, ()> {
        let interval = tokio::time::interval(self.poll_interval);
        stream::unfold(interval, |mut interval| async move {
            interval.tick().await;
            Some(((), interval))
        })
        .boxed()
    }

    fn read_concurrency(&self) -> usize {
        self.read_concurrency
    }
}

/// Placeholder allocation shared by filter and update expressions.
#[derive(Default)]
struct Placeholders {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl Placeholders {
    fn name(&mut self, segment: &str) -> String {
        if let Some((placeholder, _)) = self.names.iter().find(|(_, n)| n.as_str() == segment) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), segment.to_string());
        placeholder
    }

    fn path(&mut self, path: &str) -> String {
        path.split('.')
            .map(|segment| self.name(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn value(&mut self, value: &Value) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), to_attribute(value));
        placeholder
    }

    fn equals(&mut self, filter: &FieldFilter) -> String {
        let path = self.path(&filter.path);
        let value = self.value(&filter.value);
        if matches_absent(&filter.value) {
            format!("(attribute_not_exists({}) OR {} = {})", path, path, value)
        } else {
            format!("{} = {}", path, value)
        }
    }
}

#[derive(Debug)]
struct FilterExpression {
    text: String,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl FilterExpression {
    fn build(filters: &[FieldFilter]) -> Option<Self> {
        if filters.is_empty() {
            return None;
        }
        let mut p = Placeholders::default();
        let text = filters
            .iter()
            .map(|f| p.equals(f))
            .collect::<Vec<_>>()
            .join(" AND ");
        Some(Self {
            text,
            names: p.names,
            values: p.values,
        })
    }
}

#[derive(Debug)]
struct UpdateExpression {
    update: String,
    condition: String,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl UpdateExpression {
    fn build(write: &Write) -> Self {
        let mut p = Placeholders::default();
        let sets = write
            .fields
            .iter()
            .map(|(path, value)| format!("{} = {}", p.path(path), p.value(value)))
            .collect::<Vec<_>>();

        // Updates never create documents.
        let mut condition = format!("attribute_exists({})", p.name(KEY_ATTRIBUTE));
        if let Some(expected) = &write.precondition {
            condition = format!("{} AND {}", condition, p.equals(expected));
        }

        Self {
            update: format!("SET {}", sets.join(", ")),
            condition,
            names: p.names,
            values: p.values,
        }
    }

    /// `if_not_exists` steps for every missing parent of a nested path,
    /// shallowest first. A parent and its child cannot share one expression.
    fn parent_steps(write: &Write) -> Vec<Self> {
        let mut by_depth: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
        for (path, _) in &write.fields {
            let segments: Vec<&str> = path.split('.').collect();
            for depth in 1..segments.len() {
                by_depth
                    .entry(depth)
                    .or_default()
                    .insert(segments[..depth].join("."));
            }
        }

        by_depth
            .into_values()
            .map(|parents| {
                let mut p = Placeholders::default();
                let empty = Value::Object(Document::new());
                let sets = parents
                    .iter()
                    .map(|parent| {
                        let path = p.path(parent);
                        let value = p.value(&empty);
                        format!("{} = if_not_exists({}, {})", path, path, value)
                    })
                    .collect::<Vec<_>>();
                let condition = format!("attribute_exists({})", p.name(KEY_ATTRIBUTE));
                Self {
                    update: format!("SET {}", sets.join(", ")),
                    condition,
                    names: p.names,
                    values: p.values,
                }
            })
            .collect()
    }
}

pub(crate) fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

pub(crate) fn from_attribute(attr: &AttributeValue) -> Result<Value, StoreError> {
    Ok(match attr {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => Value::Number(parse_number(n)?),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::Array(
            items
                .iter()
                .map(from_attribute)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| from_attribute(v).map(|value| (k.clone(), value)))
                .collect::<Result<Document, StoreError>>()?,
        ),
        AttributeValue::Ss(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(items) => Value::Array(
            items
                .iter()
                .map(|n| parse_number(n).map(Value::Number))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        other => {
            return Err(StoreError::Decode(format!(
                "unsupported DynamoDB attribute: {:?}",
                other
            )))
        }
    })
}

fn parse_number(raw: &str) -> Result<Number, StoreError> {
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Number::from(i));
    }
    if let Ok(u) = raw.parse::<u64>() {
        return Ok(Number::from(u));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| StoreError::Decode(format!("invalid number: {}", raw)))
}

fn item_to_document(item: &HashMap<String, AttributeValue>) -> Result<Document, StoreError> {
    item.iter()
        .map(|(k, v)| from_attribute(v).map(|value| (k.clone(), value)))
        .collect()
}
