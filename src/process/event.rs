//! Events and their data products.

use serde::{Deserialize, Serialize};
use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;

/// Run / subrun / event triple identifying an event.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EventId {
    pub run: u32,
    pub subrun: u32,
    pub event: u32,
}

impl EventId {
    pub fn new(run: u32, subrun: u32, event: u32) -> Self {
        EventId { run, subrun, event }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.run, self.subrun, self.event)
    }
}

/// Errors from the product store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("product '{module}:{instance}' was already put into this event")]
    Duplicate { module: String, instance: String },

    #[error("no product '{module}:{instance}' in this event")]
    NotFound { module: String, instance: String },

    #[error("product '{module}:{instance}' holds {stored}, not {requested}")]
    WrongType {
        module: String,
        instance: String,
        stored: &'static str,
        requested: &'static str,
    },
}

/// Description of one stored product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductKey {
    pub module: String,
    pub instance: String,
    pub type_name: &'static str,
}

struct Product {
    type_name: &'static str,
    data: Box<dyn Any>,
}

/// One event flowing through the paths.
///
/// Products are keyed by the label of the module that put them and an
/// instance name (often empty). Once put, a product cannot be replaced.
pub struct Event {
    id: EventId,
    products: BTreeMap<(String, String), Product>,
}

impl Event {
    pub fn new(id: EventId) -> Self {
        Event {
            id,
            products: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn put<T: Any>(&mut self, module: &str, instance: &str, product: T) -> Result<(), ProductError> {
        let key = (module.to_string(), instance.to_string());
        if self.products.contains_key(&key) {
            return Err(ProductError::Duplicate {
                module: key.0,
                instance: key.1,
            });
        }
        self.products.insert(
            key,
            Product {
                type_name: type_name::<T>(),
                data: Box::new(product),
            },
        );
        Ok(())
    }

    pub fn get<T: Any>(&self, module: &str, instance: &str) -> Result<&T, ProductError> {
        let product = self
            .products
            .get(&(module.to_string(), instance.to_string()))
            .ok_or_else(|| ProductError::NotFound {
                module: module.to_string(),
                instance: instance.to_string(),
            })?;

        product
            .data
            .downcast_ref::<T>()
            .ok_or_else(|| ProductError::WrongType {
                module: module.to_string(),
                instance: instance.to_string(),
                stored: product.type_name,
                requested: type_name::<T>(),
            })
    }

    pub fn contains(&self, module: &str, instance: &str) -> bool {
        self.products
            .contains_key(&(module.to_string(), instance.to_string()))
    }

    /// Keys of all products, sorted by module then instance.
    pub fn product_keys(&self) -> Vec<ProductKey> {
        self.products
            .iter()
            .map(|((module, instance), p)| ProductKey {
                module: module.clone(),
                instance: instance.clone(),
                type_name: p.type_name,
            })
            .collect()
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("products", &self.product_keys())
            .finish()
    }
}
