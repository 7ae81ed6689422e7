//! Typed collection handle.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use docvault_validator::{Context, Document, Engine, Method, Options, Record, VaultError};
use tracing::debug;

use crate::connector::{DocumentStore, StoredDocument, WriteMode};
use crate::error::StoreResult;
use crate::query::Query;

/// Options for [`Collection::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    options: Options,
    id: Option<String>,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the document under `id` instead of a generated one.
    #[must_use = "builder methods must be chained or built"]
    pub fn custom_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Validation options. The method is always [`Method::Create`].
    #[must_use = "builder methods must be chained or built"]
    pub fn validation(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    fn validation_options(&self) -> Options {
        self.options.clone().with_method(Method::Create)
    }
}

/// Options for [`Collection::update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    options: Options,
    merge_fields: Vec<String>,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only overwrite these dot-separated paths. Omitted fields among them
    /// are deleted from the stored document.
    #[must_use = "builder methods must be chained or built"]
    pub fn merge_fields<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.merge_fields.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Validation options. The method is always [`Method::Update`].
    #[must_use = "builder methods must be chained or built"]
    pub fn validation(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    fn validation_options(&self) -> Options {
        let options = self.options.clone().with_method(Method::Update);
        if self.merge_fields.is_empty() {
            options
        } else {
            options.tombstone_omitted()
        }
    }

    fn write_mode(&self) -> WriteMode {
        if self.merge_fields.is_empty() {
            WriteMode::MergeAll
        } else {
            WriteMode::Merge(self.merge_fields.clone())
        }
    }
}

/// Records of type `T` stored in one collection.
///
/// Every write runs the engine first; nothing reaches the store when
/// validation fails.
pub struct Collection<T: Record> {
    name: String,
    engine: Arc<Engine>,
    store: Arc<dyn DocumentStore>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            engine: Arc::clone(&self.engine),
            store: Arc::clone(&self.store),
            _record: PhantomData,
        }
    }
}

impl<T: Record> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("record", &T::record_type().name())
            .finish_non_exhaustive()
    }
}

impl<T: Record> Collection<T> {
    pub fn new(name: impl Into<String>, engine: Arc<Engine>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            name: name.into(),
            engine,
            store,
            _record: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Validates without touching the store.
    pub fn validate(&self, ctx: &Context, record: &T, options: &Options) -> Result<Document, VaultError> {
        self.engine.validate(ctx, record, options)
    }

    /// Validates without touching the store, writing transformed values back
    /// when `options` asks for it.
    pub fn validate_mut(
        &self,
        ctx: &Context,
        record: &mut T,
        options: &Options,
    ) -> Result<Document, VaultError> {
        self.engine.validate_mut(ctx, record, options)
    }

    /// Validates `record` for creation and inserts it. Returns the new ID.
    pub async fn create(&self, ctx: &Context, record: &T, options: &CreateOptions) -> StoreResult<String> {
        let document = self.validate(ctx, record, &options.validation_options())?;
        let id = self
            .store
            .insert(&self.name, options.id.as_deref(), document)
            .await?;
        debug!(collection = %self.name, id = %id, "document created");
        Ok(id)
    }

    /// Validates `record` for update and merges it into every document the
    /// query matches. Returns the number of documents written.
    pub async fn update(
        &self,
        ctx: &Context,
        query: &Query,
        record: &T,
        options: &UpdateOptions,
    ) -> StoreResult<usize> {
        let document = self.validate(ctx, record, &options.validation_options())?;
        let targets = self.store.find(&self.name, query).await?;
        let mode = options.write_mode();
        for target in &targets {
            self.store
                .write(&self.name, &target.id, document.clone(), mode.clone())
                .await?;
        }
        debug!(collection = %self.name, count = targets.len(), "documents updated");
        Ok(targets.len())
    }

    /// Validates `record` for update and merges it into document `id`,
    /// creating it if missing.
    pub async fn update_by_id(
        &self,
        ctx: &Context,
        id: &str,
        record: &T,
        options: &UpdateOptions,
    ) -> StoreResult<()> {
        let document = self.validate(ctx, record, &options.validation_options())?;
        self.store
            .write(&self.name, id, document, options.write_mode())
            .await?;
        debug!(collection = %self.name, id, "document updated");
        Ok(())
    }

    pub async fn find(&self, query: &Query) -> StoreResult<Vec<StoredDocument>> {
        self.store.find(&self.name, query).await
    }

    pub async fn find_by_id(&self, id: &str) -> StoreResult<StoredDocument> {
        self.store.get(&self.name, id).await
    }

    /// Deletes every document the query matches. Returns how many were deleted.
    pub async fn delete(&self, query: &Query) -> StoreResult<usize> {
        let targets = self.store.find(&self.name, query).await?;
        for target in &targets {
            self.store.delete(&self.name, &target.id).await?;
        }
        debug!(collection = %self.name, count = targets.len(), "documents deleted");
        Ok(targets.len())
    }

    pub async fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        self.store.delete(&self.name, id).await
    }

    pub async fn count(&self, query: &Query) -> StoreResult<usize> {
        self.store.count(&self.name, query).await
    }
}
