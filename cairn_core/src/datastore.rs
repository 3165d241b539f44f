//! Local key/value storage for small mutable pointers.

use async_trait::async_trait;
use bytes::Bytes;

use crate::StoreResult;

/// A mutable key/value store. The pin manager keeps exactly one key in it:
/// the encoded root of the persisted pin-set.
#[async_trait]
pub trait Datastore: std::fmt::Debug + Send + Sync {
    /// Reads a value, failing with [`StoreError::NotFound`] when absent.
    ///
    /// [`StoreError::NotFound`]: crate::StoreError::NotFound
    async fn get(&self, key: &str) -> StoreResult<Bytes>;

    /// Writes a value, replacing any previous one.
    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()>;

    async fn has(&self, key: &str) -> StoreResult<bool>;

    /// Removes a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

#[async_trait]
impl<T: Datastore + ?Sized> Datastore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        (**self).put(key, value).await
    }

    async fn has(&self, key: &str) -> StoreResult<bool> {
        (**self).has(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key).await
    }
}

#[async_trait]
impl<T: Datastore + ?Sized> Datastore for Box<T> {
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        (**self).put(key, value).await
    }

    async fn has(&self, key: &str) -> StoreResult<bool> {
        (**self).has(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key).await
    }
}
