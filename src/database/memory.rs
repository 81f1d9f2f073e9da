//! In-memory record store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, ServerError, USER_EXISTS};
use crate::product::{Product, ProductFilter, ProductId, ProductRepository};
use crate::user::{User, UserId, UserRepository};

/// Record store kept in process memory.
///
/// Products keep insertion order. Each operation holds the lock for its
/// whole duration, which makes it atomic per document.
#[derive(Debug, Default)]
pub struct MemoryStore {
    products: RwLock<Vec<Product>>,
    users: RwLock<Vec<User>>,
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn count(&self, filter: &ProductFilter) -> Result<u64> {
        let products = self.products.read().await;
        Ok(products.iter().filter(|p| filter.matches(p)).count() as u64)
    }

    async fn find_page(
        &self,
        filter: &ProductFilter,
        limit: u64,
        skip: u64,
    ) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .filter(|p| filter.matches(p))
            .skip(to_usize(skip))
            .take(to_usize(limit))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.iter().find(|p| p.id == *id).cloned())
    }

    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn insert(&self, product: &Product) -> Result<()> {
        self.products.write().await.push(product.clone());
        Ok(())
    }

    async fn update(&self, product: &Product) -> Result<()> {
        let mut products = self.products.write().await;
        if let Some(stored) = products.iter_mut().find(|p| p.id == product.id) {
            *stored = product.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: &ProductId) -> Result<bool> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|p| p.id != *id);
        Ok(products.len() != before)
    }

    async fn clear(&self) -> Result<()> {
        self.products.write().await.clear();
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == *id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn insert(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == user.username) {
            return Err(ServerError::Conflict(USER_EXISTS));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn append_favorite(&self, user: &UserId, product: &ProductId) -> Result<bool> {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.id == *user) {
            Some(user) if !user.favorites.contains(product) => {
                user.favorites.push(*product);
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn remove_favorite(&self, user: &UserId, product: &ProductId) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(user) = users.iter_mut().find(|u| u.id == *user) {
            user.favorites.retain(|id| id != product);
        }
        Ok(())
    }

    async fn prune_favorites(&self, user: &UserId, stale: &[ProductId]) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(user) = users.iter_mut().find(|u| u.id == *user) {
            user.favorites.retain(|id| !stale.contains(id));
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.users.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::product::NewProduct;

    fn product(owner: UserId, title: &str) -> Product {
        Product::new(
            owner,
            NewProduct {
                title: title.into(),
                price: Decimal::ONE,
                description: "d".into(),
                image: "i".into(),
                category: None,
            },
        )
    }

    #[tokio::test]
    async fn test_page_keeps_insertion_order() {
        let store = MemoryStore::default();
        let owner = UserId::new();
        for title in ["a", "b", "c", "d"] {
            ProductRepository::insert(&store, &product(owner, title))
                .await
                .unwrap();
        }

        let page = store
            .find_page(&ProductFilter::default(), 2, 1)
            .await
            .unwrap();
        let titles = page.iter().map(|p| p.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, ["b", "c"]);
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let store = MemoryStore::default();
        UserRepository::insert(&store, &User::new("bob", String::new(), false))
            .await
            .unwrap();

        let err = UserRepository::insert(&store, &User::new("bob", String::new(), false))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Conflict(USER_EXISTS)));
    }

    #[tokio::test]
    async fn test_append_is_unique() {
        let store = MemoryStore::default();
        let user = User::new("bob", String::new(), false);
        UserRepository::insert(&store, &user).await.unwrap();
        let product = ProductId::new();

        assert!(store.append_favorite(&user.id, &product).await.unwrap());
        assert!(!store.append_favorite(&user.id, &product).await.unwrap());
        let stored = UserRepository::find_by_id(&store, &user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.favorites, vec![product]);
    }

    #[tokio::test]
    async fn test_prune_keeps_order() {
        let store = MemoryStore::default();
        let user = User::new("bob", String::new(), false);
        UserRepository::insert(&store, &user).await.unwrap();
        let ids = [ProductId::new(), ProductId::new(), ProductId::new()];
        for id in &ids {
            store.append_favorite(&user.id, id).await.unwrap();
        }

        store.prune_favorites(&user.id, &[ids[1]]).await.unwrap();
        let stored = UserRepository::find_by_id(&store, &user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.favorites, vec![ids[0], ids[2]]);
    }
}
