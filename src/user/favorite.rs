//! Favorites of a user.
//!
//! Deleting a product does not touch the favorites referencing it. Dangling
//! references are dropped lazily, the next time the owner lists their
//! favorites.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{
    ALREADY_FAVORITED, PRODUCT_NOT_FOUND, Result, ServerError, USER_NOT_FOUND,
};
use crate::product::{Product, ProductId, ProductRepository};
use crate::user::{User, UserId, UserRepository};

/// Favorites manager.
#[derive(Clone)]
pub struct FavoriteService {
    users: Arc<dyn UserRepository>,
    products: Arc<dyn ProductRepository>,
}

impl FavoriteService {
    /// Create a new [`FavoriteService`].
    pub fn new(
        users: Arc<dyn UserRepository>,
        products: Arc<dyn ProductRepository>,
    ) -> Self {
        Self { users, products }
    }

    /// Append `product_id` to the favorites of `user_id`.
    pub async fn add(&self, user_id: UserId, product_id: &str) -> Result<()> {
        let Ok(id) = product_id.parse::<ProductId>() else {
            return Err(ServerError::NotFound(PRODUCT_NOT_FOUND));
        };
        let product = self
            .products
            .find_by_id(&id)
            .await?
            .ok_or(ServerError::NotFound(PRODUCT_NOT_FOUND))?;

        let user = self.user(&user_id).await?;
        if user.has_favorite(&product.id.to_string()) {
            return Err(ServerError::Conflict(ALREADY_FAVORITED));
        }

        // Lost the race against a concurrent add of the same product.
        if !self.users.append_favorite(&user.id, &product.id).await? {
            return Err(ServerError::Conflict(ALREADY_FAVORITED));
        }

        tracing::debug!(%user_id, product_id = %product.id, "favorite added");
        Ok(())
    }

    /// Remove `product_id` from the favorites of `user_id`.
    ///
    /// Removing an absent product is a success.
    pub async fn remove(&self, user_id: UserId, product_id: &str) -> Result<()> {
        let user = self.user(&user_id).await?;

        // Nothing stored can match an id that does not parse.
        if let Ok(id) = product_id.parse::<ProductId>() {
            if user.has_favorite(&id.to_string()) {
                self.users.remove_favorite(&user.id, &id).await?;
                tracing::debug!(%user_id, product_id = %id, "favorite removed");
            }
        }

        Ok(())
    }

    /// List favorite products of `user_id`, oldest first.
    ///
    /// References to deleted products are skipped and pruned from the
    /// stored list.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Product>> {
        let user = self.user(&user_id).await?;
        if user.favorites.is_empty() {
            return Ok(Vec::new());
        }

        let found = self
            .products
            .find_many(&user.favorites)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect::<HashMap<_, _>>();

        let mut active = Vec::with_capacity(found.len());
        let mut stale = Vec::new();
        for id in &user.favorites {
            match found.get(id) {
                Some(product) => active.push(product.clone()),
                None => stale.push(*id),
            }
        }

        if active.len() != user.favorites.len() {
            self.users.prune_favorites(&user.id, &stale).await?;

            metrics::counter!("favorites_pruned_total").increment(stale.len() as u64);
            tracing::info!(%user_id, pruned = stale.len(), "stale favorites removed");
        }

        Ok(active)
    }

    async fn user(&self, id: &UserId) -> Result<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(ServerError::NotFound(USER_NOT_FOUND))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::database::Store;
    use crate::product::NewProduct;

    struct Fixture {
        store: Store,
        service: FavoriteService,
        user: User,
    }

    async fn fixture() -> Fixture {
        let store = Store::memory();
        let user = User::new("user1", String::new(), false);
        store.users.insert(&user).await.unwrap();

        Fixture {
            service: FavoriteService::new(
                Arc::clone(&store.users),
                Arc::clone(&store.products),
            ),
            store,
            user,
        }
    }

    async fn product(store: &Store, title: &str) -> Product {
        let product = Product::new(
            UserId::new(),
            NewProduct {
                title: title.into(),
                price: Decimal::new(349, 0),
                description: "d".into(),
                image: "i".into(),
                category: Some("Audio".into()),
            },
        );
        store.products.insert(&product).await.unwrap();
        product
    }

    async fn stored_favorites(f: &Fixture) -> Vec<ProductId> {
        f.store
            .users
            .find_by_id(&f.user.id)
            .await
            .unwrap()
            .unwrap()
            .favorites
    }

    #[tokio::test]
    async fn test_add_then_list() {
        let f = fixture().await;
        let p = product(&f.store, "Sony WH-1000XM5").await;

        f.service.add(f.user.id, &p.id.to_string()).await.unwrap();

        let favorites = f.service.list(f.user.id).await.unwrap();
        assert_eq!(favorites, vec![p]);
    }

    #[tokio::test]
    async fn test_add_keeps_order() {
        let f = fixture().await;
        let a = product(&f.store, "a").await;
        let b = product(&f.store, "b").await;

        f.service.add(f.user.id, &b.id.to_string()).await.unwrap();
        f.service.add(f.user.id, &a.id.to_string()).await.unwrap();

        assert_eq!(f.service.list(f.user.id).await.unwrap(), vec![b, a]);
    }

    #[tokio::test]
    async fn test_add_twice_conflicts() {
        let f = fixture().await;
        let p = product(&f.store, "AirPods Pro 2").await;

        f.service.add(f.user.id, &p.id.to_string()).await.unwrap();
        assert!(matches!(
            f.service.add(f.user.id, &p.id.to_string()).await,
            Err(ServerError::Conflict(ALREADY_FAVORITED))
        ));
        assert_eq!(stored_favorites(&f).await, vec![p.id]);
    }

    #[tokio::test]
    async fn test_add_unknown_product() {
        let f = fixture().await;

        for id in [ProductId::new().to_string(), "garbage".to_string()] {
            assert!(matches!(
                f.service.add(f.user.id, &id).await,
                Err(ServerError::NotFound(PRODUCT_NOT_FOUND))
            ));
        }
        assert!(stored_favorites(&f).await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let f = fixture().await;
        let p = product(&f.store, "Kindle Paperwhite").await;
        let keep = product(&f.store, "GoPro").await;
        f.service.add(f.user.id, &p.id.to_string()).await.unwrap();
        f.service.add(f.user.id, &keep.id.to_string()).await.unwrap();

        f.service.remove(f.user.id, &p.id.to_string()).await.unwrap();
        let once = stored_favorites(&f).await;
        f.service.remove(f.user.id, &p.id.to_string()).await.unwrap();

        assert_eq!(once, vec![keep.id]);
        assert_eq!(stored_favorites(&f).await, once);
        f.service.remove(f.user.id, "garbage").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_prunes_deleted_products() {
        let f = fixture().await;
        let a = product(&f.store, "A").await;
        let b = product(&f.store, "B").await;
        f.service.add(f.user.id, &a.id.to_string()).await.unwrap();
        f.service.add(f.user.id, &b.id.to_string()).await.unwrap();

        f.store.products.delete(&b.id).await.unwrap();
        // Deletion leaves the reference behind.
        assert_eq!(stored_favorites(&f).await, vec![a.id, b.id]);

        assert_eq!(f.service.list(f.user.id).await.unwrap(), vec![a.clone()]);
        assert_eq!(stored_favorites(&f).await, vec![a.id]);
    }

    #[tokio::test]
    async fn test_prune_keeps_concurrent_add() {
        let f = fixture().await;
        let a = product(&f.store, "A").await;
        let b = product(&f.store, "B").await;
        let c = product(&f.store, "C").await;
        f.service.add(f.user.id, &a.id.to_string()).await.unwrap();
        f.service.add(f.user.id, &b.id.to_string()).await.unwrap();
        f.store.products.delete(&b.id).await.unwrap();

        // Favorite added between the read and the prune of a listing.
        f.store.users.append_favorite(&f.user.id, &c.id).await.unwrap();
        f.store.users.prune_favorites(&f.user.id, &[b.id]).await.unwrap();

        assert_eq!(stored_favorites(&f).await, vec![a.id, c.id]);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let f = fixture().await;
        assert!(matches!(
            f.service.list(UserId::new()).await,
            Err(ServerError::NotFound(USER_NOT_FOUND))
        ));
    }
}
