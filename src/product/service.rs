use std::sync::Arc;

use validator::Validate;

use crate::config::{Catalog, MAX_PAGE_SIZE};
use crate::error::{PRODUCT_NOT_FOUND, Result, ServerError};
use crate::product::{
    NewProduct, Product, ProductChanges, ProductFilter, ProductId, ProductPage,
    ProductRepository,
};
use crate::user::UserId;

/// Effective page and page size of a listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
}

impl Pagination {
    /// Resolve caller values against catalog limits.
    ///
    /// Missing or zero page size means the default one, anything else is
    /// clamped to `[1, max_page_size]`, itself never above `MAX_PAGE_SIZE`.
    /// Pages start at 1.
    pub fn new(page: Option<i64>, page_size: Option<i64>, catalog: &Catalog) -> Self {
        let page_size = match page_size {
            None | Some(0) => catalog.default_page_size,
            Some(size) => u64::try_from(size).unwrap_or(1),
        }
        .clamp(1, catalog.max_page_size.clamp(1, MAX_PAGE_SIZE));

        let page = page
            .and_then(|page| u64::try_from(page).ok())
            .unwrap_or(1)
            .max(1);

        Self { page, page_size }
    }

    pub fn skip(&self) -> u64 {
        self.page_size.saturating_mul(self.page - 1)
    }

    /// Number of pages needed for `count` items.
    pub fn pages(&self, count: u64) -> u64 {
        count.div_ceil(self.page_size)
    }
}

/// Product catalog manager.
#[derive(Clone)]
pub struct ProductService {
    repo: Arc<dyn ProductRepository>,
    catalog: Catalog,
}

impl ProductService {
    /// Create a new [`ProductService`].
    pub fn new(repo: Arc<dyn ProductRepository>, catalog: Catalog) -> Self {
        Self { repo, catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// List one page of products whose title contains `keyword`.
    ///
    /// Pages past the end are empty, not an error.
    pub async fn list(
        &self,
        keyword: Option<&str>,
        pagination: Pagination,
    ) -> Result<ProductPage> {
        let filter = ProductFilter::keyword(keyword);

        let count = self.repo.count(&filter).await?;
        let products = self
            .repo
            .find_page(&filter, pagination.page_size, pagination.skip())
            .await?;

        Ok(ProductPage {
            products,
            page: pagination.page,
            pages: pagination.pages(count),
            count,
        })
    }

    /// Find a product using its string identifier.
    pub async fn get(&self, id: &str) -> Result<Product> {
        self.find(id).await
    }

    /// Create a product owned by `owner`.
    pub async fn create(&self, owner: UserId, fields: NewProduct) -> Result<Product> {
        fields.validate()?;

        let product = Product::new(owner, fields);
        self.repo.insert(&product).await?;

        tracing::info!(product_id = %product.id, %owner, "product created");
        Ok(product)
    }

    /// Update a product. Only its owner may do it.
    pub async fn update(
        &self,
        id: &str,
        owner: UserId,
        changes: ProductChanges,
    ) -> Result<Product> {
        changes.validate()?;

        let mut product = self.find(id).await?;
        if !product.is_owned_by(&owner) {
            return Err(ServerError::Forbidden);
        }

        product.apply(changes);
        self.repo.update(&product).await?;

        Ok(product)
    }

    /// Delete a product. Only its owner may do it.
    ///
    /// Favorites pointing to it are left as is and cleaned on their next
    /// read.
    pub async fn delete(&self, id: &str, owner: UserId) -> Result<()> {
        let product = self.find(id).await?;
        if !product.is_owned_by(&owner) {
            return Err(ServerError::Forbidden);
        }

        if !self.repo.delete(&product.id).await? {
            return Err(ServerError::NotFound(PRODUCT_NOT_FOUND));
        }

        tracing::info!(product_id = %product.id, %owner, "product deleted");
        Ok(())
    }

    /// Remove every product.
    pub async fn clear(&self) -> Result<()> {
        self.repo.clear().await
    }

    async fn find(&self, id: &str) -> Result<Product> {
        let Ok(id) = id.parse::<ProductId>() else {
            return Err(ServerError::NotFound(PRODUCT_NOT_FOUND));
        };

        self.repo
            .find_by_id(&id)
            .await?
            .ok_or(ServerError::NotFound(PRODUCT_NOT_FOUND))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::database::Store;

    fn fields(title: &str) -> NewProduct {
        NewProduct {
            title: title.into(),
            price: Decimal::new(99900, 2),
            description: "description".into(),
            image: "https://images.example/1.jpg".into(),
            category: None,
        }
    }

    fn service() -> ProductService {
        ProductService::new(Store::memory().products, Catalog::default())
    }

    #[test]
    fn test_page_size_is_capped() {
        let catalog = Catalog::default();
        for size in [101, 500, i64::MAX] {
            assert_eq!(Pagination::new(None, Some(size), &catalog).page_size, 100);
        }
        assert_eq!(Pagination::new(None, Some(100), &catalog).page_size, 100);

        let catalog = Catalog {
            max_page_size: 500,
            ..Catalog::default()
        };
        assert_eq!(Pagination::new(None, Some(500), &catalog).page_size, 100);
    }

    #[test]
    fn test_page_size_defaults() {
        let catalog = Catalog::default();
        assert_eq!(Pagination::new(None, None, &catalog).page_size, 12);
        assert_eq!(Pagination::new(None, Some(0), &catalog).page_size, 12);
        assert_eq!(Pagination::new(None, Some(-4), &catalog).page_size, 1);
        assert_eq!(Pagination::new(Some(0), None, &catalog).page, 1);
        assert_eq!(Pagination::new(Some(-3), None, &catalog).page, 1);
    }

    #[test]
    fn test_pages() {
        let pagination = Pagination::new(Some(3), Some(12), &Catalog::default());
        assert_eq!(pagination.skip(), 24);
        assert_eq!(pagination.pages(0), 0);
        assert_eq!(pagination.pages(12), 1);
        assert_eq!(pagination.pages(13), 2);
    }

    #[tokio::test]
    async fn test_keyword_search() {
        let service = service();
        let owner = UserId::new();
        let iphone = service.create(owner, fields("iPhone 15 Pro")).await.unwrap();
        service.create(owner, fields("MacBook Air M2")).await.unwrap();

        for keyword in ["phone", "PHONE", "Phone"] {
            let page = service
                .list(Some(keyword), Pagination::new(None, None, service.catalog()))
                .await
                .unwrap();
            assert_eq!(page.count, 1);
            assert_eq!(page.products, vec![iphone.clone()]);
        }
    }

    #[tokio::test]
    async fn test_out_of_range_page_is_empty() {
        let service = service();
        let owner = UserId::new();
        for i in 0..5 {
            service.create(owner, fields(&format!("item {i}"))).await.unwrap();
        }

        let page = service
            .list(None, Pagination::new(Some(2), Some(2), service.catalog()))
            .await
            .unwrap();
        assert_eq!(page.products.len(), 2);
        assert_eq!(page.pages, 3);
        assert_eq!(page.count, 5);

        let page = service
            .list(None, Pagination::new(Some(42), Some(2), service.catalog()))
            .await
            .unwrap();
        assert!(page.products.is_empty());
        assert_eq!(page.page, 42);
        assert_eq!(page.count, 5);
    }

    #[tokio::test]
    async fn test_get_unknown() {
        let service = service();
        assert!(matches!(
            service.get(&ProductId::new().to_string()).await,
            Err(ServerError::NotFound(_))
        ));
        assert!(matches!(
            service.get("garbage").await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let service = service();
        let owner_a = UserId::new();
        let owner_b = UserId::new();
        let product = service.create(owner_a, fields("Kindle")).await.unwrap();
        let id = product.id.to_string();

        assert!(matches!(
            service.delete(&id, owner_b).await,
            Err(ServerError::Forbidden)
        ));
        assert_eq!(service.get(&id).await.unwrap(), product);

        service.delete(&id, owner_a).await.unwrap();
        assert!(service.get(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_update_requires_owner() {
        let service = service();
        let owner = UserId::new();
        let product = service.create(owner, fields("Kindle")).await.unwrap();
        let id = product.id.to_string();
        let changes = ProductChanges {
            price: Some(Decimal::new(139, 0)),
            ..Default::default()
        };

        assert!(matches!(
            service.update(&id, UserId::new(), changes.clone()).await,
            Err(ServerError::Forbidden)
        ));

        let updated = service.update(&id, owner, changes).await.unwrap();
        assert_eq!(updated.price, Decimal::new(139, 0));
        assert_eq!(updated.title, "Kindle");
        assert_eq!(service.get(&id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_fields() {
        let service = service();
        let mut bad = fields("x");
        bad.image = String::new();

        assert!(matches!(
            service.create(UserId::new(), bad).await,
            Err(ServerError::Validation(_))
        ));
    }
}
